//! These models represent the objects passed around by the agent
//!
//! There are several different related formats we need to interact with:
//! - vercel useChat messages, sent from the interface to the agent on every request
//! - vercel data stream frames, sent from the agent to the interface (see `protocol`)
//! - openai messages/tools, sent from the agent to the LLM
//!
//! The useChat message shape is close enough to what the orchestrator needs that we use it
//! directly as the internal model, and convert to the provider format at the edge.
pub mod conversation;
pub mod message;
pub mod role;
pub mod tool;
