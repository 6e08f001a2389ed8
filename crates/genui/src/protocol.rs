//! The data stream framing shared by the server and its clients.
//!
//! Every frame is one line: a type code, a colon, a JSON payload and a newline. A reader
//! can act on each line as soon as it arrives, so nothing needs the full response.
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ConversationError;
use crate::models::conversation::Conversation;
use crate::models::message::{MessagePart, Resolution, ToolInvocation};
use crate::providers::base::Usage;

/// Header that marks a response as a data stream.
pub const STREAM_HEADER: &str = "x-vercel-ai-data-stream";
pub const STREAM_VERSION: &str = "v1";

/// Why a step or a response ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
    Error,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl From<Usage> for StreamUsage {
    fn from(usage: Usage) -> Self {
        let count = |n: Option<i32>| n.map_or(0, |n| n.max(0) as u32);
        StreamUsage {
            prompt_tokens: count(usage.input_tokens),
            completion_tokens: count(usage.output_tokens),
        }
    }
}

/// One frame of the data stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    StartStep {
        message_id: String,
    },
    Text(String),
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        args: Value,
    },
    ToolResult {
        tool_call_id: String,
        result: Value,
    },
    Annotations(Vec<Value>),
    Error(String),
    FinishStep {
        finish_reason: FinishReason,
        usage: StreamUsage,
        is_continued: bool,
    },
    FinishMessage {
        finish_reason: FinishReason,
        usage: StreamUsage,
    },
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartStepPayload {
    message_id: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolCallPayload {
    tool_call_id: String,
    tool_name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolResultPayload {
    tool_call_id: String,
    result: Value,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinishStepPayload {
    finish_reason: FinishReason,
    #[serde(default)]
    usage: StreamUsage,
    #[serde(default)]
    is_continued: bool,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinishMessagePayload {
    finish_reason: FinishReason,
    #[serde(default)]
    usage: StreamUsage,
}

impl Frame {
    /// The type code written before the colon.
    pub fn code(&self) -> &'static str {
        match self {
            Frame::StartStep { .. } => "f",
            Frame::Text(_) => "0",
            Frame::ToolCall { .. } => "9",
            Frame::ToolResult { .. } => "a",
            Frame::Annotations(_) => "8",
            Frame::Error(_) => "3",
            Frame::FinishStep { .. } => "e",
            Frame::FinishMessage { .. } => "d",
        }
    }

    fn payload(&self) -> serde_json::Result<String> {
        match self {
            Frame::StartStep { message_id } => serde_json::to_string(&StartStepPayload {
                message_id: message_id.clone(),
            }),
            Frame::Text(text) | Frame::Error(text) => serde_json::to_string(text),
            Frame::ToolCall {
                tool_call_id,
                tool_name,
                args,
            } => serde_json::to_string(&ToolCallPayload {
                tool_call_id: tool_call_id.clone(),
                tool_name: tool_name.clone(),
                args: args.clone(),
            }),
            Frame::ToolResult {
                tool_call_id,
                result,
            } => serde_json::to_string(&ToolResultPayload {
                tool_call_id: tool_call_id.clone(),
                result: result.clone(),
            }),
            Frame::Annotations(annotations) => serde_json::to_string(annotations),
            Frame::FinishStep {
                finish_reason,
                usage,
                is_continued,
            } => serde_json::to_string(&FinishStepPayload {
                finish_reason: *finish_reason,
                usage: *usage,
                is_continued: *is_continued,
            }),
            Frame::FinishMessage {
                finish_reason,
                usage,
            } => serde_json::to_string(&FinishMessagePayload {
                finish_reason: *finish_reason,
                usage: *usage,
            }),
        }
    }

    /// Encode as a complete line, newline included.
    pub fn encode(&self) -> String {
        // JSON encoding of these payloads cannot fail: every map key is a string.
        let payload = self.payload().unwrap_or_else(|_| "null".to_string());
        format!("{}:{}\n", self.code(), payload)
    }

    /// Parse one line, with or without its trailing newline.
    pub fn parse(line: &str) -> Result<Frame, ConversationError> {
        let line = line.trim_end_matches(['\n', '\r']);
        let (code, payload) = line
            .split_once(':')
            .ok_or_else(|| ConversationError::MalformedFrame(line.to_string()))?;
        let malformed = |e: serde_json::Error| {
            ConversationError::MalformedFrame(format!("{}: {}", code, e))
        };

        let frame = match code {
            "f" => {
                let p: StartStepPayload = serde_json::from_str(payload).map_err(malformed)?;
                Frame::StartStep {
                    message_id: p.message_id,
                }
            }
            "0" => Frame::Text(serde_json::from_str(payload).map_err(malformed)?),
            "9" => {
                let p: ToolCallPayload = serde_json::from_str(payload).map_err(malformed)?;
                Frame::ToolCall {
                    tool_call_id: p.tool_call_id,
                    tool_name: p.tool_name,
                    args: p.args,
                }
            }
            "a" => {
                let p: ToolResultPayload = serde_json::from_str(payload).map_err(malformed)?;
                Frame::ToolResult {
                    tool_call_id: p.tool_call_id,
                    result: p.result,
                }
            }
            "8" => Frame::Annotations(serde_json::from_str(payload).map_err(malformed)?),
            "3" => Frame::Error(serde_json::from_str(payload).map_err(malformed)?),
            "e" => {
                let p: FinishStepPayload = serde_json::from_str(payload).map_err(malformed)?;
                Frame::FinishStep {
                    finish_reason: p.finish_reason,
                    usage: p.usage,
                    is_continued: p.is_continued,
                }
            }
            "d" => {
                let p: FinishMessagePayload = serde_json::from_str(payload).map_err(malformed)?;
                Frame::FinishMessage {
                    finish_reason: p.finish_reason,
                    usage: p.usage,
                }
            }
            other => {
                return Err(ConversationError::MalformedFrame(format!(
                    "unknown frame type '{}'",
                    other
                )))
            }
        };
        Ok(frame)
    }
}

/// Turns arbitrarily split byte chunks back into frames.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every frame it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<Frame>, ConversationError> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            if line.trim().is_empty() {
                continue;
            }
            frames.push(Frame::parse(&line)?);
        }
        Ok(frames)
    }

    /// Parse whatever is left once the body ends. A stream cut mid-line is malformed.
    pub fn finish(self) -> Result<Option<Frame>, ConversationError> {
        let rest = String::from_utf8_lossy(&self.buffer);
        if rest.trim().is_empty() {
            return Ok(None);
        }
        Frame::parse(&rest).map(Some)
    }
}

/// Folds decoded frames into the trailing assistant message of a conversation, the
/// way the chat client accumulates a streamed reply.
#[derive(Debug, Default)]
pub struct StreamReducer {
    finish_reason: Option<FinishReason>,
    error: Option<String>,
    annotations: Vec<Value>,
}

impl StreamReducer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(
        &mut self,
        conversation: &mut Conversation,
        frame: Frame,
    ) -> Result<(), ConversationError> {
        match frame {
            Frame::StartStep { message_id } => {
                let message = conversation.last_assistant_mut();
                if message.parts.is_empty() {
                    message.id = message_id;
                }
                message.push_part(MessagePart::StepStart);
            }
            Frame::Text(delta) => conversation.last_assistant_mut().push_text(&delta),
            Frame::ToolCall {
                tool_call_id,
                tool_name,
                args,
            } => {
                if conversation.find_invocation(&tool_call_id).is_some() {
                    tracing::debug!(%tool_call_id, "tool call already in conversation");
                } else {
                    conversation
                        .last_assistant_mut()
                        .push_part(ToolInvocation::call(tool_call_id, tool_name, args).into());
                }
            }
            Frame::ToolResult {
                tool_call_id,
                result,
            } => {
                if conversation.add_tool_result(&tool_call_id, result)?
                    == Resolution::AlreadyResolved
                {
                    tracing::debug!(%tool_call_id, "tool result already applied");
                }
            }
            Frame::Annotations(annotations) => self.annotations.extend(annotations),
            Frame::Error(message) => self.error = Some(message),
            Frame::FinishStep { .. } => {}
            Frame::FinishMessage { finish_reason, .. } => self.finish_reason = Some(finish_reason),
        }
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.finish_reason.is_some()
    }

    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.finish_reason
    }

    /// The terminal error the server reported, if the turn failed.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Steps run before the server stopped at its step ceiling.
    pub fn truncated_after(&self) -> Option<u64> {
        self.annotations
            .iter()
            .find(|a| a["type"] == "truncated")
            .and_then(|a| a["steps"].as_u64())
    }
}
