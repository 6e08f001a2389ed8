use anyhow::Result;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::data::DataCatalog;
use crate::dcm::DcmDataset;
use crate::errors::{AgentError, AgentResult};
use crate::models::message::{generate_id, Message, ToolInvocation};
use crate::models::tool::Tool;
use crate::prompt_template::{data_assistant_prompt, dcm_assistant_prompt};
use crate::protocol::{FinishReason, Frame, StreamUsage};
use crate::providers::base::{Provider, ProviderChunk, ToolRequest, Usage};
use crate::registry::{Dispatch, ToolRegistry};
use crate::toolkits;

/// Step ceiling for the tabular data workflow.
pub const CHAT_MAX_STEPS: usize = 5;
/// Step ceiling for the DCM workflow, which chains several lookups per answer.
pub const DCM_MAX_STEPS: usize = 10;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Used in logs to tell the workflows apart.
    pub name: String,
    pub max_steps: usize,
}

impl AgentConfig {
    pub fn new<S: Into<String>>(name: S, max_steps: usize) -> Self {
        Self {
            name: name.into(),
            max_steps: max_steps.max(1),
        }
    }
}

/// What the orchestrator produces while it runs one request.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    StepStart {
        message_id: String,
    },
    Text(String),
    /// The model proposed a call; it is in `call` state.
    ToolCall(ToolInvocation),
    /// A server tool resolved the call in this step.
    ToolResult {
        tool_call_id: String,
        result: Value,
    },
    StepFinish {
        finish_reason: FinishReason,
        usage: Usage,
    },
    /// The step ceiling stopped the loop after `steps` steps.
    Truncated {
        steps: usize,
    },
    Finish {
        finish_reason: FinishReason,
        usage: Usage,
    },
}

impl From<AgentEvent> for Frame {
    fn from(event: AgentEvent) -> Self {
        match event {
            AgentEvent::StepStart { message_id } => Frame::StartStep { message_id },
            AgentEvent::Text(text) => Frame::Text(text),
            AgentEvent::ToolCall(invocation) => Frame::ToolCall {
                tool_call_id: invocation.tool_call_id,
                tool_name: invocation.tool_name,
                args: invocation.args,
            },
            AgentEvent::ToolResult {
                tool_call_id,
                result,
            } => Frame::ToolResult {
                tool_call_id,
                result,
            },
            AgentEvent::StepFinish {
                finish_reason,
                usage,
            } => Frame::FinishStep {
                finish_reason,
                usage: StreamUsage::from(usage),
                is_continued: false,
            },
            AgentEvent::Truncated { steps } => {
                Frame::Annotations(vec![json!({"type": "truncated", "steps": steps})])
            }
            AgentEvent::Finish {
                finish_reason,
                usage,
            } => Frame::FinishMessage {
                finish_reason,
                usage: StreamUsage::from(usage),
            },
        }
    }
}

/// Agent drives a model through one workflow's tools
pub struct Agent {
    provider: Arc<dyn Provider>,
    registry: ToolRegistry,
    system_prompt: String,
    config: AgentConfig,
}

impl Agent {
    pub fn new(
        provider: Arc<dyn Provider>,
        registry: ToolRegistry,
        system_prompt: String,
        config: AgentConfig,
    ) -> Self {
        Self {
            provider,
            registry,
            system_prompt,
            config,
        }
    }

    /// The tabular data assistant behind `/api/chat`.
    pub fn chat(
        provider: Arc<dyn Provider>,
        catalog: Arc<DataCatalog>,
        max_steps: usize,
    ) -> AgentResult<Self> {
        let registry = toolkits::chat_tools(Arc::clone(&catalog))?;
        let system_prompt = data_assistant_prompt(&catalog, &registry.list_for_prompt())
            .map_err(|e| AgentError::Internal(e.to_string()))?;
        Ok(Self::new(
            provider,
            registry,
            system_prompt,
            AgentConfig::new("chat", max_steps),
        ))
    }

    /// The debt capital markets assistant behind `/api/dcm/chat`.
    pub fn dcm(
        provider: Arc<dyn Provider>,
        data: Arc<DcmDataset>,
        max_steps: usize,
    ) -> AgentResult<Self> {
        let registry = toolkits::dcm_tools(data)?;
        let system_prompt = dcm_assistant_prompt(&registry.list_for_prompt())
            .map_err(|e| AgentError::Internal(e.to_string()))?;
        Ok(Self::new(
            provider,
            registry,
            system_prompt,
            AgentConfig::new("dcm", max_steps),
        ))
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn tools(&self) -> Vec<Tool> {
        self.registry.list_for_prompt()
    }

    /// Run one request against the replayed conversation.
    ///
    /// Each step streams the model's text, then dispatches its tool calls in the order the
    /// model proposed them. Server results feed the next step. A client tool ends the
    /// request with the call left pending, and the step ceiling ends it with a truncation
    /// notice. Provider failures end the stream with an error.
    pub async fn reply(&self, messages: &[Message]) -> Result<BoxStream<'_, Result<AgentEvent>>> {
        let mut context = self.registry.model_context(messages);
        let tools = self.registry.list_for_prompt();
        let message_id = generate_id();
        let workflow = self.config.name.clone();

        Ok(Box::pin(async_stream::try_stream! {
            let mut total = Usage::default();
            let mut step = 0;

            loop {
                step += 1;
                tracing::debug!(workflow = %workflow, step, "starting step");
                yield AgentEvent::StepStart { message_id: message_id.clone() };

                let mut chunks = self
                    .provider
                    .stream(&self.system_prompt, &context, &tools)
                    .await
                    .map_err(|e| transport_error(&workflow, step, e))?;

                let mut text = String::new();
                let mut requests = Vec::new();
                let mut usage = Usage::default();
                while let Some(chunk) = chunks.next().await {
                    match chunk.map_err(|e| transport_error(&workflow, step, e))? {
                        ProviderChunk::Text(delta) => {
                            text.push_str(&delta);
                            yield AgentEvent::Text(delta);
                        }
                        ProviderChunk::ToolRequest(request) => requests.push(request),
                        ProviderChunk::Usage(u) => usage = u,
                    }
                }
                total = total.combine(usage);

                // Make sure the text is flushed before any tool runs
                tokio::task::yield_now().await;

                let mut step_message = Message::assistant().with_step_start();
                if !text.is_empty() {
                    step_message = step_message.with_text(text);
                }

                if requests.is_empty() {
                    yield AgentEvent::StepFinish { finish_reason: FinishReason::Stop, usage };
                    yield AgentEvent::Finish { finish_reason: FinishReason::Stop, usage: total };
                    tracing::info!(workflow = %workflow, steps = step, outcome = "completed", "reply finished");
                    break;
                }

                let mut pending = None;
                let proposed = requests.len();
                for (index, request) in requests.into_iter().enumerate() {
                    let ToolRequest { id, name, arguments } = request;
                    let id = if id.is_empty() { generate_id() } else { id };
                    let args = arguments.as_ref().cloned().unwrap_or_else(|_| json!({}));

                    let invocation = ToolInvocation::call(id.clone(), name.clone(), args.clone());
                    yield AgentEvent::ToolCall(invocation.clone());

                    let dispatch = match &arguments {
                        Ok(args) => self.registry.dispatch(&name, args),
                        Err(err) => Dispatch::Resolved(err.to_tool_result()),
                    };
                    match dispatch {
                        Dispatch::Resolved(result) => {
                            tracing::debug!(workflow = %workflow, tool = %name, tool_call_id = %id, "tool resolved");
                            yield AgentEvent::ToolResult { tool_call_id: id, result: result.clone() };
                            step_message = step_message.with_tool_invocation(invocation.with_result(result));
                        }
                        Dispatch::Pending => {
                            step_message = step_message.with_tool_invocation(invocation);
                            let dropped = proposed - index - 1;
                            if dropped > 0 {
                                tracing::warn!(
                                    workflow = %workflow,
                                    tool = %name,
                                    dropped,
                                    "dropping tool calls proposed after a client tool"
                                );
                            }
                            pending = Some(name);
                            break;
                        }
                    }
                    tokio::task::yield_now().await;
                }
                context.push(step_message);

                yield AgentEvent::StepFinish { finish_reason: FinishReason::ToolCalls, usage };

                if let Some(tool) = pending {
                    yield AgentEvent::Finish { finish_reason: FinishReason::ToolCalls, usage: total };
                    tracing::info!(workflow = %workflow, steps = step, tool = %tool, outcome = "awaiting_client_tool", "reply finished");
                    break;
                }

                if step >= self.config.max_steps {
                    yield AgentEvent::Truncated { steps: step };
                    yield AgentEvent::Finish { finish_reason: FinishReason::ToolCalls, usage: total };
                    tracing::warn!(workflow = %workflow, steps = step, outcome = "step_ceiling", "reply truncated");
                    break;
                }
            }
        }))
    }
}

fn transport_error(workflow: &str, step: usize, error: anyhow::Error) -> anyhow::Error {
    tracing::error!(workflow, step, outcome = "transport_error", error = %error, "model request failed");
    error
}
