use anyhow::Result;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{json, Map, Value};

use crate::errors::AgentError;
use crate::models::message::{Message, MessagePart};
use crate::models::role::Role;
use crate::models::tool::Tool;
use crate::providers::base::{ModelResponse, ToolRequest};

lazy_static! {
    static ref INVALID_NAME_CHARS: Regex = Regex::new(r"[^a-zA-Z0-9_-]").unwrap();
    static ref VALID_NAME: Regex = Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
}

/// One assistant step as OpenAI expects it: optional text and tool calls, followed by
/// a `tool` message per result.
#[derive(Default)]
struct Step {
    text: String,
    tool_calls: Vec<Value>,
    results: Vec<Value>,
}

impl Step {
    fn is_empty(&self) -> bool {
        self.text.is_empty() && self.tool_calls.is_empty()
    }

    fn flush_into(&mut self, spec: &mut Vec<Value>) {
        let step = std::mem::take(self);
        if step.is_empty() {
            return;
        }
        let mut converted = Map::new();
        converted.insert("role".to_string(), json!("assistant"));
        if !step.text.is_empty() {
            converted.insert("content".to_string(), json!(step.text));
        }
        if !step.tool_calls.is_empty() {
            converted.insert("tool_calls".to_string(), json!(step.tool_calls));
        }
        spec.push(Value::Object(converted));
        spec.extend(step.results);
    }
}

/// Convert the conversation to OpenAI's chat message specification.
///
/// A single assistant message can hold several steps (text, tool calls, more text). Each
/// step becomes its own assistant message so every tool result directly follows the call
/// that produced it. Unresolved calls are skipped; the API rejects calls without results.
pub fn messages_to_openai_spec(messages: &[Message]) -> Vec<Value> {
    let mut spec = Vec::new();

    for message in messages {
        match message.role {
            Role::User => {
                let text = message.text();
                if !text.is_empty() {
                    spec.push(json!({"role": "user", "content": text}));
                }
            }
            Role::Assistant => {
                let mut step = Step::default();
                for part in &message.parts {
                    match part {
                        MessagePart::StepStart => step.flush_into(&mut spec),
                        MessagePart::Text { text } => {
                            if !step.tool_calls.is_empty() {
                                step.flush_into(&mut spec);
                            }
                            step.text.push_str(text);
                        }
                        MessagePart::ToolInvocation { tool_invocation } => {
                            let Some(result) = tool_invocation.result() else {
                                continue;
                            };
                            step.tool_calls.push(json!({
                                "id": tool_invocation.tool_call_id,
                                "type": "function",
                                "function": {
                                    "name": sanitize_function_name(&tool_invocation.tool_name),
                                    "arguments": tool_invocation.args.to_string(),
                                }
                            }));
                            step.results.push(json!({
                                "role": "tool",
                                "tool_call_id": tool_invocation.tool_call_id,
                                "content": result.to_string(),
                            }));
                        }
                        MessagePart::Unsupported => {}
                    }
                }
                step.flush_into(&mut spec);
            }
        }
    }

    spec
}

/// Convert tools to OpenAI's API tool specification
pub fn tools_to_openai_spec(tools: &[Tool]) -> Result<Vec<Value>> {
    let mut tool_names = std::collections::HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(&tool.name) {
            return Err(AgentError::DuplicateTool(tool.name.clone()).into());
        }

        result.push(json!({
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.input_schema,
            }
        }));
    }

    Ok(result)
}

/// Build a tool request from the raw pieces OpenAI returns. A bad name or arguments that
/// do not parse become an error the model gets back as the tool's result.
pub fn tool_request(id: String, function_name: &str, arguments: &str) -> ToolRequest {
    if !is_valid_function_name(function_name) {
        let error = AgentError::ToolNotFound(format!(
            "The provided function name '{}' had invalid characters, it must match this regex [a-zA-Z0-9_-]+",
            function_name
        ));
        return ToolRequest::new(id, function_name, Err(error));
    }

    let arguments = if arguments.trim().is_empty() { "{}" } else { arguments };
    match serde_json::from_str::<Value>(arguments) {
        Ok(params) => ToolRequest::new(id, function_name, Ok(params)),
        Err(e) => {
            let error = AgentError::InvalidParameters(format!(
                "Could not interpret tool use parameters for id {}: {}",
                id, e
            ));
            ToolRequest::new(id, function_name, Err(error))
        }
    }
}

/// Convert OpenAI's API response to a model response
pub fn openai_response_to_message(response: Value) -> Result<ModelResponse> {
    let original = &response["choices"][0]["message"];
    let mut message = ModelResponse::default();

    if let Some(text) = original.get("content").and_then(Value::as_str) {
        message.text = text.to_string();
    }

    if let Some(tool_calls) = original.get("tool_calls").and_then(Value::as_array) {
        for tool_call in tool_calls {
            let id = tool_call["id"].as_str().unwrap_or_default().to_string();
            let function_name = tool_call["function"]["name"].as_str().unwrap_or_default();
            let arguments = tool_call["function"]["arguments"]
                .as_str()
                .unwrap_or_default();
            message
                .tool_requests
                .push(tool_request(id, function_name, arguments));
        }
    }

    Ok(message)
}

pub fn sanitize_function_name(name: &str) -> String {
    INVALID_NAME_CHARS.replace_all(name, "_").to_string()
}

pub fn is_valid_function_name(name: &str) -> bool {
    VALID_NAME.is_match(name)
}

#[derive(Debug, thiserror::Error)]
#[error("Context length exceeded. Message: {0}")]
pub struct ContextLengthExceededError(String);

pub fn check_openai_context_length_error(error: &Value) -> Option<ContextLengthExceededError> {
    let code = error.get("code")?.as_str()?;
    if code == "context_length_exceeded" || code == "string_above_max_length" {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error")
            .to_string();
        Some(ContextLengthExceededError(message))
    } else {
        None
    }
}
