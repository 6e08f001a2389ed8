use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};

use serde_json::Value;

use crate::errors::AgentResult;
use crate::models::message::Message;
use crate::models::tool::Tool;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }

    /// Sum two usages, keeping a count as soon as either side reports one.
    pub fn combine(self, other: Usage) -> Usage {
        fn add(a: Option<i32>, b: Option<i32>) -> Option<i32> {
            match (a, b) {
                (None, None) => None,
                (a, b) => Some(a.unwrap_or(0) + b.unwrap_or(0)),
            }
        }
        Usage::new(
            add(self.input_tokens, other.input_tokens),
            add(self.output_tokens, other.output_tokens),
            add(self.total_tokens, other.total_tokens),
        )
    }
}

/// A tool call as proposed by the model. The arguments are an error when the model
/// produced a malformed name or arguments that are not JSON; that error goes back to
/// the model as the call's result.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolRequest {
    pub id: String,
    pub name: String,
    pub arguments: AgentResult<Value>,
}

impl ToolRequest {
    pub fn new<I, N>(id: I, name: N, arguments: AgentResult<Value>) -> Self
    where
        I: Into<String>,
        N: Into<String>,
    {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// One completed model generation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    pub text: String,
    pub tool_requests: Vec<ToolRequest>,
}

impl ModelResponse {
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self {
            text: text.into(),
            tool_requests: Vec::new(),
        }
    }

    pub fn with_tool_request<I, N>(mut self, id: I, name: N, arguments: Value) -> Self
    where
        I: Into<String>,
        N: Into<String>,
    {
        self.tool_requests
            .push(ToolRequest::new(id, name, Ok(arguments)));
        self
    }
}

/// Incremental output of a streamed generation. Text arrives as it is produced, tool
/// requests once their arguments are complete, usage last.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderChunk {
    Text(String),
    ToolRequest(ToolRequest),
    Usage(Usage),
}

pub type ProviderStream = BoxStream<'static, Result<ProviderChunk>>;

/// Base trait for model providers
#[async_trait]
pub trait Provider: Send + Sync {
    /// Generate the next response for the conversation
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<(ModelResponse, Usage)>;

    /// Stream the next response. Providers without a streaming transport replay the
    /// complete response as chunks.
    async fn stream(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<ProviderStream> {
        let (response, usage) = self.complete(system, messages, tools).await?;
        let mut chunks = Vec::new();
        if !response.text.is_empty() {
            chunks.push(Ok(ProviderChunk::Text(response.text)));
        }
        chunks.extend(
            response
                .tool_requests
                .into_iter()
                .map(|request| Ok(ProviderChunk::ToolRequest(request))),
        );
        chunks.push(Ok(ProviderChunk::Usage(usage)));
        Ok(stream::iter(chunks).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_usage_creation() {
        let usage = Usage::new(Some(10), Some(20), Some(30));
        assert_eq!(usage.input_tokens, Some(10));
        assert_eq!(usage.output_tokens, Some(20));
        assert_eq!(usage.total_tokens, Some(30));
    }

    #[test]
    fn test_usage_serialization() -> Result<()> {
        let usage = Usage::new(Some(10), Some(20), Some(30));
        let serialized = serde_json::to_string(&usage)?;
        let deserialized: Usage = serde_json::from_str(&serialized)?;
        assert_eq!(usage, deserialized);

        let json_value: serde_json::Value = serde_json::from_str(&serialized)?;
        assert_eq!(json_value["input_tokens"], json!(10));
        assert_eq!(json_value["output_tokens"], json!(20));
        assert_eq!(json_value["total_tokens"], json!(30));
        Ok(())
    }

    #[test]
    fn test_usage_combine() {
        let total = Usage::new(Some(10), Some(5), None).combine(Usage::new(Some(3), None, None));
        assert_eq!(total, Usage::new(Some(13), Some(5), None));
        assert_eq!(Usage::default().combine(Usage::default()), Usage::default());
    }
}
