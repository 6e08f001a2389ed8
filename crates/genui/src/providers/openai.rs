use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;

use super::base::{ModelResponse, Provider, ProviderChunk, ProviderStream, Usage};
use super::configs::OpenAiProviderConfig;
use super::utils::{
    check_openai_context_length_error, messages_to_openai_spec, openai_response_to_message,
    tool_request, tools_to_openai_spec,
};
use crate::models::message::Message;
use crate::models::tool::Tool;

pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    fn get_usage(data: &Value) -> Usage {
        let Some(usage) = data.get("usage").filter(|u| u.is_object()) else {
            return Usage::default();
        };

        let input_tokens = usage
            .get("prompt_tokens")
            .and_then(|v| v.as_i64())
            .map(|v| v as i32);

        let output_tokens = usage
            .get("completion_tokens")
            .and_then(|v| v.as_i64())
            .map(|v| v as i32);

        let total_tokens = usage
            .get("total_tokens")
            .and_then(|v| v.as_i64())
            .map(|v| v as i32)
            .or_else(|| match (input_tokens, output_tokens) {
                (Some(input), Some(output)) => Some(input + output),
                _ => None,
            });

        Usage::new(input_tokens, output_tokens, total_tokens)
    }

    fn payload(&self, system: &str, messages: &[Message], tools: &[Tool]) -> Result<Value> {
        let system_message = json!({
            "role": "system",
            "content": system
        });

        let mut messages_array = vec![system_message];
        messages_array.extend(messages_to_openai_spec(messages));

        let mut payload = serde_json::Map::new();
        payload.insert("model".to_string(), json!(self.config.model));
        payload.insert("messages".to_string(), json!(messages_array));

        let tools_spec = tools_to_openai_spec(tools)?;
        if !tools_spec.is_empty() {
            payload.insert("tools".to_string(), json!(tools_spec));
        }
        if let Some(temp) = self.config.temperature {
            payload.insert("temperature".to_string(), json!(temp));
        }
        if let Some(tokens) = self.config.max_tokens {
            payload.insert("max_tokens".to_string(), json!(tokens));
        }
        Ok(Value::Object(payload))
    }

    async fn post(&self, payload: &Value) -> Result<Response> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(payload)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response),
            status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
                Err(anyhow!("Server error: {}", status))
            }
            status => Err(anyhow!("Request failed: {}", status)),
        }
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<(ModelResponse, Usage)> {
        let payload = self.payload(system, messages, tools)?;
        let response: Value = self.post(&payload).await?.json().await?;

        // Raise specific error if context length is exceeded
        if let Some(error) = response.get("error") {
            if let Some(err) = check_openai_context_length_error(error) {
                return Err(err.into());
            }
            return Err(anyhow!("OpenAI API error: {}", error));
        }

        let message = openai_response_to_message(response.clone())?;
        Ok((message, Self::get_usage(&response)))
    }

    async fn stream(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<ProviderStream> {
        let mut payload = self.payload(system, messages, tools)?;
        if let Some(map) = payload.as_object_mut() {
            map.insert("stream".to_string(), json!(true));
            map.insert("stream_options".to_string(), json!({"include_usage": true}));
        }
        let response = self.post(&payload).await?;
        let mut bytes = response.bytes_stream();

        Ok(Box::pin(async_stream::try_stream! {
            let mut lines = SseLines::default();
            let mut calls = ToolCallAccumulator::default();
            let mut usage = Usage::default();

            'read: while let Some(chunk) = bytes.next().await {
                let chunk = chunk?;
                for data in lines.push(&chunk) {
                    if data == "[DONE]" {
                        break 'read;
                    }
                    let event = parse_event(&data)?;
                    if event.get("usage").is_some_and(Value::is_object) {
                        usage = OpenAiProvider::get_usage(&event);
                    }

                    let delta = &event["choices"][0]["delta"];
                    if let Some(text) = delta.get("content").and_then(Value::as_str) {
                        if !text.is_empty() {
                            yield ProviderChunk::Text(text.to_string());
                        }
                    }
                    if let Some(fragments) = delta.get("tool_calls").and_then(Value::as_array) {
                        calls.extend(fragments);
                    }
                }
            }

            for request in calls.finish() {
                yield ProviderChunk::ToolRequest(request);
            }
            yield ProviderChunk::Usage(usage);
        }))
    }
}

fn parse_event(data: &str) -> Result<Value> {
    let event: Value =
        serde_json::from_str(data).map_err(|e| anyhow!("Malformed stream chunk: {}", e))?;
    match event.get("error") {
        Some(error) => Err(anyhow!("OpenAI API error: {}", error)),
        None => Ok(event),
    }
}

/// Splits a server-sent event byte stream into `data:` payloads.
#[derive(Default)]
struct SseLines {
    buffer: Vec<u8>,
}

impl SseLines {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut data = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(payload) = line.strip_prefix("data:") {
                data.push(payload.trim_start().to_string());
            }
        }
        data
    }
}

#[derive(Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

/// Tool calls arrive as fragments keyed by index; names and arguments are concatenated.
#[derive(Default)]
struct ToolCallAccumulator {
    calls: BTreeMap<u64, PartialToolCall>,
}

impl ToolCallAccumulator {
    fn extend(&mut self, fragments: &[Value]) {
        for fragment in fragments {
            let index = fragment["index"].as_u64().unwrap_or(0);
            let call = self.calls.entry(index).or_default();
            if let Some(id) = fragment["id"].as_str() {
                call.id.push_str(id);
            }
            if let Some(name) = fragment["function"]["name"].as_str() {
                call.name.push_str(name);
            }
            if let Some(arguments) = fragment["function"]["arguments"].as_str() {
                call.arguments.push_str(arguments);
            }
        }
    }

    fn finish(self) -> Vec<super::base::ToolRequest> {
        self.calls
            .into_values()
            .map(|call| tool_request(call.id, &call.name, &call.arguments))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(host: String) -> OpenAiProviderConfig {
        OpenAiProviderConfig {
            host,
            api_key: "test_api_key".to_string(),
            model: "gpt-4o".to_string(),
            temperature: Some(0.7),
            max_tokens: None,
        }
    }

    async fn _setup_mock_server(response: ResponseTemplate) -> (MockServer, OpenAiProvider) {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer test_api_key"))
            .respond_with(response)
            .mount(&mock_server)
            .await;

        let provider = OpenAiProvider::new(config(mock_server.uri())).unwrap();
        (mock_server, provider)
    }

    #[tokio::test]
    async fn test_complete_basic() -> Result<()> {
        let response_body = json!({
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": "Hello! How can I assist you today?",
                    "tool_calls": null
                },
                "finish_reason": "stop"
            }],
            "usage": {
                "prompt_tokens": 12,
                "completion_tokens": 15,
                "total_tokens": 27
            }
        });

        let (_server, provider) =
            _setup_mock_server(ResponseTemplate::new(200).set_body_json(response_body)).await;

        let messages = vec![Message::user().with_text("Hello?")];
        let (message, usage) = provider
            .complete("You are a helpful assistant.", &messages, &[])
            .await?;

        assert_eq!(message.text, "Hello! How can I assist you today?");
        assert_eq!(usage, Usage::new(Some(12), Some(15), Some(27)));
        Ok(())
    }

    #[tokio::test]
    async fn test_complete_tool_request() -> Result<()> {
        let response_body = json!({
            "id": "chatcmpl-tool",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_123",
                        "type": "function",
                        "function": {
                            "name": "resolve_entity",
                            "arguments": "{\"query\":\"BMW\"}"
                        }
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {
                "prompt_tokens": 20,
                "completion_tokens": 15,
                "total_tokens": 35
            }
        });

        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({
                "model": "gpt-4o",
                "tools": [{"type": "function", "function": {"name": "resolve_entity"}}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(response_body))
            .mount(&mock_server)
            .await;
        let provider = OpenAiProvider::new(config(mock_server.uri()))?;

        let tool = Tool::new(
            "resolve_entity",
            "Resolve a company name",
            json!({
                "type": "object",
                "properties": {"query": {"type": "string"}},
                "required": ["query"]
            }),
        );
        let messages = vec![Message::user().with_text("Pitching BMW tomorrow")];
        let (message, usage) = provider
            .complete("You are a DCM assistant.", &messages, &[tool])
            .await?;

        let request = &message.tool_requests[0];
        assert_eq!(request.id, "call_123");
        assert_eq!(request.name, "resolve_entity");
        assert_eq!(request.arguments, Ok(json!({"query": "BMW"})));
        assert_eq!(usage.total_tokens, Some(35));
        Ok(())
    }

    #[tokio::test]
    async fn test_rate_limit_is_server_error() {
        let (_server, provider) = _setup_mock_server(ResponseTemplate::new(429)).await;
        let err = provider
            .complete("system", &[Message::user().with_text("hi")], &[])
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Server error: 429"));
    }

    #[tokio::test]
    async fn test_bad_request_fails() {
        let (_server, provider) = _setup_mock_server(ResponseTemplate::new(400)).await;
        let err = provider
            .complete("system", &[Message::user().with_text("hi")], &[])
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Request failed: 400"));
    }

    #[tokio::test]
    async fn test_stream_text_and_tool_fragments() -> Result<()> {
        let body = [
            r#"data: {"choices":[{"index":0,"delta":{"role":"assistant","content":"Let me "}}]}"#,
            r#"data: {"choices":[{"index":0,"delta":{"content":"check."}}]}"#,
            r#"data: {"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"id":"call_1","type":"function","function":{"name":"query_data","arguments":""}}]}}]}"#,
            r#"data: {"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"dataSource\":"}}]}}]}"#,
            r#"data: {"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"function":{"arguments":"\"employees\"}"}}]}}]}"#,
            r#"data: {"choices":[{"index":0,"delta":{},"finish_reason":"tool_calls"}]}"#,
            r#"data: {"choices":[],"usage":{"prompt_tokens":30,"completion_tokens":9,"total_tokens":39}}"#,
            "data: [DONE]",
            "",
        ]
        .join("\n\n");

        let (_server, provider) = _setup_mock_server(
            ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"),
        )
        .await;

        let chunks: Vec<ProviderChunk> = provider
            .stream("system", &[Message::user().with_text("engineers?")], &[])
            .await?
            .try_collect()
            .await?;

        assert_eq!(chunks[0], ProviderChunk::Text("Let me ".to_string()));
        assert_eq!(chunks[1], ProviderChunk::Text("check.".to_string()));
        match &chunks[2] {
            ProviderChunk::ToolRequest(request) => {
                assert_eq!(request.id, "call_1");
                assert_eq!(request.arguments, Ok(json!({"dataSource": "employees"})));
            }
            other => panic!("Expected tool request, got {:?}", other),
        }
        assert_eq!(
            chunks[3],
            ProviderChunk::Usage(Usage::new(Some(30), Some(9), Some(39)))
        );
        assert_eq!(chunks.len(), 4);
        Ok(())
    }

    #[test]
    fn test_sse_lines_across_chunks() {
        let mut lines = SseLines::default();
        assert!(lines.push(b"data: {\"a\"").is_empty());
        assert_eq!(lines.push(b":1}\r\n\r\ndata: [DONE]\n"), vec!["{\"a\":1}", "[DONE]"]);
    }
}
