use anyhow::{anyhow, Result};
use futures::stream::{BoxStream, StreamExt};
use genui::models::message::Message;
use genui::protocol::{Frame, FrameDecoder};
use reqwest::{Client, StatusCode};
use serde_json::json;

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Workflow {
    /// Tabular data assistant
    Chat,
    /// Debt capital markets assistant
    Dcm,
}

impl Workflow {
    pub fn path(self) -> &'static str {
        match self {
            Workflow::Chat => "/api/chat",
            Workflow::Dcm => "/api/dcm/chat",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Workflow::Chat => "chat",
            Workflow::Dcm => "dcm",
        }
    }
}

/// Talks to a running `genuid`.
pub struct ChatClient {
    http: Client,
    base_url: String,
    workflow: Workflow,
}

impl ChatClient {
    pub fn new(base_url: &str, workflow: Workflow) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            workflow,
        }
    }

    pub fn workflow(&self) -> Workflow {
        self.workflow
    }

    pub async fn verify_password(&self, password: &str) -> Result<bool> {
        let response = self
            .http
            .post(format!("{}/api/auth/verify", self.base_url))
            .json(&json!({ "password": password }))
            .send()
            .await?;
        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::UNAUTHORIZED => Ok(false),
            status => Err(anyhow!("Request failed: {}", status)),
        }
    }

    /// Submit the whole conversation and stream back the reply frames as they arrive.
    pub async fn send(&self, messages: &[Message]) -> Result<BoxStream<'static, Result<Frame>>> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, self.workflow.path()))
            .header("x-protocol", "data")
            .json(&json!({ "messages": messages }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Request failed: {}", status));
        }

        let mut bytes = response.bytes_stream();
        Ok(Box::pin(async_stream::try_stream! {
            let mut decoder = FrameDecoder::new();
            while let Some(chunk) = bytes.next().await {
                let chunk = chunk?;
                for frame in decoder.push(&chunk)? {
                    yield frame;
                }
            }
            if let Some(frame) = decoder.finish()? {
                yield frame;
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_send_decodes_frames() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/dcm/chat"))
            .and(header("x-protocol", "data"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "f:{\"messageId\":\"m1\"}\n0:\"Hello\"\nd:{\"finishReason\":\"stop\",\"usage\":{\"promptTokens\":1,\"completionTokens\":1}}\n",
            ))
            .mount(&server)
            .await;

        let client = ChatClient::new(&server.uri(), Workflow::Dcm);
        let frames: Vec<Frame> = client
            .send(&[Message::user().with_text("hi")])
            .await?
            .try_collect()
            .await?;

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[1], Frame::Text("Hello".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn test_send_reports_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let client = ChatClient::new(&server.uri(), Workflow::Chat);
        let err = client.send(&[]).await.err().unwrap();
        assert!(err.to_string().starts_with("Request failed: 400"));
    }

    #[tokio::test]
    async fn test_verify_password() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/verify"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = ChatClient::new(&server.uri(), Workflow::Chat);
        assert!(!client.verify_password("guess").await?);
        Ok(())
    }
}
