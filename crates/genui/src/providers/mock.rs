use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::models::message::Message;
use crate::models::tool::Tool;
use crate::providers::base::{ModelResponse, Provider, Usage};

/// What a scripted turn does.
#[derive(Debug, Clone)]
pub enum MockTurn {
    Respond(ModelResponse),
    Fail(String),
}

/// A mock provider that returns pre-configured responses, for tests and local demos.
/// It records the context of every call so tests can check what the model saw.
#[derive(Clone, Default)]
pub struct MockProvider {
    turns: Arc<Mutex<VecDeque<MockTurn>>>,
    repeat: Option<ModelResponse>,
    seen: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of responses
    pub fn new(responses: Vec<ModelResponse>) -> Self {
        Self::scripted(responses.into_iter().map(MockTurn::Respond).collect())
    }

    pub fn scripted(turns: Vec<MockTurn>) -> Self {
        Self {
            turns: Arc::new(Mutex::new(turns.into())),
            ..Default::default()
        }
    }

    /// A provider that gives the same response forever.
    pub fn repeating(response: ModelResponse) -> Self {
        Self {
            repeat: Some(response),
            ..Default::default()
        }
    }

    /// The message lists passed to each completion, in call order.
    pub async fn seen(&self) -> Vec<Vec<Message>> {
        self.seen.lock().await.clone()
    }

    pub async fn calls(&self) -> usize {
        self.seen.lock().await.len()
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(
        &self,
        _system: &str,
        messages: &[Message],
        _tools: &[Tool],
    ) -> Result<(ModelResponse, Usage)> {
        self.seen.lock().await.push(messages.to_vec());
        let usage = Usage::new(Some(10), Some(5), Some(15));

        if let Some(response) = &self.repeat {
            return Ok((response.clone(), usage));
        }
        match self.turns.lock().await.pop_front() {
            Some(MockTurn::Respond(response)) => Ok((response, usage)),
            Some(MockTurn::Fail(reason)) => Err(anyhow!(reason)),
            // Return empty response if no more pre-configured responses
            None => Ok((ModelResponse::default(), usage)),
        }
    }
}
