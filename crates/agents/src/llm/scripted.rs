//! A deterministic [`LanguageModel`] that replays queued responses.
//!
//! Used by tests and offline demos. Every request is recorded so callers can
//! assert on what was sent.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{AgentError, Result};
use crate::llm::client::LanguageModel;
use crate::llm::types::{ChatRequest, LlmResponse};

#[derive(Default)]
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Result<LlmResponse>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, response: LlmResponse) -> &Self {
        self.responses.lock().push_back(Ok(response));
        self
    }

    pub fn push_text(&self, text: impl Into<String>) -> &Self {
        self.push(LlmResponse::Text(text.into()))
    }

    pub fn push_error(&self, reason: impl Into<String>) -> &Self {
        self.responses
            .lock()
            .push_back(Err(AgentError::LlmRequestFailed {
                reason: reason.into(),
            }));
        self
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn chat(&self, request: &ChatRequest) -> Result<LlmResponse> {
        self.requests.lock().push(request.clone());
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| {
                Err(AgentError::LlmRequestFailed {
                    reason: "scripted model has no responses left".into(),
                })
            })
    }
}
