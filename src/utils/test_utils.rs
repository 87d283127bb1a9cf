use crate::api::{ApiError, Content, GenerationConfig};
use crate::core::chat_client::{ChatSession, ModelApi};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

pub fn test_generation_config() -> GenerationConfig {
    GenerationConfig {
        temperature: 0.9,
        top_p: 0.95,
        top_k: 40,
        max_output_tokens: 8192,
    }
}

pub fn rate_limited() -> ApiError {
    ApiError::RateLimited {
        status: 429,
        message: "Resource has been exhausted (e.g. check quota).".to_string(),
    }
}

#[derive(Default)]
struct FakeState {
    scripts: HashMap<String, VecDeque<Result<String, ApiError>>>,
    started: Vec<String>,
    sent: Vec<(String, String)>,
}

/// In-memory model API. Clones share state so tests can inspect calls.
///
/// Keys starting with `bad` are refused by `start_chat`. Unscripted sends
/// reply with `"<key> says: <text>"`.
#[derive(Clone, Default)]
pub struct FakeModelApi {
    state: Arc<Mutex<FakeState>>,
}

impl FakeModelApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the outcome of the next send made with `credential`.
    pub fn script(&self, credential: &str, outcome: Result<String, ApiError>) {
        self.state
            .lock()
            .unwrap()
            .scripts
            .entry(credential.to_string())
            .or_default()
            .push_back(outcome);
    }

    pub fn started(&self) -> Vec<String> {
        self.state.lock().unwrap().started.clone()
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().sent.clone()
    }
}

impl ModelApi for FakeModelApi {
    type Session = FakeSession;

    fn start_chat(
        &self,
        credential: &str,
        _config: &GenerationConfig,
    ) -> Result<FakeSession, ApiError> {
        if credential.starts_with("bad") {
            return Err(ApiError::InvalidCredential(
                "rejected by test API".to_string(),
            ));
        }
        self.state
            .lock()
            .unwrap()
            .started
            .push(credential.to_string());
        Ok(FakeSession {
            credential: credential.to_string(),
            state: Arc::clone(&self.state),
            history: Vec::new(),
        })
    }
}

pub struct FakeSession {
    credential: String,
    state: Arc<Mutex<FakeState>>,
    history: Vec<Content>,
}

#[async_trait]
impl ChatSession for FakeSession {
    async fn send(&mut self, text: &str) -> Result<String, ApiError> {
        let outcome = {
            let mut state = self.state.lock().unwrap();
            state
                .sent
                .push((self.credential.clone(), text.to_string()));
            state
                .scripts
                .get_mut(&self.credential)
                .and_then(|queue| queue.pop_front())
        };

        let reply = outcome.unwrap_or_else(|| Ok(format!("{} says: {text}", self.credential)))?;
        self.history.push(Content::user(text));
        self.history.push(Content::model(reply.clone()));
        Ok(reply)
    }

    fn history(&self) -> &[Content] {
        &self.history
    }
}
