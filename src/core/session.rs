//! Owns the live conversation and recovers from rate limits by rotating keys.
//!
//! The controller is either unbound (no usable key) or bound to exactly one
//! session created from `credentials[current_index]`. Rebinding always starts
//! a new session with empty history; earlier turns are not replayed.

use tracing::{debug, info, warn};

use crate::api::GenerationConfig;
use crate::core::chat_client::{ChatSession, ModelApi};
use crate::core::credentials::CredentialStore;
use crate::core::error::ChatError;

pub enum BoundSession<S> {
    Unbound,
    Bound { credential_index: usize, session: S },
}

impl<S> BoundSession<S> {
    pub fn is_bound(&self) -> bool {
        matches!(self, BoundSession::Bound { .. })
    }
}

pub struct SessionController<A: ModelApi> {
    store: CredentialStore,
    api: A,
    generation: GenerationConfig,
    max_retries: u32,
    retry_count: u32,
    session: BoundSession<A::Session>,
}

impl<A: ModelApi> SessionController<A> {
    /// Creates an unbound controller. The store is used as-is.
    pub fn new(store: CredentialStore, api: A, generation: GenerationConfig, max_retries: u32) -> Self {
        Self {
            store,
            api,
            generation,
            max_retries,
            retry_count: 0,
            session: BoundSession::Unbound,
        }
    }

    /// Loads the persisted pool and binds a session when keys were found.
    ///
    /// A key the API refuses at startup is logged, not returned: the
    /// controller stays unbound until new keys are supplied.
    pub fn restore(
        mut store: CredentialStore,
        api: A,
        generation: GenerationConfig,
        max_retries: u32,
    ) -> Self {
        store.load_persisted();
        let mut controller = Self::new(store, api, generation, max_retries);
        if let Err(err) = controller.bind() {
            warn!(error = %err, "Saved API keys could not start a chat session");
        }
        controller
    }

    /// Replaces the key pool and binds a session to its first key.
    pub fn set_credentials(&mut self, keys: Vec<String>) -> Result<(), ChatError> {
        self.store.set_credentials(keys)?;
        self.bind()
    }

    pub fn credentials(&self) -> &[String] {
        self.store.credentials()
    }

    pub fn current_index(&self) -> usize {
        self.store.current_index()
    }

    /// Whether `set_credentials` survives a restart.
    pub fn persists_credentials(&self) -> bool {
        self.store.is_durable()
    }

    pub fn is_ready(&self) -> bool {
        self.session.is_bound()
    }

    /// Index of the key the live session was created with.
    pub fn bound_index(&self) -> Option<usize> {
        match &self.session {
            BoundSession::Bound {
                credential_index, ..
            } => Some(*credential_index),
            BoundSession::Unbound => None,
        }
    }

    /// Rotations performed by the most recent `send_message` call.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Number of turns (user and model) in the live session.
    pub fn history_len(&self) -> usize {
        match &self.session {
            BoundSession::Bound { session, .. } => session.history().len(),
            BoundSession::Unbound => 0,
        }
    }

    /// Sends `text` and returns the reply.
    ///
    /// Rate-limited attempts rotate to the next key and retry the same text,
    /// at most `max_retries` times. Attempts run strictly one after another.
    pub async fn send_message(&mut self, text: &str) -> Result<String, ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        self.retry_count = 0;

        loop {
            let BoundSession::Bound {
                credential_index,
                session,
            } = &mut self.session
            else {
                return Err(ChatError::NotInitialized);
            };
            let attempted_index = *credential_index;

            let failure = match session.send(text).await {
                Ok(reply) => {
                    self.retry_count = 0;
                    return Ok(reply);
                }
                Err(err) => err,
            };

            if !failure.is_rate_limited() {
                debug!(index = attempted_index, error = %failure, "Message exchange failed");
                return Err(ChatError::SendFailed(failure.to_string()));
            }
            if self.retry_count >= self.max_retries {
                warn!(
                    retries = self.retry_count,
                    "Rate limited after exhausting key rotations"
                );
                return Err(ChatError::SendFailed(failure.to_string()));
            }

            self.retry_count += 1;
            if let Err(err) = self.store.advance() {
                debug!(error = %err, "Rate limited with no alternate key");
                return Err(ChatError::SendFailed(failure.to_string()));
            }
            info!(
                from = attempted_index,
                to = self.store.current_index(),
                attempt = self.retry_count,
                "Rate limited; rotating API key"
            );
            self.bind()?;
        }
    }

    /// Starts over with the current key and an empty history.
    ///
    /// With no keys loaded this is a no-op and the controller stays unbound.
    pub fn reset(&mut self) -> Result<(), ChatError> {
        self.retry_count = 0;
        self.bind()
    }

    fn bind(&mut self) -> Result<(), ChatError> {
        self.session = BoundSession::Unbound;
        let Some(credential) = self.store.current() else {
            return Ok(());
        };
        let credential_index = self.store.current_index();
        let session = self
            .api
            .start_chat(credential, &self.generation)
            .map_err(|err| ChatError::InitializationFailed(err.to_string()))?;
        debug!(index = credential_index, "Bound new chat session");
        self.session = BoundSession::Bound {
            credential_index,
            session,
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::core::credentials::MemorySlot;
    use crate::utils::test_utils::{rate_limited, test_generation_config, FakeModelApi};

    fn keys(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn controller_with(api: &FakeModelApi, pool: &[&str]) -> SessionController<FakeModelApi> {
        let store = CredentialStore::new(Box::new(MemorySlot::new()));
        let mut controller = SessionController::new(store, api.clone(), test_generation_config(), 3);
        controller
            .set_credentials(keys(pool))
            .expect("credentials should be accepted");
        controller
    }

    #[test]
    fn set_credentials_binds_first_key() {
        let api = FakeModelApi::new();
        let controller = controller_with(&api, &["k1", "k2"]);

        assert_eq!(controller.credentials(), keys(&["k1", "k2"]).as_slice());
        assert_eq!(controller.current_index(), 0);
        assert_eq!(controller.bound_index(), Some(0));
        assert_eq!(api.started(), keys(&["k1"]));
    }

    #[test]
    fn empty_credentials_keep_previous_state() {
        let api = FakeModelApi::new();
        let mut controller = controller_with(&api, &["k1"]);

        let err = controller.set_credentials(Vec::new()).unwrap_err();

        assert!(matches!(err, ChatError::InvalidInput(_)));
        assert_eq!(controller.credentials(), keys(&["k1"]).as_slice());
        assert!(controller.is_ready());
    }

    #[tokio::test]
    async fn blank_messages_never_reach_the_api() {
        let api = FakeModelApi::new();
        let mut controller = controller_with(&api, &["k1"]);

        for text in ["", "   ", "\n\t"] {
            assert_eq!(
                controller.send_message(text).await,
                Err(ChatError::EmptyMessage)
            );
        }
        assert!(api.sent().is_empty());
    }

    #[tokio::test]
    async fn uninitialized_controller_rejects_messages() {
        let api = FakeModelApi::new();
        let store = CredentialStore::new(Box::new(MemorySlot::new()));
        let mut controller = SessionController::new(store, api.clone(), test_generation_config(), 3);

        assert!(!controller.is_ready());
        assert_eq!(
            controller.send_message("hi").await,
            Err(ChatError::NotInitialized)
        );
        assert!(api.sent().is_empty());
    }

    #[tokio::test]
    async fn successful_exchange_returns_reply_and_grows_history() {
        let api = FakeModelApi::new();
        let mut controller = controller_with(&api, &["k1"]);

        let reply = controller.send_message("hi").await.unwrap();

        assert_eq!(reply, "k1 says: hi");
        assert_eq!(controller.history_len(), 2);
        assert_eq!(controller.retry_count(), 0);
    }

    #[tokio::test]
    async fn rate_limit_rotates_to_next_key_and_retries() {
        let api = FakeModelApi::new();
        api.script("k1", Err(rate_limited()));
        let mut controller = controller_with(&api, &["k1", "k2"]);

        let reply = controller.send_message("hi").await.unwrap();

        assert_eq!(reply, "k2 says: hi");
        assert_eq!(controller.retry_count(), 0);
        assert_eq!(controller.current_index(), 1);
        assert_eq!(controller.bound_index(), Some(1));
        assert_eq!(
            api.sent(),
            vec![
                ("k1".to_string(), "hi".to_string()),
                ("k2".to_string(), "hi".to_string())
            ]
        );
        // the replacement session starts from scratch
        assert_eq!(controller.history_len(), 2);
    }

    #[tokio::test]
    async fn single_key_pool_surfaces_original_rate_limit() {
        let api = FakeModelApi::new();
        api.script("k1", Err(rate_limited()));
        let mut controller = controller_with(&api, &["k1"]);

        let err = controller.send_message("hi").await.unwrap_err();

        assert_eq!(err, ChatError::SendFailed(rate_limited().to_string()));
        assert_eq!(controller.current_index(), 0);
        assert_eq!(api.sent().len(), 1);
        assert!(controller.is_ready());
    }

    #[tokio::test]
    async fn retry_ceiling_stops_rotation() {
        let api = FakeModelApi::new();
        for key in ["k1", "k2", "k3", "k4"] {
            api.script(key, Err(rate_limited()));
        }
        let mut controller = controller_with(&api, &["k1", "k2", "k3", "k4"]);

        let err = controller.send_message("hi").await.unwrap_err();

        assert_eq!(err, ChatError::SendFailed(rate_limited().to_string()));
        assert_eq!(controller.retry_count(), 3);
        assert_eq!(controller.current_index(), 3);
        assert_eq!(api.sent().len(), 4);
        assert_eq!(api.started(), keys(&["k1", "k2", "k3", "k4"]));
    }

    #[tokio::test]
    async fn retry_budget_is_per_message() {
        let api = FakeModelApi::new();
        api.script("k1", Err(rate_limited()));
        api.script("k2", Err(rate_limited()));
        let store = CredentialStore::new(Box::new(MemorySlot::new()));
        let mut controller = SessionController::new(store, api.clone(), test_generation_config(), 1);
        controller.set_credentials(keys(&["k1", "k2"])).unwrap();

        assert!(controller.send_message("first").await.is_err());
        assert_eq!(controller.current_index(), 1);

        // k2's scripted failure is used up; the next message rotates again if needed
        assert_eq!(controller.send_message("second").await.unwrap(), "k2 says: second");
    }

    #[tokio::test]
    async fn non_rate_limit_failure_is_not_retried() {
        let api = FakeModelApi::new();
        let rejection = ApiError::Rejected {
            status: 400,
            message: "API key not valid.".to_string(),
        };
        api.script("k1", Err(rejection.clone()));
        let mut controller = controller_with(&api, &["k1", "k2"]);

        let err = controller.send_message("hi").await.unwrap_err();

        assert_eq!(err, ChatError::SendFailed(rejection.to_string()));
        assert_eq!(controller.current_index(), 0);
        assert_eq!(api.sent().len(), 1);
    }

    #[tokio::test]
    async fn rotation_into_unusable_key_leaves_controller_unbound() {
        let api = FakeModelApi::new();
        api.script("k1", Err(rate_limited()));
        let mut controller = controller_with(&api, &["k1", "bad-key"]);

        let err = controller.send_message("hi").await.unwrap_err();

        assert!(matches!(err, ChatError::InitializationFailed(_)));
        assert!(!controller.is_ready());
        assert_eq!(
            controller.send_message("hi").await,
            Err(ChatError::NotInitialized)
        );
    }

    #[test]
    fn unusable_first_key_fails_initialization() {
        let api = FakeModelApi::new();
        let store = CredentialStore::new(Box::new(MemorySlot::new()));
        let mut controller = SessionController::new(store, api, test_generation_config(), 3);

        let err = controller.set_credentials(keys(&["bad-key"])).unwrap_err();

        assert!(matches!(err, ChatError::InitializationFailed(_)));
        assert!(!controller.is_ready());
        assert_eq!(controller.credentials(), keys(&["bad-key"]).as_slice());
    }

    #[tokio::test]
    async fn reset_clears_history_but_keeps_key() {
        let api = FakeModelApi::new();
        api.script("k1", Err(rate_limited()));
        let mut controller = controller_with(&api, &["k1", "k2"]);
        controller.send_message("hi").await.unwrap();
        assert_eq!(controller.history_len(), 2);

        controller.reset().unwrap();
        controller.reset().unwrap();

        assert_eq!(controller.history_len(), 0);
        assert_eq!(controller.bound_index(), Some(1));
        assert_eq!(controller.credentials(), keys(&["k1", "k2"]).as_slice());
    }

    #[test]
    fn reset_without_keys_stays_unbound() {
        let store = CredentialStore::new(Box::new(MemorySlot::new()));
        let mut controller =
            SessionController::new(store, FakeModelApi::new(), test_generation_config(), 3);

        assert!(controller.reset().is_ok());
        assert!(!controller.is_ready());
    }

    #[test]
    fn restore_binds_persisted_keys() {
        let slot = MemorySlot::with_contents(r#"["k1","k2"]"#);
        let controller = SessionController::restore(
            CredentialStore::new(Box::new(slot)),
            FakeModelApi::new(),
            test_generation_config(),
            3,
        );

        assert!(controller.is_ready());
        assert_eq!(controller.current_index(), 0);
        assert_eq!(controller.credentials(), keys(&["k1", "k2"]).as_slice());
    }

    #[test]
    fn restore_with_corrupt_slot_starts_unbound() {
        let slot = MemorySlot::with_contents("{not json");
        let controller = SessionController::restore(
            CredentialStore::new(Box::new(slot)),
            FakeModelApi::new(),
            test_generation_config(),
            3,
        );

        assert!(!controller.is_ready());
        assert!(controller.credentials().is_empty());
    }
}
