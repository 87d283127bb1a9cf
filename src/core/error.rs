use std::error::Error;
use std::fmt;

/// Failures surfaced by the credential store and the session controller.
///
/// Every variant renders as user-facing text; the front end prints
/// `to_string()` directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// Malformed credential submission. The pool is left unchanged.
    InvalidInput(String),

    /// Rotation was requested with at most one credential in the pool.
    NoAlternateCredentials,

    /// A message was sent before any session was bound.
    NotInitialized,

    /// The outbound text was empty or whitespace only.
    EmptyMessage,

    /// The remote API refused to start a session for the current credential.
    InitializationFailed(String),

    /// Terminal failure of a message exchange. Carries the provider message.
    SendFailed(String),

    /// The new credential pool could not be written to durable storage.
    PersistFailed(String),
}

impl ChatError {
    /// True for errors the caller can fix by supplying credentials.
    pub fn needs_credentials(&self) -> bool {
        matches!(
            self,
            ChatError::NotInitialized | ChatError::InitializationFailed(_)
        )
    }
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::InvalidInput(reason) => write!(f, "Invalid API keys: {reason}"),
            ChatError::NoAlternateCredentials => write!(f, "No alternative API keys available"),
            ChatError::NotInitialized => {
                write!(f, "Chat not initialized. Please add API keys first.")
            }
            ChatError::EmptyMessage => write!(f, "Message cannot be empty"),
            ChatError::InitializationFailed(reason) => write!(
                f,
                "Failed to initialize chat. Please check your API key. ({reason})"
            ),
            ChatError::SendFailed(message) => write!(f, "{message}"),
            ChatError::PersistFailed(reason) => {
                write!(f, "Failed to save API keys: {reason}")
            }
        }
    }
}

impl Error for ChatError {}
