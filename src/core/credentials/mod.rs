//! Durable custody of the API key pool.
//!
//! The pool is an ordered list of raw credential strings plus a cursor that
//! marks the key currently in use. Only the list is persisted: the cursor is
//! runtime state that moves when a key gets rate limited and always starts
//! at zero after a restart.

pub mod keyring;
pub mod slot;

use tracing::{debug, warn};

use crate::core::error::ChatError;

pub use self::keyring::{KeyringAccessError, KeyringSlot};
pub use self::slot::{CredentialSlot, FileSlot, MemorySlot, SlotError};

pub struct CredentialStore {
    keys: Vec<String>,
    current: usize,
    slot: Box<dyn CredentialSlot>,
}

impl CredentialStore {
    /// Creates an empty store backed by `slot`. Nothing is read until
    /// [`CredentialStore::load_persisted`] runs.
    pub fn new(slot: Box<dyn CredentialSlot>) -> Self {
        Self {
            keys: Vec::new(),
            current: 0,
            slot,
        }
    }

    /// Replaces the pool, persisting it first so a failed write leaves
    /// both the slot and the in-memory pool untouched.
    pub fn set_credentials(&mut self, keys: Vec<String>) -> Result<(), ChatError> {
        validate_keys(&keys)?;

        let encoded = serde_json::to_string(&keys)
            .map_err(|err| ChatError::InvalidInput(err.to_string()))?;
        self.slot
            .write(&encoded)
            .map_err(|err| ChatError::PersistFailed(err.to_string()))?;

        debug!(
            count = keys.len(),
            slot = %self.slot.describe(),
            "Replaced credential pool"
        );
        self.keys = keys;
        self.current = 0;
        Ok(())
    }

    pub fn credentials(&self) -> &[String] {
        &self.keys
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> Option<&str> {
        self.keys.get(self.current).map(String::as_str)
    }

    /// False when saved keys are lost at exit, as with `--env-only`.
    pub fn is_durable(&self) -> bool {
        self.slot.is_durable()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Moves the cursor to the next key, wrapping at the end of the pool.
    pub fn advance(&mut self) -> Result<usize, ChatError> {
        if self.keys.len() <= 1 {
            return Err(ChatError::NoAlternateCredentials);
        }
        self.current = (self.current + 1) % self.keys.len();
        debug!(index = self.current, "Advanced to next credential");
        Ok(self.current)
    }

    /// Restores the pool from the slot.
    ///
    /// Never fails: an unreadable or corrupt slot yields an empty pool and a
    /// warning, so startup proceeds without credentials.
    pub fn load_persisted(&mut self) {
        self.current = 0;
        self.keys = match self.slot.read() {
            Ok(Some(contents)) => match decode_keys(&contents) {
                Ok(keys) => keys,
                Err(reason) => {
                    warn!(slot = %self.slot.describe(), %reason, "Discarding saved API keys");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(err) => {
                warn!(slot = %self.slot.describe(), error = %err, "Failed to load saved API keys");
                Vec::new()
            }
        };
        debug!(count = self.keys.len(), "Loaded persisted credentials");
    }
}

fn validate_keys(keys: &[String]) -> Result<(), ChatError> {
    if keys.is_empty() {
        return Err(ChatError::InvalidInput(
            "please provide at least one API key".to_string(),
        ));
    }
    if let Some(position) = keys.iter().position(|key| key.trim().is_empty()) {
        return Err(ChatError::InvalidInput(format!(
            "key #{} is blank",
            position + 1
        )));
    }
    Ok(())
}

fn decode_keys(contents: &str) -> Result<Vec<String>, String> {
    let keys: Vec<String> = serde_json::from_str(contents).map_err(|err| err.to_string())?;
    validate_keys(&keys).map_err(|err| err.to_string())?;
    Ok(keys)
}

/// Splits user input such as `"k1, k2,,k3"` into a key list.
pub fn parse_key_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .collect()
}

/// Shortens a key for display, keeping only its last four characters.
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("…{tail}")
}
