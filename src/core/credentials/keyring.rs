use std::error::Error;
use std::fmt;

use keyring::Entry;

use super::slot::{CredentialSlot, SlotError};

const KEYRING_SERVICE: &str = "gemchat";
const KEYRING_USER: &str = "api-keys";

/// Describes failures when attempting to access the system keyring.
///
/// Recoverable errors indicate that the credential backend was
/// temporarily unavailable (for example when the keychain service is
/// locked). Permanent errors surface the underlying cause directly.
#[derive(Debug)]
pub enum KeyringAccessError {
    Recoverable(keyring::Error),
    Permanent(keyring::Error),
}

impl KeyringAccessError {
    fn inner(&self) -> &keyring::Error {
        match self {
            KeyringAccessError::Recoverable(err) | KeyringAccessError::Permanent(err) => err,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, KeyringAccessError::Recoverable(_))
    }
}

impl From<keyring::Error> for KeyringAccessError {
    fn from(err: keyring::Error) -> Self {
        match err {
            keyring::Error::PlatformFailure(_) | keyring::Error::NoStorageAccess(_) => {
                KeyringAccessError::Recoverable(err)
            }
            other => KeyringAccessError::Permanent(other),
        }
    }
}

impl fmt::Display for KeyringAccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner())
    }
}

impl Error for KeyringAccessError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.inner())
    }
}

/// Stores the serialized pool as a single secret in the OS keyring.
pub struct KeyringSlot {
    service: String,
    user: String,
}

impl KeyringSlot {
    pub fn new() -> Self {
        Self::with_names(KEYRING_SERVICE, KEYRING_USER)
    }

    pub fn with_names(service: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            user: user.into(),
        }
    }

    fn entry(&self) -> Result<Entry, SlotError> {
        Entry::new(&self.service, &self.user)
            .map_err(|err| SlotError::Keyring(KeyringAccessError::from(err)))
    }
}

impl Default for KeyringSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialSlot for KeyringSlot {
    fn read(&self) -> Result<Option<String>, SlotError> {
        match self.entry()?.get_password() {
            Ok(contents) => Ok(Some(contents)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(SlotError::Keyring(KeyringAccessError::from(err))),
        }
    }

    fn write(&self, contents: &str) -> Result<(), SlotError> {
        self.entry()?
            .set_password(contents)
            .map_err(|err| SlotError::Keyring(KeyringAccessError::from(err)))
    }

    fn describe(&self) -> String {
        format!("system keyring ({}/{})", self.service, self.user)
    }
}
