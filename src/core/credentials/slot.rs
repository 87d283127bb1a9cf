use std::error::Error;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use tempfile::NamedTempFile;

use super::keyring::KeyringAccessError;
use crate::core::config::data::path_display;

/// A single named location holding the serialized credential pool.
///
/// The slot stores opaque text; encoding the pool is the store's concern.
pub trait CredentialSlot: Send {
    /// Returns `Ok(None)` when nothing has been saved yet.
    fn read(&self) -> Result<Option<String>, SlotError>;
    /// Replaces the slot contents wholesale.
    fn write(&self, contents: &str) -> Result<(), SlotError>;
    /// Human readable location, used in diagnostics.
    fn describe(&self) -> String;
    /// Whether writes outlive the process.
    fn is_durable(&self) -> bool {
        true
    }
}

#[derive(Debug)]
pub enum SlotError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Keyring(KeyringAccessError),
}

impl fmt::Display for SlotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotError::Io { path, source } => {
                write!(f, "{}: {}", path_display(path), source)
            }
            SlotError::Keyring(err) => write!(f, "keyring: {err}"),
        }
    }
}

impl Error for SlotError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SlotError::Io { source, .. } => Some(source),
            SlotError::Keyring(err) => Some(err),
        }
    }
}

/// JSON file on disk, replaced atomically on every write.
pub struct FileSlot {
    path: PathBuf,
}

impl FileSlot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn io_error(&self, source: std::io::Error) -> SlotError {
        SlotError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl CredentialSlot for FileSlot {
    fn read(&self) -> Result<Option<String>, SlotError> {
        if !self.path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&self.path)
            .map(Some)
            .map_err(|err| self.io_error(err))
    }

    fn write(&self, contents: &str) -> Result<(), SlotError> {
        let parent = self
            .path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty());

        if let Some(dir) = parent {
            fs::create_dir_all(dir).map_err(|err| self.io_error(err))?;
        }

        let mut temp_file = match parent {
            Some(dir) => NamedTempFile::new_in(dir),
            None => NamedTempFile::new(),
        }
        .map_err(|err| self.io_error(err))?;

        temp_file
            .write_all(contents.as_bytes())
            .map_err(|err| self.io_error(err))?;

        // API keys: owner read/write only
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            temp_file
                .as_file()
                .set_permissions(fs::Permissions::from_mode(0o600))
                .map_err(|err| self.io_error(err))?;
        }

        temp_file
            .as_file_mut()
            .sync_all()
            .map_err(|err| self.io_error(err))?;
        temp_file
            .persist(&self.path)
            .map_err(|err| self.io_error(err.error))?;
        Ok(())
    }

    fn describe(&self) -> String {
        path_display(&self.path)
    }
}

/// In-process slot. Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct MemorySlot {
    contents: Arc<Mutex<Option<String>>>,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(contents: impl Into<String>) -> Self {
        Self {
            contents: Arc::new(Mutex::new(Some(contents.into()))),
        }
    }

    pub fn contents(&self) -> Option<String> {
        self.contents.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl CredentialSlot for MemorySlot {
    fn read(&self) -> Result<Option<String>, SlotError> {
        Ok(self.contents())
    }

    fn write(&self, contents: &str) -> Result<(), SlotError> {
        *self.contents.lock().unwrap_or_else(PoisonError::into_inner) = Some(contents.to_string());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }

    fn is_durable(&self) -> bool {
        false
    }
}
