use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Where the API key pool is persisted between runs.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CredentialStorage {
    /// A single secret in the platform keyring
    #[default]
    Keyring,
    /// `keys.json` next to the config file
    File,
}

impl CredentialStorage {
    pub fn as_str(self) -> &'static str {
        match self {
            CredentialStorage::Keyring => "keyring",
            CredentialStorage::File => "file",
        }
    }
}

impl fmt::Display for CredentialStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CredentialStorage {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "keyring" => Ok(CredentialStorage::Keyring),
            "file" => Ok(CredentialStorage::File),
            other => Err(format!(
                "unknown credential storage '{other}' (expected 'keyring' or 'file')"
            )),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    /// Model identifier, e.g. "gemini-1.5-pro-002"
    pub model: Option<String>,
    /// API root, without the `/models/...` suffix
    pub base_url: Option<String>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    pub max_output_tokens: Option<u32>,
    /// Key rotations allowed for a single message before giving up
    pub max_retries: Option<u32>,
    pub credential_storage: Option<CredentialStorage>,
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
///
/// # Examples
/// - Unix: `/home/user/.config/gemchat/config.toml` → `~/.config/gemchat/config.toml`
/// - macOS: `/Users/user/Library/Application Support/...` → `~/Library/Application Support/...`
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}

/// Keys accepted by `gemchat set` / `gemchat unset`.
pub const SETTABLE_KEYS: &[&str] = &["model", "base-url", "max-retries", "storage"];

impl Config {
    /// Applies a `gemchat set <key> <value>` assignment.
    pub fn set_key(&mut self, key: &str, value: &str) -> Result<(), String> {
        let value = value.trim();
        if value.is_empty() {
            return Err(format!("a value is required for '{key}'"));
        }
        match key {
            "model" => self.model = Some(value.to_string()),
            "base-url" => self.base_url = Some(value.trim_end_matches('/').to_string()),
            "max-retries" => {
                let parsed = value
                    .parse::<u32>()
                    .map_err(|_| format!("max-retries must be a non-negative integer, got '{value}'"))?;
                self.max_retries = Some(parsed);
            }
            "storage" => self.credential_storage = Some(value.parse()?),
            other => return Err(unknown_key(other)),
        }
        Ok(())
    }

    /// Reverts a key to its built-in default.
    pub fn unset_key(&mut self, key: &str) -> Result<(), String> {
        match key {
            "model" => self.model = None,
            "base-url" => self.base_url = None,
            "max-retries" => self.max_retries = None,
            "storage" => self.credential_storage = None,
            other => return Err(unknown_key(other)),
        }
        Ok(())
    }
}

fn unknown_key(key: &str) -> String {
    format!(
        "Unknown config key: {key} (expected one of: {})",
        SETTABLE_KEYS.join(", ")
    )
}
