use crate::core::message::{ChatMessage, Role};
use std::error::Error;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// Plain-text transcript written alongside the chat (`--log <file>`).
///
/// User lines are prefixed with `You:`, assistant replies are written as-is,
/// and session notes get a `##` prefix. Each entry ends with a blank line.
pub struct TranscriptLog {
    file_path: Option<PathBuf>,
}

impl TranscriptLog {
    pub fn disabled() -> Self {
        Self { file_path: None }
    }

    /// Opens (or creates) `path` for appending, failing early if it is not
    /// writable.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, Box<dyn Error>> {
        let path = path.into();
        OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            file_path: Some(path),
        })
    }

    pub fn from_option(path: Option<String>) -> Result<Self, Box<dyn Error>> {
        match path {
            Some(path) => Self::open(path),
            None => Ok(Self::disabled()),
        }
    }

    pub fn log_message(&self, message: &ChatMessage) -> Result<(), Box<dyn Error>> {
        match message.role {
            Role::User => self.write_entry(&format!("You: {}", message.content)),
            Role::Assistant => self.write_entry(&message.content),
        }
    }

    pub fn log_note(&self, note: &str) -> Result<(), Box<dyn Error>> {
        self.write_entry(&format!("## {note}"))
    }

    fn write_entry(&self, content: &str) -> Result<(), Box<dyn Error>> {
        let Some(file_path) = self.file_path.as_ref() else {
            return Ok(());
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;
        let mut writer = BufWriter::new(file);

        for line in content.lines() {
            writeln!(writer, "{line}")?;
        }
        writeln!(writer)?;

        writer.flush()?;
        Ok(())
    }
}
