//! Line-oriented interactive chat.
//!
//! Each input line is either a slash command or a message for the model.
//! Failures are printed and the loop keeps going; only `/quit` or end of
//! input stops it.

use std::error::Error;
use std::io::{self, Write};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::warn;

use crate::cli::keys::{apply_keys, print_key_status};
use crate::core::chat_client::ModelApi;
use crate::core::message::ChatMessage;
use crate::core::session::SessionController;
use crate::utils::logging::TranscriptLog;

const HELP_TEXT: &str = "Commands:\n  /reset              Start a new conversation\n  /keys               Show API key status\n  /keys KEY1,KEY2     Replace the API keys\n  /help               Show this help\n  /quit               Exit";

#[derive(Debug, PartialEq, Eq)]
pub enum ChatInput {
    Empty,
    Quit,
    Reset,
    Help,
    ShowKeys,
    SetKeys(String),
    Unknown(String),
    Message(String),
}

impl ChatInput {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return ChatInput::Empty;
        }
        let Some(command) = trimmed.strip_prefix('/') else {
            return ChatInput::Message(line.trim_end_matches(['\r', '\n']).to_string());
        };

        let (name, rest) = match command.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (command, ""),
        };
        match name {
            "quit" | "exit" | "q" => ChatInput::Quit,
            "reset" | "clear" => ChatInput::Reset,
            "help" | "?" => ChatInput::Help,
            "keys" if rest.is_empty() => ChatInput::ShowKeys,
            "keys" => ChatInput::SetKeys(rest.to_string()),
            other => ChatInput::Unknown(other.to_string()),
        }
    }
}

pub async fn run_chat<A: ModelApi>(
    controller: SessionController<A>,
    log: TranscriptLog,
) -> Result<(), Box<dyn Error>> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = io::stdout();
    run_repl(controller, stdin, &mut stdout, log).await
}

pub async fn run_repl<A, R, W>(
    mut controller: SessionController<A>,
    input: R,
    out: &mut W,
    log: TranscriptLog,
) -> Result<(), Box<dyn Error>>
where
    A: ModelApi,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();

    writeln!(out, "gemchat: type a message, or /help for commands.")?;
    if !controller.is_ready() {
        writeln!(
            out,
            "⚠️  No API keys configured. Use /keys KEY1,KEY2 to add some."
        )?;
    }

    loop {
        write!(out, "You: ")?;
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            writeln!(out)?;
            break;
        };

        match ChatInput::parse(&line) {
            ChatInput::Empty => continue,
            ChatInput::Quit => break,
            ChatInput::Help => writeln!(out, "{HELP_TEXT}")?,
            ChatInput::Unknown(name) => {
                writeln!(out, "Unknown command: /{name}. Type /help for commands.")?
            }
            ChatInput::ShowKeys => print_key_status(&controller, out)?,
            ChatInput::SetKeys(raw) => {
                if apply_keys(&mut controller, &raw, out)? {
                    writeln!(out, "Starting a new conversation.")?;
                }
            }
            ChatInput::Reset => {
                match controller.reset() {
                    Ok(()) => writeln!(out, "The conversation has been cleared.")?,
                    Err(err) => writeln!(out, "❌ {err}")?,
                }
                if let Err(err) = log.log_note("Chat reset") {
                    warn!(error = %err, "Failed to write transcript log");
                }
            }
            ChatInput::Message(text) => {
                match controller.send_message(&text).await {
                    Ok(reply) => {
                        writeln!(out, "\n{reply}\n")?;
                        let exchange = [ChatMessage::user(text), ChatMessage::assistant(reply)];
                        for message in &exchange {
                            if let Err(err) = log.log_message(message) {
                                warn!(error = %err, "Failed to write transcript log");
                            }
                        }
                    }
                    Err(err) => writeln!(out, "❌ Error: {err}")?,
                }
            }
        }
    }

    Ok(())
}
