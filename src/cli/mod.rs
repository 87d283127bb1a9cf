//! Command-line interface parsing and handling
//!
//! This module is the composition root: it loads configuration, picks the
//! credential slot, builds the Gemini client and the session controller, and
//! dispatches to the subcommand handlers.

pub mod chat;
pub mod keys;
pub mod model_list;
pub mod say;


use std::error::Error;
use std::io;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::core::chat_client::GeminiClient;
use crate::core::config::{Config, CredentialStorage};
use crate::core::credentials::{
    parse_key_list, CredentialSlot, CredentialStore, FileSlot, KeyringSlot, MemorySlot,
};
use crate::core::session::SessionController;
use crate::utils::logging::TranscriptLog;

const ENV_KEYS: &str = "GEMINI_API_KEYS";

#[derive(Parser)]
#[command(name = "gemchat")]
#[command(version)]
#[command(about = "A terminal chat client for the Gemini API with API key rotation")]
#[command(
    long_about = "gemchat is a line-oriented terminal chat client for Google's Gemini API.\n\
Several API keys can be registered; when one is rate limited (HTTP 429) the \
next key takes over and the message is retried.\n\n\
Getting started:\n\
  gemchat keys set KEY1,KEY2    Save one or more API keys\n\
  gemchat                       Start chatting\n\n\
Environment Variables:\n\
  GEMINI_API_KEYS     Comma-separated keys, used with --env-only\n\
  GEMCHAT_CONFIG_DIR  Override the configuration directory\n\
  RUST_LOG            Log filter for diagnostics on stderr (default: warn)\n\n\
Chat commands:\n\
  /reset              Start a new conversation\n\
  /keys [KEY1,KEY2]   Show key status, or replace the keys\n\
  /help               Show chat commands\n\
  /quit               Exit"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Model to chat with (overrides the configured model)
    #[arg(short = 'm', long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// Append the conversation to this file
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<String>,

    /// Read keys from GEMINI_API_KEYS and keep them in memory only
    #[arg(long, global = true)]
    pub env_only: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the chat interface (default)
    Chat,
    /// Send a single prompt and print the reply
    Say {
        /// Prompt text
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        prompt: Vec<String>,
    },
    /// Manage the API key pool
    Keys {
        #[command(subcommand)]
        command: KeysCommands,
    },
    /// List models available to the current API key
    Models,
    /// Set configuration values, or print them when no key is given
    Set {
        /// Configuration key: model, base-url, max-retries, storage
        key: Option<String>,
        /// Value for the key
        #[arg(trailing_var_arg = true)]
        value: Vec<String>,
    },
    /// Reset a configuration value to its default
    Unset {
        /// Configuration key to unset
        key: String,
    },
}

#[derive(Subcommand)]
pub enum KeysCommands {
    /// Replace the saved keys (comma-separated and/or space-separated)
    Set {
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Show the saved keys (masked) and which one is in use
    Show,
}

/// Initialize the tracing subscriber for diagnostics on stderr.
///
/// `RUST_LOG` controls the filter (e.g. `RUST_LOG=gemchat=debug`).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

pub fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    match args.command.unwrap_or(Commands::Chat) {
        Commands::Set { key, value } => {
            let mut config = Config::load()?;
            let Some(key) = key else {
                config.print_all();
                return Ok(());
            };
            if let Err(message) = config.set_key(&key, &value.join(" ")) {
                eprintln!("❌ {message}");
                std::process::exit(1);
            }
            config.save()?;
            println!("✅ Set {key} to: {}", value.join(" "));
            Ok(())
        }
        Commands::Unset { key } => {
            let mut config = Config::load()?;
            if let Err(message) = config.unset_key(&key) {
                eprintln!("❌ {message}");
                std::process::exit(1);
            }
            config.save()?;
            println!("✅ Unset {key}");
            Ok(())
        }
        command => {
            let config = Config::load()?;
            let controller = build_controller(&config, args.model.as_deref(), args.env_only)?;
            match command {
                Commands::Keys {
                    command: KeysCommands::Set { keys },
                } => keys::run_keys_set(controller, &keys.join(",")),
                Commands::Keys {
                    command: KeysCommands::Show,
                } => {
                    keys::print_key_status(&controller, &mut io::stdout())?;
                    Ok(())
                }
                Commands::Say { prompt } => {
                    say::run_say(controller, prompt, TranscriptLog::from_option(args.log)?).await
                }
                Commands::Models => model_list::list_models(&controller).await,
                _ => chat::run_chat(controller, TranscriptLog::from_option(args.log)?).await,
            }
        }
    }
}

/// Wires the configured slot, the Gemini client and the controller together.
pub fn build_controller(
    config: &Config,
    model_override: Option<&str>,
    env_only: bool,
) -> Result<SessionController<GeminiClient>, Box<dyn Error>> {
    let slot = credential_slot(config, env_only)?;
    let model = model_override.unwrap_or_else(|| config.model());
    let client = GeminiClient::new(reqwest::Client::new(), config.base_url(), model);

    Ok(SessionController::restore(
        CredentialStore::new(slot),
        client,
        config.generation_config(),
        config.max_retries(),
    ))
}

fn credential_slot(config: &Config, env_only: bool) -> Result<Box<dyn CredentialSlot>, Box<dyn Error>> {
    if env_only {
        let raw = std::env::var(ENV_KEYS)
            .map_err(|_| format!("--env-only requires the {ENV_KEYS} environment variable"))?;
        return Ok(Box::new(env_slot(&raw)?));
    }

    Ok(match config.credential_storage() {
        CredentialStorage::Keyring => Box::new(KeyringSlot::new()),
        CredentialStorage::File => Box::new(FileSlot::new(Config::keys_path()?)),
    })
}

/// Seeds an in-memory slot from a comma-separated key list.
fn env_slot(raw: &str) -> Result<MemorySlot, Box<dyn Error>> {
    let keys = parse_key_list(raw);
    if keys.is_empty() {
        return Err(format!("{ENV_KEYS} does not contain any keys").into());
    }
    Ok(MemorySlot::with_contents(serde_json::to_string(&keys)?))
}
