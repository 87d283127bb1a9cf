use std::error::Error;
use std::io::{self, Write};

use crate::core::chat_client::ModelApi;
use crate::core::credentials::{mask_key, parse_key_list};
use crate::core::error::ChatError;
use crate::core::session::SessionController;

/// `gemchat keys set`: replaces the saved pool.
pub fn run_keys_set<A: ModelApi>(
    mut controller: SessionController<A>,
    input: &str,
) -> Result<(), Box<dyn Error>> {
    if !keys_set(&mut controller, input, &mut io::stdout())? {
        std::process::exit(1);
    }
    Ok(())
}

/// Saves `input` as the new pool. Refuses when nothing would be saved.
pub fn keys_set<A: ModelApi, W: Write>(
    controller: &mut SessionController<A>,
    input: &str,
    out: &mut W,
) -> io::Result<bool> {
    if !controller.persists_credentials() {
        writeln!(
            out,
            "❌ Keys cannot be saved with --env-only. Update GEMINI_API_KEYS instead."
        )?;
        return Ok(false);
    }
    apply_keys(controller, input, out)
}

/// Replaces the pool and reports the outcome. Returns whether a chat
/// session is ready afterwards.
pub fn apply_keys<A: ModelApi, W: Write>(
    controller: &mut SessionController<A>,
    input: &str,
    out: &mut W,
) -> io::Result<bool> {
    let keys = parse_key_list(input);
    let count = keys.len();
    let durable = controller.persists_credentials();

    match controller.set_credentials(keys) {
        Ok(()) if durable => writeln!(out, "✅ {count} API key(s) saved.")?,
        Ok(()) => writeln!(
            out,
            "✅ {count} API key(s) in use for this session only; --env-only does not save them."
        )?,
        Err(err @ ChatError::InitializationFailed(_)) => {
            writeln!(out, "❌ {err}")?;
            if durable {
                writeln!(
                    out,
                    "⚠️  The keys were saved, but the first key was rejected. Replace it with 'gemchat keys set'."
                )?;
            }
            return Ok(false);
        }
        Err(err) => {
            writeln!(out, "❌ {err}")?;
            return Ok(false);
        }
    }
    Ok(true)
}

/// Writes the masked pool with a marker on the key in use.
pub fn print_key_status<A: ModelApi, W: Write>(
    controller: &SessionController<A>,
    out: &mut W,
) -> io::Result<()> {
    let keys = controller.credentials();
    if keys.is_empty() {
        writeln!(out, "No API keys configured. Run 'gemchat keys set KEY1,KEY2'.")?;
        return Ok(());
    }

    let current = controller.current_index();
    for (index, key) in keys.iter().enumerate() {
        let marker = if index == current { "*" } else { " " };
        writeln!(out, "{marker} {}. {}", index + 1, mask_key(key))?;
    }
    writeln!(out, "Current key: {} of {}", current + 1, keys.len())?;
    if !controller.is_ready() {
        writeln!(out, "⚠️  No chat session is active; the current key was rejected.")?;
    }
    Ok(())
}
