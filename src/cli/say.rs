//! Non-interactive "say" command

use std::error::Error;

use crate::core::chat_client::ModelApi;
use crate::core::message::ChatMessage;
use crate::core::session::SessionController;
use crate::utils::logging::TranscriptLog;

pub async fn run_say<A: ModelApi>(
    mut controller: SessionController<A>,
    prompt: Vec<String>,
    log: TranscriptLog,
) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.join(" ");
    if prompt.trim().is_empty() {
        eprintln!("Usage: gemchat say <prompt>");
        std::process::exit(1);
    }

    match controller.send_message(&prompt).await {
        Ok(reply) => {
            log.log_message(&ChatMessage::user(prompt))?;
            log.log_message(&ChatMessage::assistant(reply.as_str()))?;
            println!("{reply}");
            Ok(())
        }
        Err(err) => {
            eprintln!("❌ Error: {err}");
            if err.needs_credentials() {
                eprintln!();
                eprintln!("💡 Quick fix:");
                eprintln!("  • gemchat keys set KEY1,KEY2");
            }
            std::process::exit(1);
        }
    }
}
