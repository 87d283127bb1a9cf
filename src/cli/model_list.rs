use std::error::Error;

use crate::api::models::{fetch_models, sort_models};
use crate::core::chat_client::GeminiClient;
use crate::core::session::SessionController;

pub async fn list_models(
    controller: &SessionController<GeminiClient>,
) -> Result<(), Box<dyn Error>> {
    let gemini = controller.api();
    let keys = controller.credentials();
    let Some(api_key) = keys.get(controller.current_index()) else {
        eprintln!("❌ No API keys configured. Run 'gemchat keys set KEY1,KEY2'.");
        std::process::exit(2);
    };

    let mut models = match fetch_models(gemini.http(), gemini.base_url(), api_key).await {
        Ok(models) => models,
        Err(err) => {
            eprintln!("❌ Failed to list models: {err}");
            std::process::exit(1);
        }
    };
    sort_models(&mut models);

    println!("Available models (current: {}):", gemini.model());
    for model in &models {
        let marker = if model.supports_chat() { "" } else { "  (no chat)" };
        match (&model.display_name, model.output_token_limit) {
            (Some(name), Some(limit)) => {
                println!("  {} - {} [{} output tokens]{}", model.id(), name, limit, marker)
            }
            (Some(name), None) => println!("  {} - {}{}", model.id(), name, marker),
            _ => println!("  {}{}", model.id(), marker),
        }
    }
    Ok(())
}
