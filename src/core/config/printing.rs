use crate::core::config::data::Config;

impl Config {
    pub fn print_all(&self) {
        let generation = self.generation_config();
        println!("Current configuration:");
        println!("  model: {}", self.model());
        println!("  base-url: {}", self.base_url());
        println!("  max-retries: {}", self.max_retries());
        println!("  storage: {}", self.credential_storage());
        println!(
            "  generation: temperature={} top-p={} top-k={} max-output-tokens={}",
            generation.temperature,
            generation.top_p,
            generation.top_k,
            generation.max_output_tokens
        );
    }
}
