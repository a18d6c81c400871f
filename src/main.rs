mod bundle;
mod characters;
mod config;
mod imagen;
mod llm;
mod markdown;
mod report;
mod songwriter;
mod state;
mod styles;
mod wizard;

use anyhow::Result;
use config::Config;
use inquire::Text;
use state::StateStore;
use std::path::Path;
use styles::StyleCatalog;
use wizard::Wizard;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = if Path::new("config.yml").exists() {
        match Config::load() {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                eprintln!("Please fix config.yml and try again.");
                return Err(e);
            }
        }
    } else {
        println!("No config.yml found; let's set one up.");
        let api_key = Text::new("Gemini API key:").prompt()?;
        let config = Config::bootstrap(api_key.trim().to_string());
        config.save()?;
        println!("Configuration saved to config.yml.");
        config
    };

    config.ensure_directories()?;

    let catalog = StyleCatalog::load(&config.styles_file);
    if catalog.is_empty() {
        eprintln!(
            "Warning: no styles loaded from {}; style selection will be manual.",
            config.styles_file
        );
    }

    let llm = llm::create_llm(&config)?;
    let imagen = imagen::create_image_client(&config)?;
    let store = StateStore::load(config.state_path());

    let mut wizard = Wizard::new(config, store, catalog, llm, imagen);
    wizard.run().await
}
