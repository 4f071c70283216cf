//! `loglens init`: first-time setup.

use loglens_config::AppConfig;
use loglens_pipeline::PromptTemplates;
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let default_path = AppConfig::config_dir().join("config.toml");
    let config_path = config_path.unwrap_or(default_path.as_path());

    println!("🔎 LogLens — First-Time Setup");
    println!("=============================\n");

    if let Some(dir) = config_path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            std::fs::create_dir_all(dir)?;
            println!("✅ Created config directory: {}", dir.display());
        }
    }

    if config_path.exists() {
        println!("⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run init.\n");
    } else {
        std::fs::write(config_path, AppConfig::default_toml())?;
        println!("✅ Created config.toml at: {}", config_path.display());
    }

    // Directories come from the (possibly pre-existing) config.
    let config = AppConfig::load_from(config_path)
        .map_err(|e| format!("Config at {} is invalid: {e}", config_path.display()))?;

    let prompts_dir = config.prompts_dir();
    let written = PromptTemplates::write_defaults(&prompts_dir)?;
    if written.is_empty() {
        println!("   Prompt templates already present in {}", prompts_dir.display());
    } else {
        println!(
            "✅ Wrote {} prompt template(s) to {}",
            written.len(),
            prompts_dir.display()
        );
    }

    let knowledge_dir = config.knowledge_dir();
    if !knowledge_dir.exists() {
        std::fs::create_dir_all(&knowledge_dir)?;
        println!("✅ Created knowledge directory: {}", knowledge_dir.display());
    }

    println!("\n📝 Next steps:");
    println!("   1. Set api_key in {} (or export OPENAI_API_KEY)", config_path.display());
    println!(
        "   2. Point [source] dir at your container logs (now: {})",
        config.source_dir().display()
    );
    println!("   3. Run: loglens scan\n");

    Ok(())
}
