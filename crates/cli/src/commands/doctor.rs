//! `loglens doctor`: diagnose configuration and connectivity.

use loglens_config::AppConfig;
use loglens_core::log::LogSource;
use loglens_core::provider::Provider;
use loglens_providers::build_provider;
use std::path::Path;
use tokio_util::sync::CancellationToken;

use crate::source::FileLogSource;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 LogLens Doctor — System Diagnostics");
    println!("======================================\n");

    let mut issues = 0;

    let config = match AppConfig::load(config_path) {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  Fix the config before running other checks.");
            return Ok(());
        }
    };

    println!(
        "  ✅ Model {} (context budget {} tokens)",
        config.model,
        config.effective_max_tokens()
    );

    let source = FileLogSource::new(config.source_dir());
    match source.containers().await {
        Ok(names) if names.is_empty() => {
            println!("  ⚠️  No *.log files in {}", source.dir().display());
            issues += 1;
        }
        Ok(names) => println!("  ✅ {} container log(s) in {}", names.len(), source.dir().display()),
        Err(e) => {
            println!("  ❌ Log source unreadable: {e}");
            issues += 1;
        }
    }

    if config.knowledge.enabled {
        let dir = config.knowledge_dir();
        if dir.exists() {
            println!("  ✅ Knowledge directory exists ({} day retention)", config.knowledge.retention_days);
        } else {
            println!("  ⚠️  No knowledge directory — run `loglens init`");
            issues += 1;
        }
    } else {
        println!("  ➖ Knowledge store disabled");
    }

    match build_provider(&config, CancellationToken::new()) {
        Ok(provider) => match provider.health_check().await {
            Ok(true) => println!("  ✅ API reachable at {}", config.api_url),
            Ok(false) => {
                println!("  ❌ API at {} rejected the health check", config.api_url);
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ API unreachable: {e}");
                issues += 1;
            }
        },
        Err(e) => {
            println!("  ⚠️  {e} — set api_key or OPENAI_API_KEY");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
