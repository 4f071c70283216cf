//! `loglens knowledge`: stored analysis management.

use super::load_config;
use chrono::Utc;
use loglens_core::knowledge::{KnowledgeBackend, render_rollup};
use loglens_knowledge::FileKnowledge;
use std::path::Path;

fn open_store(config_path: Option<&Path>) -> Result<(FileKnowledge, u32), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    Ok((
        FileKnowledge::new(config.knowledge_dir()),
        config.knowledge.retention_days,
    ))
}

pub async fn list(
    config_path: Option<&Path>,
    container: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (store, retention_days) = open_store(config_path)?;
    let containers = match container {
        Some(name) => vec![name],
        None => store.containers().await?,
    };

    println!("🧠 Stored analyses ({})", store.dir().display());
    println!("   Retention: {retention_days} day(s)\n");

    if containers.is_empty() {
        println!("   No analyses stored yet. Run `loglens scan` first.");
        return Ok(());
    }

    for name in containers {
        let entries = store.entries(&name).await?;
        println!("  {name} — {} entr{}", entries.len(), if entries.len() == 1 { "y" } else { "ies" });
        for entry in entries.iter().rev() {
            let first = entry
                .analysis_text
                .lines()
                .map(|l| l.trim().trim_start_matches('#').trim())
                .find(|l| !l.is_empty())
                .unwrap_or("(empty)");
            let preview: String = first.chars().take(80).collect();
            println!("    {}  {preview}", entry.timestamp.format("%Y-%m-%d %H:%M"));
        }
    }

    Ok(())
}

pub async fn prune(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let (store, retention_days) = open_store(config_path)?;
    let now = Utc::now();
    let mut total = 0usize;

    for name in store.containers().await? {
        let removed = store.prune(&name, retention_days, now).await?;
        if removed > 0 {
            println!("  🗑️  {name}: removed {removed} entr{}", if removed == 1 { "y" } else { "ies" });
        }
        total += removed;
    }

    println!("✅ Pruned {total} entr{} older than {retention_days} day(s)", if total == 1 { "y" } else { "ies" });
    Ok(())
}

pub async fn rollup(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let (store, _) = open_store(config_path)?;
    print!("{}", render_rollup(&store.rollup().await?));
    Ok(())
}
