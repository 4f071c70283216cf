//! `loglens scan`: one scan cycle.

use super::load_config;
use crate::source::FileLogSource;
use crate::state::ScanState;
use chrono::{DateTime, Utc};
use loglens_config::AppConfig;
use loglens_core::log::LogSource;
use loglens_knowledge::FileKnowledge;
use loglens_pipeline::{PromptTemplates, ScanCycle, ScanOutcome, ScanReport};
use loglens_providers::build_provider;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info_span, warn};
use uuid::Uuid;

pub async fn run(
    config_path: Option<&Path>,
    containers: Vec<String>,
    since: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let since = since
        .map(|s| DateTime::parse_from_rfc3339(&s).map(|t| t.with_timezone(&Utc)))
        .transpose()
        .map_err(|e| format!("Invalid --since timestamp: {e}"))?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping after the current request");
                cancel.cancel();
            }
        }
    });

    let provider = build_provider(&config, cancel.clone())?;
    let prompts = PromptTemplates::load_dir(&config.prompts_dir())?;
    let mut cycle = ScanCycle::from_config(&config, provider, prompts)?;
    if config.knowledge.enabled {
        let store = FileKnowledge::new(config.knowledge_dir());
        cycle = cycle.with_knowledge(Arc::new(store), config.knowledge.retention_days);
    }

    let source = FileLogSource::new(config.source_dir());
    let names = if containers.is_empty() {
        source.containers().await?
    } else {
        containers
    };
    if names.is_empty() {
        println!("No containers found in {}", source.dir().display());
        return Ok(());
    }

    let state_path = AppConfig::state_path();
    let mut state = ScanState::load(&state_path);
    if let Some(since) = since {
        for name in &names {
            state.cursors.insert(name.clone(), since);
        }
    }

    let scan_id = Uuid::new_v4();
    let reports = cycle
        .run(&source, &names, &mut state.cursors, &cancel)
        .instrument(info_span!("scan", id = %scan_id))
        .await;

    state.last_scan = Some(Utc::now());
    state.save(&state_path)?;

    print_reports(&reports);
    if cancel.is_cancelled() {
        println!(
            "\n⏹️  Scan interrupted after {} of {} container(s)",
            reports.len(),
            names.len()
        );
    }

    Ok(())
}

fn print_reports(reports: &[ScanReport]) {
    let mut tokens = 0u64;
    let mut analyzed = 0usize;

    for report in reports {
        let name = &report.container;
        match &report.outcome {
            ScanOutcome::Analyzed(result) => {
                analyzed += 1;
                tokens += result.tokens_used;
                println!("\n📋 {name}");
                println!("{}", "=".repeat(name.chars().count() + 3));
                println!(
                    "   {} line(s), {} after dedup, {} filtered, {} chunk(s), {} tokens\n",
                    result.filter_stats.lines_total,
                    result.processed_count,
                    result.filter_stats.lines_filtered,
                    result.chunks_used,
                    result.tokens_used
                );
                println!("{}", result.analysis_text.trim_end());
            }
            ScanOutcome::NoNewLogs => println!("  ⏭️  {name}: no new logs"),
            ScanOutcome::AllFiltered { lines_filtered } => {
                println!("  🔇 {name}: all {lines_filtered} new line(s) filtered")
            }
            ScanOutcome::Skipped { reason } => println!("  ⚠️  {name}: skipped ({reason})"),
        }
    }

    println!(
        "\n✅ {analyzed} of {} container(s) analyzed, {tokens} tokens used",
        reports.len()
    );
}
