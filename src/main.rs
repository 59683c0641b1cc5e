//! schemasync - Schema Synchronization CLI
//!
//! Diffs a source schema snapshot against a destination snapshot and
//! writes the migration script that brings the destination up to date.
//! Configuration comes from the environment (and `.env`), see `config.rs`.
//!
//! Exit codes: 0 when the schemas already agree, 2 when a script was
//! produced, 1 on failure.

use schemasync::accessor::{Accessor, NameFilter, SnapshotAccessor};
use schemasync::config::Settings;
use schemasync::fetch::FetchOptions;
use schemasync::output::Output;
use schemasync::DiffOrchestrator;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match run().await {
        Ok(true) => ExitCode::from(2),
        Ok(false) => ExitCode::SUCCESS,
        Err(e) => {
            error!("❌ Schema sync failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<bool> {
    info!("🚀 Starting schema sync...");

    let settings = Settings::load()?;
    info!("📋 Configuration loaded successfully");

    let (source, destination) = tokio::try_join!(
        SnapshotAccessor::load(&settings.source),
        SnapshotAccessor::load(&settings.destination),
    )?;
    let source: Arc<dyn Accessor> = Arc::new(source);
    let destination: Arc<dyn Accessor> = Arc::new(destination);

    let orchestrator = DiffOrchestrator::new(source, destination)
        .with_filter(NameFilter::from_config(&settings.filter)?)
        .with_fetch_options(FetchOptions::from(&settings.fetch))
        .with_delimiter(settings.routine_delimiter.clone());

    let mut output = Output::from_config(&settings.output);
    let summary = orchestrator.run(&mut output).await?;

    for category in &summary.categories {
        info!("   {:<10} {} differences", category.kind, category.differences);
    }

    if summary.changes_found {
        info!("✅ {} differences found (run {})", summary.total(), summary.run_id);
    } else {
        info!("✅ Schemas are in sync, no script written (run {})", summary.run_id);
    }

    Ok(summary.changes_found)
}

/// Initialize tracing with structured logging on stderr; stdout carries the SQL
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,schemasync=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .init();
}
