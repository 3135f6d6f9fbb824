//! Export command implementation
//!
//! This module implements the `export` command, which runs one incremental
//! sync of every active entity.

use super::{
    check_remote, destination, exit_code_for, exit_code_for_run, load_state, remote_store,
    split_list, EXIT_CONFIG_ERROR, EXIT_CONNECTION_ERROR, EXIT_INTERRUPTED, EXIT_SUCCESS,
};
use crate::adapters::postgresql::PostgresSource;
use crate::config::{load_config, TidemarkConfig};
use crate::core::state::WatermarkStore;
use crate::core::sync::{RunResult, RunWindow, SyncCoordinator};
use crate::domain::SyncTimestamp;
use clap::Args;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Arguments for the export command
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Dry run mode - validate config, state and templates without extracting
    #[arg(long)]
    pub dry_run: bool,

    /// Restrict the run to these active entities (comma-separated)
    #[arg(long)]
    pub entity: Option<String>,

    /// Override the lookback (days) for entities that were never synced
    #[arg(long, value_name = "DAYS")]
    pub days_back: Option<u32>,
}

impl ExportArgs {
    /// Execute the export command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting export command");

        // Load configuration
        let mut config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load configuration");
                eprintln!("Failed to load configuration: {e}");
                return Ok(EXIT_CONFIG_ERROR);
            }
        };

        // Apply CLI overrides
        if let Some(days) = self.days_back {
            tracing::info!(days, "Overriding lookback from CLI");
            config.sync.default_lookback_days = days;
        }
        if self.dry_run {
            tracing::info!("Enabling dry-run mode from CLI");
            config.application.dry_run = true;
        }

        if let Err(e) = config.validate().and_then(|_| config.validate_paths()) {
            tracing::error!(error = %e, "Configuration validation failed");
            eprintln!("Configuration validation failed: {e}");
            return Ok(EXIT_CONFIG_ERROR);
        }

        let remote = match remote_store(&config).await {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(error = %e, "Failed to initialize remote storage");
                eprintln!("Failed to initialize remote storage: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        if let Err(e) = check_remote(remote.as_ref()).await {
            tracing::error!(error = %e, "Remote storage unreachable");
            eprintln!("Remote storage check failed: {e}");
            return Ok(EXIT_CONNECTION_ERROR);
        }

        let state = match load_state(&config, remote.as_ref()).await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load state");
                eprintln!("Failed to load state: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        if let Err(e) = state.validate_templates(&config.sync.sql_dir).await {
            tracing::error!(error = %e, "Template validation failed");
            eprintln!("Template validation failed: {e}");
            return Ok(EXIT_CONFIG_ERROR);
        }

        let entities = self.entity.as_deref().map(split_list);

        if config.application.dry_run {
            return Ok(print_dry_run(&config, &state, entities.as_deref()).await);
        }

        let source = match PostgresSource::new(&config.source) {
            Ok(s) => Arc::new(s),
            Err(e) => {
                tracing::error!(error = %e, "Failed to create row source");
                eprintln!("Failed to initialize source: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        let destination = destination(&config, remote.as_ref());
        let mut coordinator = SyncCoordinator::new(
            &config.sync,
            source,
            Arc::new(state),
            destination,
            shutdown_signal.clone(),
        )
        .with_run_timeout(Duration::from_secs(config.source.query_timeout_seconds));
        if let Some(names) = entities {
            coordinator = coordinator.with_entities(names);
        }

        println!("🚀 Starting sync...");
        println!();

        let run = match coordinator.execute_sync().await {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(error = %e, "Sync failed");
                eprintln!("Sync failed: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        print_summary(&run);

        let exit_code = exit_code_for_run(&run, *shutdown_signal.borrow());
        match exit_code {
            EXIT_SUCCESS => println!("✅ Sync completed successfully!"),
            EXIT_INTERRUPTED => {
                println!("⚠️  Sync interrupted. Committed watermarks are kept.");
                println!("   Run the same command to continue from them.");
                tracing::info!("Sync interrupted by user signal");
            }
            _ if run.setup_failure.is_some() => println!("❌ Sync did not start"),
            _ if run.interrupted => println!("❌ Sync stopped: run deadline exceeded"),
            _ => println!("⚠️  Sync completed with failures"),
        }

        Ok(exit_code)
    }
}

async fn print_dry_run(
    config: &TidemarkConfig,
    state: &WatermarkStore,
    entities: Option<&[String]>,
) -> i32 {
    tracing::info!("Dry run mode enabled - nothing will be extracted");
    println!("🔍 DRY RUN MODE - nothing will be extracted");
    println!();

    let active = state.active().await;
    if let Some(names) = entities {
        let unknown: Vec<&str> = names
            .iter()
            .filter(|n| !active.iter().any(|e| &e.name == *n))
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            eprintln!("Not active entities: {}", unknown.join(", "));
            return EXIT_CONFIG_ERROR;
        }
    }

    let end = SyncTimestamp::now();
    println!("Entities that would be synced (window end {end}):");
    for watermark in active
        .iter()
        .filter(|e| entities.map_or(true, |names| names.contains(&e.name)))
    {
        let window = RunWindow::for_entity(watermark, end, config.sync.default_lookback_days);
        println!("  {:<30} {}", watermark.name, window);
    }
    println!();
    println!("✅ Configuration, state and templates are valid");
    EXIT_SUCCESS
}

fn print_summary(run: &RunResult) {
    println!();
    if let Some(ref failure) = run.setup_failure {
        println!("❌ Run could not start: {}", failure.message);
        println!();
        return;
    }
    println!("📊 Sync Summary:");
    println!("  Window End: {}", run.window_end);
    println!("  Entities: {}", run.total);
    println!("  Succeeded: {}", run.success);
    println!("  Failed: {}", run.failed);
    println!("  Skipped: {}", run.skipped);
    println!("  Rows: {}", run.total_rows());
    println!("  Duration: {:.2}s", run.duration.as_secs_f64());
    println!();

    for result in &run.entities {
        let mark = if result.success { "✅" } else { "❌" };
        println!(
            "  {mark} {:<30} {:>10} rows  {}",
            result.entity,
            result.row_count,
            result
                .output_location
                .as_deref()
                .or(result.error.as_deref())
                .unwrap_or("no output")
        );
        for warning in &result.warnings {
            println!("     ⚠️  {warning}");
        }
    }
    println!();
}
