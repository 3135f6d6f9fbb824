//! Status command implementation
//!
//! This module implements the `status` command for displaying entity
//! watermarks and the window each entity would sync next.

use super::{exit_code_for, load_state, remote_store, EXIT_CONFIG_ERROR, EXIT_SUCCESS};
use crate::config::load_config;
use crate::core::sync::RunWindow;
use crate::domain::SyncTimestamp;
use clap::Args;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Show a single entity
    #[arg(long)]
    pub entity: Option<String>,
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Checking sync status");

        println!("📊 Sync Status");
        println!();

        // Load configuration
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(EXIT_CONFIG_ERROR);
            }
        };

        let remote = match remote_store(&config).await {
            Ok(r) => r,
            Err(e) => {
                println!("❌ Failed to initialize remote storage");
                println!("   Error: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        let state = match load_state(&config, remote.as_ref()).await {
            Ok(s) => s,
            Err(e) => {
                println!("❌ Failed to load state");
                println!("   Error: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        let watermarks: Vec<_> = state
            .entities()
            .await
            .into_iter()
            .filter(|w| self.entity.as_ref().map_or(true, |name| &w.name == name))
            .collect();

        if watermarks.is_empty() {
            match self.entity {
                Some(ref name) => println!("No entity named '{name}' in the state file."),
                None => println!("No entities in the state file."),
            }
            return Ok(EXIT_SUCCESS);
        }

        let now = SyncTimestamp::now();
        let lookback = config.sync.default_lookback_days;

        println!(
            "Found {} entit{} ({} active):",
            watermarks.len(),
            if watermarks.len() == 1 { "y" } else { "ies" },
            watermarks.iter().filter(|w| w.active).count()
        );
        println!();
        println!(
            "{:<30} {:<8} {:<22} {:<22}",
            "Entity", "Active", "Last Sync", "Next Window Start"
        );
        println!("{}", "-".repeat(84));

        let mut sorted = watermarks;
        sorted.sort_by(|a, b| a.name.cmp(&b.name));
        for watermark in &sorted {
            let last = watermark
                .last_sync_time
                .map(|t| t.to_string())
                .unwrap_or_else(|| "Never".to_string());
            let next = if watermark.active {
                RunWindow::for_entity(watermark, now, lookback)
                    .start
                    .to_string()
            } else {
                "-".to_string()
            };

            println!(
                "{:<30} {:<8} {:<22} {:<22}",
                watermark.name,
                if watermark.active { "yes" } else { "no" },
                last,
                next
            );
        }

        println!();
        Ok(EXIT_SUCCESS)
    }
}
