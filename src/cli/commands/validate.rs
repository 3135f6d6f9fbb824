//! Validate command implementation
//!
//! This module implements the `validate` command: configuration, paths, the
//! state file and query templates, and optionally connectivity.

use super::{check_remote, remote_store, EXIT_CONFIG_ERROR, EXIT_CONNECTION_ERROR, EXIT_SUCCESS};
use crate::adapters::postgresql::PostgresSource;
use crate::adapters::source::RowSource;
use crate::config::load_config;
use crate::core::state::WatermarkStore;
use clap::Args;

/// Arguments for the validate command
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Also connect to the source database and remote storage
    #[arg(long)]
    pub test_connection: bool,
}

impl ValidateArgs {
    /// Execute the validate command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // Load configuration (includes schema validation)
        let config = match load_config(config_path) {
            Ok(c) => {
                println!("✅ Configuration file loaded successfully");
                c
            }
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(EXIT_CONFIG_ERROR);
            }
        };

        if let Err(e) = config.validate_paths() {
            println!("❌ Path validation failed");
            println!("   Error: {e}");
            return Ok(EXIT_CONFIG_ERROR);
        }
        println!("✅ Directories are usable");

        // Only the local copy is checked here; the mirror needs a connection
        if config.sync.state_file.exists() {
            let state = match WatermarkStore::load(&config.sync.state_file, None).await {
                Ok(s) => s,
                Err(e) => {
                    println!("❌ State file is invalid");
                    println!("   Error: {e}");
                    return Ok(EXIT_CONFIG_ERROR);
                }
            };
            println!(
                "✅ State file is valid ({} entities, {} active)",
                state.total_count().await,
                state.active_count().await
            );

            if let Err(e) = state.validate_templates(&config.sync.sql_dir).await {
                println!("❌ Template check failed");
                println!("   Error: {e}");
                return Ok(EXIT_CONFIG_ERROR);
            }
            println!("✅ Every active entity has a query template");
        } else if config.remote_enabled() {
            println!(
                "ℹ️  No local state file at {}; the remote copy will be used",
                config.sync.state_file.display()
            );
        } else {
            println!(
                "❌ State file not found: {}",
                config.sync.state_file.display()
            );
            return Ok(EXIT_CONFIG_ERROR);
        }

        if self.test_connection {
            println!();
            println!("🔌 Testing connections...");

            let source = match PostgresSource::new(&config.source) {
                Ok(s) => s,
                Err(e) => {
                    println!("❌ Invalid source settings");
                    println!("   Error: {e}");
                    return Ok(EXIT_CONFIG_ERROR);
                }
            };
            if let Err(e) = source.ping().await {
                println!("❌ Source connection failed ({})", source.describe());
                println!("   Error: {e}");
                return Ok(EXIT_CONNECTION_ERROR);
            }
            println!("✅ Source reachable ({})", source.describe());

            match remote_store(&config).await {
                Ok(Some(store)) => {
                    if let Err(e) = check_remote(Some(&store)).await {
                        println!("❌ Remote storage check failed");
                        println!("   Error: {e}");
                        return Ok(EXIT_CONNECTION_ERROR);
                    }
                    println!("✅ Remote storage writable");
                }
                Ok(None) => {}
                Err(e) => {
                    println!("❌ Remote storage could not be initialized");
                    println!("   Error: {e}");
                    return Ok(EXIT_CONNECTION_ERROR);
                }
            }
        }

        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  Source Max Connections: {}", config.source.max_connections);
        println!("  Query Timeout: {}s", config.source.query_timeout_seconds);
        println!("  State File: {}", config.sync.state_file.display());
        println!("  SQL Directory: {}", config.sync.sql_dir.display());
        println!("  Export Directory: {}", config.sync.export_dir.display());
        println!("  Default Lookback: {} days", config.sync.default_lookback_days);
        println!("  Failure Policy: {}", config.sync.failure_policy);
        match config.remote {
            Some(ref remote) => println!(
                "  Remote: s3://{}/{}",
                remote.bucket,
                remote.normalized_prefix()
            ),
            None => println!("  Remote: disabled (local output)"),
        }
        println!();
        Ok(EXIT_SUCCESS)
    }
}
