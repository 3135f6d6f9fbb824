//! Configuration management for Tidemark.
//!
//! This module provides TOML-based configuration loading, parsing, and validation.
//!
//! # Overview
//!
//! Tidemark uses TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `TIDEMARK_<SECTION>_<KEY>` environment overrides
//! - Default values for optional settings
//! - Validation of ranges and paths
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Log level and dry-run flag
//! - [`SourceConfig`] - PostgreSQL connection, pool size and timeouts
//! - [`SyncConfig`] - State file, template and export directories, lookback, failure policy
//! - [`RemoteConfig`] - Optional S3 destination and state mirror
//! - [`LoggingConfig`] - Local file logging
//!
//! # Example Configuration
//!
//! ```toml
//! [application]
//! log_level = "info"
//!
//! [source]
//! connection_string = "${TIDEMARK_DATABASE_URL}"
//! query_timeout_seconds = 600
//!
//! [sync]
//! state_file = "./state.json"
//! sql_dir = "./sql"
//! export_dir = "./export"
//! default_lookback_days = 30
//! failure_policy = "stop_on_first_failure"
//!
//! [remote]
//! bucket = "warehouse-landing"
//! prefix = "crm/"
//! region = "eu-west-1"
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::load_config;
pub use schema::{
    ApplicationConfig, FailurePolicy, LoggingConfig, RemoteConfig, SourceConfig, SyncConfig,
    TidemarkConfig,
};
pub use secret::{secret_string, SecretString, SecretValue};

impl TidemarkConfig {
    /// Loads and validates a configuration file
    ///
    /// Shorthand for [`load_config`].
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::domain::Result<Self> {
        load_config(path)
    }
}
