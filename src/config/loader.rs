//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::{FailurePolicy, TidemarkConfig};
use super::secret::secret_string;
use crate::domain::errors::SyncError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into TidemarkConfig
/// 4. Applies environment variable overrides (TIDEMARK_* prefix)
/// 5. Validates the configuration
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Errors
///
/// Returns `SyncError::Configuration` if the file is missing or unreadable,
/// a referenced variable is unset, parsing fails, or validation fails.
///
/// # Examples
///
/// ```no_run
/// use tidemark::config::loader::load_config;
///
/// let config = load_config("tidemark.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<TidemarkConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(SyncError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        SyncError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    let contents = substitute_env_vars(&contents)?;

    let mut config: TidemarkConfig = toml::from_str(&contents)
        .map_err(|e| SyncError::Configuration(format!("Failed to parse TOML: {}", e)))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        SyncError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are copied through untouched.
///
/// # Errors
///
/// Returns an error naming every referenced variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| SyncError::Configuration(format!("Invalid placeholder pattern: {e}")))?;
    let mut lines = Vec::new();
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            lines.push(line.to_string());
            continue;
        }

        let processed = re.replace_all(line, |cap: &regex::Captures<'_>| {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                    String::new()
                }
            }
        });
        lines.push(processed.into_owned());
    }

    if !missing_vars.is_empty() {
        return Err(SyncError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(lines.join("\n"))
}

/// Applies environment variable overrides using TIDEMARK_* prefix
///
/// Environment variables follow the pattern: TIDEMARK_<SECTION>_<KEY>
/// For example: TIDEMARK_SOURCE_QUERY_TIMEOUT_SECONDS, TIDEMARK_SYNC_EXPORT_DIR
fn apply_env_overrides(config: &mut TidemarkConfig) -> Result<()> {
    // Application overrides
    if let Ok(val) = std::env::var("TIDEMARK_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Ok(val) = std::env::var("TIDEMARK_APPLICATION_DRY_RUN") {
        config.application.dry_run = val.parse().unwrap_or(false);
    }

    // Source overrides
    if let Ok(val) = std::env::var("TIDEMARK_SOURCE_CONNECTION_STRING") {
        config.source.connection_string = secret_string(val);
    }
    if let Ok(val) = std::env::var("TIDEMARK_SOURCE_MAX_CONNECTIONS") {
        config.source.max_connections = parse_override("TIDEMARK_SOURCE_MAX_CONNECTIONS", &val)?;
    }
    if let Ok(val) = std::env::var("TIDEMARK_SOURCE_CONNECT_TIMEOUT_SECONDS") {
        config.source.connect_timeout_seconds =
            parse_override("TIDEMARK_SOURCE_CONNECT_TIMEOUT_SECONDS", &val)?;
    }
    if let Ok(val) = std::env::var("TIDEMARK_SOURCE_QUERY_TIMEOUT_SECONDS") {
        config.source.query_timeout_seconds =
            parse_override("TIDEMARK_SOURCE_QUERY_TIMEOUT_SECONDS", &val)?;
    }
    if let Ok(val) = std::env::var("TIDEMARK_SOURCE_SSL_MODE") {
        config.source.ssl_mode = val;
    }

    // Sync overrides
    if let Ok(val) = std::env::var("TIDEMARK_SYNC_STATE_FILE") {
        config.sync.state_file = PathBuf::from(val);
    }
    if let Ok(val) = std::env::var("TIDEMARK_SYNC_SQL_DIR") {
        config.sync.sql_dir = PathBuf::from(val);
    }
    if let Ok(val) = std::env::var("TIDEMARK_SYNC_EXPORT_DIR") {
        config.sync.export_dir = PathBuf::from(val);
    }
    if let Ok(val) = std::env::var("TIDEMARK_SYNC_DEFAULT_LOOKBACK_DAYS") {
        config.sync.default_lookback_days =
            parse_override("TIDEMARK_SYNC_DEFAULT_LOOKBACK_DAYS", &val)?;
    }
    if let Ok(val) = std::env::var("TIDEMARK_SYNC_FAILURE_POLICY") {
        config.sync.failure_policy = match val.as_str() {
            "stop_on_first_failure" => FailurePolicy::StopOnFirstFailure,
            "continue_and_report_all" => FailurePolicy::ContinueAndReportAll,
            other => {
                return Err(SyncError::Configuration(format!(
                    "TIDEMARK_SYNC_FAILURE_POLICY must be stop_on_first_failure or continue_and_report_all, got '{other}'"
                )))
            }
        };
    }

    // Remote overrides (only if a remote section is configured)
    if let Some(ref mut remote) = config.remote {
        if let Ok(val) = std::env::var("TIDEMARK_REMOTE_BUCKET") {
            remote.bucket = val;
        }
        if let Ok(val) = std::env::var("TIDEMARK_REMOTE_PREFIX") {
            remote.prefix = val;
        }
        if let Ok(val) = std::env::var("TIDEMARK_REMOTE_REGION") {
            remote.region = val;
        }
        if let Ok(val) = std::env::var("TIDEMARK_REMOTE_ENDPOINT") {
            remote.endpoint = Some(val);
        }
        if let Ok(val) = std::env::var("TIDEMARK_REMOTE_ACCESS_KEY_ID") {
            remote.access_key_id = Some(val);
        }
        if let Ok(val) = std::env::var("TIDEMARK_REMOTE_SECRET_ACCESS_KEY") {
            remote.secret_access_key = Some(secret_string(val));
        }
        if let Ok(val) = std::env::var("TIDEMARK_REMOTE_SESSION_TOKEN") {
            remote.session_token = Some(secret_string(val));
        }
    }

    // Logging overrides
    if let Ok(val) = std::env::var("TIDEMARK_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = val.parse().unwrap_or(false);
    }
    if let Ok(val) = std::env::var("TIDEMARK_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }

    Ok(())
}

fn parse_override<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| SyncError::Configuration(format!("{name} has an invalid value '{value}'")))
}
