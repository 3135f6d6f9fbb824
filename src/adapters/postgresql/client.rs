//! PostgreSQL row source
//!
//! Runs window queries over a pooled connection and streams the result.

use super::cursor::PostgresCursor;
use super::params::to_positional;
use crate::adapters::source::{RowCursor, RowSource, WindowParams};
use crate::config::SourceConfig;
use crate::domain::{Result, SourceError, SyncError, SyncTimestamp};
use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
use postgres_native_tls::MakeTlsConnector;
use secrecy::ExposeSecret;
use std::time::Duration;
use tokio_postgres::config::SslMode;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::NoTls;

/// PostgreSQL implementation of [`RowSource`]
pub struct PostgresSource {
    /// Connection pool
    pool: Pool,

    /// Applied as `statement_timeout` on every checkout
    statement_timeout: Duration,

    /// Connection target with the password removed
    safe_target: String,
}

impl PostgresSource {
    /// Create a new PostgreSQL source
    ///
    /// The pool is created lazily; no connection is opened until the first
    /// query or [`RowSource::ping`].
    ///
    /// # Arguments
    ///
    /// * `config` - Source configuration
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Configuration` for an unparseable connection string
    /// and `SyncError::Connection` if the TLS connector or pool cannot be built.
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let raw = config.connection_string.expose_secret().as_str();

        let mut pg_config = raw.parse::<tokio_postgres::Config>().map_err(|e| {
            SyncError::Configuration(format!("Invalid PostgreSQL connection string: {}", e))
        })?;

        let connect_timeout = Duration::from_secs(config.connect_timeout_seconds);
        pg_config.connect_timeout(connect_timeout);
        pg_config.ssl_mode(ssl_mode_for(&config.ssl_mode));
        if pg_config.get_application_name().is_none() {
            pg_config.application_name("tidemark");
        }

        let manager_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let manager = if config.ssl_mode == "disable" {
            Manager::from_config(pg_config, NoTls, manager_config)
        } else {
            let verify_chain = matches!(config.ssl_mode.as_str(), "verify-ca" | "verify-full");
            let verify_host = config.ssl_mode == "verify-full";
            let connector = native_tls::TlsConnector::builder()
                .danger_accept_invalid_certs(!verify_chain)
                .danger_accept_invalid_hostnames(!verify_host)
                .build()
                .map_err(|e| SyncError::Connection(format!("Failed to build TLS connector: {}", e)))?;
            Manager::from_config(pg_config, MakeTlsConnector::new(connector), manager_config)
        };

        let pool = Pool::builder(manager)
            .max_size(config.max_connections)
            .runtime(Runtime::Tokio1)
            .wait_timeout(Some(connect_timeout))
            .create_timeout(Some(connect_timeout))
            .recycle_timeout(Some(connect_timeout))
            .build()
            .map_err(|e| {
                SyncError::Connection(format!("Failed to create connection pool: {}", e))
            })?;

        Ok(Self {
            pool,
            statement_timeout: Duration::from_secs(config.query_timeout_seconds),
            safe_target: connection_string_safe(raw),
        })
    }

    async fn checkout(&self) -> Result<deadpool_postgres::Object> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| SourceError::Connect(format!("{}: {}", self.safe_target, e)))?;

        client
            .batch_execute(&format!(
                "SET statement_timeout = {}",
                self.statement_timeout.as_millis()
            ))
            .await
            .map_err(|e| SourceError::Connect(format!("Failed to set statement_timeout: {}", e)))?;

        Ok(client)
    }
}

#[async_trait]
impl RowSource for PostgresSource {
    async fn execute(&self, query: &str, params: &WindowParams) -> Result<Box<dyn RowCursor>> {
        let client = self.checkout().await?;

        let positional = to_positional(query);
        let statement = client
            .prepare(&positional.sql)
            .await
            .map_err(|e| SourceError::Query(e.to_string()))?;

        let mut args: Vec<Box<dyn ToSql + Sync + Send>> = Vec::with_capacity(positional.names.len());
        for (name, ty) in positional.names.iter().zip(statement.params()) {
            let value = params.value_of(name)?;
            args.push(bind_timestamp(value, ty));
        }

        tracing::debug!(
            params = positional.names.len(),
            start = %params.start,
            end = %params.end,
            "Executing window query"
        );

        let stream = client
            .query_raw(&statement, args)
            .await
            .map_err(|e| SourceError::Query(e.to_string()))?;

        let columns = statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        Ok(Box::new(PostgresCursor::new(client, stream, columns)))
    }

    async fn ping(&self) -> Result<()> {
        let client = self.checkout().await?;

        client
            .query_one("SELECT 1", &[])
            .await
            .map_err(|e| SourceError::Connect(format!("Connection test failed: {}", e)))?;

        tracing::info!(dsn = %self.safe_target, "PostgreSQL connection test successful");
        Ok(())
    }

    fn describe(&self) -> String {
        self.safe_target.clone()
    }
}

/// Binds a window bound using the type the server inferred for the placeholder
fn bind_timestamp(value: SyncTimestamp, ty: &Type) -> Box<dyn ToSql + Sync + Send> {
    match *ty {
        Type::TIMESTAMP => Box::new(value.as_naive()),
        Type::TIMESTAMPTZ => Box::new(value.as_utc()),
        Type::DATE => Box::new(value.as_naive().date()),
        _ => Box::new(value.to_string()),
    }
}

fn ssl_mode_for(mode: &str) -> SslMode {
    match mode {
        "disable" => SslMode::Disable,
        "require" | "verify-ca" | "verify-full" => SslMode::Require,
        _ => SslMode::Prefer,
    }
}

/// Redacts credentials from a connection string
fn connection_string_safe(raw: &str) -> String {
    let without_query = raw.split('?').next().unwrap_or("postgresql://");

    without_query
        .rsplit('@')
        .next()
        .filter(|host| *host != without_query)
        .map(|host| format!("postgresql://***@{}", host))
        .unwrap_or_else(|| without_query.to_string())
}
