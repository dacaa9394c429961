//! PostgreSQL client implementation
//!
//! Owns the connection pool and classifies driver errors into the store
//! error taxonomy.

use crate::config::schema::PostgreSQLConfig;
use crate::domain::{FerryError, Result, StoreError};
use deadpool_postgres::{Manager, ManagerConfig, Pool, PoolError, RecyclingMethod};
use secrecy::ExposeSecret;
use std::time::Duration;
use tokio_postgres::config::SslMode;
use tokio_postgres::types::ToSql;
use tokio_postgres::{NoTls, Row};

/// SQLSTATE codes that indicate capacity pressure rather than a bad request
const THROTTLING_SQLSTATES: &[&str] = &[
    "40001", // serialization_failure
    "40P01", // deadlock_detected
    "53300", // too_many_connections
    "57014", // query_canceled (statement timeout)
];

/// PostgreSQL client for Ferry
///
/// Provides pooled connections plus query helpers that map failures onto
/// [`StoreError`].
pub struct PostgreSQLClient {
    pool: Pool,
    config: PostgreSQLConfig,
}

impl PostgreSQLClient {
    /// Create a new PostgreSQL client
    ///
    /// No connection is opened until the first query.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection string is invalid or the pool or
    /// TLS connector cannot be built.
    pub fn new(config: PostgreSQLConfig) -> Result<Self> {
        let mut pg_config: tokio_postgres::Config = config
            .connection_string
            .expose_secret()
            .as_ref()
            .parse()
            .map_err(|e| {
                FerryError::Configuration(format!("Invalid PostgreSQL connection string: {e}"))
            })?;

        pg_config.options(&format!(
            "-c statement_timeout={}",
            config.statement_timeout_seconds * 1000
        ));

        let manager_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let manager = match config.ssl_mode.as_str() {
            "disable" => {
                pg_config.ssl_mode(SslMode::Disable);
                Manager::from_config(pg_config, NoTls, manager_config)
            }
            mode => {
                pg_config.ssl_mode(if mode == "require" {
                    SslMode::Require
                } else {
                    SslMode::Prefer
                });
                let connector = native_tls::TlsConnector::builder().build().map_err(|e| {
                    FerryError::Configuration(format!("Failed to build TLS connector: {e}"))
                })?;
                let tls = postgres_native_tls::MakeTlsConnector::new(connector);
                Manager::from_config(pg_config, tls, manager_config)
            }
        };

        let timeout = Duration::from_secs(config.connection_timeout_seconds);
        let pool = Pool::builder(manager)
            .max_size(config.max_connections)
            .runtime(deadpool_postgres::Runtime::Tokio1)
            .wait_timeout(Some(timeout))
            .create_timeout(Some(timeout))
            .recycle_timeout(Some(timeout))
            .build()
            .map_err(|e| {
                FerryError::Configuration(format!("Failed to create connection pool: {e}"))
            })?;

        Ok(Self { pool, config })
    }

    /// Test the connection to PostgreSQL
    pub async fn test_connection(&self) -> Result<()> {
        let client = self.get_connection().await?;
        client
            .query_one("SELECT 1", &[])
            .await
            .map_err(|e| classify_pg_error(&e, "Connection test failed"))?;

        tracing::info!(
            server = %self.connection_string_safe(),
            "PostgreSQL connection test successful"
        );
        Ok(())
    }

    /// Create the registry and item tables if they don't exist
    pub async fn ensure_schema(&self) -> Result<()> {
        let client = self.get_connection().await?;
        let migration_sql = include_str!("../../../migrations/001_initial_schema.sql");

        client
            .batch_execute(migration_sql)
            .await
            .map_err(|e| classify_pg_error(&e, "Failed to execute migration"))?;

        tracing::debug!("PostgreSQL schema initialized");
        Ok(())
    }

    /// Get a connection from the pool
    ///
    /// # Errors
    ///
    /// A pool wait timeout is reported as throttling; other pool failures
    /// as unavailability.
    pub async fn get_connection(&self) -> Result<deadpool_postgres::Object> {
        self.pool.get().await.map_err(|e| classify_pool_error(e).into())
    }

    /// Execute a query and return rows
    pub async fn query(&self, query: &str, params: &[&(dyn ToSql + Sync)]) -> Result<Vec<Row>> {
        let client = self.get_connection().await?;
        client
            .query(query, params)
            .await
            .map_err(|e| classify_pg_error(&e, "Query failed").into())
    }

    /// Execute a statement and return the number of affected rows
    pub async fn execute(&self, statement: &str, params: &[&(dyn ToSql + Sync)]) -> Result<u64> {
        let client = self.get_connection().await?;
        client
            .execute(statement, params)
            .await
            .map_err(|e| classify_pg_error(&e, "Statement execution failed").into())
    }

    /// Get the connection string (without credentials)
    pub fn connection_string_safe(&self) -> String {
        redact_connection_string(self.config.connection_string.expose_secret().as_ref())
    }

    /// Get the pool statistics
    pub fn pool_status(&self) -> deadpool_postgres::Status {
        self.pool.status()
    }
}

fn redact_connection_string(conn: &str) -> String {
    conn.rsplit_once('@')
        .map(|(_, host)| format!("postgresql://***@{host}"))
        .unwrap_or_else(|| "postgresql://***".to_string())
}

/// Map a pool error onto the store taxonomy
pub(crate) fn classify_pool_error(err: PoolError) -> StoreError {
    match err {
        PoolError::Timeout(kind) => {
            StoreError::Throttled(format!("timed out waiting for a connection ({kind:?})"))
        }
        PoolError::Backend(e) => classify_pg_error(&e, "Failed to connect"),
        other => StoreError::Unavailable(format!("Connection pool error: {other}")),
    }
}

/// Map a driver error onto the store taxonomy
pub(crate) fn classify_pg_error(err: &tokio_postgres::Error, context: &str) -> StoreError {
    let message = format!("{context}: {err}");

    match err.code().map(|state| state.code()) {
        Some(code) if THROTTLING_SQLSTATES.contains(&code) => StoreError::Throttled(message),
        Some(code) if code == "42501" || code.starts_with("28") => {
            StoreError::AccessDenied(message)
        }
        Some("42P01") => StoreError::AccessDenied(format!(
            "{message} (schema missing; run `ferry create-table` first)"
        )),
        Some(_) => StoreError::QueryFailed(message),
        None if err.is_closed() => StoreError::Unavailable(message),
        None => match std::error::Error::source(err) {
            Some(source) if source.is::<std::io::Error>() => StoreError::Unavailable(message),
            _ => StoreError::QueryFailed(message),
        },
    }
}
