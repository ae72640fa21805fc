//! PostgreSQL metadata source.
//!
//! Lists `information_schema.columns` for one schema, `public` unless the
//! connection string carries `?schema=` or the configuration names another.
//!
//! # Security Guarantees
//! - Every pooled session is set to read-only with a statement timeout
//! - Connection strings are redacted in error messages

use super::{ConnectionConfig, MetadataSource, config::driver_url};
use crate::{
    Result,
    error::{DataMaskError, redact_database_url},
    models::{ColumnMetadata, DatabaseType},
};
use async_trait::async_trait;
use sqlx::{PgPool, Row};

/// Schema listed when none is configured.
pub const DEFAULT_SCHEMA: &str = "public";

const DEFAULT_PORT: u16 = 5432;

// information_schema reports sql_identifier; cast so the rows decode as text
const COLUMNS_QUERY: &str = r#"
    SELECT c.table_name::text AS table_name, c.column_name::text AS column_name
    FROM information_schema.columns c
    WHERE c.table_schema = $1
    ORDER BY c.table_name, c.ordinal_position
"#;

/// Reads column metadata from a PostgreSQL schema.
pub struct PostgresMetadataSource {
    pool: PgPool,
    config: ConnectionConfig,
}

impl std::fmt::Debug for PostgresMetadataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresMetadataSource")
            .field("config", &self.config)
            .field("pool_size", &self.pool.size())
            .finish()
    }
}

impl PostgresMetadataSource {
    /// Creates a source with a lazily connected pool.
    ///
    /// # Errors
    /// Returns error if the connection string is malformed or uses another
    /// scheme. Connection failures surface on the first fetch.
    pub async fn new(connection_string: &str) -> Result<Self> {
        validate_connection_string(connection_string)?;
        let config = ConnectionConfig::from_url(connection_string, DEFAULT_PORT)?;
        Self::with_config(connection_string, config).await
    }

    /// Creates a source with a custom configuration.
    pub async fn with_config(connection_string: &str, config: ConnectionConfig) -> Result<Self> {
        config.validate()?;
        validate_connection_string(connection_string)?;
        let pool = create_connection_pool(connection_string, &config)?;
        Ok(Self { pool, config })
    }

    /// Wraps an existing pool.
    pub fn from_pool(pool: PgPool, config: ConnectionConfig) -> Self {
        Self { pool, config }
    }

    /// The schema whose columns are listed.
    pub fn schema(&self) -> &str {
        self.config.schema.as_deref().unwrap_or(DEFAULT_SCHEMA)
    }

    /// Closes the connection pool gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl MetadataSource for PostgresMetadataSource {
    async fn fetch_metadata(&self) -> Result<Vec<ColumnMetadata>> {
        let schema = self.schema();
        let rows = sqlx::query(COLUMNS_QUERY)
            .bind(schema)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                DataMaskError::metadata_failed(
                    format!("Failed to list columns of schema '{}'", schema),
                    e,
                )
            })?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let table_name: String = row.try_get("table_name").map_err(|e| {
                DataMaskError::metadata_failed("Failed to parse table name", e)
            })?;
            let column_name: String = row.try_get("column_name").map_err(|e| {
                DataMaskError::metadata_failed(
                    format!("Failed to parse column name in table '{}'", table_name),
                    e,
                )
            })?;
            columns.push(ColumnMetadata::new(table_name, column_name));
        }

        tracing::debug!(
            "Fetched {} columns from PostgreSQL schema '{}'",
            columns.len(),
            schema
        );
        Ok(columns)
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::PostgreSQL
    }
}

/// Validates the connection string scheme.
///
/// # Errors
/// Returns `Configuration` if the string is not a `postgres://` or
/// `postgresql://` URL.
pub fn validate_connection_string(connection_string: &str) -> Result<()> {
    let url = url::Url::parse(connection_string).map_err(|e| {
        DataMaskError::configuration(format!(
            "Invalid PostgreSQL connection string format: {}",
            e
        ))
    })?;

    if !matches!(url.scheme(), "postgres" | "postgresql") {
        return Err(DataMaskError::configuration(
            "Connection string must use postgres:// or postgresql:// scheme",
        ));
    }
    Ok(())
}

fn create_connection_pool(connection_string: &str, config: &ConnectionConfig) -> Result<PgPool> {
    use sqlx::Executor;

    let query_timeout_ms = config.query_timeout.as_millis();
    let read_only = config.read_only;
    let url = driver_url(connection_string)?;

    sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.max_connections.min(100))
        .acquire_timeout(config.connect_timeout)
        .test_before_acquire(true)
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                conn.execute(format!("SET statement_timeout = {}", query_timeout_ms).as_str())
                    .await?;

                let app_name = format!("datamask-{}", env!("CARGO_PKG_VERSION"));
                conn.execute(format!("SET application_name = '{}'", app_name).as_str())
                    .await?;

                if read_only {
                    conn.execute("SET default_transaction_read_only = on")
                        .await?;
                }
                Ok(())
            })
        })
        .connect_lazy(&url)
        .map_err(|e| {
            DataMaskError::metadata_failed(
                format!(
                    "Failed to create PostgreSQL connection pool to {}",
                    redact_database_url(connection_string)
                ),
                e,
            )
        })
}
