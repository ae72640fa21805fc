//! MySQL metadata source.
//!
//! Lists `information_schema.COLUMNS` for the configured schema, or for the
//! database the connection is using when none is configured.

use super::{ConnectionConfig, MetadataSource, config::driver_url};
use crate::{
    Result,
    error::{DataMaskError, redact_database_url},
    models::{ColumnMetadata, DatabaseType},
};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row};

const DEFAULT_PORT: u16 = 3306;

// MySQL 8 reports catalog names with a binary collation; cast to decode as text
const COLUMNS_QUERY: &str = r#"
    SELECT CAST(TABLE_NAME AS CHAR) AS table_name,
           CAST(COLUMN_NAME AS CHAR) AS column_name
    FROM information_schema.COLUMNS
    WHERE TABLE_SCHEMA = COALESCE(?, DATABASE())
    ORDER BY TABLE_NAME, ORDINAL_POSITION
"#;

/// Reads column metadata from a MySQL database.
pub struct MySqlMetadataSource {
    pool: MySqlPool,
    config: ConnectionConfig,
}

impl std::fmt::Debug for MySqlMetadataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlMetadataSource")
            .field("config", &self.config)
            .field("pool_size", &self.pool.size())
            .finish()
    }
}

impl MySqlMetadataSource {
    /// Creates a source with a lazily connected pool.
    ///
    /// # Errors
    /// Returns error if the connection string is malformed or uses another
    /// scheme. Connection failures surface on the first fetch.
    pub async fn new(connection_string: &str) -> Result<Self> {
        validate_mysql_connection_string(connection_string)?;
        let config = ConnectionConfig::from_url(connection_string, DEFAULT_PORT)?;
        Self::with_config(connection_string, config).await
    }

    /// Creates a source with a custom configuration.
    pub async fn with_config(connection_string: &str, config: ConnectionConfig) -> Result<Self> {
        config.validate()?;
        validate_mysql_connection_string(connection_string)?;
        let pool = create_mysql_connection_pool(connection_string, &config)?;
        Ok(Self { pool, config })
    }

    /// Wraps an existing pool.
    pub fn from_pool(pool: MySqlPool, config: ConnectionConfig) -> Self {
        Self { pool, config }
    }

    /// Closes the connection pool gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl MetadataSource for MySqlMetadataSource {
    async fn fetch_metadata(&self) -> Result<Vec<ColumnMetadata>> {
        let schema = self.config.schema.as_deref();
        let rows = sqlx::query(COLUMNS_QUERY)
            .bind(schema)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DataMaskError::metadata_failed("Failed to list MySQL columns", e))?;

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
            "Fetched {} columns from MySQL schema '{}'",
            columns.len(),
            schema.unwrap_or("<current>")
        );
        Ok(columns)
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::MySQL
    }
}

/// Validates the connection string scheme.
///
/// # Errors
/// Returns `Configuration` if the string is not a `mysql://` URL.
pub fn validate_mysql_connection_string(connection_string: &str) -> Result<()> {
    let url = url::Url::parse(connection_string).map_err(|e| {
        DataMaskError::configuration(format!("Invalid MySQL connection string format: {}", e))
    })?;

    if url.scheme() != "mysql" {
        return Err(DataMaskError::configuration(
            "Connection string must use mysql:// scheme",
        ));
    }
    Ok(())
}

fn create_mysql_connection_pool(
    connection_string: &str,
    config: &ConnectionConfig,
) -> Result<MySqlPool> {
    use sqlx::Executor;

    let query_timeout_ms = config.query_timeout.as_millis();
    let read_only = config.read_only;
    let url = driver_url(connection_string)?;

    sqlx::mysql::MySqlPoolOptions::new()
        .max_connections(config.max_connections.min(100))
        .acquire_timeout(config.connect_timeout)
        .test_before_acquire(true)
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                conn.execute(
                    format!("SET SESSION MAX_EXECUTION_TIME = {}", query_timeout_ms).as_str(),
                )
                .await?;

                if read_only {
                    conn.execute("SET SESSION TRANSACTION READ ONLY").await?;
                }
                Ok(())
            })
        })
        .connect_lazy(&url)
        .map_err(|e| {
            DataMaskError::metadata_failed(
                format!(
                    "Failed to create MySQL connection pool to {}",
                    redact_database_url(connection_string)
                ),
                e,
            )
        })
}
