//! SQLite metadata source.
//!
//! Columns are read by joining `sqlite_master` with the `pragma_table_info`
//! table-valued function. Internal `sqlite_%` tables are skipped.
//!
//! # Connection Modes
//! - File-based: `sqlite:///path/to/database.db` or `sqlite://./relative.db`
//! - Plain paths ending in `.db`, `.sqlite` or `.sqlite3`
//! - In-memory: `sqlite::memory:` or `:memory:`

use super::{ConnectionConfig, MetadataSource};
use crate::{
    Result,
    error::DataMaskError,
    models::{ColumnMetadata, DatabaseType},
};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

const COLUMNS_QUERY: &str = r#"
    SELECT m.name AS table_name, p.name AS column_name
    FROM sqlite_master m
    JOIN pragma_table_info(m.name) p
    WHERE m.type = 'table'
    AND m.name NOT LIKE 'sqlite_%'
    ORDER BY m.name, p.cid
"#;

/// Reads column metadata from a SQLite database.
pub struct SqliteMetadataSource {
    pool: SqlitePool,
    config: ConnectionConfig,
}

impl std::fmt::Debug for SqliteMetadataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteMetadataSource")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SqliteMetadataSource {
    /// Opens a SQLite database read-only.
    ///
    /// # Errors
    /// Returns error if:
    /// - Connection string format is invalid
    /// - Database cannot be opened
    pub async fn new(connection_string: &str) -> Result<Self> {
        let config = parse_sqlite_connection_config(connection_string)?;
        let pool = create_sqlite_connection(connection_string, &config).await?;
        Ok(Self { pool, config })
    }

    /// Wraps an existing pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        let config = ConnectionConfig {
            max_connections: 1,
            ..ConnectionConfig::default()
        };
        Self { pool, config }
    }

    /// Returns the configuration the source was opened with.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Closes the connection gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl MetadataSource for SqliteMetadataSource {
    async fn fetch_metadata(&self) -> Result<Vec<ColumnMetadata>> {
        let rows = sqlx::query(COLUMNS_QUERY)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DataMaskError::metadata_failed("Failed to list SQLite columns", e))?;

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

        tracing::debug!("Fetched {} columns from SQLite", columns.len());
        Ok(columns)
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::SQLite
    }
}

/// Parses a SQLite connection string into a configuration.
pub fn parse_sqlite_connection_config(connection_string: &str) -> Result<ConnectionConfig> {
    validate_sqlite_connection_string(connection_string)?;

    // SQLite has no host or port and needs a single connection
    let mut config = ConnectionConfig::new("localhost".to_string())
        .with_database(extract_database_name(connection_string));
    config.max_connections = 1;
    Ok(config)
}

/// Validates SQLite connection string format.
///
/// # Errors
/// Returns `Configuration` if the connection string is not a `sqlite:` URL,
/// a database file path, or `:memory:`.
pub fn validate_sqlite_connection_string(connection_string: &str) -> Result<()> {
    if connection_string == ":memory:"
        || connection_string.starts_with("sqlite:")
        || connection_string.ends_with(".db")
        || connection_string.ends_with(".sqlite")
        || connection_string.ends_with(".sqlite3")
    {
        return Ok(());
    }

    Err(DataMaskError::configuration(
        "Invalid SQLite connection string format: expected sqlite:// URL, file path, or :memory:",
    ))
}

fn extract_database_name(connection_string: &str) -> String {
    if connection_string.contains(":memory:") {
        return ":memory:".to_string();
    }

    let path = connection_string
        .strip_prefix("sqlite://")
        .or_else(|| connection_string.strip_prefix("sqlite:"))
        .unwrap_or(connection_string);
    let path = path.split('?').next().unwrap_or(path);

    match path.rsplit('/').next() {
        Some(filename) if !filename.is_empty() => filename.to_string(),
        _ => "main".to_string(),
    }
}

async fn create_sqlite_connection(
    connection_string: &str,
    config: &ConnectionConfig,
) -> Result<SqlitePool> {
    use sqlx::sqlite::SqliteConnectOptions;
    use std::str::FromStr;

    let normalized = normalize_connection_string(connection_string);

    let options = SqliteConnectOptions::from_str(&normalized)
        .map_err(|e| {
            DataMaskError::configuration(format!("Invalid SQLite connection string: {}", e))
        })?
        .read_only(config.read_only);

    sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .acquire_timeout(config.connect_timeout)
        .connect_with(options)
        .await
        .map_err(|e| DataMaskError::metadata_failed("Failed to open SQLite database", e))
}

fn normalize_connection_string(connection_string: &str) -> String {
    if connection_string == ":memory:" {
        return "sqlite::memory:".to_string();
    }

    if connection_string.starts_with("sqlite:") {
        return connection_string.to_string();
    }

    format!("sqlite://{}", connection_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_sqlite_connection_string() {
        for valid in [
            ":memory:",
            "sqlite::memory:",
            "sqlite:///path/to/db.sqlite",
            "sqlite://./test.db",
            "/path/to/database.db",
            "data.sqlite3",
        ] {
            assert!(validate_sqlite_connection_string(valid).is_ok(), "{}", valid);
        }

        for invalid in ["postgres://localhost/db", "mysql://localhost/db", "invalid"] {
            assert!(validate_sqlite_connection_string(invalid).is_err(), "{}", invalid);
        }
    }

    #[test]
    fn test_extract_database_name() {
        assert_eq!(extract_database_name(":memory:"), ":memory:");
        assert_eq!(extract_database_name("sqlite::memory:"), ":memory:");
        assert_eq!(
            extract_database_name("sqlite:///path/to/mydb.sqlite?mode=ro"),
            "mydb.sqlite"
        );
        assert_eq!(extract_database_name("sqlite://./test.db"), "test.db");
        assert_eq!(extract_database_name("/var/data/app.db"), "app.db");
    }

    #[test]
    fn test_normalize_connection_string() {
        assert_eq!(normalize_connection_string(":memory:"), "sqlite::memory:");
        assert_eq!(
            normalize_connection_string("sqlite:///path/db.sqlite"),
            "sqlite:///path/db.sqlite"
        );
        assert_eq!(
            normalize_connection_string("/path/to/db.sqlite"),
            "sqlite:///path/to/db.sqlite"
        );
    }

    #[test]
    fn test_parse_sqlite_connection_config() {
        let config = parse_sqlite_connection_config("sqlite:///path/to/test.db").unwrap();
        assert_eq!(config.database.as_deref(), Some("test.db"));
        assert_eq!(config.max_connections, 1);
        assert_eq!(config.port, None);
        assert!(config.read_only);
    }
}
