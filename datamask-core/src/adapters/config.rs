//! Database connection configuration.
//!
//! This module provides the `ConnectionConfig` struct for configuring
//! metadata connections with read-only defaults.

use crate::{Result, error::DataMaskError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Configuration for metadata connections.
///
/// # Security
/// This struct intentionally does NOT store passwords or credentials.
/// Credentials stay in the connection string handed to the driver.
///
/// # Example
/// ```rust
/// use datamask_core::adapters::ConnectionConfig;
///
/// let config = ConnectionConfig::new("localhost".to_string())
///     .with_port(5432)
///     .with_database("mydb".to_string())
///     .with_schema("billing".to_string());
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Database host address
    pub host: String,
    /// Optional port number
    pub port: Option<u16>,
    /// Optional database name
    pub database: Option<String>,
    /// Schema whose columns are listed; the engine default when unset
    pub schema: Option<String>,
    /// Optional username (password handled separately)
    pub username: Option<String>,
    /// Connection timeout duration
    pub connect_timeout: Duration,
    /// Query timeout duration
    pub query_timeout: Duration,
    /// Maximum number of connections in pool
    pub max_connections: u32,
    /// Whether to enforce read-only mode
    pub read_only: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: None,
            database: None,
            schema: None,
            username: None,
            connect_timeout: Duration::from_secs(30),
            query_timeout: Duration::from_secs(30),
            max_connections: 2,
            read_only: true,
        }
    }
}

impl std::fmt::Display for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ConnectionConfig({}{}{})",
            self.host,
            self.port.map_or_else(String::new, |p| format!(":{}", p)),
            self.database
                .as_ref()
                .map_or_else(String::new, |db| format!("/{}", db))
        )
        // Intentionally omit username and never include credentials
    }
}

impl ConnectionConfig {
    /// Validates connection configuration parameters.
    ///
    /// # Errors
    /// Returns error if configuration values are invalid or unsafe
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(DataMaskError::configuration("host cannot be empty"));
        }

        if self.port == Some(0) {
            return Err(DataMaskError::configuration("port must be greater than 0"));
        }

        if self.schema.as_deref().is_some_and(str::is_empty) {
            return Err(DataMaskError::configuration("schema cannot be empty"));
        }

        if self.max_connections == 0 {
            return Err(DataMaskError::configuration(
                "max_connections must be greater than 0",
            ));
        }

        if self.max_connections > 100 {
            return Err(DataMaskError::configuration(
                "max_connections should not exceed 100 for safety",
            ));
        }

        if self.connect_timeout.is_zero() {
            return Err(DataMaskError::configuration(
                "connect_timeout must be greater than 0",
            ));
        }

        if self.query_timeout.is_zero() {
            return Err(DataMaskError::configuration(
                "query_timeout must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Creates a new connection config with safe defaults.
    pub fn new(host: String) -> Self {
        Self {
            host,
            ..Default::default()
        }
    }

    /// Parses a server connection URL (`postgres://`, `mysql://`).
    ///
    /// Recognized query parameters: `schema`, `connect_timeout` (seconds),
    /// `statement_timeout` (milliseconds) and `pool_max_conns`. Out-of-range
    /// values are ignored and other parameters are left to the driver.
    ///
    /// # Errors
    /// Returns `Configuration` if the URL is malformed or the resulting
    /// configuration does not validate. The message never includes the URL.
    pub fn from_url(connection_string: &str, default_port: u16) -> Result<Self> {
        let url = Url::parse(connection_string).map_err(|e| {
            DataMaskError::configuration(format!("Invalid connection string format: {}", e))
        })?;

        let mut config = Self::new(url.host_str().unwrap_or("localhost").to_string())
            .with_port(url.port().unwrap_or(default_port));

        let database = url.path().trim_start_matches('/');
        if !database.is_empty() {
            config = config.with_database(database.to_string());
        }

        if !url.username().is_empty() {
            config = config.with_username(url.username().to_string());
        }

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "schema" => config.schema = Some(value.into_owned()),
                "connect_timeout" => {
                    if let Ok(timeout_secs) = value.parse::<u64>()
                        && timeout_secs > 0
                        && timeout_secs <= 300
                    {
                        config.connect_timeout = Duration::from_secs(timeout_secs);
                    }
                }
                "statement_timeout" => {
                    if let Ok(timeout_ms) = value.parse::<u64>()
                        && timeout_ms > 0
                        && timeout_ms <= 300_000
                    {
                        config.query_timeout = Duration::from_millis(timeout_ms);
                    }
                }
                "pool_max_conns" => {
                    if let Ok(max_conns) = value.parse::<u32>()
                        && max_conns > 0
                        && max_conns <= 100
                    {
                        config.max_connections = max_conns;
                    }
                }
                _ => {}
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Builder method to set port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Builder method to set database.
    pub fn with_database(mut self, database: String) -> Self {
        self.database = Some(database);
        self
    }

    /// Builder method to set the schema to inspect.
    pub fn with_schema(mut self, schema: String) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Builder method to set username.
    pub fn with_username(mut self, username: String) -> Self {
        self.username = Some(username);
        self
    }
}

/// Removes the query parameters this crate interprets so the driver does not
/// reject them as unknown options.
#[cfg(any(feature = "postgresql", feature = "mysql"))]
pub(crate) fn driver_url(connection_string: &str) -> Result<String> {
    let mut url = Url::parse(connection_string).map_err(|e| {
        DataMaskError::configuration(format!("Invalid connection string format: {}", e))
    })?;

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| {
            !matches!(
                key.as_ref(),
                "schema" | "connect_timeout" | "statement_timeout" | "pool_max_conns"
            )
        })
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    Ok(url.to_string())
}
