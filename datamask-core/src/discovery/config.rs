//! Suspect-pattern configuration.
//!
//! A suspect file is a flat TOML document whose top-level keys are regular
//! expressions. Quote keys with single quotes so backslashes survive:
//!
//! ```toml
//! '(.*)ssn(.*)' = ""
//! '\w*_email' = ""
//! tables = "users, orders"
//! ```
//!
//! The reserved `tables` key limits discovery to the listed tables. It may be
//! a comma-separated string or an array of strings.

use super::TABLES_KEY;
use crate::{Result, error::DataMaskError};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Suspect patterns shipped for use when no configuration file is supplied.
const DEFAULT_SUSPECTS: &[&str] = &[
    "(.*)password(.*)",
    "(.*)passwd(.*)",
    "(.*)email(.*)",
    "(.*)ssn(.*)",
    "(.*)social_security(.*)",
    "(.*)phone(.*)",
    "(.*)birth(.*)",
    "(.*)address(.*)",
    "(.*)credit_card(.*)",
    "(.*)card_number(.*)",
];

/// Suspect patterns plus the optional table scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuspectConfig {
    entries: BTreeMap<String, String>,
    table_scope: BTreeSet<String>,
}

impl Default for SuspectConfig {
    fn default() -> Self {
        DEFAULT_SUSPECTS
            .iter()
            .fold(Self::empty(), |config, pattern| config.with_pattern(*pattern))
    }
}

impl SuspectConfig {
    /// Creates a configuration with no patterns and no scope.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
            table_scope: BTreeSet::new(),
        }
    }

    /// Parses a suspect configuration from TOML text.
    ///
    /// # Errors
    /// Returns `Configuration` for malformed TOML, nested tables, or a
    /// `tables` value that is neither a string nor an array of strings.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let document: toml::Table = toml::from_str(content).map_err(|e| {
            DataMaskError::configuration(format!("Invalid suspect configuration: {}", e))
        })?;

        let mut config = Self::empty();
        for (key, value) in document {
            if key == TABLES_KEY {
                let tables = scope_entries(&value)?;
                config = config.with_table_scope(tables);
                continue;
            }

            let marker = match value {
                toml::Value::String(text) => text,
                toml::Value::Table(_) => {
                    return Err(DataMaskError::configuration(format!(
                        "Suspect pattern '{}' must map to a scalar, found a table",
                        key
                    )));
                }
                other => other.to_string(),
            };
            config.entries.insert(key, marker);
        }

        tracing::debug!(
            "Parsed {} suspect patterns with {} scoped tables",
            config.patterns().count(),
            config.table_scope.len()
        );
        Ok(config)
    }

    /// Reads and parses a suspect configuration file.
    ///
    /// # Errors
    /// Returns `Io` if the file cannot be read and `Configuration` if it
    /// cannot be parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DataMaskError::io(
                format!("Failed to read suspect configuration {}", path.display()),
                e,
            )
        })?;
        Self::from_toml_str(&content)
    }

    /// Builder method to add a suspect pattern.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.entries.insert(pattern.into(), String::new());
        self
    }

    /// Builder method to extend the table scope. Names are trimmed and
    /// lowercased; blank names are dropped.
    pub fn with_table_scope<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.table_scope.extend(
            tables
                .into_iter()
                .map(|table| table.as_ref().trim().to_lowercase())
                .filter(|table| !table.is_empty()),
        );
        if !self.table_scope.is_empty() {
            let joined = self
                .table_scope
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(",");
            self.entries.insert(TABLES_KEY.to_string(), joined);
        }
        self
    }

    /// Pattern keys in order, excluding the reserved `tables` key.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.entries
            .keys()
            .map(String::as_str)
            .filter(|key| *key != TABLES_KEY)
    }

    /// Lowercased table names discovery is limited to; empty means all.
    pub fn table_scope(&self) -> &BTreeSet<String> {
        &self.table_scope
    }

    /// The full mapping, reserved key included.
    pub fn suspect_patterns(&self) -> &BTreeMap<String, String> {
        &self.entries
    }
}

fn scope_entries(value: &toml::Value) -> Result<Vec<String>> {
    match value {
        toml::Value::String(text) => Ok(text.split(',').map(str::to_string).collect()),
        toml::Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    DataMaskError::configuration(format!(
                        "'{}' entries must be strings, found {}",
                        TABLES_KEY,
                        item.type_str()
                    ))
                })
            })
            .collect(),
        other => Err(DataMaskError::configuration(format!(
            "'{}' must be a string or an array of strings, found {}",
            TABLES_KEY,
            other.type_str()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patterns_and_comma_scope() {
        let config = SuspectConfig::from_toml_str(
            r#"
'(.*)ssn(.*)' = ""
'\w*_email' = "pii"
tables = " Users , ORDERS,, "
"#,
        )
        .unwrap();

        let patterns: Vec<_> = config.patterns().collect();
        assert_eq!(patterns, vec!["(.*)ssn(.*)", r"\w*_email"]);

        let scope: Vec<_> = config.table_scope().iter().cloned().collect();
        assert_eq!(scope, vec!["orders", "users"]);

        assert!(config.suspect_patterns().contains_key(TABLES_KEY));
        assert_eq!(config.suspect_patterns()[r"\w*_email"], "pii");
    }

    #[test]
    fn test_array_scope_and_scalar_markers() {
        let config = SuspectConfig::from_toml_str(
            r#"
phone = 1
email = true
tables = ["customers", " Accounts "]
"#,
        )
        .unwrap();
        assert_eq!(config.suspect_patterns()["phone"], "1");
        assert_eq!(config.suspect_patterns()["email"], "true");
        assert!(config.table_scope().contains("accounts"));
        assert!(config.table_scope().contains("customers"));
    }

    #[test]
    fn test_no_scope_means_no_reserved_entry() {
        let config = SuspectConfig::from_toml_str("ssn = \"\"").unwrap();
        assert!(config.table_scope().is_empty());
        assert!(!config.suspect_patterns().contains_key(TABLES_KEY));
    }

    #[test]
    fn test_invalid_configurations() {
        let cases = [
            "not toml at all ===",
            "tables = 5",
            "tables = [1, 2]",
            "[nested]\nssn = \"\"",
        ];
        for content in cases {
            let result = SuspectConfig::from_toml_str(content);
            assert!(
                matches!(result, Err(DataMaskError::Configuration { .. })),
                "expected Configuration error for {:?}, got {:?}",
                content,
                result
            );
        }
    }

    #[test]
    fn test_default_has_builtin_suspects() {
        let config = SuspectConfig::default();
        assert!(config.patterns().any(|p| p == "(.*)email(.*)"));
        assert!(config.table_scope().is_empty());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = SuspectConfig::from_path("/nonexistent/suspects.toml");
        assert!(matches!(result, Err(DataMaskError::Io { .. })));
    }
}
