//! Database-side data models shared by the metadata sources and discovery.

use serde::{Deserialize, Serialize};

/// Supported database types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatabaseType {
    /// PostgreSQL, read through `information_schema`
    PostgreSQL,
    /// MySQL, read through `information_schema`
    MySQL,
    /// SQLite, read through `sqlite_master`
    SQLite,
    /// Metadata supplied in memory rather than read from a live database
    Static,
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseType::PostgreSQL => write!(f, "PostgreSQL"),
            DatabaseType::MySQL => write!(f, "MySQL"),
            DatabaseType::SQLite => write!(f, "SQLite"),
            DatabaseType::Static => write!(f, "static"),
        }
    }
}

/// One (table, column) pair as reported by the database, in native case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnMetadata {
    /// Owning table name
    pub table_name: String,
    /// Column name
    pub column_name: String,
}

impl ColumnMetadata {
    /// Creates metadata for one column.
    pub fn new(table_name: impl Into<String>, column_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            column_name: column_name.into(),
        }
    }

    /// Returns the `table.column` identifier used in discovery reports.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.table_name, self.column_name)
    }
}

impl<T: Into<String>, C: Into<String>> From<(T, C)> for ColumnMetadata {
    fn from((table_name, column_name): (T, C)) -> Self {
        Self::new(table_name, column_name)
    }
}
