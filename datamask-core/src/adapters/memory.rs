//! Metadata held in memory.

use super::MetadataSource;
use crate::{
    Result,
    models::{ColumnMetadata, DatabaseType},
};
use async_trait::async_trait;

/// Returns a fixed list of columns, in the order given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticMetadataSource {
    columns: Vec<ColumnMetadata>,
}

impl StaticMetadataSource {
    /// Creates a source from anything convertible to [`ColumnMetadata`],
    /// including `(table, column)` tuples.
    pub fn new<I, C>(columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<ColumnMetadata>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the served columns in insertion order.
    pub fn columns(&self) -> &[ColumnMetadata] {
        &self.columns
    }
}

#[async_trait]
impl MetadataSource for StaticMetadataSource {
    async fn fetch_metadata(&self) -> Result<Vec<ColumnMetadata>> {
        Ok(self.columns.clone())
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::Static
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_returns_columns_in_order() {
        let source = StaticMetadataSource::new([("users", "ssn"), ("orders", "ssn_ref")]);
        let columns = source.fetch_metadata().await.unwrap();
        assert_eq!(
            columns,
            vec![
                ColumnMetadata::new("users", "ssn"),
                ColumnMetadata::new("orders", "ssn_ref")
            ]
        );
        assert_eq!(source.database_type(), DatabaseType::Static);
    }
}
