//! Discovery of sensitive columns by name.
//!
//! The discoverer fetches every (table, column) pair from a
//! [`MetadataSource`] and reports the columns whose names fully match one of
//! the configured suspect patterns.
//!
//! Matching is case-insensitive for both the pattern and the table scope.
//! Results are sorted and are not deduplicated: a column matched by several
//! patterns is reported once per matching pattern.

pub mod config;

use crate::{Result, adapters::MetadataSource, error::DataMaskError, models::ColumnMetadata};
use regex::Regex;
use regex_syntax::{
    ParserBuilder,
    hir::{Hir, Look},
};
use std::collections::{BTreeMap, BTreeSet, HashSet};

pub use config::SuspectConfig;

/// Reserved key of the suspect mapping that holds the table scope rather than
/// a pattern.
pub const TABLES_KEY: &str = "tables";

/// Receives progress and results of a discovery run.
pub trait DiscoveryObserver: Send + Sync {
    /// Called before metadata is fetched.
    fn discovery_started(&self) {}

    /// Called with the final, sorted list of suspects.
    fn suspects_found(&self, suspects: &[String]);
}

/// Reports discovery through `tracing` at INFO level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl DiscoveryObserver for TracingObserver {
    fn discovery_started(&self) {
        tracing::info!("Column discovery in process");
    }

    fn suspects_found(&self, suspects: &[String]) {
        tracing::info!("-----------------");
        tracing::info!("List of suspects:");
        tracing::info!("-----------------");
        for suspect in suspects {
            tracing::info!("{}", suspect);
        }
    }
}

/// Finds columns whose names match suspect patterns.
#[derive(Default)]
pub struct ColumnDiscoverer {
    observer: Option<Box<dyn DiscoveryObserver>>,
}

impl std::fmt::Debug for ColumnDiscoverer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnDiscoverer")
            .field("has_observer", &self.observer.is_some())
            .finish()
    }
}

impl ColumnDiscoverer {
    /// Creates a discoverer without an observer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to attach an observer.
    pub fn with_observer(mut self, observer: impl DiscoveryObserver + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Runs discovery against a metadata source.
    ///
    /// # Arguments
    /// * `source` - Supplies the (table, column) pairs
    /// * `suspect_patterns` - Pattern keys mapped to unused markers; the
    ///   reserved [`TABLES_KEY`] entry is ignored here
    /// * `table_scope` - Tables to consider; empty means every table
    ///
    /// # Errors
    /// Fails as a whole, without partial results, when the metadata fetch
    /// fails or any pattern is not a valid regular expression.
    pub async fn discover<V>(
        &self,
        source: &dyn MetadataSource,
        suspect_patterns: &BTreeMap<String, V>,
        table_scope: &BTreeSet<String>,
    ) -> Result<Vec<String>> {
        if let Some(observer) = &self.observer {
            observer.discovery_started();
        }

        let patterns: Vec<&str> = suspect_patterns
            .keys()
            .map(String::as_str)
            .filter(|key| *key != TABLES_KEY)
            .collect();

        let columns = source.fetch_metadata().await?;
        tracing::debug!(
            "Matching {} columns from {} against {} patterns",
            columns.len(),
            source.database_type(),
            patterns.len()
        );

        let suspects = match_columns(&columns, patterns, table_scope)?;

        if let Some(observer) = &self.observer {
            observer.suspects_found(&suspects);
        }
        Ok(suspects)
    }
}

/// Matches column metadata against suspect patterns.
///
/// Every pattern is compiled before any column is examined, so an invalid
/// pattern yields `PatternSyntax` and no results. Each match is recorded as
/// `table.column` in the source's native case; the result is sorted.
pub fn match_columns<'p>(
    columns: &[ColumnMetadata],
    patterns: impl IntoIterator<Item = &'p str>,
    table_scope: &BTreeSet<String>,
) -> Result<Vec<String>> {
    let compiled = patterns
        .into_iter()
        .map(compile_suspect)
        .collect::<Result<Vec<_>>>()?;

    let scope: HashSet<String> = table_scope.iter().map(|t| t.to_lowercase()).collect();

    let mut matches = Vec::new();
    for pattern in &compiled {
        for column in columns {
            if !scope.is_empty() && !scope.contains(&column.table_name.to_lowercase()) {
                continue;
            }
            if pattern.is_match(&column.column_name) {
                matches.push(column.qualified_name());
            }
        }
    }

    matches.sort();
    Ok(matches)
}

/// Compiles a suspect pattern for case-insensitive whole-name matching.
///
/// The anchors are added to the parsed expression rather than to the pattern
/// text, so flags and comments inside the pattern cannot reach them.
fn compile_suspect(pattern: &str) -> Result<Regex> {
    let hir = ParserBuilder::new()
        .case_insensitive(true)
        .build()
        .parse(pattern)
        .map_err(|e| DataMaskError::pattern_syntax(pattern, e))?;

    let anchored = Hir::concat(vec![Hir::look(Look::Start), hir, Hir::look(Look::End)]);

    // The printed form is flag-free and already case-folded
    Regex::new(&anchored.to_string()).map_err(|e| DataMaskError::pattern_syntax(pattern, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(pairs: &[(&str, &str)]) -> Vec<ColumnMetadata> {
        pairs.iter().map(|&(t, c)| ColumnMetadata::new(t, c)).collect()
    }

    fn scope(tables: &[&str]) -> BTreeSet<String> {
        tables.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_full_match_only() {
        let metadata = columns(&[("users", "ssn"), ("orders", "ssn_ref")]);
        let result = match_columns(&metadata, ["^ssn$"], &scope(&[])).unwrap();
        assert_eq!(result, vec!["users.ssn"]);

        let result = match_columns(&metadata, ["ssn"], &scope(&[])).unwrap();
        assert_eq!(result, vec!["users.ssn"]);
    }

    #[test]
    fn test_alternation_must_cover_whole_name() {
        let metadata = columns(&[("t", "ab")]);
        let result = match_columns(&metadata, ["a|ab"], &scope(&[])).unwrap();
        assert_eq!(result, vec!["t.ab"]);
    }

    #[test]
    fn test_table_scope_excludes_other_tables() {
        let metadata = columns(&[("users", "ssn"), ("orders", "ssn_ref")]);
        let result = match_columns(&metadata, ["^ssn$"], &scope(&["orders"])).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_case_insensitive_matching() {
        let metadata = columns(&[("Users", "EMAIL_Address"), ("ORDERS", "Email")]);
        let result = match_columns(&metadata, ["(.*)email(.*)"], &scope(&["users"])).unwrap();
        assert_eq!(result, vec!["Users.EMAIL_Address"]);

        let result = match_columns(&metadata, ["EMAIL"], &scope(&["Orders"])).unwrap();
        assert_eq!(result, vec!["ORDERS.Email"]);
    }

    #[test]
    fn test_duplicates_are_kept_and_sorted() {
        let metadata = columns(&[("b", "email"), ("a", "email"), ("a", "phone")]);
        let result =
            match_columns(&metadata, ["(.*)mail", "email", "phone"], &scope(&[])).unwrap();
        assert_eq!(
            result,
            vec!["a.email", "a.email", "a.phone", "b.email", "b.email"]
        );
    }

    #[test]
    fn test_invalid_pattern_aborts() {
        let metadata = columns(&[("users", "ssn")]);
        for bad in ["(unclosed", ")(", "[z-a]"] {
            match match_columns(&metadata, ["ssn", bad], &scope(&[])) {
                Err(DataMaskError::PatternSyntax { pattern, .. }) => assert_eq!(pattern, bad),
                other => panic!("expected PatternSyntax for '{}', got {:?}", bad, other),
            }
        }
    }

    #[test]
    fn test_verbose_pattern_with_trailing_comment() {
        let metadata = columns(&[("users", "ssn"), ("users", "ssn_hash")]);
        let result =
            match_columns(&metadata, ["(?x) s s n  # social security"], &scope(&[])).unwrap();
        assert_eq!(result, vec!["users.ssn"]);
    }

    #[test]
    fn test_inline_flags_stay_inside_pattern() {
        let metadata = columns(&[("t", "SSN"), ("t", "ssn")]);
        let result = match_columns(&metadata, ["(?-i)ssn"], &scope(&[])).unwrap();
        assert_eq!(result, vec!["t.ssn"]);

        let metadata = columns(&[("t", "a\nb")]);
        let result = match_columns(&metadata, ["(?m)a$"], &scope(&[])).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_no_patterns_no_matches() {
        let metadata = columns(&[("users", "ssn")]);
        let result = match_columns(&metadata, Vec::<&str>::new(), &scope(&[])).unwrap();
        assert!(result.is_empty());
    }
}
