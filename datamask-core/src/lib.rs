//! Core data structures and utilities for datamask.
//!
//! This crate holds the two halves of a database anonymizer's front end:
//! discovery of columns that probably carry sensitive data, and the typed
//! requirement documents that describe how each column is to be anonymized.
//!
//! # Security Guarantees
//! - All database operations are read-only catalog queries
//! - No credentials stored or logged in any data structures
//! - Connection strings are redacted in error messages
//!
//! # Architecture
//! - `adapters`: metadata sources behind one object-safe trait, with a
//!   factory that picks the source from the connection string
//! - `discovery`: suspect-pattern matching over column metadata
//! - `requirement`: the requirement document model and its XML/JSON codec
//! - `error`: one error enum for the whole crate

pub mod adapters;
pub mod discovery;
pub mod error;
pub mod logging;
pub mod models;
pub mod requirement;

// Re-export commonly used types
pub use adapters::{ConnectionConfig, MetadataSource, StaticMetadataSource, create_metadata_source};
pub use discovery::{ColumnDiscoverer, DiscoveryObserver, SuspectConfig, TracingObserver};
pub use error::{DataMaskError, Result};
pub use logging::init_logging;
pub use models::{ColumnMetadata, DatabaseType};
pub use requirement::{
    Column, DeclaredType, Key, Parameter, Requirement, RequirementFormat, Table, TypedValue,
};
