//! Requirement documents: the declarative anonymization plan.
//!
//! A [`Requirement`] lists the tables to anonymize, and for each table the
//! columns to transform, the function to apply and its typed parameters.
//! The whole graph is owned by the document; element order is preserved
//! exactly as declared.
//!
//! # Module Structure
//! - `parameter`: typed parameters and the declared-type vocabulary
//! - `codec`: loading and writing documents (XML and JSON)
//! - `xml`: the XML reader and writer behind the codec

pub mod codec;
pub mod parameter;
mod xml;

use serde::{Deserialize, Serialize};

pub use codec::{
    PARAM_NAME_FILE, RequirementFormat, file_parameter, load, load_from_reader, load_from_str,
    to_string, validate, write, write_to_writer,
};
pub use parameter::{DeclaredType, Parameter, TypedValue};

/// Top-level requirement document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirement {
    /// Client the plan was written for
    #[serde(default)]
    pub client: String,
    /// Free-form version of the plan
    #[serde(default)]
    pub version: String,
    /// Tables to anonymize, in declared order
    #[serde(default)]
    pub tables: Vec<Table>,
}

impl Requirement {
    /// Creates a document without tables.
    pub fn new(client: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            client: client.into(),
            version: version.into(),
            tables: Vec::new(),
        }
    }

    /// Builder method to append a table.
    pub fn with_table(mut self, table: Table) -> Self {
        self.tables.push(table);
        self
    }

    /// Finds the first table with the given name.
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|table| table.name == name)
    }

    /// Iterates over every parameter together with its owning table and column,
    /// in document order.
    pub fn parameters(&self) -> impl Iterator<Item = (&Table, &Column, &Parameter)> {
        self.tables.iter().flat_map(|table| {
            table.columns.iter().flat_map(move |column| {
                column
                    .parameters
                    .iter()
                    .map(move |parameter| (table, column, parameter))
            })
        })
    }
}

/// A table to anonymize.
///
/// `primary_key` is the legacy single-key form and `primary_keys` the
/// composite form. They are populated independently and neither is derived
/// from the other.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    /// Table name as known to the database
    pub name: String,
    /// Legacy single primary key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,
    /// Composite primary key components, in declared order
    #[serde(default)]
    pub primary_keys: Vec<Key>,
    /// Columns to transform, in declared order
    #[serde(default)]
    pub columns: Vec<Column>,
}

impl Table {
    /// Creates a table without keys or columns.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Builder method to set the legacy single primary key.
    pub fn with_primary_key(mut self, key: impl Into<String>) -> Self {
        self.primary_key = Some(key.into());
        self
    }

    /// Builder method to append one component of a composite primary key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.primary_keys.push(Key::new(key));
        self
    }

    /// Builder method to append a column.
    pub fn with_column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Finds the first column with the given name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }
}

/// One component of a composite primary key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    /// Key column name
    pub name: String,
}

impl Key {
    /// Creates a key component.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A column and the anonymization function applied to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    /// Column name as known to the database
    pub name: String,
    /// Identifier of the anonymization function; opaque to this crate
    #[serde(default)]
    pub function: String,
    /// Arguments for the function, in declared order
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

impl Column {
    /// Creates a column without parameters.
    pub fn new(name: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            function: function.into(),
            parameters: Vec::new(),
        }
    }

    /// Builder method to append a parameter.
    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Finds the first parameter with the given name.
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|parameter| parameter.name == name)
    }
}
