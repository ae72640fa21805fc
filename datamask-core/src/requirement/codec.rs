//! Loading and writing requirement documents.
//!
//! Two renditions share one object graph: XML, the primary format, and JSON
//! with camelCase field names. Path-based calls pick the format from the file
//! extension; reader/writer based calls take it explicitly.

use super::{Parameter, Requirement, xml};
use crate::{Result, error::DataMaskError};
use std::io::{Read, Write};
use std::path::Path;

/// Reserved parameter name for external resource files.
pub const PARAM_NAME_FILE: &str = "file";

/// Persisted form of a requirement document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequirementFormat {
    /// `<Requirement>` element tree
    #[default]
    Xml,
    /// camelCase JSON object
    Json,
}

impl RequirementFormat {
    /// `.json` files are JSON; everything else is treated as XML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => RequirementFormat::Json,
            _ => RequirementFormat::Xml,
        }
    }
}

impl std::fmt::Display for RequirementFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequirementFormat::Xml => write!(f, "XML"),
            RequirementFormat::Json => write!(f, "JSON"),
        }
    }
}

/// Loads a requirement document from a file.
///
/// # Errors
/// - `DocumentAccess` if the file cannot be read
/// - `DocumentFormat` if its content is not UTF-8 or not a well-formed document
pub fn load(path: impl AsRef<Path>) -> Result<Requirement> {
    let path = path.as_ref();
    let format = RequirementFormat::from_path(path);
    tracing::debug!("Loading {} requirement from {}", format, path.display());

    let bytes = std::fs::read(path).map_err(|e| DataMaskError::document_access(path, e))?;
    let requirement = load_from_str(&decode_utf8(bytes)?, format)?;

    tracing::info!(
        "Loaded requirement for client '{}' (version {}) with {} tables",
        requirement.client,
        requirement.version,
        requirement.tables.len()
    );
    Ok(requirement)
}

/// Loads a requirement document from any reader.
///
/// # Errors
/// - `DocumentAccess` without a path if the reader fails
/// - `DocumentFormat` if its content is not UTF-8 or not a well-formed document
pub fn load_from_reader<R: Read>(mut reader: R, format: RequirementFormat) -> Result<Requirement> {
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(DataMaskError::stream_access)?;
    load_from_str(&decode_utf8(bytes)?, format)
}

/// Parses a requirement document held in memory.
///
/// # Errors
/// Returns `DocumentFormat` if the content is not a well-formed document.
pub fn load_from_str(content: &str, format: RequirementFormat) -> Result<Requirement> {
    match format {
        RequirementFormat::Xml => xml::parse(content),
        RequirementFormat::Json => serde_json::from_str(content).map_err(|e| {
            DataMaskError::document_format(
                Some(json_offset(content, e.line(), e.column())),
                e.to_string(),
            )
        }),
    }
}

/// Serializes a requirement document to text.
///
/// # Errors
/// Returns `Serialization` or `DocumentFormat` if rendering fails.
pub fn to_string(requirement: &Requirement, format: RequirementFormat) -> Result<String> {
    match format {
        RequirementFormat::Xml => {
            let bytes = xml::render(requirement)?;
            String::from_utf8(bytes).map_err(|e| {
                DataMaskError::document_format(None, format!("Rendered XML is not UTF-8: {}", e))
            })
        }
        RequirementFormat::Json => {
            let mut json = serde_json::to_string_pretty(requirement).map_err(|e| {
                DataMaskError::Serialization {
                    context: "Failed to serialize requirement to JSON".to_string(),
                    source: e,
                }
            })?;
            json.push('\n');
            Ok(json)
        }
    }
}

/// Writes a requirement document to a file, replacing any existing content.
///
/// # Errors
/// Returns `DocumentAccess` if the destination is not writable.
pub fn write(requirement: &Requirement, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let format = RequirementFormat::from_path(path);
    let content = to_string(requirement, format)?;

    std::fs::write(path, content).map_err(|e| DataMaskError::document_access(path, e))?;
    tracing::debug!("Wrote {} requirement to {}", format, path.display());
    Ok(())
}

/// Writes a requirement document to any writer and flushes it.
///
/// # Errors
/// Returns `DocumentAccess` without a path if the writer fails.
pub fn write_to_writer<W: Write>(
    requirement: &Requirement,
    mut writer: W,
    format: RequirementFormat,
) -> Result<()> {
    let content = to_string(requirement, format)?;
    writer
        .write_all(content.as_bytes())
        .and_then(|()| writer.flush())
        .map_err(DataMaskError::stream_access)
}

/// Returns the first parameter named [`PARAM_NAME_FILE`], if any.
pub fn file_parameter(parameters: &[Parameter]) -> Option<&Parameter> {
    parameters
        .iter()
        .find(|parameter| parameter.name == PARAM_NAME_FILE)
}

/// Coerces every parameter in the document and collects the failures in
/// document order. An empty result means every parameter is usable.
pub fn validate(requirement: &Requirement) -> Vec<DataMaskError> {
    requirement
        .parameters()
        .filter_map(|(table, column, parameter)| match parameter.type_value() {
            Ok(_) => None,
            Err(e) => {
                tracing::debug!("{}.{}: {}", table.name, column.name, e);
                Some(e)
            }
        })
        .collect()
}

fn decode_utf8(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| {
        let offset = e.utf8_error().valid_up_to() as u64;
        DataMaskError::document_format(Some(offset), "document is not valid UTF-8")
    })
}

/// Converts serde_json's 1-based line/column into a byte offset.
fn json_offset(content: &str, line: usize, column: usize) -> u64 {
    let line_start: usize = content
        .split_inclusive('\n')
        .take(line.saturating_sub(1))
        .map(str::len)
        .sum();
    line_start.saturating_add(column.saturating_sub(1)) as u64
}
