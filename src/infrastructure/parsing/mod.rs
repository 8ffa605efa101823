//! Parsing infrastructure for experiment descriptions.
//!
//! This module handles the technical details of reading YAML/JSON
//! description text (or a pre-built value tree) and converting it into
//! the strongly-typed domain model. This is infrastructure code that
//! supports the domain but is not part of the domain itself.
//!
//! Parsing is shape-only: key presence, permitted value kinds, and the
//! disambiguation of the three step invocation forms. Semantic checks
//! (types, references, the graph) belong to the static analyzer and
//! never run when parsing fails.

pub mod converter;
pub mod document;

pub use converter::SchemaError;

use crate::experiment::description::{ExperimentDescription, Value};

/// Parses YAML description text into the domain model.
///
/// YAML is a superset of JSON, so JSON text is accepted here as well;
/// [`parse_json_str`] exists for producers that want strict JSON errors.
///
/// # Errors
///
/// Returns a [`SchemaError`] when the text does not parse or the value
/// tree does not conform to the structural schema.
pub fn parse_str(text: &str) -> Result<ExperimentDescription, SchemaError> {
    let value: Value = serde_yaml::from_str(text).map_err(|error| SchemaError::Parse {
        message: error.to_string(),
    })?;
    parse_value(&value)
}

/// Parses JSON description text into the domain model.
///
/// # Errors
///
/// Returns a [`SchemaError`] when the text does not parse or the value
/// tree does not conform to the structural schema.
pub fn parse_json_str(text: &str) -> Result<ExperimentDescription, SchemaError> {
    let json: serde_json::Value =
        serde_json::from_str(text).map_err(|error| SchemaError::Parse {
            message: error.to_string(),
        })?;
    let value = serde_yaml::to_value(&json).map_err(|error| SchemaError::Parse {
        message: error.to_string(),
    })?;
    parse_value(&value)
}

/// Converts an in-memory value tree into the domain model.
///
/// Any producer that emits the equivalent of the YAML/JSON surface form
/// is accepted; the source syntax is irrelevant.
///
/// # Errors
///
/// Returns a [`SchemaError`] when the value tree does not conform to the
/// structural schema.
pub fn parse_value(value: &Value) -> Result<ExperimentDescription, SchemaError> {
    let sections = document::split_sections(value)?;
    converter::convert(&sections)
}
