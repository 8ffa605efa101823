//! Structural shape checks over the raw description value.
//!
//! The description arrives as an arbitrary value tree; this module
//! verifies the top-level shape (a mapping with the recognized sections,
//! `tasks` and `graph` required and non-empty) and hands the individual
//! sections to the converter.

use super::converter::SchemaError;
use crate::experiment::description::Value;
use serde_yaml::Mapping;

/// The recognized top-level sections of a description.
#[derive(Debug)]
pub struct DocumentSections<'a> {
    /// The optional `types` section.
    pub types: Option<&'a Mapping>,
    /// The optional `parameters` section.
    pub parameters: Option<&'a Mapping>,
    /// The required `tasks` section.
    pub tasks: &'a Mapping,
    /// The required `graph` section.
    pub graph: &'a Mapping,
}

/// Splits a raw description value into its sections.
///
/// # Errors
///
/// Returns a [`SchemaError`] when the top level is not a mapping, when an
/// unrecognized section appears, when `tasks` or `graph` is missing or
/// empty, or when a section is not itself a mapping.
pub fn split_sections(value: &Value) -> Result<DocumentSections<'_>, SchemaError> {
    let Value::Mapping(top) = value else {
        return Err(SchemaError::NotAMapping);
    };

    let mut types = None;
    let mut parameters = None;
    let mut tasks = None;
    let mut graph = None;

    for (key, section) in top {
        let Value::String(key) = key else {
            return Err(SchemaError::UnknownSection {
                name: render_key(key),
            });
        };
        match key.as_str() {
            "types" => types = Some(section_mapping(section, "types")?),
            "parameters" => parameters = Some(section_mapping(section, "parameters")?),
            "tasks" => tasks = Some(section_mapping(section, "tasks")?),
            "graph" => graph = Some(section_mapping(section, "graph")?),
            other => {
                return Err(SchemaError::UnknownSection {
                    name: other.to_string(),
                });
            }
        }
    }

    let tasks = tasks.ok_or(SchemaError::MissingSection { name: "tasks" })?;
    let graph = graph.ok_or(SchemaError::MissingSection { name: "graph" })?;
    if tasks.is_empty() {
        return Err(SchemaError::EmptySection { name: "tasks" });
    }
    if graph.is_empty() {
        return Err(SchemaError::EmptySection { name: "graph" });
    }

    Ok(DocumentSections {
        types,
        parameters,
        tasks,
        graph,
    })
}

fn section_mapping<'a>(value: &'a Value, name: &'static str) -> Result<&'a Mapping, SchemaError> {
    match value {
        Value::Mapping(mapping) => Ok(mapping),
        // an explicitly null section reads as absent-but-spelled-out
        Value::Null => Ok(EMPTY_MAPPING.get_or_init(Mapping::new)),
        _ => Err(SchemaError::UnexpectedShape {
            context: name.to_string(),
            expected: "a mapping",
        }),
    }
}

static EMPTY_MAPPING: std::sync::OnceLock<Mapping> = std::sync::OnceLock::new();

/// Renders a non-string mapping key for an error message.
pub fn render_key(key: &Value) -> String {
    serde_yaml::to_string(key)
        .map(|rendered| rendered.trim_end().to_string())
        .unwrap_or_else(|_| "<unprintable key>".to_string())
}
