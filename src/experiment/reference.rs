// Copyright (c) 2025 John Wilger
// SPDX-License-Identifier: MIT

//! Reference expressions inside argument trees.
//!
//! A text value starting with `$` is a reference: `$name` binds to a
//! parameter, or to the sole output of a step; `$step.output` binds to a
//! named output of a step. `$$` escapes a literal leading dollar sign. A
//! `$` anywhere other than the first character is not a reference.
//!
//! References may appear at any depth inside argument trees and parameter
//! defaults. The original structure is never mutated; resolution produces
//! descriptors (and, at run time, substituted copies).

use super::description::{ExperimentDescription, OutputName, ParameterName, StepName};
use crate::infrastructure::types::Identifier;
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

lazy_static! {
    /// `$name` or `$step.output`, where both atoms are identifiers.
    static ref REFERENCE_PATTERN: Regex =
        Regex::new(r"^\$([A-Za-z_][A-Za-z0-9_]*)(?:\.([A-Za-z_][A-Za-z0-9_]*))?$")
            .expect("reference pattern is a valid regex");
}

/// A parsed reference expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// The leading atom: a parameter name or step name.
    pub name: Identifier,
    /// The output atom, when the `$step.output` form was used.
    pub output: Option<Identifier>,
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.output {
            Some(output) => write!(f, "${}.{}", self.name, output),
            None => write!(f, "${}", self.name),
        }
    }
}

/// Classification of a text value found in an argument tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextToken {
    /// Plain text; no leading `$`.
    Literal,
    /// A `$$`-escaped literal; the unescaped text (one `$` stripped).
    Escaped(String),
    /// A reference expression.
    Reference(Reference),
}

/// What a reference binds to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceTarget {
    /// A global parameter.
    Parameter(ParameterName),
    /// A named output of a step.
    StepOutput {
        /// The producing step.
        step: StepName,
        /// The referenced output.
        output: OutputName,
    },
}

/// Errors raised while parsing or resolving references.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    /// The text starts with `$` but is not a well-formed reference.
    #[error("'{text}' is not a valid reference; expected $name or $step.output")]
    InvalidSyntax {
        /// The offending text.
        text: String,
    },

    /// The leading atom names neither a parameter nor a step.
    #[error("reference '{reference}' does not resolve to a parameter or step")]
    UnresolvedName {
        /// The full reference text.
        reference: String,
    },

    /// `$step` was used without an output name, but the step's task does
    /// not declare exactly one output.
    #[error("reference '${step}' needs an output name; the step declares {outputs} outputs")]
    NoSoleOutput {
        /// The referenced step.
        step: String,
        /// How many outputs the step's task declares.
        outputs: usize,
    },

    /// `$step.output` names an output the step's task does not declare.
    #[error("step '{step}' declares no output named '{output}'")]
    UnknownOutput {
        /// The referenced step.
        step: String,
        /// The missing output name.
        output: String,
    },

    /// A reference in a parameter default resolved to a step output; no
    /// step has run when parameter bindings are completed.
    #[error("reference '{reference}' resolves to a step output, but only parameters may be referenced here")]
    StepOutputNotAllowed {
        /// The full reference text.
        reference: String,
    },

    /// Parameter defaults reference each other in a cycle.
    #[error("parameter default references form a cycle through '{parameter}'")]
    CircularDefault {
        /// The parameter on which the cycle was detected.
        parameter: String,
    },
}

/// Classifies a text value as plain text, an escape, or a reference.
///
/// # Errors
///
/// Returns [`ReferenceError::InvalidSyntax`] for text that starts with a
/// single `$` but does not match the reference grammar.
pub fn classify(text: &str) -> Result<TextToken, ReferenceError> {
    if let Some(escaped) = text.strip_prefix("$$") {
        return Ok(TextToken::Escaped(format!("${escaped}")));
    }
    if !text.starts_with('$') {
        return Ok(TextToken::Literal);
    }

    let captures = REFERENCE_PATTERN
        .captures(text)
        .ok_or_else(|| ReferenceError::InvalidSyntax {
            text: text.to_string(),
        })?;

    let atom = |index: usize| -> Result<Identifier, ReferenceError> {
        let matched = captures
            .get(index)
            .ok_or_else(|| ReferenceError::InvalidSyntax {
                text: text.to_string(),
            })?;
        Identifier::parse(matched.as_str().to_string()).map_err(|_| {
            ReferenceError::InvalidSyntax {
                text: text.to_string(),
            }
        })
    };

    let name = atom(1)?;
    let output = match captures.get(2) {
        Some(_) => Some(atom(2)?),
        None => None,
    };
    Ok(TextToken::Reference(Reference { name, output }))
}

/// Collects every well-formed reference in a value tree, in depth-first
/// appearance order. Malformed reference text is skipped here; it is
/// reported where the tree is type-checked.
pub fn collect(value: &super::description::Value, out: &mut Vec<Reference>) {
    use super::description::Value;
    match value {
        Value::String(text) => {
            if let Ok(TextToken::Reference(reference)) = classify(text) {
                out.push(reference);
            }
        }
        Value::Sequence(elements) => {
            for element in elements {
                collect(element, out);
            }
        }
        Value::Mapping(mapping) => {
            for (_, entry) in mapping {
                collect(entry, out);
            }
        }
        Value::Tagged(tagged) => collect(&tagged.value, out),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

impl Reference {
    /// Binds the reference against a description.
    ///
    /// `$name` resolves to a parameter if one is declared under that
    /// name, otherwise to the sole output of the step of that name.
    /// `$step.output` resolves to the named output of the named step.
    pub fn resolve(
        &self,
        description: &ExperimentDescription,
    ) -> Result<ReferenceTarget, ReferenceError> {
        match &self.output {
            None => self.resolve_bare(description),
            Some(output) => self.resolve_step_output(description, output),
        }
    }

    fn resolve_bare(
        &self,
        description: &ExperimentDescription,
    ) -> Result<ReferenceTarget, ReferenceError> {
        if let Some((name, _)) = description
            .parameters
            .iter()
            .find(|(name, _)| name.to_string() == self.name.as_str())
        {
            return Ok(ReferenceTarget::Parameter(name.clone()));
        }

        let Some((step_name, step)) = description
            .graph
            .iter()
            .find(|(name, _)| name.to_string() == self.name.as_str())
        else {
            return Err(ReferenceError::UnresolvedName {
                reference: self.to_string(),
            });
        };

        let Some(task) = description.task_for_step(step) else {
            // the unknown task surfaces as a graph issue; the reference
            // cannot be bound either way
            return Err(ReferenceError::UnresolvedName {
                reference: self.to_string(),
            });
        };

        match task.outputs.sole() {
            Some(sole) => Ok(ReferenceTarget::StepOutput {
                step: step_name.clone(),
                output: sole.name.clone(),
            }),
            None => Err(ReferenceError::NoSoleOutput {
                step: self.name.as_str().to_string(),
                outputs: task.outputs.declarations().len(),
            }),
        }
    }

    fn resolve_step_output(
        &self,
        description: &ExperimentDescription,
        output: &Identifier,
    ) -> Result<ReferenceTarget, ReferenceError> {
        let Some((step_name, step)) = description
            .graph
            .iter()
            .find(|(name, _)| name.to_string() == self.name.as_str())
        else {
            return Err(ReferenceError::UnresolvedName {
                reference: self.to_string(),
            });
        };

        let Some(task) = description.task_for_step(step) else {
            return Err(ReferenceError::UnresolvedName {
                reference: self.to_string(),
            });
        };

        let declared = task
            .outputs
            .declarations()
            .iter()
            .find(|decl| decl.name.to_string() == output.as_str());
        match declared {
            Some(decl) => Ok(ReferenceTarget::StepOutput {
                step: step_name.clone(),
                output: decl.name.clone(),
            }),
            None => Err(ReferenceError::UnknownOutput {
                step: self.name.as_str().to_string(),
                output: output.as_str().to_string(),
            }),
        }
    }
}
