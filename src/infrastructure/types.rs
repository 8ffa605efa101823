//! Type safety utilities for compile-time guarantees.
//!
//! This module provides types and patterns that eliminate runtime validation
//! by encoding invariants in the type system. All validation happens at
//! system boundaries (parsing), and the rest of the engine works with
//! types that maintain invariants by construction.
//!
//! # Key Concepts
//!
//! - **Phantom Types**: Zero-cost compile-time type markers
//! - **Parse, Don't Validate**: Validation happens once at boundaries
//! - **Make Illegal States Unrepresentable**: Invalid states cannot be constructed

use std::fmt;
use std::marker::PhantomData;
use std::path::PathBuf;

// Phantom types for file kinds

/// Marker type for experiment description files (YAML or JSON).
#[derive(Debug, Clone, Copy)]
pub struct ExperimentFile;

/// Marker type for parameter binding files (YAML or JSON).
#[derive(Debug, Clone, Copy)]
pub struct ParamsFile;

/// Marker type for any file type (no extension restriction).
#[derive(Debug, Clone, Copy)]
pub struct AnyFile;

// Phantom types for path types

/// Marker type indicating a path points to a directory.
#[derive(Debug, Clone, Copy)]
pub struct Directory;

/// Marker type indicating a path points to a file.
#[derive(Debug, Clone, Copy)]
pub struct File;

/// Marker type indicating a path has been verified to exist.
#[derive(Debug, Clone, Copy)]
pub struct Exists;

// Type-safe path with phantom types

/// A path with compile-time guarantees about its type and properties.
///
/// This type uses phantom types to encode:
/// - File type (ExperimentFile, ParamsFile, AnyFile)
/// - Path type (Directory, File)
/// - Existence (Exists)
///
/// # Type Parameters
///
/// - `FileType`: The type of file this path points to
/// - `PathType`: Whether this is a file or directory
/// - `ExistenceType`: Whether the path has been verified to exist
#[derive(Debug, Clone)]
pub struct TypedPath<FileType, PathType, ExistenceType> {
    path: PathBuf,
    _file_type: PhantomData<FileType>,
    _path_type: PhantomData<PathType>,
    _existence: PhantomData<ExistenceType>,
}

impl<F, P, E> TypedPath<F, P, E> {
    /// Returns the underlying `PathBuf`.
    pub fn as_path_buf(&self) -> &PathBuf {
        &self.path
    }
}

// Builder for creating typed paths at system boundaries

/// Builder for parsing and validating paths at system boundaries.
///
/// This is the only way to create `TypedPath` instances, ensuring all
/// validation happens at parse time rather than construction time.
pub struct PathBuilder;

impl PathBuilder {
    /// Parses a path as an experiment description file.
    ///
    /// # Requirements
    ///
    /// - Must have a `.yml`, `.yaml`, or `.json` extension
    /// - Must exist on the filesystem
    /// - Must be a file (not a directory)
    ///
    /// # Errors
    ///
    /// Returns `ParseError::InvalidExperimentFile` if requirements are not met.
    pub fn parse_experiment_file(
        path: PathBuf,
    ) -> Result<TypedPath<ExperimentFile, File, Exists>, ParseError> {
        // This validation happens once at system boundary
        if has_description_extension(&path) && path.exists() && path.is_file() {
            Ok(TypedPath {
                path,
                _file_type: PhantomData,
                _path_type: PhantomData,
                _existence: PhantomData,
            })
        } else {
            Err(ParseError::InvalidExperimentFile)
        }
    }

    /// Parses a path as a parameter binding file.
    ///
    /// Same shape requirements as experiment files: a YAML or JSON file
    /// that exists on disk.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::InvalidParamsFile` if requirements are not met.
    pub fn parse_params_file(
        path: PathBuf,
    ) -> Result<TypedPath<ParamsFile, File, Exists>, ParseError> {
        if has_description_extension(&path) && path.exists() && path.is_file() {
            Ok(TypedPath {
                path,
                _file_type: PhantomData,
                _path_type: PhantomData,
                _existence: PhantomData,
            })
        } else {
            Err(ParseError::InvalidParamsFile)
        }
    }

    /// Parses a path as an existing directory (the plugins directory).
    ///
    /// # Requirements
    ///
    /// - Must exist on the filesystem
    /// - Must be a directory (not a file)
    ///
    /// # Errors
    ///
    /// Returns `ParseError::InvalidDirectory` if requirements are not met.
    pub fn parse_directory(
        path: PathBuf,
    ) -> Result<TypedPath<AnyFile, Directory, Exists>, ParseError> {
        if path.exists() && path.is_dir() {
            Ok(TypedPath {
                path,
                _file_type: PhantomData,
                _path_type: PhantomData,
                _existence: PhantomData,
            })
        } else {
            Err(ParseError::InvalidDirectory)
        }
    }
}

fn has_description_extension(path: &std::path::Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext == "yml" || ext == "yaml" || ext == "json")
}

/// Errors that can occur during parsing at system boundaries.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The path is not a valid experiment description file.
    #[error("Invalid experiment file: must have .yml, .yaml, or .json extension and exist")]
    InvalidExperimentFile,

    /// The path is not a valid parameter binding file.
    #[error("Invalid params file: must have .yml, .yaml, or .json extension and exist")]
    InvalidParamsFile,

    /// The path is not a valid directory.
    #[error("Invalid directory: must exist and be a directory")]
    InvalidDirectory,

    /// String cannot be empty.
    #[error("String cannot be empty")]
    EmptyString,

    /// Invalid identifier format.
    #[error("Invalid identifier format")]
    InvalidIdentifier,
}

// Compile-time safe string types

/// A compile-time guaranteed non-empty string.
///
/// This type can only be created through parsing at system boundaries,
/// eliminating runtime validation throughout the codebase.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Parses a string, ensuring it's not empty.
    ///
    /// This should only be called at system boundaries.
    pub fn parse(s: String) -> Result<Self, ParseError> {
        if s.is_empty() {
            Err(ParseError::EmptyString)
        } else {
            Ok(Self(s))
        }
    }

    /// Builds a `NonEmptyString` from a static, known non-empty literal.
    ///
    /// Used for built-in names baked into the engine; the literal table is
    /// fixed at compile time.
    pub fn from_literal(s: &'static str) -> Self {
        debug_assert!(!s.is_empty());
        Self(s.to_string())
    }

    /// Returns the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for NonEmptyString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A compile-time guaranteed identifier string.
///
/// Valid identifiers match the pattern `[a-zA-Z_][a-zA-Z0-9_]*`. Reference
/// atoms (`$name`, `$step.output`) are built from identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    /// Parses a string as an identifier.
    ///
    /// This should only be called at system boundaries.
    pub fn parse(s: String) -> Result<Self, ParseError> {
        if s.is_empty() {
            return Err(ParseError::EmptyString);
        }

        let mut chars = s.chars();
        let first = chars.next().ok_or(ParseError::EmptyString)?;
        if !first.is_ascii_alphabetic() && first != '_' {
            return Err(ParseError::InvalidIdentifier);
        }

        for ch in chars {
            if !ch.is_ascii_alphanumeric() && ch != '_' {
                return Err(ParseError::InvalidIdentifier);
            }
        }

        Ok(Self(s))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_string_rejects_empty_input() {
        assert!(NonEmptyString::parse(String::new()).is_err());
        assert!(NonEmptyString::parse("x".to_string()).is_ok());
    }

    #[test]
    fn identifier_accepts_underscore_prefix() {
        assert!(Identifier::parse("_hidden".to_string()).is_ok());
        assert!(Identifier::parse("step1".to_string()).is_ok());
    }

    #[test]
    fn identifier_rejects_leading_digit_and_punctuation() {
        assert!(Identifier::parse("1step".to_string()).is_err());
        assert!(Identifier::parse("a.b".to_string()).is_err());
        assert!(Identifier::parse("a-b".to_string()).is_err());
    }
}
