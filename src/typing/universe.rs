// Copyright (c) 2025 John Wilger
// SPDX-License-Identifier: MIT

//! Construction of the per-description type universe.
//!
//! The universe maps type names to canonical [`Type`] descriptors, with
//! the six built-ins pre-populated. Building it resolves every name in
//! the `types` section eagerly, so the rest of the engine never touches
//! unresolved references, and all definition-level problems (built-in
//! redefinition, unresolved names, inheritance cycles, ill-formed
//! key/value key types) surface here.

use super::{BuiltinType, Shape, SimpleType, Type, TypeExpr};
use crate::experiment::description::{TypeDefinition, TypeName};
use indexmap::IndexMap;
use std::collections::HashSet;
use thiserror::Error;

/// Errors raised while building or querying the type universe.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UniverseError {
    /// A definition reuses a reserved built-in name.
    #[error("type '{name}' redefines a built-in type")]
    BuiltinRedefined {
        /// The offending name.
        name: TypeName,
    },

    /// A name does not resolve in the universe.
    #[error("type '{name}' is not defined")]
    UndefinedType {
        /// The unresolved name.
        name: TypeName,
    },

    /// A definition participates in a reference or inheritance cycle.
    #[error("type '{name}' is defined in terms of itself")]
    CyclicDefinition {
        /// The name on which the cycle was detected.
        name: TypeName,
    },

    /// An `is_a` declaration names a type that is not simple.
    #[error("type '{name}' declares non-simple supertype '{is_a}'")]
    InvalidSupertype {
        /// The derived type.
        name: TypeName,
        /// The declared supertype.
        is_a: TypeName,
    },

    /// A key/value mapping declares a key type other than `string` or
    /// `integer`.
    #[error("key/value mapping key type must resolve to string or integer, found '{found}'")]
    InvalidKeyType {
        /// Rendering of the resolved key type.
        found: String,
    },
}

/// The set of named types in effect for a single description.
#[derive(Debug, Clone)]
pub struct TypeUniverse {
    types: IndexMap<TypeName, Type>,
}

impl TypeUniverse {
    /// A universe holding only the built-ins.
    pub fn with_builtins() -> Self {
        let mut types = IndexMap::new();
        for builtin in BuiltinType::ALL {
            types.insert(builtin_name(builtin), builtin.to_type());
        }
        Self { types }
    }

    /// Builds a universe from the `types` section.
    ///
    /// All definition errors are collected; the universe is only returned
    /// when every definition resolved cleanly.
    pub fn build(
        definitions: &IndexMap<TypeName, TypeDefinition>,
    ) -> Result<Self, Vec<UniverseError>> {
        let (universe, errors) = Self::build_lenient(definitions);
        if errors.is_empty() {
            Ok(universe)
        } else {
            Err(errors)
        }
    }

    /// Builds as much of the universe as resolves cleanly, returning the
    /// definition errors alongside it. The static analyzer uses this to
    /// keep reporting issues past a broken `types` section.
    pub fn build_lenient(
        definitions: &IndexMap<TypeName, TypeDefinition>,
    ) -> (Self, Vec<UniverseError>) {
        let mut universe = Self::with_builtins();
        let mut errors = Vec::new();

        for name in definitions.keys() {
            if BuiltinType::from_name(&name.to_string()).is_some() {
                errors.push(UniverseError::BuiltinRedefined { name: name.clone() });
            }
        }

        let mut in_progress = HashSet::new();
        for name in definitions.keys() {
            if universe.types.contains_key(name) {
                // already resolved through a forward reference, or a
                // built-in redefinition reported above
                continue;
            }
            if let Err(error) =
                resolve_named(name, definitions, &mut universe, &mut in_progress)
            {
                errors.push(error);
            }
        }

        (universe, errors)
    }

    /// Looks up a named type.
    pub fn get(&self, name: &TypeName) -> Option<&Type> {
        self.types.get(name)
    }

    /// Resolves a type expression against the finished universe, yielding
    /// a canonical type. Structured expressions resolve anonymously.
    pub fn resolve(&self, expr: &TypeExpr) -> Result<Type, UniverseError> {
        match expr {
            TypeExpr::Named(name) => self
                .get(name)
                .cloned()
                .ok_or_else(|| UniverseError::UndefinedType { name: name.clone() }),
            TypeExpr::List(element) => Ok(Type::anonymous(Shape::List(Box::new(
                self.resolve(element)?,
            )))),
            TypeExpr::Tuple(elements) => {
                let elements = elements
                    .iter()
                    .map(|element| self.resolve(element))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Type::anonymous(Shape::Tuple(elements)))
            }
            TypeExpr::Record(properties) => {
                let mut resolved = IndexMap::new();
                for (property, expr) in properties {
                    resolved.insert(property.clone(), self.resolve(expr)?);
                }
                Ok(Type::anonymous(Shape::Record(resolved)))
            }
            TypeExpr::Map { key, value } => {
                let key = self.resolve(key)?;
                check_key_type(&key)?;
                let value = self.resolve(value)?;
                Ok(Type::anonymous(Shape::Map {
                    key: Box::new(key),
                    value: Box::new(value),
                }))
            }
            TypeExpr::Union(members) => {
                let members = members
                    .iter()
                    .map(|member| self.resolve(member))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Type::union_of(members))
            }
        }
    }
}

fn builtin_name(builtin: BuiltinType) -> TypeName {
    TypeName::new(crate::infrastructure::types::NonEmptyString::from_literal(
        builtin.name(),
    ))
}

/// Resolves one named definition, recursing into the definitions it
/// references. `in_progress` carries the DFS stack for cycle detection.
fn resolve_named(
    name: &TypeName,
    definitions: &IndexMap<TypeName, TypeDefinition>,
    universe: &mut TypeUniverse,
    in_progress: &mut HashSet<TypeName>,
) -> Result<Type, UniverseError> {
    if let Some(resolved) = universe.types.get(name) {
        return Ok(resolved.clone());
    }
    if in_progress.contains(name) {
        return Err(UniverseError::CyclicDefinition { name: name.clone() });
    }
    let Some(definition) = definitions.get(name) else {
        return Err(UniverseError::UndefinedType { name: name.clone() });
    };

    in_progress.insert(name.clone());
    let result = match definition {
        TypeDefinition::Simple { is_a } => resolve_simple(name, is_a.as_ref(), definitions, universe, in_progress),
        TypeDefinition::Structural(expr) => {
            resolve_expr(expr, definitions, universe, in_progress).map(|resolved| match resolved {
                // a named structural definition takes the defined name;
                // aliases and unions keep their structural identity
                Type::Structured { name: None, shape } => Type::Structured {
                    name: Some(name.clone()),
                    shape,
                },
                other => other,
            })
        }
    };
    in_progress.remove(name);

    let resolved = result?;
    universe.types.insert(name.clone(), resolved.clone());
    Ok(resolved)
}

fn resolve_simple(
    name: &TypeName,
    is_a: Option<&TypeName>,
    definitions: &IndexMap<TypeName, TypeDefinition>,
    universe: &mut TypeUniverse,
    in_progress: &mut HashSet<TypeName>,
) -> Result<Type, UniverseError> {
    let parent = match is_a {
        None => None,
        Some(parent_name) => {
            let parent = resolve_named(parent_name, definitions, universe, in_progress)?;
            match parent {
                Type::Simple(simple) => Some(simple),
                _ => {
                    return Err(UniverseError::InvalidSupertype {
                        name: name.clone(),
                        is_a: parent_name.clone(),
                    });
                }
            }
        }
    };
    Ok(Type::Simple(SimpleType::new(name.clone(), parent)))
}

/// Expression resolution used during construction; unlike
/// [`TypeUniverse::resolve`] it may recurse into not-yet-resolved
/// definitions.
fn resolve_expr(
    expr: &TypeExpr,
    definitions: &IndexMap<TypeName, TypeDefinition>,
    universe: &mut TypeUniverse,
    in_progress: &mut HashSet<TypeName>,
) -> Result<Type, UniverseError> {
    match expr {
        TypeExpr::Named(name) => resolve_named(name, definitions, universe, in_progress),
        TypeExpr::List(element) => Ok(Type::anonymous(Shape::List(Box::new(resolve_expr(
            element,
            definitions,
            universe,
            in_progress,
        )?)))),
        TypeExpr::Tuple(elements) => {
            let elements = elements
                .iter()
                .map(|element| resolve_expr(element, definitions, universe, in_progress))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Type::anonymous(Shape::Tuple(elements)))
        }
        TypeExpr::Record(properties) => {
            let mut resolved = IndexMap::new();
            for (property, property_expr) in properties {
                resolved.insert(
                    property.clone(),
                    resolve_expr(property_expr, definitions, universe, in_progress)?,
                );
            }
            Ok(Type::anonymous(Shape::Record(resolved)))
        }
        TypeExpr::Map { key, value } => {
            let key = resolve_expr(key, definitions, universe, in_progress)?;
            check_key_type(&key)?;
            let value = resolve_expr(value, definitions, universe, in_progress)?;
            Ok(Type::anonymous(Shape::Map {
                key: Box::new(key),
                value: Box::new(value),
            }))
        }
        TypeExpr::Union(members) => {
            let members = members
                .iter()
                .map(|member| resolve_expr(member, definitions, universe, in_progress))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Type::union_of(members))
        }
    }
}

fn check_key_type(key: &Type) -> Result<(), UniverseError> {
    if key.is_simple_named(BuiltinType::String.name())
        || key.is_simple_named(BuiltinType::Integer.name())
    {
        Ok(())
    } else {
        Err(UniverseError::InvalidKeyType {
            found: key.to_string(),
        })
    }
}
