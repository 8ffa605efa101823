// Copyright (c) 2025 John Wilger
// SPDX-License-Identifier: MIT

//! The type system of the experiment engine.
//!
//! Every description carries its own type universe: the six built-in
//! simple types plus whatever the `types` section declares. The universe
//! is built once per description ([`universe`]), literal values are mapped
//! into it by inference ([`infer`]), and assignability between types is
//! decided by the compatibility rules ([`compat`]).
//!
//! Types are tagged sum types. A [`TypeExpr`] is the surface form as
//! written in the description (names still unresolved); a [`Type`] is the
//! canonical, fully resolved form the analyzer works with.

pub mod compat;
pub mod infer;
pub mod universe;

pub use compat::compatible;
pub use infer::infer;
pub use universe::{TypeUniverse, UniverseError};

use crate::experiment::description::{PropertyName, TypeName};
use crate::infrastructure::types::NonEmptyString;
use indexmap::IndexMap;
use std::fmt;

/// A type expression as written in the description.
///
/// Names are unresolved; [`TypeUniverse::resolve`] turns an expression
/// into a canonical [`Type`].
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    /// A reference to a named type.
    Named(TypeName),
    /// A list with an element type.
    List(Box<TypeExpr>),
    /// A tuple with an ordered, possibly empty, element type sequence.
    Tuple(Vec<TypeExpr>),
    /// An enumerated mapping: an ordered set of property declarations.
    Record(IndexMap<PropertyName, TypeExpr>),
    /// A key/value mapping.
    Map {
        /// The key type; must resolve to `string` or `integer`.
        key: Box<TypeExpr>,
        /// The value type.
        value: Box<TypeExpr>,
    },
    /// A union of member types (possibly empty).
    Union(Vec<TypeExpr>),
}

impl TypeExpr {
    /// A reference to a statically known type name.
    pub fn named(name: &'static str) -> Self {
        TypeExpr::Named(TypeName::new(NonEmptyString::from_literal(name)))
    }
}

/// The built-in simple types, with reserved names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinType {
    /// Text scalars.
    String,
    /// Integral numeric scalars; a subtype of `number`.
    Integer,
    /// Numeric scalars.
    Number,
    /// Boolean scalars.
    Boolean,
    /// The absent value.
    Null,
    /// The top element of the simple types.
    Any,
}

impl BuiltinType {
    /// All built-ins, in the order they are seeded into a universe.
    pub const ALL: [BuiltinType; 6] = [
        BuiltinType::String,
        BuiltinType::Integer,
        BuiltinType::Number,
        BuiltinType::Boolean,
        BuiltinType::Null,
        BuiltinType::Any,
    ];

    /// The reserved name of the built-in.
    pub fn name(self) -> &'static str {
        match self {
            BuiltinType::String => "string",
            BuiltinType::Integer => "integer",
            BuiltinType::Number => "number",
            BuiltinType::Boolean => "boolean",
            BuiltinType::Null => "null",
            BuiltinType::Any => "any",
        }
    }

    /// Looks up a built-in by its reserved name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|b| b.name() == name)
    }

    /// The canonical type for this built-in.
    pub fn to_type(self) -> Type {
        let simple = match self {
            // `integer` is the one built-in with a supertype
            BuiltinType::Integer => SimpleType {
                name: builtin_type_name(BuiltinType::Integer),
                parent: Some(Box::new(SimpleType {
                    name: builtin_type_name(BuiltinType::Number),
                    parent: None,
                })),
            },
            other => SimpleType {
                name: builtin_type_name(other),
                parent: None,
            },
        };
        Type::Simple(simple)
    }
}

fn builtin_type_name(builtin: BuiltinType) -> TypeName {
    TypeName::new(NonEmptyString::from_literal(builtin.name()))
}

/// A simple type: a name plus its resolved supertype chain.
///
/// The chain is embedded so that compatibility checks need no universe
/// lookup; universe construction guarantees the chain is acyclic and
/// terminates.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleType {
    name: TypeName,
    parent: Option<Box<SimpleType>>,
}

impl SimpleType {
    /// Creates a simple type with an optional supertype.
    pub fn new(name: TypeName, parent: Option<SimpleType>) -> Self {
        Self {
            name,
            parent: parent.map(Box::new),
        }
    }

    /// The type's name.
    pub fn name(&self) -> &TypeName {
        &self.name
    }

    /// The direct supertype, when one is declared.
    pub fn parent(&self) -> Option<&SimpleType> {
        self.parent.as_deref()
    }

    /// Whether this type transitively derives from `other`.
    pub fn derives_from(&self, other: &SimpleType) -> bool {
        let mut current = self.parent();
        while let Some(ancestor) = current {
            if ancestor.name == other.name {
                return true;
            }
            current = ancestor.parent();
        }
        false
    }
}

/// The structural shape of a structured type.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// A list with an element type.
    List(Box<Type>),
    /// A tuple with ordered element types.
    Tuple(Vec<Type>),
    /// An enumerated mapping: property name set with per-property types.
    Record(IndexMap<PropertyName, Type>),
    /// A key/value mapping.
    Map {
        /// The key type (`string` or `integer` after resolution).
        key: Box<Type>,
        /// The value type.
        value: Box<Type>,
    },
}

/// A canonical, fully resolved type.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    /// A simple type with its supertype chain.
    Simple(SimpleType),
    /// A structured type; `name` is present when the type was declared in
    /// the `types` section, absent for anonymous (inferred or inline)
    /// types.
    Structured {
        /// The declared name, if any.
        name: Option<TypeName>,
        /// The structural shape.
        shape: Shape,
    },
    /// A union of member types; set semantics, possibly empty.
    Union(Vec<Type>),
}

impl Type {
    /// The canonical type of a built-in.
    pub fn builtin(builtin: BuiltinType) -> Self {
        builtin.to_type()
    }

    /// Whether this is the built-in `any`.
    pub fn is_any(&self) -> bool {
        self.is_simple_named(BuiltinType::Any.name())
    }

    /// Whether this is a simple type with the given name.
    pub fn is_simple_named(&self, name: &str) -> bool {
        match self {
            Type::Simple(simple) => simple.name().to_string() == name,
            _ => false,
        }
    }

    /// An anonymous structured type.
    pub fn anonymous(shape: Shape) -> Self {
        Type::Structured { name: None, shape }
    }

    /// A de-duplicated union. A singleton collapses to its sole member;
    /// duplicates (by structural equality) are dropped.
    pub fn union_of(members: Vec<Type>) -> Self {
        let mut unique: Vec<Type> = Vec::new();
        for member in members {
            if !unique.contains(&member) {
                unique.push(member);
            }
        }
        if unique.len() == 1 {
            // a singleton union is just the element
            return unique.remove(0);
        }
        Type::Union(unique)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Simple(simple) => write!(f, "{}", simple.name()),
            Type::Structured {
                name: Some(name), ..
            } => write!(f, "{name}"),
            Type::Structured { name: None, shape } => write!(f, "{shape}"),
            Type::Union(members) => {
                f.write_str("union[")?;
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{member}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::List(element) => write!(f, "list[{element}]"),
            Shape::Tuple(elements) => {
                f.write_str("tuple[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{element}")?;
                }
                f.write_str("]")
            }
            Shape::Record(properties) => {
                f.write_str("mapping[")?;
                for (i, (name, property)) in properties.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {property}")?;
                }
                f.write_str("]")
            }
            Shape::Map { key, value } => write!(f, "mapping[{key}, {value}]"),
        }
    }
}
