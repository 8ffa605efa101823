// Copyright (c) 2025 John Wilger
// SPDX-License-Identifier: MIT

//! Type inference from literal values.
//!
//! Only the kind of the in-memory value is inspected, so it makes no
//! difference whether the value came from YAML text, JSON text, or a
//! structure built programmatically by a producer. Numeric literals keep
//! the representation of their source: `1` infers `integer`, `1.0`
//! infers `number`.
//!
//! Sequences always infer as tuples, never lists: a tuple keeps length
//! information, and the compatibility rules relax tuples into lists when
//! a list is required.

use super::{BuiltinType, Shape, Type};
use crate::experiment::description::{PropertyName, Value};
use crate::infrastructure::types::NonEmptyString;
use indexmap::IndexMap;

/// Infers the type of a literal value.
pub fn infer(value: &Value) -> Type {
    match value {
        Value::Null => Type::builtin(BuiltinType::Null),
        Value::Bool(_) => Type::builtin(BuiltinType::Boolean),
        Value::Number(number) => {
            if number.is_i64() || number.is_u64() {
                Type::builtin(BuiltinType::Integer)
            } else {
                Type::builtin(BuiltinType::Number)
            }
        }
        Value::String(_) => Type::builtin(BuiltinType::String),
        Value::Sequence(elements) => {
            Type::anonymous(Shape::Tuple(elements.iter().map(infer).collect()))
        }
        Value::Mapping(mapping) => infer_mapping(mapping),
        Value::Tagged(tagged) => infer(&tagged.value),
    }
}

fn infer_mapping(mapping: &serde_yaml::Mapping) -> Type {
    if mapping.is_empty() {
        return Type::anonymous(Shape::Record(IndexMap::new()));
    }

    if let Some(properties) = string_keyed_properties(mapping) {
        return Type::anonymous(Shape::Record(properties));
    }

    if mapping.keys().all(is_integer_key) {
        let value_types: Vec<Type> = mapping.values().map(infer).collect();
        return Type::anonymous(Shape::Map {
            key: Box::new(Type::builtin(BuiltinType::Integer)),
            value: Box::new(Type::union_of(value_types)),
        });
    }

    // mixed or exotic keys carry no useful structure
    Type::builtin(BuiltinType::Any)
}

/// When every key is a non-empty string, the per-property inferred types.
fn string_keyed_properties(mapping: &serde_yaml::Mapping) -> Option<IndexMap<PropertyName, Type>> {
    let mut properties = IndexMap::new();
    for (key, value) in mapping {
        let Value::String(key) = key else {
            return None;
        };
        let name = NonEmptyString::parse(key.clone()).ok()?;
        properties.insert(PropertyName::new(name), infer(value));
    }
    Some(properties)
}

fn is_integer_key(key: &Value) -> bool {
    matches!(key, Value::Number(number) if number.is_i64() || number.is_u64())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn scalars_infer_their_builtin() {
        assert!(infer(&parse("hello")).is_simple_named("string"));
        assert!(infer(&parse("1")).is_simple_named("integer"));
        assert!(infer(&parse("1.0")).is_simple_named("number"));
        assert!(infer(&parse("true")).is_simple_named("boolean"));
        assert!(infer(&parse("~")).is_simple_named("null"));
    }

    #[test]
    fn sequences_infer_as_tuples_never_lists() {
        let inferred = infer(&parse("[1, two, 3.5]"));
        match inferred {
            Type::Structured {
                name: None,
                shape: Shape::Tuple(elements),
            } => {
                assert_eq!(elements.len(), 3);
                assert!(elements[0].is_simple_named("integer"));
                assert!(elements[1].is_simple_named("string"));
                assert!(elements[2].is_simple_named("number"));
            }
            other => panic!("expected tuple, got {other:?}"),
        }
    }

    #[test]
    fn empty_mapping_infers_empty_record() {
        match infer(&parse("{}")) {
            Type::Structured {
                shape: Shape::Record(properties),
                ..
            } => assert!(properties.is_empty()),
            other => panic!("expected record, got {other:?}"),
        }
    }

    #[test]
    fn string_keyed_mapping_infers_record() {
        match infer(&parse("{a: 1, b: two}")) {
            Type::Structured {
                shape: Shape::Record(properties),
                ..
            } => {
                assert_eq!(properties.len(), 2);
                let values: Vec<&Type> = properties.values().collect();
                assert!(values[0].is_simple_named("integer"));
                assert!(values[1].is_simple_named("string"));
            }
            other => panic!("expected record, got {other:?}"),
        }
    }

    #[test]
    fn integer_keyed_mapping_infers_key_value_with_union() {
        match infer(&parse("{1: a, 2: b, 3: 4}")) {
            Type::Structured {
                shape: Shape::Map { key, value },
                ..
            } => {
                assert!(key.is_simple_named("integer"));
                match value.as_ref() {
                    Type::Union(members) => {
                        assert_eq!(members.len(), 2);
                        assert!(members[0].is_simple_named("string"));
                        assert!(members[1].is_simple_named("integer"));
                    }
                    other => panic!("expected union, got {other:?}"),
                }
            }
            other => panic!("expected key/value mapping, got {other:?}"),
        }
    }

    #[test]
    fn singleton_integer_keyed_mapping_still_infers_key_value() {
        // the singleton value union collapses to the element itself
        match infer(&parse("{7: seven}")) {
            Type::Structured {
                shape: Shape::Map { key, value },
                ..
            } => {
                assert!(key.is_simple_named("integer"));
                assert!(value.is_simple_named("string"));
            }
            other => panic!("expected key/value mapping, got {other:?}"),
        }
    }

    #[test]
    fn mixed_keys_infer_any() {
        assert!(infer(&parse("{1: a, b: c}")).is_simple_named("any"));
        assert!(infer(&parse("{true: a}")).is_simple_named("any"));
    }

    #[test]
    fn nested_structures_infer_recursively() {
        match infer(&parse("{points: [[0, 0], [1, 2.5]]}")) {
            Type::Structured {
                shape: Shape::Record(properties),
                ..
            } => match properties.values().next().unwrap() {
                Type::Structured {
                    shape: Shape::Tuple(rows),
                    ..
                } => {
                    assert_eq!(rows.len(), 2);
                    assert!(matches!(
                        rows[0],
                        Type::Structured {
                            shape: Shape::Tuple(_),
                            ..
                        }
                    ));
                }
                other => panic!("expected tuple of points, got {other:?}"),
            },
            other => panic!("expected record, got {other:?}"),
        }
    }
}
