// Copyright (c) 2025 John Wilger
// SPDX-License-Identifier: MIT

//! Type compatibility.
//!
//! `compatible(a, b)` decides whether values typed `a` may be passed
//! where `b` is declared. The rules are ordered; the first matching rule
//! wins. Everything is covariant: task plugins treat their inputs as
//! immutable (a contract, not an enforced property), so no contravariant
//! positions arise.

use super::{Shape, Type};

/// Whether values typed `left` may be passed where `right` is declared.
pub fn compatible(left: &Type, right: &Type) -> bool {
    // Anything is compatible with `any`.
    if right.is_any() {
        return true;
    }
    // `any` is compatible only with itself.
    if left.is_any() {
        return false;
    }
    // A union on the left must be compatible member-by-member. The empty
    // union is vacuously compatible with everything.
    if let Type::Union(members) = left {
        return members.iter().all(|member| compatible(member, right));
    }
    // A non-union left is compatible with a union when some member
    // accepts it; the empty union on the right accepts nothing.
    if let Type::Union(members) = right {
        return members.iter().any(|member| compatible(left, member));
    }

    match (left, right) {
        (Type::Simple(a), Type::Simple(b)) => a.name() == b.name() || a.derives_from(b),
        (
            Type::Structured {
                name: left_name,
                shape: left_shape,
            },
            Type::Structured {
                name: right_name,
                shape: right_shape,
            },
        ) => {
            match (left_name, right_name) {
                // two named structured types compare by name alone
                (Some(a), Some(b)) => a == b,
                // a named type against an anonymous one (either way)
                // compares structurally
                _ => shape_compatible(left_shape, right_shape),
            }
        }
        // simple vs structured never matches
        _ => false,
    }
}

fn shape_compatible(left: &Shape, right: &Shape) -> bool {
    match (left, right) {
        (Shape::List(a), Shape::List(b)) => compatible(a, b),
        (Shape::Tuple(a), Shape::Tuple(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b.iter())
                    .all(|(left, right)| compatible(left, right))
        }
        // a tuple relaxes into a list when every element fits
        (Shape::Tuple(elements), Shape::List(element)) => {
            elements.iter().all(|left| compatible(left, element))
        }
        (Shape::Record(a), Shape::Record(b)) => {
            a.len() == b.len()
                && a.iter().all(|(name, left)| {
                    b.get(name)
                        .is_some_and(|right| compatible(left, right))
                })
        }
        (
            Shape::Map {
                key: left_key,
                value: left_value,
            },
            Shape::Map {
                key: right_key,
                value: right_value,
            },
        ) => compatible(left_key, right_key) && compatible(left_value, right_value),
        // an enumerated mapping satisfies a string-keyed key/value
        // mapping when every property fits the value type
        (Shape::Record(properties), Shape::Map { key, value }) => {
            key.is_simple_named("string")
                && properties.values().all(|property| compatible(property, value))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::description::{TypeDefinition, TypeName};
    use crate::infrastructure::types::NonEmptyString;
    use crate::typing::{BuiltinType, TypeExpr, TypeUniverse};
    use indexmap::IndexMap;

    fn type_name(s: &str) -> TypeName {
        TypeName::new(NonEmptyString::parse(s.to_string()).unwrap())
    }

    fn builtin(b: BuiltinType) -> Type {
        Type::builtin(b)
    }

    fn list_of(element: Type) -> Type {
        Type::anonymous(Shape::List(Box::new(element)))
    }

    fn tuple_of(elements: Vec<Type>) -> Type {
        Type::anonymous(Shape::Tuple(elements))
    }

    #[test]
    fn every_builtin_is_compatible_with_itself() {
        for b in BuiltinType::ALL {
            let ty = builtin(b);
            assert!(compatible(&ty, &ty), "{ty} should accept itself");
        }
    }

    #[test]
    fn anything_is_compatible_with_any() {
        let any = builtin(BuiltinType::Any);
        assert!(compatible(&builtin(BuiltinType::String), &any));
        assert!(compatible(&list_of(builtin(BuiltinType::Integer)), &any));
        assert!(compatible(&Type::Union(vec![]), &any));
    }

    #[test]
    fn any_is_compatible_only_with_any() {
        let any = builtin(BuiltinType::Any);
        assert!(compatible(&any, &any));
        assert!(!compatible(&any, &builtin(BuiltinType::String)));
        assert!(!compatible(&any, &list_of(builtin(BuiltinType::Any))));
    }

    #[test]
    fn integer_passes_where_number_is_declared() {
        assert!(compatible(
            &builtin(BuiltinType::Integer),
            &builtin(BuiltinType::Number)
        ));
        assert!(!compatible(
            &builtin(BuiltinType::Number),
            &builtin(BuiltinType::Integer)
        ));
    }

    #[test]
    fn subtyping_is_transitive_through_declared_chains() {
        let mut definitions = IndexMap::new();
        definitions.insert(
            type_name("a"),
            TypeDefinition::Simple {
                is_a: Some(type_name("b")),
            },
        );
        definitions.insert(
            type_name("b"),
            TypeDefinition::Simple {
                is_a: Some(type_name("c")),
            },
        );
        definitions.insert(type_name("c"), TypeDefinition::Simple { is_a: None });
        let universe = TypeUniverse::build(&definitions).unwrap();

        let a = universe.get(&type_name("a")).unwrap();
        let c = universe.get(&type_name("c")).unwrap();
        assert!(compatible(a, c));
        assert!(!compatible(c, a));
    }

    #[test]
    fn union_on_the_left_requires_every_member() {
        let number = builtin(BuiltinType::Number);
        let ints_and_floats = Type::Union(vec![
            builtin(BuiltinType::Integer),
            builtin(BuiltinType::Number),
        ]);
        let ints_and_strings = Type::Union(vec![
            builtin(BuiltinType::Integer),
            builtin(BuiltinType::String),
        ]);
        assert!(compatible(&ints_and_floats, &number));
        assert!(!compatible(&ints_and_strings, &number));
    }

    #[test]
    fn union_on_the_right_requires_some_member() {
        let string = builtin(BuiltinType::String);
        let strings_or_null = Type::Union(vec![
            builtin(BuiltinType::String),
            builtin(BuiltinType::Null),
        ]);
        assert!(compatible(&string, &strings_or_null));
        assert!(!compatible(&builtin(BuiltinType::Boolean), &strings_or_null));
    }

    #[test]
    fn empty_union_is_compatible_with_everything() {
        let empty = Type::Union(vec![]);
        assert!(compatible(&empty, &builtin(BuiltinType::String)));
        assert!(compatible(&empty, &empty));
    }

    #[test]
    fn nothing_is_compatible_with_the_empty_union_except_itself() {
        let empty = Type::Union(vec![]);
        assert!(!compatible(&builtin(BuiltinType::String), &empty));
        assert!(!compatible(&builtin(BuiltinType::Null), &empty));
        assert!(compatible(&empty, &empty));
    }

    #[test]
    fn lists_are_covariant_in_their_element() {
        let ints = list_of(builtin(BuiltinType::Integer));
        let numbers = list_of(builtin(BuiltinType::Number));
        assert!(compatible(&ints, &numbers));
        assert!(!compatible(&numbers, &ints));
    }

    #[test]
    fn tuples_compare_pointwise_at_equal_length() {
        let left = tuple_of(vec![
            builtin(BuiltinType::Integer),
            builtin(BuiltinType::String),
        ]);
        let right = tuple_of(vec![
            builtin(BuiltinType::Number),
            builtin(BuiltinType::String),
        ]);
        let short = tuple_of(vec![builtin(BuiltinType::Number)]);
        assert!(compatible(&left, &right));
        assert!(!compatible(&left, &short));
    }

    #[test]
    fn tuple_relaxes_into_list() {
        let pair = tuple_of(vec![
            builtin(BuiltinType::Integer),
            builtin(BuiltinType::Integer),
        ]);
        let ints = list_of(builtin(BuiltinType::Integer));
        let strings = list_of(builtin(BuiltinType::String));
        assert!(compatible(&pair, &ints));
        assert!(!compatible(&pair, &strings));
        // the relaxation is one-way
        assert!(!compatible(&ints, &pair));
    }

    #[test]
    fn empty_tuple_satisfies_any_list() {
        let empty = tuple_of(vec![]);
        assert!(compatible(&empty, &list_of(builtin(BuiltinType::String))));
    }

    #[test]
    fn records_require_exact_property_sets() {
        let record = |pairs: Vec<(&str, Type)>| {
            let mut properties = IndexMap::new();
            for (name, ty) in pairs {
                properties.insert(
                    crate::experiment::description::PropertyName::new(
                        NonEmptyString::parse(name.to_string()).unwrap(),
                    ),
                    ty,
                );
            }
            Type::anonymous(Shape::Record(properties))
        };

        let left = record(vec![
            ("x", builtin(BuiltinType::Integer)),
            ("y", builtin(BuiltinType::Integer)),
        ]);
        let reordered = record(vec![
            ("y", builtin(BuiltinType::Number)),
            ("x", builtin(BuiltinType::Number)),
        ]);
        let missing = record(vec![("x", builtin(BuiltinType::Number))]);

        // property order is presentation-only
        assert!(compatible(&left, &reordered));
        assert!(!compatible(&left, &missing));
        assert!(!compatible(&missing, &left));
    }

    #[test]
    fn record_satisfies_string_keyed_map() {
        let mut properties = IndexMap::new();
        properties.insert(
            crate::experiment::description::PropertyName::new(
                NonEmptyString::parse("a".to_string()).unwrap(),
            ),
            builtin(BuiltinType::Integer),
        );
        let record = Type::anonymous(Shape::Record(properties));
        let string_map = Type::anonymous(Shape::Map {
            key: Box::new(builtin(BuiltinType::String)),
            value: Box::new(builtin(BuiltinType::Number)),
        });
        let integer_map = Type::anonymous(Shape::Map {
            key: Box::new(builtin(BuiltinType::Integer)),
            value: Box::new(builtin(BuiltinType::Number)),
        });
        assert!(compatible(&record, &string_map));
        assert!(!compatible(&record, &integer_map));
        // and never the other way around
        assert!(!compatible(&string_map, &record));
    }

    #[test]
    fn empty_record_satisfies_any_string_keyed_map() {
        let empty = Type::anonymous(Shape::Record(IndexMap::new()));
        let string_map = Type::anonymous(Shape::Map {
            key: Box::new(builtin(BuiltinType::String)),
            value: Box::new(builtin(BuiltinType::Boolean)),
        });
        assert!(compatible(&empty, &string_map));
    }

    #[test]
    fn named_structured_types_compare_by_name() {
        let shape = || Shape::List(Box::new(builtin(BuiltinType::String)));
        let names = Type::Structured {
            name: Some(type_name("names")),
            shape: shape(),
        };
        let labels = Type::Structured {
            name: Some(type_name("labels")),
            shape: shape(),
        };
        let anonymous = Type::anonymous(shape());

        assert!(compatible(&names, &names));
        // identical shapes, different names
        assert!(!compatible(&names, &labels));
        // named against anonymous compares structurally
        assert!(compatible(&names, &anonymous));
        assert!(compatible(&anonymous, &names));
    }

    #[test]
    fn category_mismatches_are_incompatible() {
        let ints = list_of(builtin(BuiltinType::Integer));
        let record = Type::anonymous(Shape::Record(IndexMap::new()));
        assert!(!compatible(&ints, &record));
        assert!(!compatible(&record, &ints));
        assert!(!compatible(&builtin(BuiltinType::String), &ints));
        assert!(!compatible(&ints, &builtin(BuiltinType::String)));
    }
}
