// Copyright (c) 2025 John Wilger
// SPDX-License-Identifier: MIT

//! Domain types for the experiment description.
//!
//! These types are produced by the parsing layer
//! (`crate::infrastructure::parsing`) and are fully immutable from the
//! engine's perspective: once a description has been handed in, no
//! component mutates it. The static analyzer and the executor both work
//! from this representation.
//!
//! # Type Safety Guarantees
//!
//! 1. **Non-empty guarantees**: All name types wrap `NonEmptyString`, so a
//!    name can never be empty after construction.
//!
//! 2. **Newtype wrappers**: Task, step, parameter, type, input, and output
//!    names are distinct types, preventing cross-kind lookups at compile
//!    time.
//!
//! 3. **Structured data**: Invocation forms and output declarations are
//!    enums, so "a step with both a single output and an output list" or
//!    "a parameter with neither type nor default" cannot be represented.

use crate::infrastructure::types::{Identifier, NonEmptyString, ParseError};
use crate::typing::TypeExpr;
use indexmap::IndexMap;
use nutype::nutype;
use std::fmt;

/// The in-memory value universe threaded through the engine.
///
/// Scalars, ordered sequences, and insertion-ordered mappings; exactly
/// what YAML and JSON producers emit. Argument trees, parameter bindings,
/// and plugin return values all live in this universe.
pub type Value = serde_yaml::Value;

/// Name of a declared type.
#[nutype(derive(Debug, Clone, PartialEq, Eq, Hash, Display))]
pub struct TypeName(NonEmptyString);

/// Name of a global parameter.
#[nutype(derive(Debug, Clone, PartialEq, Eq, Hash, Display))]
pub struct ParameterName(NonEmptyString);

/// Short name of a task within the `tasks` section.
#[nutype(derive(Debug, Clone, PartialEq, Eq, Hash, Display))]
pub struct TaskName(NonEmptyString);

/// Name of a step within the `graph` section.
#[nutype(derive(Debug, Clone, PartialEq, Eq, Hash, Display))]
pub struct StepName(NonEmptyString);

/// Name of a task input.
#[nutype(derive(Debug, Clone, PartialEq, Eq, Hash, Display))]
pub struct InputName(NonEmptyString);

/// Name of a task output.
#[nutype(derive(Debug, Clone, PartialEq, Eq, Hash, Display))]
pub struct OutputName(NonEmptyString);

/// Name of a property in an enumerated mapping type.
#[nutype(derive(Debug, Clone, PartialEq, Eq, Hash, Display))]
pub struct PropertyName(NonEmptyString);

/// A dotted plugin path such as `greetings.say.hello`.
///
/// The final segment names the function; the preceding segments identify
/// the plugin module resolved by the plugin loader. Paths parse with at
/// least one segment; the static analyzer enforces the two-segment
/// minimum so that the problem surfaces as an issue rather than a parse
/// abort.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PluginPath {
    segments: Vec<Identifier>,
}

impl PluginPath {
    /// Parses a dotted path. Every segment must be a valid identifier.
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let segments = s
            .split('.')
            .map(|segment| Identifier::parse(segment.to_string()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { segments })
    }

    /// The number of dotted segments.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// The function name: the last segment.
    pub fn function(&self) -> &str {
        // parse() guarantees at least one segment
        self.segments[self.segments.len() - 1].as_str()
    }

    /// The module segments: everything before the function name.
    pub fn module_segments(&self) -> impl Iterator<Item = &str> {
        self.segments[..self.segments.len() - 1]
            .iter()
            .map(Identifier::as_str)
    }
}

impl fmt::Display for PluginPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(segment.as_str())?;
        }
        Ok(())
    }
}

/// A named type definition from the `types` section.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDefinition {
    /// A simple type, optionally deriving another simple type.
    Simple {
        /// The supertype, when declared via `is_a`.
        is_a: Option<TypeName>,
    },
    /// A named structured or union type.
    Structural(TypeExpr),
}

/// A global parameter declaration.
///
/// At least one of declared type and default is always present; the enum
/// makes the "neither" state unrepresentable.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterSpec {
    /// The parameter declares its type; a default is optional. Without a
    /// default the parameter must be bound at run time.
    Declared {
        /// The declared type expression.
        declared_type: TypeExpr,
        /// The default value, if any.
        default: Option<Value>,
    },
    /// Only a default is given; the type is inferred from it.
    Inferred {
        /// The default value.
        default: Value,
    },
}

impl ParameterSpec {
    /// The declared type expression, when present.
    pub fn declared_type(&self) -> Option<&TypeExpr> {
        match self {
            ParameterSpec::Declared { declared_type, .. } => Some(declared_type),
            ParameterSpec::Inferred { .. } => None,
        }
    }

    /// The default value, when present.
    pub fn default(&self) -> Option<&Value> {
        match self {
            ParameterSpec::Declared { default, .. } => default.as_ref(),
            ParameterSpec::Inferred { default } => Some(default),
        }
    }
}

/// A declared task input.
#[derive(Debug, Clone, PartialEq)]
pub struct InputSpec {
    /// The input name, unique within the task.
    pub name: InputName,
    /// The declared type expression.
    pub declared_type: TypeExpr,
    /// Whether a value must be supplied at every invocation.
    pub required: bool,
}

/// A declared task output.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputDecl {
    /// The output name, unique within the task.
    pub name: OutputName,
    /// The declared type expression.
    pub declared_type: TypeExpr,
}

/// The output declaration of a task.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputSpec {
    /// The task produces no captured output.
    None,
    /// A single output: the plugin return value is bound to it whole, and
    /// `$step` references resolve to it without naming it.
    Single(OutputDecl),
    /// An ordered output list: the plugin return must be a sequence and
    /// is positionally unpacked.
    List(Vec<OutputDecl>),
}

impl OutputSpec {
    /// All declared outputs, in declaration order.
    pub fn declarations(&self) -> &[OutputDecl] {
        match self {
            OutputSpec::None => &[],
            OutputSpec::Single(decl) => std::slice::from_ref(decl),
            OutputSpec::List(decls) => decls,
        }
    }

    /// The sole output, when the task declares exactly one.
    pub fn sole(&self) -> Option<&OutputDecl> {
        match self.declarations() {
            [decl] => Some(decl),
            _ => None,
        }
    }

    /// Looks up a declared output by name.
    pub fn find(&self, name: &OutputName) -> Option<&OutputDecl> {
        self.declarations().iter().find(|decl| &decl.name == name)
    }
}

/// A task definition from the `tasks` section.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDefinition {
    /// The dotted plugin path resolved by the plugin loader.
    pub plugin: PluginPath,
    /// Ordered input declarations.
    pub inputs: Vec<InputSpec>,
    /// Output declaration.
    pub outputs: OutputSpec,
}

/// How a step supplies arguments to its task.
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    /// Positional arguments, matched against inputs by position.
    Positional(Vec<Value>),
    /// Keyword arguments, matched against inputs by name.
    Keyword(IndexMap<InputName, Value>),
    /// Both positional and keyword arguments (the `task`/`args`/`kwargs`
    /// step form).
    Mixed {
        /// Positional arguments.
        args: Vec<Value>,
        /// Keyword arguments.
        kwargs: IndexMap<InputName, Value>,
    },
}

impl Invocation {
    /// The positional argument values, in order.
    pub fn positional(&self) -> &[Value] {
        match self {
            Invocation::Positional(args) => args,
            Invocation::Keyword(_) => &[],
            Invocation::Mixed { args, .. } => args,
        }
    }

    /// The keyword argument values, in appearance order.
    pub fn keyword(&self) -> impl Iterator<Item = (&InputName, &Value)> {
        let kwargs = match self {
            Invocation::Keyword(kwargs) | Invocation::Mixed { kwargs, .. } => Some(kwargs),
            Invocation::Positional(_) => None,
        };
        kwargs.into_iter().flatten()
    }

    /// Every argument value in the invocation, positional first.
    pub fn argument_values(&self) -> impl Iterator<Item = &Value> {
        self.positional()
            .iter()
            .chain(self.keyword().map(|(_, value)| value))
    }
}

/// A step: one concrete invocation of a task inside the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// The short name of the invoked task.
    pub task: TaskName,
    /// The argument tree.
    pub invocation: Invocation,
    /// Explicit dependencies on other steps, in declaration order.
    pub dependencies: Vec<StepName>,
}

/// A complete, parsed experiment description.
///
/// All sections preserve the order in which entries first appear in the
/// source document; the executor's deterministic tie-break relies on it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentDescription {
    /// Named type definitions (may be empty).
    pub types: IndexMap<TypeName, TypeDefinition>,
    /// Global parameter declarations (may be empty).
    pub parameters: IndexMap<ParameterName, ParameterSpec>,
    /// Task definitions, keyed by short name.
    pub tasks: IndexMap<TaskName, TaskDefinition>,
    /// Steps, keyed by step name.
    pub graph: IndexMap<StepName, Step>,
}

impl ExperimentDescription {
    /// Looks up a task definition by short name.
    pub fn task(&self, name: &TaskName) -> Option<&TaskDefinition> {
        self.tasks.get(name)
    }

    /// Looks up a step by name.
    pub fn step(&self, name: &StepName) -> Option<&Step> {
        self.graph.get(name)
    }

    /// The task definition a step invokes, when the reference resolves.
    pub fn task_for_step(&self, step: &Step) -> Option<&TaskDefinition> {
        self.tasks.get(&step.task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plugin_path_parses_dotted_segments() {
        let path = PluginPath::parse("greetings.say.hello").unwrap();
        assert_eq!(path.segment_count(), 3);
        assert_eq!(path.function(), "hello");
        let modules: Vec<&str> = path.module_segments().collect();
        assert_eq!(modules, vec!["greetings", "say"]);
        assert_eq!(path.to_string(), "greetings.say.hello");
    }

    #[test]
    fn plugin_path_rejects_empty_and_malformed_segments() {
        assert!(PluginPath::parse("").is_err());
        assert!(PluginPath::parse("a..b").is_err());
        assert!(PluginPath::parse("a.2b").is_err());
        assert!(PluginPath::parse("a.b-c").is_err());
    }

    #[test]
    fn single_segment_path_parses_but_has_no_modules() {
        let path = PluginPath::parse("hello").unwrap();
        assert_eq!(path.segment_count(), 1);
        assert_eq!(path.function(), "hello");
        assert_eq!(path.module_segments().count(), 0);
    }

    #[test]
    fn output_spec_sole_requires_exactly_one_declaration() {
        let name = |s: &str| OutputName::new(NonEmptyString::parse(s.to_string()).unwrap());
        let decl = |s: &str| OutputDecl {
            name: name(s),
            declared_type: TypeExpr::named("string"),
        };

        assert!(OutputSpec::None.sole().is_none());
        assert!(OutputSpec::Single(decl("a")).sole().is_some());
        assert!(OutputSpec::List(vec![decl("a")]).sole().is_some());
        assert!(OutputSpec::List(vec![decl("a"), decl("b")]).sole().is_none());
    }
}
