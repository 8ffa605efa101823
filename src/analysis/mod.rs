// Copyright (c) 2025 John Wilger
// SPDX-License-Identifier: MIT

//! Static analysis of experiment descriptions.
//!
//! The analyzer combines the schema validator, the type system, and the
//! reference resolver into one pass that produces an ordered list of
//! [`Issue`]s. Execution is gated on zero errors; warnings are surfaced
//! but never block.
//!
//! Checks performed, in order:
//!
//! 1. Schema conformance (when starting from text or a raw value).
//! 2. Type universe construction.
//! 3. Parameter defaults against declared parameter types, and the
//!    references inside defaults.
//! 4. Task declarations: input/output name uniqueness, plugin path
//!    segment count, declared type resolution.
//! 5. Step invocations: task resolution, arity, per-argument type
//!    compatibility, reference resolution inside argument trees.
//! 6. Acyclicity of the combined dependency graph.
//! 7. Explicit dependencies already implied by data references
//!    (warnings).

pub mod graph;

pub use graph::GraphError;

use crate::experiment::description::{
    ExperimentDescription, OutputName, ParameterName, ParameterSpec, Step, StepName,
    TaskDefinition, TaskName, Value,
};
use crate::experiment::reference::{self, Reference, ReferenceError, ReferenceTarget, TextToken};
use crate::infrastructure::parsing::{self, SchemaError};
use crate::typing::{compatible, infer, BuiltinType, Shape, Type, TypeUniverse, UniverseError};
use indexmap::{IndexMap, IndexSet};
use std::fmt;
use thiserror::Error;

/// How serious an issue is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Surfaced, but does not block execution.
    Warning,
    /// Blocks execution.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// One finding of the static analyzer.
#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    /// How serious the finding is.
    pub severity: Severity,
    /// The finding itself.
    pub error: AnalysisError,
}

impl Issue {
    fn error(error: AnalysisError) -> Self {
        Self {
            severity: Severity::Error,
            error,
        }
    }

    fn warning(error: AnalysisError) -> Self {
        Self {
            severity: Severity::Warning,
            error,
        }
    }

    /// Whether this issue blocks execution.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.error)
    }
}

/// Input binding problems: arity, duplicate bindings, duplicate names.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArityError {
    /// More positional arguments than declared inputs.
    #[error("step '{step}' supplies {supplied} positional arguments, task declares {declared}")]
    TooManyPositional {
        /// The invoking step.
        step: String,
        /// How many arguments were supplied.
        supplied: usize,
        /// How many inputs the task declares.
        declared: usize,
    },

    /// A required input received no value.
    #[error("step '{step}' does not supply required input '{input}'")]
    MissingInput {
        /// The invoking step.
        step: String,
        /// The unbound input.
        input: String,
    },

    /// A keyword argument does not match any declared input.
    #[error("step '{step}' supplies unknown input '{input}'")]
    UnknownInput {
        /// The invoking step.
        step: String,
        /// The unmatched keyword.
        input: String,
    },

    /// An input received both a positional and a keyword value.
    #[error("step '{step}' binds input '{input}' both positionally and by keyword")]
    DuplicateBinding {
        /// The invoking step.
        step: String,
        /// The doubly-bound input.
        input: String,
    },

    /// A task declares two inputs with the same name.
    #[error("task '{task}' declares input '{input}' more than once")]
    DuplicateInputName {
        /// The declaring task.
        task: String,
        /// The repeated input name.
        input: String,
    },

    /// A task declares two outputs with the same name.
    #[error("task '{task}' declares output '{output}' more than once")]
    DuplicateOutputName {
        /// The declaring task.
        task: String,
        /// The repeated output name.
        output: String,
    },
}

/// Everything the analyzer can find, as a tagged sum.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// The description violates the structural schema.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The `types` section failed to build a universe.
    #[error(transparent)]
    Universe(#[from] UniverseError),

    /// A declared type outside the `types` section failed to resolve.
    #[error("{context}: {error}")]
    Declaration {
        /// Where the declaration sits.
        context: String,
        /// The resolution failure.
        error: UniverseError,
    },

    /// A reference failed to parse or resolve.
    #[error("{context}: {error}")]
    Reference {
        /// Where the reference sits.
        context: String,
        /// The reference failure.
        error: ReferenceError,
    },

    /// A value's type is not assignable where it is used.
    #[error("{context}: type '{found}' is not compatible with '{expected}'")]
    Compatibility {
        /// Where the value sits.
        context: String,
        /// The inferred type of the value.
        found: Type,
        /// The declared type at that position.
        expected: Type,
    },

    /// Unknown task or dependency names, or a dependency cycle.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Arity and binding problems.
    #[error(transparent)]
    Arity(#[from] ArityError),

    /// An explicit dependency that a data reference already implies.
    #[error("step '{step}' lists dependency '{dependency}' already implied by a reference")]
    RedundantDependency {
        /// The declaring step.
        step: String,
        /// The redundant dependency.
        dependency: String,
    },
}

/// Validates description text, reporting schema problems as issues.
pub fn validate_source(text: &str) -> Vec<Issue> {
    match parsing::parse_str(text) {
        Ok(description) => validate(&description),
        Err(error) => vec![Issue::error(AnalysisError::Schema(error))],
    }
}

/// Validates a raw description value, reporting schema problems as
/// issues.
pub fn validate_value(value: &Value) -> Vec<Issue> {
    match parsing::parse_value(value) {
        Ok(description) => validate(&description),
        Err(error) => vec![Issue::error(AnalysisError::Schema(error))],
    }
}

/// Validates a parsed description.
///
/// Returns every issue found, errors and warnings, in a deterministic
/// order. An empty list means the description is valid.
pub fn validate(description: &ExperimentDescription) -> Vec<Issue> {
    let (universe, universe_errors) = TypeUniverse::build_lenient(&description.types);
    let mut analyzer = Analyzer {
        universe,
        resolved_tasks: IndexMap::new(),
        issues: Vec::new(),
    };
    for error in universe_errors {
        analyzer.issues.push(Issue::error(AnalysisError::Universe(error)));
    }

    analyzer.check_parameters(description);
    analyzer.check_tasks(description);
    analyzer.check_steps(description);
    analyzer.check_graph(description);

    // quiet re-resolution can surface the same finding twice; keep the
    // first occurrence of each
    let mut unique = Vec::new();
    for issue in analyzer.issues {
        if !unique.contains(&issue) {
            unique.push(issue);
        }
    }
    unique
}

/// Declared task types, resolved once and reused across steps.
#[derive(Debug, Clone)]
struct ResolvedTask {
    input_types: Vec<Option<Type>>,
    output_types: IndexMap<OutputName, Option<Type>>,
}

/// Where a reference appears, which constrains what it may bind to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefScope {
    /// Inside a parameter default: only parameters may be referenced.
    ParameterDefault,
    /// Inside a step's argument tree: parameters and step outputs.
    StepArguments,
}

struct Analyzer {
    universe: TypeUniverse,
    resolved_tasks: IndexMap<TaskName, ResolvedTask>,
    issues: Vec<Issue>,
}

impl Analyzer {
    fn push_error(&mut self, error: AnalysisError) {
        self.issues.push(Issue::error(error));
    }

    // --- check 3: parameters --------------------------------------------

    fn check_parameters(&mut self, description: &ExperimentDescription) {
        for (name, spec) in &description.parameters {
            let context = format!("parameter '{name}'");

            let declared = spec.declared_type().and_then(|expr| {
                match self.universe.resolve(expr) {
                    Ok(resolved) => Some(resolved),
                    Err(error) => {
                        self.push_error(AnalysisError::Declaration {
                            context: context.clone(),
                            error,
                        });
                        None
                    }
                }
            });

            let Some(default) = spec.default() else {
                continue;
            };
            let default_context = format!("parameter '{name}' default");
            let mut visited = vec![name.clone()];
            let inferred = self.argument_type(
                description,
                default,
                &default_context,
                &mut visited,
                RefScope::ParameterDefault,
            );

            if let (Some(found), Some(expected)) = (inferred, declared) {
                if !compatible(&found, &expected) {
                    self.push_error(AnalysisError::Compatibility {
                        context: default_context,
                        found,
                        expected,
                    });
                }
            }
        }
    }

    // --- check 4: tasks --------------------------------------------------

    fn check_tasks(&mut self, description: &ExperimentDescription) {
        for (task_name, task) in &description.tasks {
            if task.plugin.segment_count() < 2 {
                self.push_error(AnalysisError::Schema(SchemaError::PluginPathTooShort {
                    task: task_name.to_string(),
                    path: task.plugin.to_string(),
                }));
            }

            let mut input_names = IndexSet::new();
            for input in &task.inputs {
                if !input_names.insert(input.name.clone()) {
                    self.push_error(AnalysisError::Arity(ArityError::DuplicateInputName {
                        task: task_name.to_string(),
                        input: input.name.to_string(),
                    }));
                }
            }

            let mut output_names = IndexSet::new();
            for output in task.outputs.declarations() {
                if !output_names.insert(output.name.clone()) {
                    self.push_error(AnalysisError::Arity(ArityError::DuplicateOutputName {
                        task: task_name.to_string(),
                        output: output.name.to_string(),
                    }));
                }
            }

            let input_types = task
                .inputs
                .iter()
                .map(|input| {
                    let context = format!("task '{task_name}' input '{}'", input.name);
                    self.resolve_declared(&input.declared_type, &context)
                })
                .collect();
            let output_types = task
                .outputs
                .declarations()
                .iter()
                .map(|output| {
                    let context = format!("task '{task_name}' output '{}'", output.name);
                    (
                        output.name.clone(),
                        self.resolve_declared(&output.declared_type, &context),
                    )
                })
                .collect();

            self.resolved_tasks.insert(
                task_name.clone(),
                ResolvedTask {
                    input_types,
                    output_types,
                },
            );
        }
    }

    fn resolve_declared(
        &mut self,
        expr: &crate::typing::TypeExpr,
        context: &str,
    ) -> Option<Type> {
        match self.universe.resolve(expr) {
            Ok(resolved) => Some(resolved),
            Err(error) => {
                self.push_error(AnalysisError::Declaration {
                    context: context.to_string(),
                    error,
                });
                None
            }
        }
    }

    // --- check 5: steps ---------------------------------------------------

    fn check_steps(&mut self, description: &ExperimentDescription) {
        for (step_name, step) in &description.graph {
            let Some(task) = description.tasks.get(&step.task) else {
                self.push_error(AnalysisError::Graph(GraphError::UnknownTask {
                    step: step_name.to_string(),
                    task: step.task.to_string(),
                }));
                // the references still deserve checking
                for value in step.invocation.argument_values() {
                    let context = format!("step '{step_name}'");
                    let mut visited = Vec::new();
                    self.argument_type(
                        description,
                        value,
                        &context,
                        &mut visited,
                        RefScope::StepArguments,
                    );
                }
                continue;
            };
            self.check_invocation(description, step_name, step, task);
        }
    }

    fn check_invocation(
        &mut self,
        description: &ExperimentDescription,
        step_name: &StepName,
        step: &Step,
        task: &TaskDefinition,
    ) {
        let resolved = self.resolved_tasks.get(&step.task).cloned();
        let args = step.invocation.positional();

        if args.len() > task.inputs.len() {
            self.push_error(AnalysisError::Arity(ArityError::TooManyPositional {
                step: step_name.to_string(),
                supplied: args.len(),
                declared: task.inputs.len(),
            }));
        }

        // positional bindings
        for (index, value) in args.iter().enumerate() {
            let input = task.inputs.get(index);
            let context = match input {
                Some(input) => format!("step '{step_name}' input '{}'", input.name),
                None => format!("step '{step_name}' argument {}", index + 1),
            };
            let mut visited = Vec::new();
            let found = self.argument_type(
                description,
                value,
                &context,
                &mut visited,
                RefScope::StepArguments,
            );
            let declared = resolved
                .as_ref()
                .and_then(|resolved| resolved.input_types.get(index))
                .and_then(Clone::clone);
            if let (Some(found), Some(expected)) = (found, declared) {
                if !compatible(&found, &expected) {
                    self.push_error(AnalysisError::Compatibility {
                        context,
                        found,
                        expected,
                    });
                }
            }
        }

        // keyword bindings
        let kwargs: Vec<_> = step.invocation.keyword().collect();
        for &(keyword, value) in &kwargs {
            let context = format!("step '{step_name}' input '{keyword}'");
            let mut visited = Vec::new();
            let found = self.argument_type(
                description,
                value,
                &context,
                &mut visited,
                RefScope::StepArguments,
            );

            let position = task
                .inputs
                .iter()
                .position(|input| input.name.to_string() == keyword.to_string());
            let Some(position) = position else {
                self.push_error(AnalysisError::Arity(ArityError::UnknownInput {
                    step: step_name.to_string(),
                    input: keyword.to_string(),
                }));
                continue;
            };
            if position < args.len() {
                self.push_error(AnalysisError::Arity(ArityError::DuplicateBinding {
                    step: step_name.to_string(),
                    input: keyword.to_string(),
                }));
                continue;
            }

            let declared = resolved
                .as_ref()
                .and_then(|resolved| resolved.input_types.get(position))
                .and_then(Clone::clone);
            if let (Some(found), Some(expected)) = (found, declared) {
                if !compatible(&found, &expected) {
                    self.push_error(AnalysisError::Compatibility {
                        context,
                        found,
                        expected,
                    });
                }
            }
        }

        // required inputs must all be bound
        for (index, input) in task.inputs.iter().enumerate() {
            if !input.required || index < args.len() {
                continue;
            }
            let bound_by_keyword = kwargs
                .iter()
                .any(|(keyword, _)| keyword.to_string() == input.name.to_string());
            if !bound_by_keyword {
                self.push_error(AnalysisError::Arity(ArityError::MissingInput {
                    step: step_name.to_string(),
                    input: input.name.to_string(),
                }));
            }
        }
    }

    // --- checks 6 and 7: the graph ---------------------------------------

    fn check_graph(&mut self, description: &ExperimentDescription) {
        for (step_name, step) in &description.graph {
            for dependency in &step.dependencies {
                if !description.graph.contains_key(dependency) {
                    self.push_error(AnalysisError::Graph(GraphError::UnknownDependency {
                        step: step_name.to_string(),
                        dependency: dependency.to_string(),
                    }));
                }
            }
        }

        if let Err(error) = graph::topological_order(description) {
            self.push_error(AnalysisError::Graph(error));
        }

        for (step_name, step) in &description.graph {
            let implied = graph::data_dependencies(step, description);
            for dependency in &step.dependencies {
                if implied.contains(dependency) {
                    self.issues.push(Issue::warning(
                        AnalysisError::RedundantDependency {
                            step: step_name.to_string(),
                            dependency: dependency.to_string(),
                        },
                    ));
                }
            }
        }
    }

    // --- reference-aware type inference -----------------------------------

    /// The type of an argument value: literal inference with references
    /// substituted by the type of what they bind to. `None` means the
    /// type is unknown because an issue was already reported.
    fn argument_type(
        &mut self,
        description: &ExperimentDescription,
        value: &Value,
        context: &str,
        visited: &mut Vec<ParameterName>,
        scope: RefScope,
    ) -> Option<Type> {
        match value {
            Value::String(text) => match reference::classify(text) {
                Err(error) => {
                    self.push_error(AnalysisError::Reference {
                        context: context.to_string(),
                        error,
                    });
                    None
                }
                Ok(TextToken::Literal) | Ok(TextToken::Escaped(_)) => {
                    Some(Type::builtin(BuiltinType::String))
                }
                Ok(TextToken::Reference(reference)) => {
                    self.reference_type(description, &reference, context, visited, scope)
                }
            },
            Value::Sequence(elements) => {
                let element_types = elements
                    .iter()
                    .map(|element| {
                        self.argument_type(description, element, context, visited, scope)
                    })
                    .collect::<Vec<_>>();
                let element_types: Option<Vec<Type>> = element_types.into_iter().collect();
                element_types.map(|elements| Type::anonymous(Shape::Tuple(elements)))
            }
            Value::Mapping(mapping) => {
                self.mapping_type(description, mapping, context, visited, scope)
            }
            Value::Tagged(tagged) => {
                self.argument_type(description, &tagged.value, context, visited, scope)
            }
            scalar => Some(infer(scalar)),
        }
    }

    fn mapping_type(
        &mut self,
        description: &ExperimentDescription,
        mapping: &serde_yaml::Mapping,
        context: &str,
        visited: &mut Vec<ParameterName>,
        scope: RefScope,
    ) -> Option<Type> {
        use crate::experiment::description::PropertyName;
        use crate::infrastructure::types::NonEmptyString;

        if mapping.is_empty() {
            return Some(Type::anonymous(Shape::Record(IndexMap::new())));
        }

        let string_keys: Option<Vec<PropertyName>> = mapping
            .keys()
            .map(|key| match key {
                Value::String(key) => NonEmptyString::parse(key.clone())
                    .ok()
                    .map(PropertyName::new),
                _ => None,
            })
            .collect();
        if let Some(names) = string_keys {
            let mut properties = IndexMap::new();
            for (name, entry) in names.into_iter().zip(mapping.values()) {
                let entry_type =
                    self.argument_type(description, entry, context, visited, scope)?;
                properties.insert(name, entry_type);
            }
            return Some(Type::anonymous(Shape::Record(properties)));
        }

        let integer_keys = mapping
            .keys()
            .all(|key| matches!(key, Value::Number(n) if n.is_i64() || n.is_u64()));
        if integer_keys {
            let value_types = mapping
                .values()
                .map(|entry| self.argument_type(description, entry, context, visited, scope))
                .collect::<Vec<_>>();
            let value_types: Option<Vec<Type>> = value_types.into_iter().collect();
            return value_types.map(|types| {
                Type::anonymous(Shape::Map {
                    key: Box::new(Type::builtin(BuiltinType::Integer)),
                    value: Box::new(Type::union_of(types)),
                })
            });
        }

        // mixed keys carry no structure, but nested references still
        // deserve resolution checks
        for entry in mapping.values() {
            self.argument_type(description, entry, context, visited, scope);
        }
        Some(Type::builtin(BuiltinType::Any))
    }

    fn reference_type(
        &mut self,
        description: &ExperimentDescription,
        reference: &Reference,
        context: &str,
        visited: &mut Vec<ParameterName>,
        scope: RefScope,
    ) -> Option<Type> {
        match reference.resolve(description) {
            Err(error) => {
                self.push_error(AnalysisError::Reference {
                    context: context.to_string(),
                    error,
                });
                None
            }
            Ok(ReferenceTarget::Parameter(parameter)) => {
                self.parameter_type(description, &parameter, context, visited)
            }
            Ok(ReferenceTarget::StepOutput { step, output }) => {
                if scope == RefScope::ParameterDefault {
                    self.push_error(AnalysisError::Reference {
                        context: context.to_string(),
                        error: ReferenceError::StepOutputNotAllowed {
                            reference: reference.to_string(),
                        },
                    });
                    return None;
                }
                self.output_type(description, &step, &output)
            }
        }
    }

    /// The type of a parameter: its declared type, or the type inferred
    /// from its default. Resolution failures stay quiet here; the
    /// parameter and task checks already reported them.
    fn parameter_type(
        &mut self,
        description: &ExperimentDescription,
        name: &ParameterName,
        context: &str,
        visited: &mut Vec<ParameterName>,
    ) -> Option<Type> {
        if visited.contains(name) {
            self.push_error(AnalysisError::Reference {
                context: context.to_string(),
                error: ReferenceError::CircularDefault {
                    parameter: name.to_string(),
                },
            });
            return None;
        }

        let spec = description.parameters.get(name)?;
        match spec {
            ParameterSpec::Declared { declared_type, .. } => {
                self.universe.resolve(declared_type).ok()
            }
            ParameterSpec::Inferred { default } => {
                visited.push(name.clone());
                let inferred = self.argument_type(
                    description,
                    default,
                    &format!("parameter '{name}' default"),
                    visited,
                    RefScope::ParameterDefault,
                );
                visited.pop();
                inferred
            }
        }
    }

    /// The declared type of a step output, quietly.
    fn output_type(
        &self,
        description: &ExperimentDescription,
        step: &StepName,
        output: &OutputName,
    ) -> Option<Type> {
        let step = description.graph.get(step)?;
        let resolved = self.resolved_tasks.get(&step.task)?;
        resolved.output_types.get(output)?.clone()
    }
}
