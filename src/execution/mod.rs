// Copyright (c) 2025 John Wilger
// SPDX-License-Identifier: MIT

//! The graph executor.
//!
//! Given a valid description, a parameter binding, and a plugin loader,
//! the executor linearizes the combined dependency graph, materializes
//! each step's arguments by deep reference substitution, invokes the
//! task plugins one at a time, and captures their outputs. Execution is
//! strictly sequential; the first failure stops the run. There is no
//! rollback and no retry.
//!
//! Per-run state is the completed parameter binding and the step-output
//! map; both are private to the executor and discarded when it returns.

pub mod plugin;
pub mod tracker;

pub use plugin::{
    PluginArgs, PluginError, PluginLoader, PluginRegistry, ProcessPluginLoader, TaskPlugin,
};
pub use tracker::{LogTracker, NoopTracker, RunTracker};

use crate::analysis::graph::{self, GraphError};
use crate::experiment::description::{
    ExperimentDescription, OutputName, OutputSpec, ParameterName, PluginPath, Step, StepName,
    TaskDefinition, Value,
};
use crate::experiment::reference::{self, ReferenceError, ReferenceTarget, TextToken};
use indexmap::IndexMap;
use thiserror::Error;

/// Fatal run-time errors.
#[derive(Debug, Error)]
pub enum RunError {
    /// A parameter has neither an external value nor a default.
    #[error("parameter '{name}' has no value and no default")]
    MissingParameter {
        /// The unbound parameter.
        name: String,
    },

    /// The graph could not be linearized or a name failed to resolve.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// A reference could not be substituted.
    #[error("{context}: {error}")]
    Reference {
        /// Where the reference sits.
        context: String,
        /// The reference failure.
        error: ReferenceError,
    },

    /// A referenced output was never bound by its producing step.
    #[error("step '{step}' references output '{output}' of step '{producer}', which is unbound")]
    UnboundOutput {
        /// The consuming step.
        step: String,
        /// The producing step.
        producer: String,
        /// The unbound output name.
        output: String,
    },

    /// The plugin could not be loaded or raised during invocation.
    #[error("step '{step}' ({plugin}) failed")]
    Plugin {
        /// The failing step.
        step: String,
        /// The dotted plugin path.
        plugin: String,
        /// The underlying plugin failure.
        #[source]
        source: PluginError,
    },

    /// A task with an output list received a non-iterable return value.
    #[error("step '{step}' ({plugin}): output list requires a sequence return, got {kind}")]
    NotUnpackable {
        /// The failing step.
        step: String,
        /// The dotted plugin path.
        plugin: String,
        /// The kind of value the plugin returned.
        kind: &'static str,
    },
}

/// The outcome of one executed step.
#[derive(Debug)]
pub struct StepOutcome {
    /// The step name.
    pub step: StepName,
    /// The dotted plugin path that was invoked.
    pub plugin: PluginPath,
    /// Success with bound outputs, or failure with the rendered error.
    pub status: StepStatus,
}

/// Success or failure of a step.
#[derive(Debug)]
pub enum StepStatus {
    /// The plugin returned and its outputs were captured.
    Succeeded {
        /// The bound outputs, in declaration order.
        outputs: IndexMap<OutputName, Value>,
    },
    /// The step failed; the run stops here.
    Failed {
        /// The rendered error chain.
        error: String,
    },
}

impl StepOutcome {
    /// Whether the step completed successfully.
    pub fn succeeded(&self) -> bool {
        matches!(self.status, StepStatus::Succeeded { .. })
    }
}

/// Everything a run produced: per-step outcomes in execution order, and
/// the fatal error when the run did not finish.
#[derive(Debug)]
pub struct RunReport {
    /// Outcomes of the steps that ran, in execution order.
    pub steps: Vec<StepOutcome>,
    /// The fatal error, when the run failed.
    pub failure: Option<RunError>,
}

impl RunReport {
    /// Whether every step finished successfully.
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }
}

/// Runs one experiment to completion or first failure.
pub struct Executor<'a> {
    description: &'a ExperimentDescription,
    loader: &'a dyn PluginLoader,
}

impl<'a> Executor<'a> {
    /// Creates an executor over a description and a plugin loader.
    pub fn new(description: &'a ExperimentDescription, loader: &'a dyn PluginLoader) -> Self {
        Self {
            description,
            loader,
        }
    }

    /// Executes the experiment with the given external parameter values.
    ///
    /// The report carries one outcome per executed step; when a step
    /// fails, its outcome is the last entry and `failure` holds the
    /// error. Validation is expected to have passed beforehand; the
    /// executor still fails cleanly on anything it cannot resolve.
    pub fn run(
        &self,
        external: &IndexMap<String, Value>,
        tracker: &mut dyn RunTracker,
    ) -> RunReport {
        let mut report = RunReport {
            steps: Vec::new(),
            failure: None,
        };

        let parameters = match self.complete_parameters(external) {
            Ok(parameters) => parameters,
            Err(error) => {
                tracker.run_failed(&error);
                report.failure = Some(error);
                return report;
            }
        };

        let order = match graph::topological_order(self.description) {
            Ok(order) => order,
            Err(error) => {
                let error = RunError::from(error);
                tracker.run_failed(&error);
                report.failure = Some(error);
                return report;
            }
        };

        tracker.run_started(self.description, &parameters);

        let mut outputs: IndexMap<StepName, IndexMap<OutputName, Value>> = IndexMap::new();
        for step_name in order {
            let result = self.run_step(&step_name, &parameters, &outputs);
            match result {
                Ok((plugin, bound)) => {
                    tracing::debug!(
                        step = %step_name,
                        outputs = bound.len(),
                        "step finished"
                    );
                    report.steps.push(StepOutcome {
                        step: step_name.clone(),
                        plugin,
                        status: StepStatus::Succeeded {
                            outputs: bound.clone(),
                        },
                    });
                    outputs.insert(step_name, bound);
                }
                Err((plugin, error)) => {
                    tracing::error!(
                        step = %step_name,
                        plugin = %plugin_path_display(&plugin),
                        error = %render_error_chain(&error),
                        "step failed; stopping run"
                    );
                    if let Some(plugin) = plugin {
                        report.steps.push(StepOutcome {
                            step: step_name,
                            plugin,
                            status: StepStatus::Failed {
                                error: render_error_chain(&error),
                            },
                        });
                    }
                    tracker.run_failed(&error);
                    report.failure = Some(error);
                    return report;
                }
            }
        }

        tracker.run_finished();
        report
    }

    /// Completes the parameter binding: external values first, then
    /// defaults with their references substituted.
    fn complete_parameters(
        &self,
        external: &IndexMap<String, Value>,
    ) -> Result<IndexMap<ParameterName, Value>, RunError> {
        let mut bindings: IndexMap<ParameterName, Value> = IndexMap::new();
        let mut stack = Vec::new();
        for name in self.description.parameters.keys() {
            self.bind_parameter(name, external, &mut bindings, &mut stack)?;
        }

        for supplied in external.keys() {
            let declared = self
                .description
                .parameters
                .keys()
                .any(|name| name.to_string() == *supplied);
            if !declared {
                tracing::warn!(parameter = %supplied, "ignoring undeclared parameter value");
            }
        }
        Ok(bindings)
    }

    fn bind_parameter(
        &self,
        name: &ParameterName,
        external: &IndexMap<String, Value>,
        bindings: &mut IndexMap<ParameterName, Value>,
        stack: &mut Vec<ParameterName>,
    ) -> Result<Value, RunError> {
        if let Some(bound) = bindings.get(name) {
            return Ok(bound.clone());
        }
        if stack.contains(name) {
            return Err(RunError::Reference {
                context: format!("parameter '{name}'"),
                error: ReferenceError::CircularDefault {
                    parameter: name.to_string(),
                },
            });
        }

        // externally supplied values are taken verbatim
        if let Some(value) = external.get(&name.to_string()) {
            bindings.insert(name.clone(), value.clone());
            return Ok(value.clone());
        }

        let default = self
            .description
            .parameters
            .get(name)
            .and_then(|spec| spec.default().cloned())
            .ok_or_else(|| RunError::MissingParameter {
                name: name.to_string(),
            })?;

        stack.push(name.clone());
        let value = self.substitute_default(&default, name, external, bindings, stack)?;
        stack.pop();

        bindings.insert(name.clone(), value.clone());
        Ok(value)
    }

    /// Substitutes references inside a parameter default. Only other
    /// parameters may be referenced here.
    fn substitute_default(
        &self,
        value: &Value,
        parameter: &ParameterName,
        external: &IndexMap<String, Value>,
        bindings: &mut IndexMap<ParameterName, Value>,
        stack: &mut Vec<ParameterName>,
    ) -> Result<Value, RunError> {
        let context = || format!("parameter '{parameter}' default");
        match value {
            Value::String(text) => match reference::classify(text) {
                Err(error) => Err(RunError::Reference {
                    context: context(),
                    error,
                }),
                Ok(TextToken::Literal) => Ok(value.clone()),
                Ok(TextToken::Escaped(unescaped)) => Ok(Value::String(unescaped)),
                Ok(TextToken::Reference(reference)) => {
                    match reference.resolve(self.description) {
                        Err(error) => Err(RunError::Reference {
                            context: context(),
                            error,
                        }),
                        Ok(ReferenceTarget::Parameter(target)) => {
                            self.bind_parameter(&target, external, bindings, stack)
                        }
                        Ok(ReferenceTarget::StepOutput { .. }) => Err(RunError::Reference {
                            context: context(),
                            error: ReferenceError::StepOutputNotAllowed {
                                reference: reference.to_string(),
                            },
                        }),
                    }
                }
            },
            Value::Sequence(elements) => {
                let elements = elements
                    .iter()
                    .map(|element| {
                        self.substitute_default(element, parameter, external, bindings, stack)
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Sequence(elements))
            }
            Value::Mapping(mapping) => {
                let mut substituted = serde_yaml::Mapping::new();
                for (key, entry) in mapping {
                    substituted.insert(
                        key.clone(),
                        self.substitute_default(entry, parameter, external, bindings, stack)?,
                    );
                }
                Ok(Value::Mapping(substituted))
            }
            Value::Tagged(tagged) => Ok(Value::Tagged(Box::new(serde_yaml::value::TaggedValue {
                tag: tagged.tag.clone(),
                value: self.substitute_default(
                    &tagged.value,
                    parameter,
                    external,
                    bindings,
                    stack,
                )?,
            }))),
            scalar => Ok(scalar.clone()),
        }
    }

    /// Runs one step: substitute, invoke, capture.
    #[allow(clippy::type_complexity)]
    fn run_step(
        &self,
        step_name: &StepName,
        parameters: &IndexMap<ParameterName, Value>,
        outputs: &IndexMap<StepName, IndexMap<OutputName, Value>>,
    ) -> Result<(PluginPath, IndexMap<OutputName, Value>), (Option<PluginPath>, RunError)> {
        let Some(step) = self.description.graph.get(step_name) else {
            // unreachable through the public path; the order came from
            // this same graph
            return Err((
                None,
                RunError::Graph(GraphError::UnknownDependency {
                    step: step_name.to_string(),
                    dependency: step_name.to_string(),
                }),
            ));
        };
        let Some(task) = self.description.tasks.get(&step.task) else {
            return Err((
                None,
                RunError::Graph(GraphError::UnknownTask {
                    step: step_name.to_string(),
                    task: step.task.to_string(),
                }),
            ));
        };
        let plugin_path = task.plugin.clone();

        let fail = |error: RunError| (Some(plugin_path.clone()), error);

        let args = self
            .materialize_arguments(step_name, step, parameters, outputs)
            .map_err(|error| fail(error))?;

        tracing::info!(
            step = %step_name,
            plugin = %plugin_path,
            "executing step"
        );

        let plugin = self
            .loader
            .load(&plugin_path)
            .map_err(|source| {
                fail(RunError::Plugin {
                    step: step_name.to_string(),
                    plugin: plugin_path.to_string(),
                    source,
                })
            })?;

        let returned = plugin.call(args).map_err(|source| {
            fail(RunError::Plugin {
                step: step_name.to_string(),
                plugin: plugin_path.to_string(),
                source,
            })
        })?;

        let bound = self
            .capture_outputs(step_name, task, returned)
            .map_err(|error| fail(error))?;
        Ok((plugin_path, bound))
    }

    /// Builds the plugin argument bundle by deep substitution.
    fn materialize_arguments(
        &self,
        step_name: &StepName,
        step: &Step,
        parameters: &IndexMap<ParameterName, Value>,
        outputs: &IndexMap<StepName, IndexMap<OutputName, Value>>,
    ) -> Result<PluginArgs, RunError> {
        let mut args = Vec::new();
        for value in step.invocation.positional() {
            args.push(self.substitute(value, step_name, parameters, outputs)?);
        }
        let mut kwargs = IndexMap::new();
        for (name, value) in step.invocation.keyword() {
            kwargs.insert(
                name.to_string(),
                self.substitute(value, step_name, parameters, outputs)?,
            );
        }
        Ok(PluginArgs { args, kwargs })
    }

    /// Replaces every reference in a value tree with its bound value.
    /// The original tree is untouched; a substituted copy is produced.
    fn substitute(
        &self,
        value: &Value,
        step_name: &StepName,
        parameters: &IndexMap<ParameterName, Value>,
        outputs: &IndexMap<StepName, IndexMap<OutputName, Value>>,
    ) -> Result<Value, RunError> {
        let context = || format!("step '{step_name}'");
        match value {
            Value::String(text) => match reference::classify(text) {
                Err(error) => Err(RunError::Reference {
                    context: context(),
                    error,
                }),
                Ok(TextToken::Literal) => Ok(value.clone()),
                Ok(TextToken::Escaped(unescaped)) => Ok(Value::String(unescaped)),
                Ok(TextToken::Reference(reference)) => {
                    match reference.resolve(self.description) {
                        Err(error) => Err(RunError::Reference {
                            context: context(),
                            error,
                        }),
                        Ok(ReferenceTarget::Parameter(parameter)) => parameters
                            .get(&parameter)
                            .cloned()
                            .ok_or_else(|| RunError::MissingParameter {
                                name: parameter.to_string(),
                            }),
                        Ok(ReferenceTarget::StepOutput { step, output }) => outputs
                            .get(&step)
                            .and_then(|bound| bound.get(&output))
                            .cloned()
                            .ok_or_else(|| RunError::UnboundOutput {
                                step: step_name.to_string(),
                                producer: step.to_string(),
                                output: output.to_string(),
                            }),
                    }
                }
            },
            Value::Sequence(elements) => {
                let elements = elements
                    .iter()
                    .map(|element| self.substitute(element, step_name, parameters, outputs))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Sequence(elements))
            }
            Value::Mapping(mapping) => {
                let mut substituted = serde_yaml::Mapping::new();
                for (key, entry) in mapping {
                    substituted.insert(
                        key.clone(),
                        self.substitute(entry, step_name, parameters, outputs)?,
                    );
                }
                Ok(Value::Mapping(substituted))
            }
            Value::Tagged(tagged) => Ok(Value::Tagged(Box::new(serde_yaml::value::TaggedValue {
                tag: tagged.tag.clone(),
                value: self.substitute(&tagged.value, step_name, parameters, outputs)?,
            }))),
            scalar => Ok(scalar.clone()),
        }
    }

    /// Binds the plugin return value to the task's declared outputs.
    fn capture_outputs(
        &self,
        step_name: &StepName,
        task: &TaskDefinition,
        returned: Value,
    ) -> Result<IndexMap<OutputName, Value>, RunError> {
        let mut bound = IndexMap::new();
        match &task.outputs {
            OutputSpec::None => {}
            OutputSpec::Single(decl) => {
                bound.insert(decl.name.clone(), returned);
            }
            OutputSpec::List(decls) => {
                let Value::Sequence(mut elements) = returned else {
                    return Err(RunError::NotUnpackable {
                        step: step_name.to_string(),
                        plugin: task.plugin.to_string(),
                        kind: value_kind(&returned),
                    });
                };
                // extra positions are discarded; missing positions stay
                // unbound and fail only if something references them
                elements.truncate(decls.len());
                for (decl, element) in decls.iter().zip(elements) {
                    bound.insert(decl.name.clone(), element);
                }
            }
        }
        Ok(bound)
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

fn plugin_path_display(plugin: &Option<PluginPath>) -> String {
    plugin
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "<unresolved>".to_string())
}

fn render_error_chain(error: &RunError) -> String {
    let mut rendered = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::parsing::parse_str;

    fn run(
        yaml: &str,
        external: &[(&str, Value)],
        registry: &PluginRegistry,
    ) -> RunReport {
        let description = parse_str(yaml).unwrap();
        let external: IndexMap<String, Value> = external
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        Executor::new(&description, registry).run(&external, &mut NoopTracker)
    }

    fn output(report: &RunReport, step: usize, name: &str) -> Value {
        match &report.steps[step].status {
            StepStatus::Succeeded { outputs } => outputs
                .iter()
                .find(|(output, _)| output.to_string() == name)
                .map(|(_, value)| value.clone())
                .unwrap(),
            StepStatus::Failed { error } => panic!("step failed: {error}"),
        }
    }

    #[test]
    fn hello_step_executes_and_binds_its_output() {
        let mut registry = PluginRegistry::new();
        registry.register("say.hello", |args: PluginArgs| {
            let greeting = args.kwargs.get("greeting").cloned().unwrap_or(Value::Null);
            Ok(Value::String(format!(
                "plugin({})",
                greeting.as_str().unwrap_or_default()
            )))
        });

        let report = run(
            r#"
tasks:
  hello:
    plugin: say.hello
    inputs: [{greeting: string}]
    outputs: {msg: string}
graph:
  step1: {hello: {greeting: "hi"}}
"#,
            &[],
            &registry,
        );

        assert!(report.succeeded());
        assert_eq!(report.steps.len(), 1);
        assert_eq!(output(&report, 0, "msg"), Value::from("plugin(hi)"));
    }

    #[test]
    fn chained_outputs_flow_between_steps() {
        let mut registry = PluginRegistry::new();
        registry.register("produce.value", |_: PluginArgs| Ok(Value::from(21.5)));
        registry.register("consume.double", |args: PluginArgs| {
            let input = args.args[0].as_f64().unwrap_or_default();
            Ok(Value::from(input * 2.0))
        });

        let report = run(
            r#"
tasks:
  t1: {plugin: produce.value, outputs: {value: number}}
  t2: {plugin: consume.double, inputs: [{in: number}], outputs: {value: number}}
graph:
  step1: {t1: []}
  step2: {t2: [$step1]}
"#,
            &[],
            &registry,
        );

        assert!(report.succeeded());
        let names: Vec<String> = report.steps.iter().map(|s| s.step.to_string()).collect();
        assert_eq!(names, vec!["step1", "step2"]);
        assert_eq!(output(&report, 1, "value"), Value::from(43.0));
    }

    #[test]
    fn parameter_defaults_are_overridable() {
        let mut registry = PluginRegistry::new();
        registry.register("echo.value", |args: PluginArgs| Ok(args.args[0].clone()));

        let yaml = r#"
parameters:
  p: 1
tasks:
  echo: {plugin: echo.value, inputs: [{x: any}], outputs: {out: any}}
graph:
  step: {echo: [$p]}
"#;

        let defaulted = run(yaml, &[], &registry);
        assert_eq!(output(&defaulted, 0, "out"), Value::from(1));

        let overridden = run(yaml, &[("p", Value::from(42))], &registry);
        assert_eq!(output(&overridden, 0, "out"), Value::from(42));
    }

    #[test]
    fn missing_required_parameter_is_fatal_before_any_step() {
        let registry = PluginRegistry::new();
        let report = run(
            r#"
parameters:
  seed: {type: integer}
tasks:
  t: {plugin: m.f}
graph:
  s: {t: []}
"#,
            &[],
            &registry,
        );
        assert!(!report.succeeded());
        assert!(report.steps.is_empty());
        assert!(matches!(
            report.failure,
            Some(RunError::MissingParameter { .. })
        ));
    }

    #[test]
    fn list_outputs_unpack_positionally_and_discard_extras() {
        let mut registry = PluginRegistry::new();
        registry.register("fan.out", |_: PluginArgs| {
            Ok(Value::Sequence(vec![
                Value::from(1),
                Value::from(2),
                Value::from(3),
            ]))
        });

        let report = run(
            r#"
tasks:
  t:
    plugin: fan.out
    outputs: [{a: integer}, {b: integer}]
graph:
  s:
    task: t
"#,
            &[],
            &registry,
        );

        assert!(report.succeeded());
        assert_eq!(output(&report, 0, "a"), Value::from(1));
        assert_eq!(output(&report, 0, "b"), Value::from(2));
        match &report.steps[0].status {
            StepStatus::Succeeded { outputs } => assert_eq!(outputs.len(), 2),
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn short_iterable_leaves_outputs_unbound_and_later_reference_fails() {
        let mut registry = PluginRegistry::new();
        registry.register("fan.out", |_: PluginArgs| {
            Ok(Value::Sequence(vec![Value::from(1)]))
        });
        registry.register("consume.b", |args: PluginArgs| Ok(args.args[0].clone()));

        let report = run(
            r#"
tasks:
  t: {plugin: fan.out, outputs: [{a: integer}, {b: integer}]}
  u: {plugin: consume.b, inputs: [{x: integer}], outputs: {out: integer}}
graph:
  source: {t: []}
  sink: {u: [$source.b]}
"#,
            &[],
            &registry,
        );

        assert!(!report.succeeded());
        // the source step itself succeeded with one bound output
        assert!(report.steps[0].succeeded());
        assert!(matches!(
            report.failure,
            Some(RunError::UnboundOutput { .. })
        ));
    }

    #[test]
    fn non_iterable_return_fails_the_step() {
        let mut registry = PluginRegistry::new();
        registry.register("fan.out", |_: PluginArgs| Ok(Value::from(7)));

        let report = run(
            r#"
tasks:
  t: {plugin: fan.out, outputs: [{a: integer}, {b: integer}]}
graph:
  s: {t: []}
"#,
            &[],
            &registry,
        );

        assert!(!report.succeeded());
        assert!(!report.steps[0].succeeded());
        assert!(matches!(
            report.failure,
            Some(RunError::NotUnpackable { .. })
        ));
    }

    #[test]
    fn plugin_failure_stops_the_run() {
        let mut registry = PluginRegistry::new();
        registry.register("boom.go", |_: PluginArgs| {
            Err(PluginError::Failed {
                message: "exploded".to_string(),
            })
        });
        registry.register("never.runs", |_: PluginArgs| Ok(Value::Null));

        let report = run(
            r#"
tasks:
  boom: {plugin: boom.go, outputs: {v: any}}
  after: {plugin: never.runs, inputs: [{x: any}]}
graph:
  first: {boom: []}
  second: {after: [$first]}
"#,
            &[],
            &registry,
        );

        assert!(!report.succeeded());
        // only the failing step produced an outcome
        assert_eq!(report.steps.len(), 1);
        match &report.steps[0].status {
            StepStatus::Failed { error } => assert!(error.contains("exploded")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn independent_steps_run_in_first_appearance_order() {
        let mut registry = PluginRegistry::new();
        registry.register("noop.run", |_: PluginArgs| Ok(Value::Null));

        let report = run(
            r#"
tasks:
  t: {plugin: noop.run}
graph:
  zeta: {t: []}
  alpha: {t: []}
  mid: {t: []}
"#,
            &[],
            &registry,
        );

        let names: Vec<String> = report.steps.iter().map(|s| s.step.to_string()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn reference_round_trip_preserves_nested_structure() {
        let mut registry = PluginRegistry::new();
        registry.register("echo.value", |args: PluginArgs| Ok(args.args[0].clone()));

        let nested: Value = serde_yaml::from_str("{a: [1, {b: [true, ~]}], c: {d: 2.5}}").unwrap();
        let external: IndexMap<String, Value> =
            [("payload".to_string(), nested.clone())].into_iter().collect();

        let description = parse_str(
            r#"
parameters:
  payload: {type: any}
tasks:
  echo: {plugin: echo.value, inputs: [{x: any}], outputs: {out: any}}
graph:
  s: {echo: [$payload]}
"#,
        )
        .unwrap();
        let report = Executor::new(&description, &registry).run(&external, &mut NoopTracker);

        assert!(report.succeeded());
        assert_eq!(output(&report, 0, "out"), nested);
    }

    #[test]
    fn escaped_dollar_reaches_the_plugin_unescaped_once() {
        let mut registry = PluginRegistry::new();
        registry.register("echo.value", |args: PluginArgs| Ok(args.args[0].clone()));

        let report = run(
            r#"
tasks:
  echo: {plugin: echo.value, inputs: [{x: string}], outputs: {out: string}}
graph:
  s: {echo: ["$$price"]}
"#,
            &[],
            &registry,
        );
        assert_eq!(output(&report, 0, "out"), Value::from("$price"));
    }

    #[test]
    fn mixed_invocation_supplies_args_and_kwargs() {
        let mut registry = PluginRegistry::new();
        registry.register("join.pair", |args: PluginArgs| {
            let first = args.args[0].as_str().unwrap_or_default().to_string();
            let second = args
                .kwargs
                .get("suffix")
                .and_then(Value::as_str)
                .unwrap_or_default();
            Ok(Value::String(format!("{first}-{second}")))
        });

        let report = run(
            r#"
tasks:
  join:
    plugin: join.pair
    inputs: [{prefix: string}, {suffix: string}]
    outputs: {out: string}
graph:
  s:
    task: join
    args: ["left"]
    kwargs: {suffix: "right"}
"#,
            &[],
            &registry,
        );
        assert_eq!(output(&report, 0, "out"), Value::from("left-right"));
    }

    #[test]
    fn parameter_defaults_may_reference_other_parameters() {
        let mut registry = PluginRegistry::new();
        registry.register("echo.value", |args: PluginArgs| Ok(args.args[0].clone()));

        let report = run(
            r#"
parameters:
  base: 10
  derived: {a: $base}
tasks:
  echo: {plugin: echo.value, inputs: [{x: any}], outputs: {out: any}}
graph:
  s: {echo: [$derived]}
"#,
            &[],
            &registry,
        );
        assert!(report.succeeded());
        assert_eq!(
            output(&report, 0, "out"),
            serde_yaml::from_str::<Value>("{a: 10}").unwrap()
        );
    }
}
