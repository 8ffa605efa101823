//! Conversion from raw section values to the domain model.
//!
//! This is where stringly-typed data becomes strongly-typed: names are
//! parsed into their newtype wrappers, plugin paths are split, type
//! expressions are built, and the three step invocation forms are told
//! apart. Everything here is still shape-only; names and types are
//! resolved later by the static analyzer.

use super::document::{render_key, DocumentSections};
use crate::experiment::description::{
    ExperimentDescription, InputName, InputSpec, Invocation, OutputDecl, OutputName, OutputSpec,
    ParameterName, ParameterSpec, PluginPath, PropertyName, Step, StepName, TaskDefinition,
    TaskName, TypeDefinition, TypeName, Value,
};
use crate::infrastructure::types::NonEmptyString;
use crate::typing::TypeExpr;
use indexmap::IndexMap;
use serde_yaml::Mapping;
use thiserror::Error;

/// Violations of the structural schema.
///
/// Schema failure is fatal: the static analyzer and the executor never
/// see a description that failed conversion.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    /// The text was not valid YAML/JSON.
    #[error("description is not valid YAML/JSON: {message}")]
    Parse {
        /// The underlying parser message.
        message: String,
    },

    /// The top level of the description is not a mapping.
    #[error("description must be a mapping")]
    NotAMapping,

    /// A top-level key other than `types`/`parameters`/`tasks`/`graph`.
    #[error("unrecognized top-level key '{name}'")]
    UnknownSection {
        /// The offending key.
        name: String,
    },

    /// A required section is absent.
    #[error("required section '{name}' is missing")]
    MissingSection {
        /// The section name.
        name: &'static str,
    },

    /// A required section is present but empty.
    #[error("section '{name}' must not be empty")]
    EmptySection {
        /// The section name.
        name: &'static str,
    },

    /// A value had the wrong kind for its position.
    #[error("{context}: expected {expected}")]
    UnexpectedShape {
        /// Where in the document the problem sits.
        context: String,
        /// What kind was expected there.
        expected: &'static str,
    },

    /// A name position held an empty or non-string value.
    #[error("{context}: name must be a non-empty string")]
    InvalidName {
        /// Where in the document the problem sits.
        context: String,
    },

    /// A plugin path was not a dotted identifier path.
    #[error("task '{task}': plugin path '{path}' is not a dotted identifier path")]
    InvalidPluginPath {
        /// The declaring task.
        task: String,
        /// The raw path text.
        path: String,
    },

    /// A plugin path had fewer than two segments.
    #[error("task '{task}': plugin path '{path}' needs a module and a function segment")]
    PluginPathTooShort {
        /// The declaring task.
        task: String,
        /// The raw path text.
        path: String,
    },

    /// A type expression did not match the surface grammar.
    #[error("{context}: invalid type expression: {reason}")]
    InvalidTypeExpression {
        /// Where in the document the problem sits.
        context: String,
        /// What went wrong.
        reason: String,
    },

    /// A parameter declared neither a type nor a default.
    #[error("parameter '{name}' must declare a type, a default, or both")]
    EmptyParameter {
        /// The parameter name.
        name: String,
    },

    /// A step did not match any of the three invocation forms.
    #[error("step '{step}': {reason}")]
    InvalidStep {
        /// The step name.
        step: String,
        /// What went wrong.
        reason: String,
    },
}

/// Converts split sections into the domain model.
pub fn convert(sections: &DocumentSections<'_>) -> Result<ExperimentDescription, SchemaError> {
    Ok(ExperimentDescription {
        types: convert_types(sections.types)?,
        parameters: convert_parameters(sections.parameters)?,
        tasks: convert_tasks(sections.tasks)?,
        graph: convert_graph(sections.graph)?,
    })
}

// --- types section -------------------------------------------------------

fn convert_types(
    section: Option<&Mapping>,
) -> Result<IndexMap<TypeName, TypeDefinition>, SchemaError> {
    let mut types = IndexMap::new();
    let Some(section) = section else {
        return Ok(types);
    };

    for (key, definition) in section {
        let name = name_key(key, "types")?;
        let context = format!("types.{name}");
        let definition = convert_type_definition(definition, &context)?;
        types.insert(TypeName::new(name), definition);
    }
    Ok(types)
}

fn convert_type_definition(
    value: &Value,
    context: &str,
) -> Result<TypeDefinition, SchemaError> {
    match value {
        // a bare name with no body is a plain simple type
        Value::Null => Ok(TypeDefinition::Simple { is_a: None }),
        Value::Mapping(mapping) if mapping.contains_key("is_a") => {
            if mapping.len() != 1 {
                return Err(SchemaError::UnexpectedShape {
                    context: context.to_string(),
                    expected: "a mapping with only the is_a key",
                });
            }
            let supertype = mapping
                .get("is_a")
                .and_then(Value::as_str)
                .ok_or_else(|| SchemaError::InvalidName {
                    context: format!("{context}.is_a"),
                })?;
            let supertype = NonEmptyString::parse(supertype.to_string()).map_err(|_| {
                SchemaError::InvalidName {
                    context: format!("{context}.is_a"),
                }
            })?;
            Ok(TypeDefinition::Simple {
                is_a: Some(TypeName::new(supertype)),
            })
        }
        other => Ok(TypeDefinition::Structural(parse_type_expr(other, context)?)),
    }
}

/// Parses the surface grammar of type expressions: a name, `{list: T}`,
/// `{tuple: [..]}`, `{mapping: {..}}` (enumerated), `{mapping: [K, V]}`
/// (key/value), or `{union: [..]}`.
pub fn parse_type_expr(value: &Value, context: &str) -> Result<TypeExpr, SchemaError> {
    match value {
        Value::String(name) => {
            let name = NonEmptyString::parse(name.clone()).map_err(|_| {
                SchemaError::InvalidTypeExpression {
                    context: context.to_string(),
                    reason: "type name must not be empty".to_string(),
                }
            })?;
            Ok(TypeExpr::Named(TypeName::new(name)))
        }
        Value::Mapping(mapping) => {
            let mut entries = mapping.iter();
            let (constructor, body) = match (entries.next(), entries.next()) {
                (Some(entry), None) => entry,
                _ => {
                    return Err(SchemaError::InvalidTypeExpression {
                        context: context.to_string(),
                        reason: "expected exactly one constructor key".to_string(),
                    });
                }
            };
            match constructor.as_str() {
                Some("list") => Ok(TypeExpr::List(Box::new(parse_type_expr(
                    body,
                    &format!("{context}.list"),
                )?))),
                Some("tuple") => {
                    let elements = expect_sequence(body, &format!("{context}.tuple"))?;
                    let elements = elements
                        .iter()
                        .enumerate()
                        .map(|(i, element)| {
                            parse_type_expr(element, &format!("{context}.tuple[{i}]"))
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(TypeExpr::Tuple(elements))
                }
                Some("mapping") => parse_mapping_expr(body, context),
                Some("union") => {
                    let members = expect_sequence(body, &format!("{context}.union"))?;
                    let members = members
                        .iter()
                        .enumerate()
                        .map(|(i, member)| {
                            parse_type_expr(member, &format!("{context}.union[{i}]"))
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(TypeExpr::Union(members))
                }
                _ => Err(SchemaError::InvalidTypeExpression {
                    context: context.to_string(),
                    reason: format!("unknown constructor '{}'", render_key(constructor)),
                }),
            }
        }
        _ => Err(SchemaError::InvalidTypeExpression {
            context: context.to_string(),
            reason: "expected a type name or a constructor mapping".to_string(),
        }),
    }
}

fn parse_mapping_expr(body: &Value, context: &str) -> Result<TypeExpr, SchemaError> {
    match body {
        // enumerated form: property name -> type
        Value::Mapping(properties) => {
            let mut record = IndexMap::new();
            for (key, property_type) in properties {
                let name = name_key(key, &format!("{context}.mapping"))?;
                let expr =
                    parse_type_expr(property_type, &format!("{context}.mapping.{name}"))?;
                record.insert(PropertyName::new(name), expr);
            }
            Ok(TypeExpr::Record(record))
        }
        // key/value form: [key type, value type]
        Value::Sequence(pair) => match pair.as_slice() {
            [key, value] => Ok(TypeExpr::Map {
                key: Box::new(parse_type_expr(key, &format!("{context}.mapping[0]"))?),
                value: Box::new(parse_type_expr(value, &format!("{context}.mapping[1]"))?),
            }),
            _ => Err(SchemaError::InvalidTypeExpression {
                context: context.to_string(),
                reason: "key/value mapping form takes exactly two types".to_string(),
            }),
        },
        _ => Err(SchemaError::InvalidTypeExpression {
            context: context.to_string(),
            reason: "mapping constructor takes a property mapping or a [key, value] pair"
                .to_string(),
        }),
    }
}

// --- parameters section --------------------------------------------------

fn convert_parameters(
    section: Option<&Mapping>,
) -> Result<IndexMap<ParameterName, ParameterSpec>, SchemaError> {
    let mut parameters = IndexMap::new();
    let Some(section) = section else {
        return Ok(parameters);
    };

    for (key, declaration) in section {
        let name = name_key(key, "parameters")?;
        let spec = convert_parameter(declaration, &name)?;
        parameters.insert(ParameterName::new(name), spec);
    }
    Ok(parameters)
}

fn convert_parameter(value: &Value, name: &NonEmptyString) -> Result<ParameterSpec, SchemaError> {
    // the declared form is a mapping carrying only `type`/`default` keys;
    // anything else is a bare default
    if let Value::Mapping(mapping) = value {
        let declared_form = !mapping.is_empty()
            && mapping
                .keys()
                .all(|key| matches!(key.as_str(), Some("type") | Some("default")));
        if declared_form {
            let declared_type = mapping
                .get("type")
                .map(|expr| parse_type_expr(expr, &format!("parameters.{name}.type")))
                .transpose()?;
            let default = mapping.contains_key("default").then(|| {
                mapping
                    .get("default")
                    .cloned()
                    .unwrap_or(Value::Null)
            });
            return match (declared_type, default) {
                (Some(declared_type), default) => Ok(ParameterSpec::Declared {
                    declared_type,
                    default,
                }),
                (None, Some(default)) => Ok(ParameterSpec::Inferred { default }),
                (None, None) => Err(SchemaError::EmptyParameter {
                    name: name.to_string(),
                }),
            };
        }
    }
    Ok(ParameterSpec::Inferred {
        default: value.clone(),
    })
}

// --- tasks section -------------------------------------------------------

fn convert_tasks(section: &Mapping) -> Result<IndexMap<TaskName, TaskDefinition>, SchemaError> {
    let mut tasks = IndexMap::new();
    for (key, definition) in section {
        let name = name_key(key, "tasks")?;
        let definition = convert_task(definition, &name)?;
        tasks.insert(TaskName::new(name), definition);
    }
    Ok(tasks)
}

fn convert_task(value: &Value, task: &NonEmptyString) -> Result<TaskDefinition, SchemaError> {
    let context = format!("tasks.{task}");
    let Value::Mapping(body) = value else {
        return Err(SchemaError::UnexpectedShape {
            context,
            expected: "a mapping",
        });
    };

    for key in body.keys() {
        if !matches!(key.as_str(), Some("plugin") | Some("inputs") | Some("outputs")) {
            return Err(SchemaError::UnexpectedShape {
                context: format!("{context}.{}", render_key(key)),
                expected: "one of plugin, inputs, outputs",
            });
        }
    }

    let plugin_text = body
        .get("plugin")
        .and_then(Value::as_str)
        .ok_or_else(|| SchemaError::UnexpectedShape {
            context: format!("{context}.plugin"),
            expected: "a dotted path string",
        })?;
    let plugin = PluginPath::parse(plugin_text).map_err(|_| SchemaError::InvalidPluginPath {
        task: task.to_string(),
        path: plugin_text.to_string(),
    })?;

    let inputs = match body.get("inputs") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Sequence(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| convert_input(item, &format!("{context}.inputs[{i}]")))
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => {
            return Err(SchemaError::UnexpectedShape {
                context: format!("{context}.inputs"),
                expected: "a sequence of input declarations",
            });
        }
    };

    let outputs = match body.get("outputs") {
        None | Some(Value::Null) => OutputSpec::None,
        Some(value) => convert_outputs(value, &context)?,
    };

    Ok(TaskDefinition {
        plugin,
        inputs,
        outputs,
    })
}

fn convert_input(value: &Value, context: &str) -> Result<InputSpec, SchemaError> {
    let Value::Mapping(body) = value else {
        return Err(SchemaError::UnexpectedShape {
            context: context.to_string(),
            expected: "an input declaration mapping",
        });
    };

    // explicit form: {name: .., type: .., required: ..}
    if body.contains_key("name") {
        for key in body.keys() {
            if !matches!(key.as_str(), Some("name") | Some("type") | Some("required")) {
                return Err(SchemaError::UnexpectedShape {
                    context: format!("{context}.{}", render_key(key)),
                    expected: "one of name, type, required",
                });
            }
        }
        let name = body
            .get("name")
            .and_then(Value::as_str)
            .and_then(|s| NonEmptyString::parse(s.to_string()).ok())
            .ok_or_else(|| SchemaError::InvalidName {
                context: format!("{context}.name"),
            })?;
        let declared_type = parse_type_expr(
            body.get("type").ok_or_else(|| SchemaError::UnexpectedShape {
                context: format!("{context}.type"),
                expected: "a type expression",
            })?,
            &format!("{context}.type"),
        )?;
        let required = match body.get("required") {
            None => true,
            Some(Value::Bool(required)) => *required,
            Some(_) => {
                return Err(SchemaError::UnexpectedShape {
                    context: format!("{context}.required"),
                    expected: "a boolean",
                });
            }
        };
        return Ok(InputSpec {
            name: InputName::new(name),
            declared_type,
            required,
        });
    }

    // shorthand form: {name: TYPE}, required
    let (name, declared_type) = single_entry(body, context, "an input declaration")?;
    Ok(InputSpec {
        name: InputName::new(name),
        declared_type: parse_type_expr(declared_type, context)?,
        required: true,
    })
}

fn convert_outputs(value: &Value, context: &str) -> Result<OutputSpec, SchemaError> {
    match value {
        Value::Mapping(body) => {
            let (name, declared_type) = single_entry(
                body,
                &format!("{context}.outputs"),
                "a single output declaration",
            )?;
            Ok(OutputSpec::Single(OutputDecl {
                name: OutputName::new(name),
                declared_type: parse_type_expr(declared_type, &format!("{context}.outputs"))?,
            }))
        }
        Value::Sequence(items) => {
            let mut declarations = Vec::new();
            for (i, item) in items.iter().enumerate() {
                let item_context = format!("{context}.outputs[{i}]");
                let Value::Mapping(body) = item else {
                    return Err(SchemaError::UnexpectedShape {
                        context: item_context,
                        expected: "an output declaration mapping",
                    });
                };
                let (name, declared_type) =
                    single_entry(body, &item_context, "an output declaration")?;
                declarations.push(OutputDecl {
                    name: OutputName::new(name),
                    declared_type: parse_type_expr(declared_type, &item_context)?,
                });
            }
            Ok(OutputSpec::List(declarations))
        }
        _ => Err(SchemaError::UnexpectedShape {
            context: format!("{context}.outputs"),
            expected: "an output mapping or a sequence of output mappings",
        }),
    }
}

// --- graph section -------------------------------------------------------

fn convert_graph(section: &Mapping) -> Result<IndexMap<StepName, Step>, SchemaError> {
    let mut graph = IndexMap::new();
    for (key, body) in section {
        let name = name_key(key, "graph")?;
        let step = convert_step(body, &name)?;
        graph.insert(StepName::new(name), step);
    }
    Ok(graph)
}

fn convert_step(value: &Value, step: &NonEmptyString) -> Result<Step, SchemaError> {
    let Value::Mapping(body) = value else {
        return Err(SchemaError::InvalidStep {
            step: step.to_string(),
            reason: "a step must be a mapping".to_string(),
        });
    };

    // the presence of a `task` key selects the mixed form
    if body.contains_key("task") {
        return convert_mixed_step(body, step);
    }

    let mut task_entry = None;
    let mut dependencies = Vec::new();
    for (key, entry) in body {
        if key.as_str() == Some("dependencies") {
            dependencies = convert_dependencies(entry, step)?;
            continue;
        }
        if task_entry.replace((key, entry)).is_some() {
            return Err(SchemaError::InvalidStep {
                step: step.to_string(),
                reason: "a step must invoke exactly one task".to_string(),
            });
        }
    }

    let Some((task_key, arguments)) = task_entry else {
        return Err(SchemaError::InvalidStep {
            step: step.to_string(),
            reason: "a step must invoke a task".to_string(),
        });
    };
    let task = name_key(task_key, &format!("graph.{step}"))?;

    let invocation = match arguments {
        // keyword form: a mapping of argument values
        Value::Mapping(kwargs) => {
            Invocation::Keyword(convert_kwargs(kwargs, step)?)
        }
        // positional form: a sequence of argument values
        Value::Sequence(args) => Invocation::Positional(args.clone()),
        // positional form, single scalar argument
        Value::Null => Invocation::Positional(Vec::new()),
        scalar => Invocation::Positional(vec![scalar.clone()]),
    };

    Ok(Step {
        task: TaskName::new(task),
        invocation,
        dependencies,
    })
}

fn convert_mixed_step(body: &Mapping, step: &NonEmptyString) -> Result<Step, SchemaError> {
    for key in body.keys() {
        if !matches!(
            key.as_str(),
            Some("task") | Some("args") | Some("kwargs") | Some("dependencies")
        ) {
            return Err(SchemaError::InvalidStep {
                step: step.to_string(),
                reason: format!(
                    "unrecognized key '{}' in mixed-form step",
                    render_key(key)
                ),
            });
        }
    }

    let task = body
        .get("task")
        .and_then(Value::as_str)
        .and_then(|s| NonEmptyString::parse(s.to_string()).ok())
        .ok_or_else(|| SchemaError::InvalidStep {
            step: step.to_string(),
            reason: "task must be a non-empty string".to_string(),
        })?;

    let args = match body.get("args") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Sequence(args)) => args.clone(),
        // a lone scalar is a one-argument call, mirroring the positional form
        Some(scalar) => vec![scalar.clone()],
    };

    let kwargs = match body.get("kwargs") {
        None | Some(Value::Null) => IndexMap::new(),
        Some(Value::Mapping(kwargs)) => convert_kwargs(kwargs, step)?,
        Some(_) => {
            return Err(SchemaError::InvalidStep {
                step: step.to_string(),
                reason: "kwargs must be a mapping".to_string(),
            });
        }
    };

    let dependencies = match body.get("dependencies") {
        None => Vec::new(),
        Some(entry) => convert_dependencies(entry, step)?,
    };

    Ok(Step {
        task: TaskName::new(task),
        invocation: Invocation::Mixed { args, kwargs },
        dependencies,
    })
}

fn convert_kwargs(
    kwargs: &Mapping,
    step: &NonEmptyString,
) -> Result<IndexMap<InputName, Value>, SchemaError> {
    let mut converted = IndexMap::new();
    for (key, value) in kwargs {
        let name = name_key(key, &format!("graph.{step}"))?;
        converted.insert(InputName::new(name), value.clone());
    }
    Ok(converted)
}

fn convert_dependencies(
    value: &Value,
    step: &NonEmptyString,
) -> Result<Vec<StepName>, SchemaError> {
    let dependency = |entry: &Value| -> Result<StepName, SchemaError> {
        entry
            .as_str()
            .and_then(|s| NonEmptyString::parse(s.to_string()).ok())
            .map(StepName::new)
            .ok_or_else(|| SchemaError::InvalidStep {
                step: step.to_string(),
                reason: "dependencies must be step names".to_string(),
            })
    };

    match value {
        Value::Null => Ok(Vec::new()),
        // a single name normalizes to a singleton list
        Value::String(_) => Ok(vec![dependency(value)?]),
        Value::Sequence(entries) => entries.iter().map(dependency).collect(),
        _ => Err(SchemaError::InvalidStep {
            step: step.to_string(),
            reason: "dependencies must be a step name or a list of step names".to_string(),
        }),
    }
}

// --- shared helpers ------------------------------------------------------

fn name_key(key: &Value, context: &str) -> Result<NonEmptyString, SchemaError> {
    key.as_str()
        .and_then(|s| NonEmptyString::parse(s.to_string()).ok())
        .ok_or_else(|| SchemaError::InvalidName {
            context: format!("{context}.{}", render_key(key)),
        })
}

fn single_entry<'a>(
    body: &'a Mapping,
    context: &str,
    expected: &'static str,
) -> Result<(NonEmptyString, &'a Value), SchemaError> {
    let mut entries = body.iter();
    match (entries.next(), entries.next()) {
        (Some((key, value)), None) => Ok((name_key(key, context)?, value)),
        _ => Err(SchemaError::UnexpectedShape {
            context: context.to_string(),
            expected,
        }),
    }
}

fn expect_sequence<'a>(value: &'a Value, context: &str) -> Result<&'a Vec<Value>, SchemaError> {
    match value {
        Value::Sequence(elements) => Ok(elements),
        _ => Err(SchemaError::UnexpectedShape {
            context: context.to_string(),
            expected: "a sequence",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::parsing::parse_str;

    #[test]
    fn parses_the_three_invocation_forms() {
        let description = parse_str(
            r#"
tasks:
  hello:
    plugin: greetings.say.hello
    inputs: [{greeting: string}]
    outputs: {msg: string}
graph:
  pos: {hello: ["hi"]}
  kw: {hello: {greeting: "hi"}}
  mixed:
    task: hello
    args: ["hi"]
"#,
        )
        .unwrap();

        let step = |name: &str| {
            description
                .graph
                .iter()
                .find(|(n, _)| n.to_string() == name)
                .map(|(_, step)| step)
                .unwrap()
        };

        assert!(matches!(step("pos").invocation, Invocation::Positional(ref args) if args.len() == 1));
        assert!(matches!(step("kw").invocation, Invocation::Keyword(ref kwargs) if kwargs.len() == 1));
        assert!(matches!(step("mixed").invocation, Invocation::Mixed { ref args, .. } if args.len() == 1));
    }

    #[test]
    fn scalar_positional_argument_becomes_a_singleton() {
        let description = parse_str(
            r#"
tasks:
  hello: {plugin: say.hello, inputs: [{greeting: string}]}
graph:
  only: {hello: "hi"}
"#,
        )
        .unwrap();
        let (_, step) = description.graph.first().unwrap();
        assert!(matches!(step.invocation, Invocation::Positional(ref args) if args.len() == 1));
    }

    #[test]
    fn dependencies_normalize_to_a_list() {
        let description = parse_str(
            r#"
tasks:
  t: {plugin: m.f}
graph:
  a: {t: []}
  b: {t: [], dependencies: a}
  c: {t: [], dependencies: [a, b]}
"#,
        )
        .unwrap();
        let deps: Vec<usize> = description
            .graph
            .values()
            .map(|step| step.dependencies.len())
            .collect();
        assert_eq!(deps, vec![0, 1, 2]);
    }

    #[test]
    fn parameter_forms_are_told_apart() {
        let description = parse_str(
            r#"
parameters:
  rate: 0.5
  epochs: {type: integer, default: 10}
  seed: {type: integer}
  table: {columns: 3}
tasks:
  t: {plugin: m.f}
graph:
  s: {t: []}
"#,
        )
        .unwrap();

        let spec = |name: &str| {
            description
                .parameters
                .iter()
                .find(|(n, _)| n.to_string() == name)
                .map(|(_, spec)| spec)
                .unwrap()
        };

        assert!(matches!(spec("rate"), ParameterSpec::Inferred { .. }));
        assert!(matches!(
            spec("epochs"),
            ParameterSpec::Declared {
                default: Some(_),
                ..
            }
        ));
        assert!(matches!(
            spec("seed"),
            ParameterSpec::Declared { default: None, .. }
        ));
        // a mapping with unrecognized keys is a literal default
        assert!(matches!(spec("table"), ParameterSpec::Inferred { .. }));
    }

    #[test]
    fn rejects_parameter_with_neither_type_nor_default() {
        // `{type: ..}` missing and `default` missing can only happen with
        // the declared-form keys absent, which reads as a bare mapping
        // default; spell the broken form explicitly via a null type
        let error = parse_str(
            r#"
parameters:
  p: {type: ~}
tasks:
  t: {plugin: m.f}
graph:
  s: {t: []}
"#,
        )
        .unwrap_err();
        assert!(matches!(error, SchemaError::InvalidTypeExpression { .. }));
    }

    #[test]
    fn input_declarations_support_both_forms() {
        let description = parse_str(
            r#"
tasks:
  t:
    plugin: m.f
    inputs:
      - data: any
      - {name: shout, type: boolean, required: false}
graph:
  s: {t: []}
"#,
        )
        .unwrap();
        let task = description.tasks.first().unwrap().1;
        assert_eq!(task.inputs.len(), 2);
        assert!(task.inputs[0].required);
        assert_eq!(task.inputs[1].name.to_string(), "shout");
        assert!(!task.inputs[1].required);
    }

    #[test]
    fn output_forms_map_to_single_and_list() {
        let description = parse_str(
            r#"
tasks:
  one: {plugin: m.f, outputs: {value: number}}
  two: {plugin: m.g, outputs: [{left: number}, {right: number}]}
  none: {plugin: m.h}
graph:
  s: {one: []}
"#,
        )
        .unwrap();
        let outputs: Vec<&OutputSpec> = description
            .tasks
            .values()
            .map(|task| &task.outputs)
            .collect();
        assert!(matches!(outputs[0], OutputSpec::Single(_)));
        assert!(matches!(outputs[1], OutputSpec::List(decls) if decls.len() == 2));
        assert!(matches!(outputs[2], OutputSpec::None));
    }

    #[test]
    fn rejects_multi_entry_output_mapping() {
        let error = parse_str(
            r#"
tasks:
  t: {plugin: m.f, outputs: {a: integer, b: integer}}
graph:
  s: {t: []}
"#,
        )
        .unwrap_err();
        assert!(matches!(error, SchemaError::UnexpectedShape { .. }));
    }

    #[test]
    fn rejects_step_invoking_two_tasks() {
        let error = parse_str(
            r#"
tasks:
  t: {plugin: m.f}
  u: {plugin: m.g}
graph:
  s: {t: [], u: []}
"#,
        )
        .unwrap_err();
        assert!(matches!(error, SchemaError::InvalidStep { .. }));
    }

    #[test]
    fn rejects_malformed_plugin_paths() {
        let error = parse_str(
            r#"
tasks:
  t: {plugin: "not a path"}
graph:
  s: {t: []}
"#,
        )
        .unwrap_err();
        assert!(matches!(error, SchemaError::InvalidPluginPath { .. }));
    }

    #[test]
    fn type_expressions_cover_all_constructors() {
        let description = parse_str(
            r#"
types:
  temperature: ~
  celsius: {is_a: temperature}
  names: {list: string}
  pair: {tuple: [string, integer]}
  point: {mapping: {x: number, y: number}}
  counts: {mapping: [string, integer]}
  scalar: {union: [integer, number]}
tasks:
  t: {plugin: m.f}
graph:
  s: {t: []}
"#,
        )
        .unwrap();
        assert_eq!(description.types.len(), 7);
        let definition = |name: &str| {
            description
                .types
                .iter()
                .find(|(n, _)| n.to_string() == name)
                .map(|(_, d)| d)
                .unwrap()
        };
        assert!(matches!(
            definition("temperature"),
            TypeDefinition::Simple { is_a: None }
        ));
        assert!(matches!(
            definition("celsius"),
            TypeDefinition::Simple { is_a: Some(_) }
        ));
        assert!(matches!(
            definition("counts"),
            TypeDefinition::Structural(TypeExpr::Map { .. })
        ));
        assert!(matches!(
            definition("point"),
            TypeDefinition::Structural(TypeExpr::Record(_))
        ));
    }
}
