//! End-to-end scenarios: validate and execute complete descriptions
//! through the public API, with plugins supplied by an in-memory
//! registry.

use experiment_engine::analysis::{AnalysisError, GraphError};
use experiment_engine::experiment::reference::ReferenceError;
use experiment_engine::{
    parse_str, validate, validate_source, Executor, NoopTracker, PluginArgs, PluginRegistry,
    RunReport, StepStatus, Value,
};
use indexmap::IndexMap;

fn run_with(
    yaml: &str,
    external: &[(&str, Value)],
    registry: &PluginRegistry,
) -> RunReport {
    let description = parse_str(yaml).expect("description should parse");
    let issues = validate(&description);
    assert!(
        issues.iter().all(|issue| !issue.is_error()),
        "expected a valid description, got: {issues:?}"
    );

    let external: IndexMap<String, Value> = external
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect();
    Executor::new(&description, registry).run(&external, &mut NoopTracker)
}

fn sole_output(report: &RunReport, step: usize) -> Value {
    match &report.steps[step].status {
        StepStatus::Succeeded { outputs } => {
            assert_eq!(outputs.len(), 1);
            outputs.values().next().cloned().unwrap()
        }
        StepStatus::Failed { error } => panic!("step failed: {error}"),
    }
}

#[test]
fn hello_step() {
    let mut registry = PluginRegistry::new();
    registry.register("say.hello", |args: PluginArgs| {
        let greeting = args
            .kwargs
            .get("greeting")
            .and_then(Value::as_str)
            .unwrap_or_default();
        Ok(Value::String(format!("plugin({greeting})")))
    });

    let report = run_with(
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
    assert_eq!(sole_output(&report, 0), Value::from("plugin(hi)"));
}

#[test]
fn chained_outputs() {
    let mut registry = PluginRegistry::new();
    registry.register("numbers.produce", |_: PluginArgs| Ok(Value::from(1.25)));
    registry.register("numbers.scale", |args: PluginArgs| {
        Ok(Value::from(args.args[0].as_f64().unwrap_or_default() * 4.0))
    });

    let report = run_with(
        r#"
tasks:
  t1: {plugin: numbers.produce, outputs: {value: number}}
  t2: {plugin: numbers.scale, inputs: [{in: number}], outputs: {value: number}}
graph:
  step1: {t1: []}
  step2: {t2: [$step1]}
"#,
        &[],
        &registry,
    );

    let order: Vec<String> = report.steps.iter().map(|s| s.step.to_string()).collect();
    assert_eq!(order, vec!["step1", "step2"]);
    assert_eq!(sole_output(&report, 1), Value::from(5.0));
}

#[test]
fn type_error_blocks_execution() {
    let issues = validate_source(
        r#"
tasks:
  t: {plugin: m.f, inputs: [{n: integer}]}
graph:
  s: {t: ["5"]}
"#,
    );

    let errors: Vec<_> = issues.iter().filter(|issue| issue.is_error()).collect();
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        errors[0].error,
        AnalysisError::Compatibility { .. }
    ));
    // execution is gated on an error-free issue list, so the executor
    // never runs for this description
}

#[test]
fn reference_cycle_is_a_graph_error() {
    let issues = validate_source(
        r#"
tasks:
  t:
    plugin: m.f
    inputs: [{x: any}]
    outputs: [{x: any}, {y: any}]
graph:
  a: {t: [$b.x]}
  b: {t: [$a.y]}
"#,
    );

    assert!(!issues.is_empty());
    assert!(issues
        .iter()
        .any(|issue| matches!(issue.error, AnalysisError::Graph(GraphError::Cycle { .. }))));
}

#[test]
fn parameter_default_override() {
    let mut registry = PluginRegistry::new();
    registry.register("echo.value", |args: PluginArgs| Ok(args.args[0].clone()));

    let yaml = r#"
parameters:
  p: 1
tasks:
  echo: {plugin: echo.value, inputs: [{x: any}], outputs: {out: any}}
graph:
  s: {echo: [$p]}
"#;

    let defaulted = run_with(yaml, &[], &registry);
    assert_eq!(sole_output(&defaulted, 0), Value::from(1));

    let overridden = run_with(yaml, &[("p", Value::from(42))], &registry);
    assert_eq!(sole_output(&overridden, 0), Value::from(42));
}

#[test]
fn mixed_invocation_with_list_unpacking() {
    let mut registry = PluginRegistry::new();
    registry.register("triple.make", |_: PluginArgs| {
        Ok(Value::Sequence(vec![
            Value::from(1),
            Value::from(2),
            Value::from(3),
        ]))
    });

    let report = run_with(
        r#"
tasks:
  t:
    plugin: triple.make
    outputs: [{a: integer}, {b: integer}]
graph:
  s:
    task: t
"#,
        &[],
        &registry,
    );

    assert!(report.succeeded());
    match &report.steps[0].status {
        StepStatus::Succeeded { outputs } => {
            let bound: Vec<(String, Value)> = outputs
                .iter()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect();
            // the third returned value is discarded
            assert_eq!(
                bound,
                vec![
                    ("a".to_string(), Value::from(1)),
                    ("b".to_string(), Value::from(2)),
                ]
            );
        }
        other => panic!("expected success, got {other:?}"),
    }

    // a reference to a third output would have failed validation
    let issues = validate_source(
        r#"
tasks:
  t: {plugin: triple.make, outputs: [{a: integer}, {b: integer}]}
  u: {plugin: consume.c, inputs: [{x: integer}]}
graph:
  s: {t: []}
  late: {u: [$s.c]}
"#,
    );
    assert!(issues.iter().any(|issue| matches!(
        issue.error,
        AnalysisError::Reference {
            error: ReferenceError::UnknownOutput { .. },
            ..
        }
    )));
}

#[test]
fn deterministic_order_for_independent_steps() {
    let mut registry = PluginRegistry::new();
    registry.register("noop.run", |_: PluginArgs| Ok(Value::Null));
    registry.register("numbers.produce", |_: PluginArgs| Ok(Value::from(0)));
    registry.register("consume.any", |args: PluginArgs| Ok(args.args[0].clone()));

    // `late` appears first but depends on `source`; the independent
    // steps keep their first-appearance order around it
    let report = run_with(
        r#"
tasks:
  noop: {plugin: noop.run}
  produce: {plugin: numbers.produce, outputs: {v: integer}}
  consume: {plugin: consume.any, inputs: [{x: integer}]}
graph:
  late: {consume: [$source]}
  first_noop: {noop: []}
  source: {produce: []}
  second_noop: {noop: []}
"#,
        &[],
        &registry,
    );

    let order: Vec<String> = report.steps.iter().map(|s| s.step.to_string()).collect();
    assert_eq!(order, vec!["first_noop", "source", "late", "second_noop"]);
}

#[test]
fn valid_descriptions_produce_an_empty_issue_list() {
    let issues = validate_source(
        r#"
types:
  sample: {mapping: {id: integer, label: string}}
parameters:
  limit: {type: integer, default: 100}
tasks:
  load:
    plugin: data.load
    inputs: [{limit: integer}]
    outputs: {rows: {list: sample}}
  count:
    plugin: data.count
    inputs: [{rows: {list: sample}}]
    outputs: {n: integer}
graph:
  fetch: {load: {limit: $limit}}
  tally: {count: [$fetch]}
"#,
    );
    assert_eq!(issues, Vec::new());
}

#[test]
fn semantic_problems_always_surface_as_issues() {
    // one description, several independent mistakes; each must appear
    let issues = validate_source(
        r#"
parameters:
  epochs: {type: integer, default: "ten"}
tasks:
  t: {plugin: lonely, inputs: [{n: integer}]}
graph:
  s: {t: [1, 2]}
  u: {ghost: []}
"#,
    );

    let errors: Vec<_> = issues.iter().filter(|issue| issue.is_error()).collect();
    assert!(errors.len() >= 4);
    assert!(errors
        .iter()
        .any(|i| matches!(i.error, AnalysisError::Compatibility { .. })));
    assert!(errors
        .iter()
        .any(|i| matches!(i.error, AnalysisError::Schema(_))));
    assert!(errors
        .iter()
        .any(|i| matches!(i.error, AnalysisError::Arity(_))));
    assert!(errors
        .iter()
        .any(|i| matches!(i.error, AnalysisError::Graph(_))));
}
