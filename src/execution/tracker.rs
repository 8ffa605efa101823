// Copyright (c) 2025 John Wilger
// SPDX-License-Identifier: MIT

//! Experiment tracker integration.
//!
//! A thin seam for recording runs in an external tracker: the description
//! and parameter binding at run start, and the final outcome. The engine
//! calls these hooks and nothing else; wiring them to a real tracking
//! service is the embedder's concern.

use super::RunError;
use crate::experiment::description::{ExperimentDescription, ParameterName, Value};
use indexmap::IndexMap;

/// Callbacks fired around a run.
pub trait RunTracker {
    /// The run is about to execute its first step. `parameters` is the
    /// completed binding, defaults already applied.
    fn run_started(
        &mut self,
        description: &ExperimentDescription,
        parameters: &IndexMap<ParameterName, Value>,
    ) {
        let _ = (description, parameters);
    }

    /// Every step finished successfully.
    fn run_finished(&mut self) {}

    /// The run stopped on a fatal error.
    fn run_failed(&mut self, error: &RunError) {
        let _ = error;
    }
}

/// Discards all tracking callbacks. The default.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracker;

impl RunTracker for NoopTracker {}

/// Writes tracking callbacks to structured logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTracker;

impl RunTracker for LogTracker {
    fn run_started(
        &mut self,
        description: &ExperimentDescription,
        parameters: &IndexMap<ParameterName, Value>,
    ) {
        tracing::info!(
            steps = description.graph.len(),
            tasks = description.tasks.len(),
            parameters = parameters.len(),
            "experiment run started"
        );
        if !parameters.is_empty() {
            tracing::debug!(binding = %render_parameters(parameters), "parameter binding");
        }
    }

    fn run_finished(&mut self) {
        tracing::info!("experiment run finished");
    }

    fn run_failed(&mut self, error: &RunError) {
        tracing::error!(error = %error, "experiment run failed");
    }
}

fn render_parameters(parameters: &IndexMap<ParameterName, Value>) -> String {
    let mut mapping = serde_yaml::Mapping::new();
    for (name, value) in parameters {
        mapping.insert(Value::String(name.to_string()), value.clone());
    }
    serde_yaml::to_string(&mapping).unwrap_or_else(|_| "<unprintable>".to_string())
}
