// Copyright (c) 2025 John Wilger
// SPDX-License-Identifier: MIT

//! The combined step dependency graph.
//!
//! Two edge sets overlay the graph section: the explicit `dependencies`
//! lists, and the data edges implied by references (a step whose
//! arguments mention `$other…` depends on `other`). Both are merged into
//! one graph, and a single topological sort serves the static analyzer's
//! cycle check and the executor's linearization.
//!
//! Ordering is deterministic: among steps whose dependencies are all
//! satisfied, the one appearing first in the description runs first.

use crate::experiment::description::{ExperimentDescription, Step, StepName};
use crate::experiment::reference::{self, ReferenceTarget};
use indexmap::{IndexMap, IndexSet};
use thiserror::Error;

/// Graph-level errors: unknown names and cycles.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// A step invokes a task that is not declared.
    #[error("step '{step}' invokes unknown task '{task}'")]
    UnknownTask {
        /// The invoking step.
        step: String,
        /// The unresolved task short name.
        task: String,
    },

    /// An explicit dependency names a step that does not exist.
    #[error("step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency {
        /// The declaring step.
        step: String,
        /// The missing dependency name.
        dependency: String,
    },

    /// The combined dependency graph contains a cycle.
    #[error("dependency cycle among steps: {}", steps.join(", "))]
    Cycle {
        /// The steps that could not be ordered.
        steps: Vec<String>,
    },
}

/// The data dependencies of a step: every distinct step whose output its
/// argument tree references, in appearance order.
pub fn data_dependencies(step: &Step, description: &ExperimentDescription) -> Vec<StepName> {
    let mut references = Vec::new();
    for value in step.invocation.argument_values() {
        reference::collect(value, &mut references);
    }

    let mut dependencies = IndexSet::new();
    for reference in references {
        if let Ok(ReferenceTarget::StepOutput { step: producer, .. }) =
            reference.resolve(description)
        {
            dependencies.insert(producer);
        }
    }
    dependencies.into_iter().collect()
}

/// The merged dependency sets of every step: explicit `dependencies`
/// entries first, then data edges, de-duplicated, in appearance order.
/// Names that do not resolve to a step are dropped here; the analyzer
/// reports them separately.
pub fn combined_dependencies(
    description: &ExperimentDescription,
) -> IndexMap<StepName, Vec<StepName>> {
    let mut combined = IndexMap::new();
    for (name, step) in &description.graph {
        let mut dependencies = IndexSet::new();
        for dependency in &step.dependencies {
            if description.graph.contains_key(dependency) {
                dependencies.insert(dependency.clone());
            }
        }
        for dependency in data_dependencies(step, description) {
            dependencies.insert(dependency);
        }
        combined.insert(name.clone(), dependencies.into_iter().collect());
    }
    combined
}

/// Computes the deterministic topological order of the combined graph.
///
/// # Errors
///
/// Returns [`GraphError::Cycle`] listing the steps that could not be
/// ordered.
pub fn topological_order(
    description: &ExperimentDescription,
) -> Result<Vec<StepName>, GraphError> {
    let dependencies = combined_dependencies(description);
    let mut ordered: Vec<StepName> = Vec::with_capacity(dependencies.len());
    let mut done: IndexSet<StepName> = IndexSet::new();

    while done.len() < dependencies.len() {
        // first-appearance tie-break: scan in description order and take
        // the first step whose dependencies are all satisfied
        let next = dependencies.iter().find(|(name, deps)| {
            !done.contains(*name) && deps.iter().all(|dep| done.contains(dep))
        });
        match next {
            Some((name, _)) => {
                done.insert(name.clone());
                ordered.push(name.clone());
            }
            None => {
                let remaining = dependencies
                    .keys()
                    .filter(|name| !done.contains(*name))
                    .map(ToString::to_string)
                    .collect();
                return Err(GraphError::Cycle { steps: remaining });
            }
        }
    }
    Ok(ordered)
}
