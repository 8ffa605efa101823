// Copyright (c) 2025 John Wilger
// SPDX-License-Identifier: MIT

//! The core concepts of a declarative experiment.
//!
//! An experiment description declares a small universe of named types, a
//! set of global parameters, a catalog of tasks (plugins with typed inputs
//! and outputs), and a graph of steps that invoke those tasks with
//! concrete arguments. This module contains the building blocks that make
//! up a description:
//!
//! - **Parameters**: Named global values supplied alongside the description
//! - **Tasks**: Declared plugins with typed inputs and outputs
//! - **Steps**: Concrete task invocations wired together in a graph
//! - **References**: `$`-prefixed expressions binding arguments to
//!   parameters or step outputs

pub mod description;
pub mod reference;

pub use description::{
    ExperimentDescription, InputName, InputSpec, Invocation, OutputDecl, OutputName, OutputSpec,
    ParameterName, ParameterSpec, PluginPath, PropertyName, Step, StepName, TaskDefinition,
    TaskName, TypeDefinition, TypeName, Value,
};
pub use reference::{Reference, ReferenceError, ReferenceTarget, TextToken};
