// Copyright (c) 2025 John Wilger
// SPDX-License-Identifier: MIT

//! Experiment Engine - A type-safe declarative experiment engine.
//!
//! This crate validates declarative experiment descriptions (YAML/JSON
//! documents declaring types, parameters, tasks, and a step graph) and
//! executes the graph of task invocations in dependency order, threading
//! values between steps.
//!
//! The pipeline: a description is parsed against a structural schema
//! ([`infrastructure::parsing`]), checked by the static analyzer
//! ([`analysis`]) against the per-description type universe ([`typing`])
//! and the reference grammar ([`experiment::reference`]), and — only
//! with zero errors — executed ([`execution`]) one step at a time.

#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![deny(rustdoc::broken_intra_doc_links)]

/// Static analysis: the issue list gating execution.
pub mod analysis;

/// Command-line interface.
pub mod cli;

/// The graph executor and plugin loading.
pub mod execution;

/// Experiment description domain types and references.
pub mod experiment;

/// Infrastructure and utility types.
pub mod infrastructure;

/// The type system: universe, inference, compatibility.
pub mod typing;

pub use analysis::{validate, validate_source, validate_value, Issue, Severity};
pub use execution::{
    Executor, NoopTracker, PluginArgs, PluginError, PluginLoader, PluginRegistry,
    ProcessPluginLoader, RunError, RunReport, RunTracker, StepOutcome, StepStatus, TaskPlugin,
};
pub use experiment::description::{ExperimentDescription, Value};
pub use infrastructure::parsing::{parse_json_str, parse_str, parse_value, SchemaError};
