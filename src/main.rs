// Copyright (c) 2025 John Wilger
// SPDX-License-Identifier: MIT

//! Experiment Engine - A type-safe declarative experiment engine.
//!
//! The binary is a thin wrapper over the library: it initializes
//! structured logging, parses the CLI, and maps the outcome to an exit
//! code (0 on success, 1 on any error).

use experiment_engine::cli::{Cli, Error};
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Error> {
    let cli = Cli::from_args()?;
    cli.execute()
}
