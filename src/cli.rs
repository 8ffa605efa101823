//! Command-line interface types for the experiment engine.
//!
//! This module defines the structure of CLI commands and options using
//! type-safe constructs. All path validation happens at parse time,
//! ensuring that the rest of the application works with valid paths.
//!
//! The CLI is a thin reference wrapper over the library: `validate`
//! reports the issue list, `run` validates and then executes against a
//! plugins directory. Exit codes are 0 for success, non-zero for any
//! error.

use crate::analysis;
use crate::execution::{Executor, LogTracker, ProcessPluginLoader, StepStatus};
use crate::experiment::description::Value;
use crate::infrastructure::parsing;
use crate::infrastructure::types::{
    AnyFile, Directory, Exists, ExperimentFile, File, ParamsFile, PathBuilder, TypedPath,
};
use indexmap::IndexMap;
use std::env;
use std::fs;
use std::path::PathBuf;

/// The main CLI structure containing the command to execute.
#[derive(Debug, Clone)]
pub struct Cli {
    /// The command to execute.
    pub command: Command,
}

/// Available commands for the experiment engine CLI.
#[derive(Debug, Clone)]
pub enum Command {
    /// Validate an experiment description without executing it.
    Validate(ValidateCommand),
    /// Validate and execute an experiment description.
    Run(RunCommand),
}

/// Command to validate an experiment description file.
#[derive(Debug, Clone)]
pub struct ValidateCommand {
    /// The description file to validate (must exist, YAML or JSON).
    pub input: TypedPath<ExperimentFile, File, Exists>,
}

/// Command to execute an experiment description.
#[derive(Debug, Clone)]
pub struct RunCommand {
    /// The description file to execute (must exist, YAML or JSON).
    pub input: TypedPath<ExperimentFile, File, Exists>,
    /// The plugins directory searched by the plugin loader.
    pub plugins: TypedPath<AnyFile, Directory, Exists>,
    /// Optional parameter binding file.
    pub params: Option<TypedPath<ParamsFile, File, Exists>>,
    /// Optional job identifier exposed to plugins; defaults to the
    /// `EXPERIMENT_ENGINE_JOB_ID` environment variable, then the process
    /// id.
    pub job_id: Option<String>,
}

/// Result type for CLI operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during CLI parsing or execution.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid command line arguments.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Failed to parse a path.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The parameter binding file did not hold a mapping.
    #[error("Params file must hold a mapping of parameter names to values: {0}")]
    InvalidParams(String),

    /// The description did not validate.
    #[error("Validation failed with {errors} error(s)")]
    ValidationFailed {
        /// How many errors the analyzer reported.
        errors: usize,
    },

    /// The experiment run failed.
    #[error("Run failed: {0}")]
    RunFailed(String),
}

const USAGE: &str = "Usage: experiment_engine validate <experiment.(yml|yaml|json)>\n       experiment_engine run <experiment.(yml|yaml|json)> <plugins-dir> [--params <file>] [--job-id <id>]";

impl Cli {
    /// Parse command line arguments into a CLI structure.
    pub fn from_args() -> Result<Self> {
        let args: Vec<String> = env::args().collect();
        Self::from_arg_list(&args[1..])
    }

    fn from_arg_list(args: &[String]) -> Result<Self> {
        let Some(command) = args.first() else {
            return Err(Error::InvalidArguments(USAGE.to_string()));
        };

        match command.as_str() {
            "validate" => {
                let [input] = &args[1..] else {
                    return Err(Error::InvalidArguments(USAGE.to_string()));
                };
                Ok(Cli {
                    command: Command::Validate(ValidateCommand {
                        input: experiment_file(input)?,
                    }),
                })
            }
            "run" => {
                let rest = &args[1..];
                if rest.len() < 2 {
                    return Err(Error::InvalidArguments(USAGE.to_string()));
                }
                let input = experiment_file(&rest[0])?;
                let plugins =
                    PathBuilder::parse_directory(PathBuf::from(&rest[1])).map_err(|error| {
                        Error::InvalidPath(format!("{}: {error}", rest[1]))
                    })?;

                let mut params = None;
                let mut job_id = None;
                let mut i = 2;
                while i < rest.len() {
                    match rest[i].as_str() {
                        "--params" if i + 1 < rest.len() => {
                            let path = PathBuf::from(&rest[i + 1]);
                            params = Some(PathBuilder::parse_params_file(path).map_err(
                                |error| Error::InvalidPath(format!("{}: {error}", rest[i + 1])),
                            )?);
                            i += 2;
                        }
                        "--job-id" if i + 1 < rest.len() => {
                            job_id = Some(rest[i + 1].clone());
                            i += 2;
                        }
                        other => {
                            return Err(Error::InvalidArguments(format!(
                                "unrecognized argument '{other}'\n{USAGE}"
                            )));
                        }
                    }
                }

                Ok(Cli {
                    command: Command::Run(RunCommand {
                        input,
                        plugins,
                        params,
                        job_id,
                    }),
                })
            }
            other => Err(Error::InvalidArguments(format!(
                "unknown command '{other}'\n{USAGE}"
            ))),
        }
    }

    /// Executes the parsed command.
    pub fn execute(&self) -> Result<()> {
        match &self.command {
            Command::Validate(command) => validate(command),
            Command::Run(command) => run(command),
        }
    }
}

fn experiment_file(raw: &str) -> Result<TypedPath<ExperimentFile, File, Exists>> {
    PathBuilder::parse_experiment_file(PathBuf::from(raw))
        .map_err(|error| Error::InvalidPath(format!("{raw}: {error}")))
}

/// Validates the description and reports the issue list. Errors in the
/// list make the command fail.
fn validate(command: &ValidateCommand) -> Result<()> {
    let text = fs::read_to_string(command.input.as_path_buf())?;
    let issues = analysis::validate_source(&text);

    for issue in &issues {
        eprintln!("{issue}");
    }

    let errors = issues.iter().filter(|issue| issue.is_error()).count();
    if errors > 0 {
        return Err(Error::ValidationFailed { errors });
    }
    println!(
        "{} is valid ({} warning(s))",
        command.input.as_path_buf().display(),
        issues.len() - errors
    );
    Ok(())
}

/// Validates, then executes against the plugins directory.
fn run(command: &RunCommand) -> Result<()> {
    let text = fs::read_to_string(command.input.as_path_buf())?;
    let issues = analysis::validate_source(&text);
    for issue in &issues {
        eprintln!("{issue}");
    }
    let errors = issues.iter().filter(|issue| issue.is_error()).count();
    if errors > 0 {
        return Err(Error::ValidationFailed { errors });
    }

    // the issue list is empty of errors, so this parse cannot fail
    let description =
        parsing::parse_str(&text).map_err(|error| Error::RunFailed(error.to_string()))?;

    let external = match &command.params {
        None => IndexMap::new(),
        Some(path) => {
            let text = fs::read_to_string(path.as_path_buf())?;
            serde_yaml::from_str::<IndexMap<String, Value>>(&text)
                .map_err(|error| Error::InvalidParams(error.to_string()))?
        }
    };

    let job_id = command
        .job_id
        .clone()
        .or_else(|| env::var("EXPERIMENT_ENGINE_JOB_ID").ok())
        .unwrap_or_else(|| format!("job-{}", std::process::id()));
    let loader = ProcessPluginLoader::new(command.plugins.as_path_buf(), job_id);

    let executor = Executor::new(&description, &loader);
    let report = executor.run(&external, &mut LogTracker);

    for outcome in &report.steps {
        match &outcome.status {
            StepStatus::Succeeded { outputs } => {
                println!("{}: ok ({} output(s))", outcome.step, outputs.len());
            }
            StepStatus::Failed { error } => {
                println!("{}: failed: {error}", outcome.step);
            }
        }
    }

    match report.failure {
        None => Ok(()),
        Some(error) => Err(Error::RunFailed(error.to_string())),
    }
}
