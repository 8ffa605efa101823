// Copyright (c) 2025 John Wilger
// SPDX-License-Identifier: MIT

//! Plugin loading and invocation.
//!
//! The engine's only contract with plugins is the [`PluginLoader`] trait:
//! given a dotted path, yield something invokable with positional and
//! keyword arguments. Two implementations ship:
//!
//! - [`PluginRegistry`] registers closures under dotted paths in memory;
//!   this is the embedding and testing mechanism.
//! - [`ProcessPluginLoader`] resolves the path prefix to an executable
//!   under a plugins directory and speaks a small JSON protocol with it
//!   over stdin/stdout. This backs the CLI's `--plugins` argument.

use crate::experiment::description::{PluginPath, Value};
use indexmap::IndexMap;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;
use thiserror::Error;

/// The argument bundle handed to a plugin invocation.
#[derive(Debug, Clone, Default)]
pub struct PluginArgs {
    /// Positional arguments, in order.
    pub args: Vec<Value>,
    /// Keyword arguments, in appearance order.
    pub kwargs: IndexMap<String, Value>,
}

/// Errors raised while loading or invoking plugins.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The loader has nothing registered or installed under the path.
    #[error("no plugin found for '{path}'")]
    NotFound {
        /// The dotted path that failed to resolve.
        path: String,
    },

    /// Spawning or talking to a plugin process failed.
    #[error("plugin '{path}' could not be invoked: {source}")]
    Io {
        /// The dotted path of the plugin.
        path: String,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The plugin produced output the engine could not understand.
    #[error("plugin '{path}' protocol violation: {message}")]
    Protocol {
        /// The dotted path of the plugin.
        path: String,
        /// What was wrong with the exchange.
        message: String,
    },

    /// The plugin itself reported a failure.
    #[error("plugin raised: {message}")]
    Failed {
        /// The failure text the plugin produced.
        message: String,
    },
}

/// An invokable task plugin.
pub trait TaskPlugin {
    /// Invokes the plugin with the given arguments, producing a return
    /// value in the same universe as the arguments.
    fn call(&self, args: PluginArgs) -> Result<Value, PluginError>;
}

impl<F> TaskPlugin for F
where
    F: Fn(PluginArgs) -> Result<Value, PluginError>,
{
    fn call(&self, args: PluginArgs) -> Result<Value, PluginError> {
        self(args)
    }
}

/// Resolves dotted paths to invokable plugins.
pub trait PluginLoader {
    /// Resolves a dotted plugin path.
    fn load(&self, path: &PluginPath) -> Result<Arc<dyn TaskPlugin>, PluginError>;
}

/// An in-memory plugin table keyed by dotted path.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: IndexMap<String, Arc<dyn TaskPlugin>>,
}

impl PluginRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a plugin function under a dotted path, replacing any
    /// previous registration.
    pub fn register<F>(&mut self, path: &str, plugin: F)
    where
        F: Fn(PluginArgs) -> Result<Value, PluginError> + 'static,
    {
        self.plugins.insert(path.to_string(), Arc::new(plugin));
    }
}

impl PluginLoader for PluginRegistry {
    fn load(&self, path: &PluginPath) -> Result<Arc<dyn TaskPlugin>, PluginError> {
        self.plugins
            .get(&path.to_string())
            .cloned()
            .ok_or_else(|| PluginError::NotFound {
                path: path.to_string(),
            })
    }
}

/// Loads plugins as executables under a plugins directory.
///
/// The module segments of the dotted path name a file relative to the
/// directory: `greetings.say.hello` resolves to
/// `<directory>/greetings/say`, invoked with the function name `hello`
/// in the payload. The child process receives the job identifier in
/// `EXPERIMENT_ENGINE_JOB_ID` and the plugins directory prepended to its
/// `PATH`.
pub struct ProcessPluginLoader {
    directory: PathBuf,
    job_id: String,
}

impl ProcessPluginLoader {
    /// Creates a loader over a plugins directory.
    pub fn new(directory: impl Into<PathBuf>, job_id: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            job_id: job_id.into(),
        }
    }
}

impl PluginLoader for ProcessPluginLoader {
    fn load(&self, path: &PluginPath) -> Result<Arc<dyn TaskPlugin>, PluginError> {
        let mut executable = self.directory.clone();
        for segment in path.module_segments() {
            executable.push(segment);
        }
        if path.segment_count() < 2 || !executable.is_file() {
            return Err(PluginError::NotFound {
                path: path.to_string(),
            });
        }
        Ok(Arc::new(ProcessPlugin {
            executable,
            directory: self.directory.clone(),
            job_id: self.job_id.clone(),
            path: path.to_string(),
            function: path.function().to_string(),
        }))
    }
}

/// One resolved plugin process invocation target.
struct ProcessPlugin {
    executable: PathBuf,
    directory: PathBuf,
    job_id: String,
    path: String,
    function: String,
}

#[derive(Serialize)]
struct WirePayload<'a> {
    function: &'a str,
    args: &'a [Value],
    kwargs: &'a IndexMap<String, Value>,
}

impl TaskPlugin for ProcessPlugin {
    fn call(&self, args: PluginArgs) -> Result<Value, PluginError> {
        let payload = serde_json::to_vec(&WirePayload {
            function: &self.function,
            args: &args.args,
            kwargs: &args.kwargs,
        })
        .map_err(|error| PluginError::Protocol {
            path: self.path.clone(),
            message: format!("arguments are not representable as JSON: {error}"),
        })?;

        let mut child = Command::new(&self.executable)
            .env("EXPERIMENT_ENGINE_JOB_ID", &self.job_id)
            .env("PATH", self.search_path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| PluginError::Io {
                path: self.path.clone(),
                source,
            })?;

        if let Some(stdin) = child.stdin.as_mut() {
            stdin.write_all(&payload).map_err(|source| PluginError::Io {
                path: self.path.clone(),
                source,
            })?;
        }

        let output = child
            .wait_with_output()
            .map_err(|source| PluginError::Io {
                path: self.path.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PluginError::Failed {
                message: stderr.trim().to_string(),
            });
        }

        let returned: serde_json::Value =
            serde_json::from_slice(&output.stdout).map_err(|error| PluginError::Protocol {
                path: self.path.clone(),
                message: format!("return value is not valid JSON: {error}"),
            })?;
        serde_yaml::to_value(&returned).map_err(|error| PluginError::Protocol {
            path: self.path.clone(),
            message: format!("return value could not be converted: {error}"),
        })
    }
}

impl ProcessPlugin {
    /// The child's `PATH`: the plugins directory first, then the
    /// inherited search path.
    fn search_path(&self) -> std::ffi::OsString {
        let inherited = std::env::var_os("PATH").unwrap_or_default();
        let mut entries = vec![self.directory.clone()];
        entries.extend(std::env::split_paths(&inherited));
        std::env::join_paths(entries).unwrap_or(inherited)
    }
}
