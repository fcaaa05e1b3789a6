use heck::ToKebabCase;
use log::{debug, error, info};
use serde::Serialize;
use std::fmt;
use std::process::{Command, Stdio};
use thiserror::Error;

use crate::config::CompilerConfig;

/// Machine-readable reason a compilation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    Disabled,
    Spawn,
    Io,
    Compilation,
    MissingOutput,
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureCategory::Disabled => "disabled",
            FailureCategory::Spawn => "spawn",
            FailureCategory::Io => "io",
            FailureCategory::Compilation => "compilation",
            FailureCategory::MissingOutput => "missing_output",
        };
        f.write_str(name)
    }
}

/// A failed compilation, passed to the user as-is.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("{category}: {message}")]
pub struct CompileFailure {
    pub category: FailureCategory,
    pub message: String,
    pub stdout: String,
    pub stderr: String,
}

impl CompileFailure {
    fn new(category: FailureCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            stdout: String::new(),
            stderr: String::new(),
        }
    }
}

/// Turns document markup into a rendered document.
pub trait DocumentCompiler {
    fn compile(&self, title: &str, markup: &str) -> Result<Vec<u8>, CompileFailure>;
}

/// Runs a LaTeX engine as a child process in a scratch directory.
///
/// The markup is written to `<job>.tex`, the configured arguments are passed
/// followed by that file name, and `<job>.pdf` is read back.
pub struct CommandCompiler {
    config: CompilerConfig,
}

impl CommandCompiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    fn job_name(title: &str) -> String {
        let job = title.to_kebab_case();
        if job.is_empty() {
            "document".to_string()
        } else {
            job
        }
    }
}

impl DocumentCompiler for CommandCompiler {
    fn compile(&self, title: &str, markup: &str) -> Result<Vec<u8>, CompileFailure> {
        if !self.config.enabled {
            return Err(CompileFailure::new(FailureCategory::Disabled, "compilation is disabled"));
        }
        let workdir = tempfile::tempdir().map_err(|e| {
            error!("Failed to create compile directory: {}", e);
            CompileFailure::new(FailureCategory::Io, e.to_string())
        })?;
        let job = Self::job_name(title);
        let input = format!("{}.tex", job);
        std::fs::write(workdir.path().join(&input), markup)
            .map_err(|e| CompileFailure::new(FailureCategory::Io, e.to_string()))?;

        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.args)
            .arg(&input)
            .current_dir(workdir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!("Running {} on {}", self.config.command, input);

        let output = cmd.output().map_err(|e| {
            error!("Failed to spawn compiler: {}", e);
            CompileFailure::new(
                FailureCategory::Spawn,
                format!("failed to run '{}': {}", self.config.command, e),
            )
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if !output.status.success() {
            error!("Compiler failed for {}: {}", input, output.status);
            return Err(CompileFailure {
                category: FailureCategory::Compilation,
                message: format!("'{}' exited with {}", self.config.command, output.status),
                stdout,
                stderr,
            });
        }

        let pdf = workdir.path().join(format!("{}.pdf", job));
        match std::fs::read(&pdf) {
            Ok(bytes) => {
                info!("Compiled {} ({} bytes)", input, bytes.len());
                Ok(bytes)
            }
            Err(e) => Err(CompileFailure {
                category: FailureCategory::MissingOutput,
                message: format!("no {}.pdf produced: {}", job, e),
                stdout,
                stderr,
            }),
        }
    }
}
