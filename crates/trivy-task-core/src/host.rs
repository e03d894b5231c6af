//! Seams to the CI host: where inputs come from, where results go, and how
//! processes are spawned.
//!
//! The console adapters speak the Azure Pipelines logging-command protocol
//! (`##vso[...]`), which is what the agent parses from a task's stdout.

use crate::error::{Result, ScanError};
use crate::invocation::Invocation;
use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Named task inputs supplied by the pipeline.
pub trait InputSource {
    /// Raw value of an input; unset and blank inputs are `None`.
    fn get_input(&self, name: &str) -> Option<String>;

    fn get_bool_input(&self, name: &str) -> Result<bool> {
        match self.get_input(name) {
            None => Ok(false),
            Some(value) => parse_bool(name, &value),
        }
    }

    fn get_required_input(&self, name: &str) -> Result<String> {
        self.get_input(name)
            .ok_or_else(|| ScanError::input(format!("Input required: {name}")))
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ScanError::input(format!(
            "Input '{name}' must be 'true' or 'false', got '{value}'"
        ))),
    }
}

fn non_blank(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Reads `INPUT_<NAME>` environment variables, the way the pipeline agent
/// hands inputs to a task process.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvInputs;

impl EnvInputs {
    pub fn var_name(name: &str) -> String {
        format!("INPUT_{}", name.replace(' ', "_").to_ascii_uppercase())
    }
}

impl InputSource for EnvInputs {
    fn get_input(&self, name: &str) -> Option<String> {
        std::env::var(Self::var_name(name)).ok().and_then(non_blank)
    }
}

/// Inputs held in memory, e.g. from command-line flags.
#[derive(Debug, Default, Clone)]
pub struct MapInputs {
    values: HashMap<String, String>,
}

impl MapInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.values.insert(name.to_string(), value.into());
    }
}

impl InputSource for MapInputs {
    fn get_input(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned().and_then(non_blank)
    }
}

/// Final verdict of a task run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskStatus {
    Succeeded,
    Failed,
}

impl TaskStatus {
    pub fn label(&self) -> &str {
        match self {
            TaskStatus::Succeeded => "Succeeded",
            TaskStatus::Failed => "Failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskResult {
    pub status: TaskStatus,
    pub message: String,
}

impl TaskResult {
    pub fn succeeded(message: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Succeeded,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Failed,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Succeeded
    }
}

/// Publishes results and attachments back to the pipeline.
pub trait TaskReporter {
    fn add_attachment(&mut self, kind: &str, name: &str, path: &Path) -> Result<()>;

    fn set_result(&mut self, result: &TaskResult) -> Result<()>;
}

/// Writes `##vso` logging commands to a stream (stdout in production).
pub struct ConsoleReporter<W: Write> {
    out: W,
}

impl ConsoleReporter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self {
            out: std::io::stdout(),
        }
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> TaskReporter for ConsoleReporter<W> {
    fn add_attachment(&mut self, kind: &str, name: &str, path: &Path) -> Result<()> {
        writeln!(
            self.out,
            "##vso[task.addattachment type={};name={};]{}",
            escape_property(kind),
            escape_property(name),
            escape_data(&path.to_string_lossy())
        )?;
        Ok(())
    }

    fn set_result(&mut self, result: &TaskResult) -> Result<()> {
        writeln!(
            self.out,
            "##vso[task.complete result={};]{}",
            result.status.label(),
            escape_data(&result.message)
        )?;
        Ok(())
    }
}

fn escape_data(value: &str) -> String {
    value
        .replace('%', "%AZP25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

fn escape_property(value: &str) -> String {
    escape_data(value).replace(']', "%5D").replace(';', "%3B")
}

/// Spawns a program and waits for its exit code.
pub trait ProcessRunner {
    fn run(&self, invocation: &Invocation) -> Result<i32>;
}

/// Runs programs with inherited stdio so their output lands in the build log
/// untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<i32> {
        debug!("Spawning {}", invocation);
        let status = Command::new(&invocation.program)
            .args(&invocation.args)
            .status()
            .map_err(|source| ScanError::Spawn {
                program: invocation.program.clone(),
                source,
            })?;

        // No code means the process was killed by a signal
        Ok(status.code().unwrap_or(-1))
    }
}

/// Source of collision-avoiding suffixes for output and attachment names.
pub trait IdGenerator {
    fn next_id(&mut self) -> String;
}

/// 64 random bits rendered as hex.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn next_id(&mut self) -> String {
        format!("{:016x}", rand::thread_rng().gen::<u64>())
    }
}

/// `<prefix>1`, `<prefix>2`, ... for reproducible names.
#[derive(Debug, Clone)]
pub struct SequentialIds {
    prefix: String,
    next: u64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 1,
        }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&mut self) -> String {
        let id = format!("{}{}", self.prefix, self.next);
        self.next += 1;
        id
    }
}
