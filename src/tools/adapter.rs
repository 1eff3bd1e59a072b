//! Tool invocation adapter
//!
//! An [`ExternalTool`] pairs a [`ToolDefinition`] with the external program
//! that backs it. Every invocation goes through the same pipeline: bind
//! arguments, build the command line, run it, normalize the outcome. Each
//! step reports failure as an [`InvocationResult::Failure`] value.

use super::command::CommandLine;
use super::protocol::{InvocationResult, ToolDefinition};
use super::runner::{CommandRunner, ExecLimits};
use super::schema::{self, BoundArgs};
use crate::config::{secs_to_timeout, ToolsConfig};
use crate::error::ValidationError;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Appends a tool's positional arguments, in the order its program expects
pub type ArgBuilder = fn(CommandLine, &BoundArgs) -> CommandLine;

/// How captured stdout is turned into the result text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Returned as captured
    Raw,
    /// Surrounding whitespace removed; for tools that print a bare identifier
    Trimmed,
}

/// A tool backed by one external command
#[derive(Clone)]
pub struct ExternalTool {
    definition: ToolDefinition,
    program: String,
    build_args: ArgBuilder,
    output: OutputMode,
    /// Capture bound this tool needs at minimum
    output_floor: Option<usize>,
    limits: ExecLimits,
}

impl ExternalTool {
    pub fn new(definition: ToolDefinition, program: &str, build_args: ArgBuilder) -> Self {
        Self {
            definition,
            program: program.to_string(),
            build_args,
            output: OutputMode::Raw,
            output_floor: None,
            limits: ExecLimits::default(),
        }
    }

    /// Trim surrounding whitespace from successful output
    pub fn trimmed(mut self) -> Self {
        self.output = OutputMode::Trimmed;
        self
    }

    /// Raise the capture bound for tools with large output
    pub fn with_max_output(mut self, bytes: usize) -> Self {
        self.output_floor = Some(bytes);
        self.limits.max_output = bytes;
        self
    }

    /// Apply global settings and this tool's overrides
    pub fn configure(mut self, config: &ToolsConfig) -> Self {
        let over = config.override_for(&self.definition.name).cloned().unwrap_or_default();

        if let Some(command) = over.command {
            self.program = command;
        }

        self.limits.max_output = over.max_output.unwrap_or_else(|| {
            self.output_floor
                .map_or(config.max_output, |floor| floor.max(config.max_output))
        });

        self.limits.timeout = match over.timeout {
            Some(secs) => secs_to_timeout(secs),
            None => config.timeout(),
        };

        self
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    #[cfg(test)]
    pub fn program(&self) -> &str {
        &self.program
    }

    #[cfg(test)]
    pub fn limits(&self) -> &ExecLimits {
        &self.limits
    }

    /// Validate parameters and build the command line without running it
    pub fn prepare(&self, params: &HashMap<String, Value>) -> Result<CommandLine, ValidationError> {
        let bound = schema::bind(&self.definition, params)?;
        Ok((self.build_args)(CommandLine::new(&self.program), &bound))
    }

    /// Run a prepared command line and normalize the outcome
    pub fn execute(&self, runner: &dyn CommandRunner, command: &CommandLine) -> InvocationResult {
        match runner.run(command, &self.limits) {
            Ok(stdout) => InvocationResult::Output(self.normalize(stdout)),
            Err(e) => InvocationResult::failure(self.name(), e),
        }
    }

    /// Full pipeline: bind, build, run, normalize
    pub fn invoke(
        &self,
        runner: &dyn CommandRunner,
        params: &HashMap<String, Value>,
    ) -> InvocationResult {
        match self.prepare(params) {
            Ok(command) => self.execute(runner, &command),
            Err(e) => InvocationResult::failure(self.name(), e),
        }
    }

    fn normalize(&self, stdout: String) -> String {
        match self.output {
            OutputMode::Raw => stdout,
            OutputMode::Trimmed => stdout.trim().to_string(),
        }
    }
}

impl fmt::Debug for ExternalTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalTool")
            .field("name", &self.definition.name)
            .field("program", &self.program)
            .field("output", &self.output)
            .field("limits", &self.limits)
            .finish()
    }
}
