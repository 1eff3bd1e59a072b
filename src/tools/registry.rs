//! Tool registry
//!
//! Owns the configured tools and the runner, dispatches requests by tool name
//! and records each invocation in the audit log.

use super::adapter::ExternalTool;
use super::catalog;
use super::command::CommandLine;
use super::protocol::{InvocationResult, ToolDefinition, ToolManifest, ToolRequest, ToolResponse};
use super::runner::{CommandRunner, SystemRunner};
use crate::config::Config;
use crate::logging::AuditLogger;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, info, warn};

pub struct ToolRegistry {
    tools: Vec<ExternalTool>,
    index: HashMap<String, usize>,
    runner: Box<dyn CommandRunner>,
    audit: Mutex<AuditLogger>,
}

impl ToolRegistry {
    /// Registry with the built-in tools and a real process runner
    pub fn new(config: &Config) -> Self {
        let runner = SystemRunner::from_config(&config.tools);
        Self::with_runner(config, Box::new(runner))
    }

    /// Registry with the built-in tools and the given runner
    pub fn with_runner(config: &Config, runner: Box<dyn CommandRunner>) -> Self {
        let tools = catalog::builtin_tools(&config.tools);

        for name in config.tools.overrides.keys() {
            if !tools.iter().any(|t| t.name() == name) {
                warn!("Ignoring override for unknown tool '{}'", name);
            }
        }

        let index = tools
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name().to_string(), i))
            .collect();

        info!("Registered {} tools", tools.len());

        Self {
            tools,
            index,
            runner,
            audit: Mutex::new(AuditLogger::new(config.audit.clone())),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ExternalTool> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    #[cfg(test)]
    pub fn has_tool(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Tool definitions in catalog order
    pub fn definitions(&self) -> Vec<&ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    pub fn manifest(&self) -> ToolManifest {
        ToolManifest {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: env!("CARGO_PKG_DESCRIPTION").to_string(),
            tools: self.tools.iter().map(|t| t.definition().clone()).collect(),
        }
    }

    /// Build the command line a request would run, without running it
    pub fn dry_run(&self, name: &str, params: &HashMap<String, Value>) -> InvocationResult {
        let Some(tool) = self.get(name) else {
            return InvocationResult::Failure(format!("Unknown tool: {}", name));
        };

        match tool.prepare(params) {
            Ok(command) => InvocationResult::Output(command.render()),
            Err(e) => InvocationResult::failure(tool.name(), e),
        }
    }

    /// Run a tool by name
    pub fn invoke(&self, name: &str, params: &HashMap<String, Value>) -> InvocationResult {
        self.invoke_with_id("-", name, params)
    }

    /// Handle a host request
    pub fn handle(&self, request: &ToolRequest) -> ToolResponse {
        let result = self.invoke_with_id(&request.id, &request.tool, &request.params);
        ToolResponse::from_result(&request.id, result)
    }

    fn invoke_with_id(
        &self,
        request_id: &str,
        name: &str,
        params: &HashMap<String, Value>,
    ) -> InvocationResult {
        let Some(tool) = self.get(name) else {
            warn!("Unknown tool requested: {}", name);
            return InvocationResult::Failure(format!("Unknown tool: {}", name));
        };

        let start = Instant::now();
        let (command, result) = match tool.prepare(params) {
            Ok(command) => {
                let result = tool.execute(self.runner.as_ref(), &command);
                (Some(command), result)
            }
            Err(e) => {
                debug!("Rejected {} request: {}", name, e);
                (None, InvocationResult::failure(tool.name(), e))
            }
        };
        let elapsed = start.elapsed();

        debug!(
            "{} finished in {:?} (success: {})",
            name,
            elapsed,
            result.is_success()
        );

        self.audit(request_id, tool.name(), command.as_ref(), &result, elapsed);
        result
    }

    fn audit(
        &self,
        request_id: &str,
        tool: &str,
        command: Option<&CommandLine>,
        result: &InvocationResult,
        elapsed: std::time::Duration,
    ) {
        match self.audit.lock() {
            Ok(mut logger) => logger.log_invocation(request_id, tool, command, result, elapsed),
            Err(_) => warn!("Audit logger lock poisoned; skipping entry"),
        }
    }
}
