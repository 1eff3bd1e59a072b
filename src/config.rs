//! Configuration management for mrkit
//!
//! Handles loading and merging configuration from multiple sources:
//! 1. Compiled defaults
//! 2. System config (/etc/mrkit/config.toml)
//! 3. User config (<config_dir>/mrkit/config.toml)
//! 4. Project config (./.mrkit.toml)
//! 5. CLI-specified file
//! 6. Environment variables
//!
//! Files are merged as TOML tables, so a later file only needs the keys it
//! changes.

use crate::error::ConfigError;
use crate::tools::runner::DEFAULT_MAX_OUTPUT;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tools: ToolsConfig,
    pub audit: AuditConfig,
}

/// How external commands are started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationMode {
    /// Spawn the program directly with an argument vector
    #[default]
    Argv,
    /// Run the escaped command line through `<shell> -c`
    Shell,
}

impl std::str::FromStr for InvocationMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "argv" => Ok(Self::Argv),
            "shell" => Ok(Self::Shell),
            other => Err(ConfigError::Invalid(format!(
                "invocation must be \"argv\" or \"shell\", got {:?}",
                other
            ))),
        }
    }
}

/// External command settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Invocation mode: argv or shell
    pub invocation: InvocationMode,
    /// Shell used in shell mode
    pub shell: String,
    /// Timeout in seconds, 0 for none
    pub timeout: u64,
    /// Default stdout capture bound in bytes
    pub max_output: usize,
    /// Working directory for every command
    pub working_dir: Option<PathBuf>,
    /// Per-tool overrides, keyed by tool name
    pub overrides: HashMap<String, ToolOverride>,
}

/// Per-tool settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolOverride {
    /// Executable to run instead of the default program name
    pub command: Option<String>,
    pub max_output: Option<usize>,
    pub timeout: Option<u64>,
}

/// Invocation audit log configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Write one JSON line per invocation
    pub enabled: bool,
    /// Log file path
    pub path: PathBuf,
    /// Redact secrets from logged commands and messages
    pub redact_secrets: bool,
    /// Maximum log file size before rotation
    pub max_log_size: u64,
    /// Number of rotated logs to keep
    pub retention: u32,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            invocation: InvocationMode::Argv,
            shell: "sh".to_string(),
            timeout: 300,
            max_output: DEFAULT_MAX_OUTPUT,
            working_dir: None,
            overrides: HashMap::new(),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        let data = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            enabled: false,
            path: data.join("mrkit/audit.log"),
            redact_secrets: true,
            max_log_size: 10 * 1024 * 1024, // 10MB
            retention: 5,
        }
    }
}

impl ToolsConfig {
    pub fn override_for(&self, tool: &str) -> Option<&ToolOverride> {
        self.overrides.get(tool)
    }

    /// Global timeout as a duration, `None` when disabled
    pub fn timeout(&self) -> Option<Duration> {
        secs_to_timeout(self.timeout)
    }
}

pub fn secs_to_timeout(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

impl Config {
    /// Load configuration from all sources
    pub fn load(cli_config: Option<&Path>) -> Result<Self, ConfigError> {
        let mut merged = toml::Table::new();

        let system_config = Path::new("/etc/mrkit/config.toml");
        if system_config.exists() {
            debug!("Loading system config from {:?}", system_config);
            merge_tables(&mut merged, read_table(system_config)?);
        }

        if let Some(dir) = dirs::config_dir() {
            let user_config = dir.join("mrkit/config.toml");
            if user_config.exists() {
                debug!("Loading user config from {:?}", user_config);
                merge_tables(&mut merged, read_table(&user_config)?);
            }
        }

        let project_config = Path::new(".mrkit.toml");
        if project_config.exists() {
            debug!("Loading project config from {:?}", project_config);
            merge_tables(&mut merged, read_table(project_config)?);
        }

        if let Some(path) = cli_config {
            debug!("Loading CLI config from {:?}", path);
            merge_tables(&mut merged, read_table(path)?);
        }

        let mut config: Config = toml::Value::Table(merged)
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::Parse(e.to_string()))?;

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Parse a single TOML document on top of the defaults
    #[cfg(test)]
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(mode) = lookup("MRKIT_INVOCATION") {
            self.tools.invocation = mode.parse()?;
        }
        if let Some(timeout) = lookup("MRKIT_TIMEOUT") {
            self.tools.timeout = timeout.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("MRKIT_TIMEOUT must be seconds, got {:?}", timeout))
            })?;
        }
        if let Some(max) = lookup("MRKIT_MAX_OUTPUT") {
            self.tools.max_output = max.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("MRKIT_MAX_OUTPUT must be bytes, got {:?}", max))
            })?;
        }
        if let Some(path) = lookup("MRKIT_AUDIT_LOG") {
            self.audit.enabled = true;
            self.audit.path = PathBuf::from(path);
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tools.invocation == InvocationMode::Shell && self.tools.shell.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "tools.shell must be set when tools.invocation = \"shell\"".to_string(),
            ));
        }
        if self.tools.max_output == 0 {
            return Err(ConfigError::Invalid(
                "tools.max_output must be greater than zero".to_string(),
            ));
        }

        for (tool, over) in &self.tools.overrides {
            if matches!(over.command.as_deref(), Some(c) if c.trim().is_empty()) {
                return Err(ConfigError::Invalid(format!(
                    "tools.overrides.{}.command must not be empty",
                    tool
                )));
            }
            if over.max_output == Some(0) {
                return Err(ConfigError::Invalid(format!(
                    "tools.overrides.{}.max_output must be greater than zero",
                    tool
                )));
            }
        }

        Ok(())
    }
}

fn read_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Read(format!("{}: {}", path.display(), e)))?;

    toml::from_str::<toml::Table>(&contents)
        .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))
}

/// Recursively merge `other` into `base`; `other` wins on conflicts
fn merge_tables(base: &mut toml::Table, other: toml::Table) {
    for (key, value) in other {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
