// Configuration File Support
//
// TOML configuration for the shellgate CLI with environment variable overrides.
// Configuration files are loaded from the platform config directory:
// ~/.config/shellgate/config.toml on Linux

use crate::tools::ExecutorConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Shell interpreter configuration
    pub shell: ShellConfig,

    /// Execution configuration
    pub execution: ExecutionConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// Shell interpreter configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShellConfig {
    /// Interpreter binary
    pub interpreter: String,

    /// Arguments placed before the command
    pub args: Vec<String>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        let defaults = ExecutorConfig::default();
        Self {
            interpreter: defaults.interpreter,
            args: defaults.interpreter_args,
        }
    }
}

/// Execution configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Root directory that relative working directories resolve against
    pub project_root: PathBuf,

    /// Minimum interval between progress snapshots in milliseconds
    pub progress_interval_ms: u64,

    /// Grace window for output still in flight after exit, in milliseconds
    pub exit_drain_ms: u64,

    /// Show the full report instead of the short summary
    pub debug_mode: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            progress_interval_ms: 1000,
            exit_drain_ms: 100,
            debug_mode: false,
        }
    }
}

impl Config {
    /// Load configuration from the default config directory
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    /// If the config file does not exist, returns default configuration.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    ///
    /// Environment overrides are applied whether or not the file exists.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file from {:?}", path))?;

            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file from {:?}", path))?;

            tracing::debug!("Loaded configuration from {:?}", path);
            config
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            Self::default()
        };

        let config = config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path
    pub fn config_path() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("com", "shellgate", "shellgate") {
            proj_dirs.config_dir().join("config.toml")
        } else {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home)
                .join(".config")
                .join("shellgate")
                .join("config.toml")
        }
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Environment variables take precedence over config file values:
    /// - SHELLGATE_LOG_LEVEL
    /// - SHELLGATE_LOG_FORMAT
    /// - SHELLGATE_SHELL
    /// - SHELLGATE_PROJECT_ROOT
    /// - SHELLGATE_PROGRESS_INTERVAL_MS
    /// - SHELLGATE_DEBUG
    fn apply_env_overrides(mut self) -> Self {
        if let Ok(level) = std::env::var("SHELLGATE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("SHELLGATE_LOG_FORMAT") {
            self.logging.format = format;
        }

        if let Ok(shell) = std::env::var("SHELLGATE_SHELL") {
            self.shell.interpreter = shell;
        }

        if let Ok(root) = std::env::var("SHELLGATE_PROJECT_ROOT") {
            self.execution.project_root = PathBuf::from(root);
        }
        if let Ok(interval) = std::env::var("SHELLGATE_PROGRESS_INTERVAL_MS") {
            if let Ok(interval) = interval.parse::<u64>() {
                if interval > 0 {
                    self.execution.progress_interval_ms = interval;
                }
            }
        }
        if let Ok(debug) = std::env::var("SHELLGATE_DEBUG") {
            self.execution.debug_mode = debug.parse().unwrap_or(self.execution.debug_mode);
        }

        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            ),
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => anyhow::bail!(
                "Invalid log format: {}. Must be one of: json, pretty, compact",
                self.logging.format
            ),
        }

        if self.shell.interpreter.trim().is_empty() {
            anyhow::bail!("Shell interpreter cannot be empty");
        }

        if self.execution.progress_interval_ms == 0 {
            anyhow::bail!("Progress interval must be > 0");
        }

        Ok(())
    }

    /// Convert log level string to tracing::Level
    pub fn log_level(&self) -> Result<tracing::Level> {
        self.logging
            .level
            .to_lowercase()
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse log level: {}", e))
    }

    /// Executor settings derived from this configuration
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            interpreter: self.shell.interpreter.clone(),
            interpreter_args: self.shell.args.clone(),
            project_root: self.execution.project_root.clone(),
            progress_interval: Duration::from_millis(self.execution.progress_interval_ms),
            exit_drain: Duration::from_millis(self.execution.exit_drain_ms),
            debug_mode: self.execution.debug_mode,
        }
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}
