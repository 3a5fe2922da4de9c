//! Configuration types for the Viva orchestrator.
//!
//! This module provides the configuration structures controlling exam-script
//! lookup, evaluator retry policy, difficulty selection, and report output.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VivaError};
use crate::policy::DifficultyPolicy;

/// The default config file name.
const CONFIG_FILE_NAME: &str = "viva.json";

/// Default exam-script root directory.
fn default_script_dir() -> String {
    "exams".to_string()
}

/// Default output directory for reports.
fn default_output_dir() -> String {
    ".".to_string()
}

/// Default number of evaluator attempts before degrading a turn.
const fn default_max_attempts() -> u32 {
    3
}

/// Default per-attempt evaluator timeout in seconds.
const fn default_timeout() -> u32 {
    30
}

/// Main configuration for the Viva orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Directory containing exam-script JSON files.
    #[serde(default = "default_script_dir")]
    pub script_dir: String,

    /// Output directory for generated reports.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Difficulty selection strategy.
    #[serde(default)]
    pub difficulty_policy: DifficultyPolicy,

    /// Evaluator retry/timeout policy.
    #[serde(default)]
    pub evaluator: EvaluatorPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            script_dir: default_script_dir(),
            output_dir: default_output_dir(),
            difficulty_policy: DifficultyPolicy::default(),
            evaluator: EvaluatorPolicy::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// Looks for `viva.json` in the current directory. If found, loads and
    /// validates the configuration. If not found, returns default
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            VivaError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads configuration from a specific directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        Self::load_from_file(&config_path)
    }

    /// Loads configuration from a specific file path.
    ///
    /// If the file does not exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns `VivaError::ConfigParseError` if the file exists but contains
    /// invalid JSON, and `VivaError::ConfigValidationError` if the values are
    /// invalid.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(VivaError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| VivaError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `VivaError::ConfigValidationError` if any check fails.
    pub fn validate(&self) -> Result<()> {
        if self.script_dir.trim().is_empty() {
            return Err(VivaError::config_validation(
                "scriptDir must not be empty",
                "Provide a directory containing exam-script JSON files in your viva.json",
            ));
        }

        if self.output_dir.trim().is_empty() {
            return Err(VivaError::config_validation(
                "outputDir must not be empty",
                "Provide a valid output directory path in your viva.json (use '.' for current directory)",
            ));
        }

        if self.evaluator.max_attempts == 0 {
            return Err(VivaError::config_validation(
                "evaluator.maxAttempts must be greater than 0",
                "Set evaluator.maxAttempts to at least 1 in your viva.json",
            ));
        }

        if self.evaluator.timeout_seconds == 0 {
            return Err(VivaError::config_validation(
                "evaluator.timeoutSeconds must be greater than 0",
                "Set evaluator.timeoutSeconds to at least 1 second in your viva.json",
            ));
        }

        Ok(())
    }
}

/// Retry and timeout policy for the evaluator collaborator.
///
/// A stuck or failing evaluator must never stall a session: each attempt is
/// bounded by a timeout, and after `max_attempts` failures the pending turn
/// is scored 0 with failure-flag feedback and the exam continues.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluatorPolicy {
    /// Attempts before falling back to a degraded zero-score turn.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Per-attempt timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u32,
}

impl Default for EvaluatorPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            timeout_seconds: default_timeout(),
        }
    }
}
