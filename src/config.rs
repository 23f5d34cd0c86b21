//! Configuration management with environment variable support.
//!
//! This module provides centralized configuration for Voyager Judge, supporting:
//! - Environment variables for all configurable values
//! - Defaults matching the WebVoyager evaluation layout
//! - A cached `from_env()` view of the judge settings
//!
//! File locations and the batch size are command-line flags; the binary
//! reads their `VOYAGER_JUDGE_*` variables through clap using the names and
//! defaults declared here.
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `OPENAI_API_KEY` | Bearer token for the judge API | unset |
//! | `VOYAGER_JUDGE_ENDPOINT` | Judge API endpoint URL | `https://api.openai.com/v1/responses` |
//! | `VOYAGER_JUDGE_MODEL` | Judge model name | `gpt-4o` |
//! | `VOYAGER_JUDGE_REFERENCE_DATE` | "Today" as told to the judge | current month, e.g. `Oct 2026` |
//! | `VOYAGER_JUDGE_BATCH_SIZE` | Tasks judged concurrently per batch | `10` |
//! | `VOYAGER_JUDGE_RESULTS_DIR` | Directory holding `{id}.txt` and `{id}/*.png` | `results` |
//! | `VOYAGER_JUDGE_OUTPUT` | Verdict log (JSON lines, append-only) | `webvoyager_eval.jsonl` |
//! | `VOYAGER_JUDGE_TASKS` | Task corpus (JSON lines) | `WebVoyager_data.jsonl` |
//! | `VOYAGER_JUDGE_IMPOSSIBLE` | JSON array of excluded task ids | `WebVoyagerImpossibleTasks.json` |
//!
//! # Example
//!
//! ```bash
//! export OPENAI_API_KEY="sk-..."
//! export VOYAGER_JUDGE_MODEL="gpt-4o-mini"
//! export VOYAGER_JUDGE_BATCH_SIZE=5
//! ```

use std::env;
use std::sync::OnceLock;

// ============================================================================
// Default Values
// ============================================================================

/// Default judge API endpoint (OpenAI Responses API)
pub const DEFAULT_JUDGE_ENDPOINT: &str = "https://api.openai.com/v1/responses";

/// Default judge model name
pub const DEFAULT_JUDGE_MODEL: &str = "gpt-4o";

/// Default number of tasks per batch
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Default evidence directory
pub const DEFAULT_RESULTS_DIR: &str = "results";

/// Default verdict log path
pub const DEFAULT_OUTPUT_FILE: &str = "webvoyager_eval.jsonl";

/// Default task corpus path
pub const DEFAULT_TASKS_FILE: &str = "WebVoyager_data.jsonl";

/// Default impossible-task list path
pub const DEFAULT_IMPOSSIBLE_FILE: &str = "WebVoyagerImpossibleTasks.json";

// ============================================================================
// Environment Variable Names
// ============================================================================

/// Environment variable holding the judge API key
pub const ENV_API_KEY: &str = "OPENAI_API_KEY";

/// Environment variable for the judge endpoint
pub const ENV_JUDGE_ENDPOINT: &str = "VOYAGER_JUDGE_ENDPOINT";

/// Environment variable for the judge model
pub const ENV_JUDGE_MODEL: &str = "VOYAGER_JUDGE_MODEL";

/// Environment variable for the rubric's reference date
pub const ENV_REFERENCE_DATE: &str = "VOYAGER_JUDGE_REFERENCE_DATE";

/// Environment variable for the batch size
pub const ENV_BATCH_SIZE: &str = "VOYAGER_JUDGE_BATCH_SIZE";

/// Environment variable for the evidence directory
pub const ENV_RESULTS_DIR: &str = "VOYAGER_JUDGE_RESULTS_DIR";

/// Environment variable for the verdict log path
pub const ENV_OUTPUT_FILE: &str = "VOYAGER_JUDGE_OUTPUT";

/// Environment variable for the task corpus path
pub const ENV_TASKS_FILE: &str = "VOYAGER_JUDGE_TASKS";

/// Environment variable for the impossible-task list path
pub const ENV_IMPOSSIBLE_FILE: &str = "VOYAGER_JUDGE_IMPOSSIBLE";

// ============================================================================
// Configuration Getters (with caching)
// ============================================================================

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration (initialized from environment on first access)
pub fn get() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Centralized configuration for Voyager Judge
#[derive(Debug, Clone)]
pub struct Config {
    /// Judge client settings
    pub judge: JudgeSettings,
}

/// Judge-related settings
#[derive(Clone)]
pub struct JudgeSettings {
    /// API endpoint URL
    pub endpoint: String,
    /// Model name
    pub model: String,
    /// Bearer token, if one is configured
    pub api_key: Option<String>,
    /// Date the rubric tells the judge it is
    pub reference_date: String,
}

// Hand-written so the API key never lands in logs.
impl std::fmt::Debug for JudgeSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JudgeSettings")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("reference_date", &self.reference_date)
            .finish()
    }
}

impl Config {
    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            judge: JudgeSettings::from_env(),
        }
    }

    /// Create configuration with all defaults (ignoring environment)
    pub fn defaults() -> Self {
        Self {
            judge: JudgeSettings::defaults(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

impl JudgeSettings {
    /// Create judge settings from environment variables
    pub fn from_env() -> Self {
        Self {
            endpoint: env::var(ENV_JUDGE_ENDPOINT)
                .unwrap_or_else(|_| DEFAULT_JUDGE_ENDPOINT.to_string()),
            model: env::var(ENV_JUDGE_MODEL).unwrap_or_else(|_| DEFAULT_JUDGE_MODEL.to_string()),
            api_key: env::var(ENV_API_KEY).ok().filter(|k| !k.trim().is_empty()),
            reference_date: env::var(ENV_REFERENCE_DATE)
                .ok()
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(current_month),
        }
    }

    /// Create judge settings with defaults
    pub fn defaults() -> Self {
        Self {
            endpoint: DEFAULT_JUDGE_ENDPOINT.to_string(),
            model: DEFAULT_JUDGE_MODEL.to_string(),
            api_key: None,
            reference_date: current_month(),
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Parse a batch size for the command line; zero and garbage are rejected
pub fn parse_batch_size(value: &str) -> Result<usize, String> {
    match value.trim().parse::<usize>() {
        Ok(0) => Err("batch size must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(format!("invalid batch size {value:?}: {e}")),
    }
}

/// The current UTC month in the rubric's style, e.g. "Sep 2025"
pub fn current_month() -> String {
    chrono::Utc::now().format("%b %Y").to_string()
}
