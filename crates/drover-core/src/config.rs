//! Configuration document shared by the orchestrator, the selector, and the
//! desktop bridge.
//!
//! Recognized keys are typed; the `git`, `mcp_server`, and `maintenance`
//! tables plus any unknown top-level keys are carried opaquely so external
//! collaborators can read them through the bridge without this crate
//! understanding them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Top-level configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DroverConfig {
    /// Name of the project being worked on.
    #[serde(default = "default_project_name")]
    pub project_name: String,
    /// Model pool used for selection and fallback.
    #[serde(default)]
    pub models: ModelsConfig,
    /// Pipeline bounds and retry tuning.
    #[serde(default)]
    pub pipeline: PipelineSettings,
    /// Model selection thresholds.
    #[serde(default)]
    pub selection: SelectionSettings,
    /// Directory for durable state (model performance summaries).
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Git settings, passed through untouched.
    #[serde(default)]
    pub git: BTreeMap<String, serde_json::Value>,
    /// MCP server settings, passed through untouched.
    #[serde(default)]
    pub mcp_server: BTreeMap<String, serde_json::Value>,
    /// Maintenance settings, passed through untouched.
    #[serde(default)]
    pub maintenance: BTreeMap<String, serde_json::Value>,
    /// Fixture values injected into agent prompts by collaborators.
    #[serde(default)]
    pub test_data: BTreeMap<String, String>,
    /// Unrecognized top-level keys, preserved for forward compatibility.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for DroverConfig {
    fn default() -> Self {
        Self {
            project_name: default_project_name(),
            models: ModelsConfig::default(),
            pipeline: PipelineSettings::default(),
            selection: SelectionSettings::default(),
            data_dir: default_data_dir(),
            git: BTreeMap::new(),
            mcp_server: BTreeMap::new(),
            maintenance: BTreeMap::new(),
            test_data: BTreeMap::new(),
            extra: BTreeMap::new(),
        }
    }
}

/// Model pool: the preferred default, an optional fallback, and the
/// candidates rotation may choose from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Model used unless its recent health degrades.
    #[serde(default = "default_model")]
    pub default: String,
    /// Substituted when the selected model fails to start. Never selected
    /// as a primary.
    #[serde(default)]
    pub fallback: Option<String>,
    /// Pool rotated through while the default is unhealthy.
    #[serde(default)]
    pub candidate_models: Vec<String>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            default: default_model(),
            fallback: None,
            candidate_models: Vec::new(),
        }
    }
}

/// Bounds for the stage pipeline and the in-place retry loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Work/gate cycles allowed before the item fails.
    #[serde(default = "default_max_gate_cycles")]
    pub max_gate_cycles: u32,
    /// Re-entries of a failed stage before the item fails.
    #[serde(default = "default_max_stage_retries")]
    pub max_stage_retries: u32,
    /// In-place retries of a transient invocation failure.
    #[serde(default = "default_invoke_max_retries")]
    pub invoke_max_retries: u32,
    /// Base delay for exponential retry backoff, in milliseconds.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Upper bound on a single backoff delay, in milliseconds.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    /// Continuous-mode poll interval when the backlog is empty, in seconds.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_gate_cycles: default_max_gate_cycles(),
            max_stage_retries: default_max_stage_retries(),
            invoke_max_retries: default_invoke_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

/// Thresholds governing when selection rotates away from the default model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionSettings {
    /// Recent failure rate above which the default is considered unhealthy.
    #[serde(default = "default_failure_rate_threshold")]
    pub failure_rate_threshold: f64,
    /// Recent average item duration above which the default is considered
    /// unhealthy, in seconds.
    #[serde(default = "default_latency_threshold_secs")]
    pub latency_threshold_secs: f64,
    /// Recent outcomes required before health is judged at all.
    #[serde(default = "default_min_recent_samples")]
    pub min_recent_samples: usize,
    /// Recent outcomes retained per model.
    #[serde(default = "default_recent_window")]
    pub recent_window: usize,
}

impl Default for SelectionSettings {
    fn default() -> Self {
        Self {
            failure_rate_threshold: default_failure_rate_threshold(),
            latency_threshold_secs: default_latency_threshold_secs(),
            min_recent_samples: default_min_recent_samples(),
            recent_window: default_recent_window(),
        }
    }
}

fn default_project_name() -> String {
    "drover".to_string()
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("./.drover")
}
fn default_model() -> String {
    "claude-sonnet-4-5".to_string()
}
fn default_max_gate_cycles() -> u32 {
    3
}
fn default_max_stage_retries() -> u32 {
    2
}
fn default_invoke_max_retries() -> u32 {
    3
}
fn default_backoff_base_ms() -> u64 {
    500
}
fn default_backoff_max_ms() -> u64 {
    30_000
}
fn default_poll_interval_secs() -> u64 {
    30
}
fn default_failure_rate_threshold() -> f64 {
    0.5
}
fn default_latency_threshold_secs() -> f64 {
    600.0
}
fn default_min_recent_samples() -> usize {
    5
}
fn default_recent_window() -> usize {
    20
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply_on_empty_document() {
        let config: DroverConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.project_name, "drover");
        assert_eq!(config.models.default, "claude-sonnet-4-5");
        assert_eq!(config.pipeline.max_gate_cycles, 3);
        assert_eq!(config.pipeline.max_stage_retries, 2);
        assert!(config.models.fallback.is_none());
        assert!(config.extra.is_empty());
    }

    #[test]
    fn test_opaque_sections_pass_through() {
        let doc = serde_json::json!({
            "project_name": "uploader",
            "git": { "remote": "origin", "push": true },
            "mcp_server": { "port": 9432 },
            "test_data": { "user_email": "qa@example.com" },
            "experimental_flag": { "nested": [1, 2] }
        });
        let config: DroverConfig = serde_json::from_value(doc).unwrap();
        assert_eq!(config.git["remote"], serde_json::json!("origin"));
        assert_eq!(config.mcp_server["port"], serde_json::json!(9432));
        assert_eq!(config.test_data["user_email"], "qa@example.com");
        assert!(config.extra.contains_key("experimental_flag"));
    }

    #[test]
    fn test_models_section() {
        let doc = serde_json::json!({
            "models": {
                "default": "m-default",
                "fallback": "m-fallback",
                "candidate_models": ["m-a", "m-b"]
            }
        });
        let config: DroverConfig = serde_json::from_value(doc).unwrap();
        assert_eq!(config.models.default, "m-default");
        assert_eq!(config.models.fallback.as_deref(), Some("m-fallback"));
        assert_eq!(config.models.candidate_models.len(), 2);
    }

    #[test]
    fn test_roundtrip_preserves_extra_keys() {
        let doc = serde_json::json!({ "custom_section": { "a": 1 } });
        let config: DroverConfig = serde_json::from_value(doc).unwrap();
        let back = serde_json::to_value(&config).unwrap();
        assert_eq!(back["custom_section"]["a"], serde_json::json!(1));
    }
}
