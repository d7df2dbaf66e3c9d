use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{QuillError, Result};

/// Top-level configuration for the Quill application.
///
/// Loaded from `~/.quill/config.toml` by default. Each section corresponds
/// to one subsystem or cross-cutting concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuillConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub flow: FlowConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

impl QuillConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: QuillConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| QuillError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Upstream flow-execution engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Base URL of the flow-execution engine.
    pub base_url: String,
    /// Identifier of the flow to run.
    pub flow_id: String,
    /// Identifier of the engine workspace hosting the flow.
    pub engine_id: String,
    /// Bearer token sent with every request.
    pub application_token: String,
    /// Fixed timeout bound for a single upstream call, in seconds.
    pub timeout_secs: u64,
    /// Opaque per-component overrides, passed through to the engine
    /// unchanged.
    pub tweaks: HashMap<String, serde_json::Value>,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:7860".to_string(),
            flow_id: String::new(),
            engine_id: String::new(),
            application_token: String::new(),
            timeout_secs: 30,
            tweaks: HashMap::new(),
        }
    }
}

/// Report pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Format used when a request does not name one.
    pub default_format: String,
    /// Maximum accepted query length in characters.
    pub max_query_length: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            default_format: "PDF".to_string(),
            max_query_length: 2000,
        }
    }
}

/// Session bookkeeping settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum length of a session title derived from its first query.
    pub title_max_chars: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { title_max_chars: 80 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = QuillConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.flow.base_url, "http://127.0.0.1:7860");
        assert_eq!(config.flow.timeout_secs, 30);
        assert!(config.flow.tweaks.is_empty());
        assert_eq!(config.report.default_format, "PDF");
        assert_eq!(config.report.max_query_length, 2000);
        assert_eq!(config.session.title_max_chars, 80);
    }

    #[test]
    fn test_load_missing_file_errors() {
        let result = QuillConfig::load(Path::new("/nonexistent/quill/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = QuillConfig::load_or_default(Path::new("/nonexistent/quill/config.toml"));
        assert_eq!(config.report.default_format, "PDF");
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = QuillConfig::default();
        config.flow.flow_id = "flow-abc".to_string();
        config.flow.engine_id = "engine-xyz".to_string();
        config.flow.timeout_secs = 12;
        config.report.default_format = "HTML".to_string();
        config.save(&path).unwrap();

        let loaded = QuillConfig::load(&path).unwrap();
        assert_eq!(loaded.flow.flow_id, "flow-abc");
        assert_eq!(loaded.flow.engine_id, "engine-xyz");
        assert_eq!(loaded.flow.timeout_secs, 12);
        assert_eq!(loaded.report.default_format, "HTML");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[flow]\nflow_id = \"only-this\"\n").unwrap();

        let config = QuillConfig::load(&path).unwrap();
        assert_eq!(config.flow.flow_id, "only-this");
        assert_eq!(config.flow.timeout_secs, 30);
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn test_load_or_default_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "this is not toml = [[[").unwrap();

        let config = QuillConfig::load_or_default(&path);
        assert_eq!(config.report.default_format, "PDF");
    }

    #[test]
    fn test_tweaks_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = QuillConfig::default();
        config.flow.tweaks.insert(
            "ChatOutput-XO9ot".to_string(),
            serde_json::json!({ "temperature": 0.2 }),
        );
        config.save(&path).unwrap();

        let loaded = QuillConfig::load(&path).unwrap();
        let tweak = loaded.flow.tweaks.get("ChatOutput-XO9ot").unwrap();
        assert_eq!(tweak.get("temperature").and_then(|v| v.as_f64()), Some(0.2));
    }
}
