// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

const DEFAULT_CONFIG_PATH: &str = "/etc/datadog-agent/edge-telemetry.yaml";
const ENV_PREFIX: &str = "DD_EDGE_TELEMETRY_";

/// A conditional dimension family: when a parameter path contains any of
/// `matches`, every dimension in `dimensions` is computed for it.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ConditionalFamily {
    pub name: String,
    pub matches: Vec<String>,
    pub dimensions: Vec<String>,
}

impl ConditionalFamily {
    fn new(name: &str, matches: &[&str], dimensions: &[&str]) -> Self {
        ConditionalFamily {
            name: name.to_string(),
            matches: matches.iter().map(|s| s.to_string()).collect(),
            dimensions: dimensions.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Immutable once handed to [`crate::Agent::new`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Defaults to `agent-<unix seconds>` at agent construction.
    pub agent_id: Option<String>,
    pub primary_dimensions: Vec<String>,
    /// Evaluated in order; the first family matching a path applies.
    pub conditional_dimensions: Vec<ConditionalFamily>,
    pub max_parameters: usize,
    pub max_dimension_combos: usize,
    pub max_sample_values: usize,
    /// Nesting depth past which the schema walk stops.
    pub max_walk_depth: usize,
    /// Advisory. The engine never flushes on its own.
    pub flush_interval_seconds: u64,
    /// Advisory. The engine ingests every document it is given.
    pub sampling_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            agent_id: None,
            primary_dimensions: ["device_type", "request_type", "country", "hour"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            conditional_dimensions: vec![
                ConditionalFamily::new("user", &["user", "eids"], &["has_user_id", "has_eids"]),
                ConditionalFamily::new(
                    "content",
                    &["content"],
                    &["content_type", "has_series_info"],
                ),
                ConditionalFamily::new(
                    "video",
                    &["video"],
                    &["video_placement", "video_skippable"],
                ),
                ConditionalFamily::new("device", &["device"], &["device_make", "has_ifa"]),
            ],
            max_parameters: 1000,
            max_dimension_combos: 50,
            max_sample_values: 5,
            max_walk_depth: 32,
            flush_interval_seconds: 30,
            sampling_rate: 1.0,
            log_level: None,
        }
    }
}

impl AgentConfig {
    /// Checks the settings that dimension resolution does not cover.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.flush_interval_seconds == 0 {
            return Err(ConfigError::ZeroFlushInterval);
        }
        if !(0.0..=1.0).contains(&self.sampling_rate) {
            return Err(ConfigError::SamplingRateOutOfRange {
                rate: self.sampling_rate,
            });
        }
        Ok(())
    }

    /// Applies `DD_EDGE_TELEMETRY_*` environment variables on top of the
    /// loaded values. Unparsable values are logged and ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(id) = env::var(format!("{ENV_PREFIX}AGENT_ID"))
            && !id.is_empty()
        {
            self.agent_id = Some(id);
        }
        env_override("MAX_PARAMETERS", &mut self.max_parameters);
        env_override("MAX_DIMENSION_COMBOS", &mut self.max_dimension_combos);
        env_override("MAX_SAMPLE_VALUES", &mut self.max_sample_values);
        env_override("MAX_WALK_DEPTH", &mut self.max_walk_depth);
        env_override("FLUSH_INTERVAL_SECONDS", &mut self.flush_interval_seconds);
        env_override("SAMPLING_RATE", &mut self.sampling_rate);
    }
}

fn env_override<T: FromStr>(suffix: &str, target: &mut T) {
    let key = format!("{ENV_PREFIX}{suffix}");
    let Ok(raw) = env::var(&key) else {
        return;
    };
    match raw.trim().parse() {
        Ok(value) => *target = value,
        Err(_) => warn!("Ignoring {key}: cannot parse {raw:?}"),
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_PATH)
}

/// Reads the YAML config at `path`, or `None` when no file exists there.
pub fn read_config_file(path: &Path) -> Result<Option<AgentConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    parse_config(path).map(Some)
}

/// Falls back to defaults when `file` is `None`, then applies environment
/// overrides. Both steps log warnings, so the logger must already be set up.
pub fn finish_config(path: &Path, file: Option<AgentConfig>) -> AgentConfig {
    let mut config = file.unwrap_or_else(|| {
        warn!(
            "Config file not found at {}. Using defaults and environment variables.",
            path.display()
        );
        AgentConfig::default()
    });
    config.apply_env_overrides();
    config
}

/// Loads the YAML config if it exists, then applies environment overrides.
/// A missing file is not an error; defaults are used instead.
pub fn load_config(config_path: Option<PathBuf>) -> Result<AgentConfig> {
    let path = config_path.unwrap_or_else(default_config_path);
    let file = read_config_file(&path)?;
    Ok(finish_config(&path, file))
}

fn parse_config(path: &Path) -> Result<AgentConfig> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    // An empty document is valid and means "all defaults".
    if contents.trim().is_empty() {
        return Ok(AgentConfig::default());
    }
    serde_yaml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}

/// Parse a Go log level string into a log::Level
/// Unknown levels silently default to Info
fn parse_log_level(level: &str) -> log::Level {
    match level.to_lowercase().as_str() {
        "trace" => log::Level::Trace,
        "debug" => log::Level::Debug,
        "info" => log::Level::Info,
        "warn" | "warning" => log::Level::Warn,
        "error" | "critical" | "off" => log::Level::Error,
        _ => log::Level::Info,
    }
}

/// Gets the log level from configuration.
/// Priority: DD_LOG_LEVEL > LOG_LEVEL > YAML config > default Info
pub fn get_log_level(config: Option<&AgentConfig>) -> log::Level {
    if let Ok(level) = env::var("DD_LOG_LEVEL") {
        return parse_log_level(&level);
    }

    if let Ok(level) = env::var("LOG_LEVEL") {
        return parse_log_level(&level);
    }

    config
        .and_then(|config| config.log_level.as_deref())
        .map(parse_log_level)
        .unwrap_or(log::Level::Info)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;

    use std::io::Write;
    use tempfile::NamedTempFile;

    const NO_OVERRIDES: [(&str, Option<&str>); 9] = [
        ("DD_EDGE_TELEMETRY_AGENT_ID", None),
        ("DD_EDGE_TELEMETRY_MAX_PARAMETERS", None),
        ("DD_EDGE_TELEMETRY_MAX_DIMENSION_COMBOS", None),
        ("DD_EDGE_TELEMETRY_MAX_SAMPLE_VALUES", None),
        ("DD_EDGE_TELEMETRY_MAX_WALK_DEPTH", None),
        ("DD_EDGE_TELEMETRY_FLUSH_INTERVAL_SECONDS", None),
        ("DD_EDGE_TELEMETRY_SAMPLING_RATE", None),
        ("DD_LOG_LEVEL", None),
        ("LOG_LEVEL", None),
    ];

    fn create_test_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = AgentConfig::default();
        assert_eq!(
            config.primary_dimensions,
            vec!["device_type", "request_type", "country", "hour"]
        );
        let families: Vec<&str> = config
            .conditional_dimensions
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(families, vec!["user", "content", "video", "device"]);
        assert_eq!(config.conditional_dimensions[0].matches, vec!["user", "eids"]);
        assert_eq!(config.max_parameters, 1000);
        assert_eq!(config.max_dimension_combos, 50);
        assert_eq!(config.max_sample_values, 5);
        assert_eq!(config.flush_interval_seconds, 30);
        assert_eq!(config.sampling_rate, 1.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        temp_env::with_vars(NO_OVERRIDES, || {
            let dir = tempfile::tempdir().unwrap();
            let config = load_config(Some(dir.path().join("absent.yaml"))).unwrap();
            assert_eq!(config, AgentConfig::default());
        });
    }

    #[test]
    fn test_load_empty_file_uses_defaults() {
        temp_env::with_vars(NO_OVERRIDES, || {
            let file = create_test_config("");
            let config = load_config(Some(file.path().to_path_buf())).unwrap();
            assert_eq!(config, AgentConfig::default());
        });
    }

    #[test]
    fn test_load_partial_yaml() {
        let yaml = r#"
agent_id: edge-eu-1
max_parameters: 200
primary_dimensions: [device_type, country]
conditional_dimensions:
  - name: video
    matches: [video, imp]
    dimensions: [video_placement]
log_level: debug
"#;
        temp_env::with_vars(NO_OVERRIDES, || {
            let file = create_test_config(yaml);
            let config = load_config(Some(file.path().to_path_buf())).unwrap();
            assert_eq!(config.agent_id.as_deref(), Some("edge-eu-1"));
            assert_eq!(config.max_parameters, 200);
            assert_eq!(config.max_sample_values, 5);
            assert_eq!(config.primary_dimensions, vec!["device_type", "country"]);
            assert_eq!(config.conditional_dimensions.len(), 1);
            assert_eq!(config.conditional_dimensions[0].matches, vec!["video", "imp"]);
            assert_eq!(get_log_level(Some(&config)), log::Level::Debug);
        });
    }

    #[test]
    fn test_read_config_file_leaves_env_alone() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_config_file(&dir.path().join("absent.yaml")).unwrap(), None);

        let file = create_test_config("max_parameters: 200\n");
        temp_env::with_var("DD_EDGE_TELEMETRY_MAX_PARAMETERS", Some("10"), || {
            let read = read_config_file(file.path()).unwrap().unwrap();
            assert_eq!(read.max_parameters, 200);
            assert_eq!(finish_config(file.path(), Some(read)).max_parameters, 10);
        });
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        let file = create_test_config("max_parameters: [not, a, number]");
        assert!(load_config(Some(file.path().to_path_buf())).is_err());
    }

    #[test]
    fn test_env_overrides_yaml() {
        let file = create_test_config("max_parameters: 200\nsampling_rate: 0.5\n");
        temp_env::with_vars(
            [
                ("DD_EDGE_TELEMETRY_MAX_PARAMETERS", Some("10")),
                ("DD_EDGE_TELEMETRY_AGENT_ID", Some("from-env")),
                ("DD_EDGE_TELEMETRY_SAMPLING_RATE", None),
            ],
            || {
                let config = load_config(Some(file.path().to_path_buf())).unwrap();
                assert_eq!(config.max_parameters, 10);
                assert_eq!(config.agent_id.as_deref(), Some("from-env"));
                assert_eq!(config.sampling_rate, 0.5);
            },
        );
    }

    #[test]
    fn test_unparsable_env_is_ignored() {
        temp_env::with_var("DD_EDGE_TELEMETRY_MAX_SAMPLE_VALUES", Some("lots"), || {
            let mut config = AgentConfig::default();
            config.apply_env_overrides();
            assert_eq!(config.max_sample_values, 5);
        });
    }

    #[test]
    fn test_validate() {
        let config = AgentConfig {
            flush_interval_seconds: 0,
            ..AgentConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroFlushInterval));

        let config = AgentConfig {
            sampling_rate: 1.5,
            ..AgentConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::SamplingRateOutOfRange { rate: 1.5 })
        );

        let config = AgentConfig {
            sampling_rate: 0.0,
            ..AgentConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_log_level_priority() {
        let config = AgentConfig {
            log_level: Some("warning".to_string()),
            ..AgentConfig::default()
        };
        temp_env::with_vars(NO_OVERRIDES, || {
            assert_eq!(get_log_level(Some(&config)), log::Level::Warn);
            assert_eq!(get_log_level(None), log::Level::Info);
        });
        temp_env::with_vars([("DD_LOG_LEVEL", Some("trace")), ("LOG_LEVEL", Some("error"))], || {
            assert_eq!(get_log_level(Some(&config)), log::Level::Trace);
        });
        temp_env::with_vars([("DD_LOG_LEVEL", None), ("LOG_LEVEL", Some("critical"))], || {
            assert_eq!(get_log_level(Some(&config)), log::Level::Error);
        });
    }

    #[test]
    fn test_parse_log_level_unknown_defaults_to_info() {
        assert_eq!(parse_log_level("verbose"), log::Level::Info);
        assert_eq!(parse_log_level("DEBUG"), log::Level::Debug);
    }
}
