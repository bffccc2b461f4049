//! Configuration module
//!
//! Runner configuration: defaults, configuration file and environment overrides.

mod env;
mod file;

pub use env::{EnvBuilder, EnvConfig, EnvGuard, ENV_PREFIX};
pub use file::{find_config_file, CONFIG_FILE_NAMES};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::error::RunError;
use crate::executor::SchedulerConfig;
use crate::push::{DEFAULT_NEGATIVE_TIMEOUT, DEFAULT_POSITIVE_TIMEOUT};

/// Runner configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Global time limit of a suite
    #[serde(with = "duration_str")]
    pub limit: Duration,

    /// Maximum concurrent runs
    pub concurrent: usize,

    /// Maximum concurrent iterations of one run, defaults to `concurrent`
    pub concurrent_iterations: Option<usize>,

    /// Iterations per run
    pub stress: usize,

    pub verbose: bool,
    pub skip_teardown: bool,
    pub stop_on_failure: bool,

    /// Require every tag expression to match instead of any
    pub match_all: bool,

    pub api_public: Option<String>,
    pub api_private: Option<String>,
    pub token: Option<String>,
    pub namespace: Option<String>,

    /// Skip TLS verification against the platform API
    pub accept_invalid_certs: bool,

    #[serde(with = "duration_str")]
    pub request_timeout: Duration,

    /// Free-form configuration handed to every test
    pub test_config: String,

    /// Extra platform facts exposed to tests
    pub platform_info: BTreeMap<String, String>,

    #[serde(with = "duration_str")]
    pub push_positive_timeout: Duration,

    #[serde(with = "duration_str")]
    pub push_negative_timeout: Duration,

    /// Output format (table, json, json-pretty, csv)
    pub format: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            limit: Duration::from_secs(5 * 60),
            concurrent: 20,
            concurrent_iterations: None,
            stress: 1,
            verbose: false,
            skip_teardown: false,
            stop_on_failure: false,
            match_all: false,
            api_public: None,
            api_private: None,
            token: None,
            namespace: None,
            accept_invalid_certs: true,
            request_timeout: Duration::from_secs(30),
            test_config: String::new(),
            platform_info: BTreeMap::new(),
            push_positive_timeout: DEFAULT_POSITIVE_TIMEOUT,
            push_negative_timeout: DEFAULT_NEGATIVE_TIMEOUT,
            format: "table".to_string(),
        }
    }
}

impl RunnerConfig {
    /// Load configuration from file, YAML or JSON by extension
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = if file::is_yaml_file(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
        };

        Ok(config)
    }

    /// Load the first configuration file found in the standard locations, or defaults
    pub fn load_default() -> Result<Self> {
        match find_config_file() {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if file::is_yaml_file(path) {
            serde_yaml::to_string(self).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create directory: {}", parent.display())
                })?;
            }
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn concurrent_iterations(&self) -> usize {
        self.concurrent_iterations.unwrap_or(self.concurrent)
    }

    pub fn validate(&self) -> Result<(), RunError> {
        self.scheduler_config().validate()
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            max_concurrent_runs: self.concurrent,
            max_concurrent_iterations: self.concurrent_iterations(),
            stress: self.stress,
            stop_on_failure: self.stop_on_failure,
            skip_teardown: self.skip_teardown,
            verbose: self.verbose,
            limit: self.limit,
            test_config: self.test_config.clone(),
            ..SchedulerConfig::default()
        }
    }
}

/// Parse `500ms`, `30s`, `5m`, `1h` or a bare number of seconds
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (value, unit) = s.split_at(split);

    let value: u64 = value
        .parse()
        .map_err(|_| format!("invalid duration: '{s}'"))?;

    match unit.trim() {
        "ms" => Ok(Duration::from_millis(value)),
        "" | "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 3600)),
        other => Err(format!("invalid duration unit '{other}' in '{s}'")),
    }
}

/// Render a duration with the largest unit that represents it exactly
pub fn format_duration(d: Duration) -> String {
    let millis = d.as_millis();
    if millis == 0 {
        return "0s".to_string();
    }
    if millis % 1000 != 0 {
        return format!("{millis}ms");
    }

    let secs = millis / 1000;
    if secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{secs}s")
    }
}

mod duration_str {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Secs(u64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        match Raw::deserialize(d)? {
            Raw::Secs(secs) => Ok(Duration::from_secs(secs)),
            Raw::Text(text) => super::parse_duration(&text).map_err(de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = RunnerConfig::default();
        assert_eq!(config.limit, Duration::from_secs(300));
        assert_eq!(config.concurrent, 20);
        assert_eq!(config.concurrent_iterations(), 20);
        assert_eq!(config.stress, 1);
        assert_eq!(config.push_positive_timeout, Duration::from_secs(120));
        assert_eq!(config.push_negative_timeout, Duration::from_secs(3));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("500ms"), Ok(Duration::from_millis(500)));
        assert_eq!(parse_duration("30s"), Ok(Duration::from_secs(30)));
        assert_eq!(parse_duration("5m"), Ok(Duration::from_secs(300)));
        assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
        assert_eq!(parse_duration("42"), Ok(Duration::from_secs(42)));
        assert!(parse_duration("5d").is_err());
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(300)), "5m");
        assert_eq!(format_duration(Duration::from_secs(90)), "90s");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1500ms");
        assert_eq!(format_duration(Duration::from_secs(7200)), "2h");
    }

    #[test]
    fn test_yaml_partial_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stresscheck.yaml");
        std::fs::write(
            &path,
            "limit: 10m\nconcurrent: 4\nstress: 3\ntoken: abc\nplatform_info:\n  region: eu\n",
        )
        .unwrap();

        let config = RunnerConfig::load(&path).unwrap();
        assert_eq!(config.limit, Duration::from_secs(600));
        assert_eq!(config.concurrent, 4);
        assert_eq!(config.concurrent_iterations(), 4);
        assert_eq!(config.stress, 3);
        assert_eq!(config.token.as_deref(), Some("abc"));
        assert_eq!(config.platform_info["region"], "eu");
        assert_eq!(config.push_negative_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_save_load_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = RunnerConfig {
            limit: Duration::from_millis(2500),
            concurrent_iterations: Some(2),
            ..RunnerConfig::default()
        };
        config.save(&path).unwrap();

        let loaded = RunnerConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_values_are_bootstrap_errors() {
        let config = RunnerConfig {
            stress: 0,
            ..RunnerConfig::default()
        };
        assert!(matches!(config.validate(), Err(RunError::Bootstrap(_))));
    }
}
