//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;

use super::{parse_duration, RunnerConfig};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "STRESSCHECK";

/// Overrides read from `STRESSCHECK_*` variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    pub limit: Option<String>,
    pub concurrent: Option<usize>,
    pub concurrent_iterations: Option<usize>,
    pub stress: Option<usize>,
    pub verbose: Option<bool>,
    pub skip_teardown: Option<bool>,
    pub stop_on_failure: Option<bool>,
    pub api_public: Option<String>,
    pub api_private: Option<String>,
    pub token: Option<String>,
    pub namespace: Option<String>,
    pub test_config: Option<String>,
    pub format: Option<String>,
    /// Explicit configuration file
    pub config_file: Option<String>,
}

impl EnvConfig {
    /// Load overrides from environment variables
    pub fn load() -> Self {
        Self {
            limit: get_env("LIMIT"),
            concurrent: get_env_parse("CONCURRENT"),
            concurrent_iterations: get_env_parse("CONCURRENT_ITERATIONS"),
            stress: get_env_parse("STRESS"),
            verbose: get_env_bool("VERBOSE"),
            skip_teardown: get_env_bool("SKIP_TEARDOWN"),
            stop_on_failure: get_env_bool("STOP_ON_FAILURE"),
            api_public: get_env("API_PUBLIC"),
            api_private: get_env("API_PRIVATE"),
            token: get_env("TOKEN"),
            namespace: get_env("NAMESPACE"),
            test_config: get_env("TEST_CONFIG"),
            format: get_env("FORMAT"),
            config_file: get_env("CONFIG"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.limit.is_some()
            || self.concurrent.is_some()
            || self.concurrent_iterations.is_some()
            || self.stress.is_some()
            || self.verbose.is_some()
            || self.skip_teardown.is_some()
            || self.stop_on_failure.is_some()
            || self.api_public.is_some()
            || self.api_private.is_some()
            || self.token.is_some()
            || self.namespace.is_some()
            || self.test_config.is_some()
            || self.format.is_some()
            || self.config_file.is_some()
    }

    /// Apply the overrides that are set
    pub fn apply(&self, config: &mut RunnerConfig) -> Result<(), String> {
        if let Some(limit) = &self.limit {
            config.limit = parse_duration(limit)?;
        }
        if let Some(concurrent) = self.concurrent {
            config.concurrent = concurrent;
        }
        if self.concurrent_iterations.is_some() {
            config.concurrent_iterations = self.concurrent_iterations;
        }
        if let Some(stress) = self.stress {
            config.stress = stress;
        }
        if let Some(verbose) = self.verbose {
            config.verbose = verbose;
        }
        if let Some(skip) = self.skip_teardown {
            config.skip_teardown = skip;
        }
        if let Some(stop) = self.stop_on_failure {
            config.stop_on_failure = stop;
        }
        if self.api_public.is_some() {
            config.api_public = self.api_public.clone();
        }
        if self.api_private.is_some() {
            config.api_private = self.api_private.clone();
        }
        if self.token.is_some() {
            config.token = self.token.clone();
        }
        if self.namespace.is_some() {
            config.namespace = self.namespace.clone();
        }
        if let Some(test_config) = &self.test_config {
            config.test_config = test_config.clone();
        }
        if let Some(format) = &self.format {
            config.format = format.clone();
        }
        Ok(())
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}")).ok()
}

/// Get environment variable and parse to type
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.parse().ok())
}

/// Get environment variable as boolean
fn get_env_bool(name: &str) -> Option<bool> {
    get_env(name).map(|v| {
        matches!(
            v.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on" | "enabled"
        )
    })
}

/// Builder for setting environment variables in tests
#[derive(Default)]
pub struct EnvBuilder {
    vars: Vec<(String, String)>,
}

impl EnvBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `STRESSCHECK_<name>`
    pub fn var(mut self, name: &str, value: impl Into<String>) -> Self {
        self.vars.push((format!("{ENV_PREFIX}_{name}"), value.into()));
        self
    }

    /// Apply and return guard that restores on drop
    pub fn apply_scoped(self) -> EnvGuard {
        let previous: Vec<_> = self
            .vars
            .iter()
            .map(|(k, _)| (k.clone(), env::var(k).ok()))
            .collect();

        for (key, value) in self.vars {
            env::set_var(key, value);
        }

        EnvGuard { previous }
    }
}

/// Guard that restores environment variables on drop
pub struct EnvGuard {
    previous: Vec<(String, Option<String>)>,
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.previous {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
    }
}
