//! CLI argument parsing
//!
//! Defines command-line interface using clap.

mod commands;

pub use commands::{execute, resolve_config, run, select_suite};

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{parse_duration, RunnerConfig};

/// Concurrent stress runner for registered integration tests
#[derive(Parser, Debug)]
#[command(name = "stresscheck")]
#[command(about = "Run registered integration tests concurrently, many times over")]
#[command(long_about = None)]
#[command(disable_version_flag = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the registered tests
    #[command(alias = "run")]
    Test(RunArgs),

    /// List registered tests
    #[command(alias = "ls")]
    List(ListArgs),

    /// Print the version and exit
    Version,
}

/// Arguments for list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// List tags with their number of tests instead
    #[arg(long)]
    pub tags: bool,
}

/// Arguments for test command
#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Show logs even on success
    #[arg(short = 'V', long)]
    pub verbose: bool,

    /// Execution time limit (500ms, 30s, 5m, 1h)
    #[arg(short, long, value_parser = parse_duration)]
    pub limit: Option<Duration>,

    /// Max number of concurrent runs
    #[arg(short, long)]
    pub concurrent: Option<usize>,

    /// Max number of concurrent iterations of one run
    #[arg(long)]
    pub concurrent_iterations: Option<usize>,

    /// Number of times to run each test
    #[arg(short, long)]
    pub stress: Option<usize>,

    /// Only run tests with the given identifiers
    #[arg(short = 'i', long = "id", value_delimiter = ',')]
    pub ids: Vec<String>,

    /// Only run tests with the given tags, `~tag` excludes
    #[arg(short = 't', long = "tag", value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Require every tag instead of any
    #[arg(long)]
    pub match_all: bool,

    /// Only run the given variants
    #[arg(short = 'v', long = "variant", value_delimiter = ',')]
    pub variants: Vec<String>,

    /// Skip teardown step
    #[arg(short = 'S', long)]
    pub skip_teardown: bool,

    /// Do not start new runs once one has failed
    #[arg(long)]
    pub stop_on_failure: bool,

    /// Runner configuration file
    #[arg(long)]
    pub config_file: Option<PathBuf>,

    /// Test configuration handed to every test
    #[arg(long = "config")]
    pub test_config: Option<String>,

    /// Base URL of the public API
    #[arg(long)]
    pub api_public: Option<String>,

    /// Base URL of the private API
    #[arg(long)]
    pub api_private: Option<String>,

    /// Access token
    #[arg(long)]
    pub token: Option<String>,

    /// Namespace the tests run in
    #[arg(long, alias = "account")]
    pub namespace: Option<String>,

    /// Output format (table, json, json-pretty, csv)
    #[arg(short, long)]
    pub format: Option<String>,

    /// Write the suite report to this file as JSON
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Disable colours
    #[arg(long)]
    pub no_color: bool,
}

impl RunArgs {
    /// Apply the flags that were given
    pub fn apply(&self, config: &mut RunnerConfig) {
        if self.verbose {
            config.verbose = true;
        }
        if let Some(limit) = self.limit {
            config.limit = limit;
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
        if self.match_all {
            config.match_all = true;
        }
        if self.skip_teardown {
            config.skip_teardown = true;
        }
        if self.stop_on_failure {
            config.stop_on_failure = true;
        }
        if let Some(test_config) = &self.test_config {
            config.test_config = test_config.clone();
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
        if let Some(format) = &self.format {
            config.format = format.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::parse_from(["stresscheck", "ls", "--tags"]);
        match args.command {
            Command::List(list_args) => assert!(list_args.tags),
            _ => panic!("Expected List command"),
        }
    }

    #[test]
    fn test_run_args() {
        let args = Args::parse_from([
            "stresscheck",
            "run",
            "-V",
            "-l",
            "90s",
            "-s",
            "10",
            "-t",
            "suite1,~slow",
            "-v",
            "base",
            "-S",
            "--account",
            "/acme",
        ]);
        match args.command {
            Command::Test(run) => {
                assert!(run.verbose);
                assert_eq!(run.limit, Some(Duration::from_secs(90)));
                assert_eq!(run.stress, Some(10));
                assert_eq!(run.tags, vec!["suite1", "~slow"]);
                assert_eq!(run.variants, vec!["base"]);
                assert!(run.skip_teardown);
                assert_eq!(run.namespace.as_deref(), Some("/acme"));
            }
            _ => panic!("Expected Test command"),
        }
    }

    #[test]
    fn test_flags_override_config() {
        let args = RunArgs {
            concurrent: Some(3),
            stop_on_failure: true,
            ..RunArgs::default()
        };
        let mut config = RunnerConfig {
            concurrent: 10,
            stress: 7,
            ..RunnerConfig::default()
        };
        args.apply(&mut config);
        assert_eq!(config.concurrent, 3);
        assert_eq!(config.stress, 7);
        assert!(config.stop_on_failure);
    }

    #[test]
    fn test_invalid_limit_rejected() {
        assert!(Args::try_parse_from(["stresscheck", "test", "-l", "soon"]).is_err());
    }
}
