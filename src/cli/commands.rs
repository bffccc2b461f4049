//! Command handlers

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::{Args, Command, ListArgs, RunArgs};
use crate::config::{find_config_file, EnvConfig, RunnerConfig};
use crate::error::RunError;
use crate::executor::{Context, Scheduler};
use crate::output::{ConsoleReporter, OutputFormat, ResultFormatter};
use crate::platform::Platform;
use crate::registry::{
    select_by_identifiers, select_by_tags, select_by_variants, Registry, Suite,
};
use crate::utils::{init_logger, LogLevel};

/// Parse the process arguments, run the command and map the outcome to an exit code
pub async fn run(registry: Registry) -> ExitCode {
    let args = Args::parse();
    let verbose = matches!(&args.command, Command::Test(r) if r.verbose);
    init_logger(LogLevel::for_verbosity(verbose));

    match execute(&registry, args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

/// Run a parsed command against the registry
pub async fn execute(registry: &Registry, args: Args) -> Result<(), RunError> {
    match args.command {
        Command::Test(run_args) => run_suite(registry, run_args).await,
        Command::List(list_args) => {
            list(registry, &list_args);
            Ok(())
        }
        Command::Version => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Layer file, environment and flags into the runner configuration
pub fn resolve_config(args: &RunArgs) -> Result<RunnerConfig, RunError> {
    let env = EnvConfig::load();

    let path = args
        .config_file
        .clone()
        .or_else(|| env.config_file.clone().map(Into::into))
        .or_else(find_config_file);

    let mut config = match path {
        Some(path) => {
            info!("Using config file {}", path.display());
            RunnerConfig::load(&path).map_err(|e| RunError::Bootstrap(format!("{e:#}")))?
        }
        None => RunnerConfig::default(),
    };

    env.apply(&mut config).map_err(RunError::Bootstrap)?;
    args.apply(&mut config);
    config.validate()?;

    if OutputFormat::from_str(&config.format).is_none() {
        return Err(RunError::Bootstrap(format!(
            "unknown output format: {}",
            config.format
        )));
    }

    Ok(config)
}

/// Narrow the registered tests down to what the flags ask for
pub fn select_suite(registry: &Registry, args: &RunArgs, match_all: bool, verbose: bool) -> Suite {
    let suite = registry.suite();
    let suite = if args.ids.is_empty() {
        select_by_tags(&suite, &args.tags, match_all, verbose)
    } else {
        select_by_identifiers(&suite, &args.ids, verbose)
    };
    select_by_variants(&suite, &args.variants, verbose)
}

async fn run_suite(registry: &Registry, args: RunArgs) -> Result<(), RunError> {
    let config = resolve_config(&args)?;

    let suite = select_suite(registry, &args, config.match_all, config.verbose);
    if suite.is_empty() {
        warn!("No test matches the given filters");
        return Ok(());
    }

    let platform =
        Platform::from_config(&config).map_err(|e| RunError::Bootstrap(format!("{e:#}")))?;

    let format = OutputFormat::from_str(&config.format).unwrap_or(OutputFormat::Table);
    let mut formatter = ResultFormatter::new(format).show_on_success(config.verbose);
    if args.no_color {
        formatter = formatter.no_color();
    }

    let scheduler = Scheduler::new(config.scheduler_config())
        .with_platform(platform)
        .with_reporter(Arc::new(ConsoleReporter::new(formatter)));

    let report = scheduler.execute(&Context::background(), &suite).await?;

    if let Some(path) = &args.output {
        if let Err(e) = report.save(path) {
            error!("Failed to save report: {:#}", e);
        }
    }

    report.outcome()
}

fn list(registry: &Registry, args: &ListArgs) {
    if args.tags {
        for (tag, count) in registry.tags() {
            println!("{tag:20} {count} test(s)");
        }
        return;
    }

    for test in registry.suite().iter() {
        println!("{test}");
    }
}
