//! mirrorsync - one-way mirroring of a media tree onto backup drives
//!
//! Every configured destination is compared against the source by
//! modification time; new and newer files are copied, files missing from the
//! source are deleted. Each run can be previewed, applied, and recorded in a
//! JSON sync log.

mod display;
mod json_output;
mod progress;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use console::style;
use dialoguer::{theme::ColorfulTheme, Input};
use display::{
    create_spinner, display_apply_result, display_destination_header, display_error,
    display_info, display_overview, display_success, display_summary, display_warning,
    ConsoleNotifier,
};
use json_output::RunResultJson;
use mirrorsync_config::{Config, ConfigBuilder, ConfigLoader};
use mirrorsync_engine::{ApplyControl, DestinationReport, RunMode, SyncRunner};
use progress::ApplyProgressBar;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};

/// mirrorsync - one-way directory mirroring
#[derive(Parser, Debug)]
#[command(
    name = "mirrorsync",
    version = env!("CARGO_PKG_VERSION"),
    about = "One-way mirroring of a source tree onto backup destinations",
    long_about = "mirrorsync compares a source tree with each backup destination,\n\
                  copies new and updated files, removes files that no longer exist\n\
                  in the source, and records every run in a JSON sync log."
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Verbose mode - detailed output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print a JSON report instead of the console summary
    #[arg(long, global = true)]
    json: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show pending changes and write a sync log; destinations are not touched
    Preview(PathArgs),
    /// Apply pending changes without writing a sync log
    Sync(PathArgs),
    /// Write a sync log, then apply pending changes
    SyncAndLog(PathArgs),
    /// Choose what to do for every destination after seeing its summary
    Run(PathArgs),
    /// Show configuration
    Config {
        /// Write a default configuration file to this path
        #[arg(long, value_name = "PATH")]
        init: Option<PathBuf>,
        /// Show the built-in defaults instead of the effective configuration
        #[arg(long)]
        default: bool,
    },
}

/// Overrides applied on top of the configuration file
#[derive(Args, Debug, Clone, Default)]
struct PathArgs {
    /// Source tree
    #[arg(short, long)]
    source: Option<PathBuf>,
    /// Destination tree (repeat for several destinations)
    #[arg(long = "dest", value_name = "DEST")]
    destinations: Vec<PathBuf>,
    /// Workers per task category
    #[arg(short, long)]
    workers: Option<usize>,
    /// Directory for sync logs
    #[arg(long)]
    log_dir: Option<PathBuf>,
    /// Fail a single copy or delete after this many seconds
    #[arg(long, value_name = "SECONDS")]
    task_timeout: Option<u64>,
}

impl PathArgs {
    fn apply_to(&self, mut builder: ConfigBuilder) -> ConfigBuilder {
        if let Some(source) = &self.source {
            builder = builder.source_root(source);
        }
        if !self.destinations.is_empty() {
            builder = builder.destinations(&self.destinations);
        }
        if let Some(workers) = self.workers {
            builder = builder.workers(workers);
        }
        if let Some(log_dir) = &self.log_dir {
            builder = builder.log_dir(log_dir);
        }
        if let Some(secs) = self.task_timeout {
            builder = builder.task_timeout_secs(secs);
        }
        builder
    }
}

/// How destinations are processed
#[derive(Debug, Clone, Copy)]
enum Dispatch {
    /// The same mode for every destination
    Fixed(RunMode),
    /// Ask after each summary
    Interactive,
}

/// Console flags shared by every command
#[derive(Debug, Clone, Copy)]
struct Output {
    quiet: bool,
    json: bool,
}

impl Output {
    /// No human-readable output at all
    fn silent(self) -> bool {
        self.quiet || self.json
    }
}

/// Log level flags from the command line
#[derive(Debug, Clone, Copy)]
struct Verbosity {
    debug: bool,
    verbose: bool,
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let Cli {
        debug,
        quiet,
        verbose,
        json,
        config: config_path,
        command,
    } = Cli::parse();
    let output = Output { quiet, json };
    let verbosity = Verbosity {
        debug,
        verbose,
        quiet: output.silent(),
    };

    let (args, dispatch, operation) = match command {
        Commands::Config { init, default } => {
            init_logging(verbosity, None)?;
            config_command(config_path.as_deref(), init, default)?;
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Preview(args) => (args, Dispatch::Fixed(RunMode::Preview), "preview"),
        Commands::Sync(args) => (args, Dispatch::Fixed(RunMode::Sync), "sync"),
        Commands::SyncAndLog(args) => (args, Dispatch::Fixed(RunMode::SyncAndLog), "sync-and-log"),
        Commands::Run(args) => (args, Dispatch::Interactive, "run"),
    };

    let config = load_config(config_path.as_deref(), &args)?;
    init_logging(verbosity, Some(&config))?;

    info!("mirrorsync v{} starting", env!("CARGO_PKG_VERSION"));

    let source = config.source_root.display().to_string();
    let reports = run_command(config, dispatch, output).await?;

    if output.json {
        let report = RunResultJson::new(source, operation, &reports);
        println!("{}", report.to_json_string()?);
    } else if !output.quiet {
        display_overview(&reports);
    }

    if reports.iter().all(DestinationReport::is_success) {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn load_config(path: Option<&Path>, args: &PathArgs) -> Result<Config> {
    let builder = match path {
        Some(path) => ConfigLoader::file_builder(path)?,
        None => ConfigLoader::default_builder(),
    };

    args.apply_to(builder)
        .build()
        .context("Invalid configuration")
}

fn init_logging(verbosity: Verbosity, config: Option<&Config>) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let configured = config.map_or("warn", |c| c.logging.level.as_str());
    let level = if verbosity.debug {
        "debug"
    } else if verbosity.verbose {
        "info"
    } else if verbosity.quiet {
        "error"
    } else {
        configured
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Invalid log filter")?;

    let json_format = config.is_some_and(|c| c.logging.json_format);
    let colored = config.map_or(true, |c| c.logging.colored_output);

    // Logs go to stderr so a JSON report on stdout stays parseable
    let result = if json_format {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
    } else {
        fmt()
            .with_env_filter(filter)
            .with_ansi(colored)
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_writer(std::io::stderr)
            .try_init()
    };

    result.map_err(|e| anyhow!("Failed to initialize logging: {}", e))
}

async fn run_command(
    config: Config,
    dispatch: Dispatch,
    output: Output,
) -> Result<Vec<DestinationReport>> {
    let progress = Arc::new(ApplyProgressBar::new(output.silent()));
    let control = ApplyControl::new().with_progress(progress.clone());

    let cancel = control.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight tasks");
            cancel.cancel();
        }
    });

    let runner = SyncRunner::new(config)
        .with_notifier(Arc::new(ConsoleNotifier::new(output.silent())))
        .with_control(control);

    let destinations = runner.config().destinations.clone();
    let mut reports = Vec::with_capacity(destinations.len());

    for destination in &destinations {
        if !output.silent() {
            display_destination_header(destination);
        }

        let spinner = create_spinner("Scanning source and destination...", output.silent());
        let plan = runner.plan(destination).await;
        if let Some(spinner) = spinner {
            spinner.finish_and_clear();
        }

        let plan = match plan {
            Ok(plan) => plan,
            Err(e) => {
                if !output.silent() {
                    display_error(&format!("{}: {}", destination.display(), e));
                }
                let mode = match dispatch {
                    Dispatch::Fixed(mode) => mode,
                    Dispatch::Interactive => RunMode::Preview,
                };
                reports.push(DestinationReport {
                    destination: destination.clone(),
                    mode,
                    outcome: Err(e),
                });
                continue;
            }
        };

        if !output.silent() {
            display_summary(&plan.summary, &plan.skipped);
        }

        let mode = match dispatch {
            Dispatch::Fixed(mode) => mode,
            Dispatch::Interactive => match prompt_mode()? {
                Some(mode) => mode,
                None => {
                    if !output.silent() {
                        display_info(&format!("Skipping {}", destination.display()));
                    }
                    continue;
                }
            },
        };

        progress.reset();
        let outcome = runner.execute(&plan, mode).await;
        progress.finish_and_clear();

        if !output.silent() {
            match &outcome {
                Ok(run) => {
                    if let Some(log_path) = &run.log_path {
                        display_success(&format!("Log saved to {}", log_path.display()));
                    }
                    if let Some(result) = &run.apply {
                        display_apply_result(result);
                        if !result.cancelled.is_empty() {
                            display_warning("Run was interrupted; rerun to finish the mirror");
                        }
                    }
                }
                Err(e) => display_error(&format!("{}: {}", destination.display(), e)),
            }
        }

        reports.push(DestinationReport {
            destination: destination.clone(),
            mode,
            outcome,
        });
    }

    Ok(reports)
}

fn prompt_mode() -> Result<Option<RunMode>> {
    println!();
    println!("{}", style("Options:").bold());
    println!("  1 - Proceed with sync");
    println!("  2 - Save preview log only");
    println!("  3 - Sync and save log");

    let choice: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt("Choose an option")
        .allow_empty(true)
        .interact_text()?;

    Ok(RunMode::from_choice(&choice))
}

fn config_command(path: Option<&Path>, init: Option<PathBuf>, default: bool) -> Result<()> {
    if let Some(target) = init {
        if target.exists() {
            return Err(anyhow!("'{}' already exists", target.display()));
        }
        ConfigLoader::generate_default_config(&target)?;
        display_success(&format!(
            "Default configuration written to {}",
            target.display()
        ));
        return Ok(());
    }

    let config = if default {
        println!("{} Default configuration:", style("⚙").blue().bold());
        Config::default()
    } else {
        println!("{} Current configuration:", style("⚙").blue().bold());
        let builder = match path {
            Some(path) => ConfigLoader::file_builder(path)?,
            None => ConfigLoader::default_builder(),
        };
        let config = builder.build_unvalidated()?;
        if let Err(e) = ConfigBuilder::validate(&config) {
            display_warning(&e.to_string());
        }
        config
    };

    print!("{}", serde_yaml::to_string(&config)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sync_with_overrides() {
        let cli = Cli::try_parse_from([
            "mirrorsync",
            "sync",
            "--source",
            "/media/camera",
            "--dest",
            "/backup/h",
            "--dest",
            "/backup/i",
            "--workers",
            "8",
        ])
        .unwrap();

        let Commands::Sync(args) = cli.command else {
            panic!("expected sync");
        };
        assert_eq!(args.source, Some(PathBuf::from("/media/camera")));
        assert_eq!(args.destinations.len(), 2);
        assert_eq!(args.workers, Some(8));
        assert!(args.log_dir.is_none());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["mirrorsync", "preview", "--json", "-q"]).unwrap();
        assert!(cli.json);
        assert!(cli.quiet);
        assert!(matches!(cli.command, Commands::Preview(_)));
    }

    #[test]
    fn test_sync_and_log_subcommand_name() {
        let cli = Cli::try_parse_from(["mirrorsync", "sync-and-log"]).unwrap();
        assert!(matches!(cli.command, Commands::SyncAndLog(_)));
    }

    #[test]
    fn test_unknown_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["mirrorsync", "mirror"]).is_err());
    }

    #[test]
    fn test_overrides_reach_config() {
        let temp = tempfile::TempDir::new().unwrap();
        let file = temp.path().join("mirrorsync.yaml");
        std::fs::write(&file, "source_root: /media\ndestinations: [/backup/h]\n").unwrap();

        let args = PathArgs {
            destinations: vec![PathBuf::from("/backup/x")],
            workers: Some(2),
            task_timeout: Some(30),
            ..PathArgs::default()
        };
        let config = load_config(Some(&file), &args).unwrap();

        assert_eq!(config.source_root, PathBuf::from("/media"));
        assert_eq!(config.destinations, vec![PathBuf::from("/backup/x")]);
        assert_eq!(config.workers.get(), 2);
        assert_eq!(config.task_timeout_secs, Some(30));
    }
}
