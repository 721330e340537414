//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use anyhow::Result;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::RunConfig;
use crate::environment::EnvSpec;
use crate::utils::logger::LogLevel;

/// Run cucumber scenarios across a pool of workers fed from a shared queue
#[derive(Parser, Debug)]
#[command(name = "parallel-cucumber")]
#[command(version)]
#[command(about = "Run cucumber scenarios across a pool of workers fed from a shared queue")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (YAML or JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Log level (trace, debug, info, warn, error); overrides --debug
    #[arg(long, global = true, value_parser = parse_log_level)]
    pub log_level: Option<LogLevel>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Discover scenarios and run them on a pool of workers
    Run(RunArgs),

    /// List the scenarios a run would execute
    Discover(DiscoverArgs),

    /// Show the environment a worker would receive
    Env(EnvArgs),
}

/// Discovery engine options shared by `run` and `discover`
#[derive(ClapArgs, Debug, Default)]
pub struct DiscoveryArgs {
    /// Executable performing the dry run
    #[arg(long)]
    pub cucumber_command: Option<String>,

    /// Options passed to cucumber before the selection arguments
    #[arg(short = 'o', long, allow_hyphen_values = true)]
    pub cucumber_options: Option<String>,

    /// Scenario selection arguments (paths, --tags, ...)
    #[arg(last = true)]
    pub cucumber_args: Vec<String>,
}

impl DiscoveryArgs {
    pub fn apply(&self, config: &mut RunConfig) {
        if let Some(command) = &self.cucumber_command {
            config.cucumber.command = command.clone();
        }
        if let Some(options) = &self.cucumber_options {
            config.cucumber.options = split_words(options);
        }
    }
}

/// Arguments for run command
#[derive(ClapArgs, Debug, Default)]
pub struct RunArgs {
    /// Number of workers (0 infers it from --env-variables)
    #[arg(short = 'n', long)]
    pub workers: Option<usize>,

    /// Target number of scenarios a worker takes per request
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Seconds between consecutive worker starts
    #[arg(long)]
    pub worker_delay: Option<f64>,

    /// Redis URL of the shared queue
    #[arg(long)]
    pub queue_url: Option<String>,

    /// Name of the shared queue
    #[arg(long)]
    pub queue_name: Option<String>,

    /// Per-worker environment variables (JSON or YAML mapping)
    #[arg(short, long)]
    pub env_variables: Option<String>,

    /// Executable run once per worker
    #[arg(long)]
    pub worker_command: Option<String>,

    /// Arguments passed to the worker before the queue arguments
    #[arg(long, allow_hyphen_values = true)]
    pub worker_args: Option<String>,

    /// Directory for per-worker results files
    #[arg(long)]
    pub results_dir: Option<PathBuf>,

    /// Seed for a reproducible scenario order
    #[arg(long)]
    pub seed: Option<u64>,

    /// Write the run summary as JSON to this file
    #[arg(long)]
    pub summary_file: Option<PathBuf>,

    #[command(flatten)]
    pub discovery: DiscoveryArgs,
}

impl RunArgs {
    /// Override configuration with flags given on the command line
    pub fn apply(&self, config: &mut RunConfig) -> Result<()> {
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(delay) = self.worker_delay {
            config.worker_delay = delay;
        }
        if let Some(url) = &self.queue_url {
            config.queue.url = url.clone();
        }
        if let Some(name) = &self.queue_name {
            config.queue.name = name.clone();
        }
        if let Some(spec) = &self.env_variables {
            config.env_variables = EnvSpec::parse(spec)?;
        }
        if let Some(command) = &self.worker_command {
            config.worker.command = command.clone();
        }
        if let Some(args) = &self.worker_args {
            config.worker.args = split_words(args);
        }
        if let Some(dir) = &self.results_dir {
            config.worker.results_dir = Some(dir.clone());
        }
        self.discovery.apply(config);
        Ok(())
    }
}

/// Arguments for discover command
#[derive(ClapArgs, Debug)]
pub struct DiscoverArgs {
    #[command(flatten)]
    pub discovery: DiscoveryArgs,
}

/// Arguments for env command
#[derive(ClapArgs, Debug)]
pub struct EnvArgs {
    /// Worker index
    #[arg(short, long, default_value = "0")]
    pub index: usize,

    /// Per-worker environment variables (JSON or YAML mapping)
    #[arg(short, long)]
    pub env_variables: Option<String>,
}

fn parse_log_level(s: &str) -> Result<LogLevel, String> {
    LogLevel::from_str(s)
        .ok_or_else(|| format!("unknown log level '{s}' (expected trace, debug, info, warn or error)"))
}

/// Split an option string on whitespace
fn split_words(s: &str) -> Vec<String> {
    s.split_whitespace().map(String::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        let args = Args::parse_from(["parallel-cucumber", "--log-level", "WARN", "discover"]);
        assert_eq!(args.log_level, Some(LogLevel::Warn));

        let args = Args::parse_from(["parallel-cucumber", "discover"]);
        assert_eq!(args.log_level, None);

        let err = Args::try_parse_from(["parallel-cucumber", "--log-level", "loud", "discover"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_run_args_parsing() {
        let args = Args::parse_from([
            "parallel-cucumber",
            "run",
            "-n",
            "4",
            "--batch-size",
            "3",
            "--worker-delay",
            "1.5",
            "-e",
            r#"{"DEVICE": ["a", "b"]}"#,
            "--",
            "features/login.feature",
            "--tags",
            "@smoke",
        ]);
        match args.command {
            Command::Run(run) => {
                assert_eq!(run.workers, Some(4));
                assert_eq!(run.batch_size, Some(3));
                assert_eq!(run.worker_delay, Some(1.5));
                assert_eq!(
                    run.discovery.cucumber_args,
                    vec!["features/login.feature", "--tags", "@smoke"]
                );
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_global_flags() {
        let args = Args::parse_from(["parallel-cucumber", "discover", "--debug"]);
        assert!(args.debug);
        assert!(matches!(args.command, Command::Discover(_)));
    }

    #[test]
    fn test_env_args() {
        let args = Args::parse_from(["parallel-cucumber", "env", "--index", "2"]);
        match args.command {
            Command::Env(env) => {
                assert_eq!(env.index, 2);
                assert!(env.env_variables.is_none());
            }
            _ => panic!("Expected Env command"),
        }
    }

    #[test]
    fn test_apply_overrides_config() {
        let args = Args::parse_from([
            "parallel-cucumber",
            "run",
            "--queue-name",
            "ci-42",
            "--worker-args",
            "--profile ci",
            "-o",
            "-p parallel --strict",
            "-e",
            "FOO: bar",
        ]);
        let Command::Run(run) = args.command else {
            panic!("Expected Run command");
        };

        let mut config = RunConfig::default();
        run.apply(&mut config).unwrap();

        assert_eq!(config.queue.name, "ci-42");
        assert_eq!(config.worker.args, vec!["--profile", "ci"]);
        assert_eq!(config.cucumber.options, vec!["-p", "parallel", "--strict"]);
        assert!(!config.env_variables.is_empty());
        assert_eq!(config.batch_size, 1);
    }

    #[test]
    fn test_apply_rejects_bad_env_variables() {
        let run = RunArgs {
            env_variables: Some("[unclosed".to_string()),
            ..Default::default()
        };
        assert!(run.apply(&mut RunConfig::default()).is_err());
    }
}
