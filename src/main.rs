//! parallel-cucumber - run cucumber scenarios on a pool of workers
//!
//! Discovers every scenario with a cucumber dry run, pushes them to a shared
//! Redis queue, and starts worker processes that drain the queue
//! concurrently. The outcomes reported by all workers decide the exit code.
//!
//! ## Usage
//!
//! ```bash
//! # Four workers, each pulling two scenarios at a time
//! parallel-cucumber run -n 4 --batch-size 2 -- features/ --tags @smoke
//!
//! # One worker per device, inferred from the env_variables sequence
//! parallel-cucumber run -e '{"DEVICE": ["emulator-5554", "emulator-5556"]}'
//!
//! # List the scenarios a run would execute
//! parallel-cucumber discover -- features/
//!
//! # Show what worker 1 would see
//! parallel-cucumber env --index 1 -e '{"PORT": {"1": 4724}}'
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

mod cli;
mod config;
mod discovery;
mod environment;
mod executor;
mod models;
mod orchestrator;
mod queue;
mod results;
mod utils;

use cli::Args;
use config::{EnvConfig, RunConfig};
use discovery::{CucumberDiscovery, Discovery};
use environment::EnvSpec;
use executor::{ProcessWorker, QueueParams, WorkerPool};
use orchestrator::{Orchestrator, RunOptions};
use queue::RedisQueue;
use results::StoredRun;
use utils::logger::{init_logger, LogLevel};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = load_config(&args);
    let debug = args.debug || config.as_ref().map(|c| c.debug).unwrap_or(false);
    let level = args
        .log_level
        .unwrap_or_else(|| LogLevel::from_debug_flag(debug));
    init_logger(level);

    let code = match config {
        Ok(config) => execute(args.command, config).await.unwrap_or_else(|e| {
            error!("{e:#}");
            1
        }),
        Err(e) => {
            error!("{e:#}");
            1
        }
    };

    std::process::exit(code);
}

/// Defaults, then config file, then `PARALLEL_CUCUMBER_*` variables
fn load_config(args: &Args) -> Result<RunConfig> {
    let mut config = RunConfig::load_or_default(args.config.as_deref())?;
    config.apply_env(&EnvConfig::load());
    Ok(config)
}

async fn execute(command: cli::Command, mut config: RunConfig) -> Result<i32> {
    match command {
        cli::Command::Run(run_args) => {
            run_args.apply(&mut config)?;
            config.validate()?;
            run(
                config,
                run_args.discovery.cucumber_args,
                run_args.seed,
                run_args.summary_file,
            )
            .await
        }
        cli::Command::Discover(discover_args) => {
            discover_args.discovery.apply(&mut config);
            list_scenarios(&config, &discover_args.discovery.cucumber_args).await
        }
        cli::Command::Env(env_args) => {
            let spec = match &env_args.env_variables {
                Some(text) => EnvSpec::parse(text)?,
                None => config.env_variables,
            };
            show_env(&spec, env_args.index)
        }
    }
}

fn discovery_for(config: &RunConfig) -> CucumberDiscovery {
    CucumberDiscovery::new(&config.cucumber.command).with_options(config.cucumber.options.clone())
}

async fn run(
    config: RunConfig,
    selection_args: Vec<String>,
    seed: Option<u64>,
    summary_file: Option<PathBuf>,
) -> Result<i32> {
    let queue = RedisQueue::connect(&config.queue.url, &config.queue.name)
        .await
        .context("Failed to connect to queue")?;

    // Held until the run is over; removes the directory on drop
    let mut temp_dir = None;
    let results_dir = match &config.worker.results_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
            dir.clone()
        }
        None => {
            let dir = tempfile::Builder::new()
                .prefix("parallel-cucumber-")
                .tempdir()
                .context("Failed to create results directory")?;
            temp_dir.insert(dir).path().to_path_buf()
        }
    };
    debug!("Worker results go to {}", results_dir.display());

    let worker = ProcessWorker::new(
        &config.worker.command,
        QueueParams {
            url: config.queue.url.clone(),
            name: config.queue.name.clone(),
        },
        results_dir,
    )
    .with_args(config.worker.args.clone());

    let pool = WorkerPool::new(Arc::new(worker))
        .with_delay(Duration::from_secs_f64(config.worker_delay));

    let orchestrator = Orchestrator::new(
        Arc::new(queue),
        Box::new(discovery_for(&config)),
        pool,
        config.env_variables.clone(),
        RunOptions {
            selection_args,
            workers: config.workers,
            batch_size: config.batch_size,
            seed,
        },
    );

    let code = match orchestrator.run().await {
        Ok(report) => {
            if let Some(path) = summary_file {
                if let Err(e) = StoredRun::from_report(&report).save(&path) {
                    error!("{e:#}");
                }
            }
            report.exit_code()
        }
        Err(e) => {
            error!("{}", e);
            e.exit_code()
        }
    };

    drop(temp_dir);
    Ok(code)
}

async fn list_scenarios(config: &RunConfig, selection_args: &[String]) -> Result<i32> {
    let scenarios = discovery_for(config).discover(selection_args).await?;

    for scenario in &scenarios {
        println!("{scenario}");
    }
    debug!("Discovered {} scenarios", scenarios.len());

    Ok(0)
}

fn show_env(spec: &EnvSpec, index: usize) -> Result<i32> {
    let env = environment::derive(spec, index)?;

    for (name, value) in &env {
        println!("{name}={value}");
    }

    Ok(0)
}
