//! tq - admission-controlled task scheduler
//!
//! CLI entry point: runs simulated I/O work through the scheduler and prints
//! how the queue evolves.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use clap::Parser;
use colored::*;
use eyre::{Context, Result, bail, eyre};
use futures::future::join_all;
use rand::Rng;
use serde_json::{Value, json};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

use taskqueue::cli::{Cli, Command};
use taskqueue::config::Config;
use taskqueue::{EventLogEntry, Scheduler, StatusProfile, Task, TaskStatus};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level).map(str::to_uppercase).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("INFO") | None => tracing::Level::INFO,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        Some(other) => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
            tracing::Level::INFO
        }
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .try_init()
        .map_err(|e| eyre!("Failed to install tracing subscriber: {}", e))?;

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

/// Sleep for `args[0]` milliseconds, then fail if `args[1]` is true
async fn simulated_io(task: Task, args: Vec<Value>) -> Result<u64> {
    let delay_ms = args.first().and_then(Value::as_u64).unwrap_or(0);
    let should_fail = args.get(1).and_then(Value::as_bool).unwrap_or(false);
    debug!(id = %task.id(), delay_ms, should_fail, "simulated_io: called");

    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    if should_fail {
        bail!("simulated failure in {}", task.name());
    }
    Ok(delay_ms)
}

fn render(profile: &StatusProfile) -> String {
    if profile.is_empty() {
        return "(empty)".dimmed().to_string();
    }
    profile
        .iter()
        .map(|(status, names)| {
            let label = match status {
                TaskStatus::New => status.to_string().dimmed(),
                TaskStatus::Active => status.to_string().yellow(),
                TaskStatus::Done => status.to_string().green(),
                TaskStatus::Error => status.to_string().red(),
            };
            format!("{}: [{}]", label, names.join(", "))
        })
        .collect::<Vec<_>>()
        .join("  ")
}

struct RunOptions {
    tasks: usize,
    max_concurrency: Option<usize>,
    delay_ms: u64,
    step_ms: u64,
    jitter_ms: u64,
    fail: Vec<usize>,
    events: bool,
}

async fn cmd_run(config: &Config, opts: RunOptions) -> Result<()> {
    debug!(tasks = opts.tasks, max_concurrency = ?opts.max_concurrency, "cmd_run: called");
    let mut scheduler_config = config.scheduler.clone();
    if let Some(max_concurrency) = opts.max_concurrency {
        scheduler_config.max_concurrency = max_concurrency;
    }
    let scheduler = Scheduler::with_config(scheduler_config).context("Invalid scheduler configuration")?;

    if opts.events {
        let mut rx = scheduler.events();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => match serde_json::to_string(&EventLogEntry::new(event)) {
                        Ok(line) => println!("{}", line.dimmed()),
                        Err(e) => debug!(error = %e, "cmd_run: failed to render event"),
                    },
                    Err(RecvError::Lagged(skipped)) => debug!(skipped, "cmd_run: event stream lagged"),
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    let last: Arc<Mutex<Option<StatusProfile>>> = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&last);
    let subscription = scheduler.subscribe(move |tasks| {
        let profile = StatusProfile::of(tasks);
        let mut last = sink.lock().unwrap_or_else(PoisonError::into_inner);
        if last.as_ref() != Some(&profile) {
            println!("{}", render(&profile));
            *last = Some(profile);
        }
    });

    let delays: Vec<u64> = {
        let mut rng = rand::rng();
        (0..opts.tasks as u64)
            .map(|i| {
                let jitter = if opts.jitter_ms > 0 {
                    rng.random_range(0..=opts.jitter_ms)
                } else {
                    0
                };
                opts.delay_ms + opts.step_ms * i + jitter
            })
            .collect()
    };

    let mut handles = Vec::with_capacity(opts.tasks);
    for (index, delay) in delays.into_iter().enumerate() {
        let position = index + 1;
        let should_fail = opts.fail.contains(&position);
        let handle = scheduler.submit_named(
            format!("task_{}", position),
            simulated_io,
            vec![json!(delay), json!(should_fail)],
        )?;
        handles.push(handle);
    }

    let results = join_all(handles).await;
    subscription.unsubscribe();

    println!();
    let mut failed = 0;
    for result in &results {
        if let Err(e) = result {
            failed += 1;
            match e.report() {
                Some(report) => println!("{} task {}: {:#}", "✗".red(), e.task_id(), report),
                None => println!("{} {}", "✗".red(), e),
            }
        }
    }
    println!(
        "{} {} done, {} failed",
        "✓".green(),
        results.len() - failed,
        failed
    );

    let stats = scheduler.stats().await?;
    println!(
        "peak concurrent: {}  peak queued: {}  started: {}",
        stats.peak_concurrent, stats.peak_queue_depth, stats.total_started
    );

    scheduler.shutdown().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    debug!(command = ?cli.command, "main: dispatching command");

    match cli.command {
        Command::Run {
            tasks,
            max_concurrency,
            delay_ms,
            step_ms,
            jitter_ms,
            fail,
            events,
        } => {
            cmd_run(
                &config,
                RunOptions {
                    tasks,
                    max_concurrency,
                    delay_ms,
                    step_ms,
                    jitter_ms,
                    fail,
                    events,
                },
            )
            .await
        }
        Command::Config => {
            print!("{}", serde_yaml::to_string(&config)?);
            Ok(())
        }
    }
}
