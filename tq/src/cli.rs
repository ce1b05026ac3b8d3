//! CLI argument parsing for tq

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tq")]
#[command(author, version, about = "Admission-controlled async task scheduler", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run simulated I/O tasks through the scheduler and print each queue profile
    Run {
        /// Number of tasks to submit
        #[arg(short, long, default_value = "6")]
        tasks: usize,

        /// Max tasks running at once (default: from config)
        #[arg(short, long)]
        max_concurrency: Option<usize>,

        /// Delay of the first task in milliseconds
        #[arg(short, long, default_value = "100")]
        delay_ms: u64,

        /// Extra delay added per task, in milliseconds
        #[arg(short, long, default_value = "50")]
        step_ms: u64,

        /// Random extra delay up to this many milliseconds
        #[arg(short, long, default_value = "0")]
        jitter_ms: u64,

        /// 1-based positions of tasks that should fail
        #[arg(short, long, value_delimiter = ',')]
        fail: Vec<usize>,

        /// Print lifecycle events as JSON lines
        #[arg(short, long)]
        events: bool,
    },

    /// Print the effective configuration as YAML
    Config,
}
