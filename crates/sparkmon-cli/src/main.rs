//! CLI for sparkmon: a live sparkline grid of system counters.

mod commands;
mod tui;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sparkmon")]
#[command(about = "sparkmon: live sparkline grid of system counters")]
#[command(version = sparkmon_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive sparkline grid of every configured counter
    Monitor {
        /// JSON layout file (defaults to CPU, memory, network and disks)
        #[arg(long)]
        config: Option<String>,

        /// Refresh period in seconds, overriding the layout file
        #[arg(long)]
        refresh: Option<f64>,
    },

    /// Tick without a terminal UI and print every slot after each tick
    Watch {
        /// JSON layout file (defaults to CPU, memory, network and disks)
        #[arg(long)]
        config: Option<String>,

        /// Refresh period in seconds, overriding the layout file
        #[arg(long)]
        refresh: Option<f64>,

        /// Stop after this many ticks (default: until Ctrl+C)
        #[arg(long)]
        ticks: Option<u64>,

        /// Print one JSON object per tick instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Expand a counter path and print each concrete counter with a reading.
    /// Example: sparkmon scan '\\.\Processor(#ALL#)\% Processor Time'
    Scan {
        /// Counter path: \\<machine>\<category>(<instance>)\<counter>
        path: String,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Monitor { config, refresh } => {
            commands::monitor::run(config.as_deref(), refresh);
        }
        Commands::Watch {
            config,
            refresh,
            ticks,
            json,
        } => commands::watch::run(config.as_deref(), refresh, ticks, json),
        Commands::Scan { path } => commands::scan::run(&path),
    }
}
