//! CLI for netcount — per-interface byte totals that survive counter wraps.

mod commands;
mod tui;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "netcount")]
#[command(about = "netcount — wrap-corrected byte totals and rates for every network interface")]
#[command(version = netcount_core::VERSION)]
struct Cli {
    /// Replay an interface table written by `netcount dump` instead of reading the kernel
    #[arg(long, global = true)]
    from: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample the interface table periodically and print totals and rates
    Watch {
        /// Seconds between samples
        #[arg(long, default_value = "2.0")]
        interval: f64,

        /// Samples further apart than this many seconds report a rate of zero
        #[arg(long, default_value = "60")]
        stale_after: f64,

        /// Number of cycles to run (0 = until Ctrl+C)
        #[arg(long, default_value = "0")]
        count: u64,

        /// Output format
        #[arg(long, default_value = "table", value_parser = ["table", "json"])]
        format: String,
    },

    /// Capture the interface table once and print the raw counters
    List {
        /// Output format
        #[arg(long, default_value = "table", value_parser = ["table", "json"])]
        format: String,
    },

    /// Write the raw interface table to a file for later replay with --from
    Dump {
        /// Output path
        #[arg(default_value = "iflist.bin")]
        path: PathBuf,
    },

    /// Live interactive interface dashboard (TUI)
    Monitor {
        /// Refresh rate in seconds
        #[arg(long, default_value = "2.0")]
        refresh: f64,

        /// Samples further apart than this many seconds report a rate of zero
        #[arg(long, default_value = "60")]
        stale_after: f64,
    },

    /// Serve totals and rates over HTTP as JSON
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "8043")]
        port: u16,

        /// Bind address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Seconds between samples
        #[arg(long, default_value = "2.0")]
        interval: f64,

        /// Samples further apart than this many seconds report a rate of zero
        #[arg(long, default_value = "60")]
        stale_after: f64,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let from = cli.from.as_deref();

    match cli.command {
        Commands::Watch {
            interval,
            stale_after,
            count,
            format,
        } => commands::watch::run(commands::watch::WatchCommandConfig {
            from,
            interval,
            stale_after,
            count,
            format: &format,
        }),
        Commands::List { format } => commands::list::run(from, &format),
        Commands::Dump { path } => commands::dump::run(from, &path),
        Commands::Monitor {
            refresh,
            stale_after,
        } => commands::monitor::run(from, refresh, stale_after),
        Commands::Serve {
            port,
            host,
            interval,
            stale_after,
        } => commands::serve::run(from, &host, port, interval, stale_after),
    }
}
