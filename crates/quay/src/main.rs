//! Quay - request-scoped session engine
//!
//! Main entry point for the Quay CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, prelude::*};

mod commands;

use commands::{config, start};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Quay - request-scoped session engine
#[derive(Parser)]
#[command(name = "quay")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file to use instead of discovery
    #[arg(long, global = true, env = "QUAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory for rotating JSON log files (overrides config)
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the demo session server
    Start(start::StartArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

const CRATES: &[&str] = &["quay", "quay_session", "quay_server", "quay_config"];

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let ctx = commands::Context {
        config_path: cli.config.clone(),
        json_output: cli.json,
        verbose: cli.verbose,
    };

    // Config errors are reported by the command itself.
    let log_dir = cli.log_dir.clone().or_else(|| {
        ctx.load_config()
            .ok()
            .and_then(|loaded| loaded.config.logging().dir)
    });
    let _guard = init_tracing(cli.verbose, log_dir);

    match cli.command {
        Commands::Start(args) => start::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}

/// Console output on stderr, plus a daily-rotated JSON file when a log
/// directory is configured. `RUST_LOG` overrides the console filter.
fn init_tracing(verbose: bool, log_dir: Option<PathBuf>) -> Option<WorkerGuard> {
    let level = if verbose { "debug" } else { "info" };
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directives(level, "tower_http=warn,warn")));

    let console = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    let (file, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "quay.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_filter(EnvFilter::new(directives("trace", "tower_http=debug,info")));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry().with(console).with(file).init();
    guard
}

fn directives(level: &str, rest: &str) -> String {
    let mut out: Vec<String> = CRATES.iter().map(|c| format!("{}={}", c, level)).collect();
    out.push(rest.to_string());
    out.join(",")
}
