//! Command-line interface
//!
//! Clap-based CLI with three commands: stream a file locally, estimate chunk
//! sizing for a file, and run the HTTP/SSE server.

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

pub mod commands;
mod output;

pub use output::Output;

use crate::config::CloakstreamConfig;
use crate::profile::SystemProfile;

/// Share of cores handed to the row-scanning worker pool.
const SCAN_WORKER_PERCENT: u8 = 75;

/// Cloakstream - chunked file streaming with inline PII masking
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<String>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Minimal output, errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Stream a file locally, scanning and masking PII
    Stream(commands::stream::StreamArgs),
    /// Show chunk sizing for a file without streaming it
    Estimate(commands::estimate::EstimateArgs),
    /// Run the HTTP/SSE streaming server
    Serve(commands::serve::ServeArgs),
}

/// Initialize tracing. `RUST_LOG` wins over the verbosity flags.
fn setup_logging(verbose: u8, quiet: bool) {
    let default_level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("cloakstream={default_level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        setup_logging(self.verbose, self.quiet);

        let workers = SystemProfile::get().scan_workers(SCAN_WORKER_PERCENT);
        if let Err(e) = rayon::ThreadPoolBuilder::new().num_threads(workers).build_global() {
            debug!(workers, "rayon pool already initialized: {e}");
        }

        let output = Output::new(self.verbose > 0, self.quiet);
        let config = CloakstreamConfig::load(self.config.as_deref())?;

        match self.command {
            Some(Commands::Stream(args)) => commands::stream::execute(args, &config, &output),
            Some(Commands::Estimate(args)) => {
                commands::estimate::execute(args, &output)
            }
            Some(Commands::Serve(args)) => commands::serve::execute(args, config).await,
            None => {
                let mut cmd = Cli::command();
                cmd.print_help()?;
                Ok(())
            }
        }
    }
}
