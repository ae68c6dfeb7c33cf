// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Ticketpress — batch event-ticket PDF composition.
//
// Entry point. Initialises logging, loads configuration and dispatches to
// the requested command.

mod services;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

use services::config::{ConfigOverrides, load_config};
use services::render::{read_request, render};

#[derive(Parser)]
#[command(name = "ticketpress")]
#[command(author, version, about = "Compose event tickets into one PDF", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: OverrideArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct OverrideArgs {
    /// Maximum tickets per batch
    #[arg(long, global = true)]
    max_batch_size: Option<usize>,

    /// Records processed at once
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Batch deadline in seconds
    #[arg(long, global = true, conflicts_with = "no_deadline")]
    deadline_secs: Option<u64>,

    /// Let batches run without a deadline
    #[arg(long, global = true)]
    no_deadline: bool,
}

impl From<OverrideArgs> for ConfigOverrides {
    fn from(args: OverrideArgs) -> Self {
        Self {
            max_batch_size: args.max_batch_size,
            concurrency: args.concurrency,
            deadline_secs: args.deadline_secs,
            no_deadline: args.no_deadline,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Render a ticket request (batch or single) into a PDF
    Render {
        /// Request JSON file, or `-` for stdin
        input: PathBuf,

        /// Directory the PDF is written to
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,
    },

    /// Print the effective configuration as JSON
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref(), &cli.overrides.into()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "configuration rejected");
            return ExitCode::from(2);
        }
    };

    match cli.command {
        Commands::Config => match serde_json::to_string_pretty(&config) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                tracing::error!(error = %e, "cannot serialise configuration");
                ExitCode::FAILURE
            }
        },
        Commands::Render { input, out_dir } => {
            tracing::info!(input = %input.display(), "Ticketpress starting");
            let report = match read_request(&input) {
                Ok(request) => render(request, &out_dir, config).await,
                Err(e) => Err(e),
            };
            match report {
                Ok(report) => {
                    match serde_json::to_string_pretty(&report) {
                        Ok(json) => println!("{json}"),
                        Err(e) => tracing::error!(error = %e, "cannot serialise outcome"),
                    }
                    if report.produced_document() {
                        ExitCode::SUCCESS
                    } else {
                        ExitCode::FAILURE
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "batch rejected");
                    println!("{}", serde_json::json!({ "error": e.to_string() }));
                    ExitCode::from(2)
                }
            }
        }
    }
}
