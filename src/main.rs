use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::runtime::Runtime;

use transformo_docs::{DocumentProcessor, ProcessOutcome, ServiceConfig, http_handler, logging};

/// Extract text, OCR'd images and tables from uploaded documents
#[derive(Debug, Parser)]
#[command(name = "transformo_docs", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP service (default)
    Serve {
        /// Address to bind, overrides TRANSFORMO_HOST
        #[arg(long)]
        host: Option<IpAddr>,
        /// Port to bind, overrides TRANSFORMO_PORT
        #[arg(long)]
        port: Option<u16>,
    },
    /// Process a local file and print the JSON result
    Extract {
        file: PathBuf,
        #[arg(long)]
        pretty: bool,
    },
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = ServiceConfig::from_env().context("Invalid configuration")?;
    logging::init_logging(&config)?;

    match cli.command.unwrap_or(Command::Serve { host: None, port: None }) {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            let processor = DocumentProcessor::from_config(&config)?;

            // Create a Tokio runtime for the HTTP server
            let rt = Runtime::new()?;
            rt.block_on(http_handler::start_server(processor, &config))?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Extract { file, pretty } => {
            let processor = DocumentProcessor::from_config(&config)?;
            let outcome = processor.process_file(&file)?;

            let json = if pretty {
                serde_json::to_string_pretty(&outcome)?
            } else {
                serde_json::to_string(&outcome)?
            };
            println!("{}", json);

            Ok(match outcome {
                ProcessOutcome::Extracted(_) => ExitCode::SUCCESS,
                ProcessOutcome::Rejected(_) => ExitCode::from(2),
            })
        }
    }
}
