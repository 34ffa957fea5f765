//! Screen Analysis - describe screenshots with a remote LLM or a local model.
//!
//! Serves an HTTP API that accepts an image and a prompt and returns a text
//! description from one of two backends: an Ollama-compatible server or an
//! in-process Pix2Struct screen captioning model.
//!
//! # Usage
//!
//! ```bash
//! # Start the server
//! screen-analysis serve --port 8000
//!
//! # Point at a different Ollama instance
//! OLLAMA_URL=http://gpu-box:11434 screen-analysis serve
//!
//! # View configuration
//! screen-analysis config show
//!
//! # Fetch the local model
//! screen-analysis models download --repo <hf-repo>
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod cli;
mod logging;
mod server;

/// Screen Analysis - describe screenshots with a remote LLM or a local model.
#[derive(Parser, Debug)]
#[command(name = "screen-analysis")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP server
    Serve(cli::serve::ServeArgs),

    /// Manage the local captioning model
    Models(cli::models::ModelsArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so use eprintln for config warnings.
    let config = match cli::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) if cli.config.is_some() => return Err(e.into()),
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `screen-analysis config path`."
            );
            screen_analysis_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Screen Analysis v{}", screen_analysis_core::VERSION);

    match cli.command {
        Commands::Serve(args) => cli::serve::execute(args, config).await,
        Commands::Models(args) => cli::models::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args, cli.config.as_deref()).await,
    }
}
