//! Bateman CLI
//!
//! `serve` runs the HTTP endpoint; `evaluate` audits one resume from a file
//! or stdin and prints the result as JSON.

use anyhow::{Context, Result};
use bateman_runtime::{EvaluationRequest, ProcessEnv};
use bateman_server::{build_adapter, config::ServerConfig, init_tracing, start_server};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "bateman")]
#[command(about = "Institutional-grade signal audit for resumes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the roast endpoint over HTTP
    Serve {
        /// Path to the YAML config file
        #[arg(short, long, env = "BATEMAN_CONFIG")]
        config: Option<PathBuf>,

        /// Override the bind address
        #[arg(long, env = "BATEMAN_BIND")]
        bind: Option<String>,

        /// Override the bind port
        #[arg(short, long, env = "BATEMAN_PORT")]
        port: Option<u16>,
    },

    /// Audit one resume and print the result
    Evaluate {
        /// Path to the YAML config file
        #[arg(short, long, env = "BATEMAN_CONFIG")]
        config: Option<PathBuf>,

        /// Resume text file (use - for stdin)
        #[arg(default_value = "-")]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, bind, port } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(bind) = bind {
                config.bind_address = bind;
            }
            if let Some(port) = port {
                config.bind_port = port;
            }
            start_server(config, &ProcessEnv).await?;
        }
        Commands::Evaluate { config, file } => {
            let config = load_config(config.as_deref())?;
            let adapter = build_adapter(&config, &ProcessEnv).context("Failed to build adapter")?;

            let text = read_input(&file)?;
            let request = EvaluationRequest::new(text).context("Resume text is empty")?;

            let result = adapter.evaluate(&request).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<ServerConfig> {
    ServerConfig::load(path).with_context(|| match path {
        Some(path) => format!("Failed to load config: {}", path.display()),
        None => "Failed to load default config".to_string(),
    })
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read stdin")?;
        Ok(buffer)
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read resume: {}", path.display()))
    }
}
