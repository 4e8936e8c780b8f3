use std::path::PathBuf;

use clap::{Parser, Subcommand};
use passage::config::{Configuration, DEFAULT_CONFIG_PATH};
use passage::telemetry::{self, LogFormat};
use passage::{app, initialize_state, keys};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log output, `json` or `text`.
    #[arg(long, global = true, default_value = "text")]
    log_format: LogFormat,
    /// Log level, overridden by `RUST_LOG`.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// Start the HTTP server.
    Serve {
        #[arg(long, short, env = "PASSAGE_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
    /// Write a new RSA key pair in PEM format.
    GenerateKeys {
        /// Output file for the private key.
        #[arg(long, short = 'p')]
        private: PathBuf,
        /// Output file for the public key.
        #[arg(long, short = 'k')]
        public: PathBuf,
        #[arg(long, default_value_t = keys::DEFAULT_BITS)]
        bits: usize,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    telemetry::setup_tracing(args.log_format, &args.log_level)?;

    match args.cmd {
        Commands::Serve { config } => serve(config).await,
        Commands::GenerateKeys {
            private,
            public,
            bits,
        } => Ok(keys::write(&private, &public, bits)?),
    }
}

async fn serve(path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = Configuration::default()
        .path(path)
        .read()?
        .with_env(|name| std::env::var(name).ok());
    let address = config.address.clone();

    let metrics = telemetry::setup_metrics_recorder()?;
    let state = initialize_state(config, Some(metrics)).await?;

    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(%address, "server started");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "cannot listen for shutdown signal");
    }
}
