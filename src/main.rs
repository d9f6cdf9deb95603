//! Binary entry point: parses the CLI, initializes logging and runs the
//! relay server until a termination signal arrives.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use wavecast::server::{ServerConfig, WavecastServer};

#[derive(Parser)]
#[command(name = "wavecast", version, about = "Relays a live PCM capture as a growing WAV over HTTP")]
struct Cli {
    /// Network interface to bind to.
    #[clap(long, default_value = "127.0.0.1")]
    host: String,

    /// TCP port for the HTTP server.
    #[clap(long, default_value_t = 3030)]
    port: u16,

    /// Location of the container file. Defaults to
    /// `wavecast-stream.wav` in the system temp directory.
    #[clap(long)]
    container_path: Option<PathBuf>,

    /// Maximum accepted size of one uploaded chunk, in bytes.
    #[clap(long, default_value_t = 8 * 1024 * 1024)]
    max_chunk_bytes: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = ServerConfig {
        host: cli.host,
        port: cli.port,
        container_path: cli
            .container_path
            .unwrap_or_else(|| ServerConfig::default().container_path),
        max_chunk_bytes: cli.max_chunk_bytes,
    };

    let server = WavecastServer::new(config).await;
    server.run().await?;
    Ok(())
}
