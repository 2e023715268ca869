use clap::Parser;
use relcore::config::EngineConfig;
use relcore::engine::Engine;
use relcore::protocol::pool_for;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "relcore-server")]
#[command(about = "relcore wire-protocol server")]
struct Cli {
    /// Path to a TOML properties file (spec §6). Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<String>,

    /// Overrides the configured listen port.
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(port) = cli.port {
        config.jdbc_server_port = port;
    }

    let addr: SocketAddr = ([0, 0, 0, 0], config.jdbc_server_port).into();
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, model = ?config.concurrency_model, "relcore-server listening");

    let engine = Engine::new(config);
    let pool = pool_for(&engine);
    pool.serve(listener, engine).await?;
    Ok(())
}
