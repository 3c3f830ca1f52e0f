mod server;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use switchboard_relay::RelayConfig;

#[derive(Parser)]
#[command(name = "switchboard", version, about = "Small-room media relay")]
struct Cli {
    /// Configuration file (TOML); defaults and environment apply without it
    #[arg(short, long, env = "SWITCHBOARD_CONFIG")]
    config: Option<String>,

    /// Override the control-channel listen address
    #[arg(short, long)]
    listen: Option<String>,

    /// Override the room capacity (2 or 3)
    #[arg(long)]
    room_capacity: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = RelayConfig::load(cli.config.as_deref())?;
    if let Some(listen) = cli.listen {
        config.listen_addr = listen;
    }
    if let Some(capacity) = cli.room_capacity {
        config.room_capacity = capacity;
    }
    config.validate()?;

    info!(
        listen = %config.listen_addr,
        capacity = config.room_capacity,
        "switchboard starting"
    );
    server::run(config).await
}
