use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use courier_server::ServerConfig;
use courier_telemetry::TelemetryConfig;

#[derive(Debug, Parser)]
#[command(name = "courier", about = "Realtime directed-messaging relay")]
struct Args {
    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    /// Port to listen on (0 picks a free port).
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Disable the SQLite warn+ log sink.
    #[arg(long, default_value_t = false)]
    no_log_db: bool,

    /// Override the log database path.
    #[arg(long)]
    log_db: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut telemetry_config = TelemetryConfig {
        log_to_sqlite: !args.no_log_db,
        ..Default::default()
    };
    if let Some(path) = args.log_db {
        telemetry_config.log_db_path = path;
    }
    let _telemetry = courier_telemetry::init_telemetry(telemetry_config);

    tracing::info!("Starting courier relay");

    let config = ServerConfig {
        bind_addr: args.bind,
        port: args.port,
        ..Default::default()
    };
    let handle = courier_server::start(config)
        .await
        .context("failed to start server")?;

    tracing::info!(port = handle.port, "Courier relay ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl+c")?;

    tracing::info!("Shutting down");
    Ok(())
}
