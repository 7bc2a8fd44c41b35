// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

mod config;
mod listener;

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

use tracklink_app::{init_logging, ConfigFile};
use tracklink_core::DynResult;

use config::EmulatorConfig;
use listener::run_listener;

const PKG_DESCRIPTION: &str = concat!(env!("CARGO_PKG_NAME"), " - tracking controller emulator");

#[derive(Debug, Parser)]
#[command(
    author = env!("CARGO_PKG_AUTHORS"),
    version = env!("CARGO_PKG_VERSION"),
    about = PKG_DESCRIPTION,
)]
struct Cli {
    /// Path to configuration file
    #[arg(long = "config", short = 'C', value_name = "FILE")]
    config: Option<PathBuf>,
    /// Print example configuration and exit
    #[arg(long = "print-config")]
    print_config: bool,
    /// IP address to listen on
    #[arg(short = 'l', long = "listen")]
    listen: Option<IpAddr>,
    /// TCP port to listen on
    #[arg(short = 'p', long = "port")]
    port: Option<u16>,
    /// Log level (trace, debug, info, warn, error)
    #[arg(long = "log-level")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> DynResult<()> {
    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", EmulatorConfig::example_toml());
        return Ok(());
    }

    let (mut cfg, config_path) = if let Some(ref path) = cli.config {
        let cfg = EmulatorConfig::load_from_file(path)?;
        (cfg, Some(path.clone()))
    } else {
        EmulatorConfig::load_from_default_paths()?
    };
    if let Some(listen) = cli.listen {
        cfg.listen.listen = listen;
    }
    if let Some(port) = cli.port {
        cfg.listen.port = port;
    }
    if let Some(level) = cli.log_level {
        cfg.general.log_level = Some(level);
    }
    cfg.validate()
        .map_err(|e| format!("Invalid emulator configuration: {}", e))?;

    init_logging(cfg.general.log_level.as_deref());

    if let Some(ref path) = config_path {
        info!("Loaded configuration from {}", path.display());
    }

    let addr = SocketAddr::from((cfg.listen.listen, cfg.listen.port));
    let listener = TcpListener::bind(addr).await?;
    let (targets_tx, _targets_rx) = watch::channel(None);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let server = tokio::spawn(run_listener(
        listener,
        cfg.listen.greeting.clone(),
        targets_tx,
        shutdown_rx,
    ));

    signal::ctrl_c().await?;
    info!("Ctrl+C received, shutting down");
    let _ = shutdown_tx.send(true);

    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Listener error: {}", e),
        Err(e) => error!("Listener task failed: {}", e),
    }
    Ok(())
}
