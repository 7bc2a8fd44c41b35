// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::path::PathBuf;

use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};

use tracklink_app::{init_logging, ConfigFile};
use tracklink_core::DynResult;

use tracklink_client::config::ClientConfig;
use tracklink_client::console::{run_console, ConsoleOptions};
use tracklink_client::endpoint::parse_remote_url;
use tracklink_client::replay::{spawn_replay, ReplayDetector};
use tracklink_client::session::ControlSession;
use tracklink_client::wifi::WifiTool;

const PKG_DESCRIPTION: &str = concat!(env!("CARGO_PKG_NAME"), " - tracking controller link client");

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
    /// Controller address (host, host:port or tcp://host:port)
    #[arg(short = 'u', long = "url", conflicts_with_all = ["host", "port"])]
    url: Option<String>,
    /// Controller host name or IP address
    #[arg(long = "host")]
    host: Option<String>,
    /// Controller TCP port
    #[arg(short = 'p', long = "port")]
    port: Option<u16>,
    /// Local address to bind before connecting
    #[arg(short = 'b', long = "bind")]
    bind: Option<String>,
    /// Connect on startup
    #[arg(long = "connect")]
    connect: bool,
    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long = "log-level")]
    log_level: Option<String>,
    /// Console poll interval in milliseconds
    #[arg(long = "poll-interval")]
    poll_interval_ms: Option<u64>,
    /// Tracking command rate in Hz
    #[arg(short = 'r', long = "rate")]
    rate_hz: Option<u32>,
    /// Start with periodic tracking commands enabled
    #[arg(long = "track")]
    track: bool,
    /// Horizontal field of view in degrees
    #[arg(long = "hfov")]
    hfov_deg: Option<f32>,
    /// Vertical field of view in degrees
    #[arg(long = "vfov")]
    vfov_deg: Option<f32>,
    /// Replay recorded detections from a JSON lines file
    #[arg(long = "replay", value_name = "FILE")]
    replay: Option<PathBuf>,
    /// Replay frame rate
    #[arg(long = "replay-fps")]
    replay_fps: Option<u32>,
    /// Restart the replay when it reaches the end
    #[arg(long = "replay-loop")]
    replay_loop: bool,
    /// Tool used to join Wi-Fi networks
    #[arg(long = "wifi-tool", value_enum)]
    wifi_tool: Option<WifiTool>,
    /// Wi-Fi network to join before connecting
    #[arg(long = "ssid")]
    ssid: Option<String>,
    /// Wi-Fi password
    #[arg(long = "password")]
    password: Option<String>,
}

impl Cli {
    /// Fold command-line overrides into the file configuration.
    fn apply(&self, cfg: &mut ClientConfig) -> DynResult<()> {
        if let Some(url) = &self.url {
            let endpoint = parse_remote_url(url).map_err(|e| format!("Invalid --url: {}", e))?;
            cfg.link.host = Some(endpoint.host);
            cfg.link.port = endpoint.port;
        }
        if let Some(host) = &self.host {
            cfg.link.host = Some(host.clone());
        }
        if let Some(port) = self.port {
            cfg.link.port = port;
        }
        if let Some(bind) = &self.bind {
            cfg.link.bind = Some(bind.clone());
        }
        if self.connect {
            cfg.link.auto_connect = true;
        }
        if let Some(level) = &self.log_level {
            cfg.general.log_level = Some(level.clone());
        }
        if let Some(ms) = self.poll_interval_ms {
            cfg.general.poll_interval_ms = ms;
        }
        if let Some(rate) = self.rate_hz {
            cfg.tracking.rate_hz = rate;
        }
        if self.track {
            cfg.tracking.send_enabled = true;
        }
        if let Some(hfov) = self.hfov_deg {
            cfg.tracking.hfov_deg = hfov;
        }
        if let Some(vfov) = self.vfov_deg {
            cfg.tracking.vfov_deg = vfov;
        }
        if let Some(path) = &self.replay {
            cfg.replay.path = Some(path.clone());
        }
        if let Some(fps) = self.replay_fps {
            cfg.replay.fps = fps;
        }
        if self.replay_loop {
            cfg.replay.looped = true;
        }
        if let Some(tool) = self.wifi_tool {
            cfg.wifi.tool = tool;
        }
        if let Some(ssid) = &self.ssid {
            cfg.wifi.ssid = Some(ssid.clone());
        }
        if let Some(password) = &self.password {
            cfg.wifi.password = Some(password.clone());
        }
        Ok(())
    }
}

fn main() -> DynResult<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async_main())
}

async fn async_main() -> DynResult<()> {
    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", ClientConfig::example_toml());
        return Ok(());
    }

    let (mut cfg, config_path) = if let Some(ref path) = cli.config {
        let cfg = ClientConfig::load_from_file(path)?;
        (cfg, Some(path.clone()))
    } else {
        ClientConfig::load_from_default_paths()?
    };
    cli.apply(&mut cfg)?;
    cfg.validate()
        .map_err(|e| format!("Invalid configuration: {}", e))?;

    init_logging(cfg.general.log_level.as_deref());

    if let Some(ref path) = config_path {
        info!("Loaded configuration from {}", path.display());
    }

    let mut session =
        ControlSession::new(cfg.dispatch_config(), cfg.connect_options()).with_default_port(cfg.link.port);

    let (sample_tx, sample_rx) = watch::channel(None);
    let replay_task = match &cfg.replay.path {
        Some(path) => {
            let detector = ReplayDetector::load(path, cfg.replay.looped)?;
            info!(
                "Replaying {} frames from {} at {} fps",
                detector.len(),
                path.display(),
                cfg.replay.fps
            );
            Some(spawn_replay(detector, cfg.replay.fps, sample_tx))
        }
        None => {
            drop(sample_tx);
            None
        }
    };

    let joiner = cfg.wifi_joiner();
    if cfg.link.auto_connect {
        if let Some(ssid) = &cfg.wifi.ssid {
            let password = cfg.wifi.password.clone().unwrap_or_default();
            if !session.join_wifi(&joiner, ssid, &password).await {
                warn!("Wi-Fi join failed, trying to connect anyway");
            }
        }
        if let Some(host) = &cfg.link.host {
            let bind = cfg.link.bind.clone().unwrap_or_default();
            let _ = session
                .connect(host, &cfg.link.port.to_string(), &bind)
                .await;
        }
    }

    let options = ConsoleOptions {
        poll_interval: cfg.poll_interval(),
        wifi: joiner,
        host: cfg.link.host.clone(),
        port: Some(cfg.link.port),
        bind: cfg.link.bind.clone(),
        password: cfg.wifi.password.clone(),
    };
    run_console(session, sample_rx, options).await;

    if let Some(task) = replay_task {
        task.abort();
    }
    Ok(())
}
