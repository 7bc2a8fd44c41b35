// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Configuration for tracklink-client, read from the `[tracklink-client]`
//! section of `tracklink.toml`.
//!
//! Search order:
//! 1. Path specified via `--config` CLI argument
//! 2. `./tracklink.toml` (current directory)
//! 3. `~/.config/tracklink/tracklink.toml` (XDG config)
//! 4. `/etc/tracklink/tracklink.toml` (system-wide)

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracklink_app::{validate_log_level, ConfigFile};

use crate::connection::ConnectOptions;
use crate::dispatcher::{AxisConvention, DispatchConfig};
use crate::endpoint::{parse_bind, DEFAULT_REMOTE_PORT};
use crate::wifi::{WifiJoiner, WifiTool};

pub const SECTION_KEY: &str = "tracklink-client";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub general: GeneralConfig,
    pub link: LinkConfig,
    pub wifi: WifiConfig,
    pub tracking: TrackingConfig,
    pub replay: ReplayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
    /// How often the console drains link events, in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: None,
            poll_interval_ms: 50,
        }
    }
}

/// Control link settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Controller host name or IP address.
    pub host: Option<String>,
    pub port: u16,
    /// Local address to bind before connecting.
    pub bind: Option<String>,
    pub connect_timeout_ms: u64,
    pub write_timeout_ms: u64,
    /// Connect as soon as the client starts.
    pub auto_connect: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: DEFAULT_REMOTE_PORT,
            bind: None,
            connect_timeout_ms: 5000,
            write_timeout_ms: 2000,
            auto_connect: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WifiConfig {
    pub tool: WifiTool,
    /// Network to join before auto-connecting.
    pub ssid: Option<String>,
    pub password: Option<String>,
    pub timeout_ms: u64,
}

impl Default for WifiConfig {
    fn default() -> Self {
        Self {
            tool: WifiTool::default(),
            ssid: None,
            password: None,
            timeout_ms: 25_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub rate_hz: u32,
    /// Start with periodic tracking commands enabled.
    pub send_enabled: bool,
    pub hfov_deg: f32,
    pub vfov_deg: f32,
    /// How long a single shot suppresses periodic commands.
    pub hold_ms: u64,
    pub axes: AxisConvention,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        let dispatch = DispatchConfig::default();
        Self {
            rate_hz: dispatch.rate_hz,
            send_enabled: dispatch.send_enabled,
            hfov_deg: dispatch.hfov_deg,
            vfov_deg: dispatch.vfov_deg,
            hold_ms: dispatch.hold.as_millis() as u64,
            axes: dispatch.axes,
        }
    }
}

/// Recorded detections to replay as the detection source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    pub path: Option<PathBuf>,
    pub fps: u32,
    pub looped: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            path: None,
            fps: 30,
            looped: false,
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<(), String> {
        validate_log_level(self.general.log_level.as_deref())
            .map_err(|e| format!("[general].{e}"))?;
        if self.general.poll_interval_ms == 0 {
            return Err("[general].poll_interval_ms must be > 0".to_string());
        }

        if let Some(host) = &self.link.host {
            if host.trim().is_empty() {
                return Err("[link].host must not be empty when set".to_string());
            }
        }
        if self.link.port == 0 {
            return Err("[link].port must be > 0".to_string());
        }
        if let Some(bind) = &self.link.bind {
            parse_bind(bind).map_err(|e| format!("[link].bind: {e}"))?;
        }
        if self.link.connect_timeout_ms == 0 {
            return Err("[link].connect_timeout_ms must be > 0".to_string());
        }
        if self.link.write_timeout_ms == 0 {
            return Err("[link].write_timeout_ms must be > 0".to_string());
        }
        if self.link.auto_connect && self.link.host.is_none() {
            return Err("[link].auto_connect requires [link].host".to_string());
        }

        if self.wifi.timeout_ms == 0 {
            return Err("[wifi].timeout_ms must be > 0".to_string());
        }

        if self.tracking.rate_hz == 0 {
            return Err("[tracking].rate_hz must be > 0".to_string());
        }
        for (name, fov) in [
            ("hfov_deg", self.tracking.hfov_deg),
            ("vfov_deg", self.tracking.vfov_deg),
        ] {
            if !fov.is_finite() || fov <= 0.0 || fov >= 360.0 {
                return Err(format!("[tracking].{name} must be in (0, 360)"));
            }
        }

        if self.replay.fps == 0 {
            return Err("[replay].fps must be > 0".to_string());
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.general.poll_interval_ms)
    }

    /// Connect options with the configured bind address applied.
    ///
    /// Call after `validate`; an unparsable bind is ignored here.
    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            bind: self
                .link
                .bind
                .as_deref()
                .and_then(|b| parse_bind(b).ok().flatten()),
            connect_timeout: Duration::from_millis(self.link.connect_timeout_ms),
            write_timeout: Duration::from_millis(self.link.write_timeout_ms),
        }
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            rate_hz: self.tracking.rate_hz,
            hfov_deg: self.tracking.hfov_deg,
            vfov_deg: self.tracking.vfov_deg,
            send_enabled: self.tracking.send_enabled,
            hold: Duration::from_millis(self.tracking.hold_ms),
            axes: self.tracking.axes,
        }
    }

    pub fn wifi_joiner(&self) -> WifiJoiner {
        WifiJoiner::new(self.wifi.tool, Duration::from_millis(self.wifi.timeout_ms))
    }

    /// Generate an example `tracklink.toml` section.
    pub fn example_toml() -> String {
        let example = ClientConfig {
            general: GeneralConfig {
                log_level: Some("info".to_string()),
                ..GeneralConfig::default()
            },
            link: LinkConfig {
                host: Some("192.168.4.1".to_string()),
                ..LinkConfig::default()
            },
            wifi: WifiConfig {
                ssid: Some("UNO_R4_AP".to_string()),
                password: Some("12345678".to_string()),
                ..WifiConfig::default()
            },
            tracking: TrackingConfig::default(),
            replay: ReplayConfig {
                path: Some(PathBuf::from("detections.jsonl")),
                ..ReplayConfig::default()
            },
        };

        let mut root = toml::Table::new();
        match toml::Value::try_from(&example) {
            Ok(section) => {
                root.insert(SECTION_KEY.to_string(), section);
            }
            Err(_) => return String::new(),
        }
        toml::to_string_pretty(&root).unwrap_or_default()
    }
}

impl ConfigFile for ClientConfig {
    fn section_key() -> &'static str {
        SECTION_KEY
    }

    fn validate(&self) -> Result<(), String> {
        ClientConfig::validate(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert!(config.link.host.is_none());
        assert_eq!(config.link.port, 3333);
        assert_eq!(config.link.connect_timeout_ms, 5000);
        assert_eq!(config.general.poll_interval_ms, 50);
        assert_eq!(config.tracking.rate_hz, 5);
        assert_eq!(config.tracking.hold_ms, 5000);
        assert!(!config.tracking.send_enabled);
        assert_eq!(config.wifi.timeout_ms, 25_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_client_toml() {
        let toml_str = r#"
[tracklink-client.general]
log_level = "debug"

[tracklink-client.link]
host = "192.168.4.1"
bind = "192.168.4.2"
auto_connect = true

[tracklink-client.tracking]
rate_hz = 10
axes = "direct"

[tracklink-client.wifi]
tool = "netsh"
ssid = "UNO_R4_AP"
"#;

        let config = ClientConfig::load_from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level.as_deref(), Some("debug"));
        assert_eq!(config.link.host.as_deref(), Some("192.168.4.1"));
        assert_eq!(config.link.port, 3333);
        assert!(config.link.auto_connect);
        assert_eq!(config.tracking.rate_hz, 10);
        assert_eq!(config.tracking.axes, AxisConvention::Direct);
        assert_eq!(config.wifi.tool, WifiTool::Netsh);
        assert_eq!(
            config.connect_options().bind,
            Some("192.168.4.2".parse().unwrap())
        );
        assert_eq!(config.dispatch_config().interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_example_toml_parses() {
        let example = ClientConfig::example_toml();
        assert!(example.contains("host = \"192.168.4.1\""));
        let config = ClientConfig::load_from_str(&example).unwrap();
        assert_eq!(config.link.host.as_deref(), Some("192.168.4.1"));
    }

    #[test]
    fn test_validate_rejects_zero_rate() {
        let mut config = ClientConfig::default();
        config.tracking.rate_hz = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_bind_and_fov() {
        let mut config = ClientConfig::default();
        config.link.bind = Some("not-an-ip".to_string());
        assert!(config.validate().unwrap_err().starts_with("[link].bind"));

        let mut config = ClientConfig::default();
        config.tracking.vfov_deg = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_auto_connect_requires_host() {
        let mut config = ClientConfig::default();
        config.link.auto_connect = true;
        assert!(config.validate().is_err());
    }
}
