// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Configuration for tracklink-emulator, read from the
//! `[tracklink-emulator]` section of `tracklink.toml`.

use std::net::{IpAddr, Ipv4Addr};

use serde::{Deserialize, Serialize};
use tracklink_app::{validate_log_level, ConfigFile};

use crate::listener::DEFAULT_GREETING;

pub const SECTION_KEY: &str = "tracklink-emulator";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulatorConfig {
    pub general: GeneralConfig,
    pub listen: ListenConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    /// IP address to listen on
    pub listen: IpAddr,
    /// TCP port to listen on
    pub port: u16,
    /// Line sent to each client on accept
    pub greeting: String,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            listen: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3333,
            greeting: DEFAULT_GREETING.to_string(),
        }
    }
}

impl EmulatorConfig {
    pub fn validate(&self) -> Result<(), String> {
        validate_log_level(self.general.log_level.as_deref())
            .map_err(|e| format!("[general].{e}"))?;
        if self.listen.greeting.contains(['\r', '\n']) {
            return Err("[listen].greeting must be a single line".to_string());
        }
        Ok(())
    }

    pub fn example_toml() -> String {
        let example = EmulatorConfig {
            general: GeneralConfig {
                log_level: Some("info".to_string()),
            },
            listen: ListenConfig::default(),
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

impl ConfigFile for EmulatorConfig {
    fn section_key() -> &'static str {
        SECTION_KEY
    }

    fn validate(&self) -> Result<(), String> {
        EmulatorConfig::validate(self)
    }
}
