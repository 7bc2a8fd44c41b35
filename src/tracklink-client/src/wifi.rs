// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Joining the controller's Wi-Fi network through the host's own tooling.

use std::io;
use std::process::Stdio;
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio::time;
use tracing::{debug, warn};

pub const DEFAULT_WIFI_TIMEOUT: Duration = Duration::from_secs(25);

/// External tool used to join a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum WifiTool {
    /// NetworkManager (`nmcli`), the usual choice on Linux.
    Nmcli,
    /// `netsh wlan` driven through PowerShell on Windows.
    Netsh,
}

impl Default for WifiTool {
    fn default() -> Self {
        if cfg!(windows) {
            Self::Netsh
        } else {
            Self::Nmcli
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiOutcome {
    pub success: bool,
    /// Combined stdout and stderr of the tool, trimmed.
    pub output: String,
}

impl WifiOutcome {
    fn failed(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WifiJoiner {
    pub tool: WifiTool,
    pub timeout: Duration,
}

impl Default for WifiJoiner {
    fn default() -> Self {
        Self {
            tool: WifiTool::default(),
            timeout: DEFAULT_WIFI_TIMEOUT,
        }
    }
}

impl WifiJoiner {
    pub fn new(tool: WifiTool, timeout: Duration) -> Self {
        Self { tool, timeout }
    }

    /// Program and arguments for joining `ssid`. An empty password joins an
    /// open network.
    pub fn command_line(&self, ssid: &str, password: &str) -> (String, Vec<String>) {
        match self.tool {
            WifiTool::Nmcli => {
                let mut args: Vec<String> = ["dev", "wifi", "connect", ssid]
                    .iter()
                    .map(|s| s.to_string())
                    .collect();
                if !password.is_empty() {
                    args.push("password".to_string());
                    args.push(password.to_string());
                }
                ("nmcli".to_string(), args)
            }
            WifiTool::Netsh => (
                "powershell".to_string(),
                vec![
                    "-NoProfile".to_string(),
                    "-ExecutionPolicy".to_string(),
                    "Bypass".to_string(),
                    "-Command".to_string(),
                    netsh_script(ssid, password),
                ],
            ),
        }
    }

    /// Human-readable form of the command with the password masked.
    pub fn describe(&self, ssid: &str, password: &str) -> String {
        match self.tool {
            WifiTool::Nmcli if password.is_empty() => format!("nmcli dev wifi connect {ssid}"),
            WifiTool::Nmcli => format!("nmcli dev wifi connect {ssid} password ****"),
            WifiTool::Netsh => format!("netsh wlan connect name=\"{ssid}\""),
        }
    }

    /// Run the join and wait for it, bounded by `self.timeout`.
    pub async fn join(&self, ssid: &str, password: &str) -> WifiOutcome {
        let ssid = ssid.trim();
        if ssid.is_empty() {
            return WifiOutcome::failed("SSID is empty.");
        }
        if self.tool == WifiTool::Netsh && (ssid.contains(['"', '\'']) || password.contains('\'')) {
            return WifiOutcome::failed("Quotes are not supported in SSID or password for netsh.");
        }

        let (program, args) = self.command_line(ssid, password);
        debug!("Running {} for SSID '{}'", program, ssid);
        let child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        match time::timeout(self.timeout, child).await {
            Err(_) => {
                warn!("{} did not finish within {:?}", program, self.timeout);
                WifiOutcome::failed(format!("{program} timeout."))
            }
            Ok(Err(e)) if e.kind() == io::ErrorKind::NotFound => {
                WifiOutcome::failed(format!("{program} not found. Is it installed and on PATH?"))
            }
            Ok(Err(e)) => WifiOutcome::failed(format!("{program} failed to start: {e}")),
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                let combined = [stdout.trim(), stderr.trim()]
                    .iter()
                    .filter(|s| !s.is_empty())
                    .copied()
                    .collect::<Vec<_>>()
                    .join("\n");
                WifiOutcome {
                    success: output.status.success(),
                    output: combined,
                }
            }
        }
    }
}

fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// WLAN profile for `netsh wlan add profile`.
pub fn profile_xml(ssid: &str, password: &str) -> String {
    let name = xml_escape(ssid);
    let security = if password.is_empty() {
        "<authEncryption><authentication>open</authentication><encryption>none</encryption>\
         <useOneX>false</useOneX></authEncryption>"
            .to_string()
    } else {
        format!(
            "<authEncryption><authentication>WPA2PSK</authentication><encryption>AES</encryption>\
             <useOneX>false</useOneX></authEncryption>\
             <sharedKey><keyType>passPhrase</keyType><protected>false</protected>\
             <keyMaterial>{}</keyMaterial></sharedKey>",
            xml_escape(password)
        )
    };
    format!(
        "<?xml version=\"1.0\"?>\n\
         <WLANProfile xmlns=\"http://www.microsoft.com/networking/WLAN/profile/v1\">\n\
         <name>{name}</name>\n\
         <SSIDConfig><SSID><name>{name}</name></SSID></SSIDConfig>\n\
         <connectionType>ESS</connectionType>\n\
         <connectionMode>manual</connectionMode>\n\
         <MSM><security>{security}</security></MSM>\n\
         </WLANProfile>"
    )
}

fn netsh_script(ssid: &str, password: &str) -> String {
    format!(
        "$xml = @'\n{}\n'@\n\
         $path = Join-Path $env:TEMP 'tracklink-wifi.xml'\n\
         Set-Content -Path $path -Value $xml -Encoding UTF8\n\
         netsh wlan add profile filename=\"$path\" user=current | Out-Null\n\
         netsh wlan connect name=\"{}\"\n\
         $code = $LASTEXITCODE\n\
         Remove-Item $path -ErrorAction SilentlyContinue\n\
         exit $code",
        profile_xml(ssid, password),
        ssid
    )
}
