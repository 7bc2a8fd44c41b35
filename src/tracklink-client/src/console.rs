// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Line-oriented operator console.
//!
//! Reads commands from stdin, polls the session on a fixed interval and
//! prints every status line it produces.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{info, warn};

use tracklink_core::DetectionSample;

use crate::session::ControlSession;
use crate::wifi::WifiJoiner;

pub const HELP: &str = "\
commands:
  wifi <ssid> [password]        join a Wi-Fi network
  connect [host] [port] [bind]  open the control link
  disconnect                    close the control link
  send <x> <y> [message...]     send one command
  rate <hz>                     tracking send rate
  track on|off                  enable periodic tracking commands
  fov <hfov> <vfov>             camera field of view in degrees
  sample <cx> <cy> <w> <h>      inject a detection
  nodetect                      inject an empty detection
  shot                          single shot from the latest detection
  status                        link and tracking summary
  help                          this text
  quit                          disconnect and exit";

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Wifi {
        ssid: String,
        password: String,
    },
    Connect {
        host: Option<String>,
        port: Option<String>,
        bind: Option<String>,
    },
    Disconnect,
    Send {
        x: String,
        y: String,
        message: String,
    },
    Rate(u32),
    Track(bool),
    Fov(f32, f32),
    Sample {
        center_x: f32,
        center_y: f32,
        width: u32,
        height: u32,
    },
    NoDetect,
    Shot,
    Status,
    Help,
    Quit,
}

fn arg<T: std::str::FromStr>(value: Option<&str>, name: &str) -> Result<T, String> {
    let value = value.ok_or_else(|| format!("missing <{name}>"))?;
    value
        .parse()
        .map_err(|_| format!("invalid <{name}>: '{value}'"))
}

/// Parse one console line. Blank lines yield `Ok(None)`.
pub fn parse_console_command(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let line = line.trim();
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };
    let mut words = rest.split_whitespace();

    let cmd = match verb.to_ascii_lowercase().as_str() {
        "" => return Ok(None),
        "wifi" => ConsoleCommand::Wifi {
            ssid: words.next().ok_or("missing <ssid>")?.to_string(),
            password: words.next().unwrap_or_default().to_string(),
        },
        "connect" => ConsoleCommand::Connect {
            host: words.next().map(str::to_string),
            port: words.next().map(str::to_string),
            bind: words.next().map(str::to_string),
        },
        "disconnect" => ConsoleCommand::Disconnect,
        "send" => {
            let x = words.next().ok_or("missing <x>")?.to_string();
            let y = words.next().ok_or("missing <y>")?.to_string();
            let message = words.collect::<Vec<_>>().join(" ");
            ConsoleCommand::Send { x, y, message }
        }
        "rate" => ConsoleCommand::Rate(arg(words.next(), "hz")?),
        "track" => match words.next() {
            Some("on") => ConsoleCommand::Track(true),
            Some("off") => ConsoleCommand::Track(false),
            _ => return Err("usage: track on|off".to_string()),
        },
        "fov" => ConsoleCommand::Fov(arg(words.next(), "hfov")?, arg(words.next(), "vfov")?),
        "sample" => ConsoleCommand::Sample {
            center_x: arg(words.next(), "cx")?,
            center_y: arg(words.next(), "cy")?,
            width: arg(words.next(), "w")?,
            height: arg(words.next(), "h")?,
        },
        "nodetect" => ConsoleCommand::NoDetect,
        "shot" => ConsoleCommand::Shot,
        "status" => ConsoleCommand::Status,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => return Err(format!("unknown command '{other}', try 'help'")),
    };
    Ok(Some(cmd))
}

/// Defaults the console falls back to when a command omits them.
#[derive(Debug, Clone, Default)]
pub struct ConsoleOptions {
    pub poll_interval: Duration,
    pub wifi: WifiJoiner,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub bind: Option<String>,
    /// Used when `wifi` is given without a password.
    pub password: Option<String>,
}

struct Console {
    session: ControlSession,
    options: ConsoleOptions,
    latest: Option<DetectionSample>,
}

impl Console {
    /// Returns false when the console should exit.
    async fn handle(&mut self, cmd: ConsoleCommand) -> bool {
        match cmd {
            ConsoleCommand::Wifi { ssid, password } => {
                let password = if password.is_empty() {
                    self.options.password.clone().unwrap_or_default()
                } else {
                    password
                };
                self.session
                    .join_wifi(&self.options.wifi, &ssid, &password)
                    .await;
            }
            ConsoleCommand::Connect { host, port, bind } => {
                let Some(host) = host.or_else(|| self.options.host.clone()) else {
                    self.session.log("[APP] No host given and none configured.");
                    return true;
                };
                let port = port
                    .or_else(|| self.options.port.map(|p| p.to_string()))
                    .unwrap_or_default();
                let bind = bind
                    .or_else(|| self.options.bind.clone())
                    .unwrap_or_default();
                let _ = self.session.connect(&host, &port, &bind).await;
            }
            ConsoleCommand::Disconnect => self.session.disconnect().await,
            ConsoleCommand::Send { x, y, message } => {
                let _ = self.session.send(&message, &x, &y).await;
            }
            ConsoleCommand::Rate(hz) => {
                let _ = self.session.set_rate_hz(hz);
            }
            ConsoleCommand::Track(enabled) => self.session.set_send_enabled(enabled),
            ConsoleCommand::Fov(h, v) => {
                let _ = self.session.set_fov(h, v);
            }
            ConsoleCommand::Sample {
                center_x,
                center_y,
                width,
                height,
            } => {
                let sample = DetectionSample::new(center_x, center_y, width, height);
                self.latest = Some(sample);
                self.session.offer_sample(self.latest).await;
            }
            ConsoleCommand::NoDetect => {
                self.latest = None;
                self.session.offer_sample(None).await;
            }
            ConsoleCommand::Shot => {
                self.session.single_shot(self.latest, true).await;
            }
            ConsoleCommand::Status => {
                let line = self.session.status_line();
                self.session.log(line);
            }
            ConsoleCommand::Help => println!("{HELP}"),
            ConsoleCommand::Quit => return false,
        }
        true
    }

    async fn flush(&mut self) {
        for line in self.session.poll().await {
            println!("{line}");
        }
    }
}

/// Run the console until `quit`, end of all inputs or Ctrl+C.
pub async fn run_console(
    session: ControlSession,
    mut samples: watch::Receiver<Option<DetectionSample>>,
    options: ConsoleOptions,
) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut poll = time::interval(options.poll_interval.max(Duration::from_millis(1)));
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut console = Console {
        session,
        options,
        latest: None,
    };
    let mut stdin_open = true;
    let mut samples_open = true;

    loop {
        tokio::select! {
            _ = poll.tick() => console.flush().await,
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match parse_console_command(&line) {
                    Ok(Some(cmd)) => {
                        let keep_going = console.handle(cmd).await;
                        console.flush().await;
                        if !keep_going {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => println!("[APP] {e}"),
                },
                Ok(None) => {
                    info!("stdin closed");
                    stdin_open = false;
                }
                Err(e) => {
                    warn!("stdin read failed: {}", e);
                    stdin_open = false;
                }
            },
            changed = samples.changed(), if samples_open => match changed {
                Ok(()) => {
                    let sample = *samples.borrow_and_update();
                    console.latest = sample;
                    console.session.offer_sample(sample).await;
                }
                Err(_) => samples_open = false,
            },
            _ = &mut ctrl_c => {
                info!("Ctrl+C received, shutting down");
                break;
            }
        }

        if !stdin_open && !samples_open {
            info!("No inputs left, shutting down");
            break;
        }
    }

    console.session.disconnect().await;
    console.flush().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> ConsoleCommand {
        parse_console_command(line)
            .expect("must parse")
            .expect("must be a command")
    }

    #[test]
    fn test_blank_line() {
        assert_eq!(parse_console_command("   "), Ok(None));
    }

    #[test]
    fn test_connect_fields_are_optional() {
        assert_eq!(
            parse("connect"),
            ConsoleCommand::Connect {
                host: None,
                port: None,
                bind: None
            }
        );
        assert_eq!(
            parse("CONNECT 192.168.4.1 3333 192.168.4.2"),
            ConsoleCommand::Connect {
                host: Some("192.168.4.1".to_string()),
                port: Some("3333".to_string()),
                bind: Some("192.168.4.2".to_string()),
            }
        );
    }

    #[test]
    fn test_send_keeps_message_spaces() {
        assert_eq!(
            parse("send -5 12 hello  there"),
            ConsoleCommand::Send {
                x: "-5".to_string(),
                y: "12".to_string(),
                message: "hello there".to_string(),
            }
        );
        assert!(parse_console_command("send 1").is_err());
    }

    #[test]
    fn test_numeric_arguments() {
        assert_eq!(parse("rate 10"), ConsoleCommand::Rate(10));
        assert_eq!(parse("fov 62.2 48.8"), ConsoleCommand::Fov(62.2, 48.8));
        assert_eq!(
            parse("sample 320 240 640 480"),
            ConsoleCommand::Sample {
                center_x: 320.0,
                center_y: 240.0,
                width: 640,
                height: 480
            }
        );
        assert_eq!(
            parse_console_command("rate fast"),
            Err("invalid <hz>: 'fast'".to_string())
        );
        assert_eq!(
            parse_console_command("fov 60"),
            Err("missing <vfov>".to_string())
        );
    }

    #[test]
    fn test_track_and_misc() {
        assert_eq!(parse("track on"), ConsoleCommand::Track(true));
        assert_eq!(parse("track off"), ConsoleCommand::Track(false));
        assert!(parse_console_command("track maybe").is_err());
        assert_eq!(
            parse("wifi UNO_R4_AP"),
            ConsoleCommand::Wifi {
                ssid: "UNO_R4_AP".to_string(),
                password: String::new()
            }
        );
        assert_eq!(parse("shot"), ConsoleCommand::Shot);
        assert_eq!(parse("?"), ConsoleCommand::Help);
        assert_eq!(parse("exit"), ConsoleCommand::Quit);
        assert!(parse_console_command("launch").is_err());
    }
}
