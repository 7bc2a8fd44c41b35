// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! TCP side of the emulated controller.
//!
//! Behaves like the board firmware: one client at a time, a greeting on
//! accept, then one reply line per command line.

use std::io;
use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{info, warn};

use tracklink_protocol::{parse_command, LineDecoder};

pub const DEFAULT_GREETING: &str = "HELLO from UNO R4 WiFi";
/// Longer input lines are cut to this many characters.
pub const MAX_LINE_CHARS: usize = 256;
/// The controller stores target angles on a 2 degree grid.
pub const ANGLE_STEP_DEG: i32 = 2;

/// Target angles last commanded by a client, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub pitch_deg: i32,
    pub yaw_deg: i32,
}

pub fn quantize_deg(angle: f64) -> i32 {
    let step = f64::from(ANGLE_STEP_DEG);
    (step * (angle / step).round()) as i32
}

/// Reply for one received line, or `None` for a blank one.
///
/// The raw line is cut to `MAX_LINE_CHARS` before surrounding whitespace is
/// trimmed, so leading blanks count toward the limit.
pub fn handle_line(line: &str) -> Option<(String, Option<Target>)> {
    let line = match line.char_indices().nth(MAX_LINE_CHARS) {
        Some((cut, _)) => {
            warn!("Line longer than {} chars truncated", MAX_LINE_CHARS);
            &line[..cut]
        }
        None => line,
    };
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    match parse_command(line) {
        Some(cmd) => {
            let target = Target {
                pitch_deg: quantize_deg(cmd.x),
                yaw_deg: quantize_deg(cmd.y),
            };
            let reply = format!("ACK;MSG:{};X:{:.2};Y:{:.2}", cmd.message, cmd.x, cmd.y);
            Some((reply, Some(target)))
        }
        None => Some((format!("ERR;BAD_PACKET;{line}"), None)),
    }
}

async fn wait_for_shutdown(mut shutdown_rx: watch::Receiver<bool>) {
    if *shutdown_rx.borrow() {
        return;
    }
    while shutdown_rx.changed().await.is_ok() {
        if *shutdown_rx.borrow() {
            break;
        }
    }
}

/// Accept clients one after another until shutdown.
///
/// Further connection attempts wait in the listen backlog while a client is
/// being served.
pub async fn run_listener(
    listener: TcpListener,
    greeting: String,
    targets: watch::Sender<Option<Target>>,
    shutdown_rx: watch::Receiver<bool>,
) -> io::Result<()> {
    info!("Listening on {}", listener.local_addr()?);
    loop {
        let (socket, peer) = tokio::select! {
            accepted = listener.accept() => accepted?,
            _ = wait_for_shutdown(shutdown_rx.clone()) => return Ok(()),
        };
        info!("Client connected: {}", peer);

        tokio::select! {
            result = serve_client(socket, peer, &greeting, &targets) => {
                if let Err(e) = result {
                    warn!("Client {} error: {}", peer, e);
                }
                info!("Client {} disconnected", peer);
            }
            _ = wait_for_shutdown(shutdown_rx.clone()) => return Ok(()),
        }
    }
}

async fn serve_client(
    socket: TcpStream,
    peer: SocketAddr,
    greeting: &str,
    targets: &watch::Sender<Option<Target>>,
) -> io::Result<()> {
    let (mut reader, mut writer) = socket.into_split();
    writer.write_all(format!("{greeting}\r\n").as_bytes()).await?;

    let mut decoder = LineDecoder::new();
    let mut buf = [0u8; 1024];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        for line in decoder.push(&buf[..n]) {
            let Some((reply, target)) = handle_line(&line) else {
                continue;
            };
            if let Some(target) = target {
                info!(
                    "{}: target pitch {} yaw {}",
                    peer, target.pitch_deg, target.yaw_deg
                );
                targets.send_replace(Some(target));
            }
            writer.write_all(format!("{reply}\r\n").as_bytes()).await?;
        }
        writer.flush().await?;
    }
}
