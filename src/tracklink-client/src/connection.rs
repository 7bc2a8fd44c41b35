// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Lifecycle of the single control link to the remote controller.

use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, SystemTime};

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpSocket, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};

use tracklink_core::{CommandRecord, LinkError, LinkResult, LinkState};
use tracklink_protocol::encode;

use crate::bridge::EventSender;
use crate::endpoint::RemoteEndpoint;
use crate::receiver::spawn_receive_loop;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Local address to bind before connecting (port chosen by the OS).
    pub bind: Option<IpAddr>,
    pub connect_timeout: Duration,
    pub write_timeout: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            bind: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

/// Public view of the live link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkInfo {
    pub endpoint: RemoteEndpoint,
    pub peer: SocketAddr,
    pub local: Option<SocketAddr>,
    pub bind: Option<IpAddr>,
    pub generation: u64,
    pub created_at: SystemTime,
}

/// One live TCP session. Owns the write half; the read half belongs to the
/// receive loop of the same generation until it is joined.
struct ControlLink {
    info: LinkInfo,
    writer: OwnedWriteHalf,
    write_timeout: Duration,
    stop_tx: watch::Sender<bool>,
    reader: JoinHandle<()>,
}

pub struct ConnectionManager {
    link: Option<ControlLink>,
    events: EventSender,
    state_tx: watch::Sender<LinkState>,
    last_generation: u64,
}

impl ConnectionManager {
    pub fn new(events: EventSender) -> Self {
        let (state_tx, _) = watch::channel(LinkState::Disconnected);
        Self {
            link: None,
            events,
            state_tx,
            last_generation: 0,
        }
    }

    pub fn state(&self) -> LinkState {
        *self.state_tx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Observe lifecycle transitions, including `Connecting`.
    pub fn subscribe_state(&self) -> watch::Receiver<LinkState> {
        self.state_tx.subscribe()
    }

    /// Generation of the live link, if any.
    pub fn generation(&self) -> Option<u64> {
        self.link.as_ref().map(|link| link.info.generation)
    }

    pub fn link_info(&self) -> Option<&LinkInfo> {
        self.link.as_ref().map(|link| &link.info)
    }

    fn set_state(&self, next: LinkState) {
        let prev = self.state_tx.send_replace(next);
        if !prev.can_transition_to(next) {
            warn!("Unexpected link transition {} -> {}", prev, next);
        } else if prev != next {
            debug!("Link state {} -> {}", prev, next);
        }
    }

    /// Open the link and start its receive loop.
    ///
    /// Fails with `AlreadyConnected` while a link is live; the caller must
    /// disconnect first.
    pub async fn connect(
        &mut self,
        endpoint: &RemoteEndpoint,
        options: ConnectOptions,
    ) -> LinkResult<()> {
        if let Some(link) = &self.link {
            return Err(LinkError::AlreadyConnected(link.info.endpoint.to_string()));
        }

        self.set_state(LinkState::Connecting);
        match open_stream(endpoint, &options).await {
            Ok(stream) => {
                self.attach(endpoint.clone(), stream, &options);
                self.set_state(LinkState::Connected);
                Ok(())
            }
            Err(e) => {
                self.set_state(LinkState::Disconnected);
                Err(e)
            }
        }
    }

    fn attach(&mut self, endpoint: RemoteEndpoint, stream: TcpStream, options: &ConnectOptions) {
        if let Err(e) = stream.set_nodelay(true) {
            debug!("set_nodelay failed: {}", e);
        }
        let peer = stream
            .peer_addr()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], endpoint.port)));
        let local = stream.local_addr().ok();

        self.last_generation += 1;
        let generation = self.last_generation;
        let (reader, writer) = stream.into_split();
        let (stop_tx, stop_rx) = watch::channel(false);
        let reader = spawn_receive_loop(reader, generation, self.events.clone(), stop_rx);

        info!(
            "Control link {} up: {} (peer {}, local {:?})",
            generation, endpoint, peer, local
        );
        self.link = Some(ControlLink {
            info: LinkInfo {
                endpoint,
                peer,
                local,
                bind: options.bind,
                generation,
                created_at: SystemTime::now(),
            },
            writer,
            write_timeout: options.write_timeout,
            stop_tx,
            reader,
        });
    }

    /// Write one encoded command.
    ///
    /// The whole line is written or the link is torn down and `WriteFailed`
    /// returned.
    pub async fn send(&mut self, record: &CommandRecord) -> LinkResult<()> {
        let Some(link) = self.link.as_mut() else {
            return Err(LinkError::NotConnected);
        };

        let payload = encode(record);
        let write_timeout = link.write_timeout;
        let result = time::timeout(write_timeout, async {
            link.writer.write_all(&payload).await?;
            link.writer.flush().await
        })
        .await;

        let err = match result {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => LinkError::WriteFailed(e.to_string()),
            Err(_) => LinkError::WriteFailed(format!("write timed out after {:?}", write_timeout)),
        };
        warn!("Control link send failed: {}", err);
        self.teardown().await;
        Err(err)
    }

    /// Close the live link, if any. Safe to call repeatedly.
    ///
    /// Returns once the receive loop has exited. Returns whether a link was
    /// actually torn down.
    pub async fn disconnect(&mut self) -> bool {
        self.teardown().await
    }

    /// Disconnect only if generation `generation` is still the live link.
    pub async fn disconnect_generation(&mut self, generation: u64) -> bool {
        if self.generation() != Some(generation) {
            debug!(
                "Ignoring teardown for stale generation {} (live: {:?})",
                generation,
                self.generation()
            );
            return false;
        }
        self.teardown().await
    }

    async fn teardown(&mut self) -> bool {
        let Some(mut link) = self.link.take() else {
            self.set_state(LinkState::Disconnected);
            return false;
        };
        let generation = link.info.generation;

        let _ = link.stop_tx.send(true);
        // Best effort: the socket may already be broken.
        if let Err(e) = link.writer.shutdown().await {
            debug!("Shutdown of link {} failed: {}", generation, e);
        }
        if let Err(e) = (&mut link.reader).await {
            warn!("Receive loop {} ended abnormally: {}", generation, e);
        }
        drop(link);

        self.set_state(LinkState::Disconnected);
        info!("Control link {} closed", generation);
        true
    }
}

async fn open_stream(endpoint: &RemoteEndpoint, options: &ConnectOptions) -> LinkResult<TcpStream> {
    let addr_text = endpoint.connect_addr();
    let connect = async {
        let target = resolve(&addr_text, options.bind).await?;
        let socket = match target {
            SocketAddr::V4(_) => TcpSocket::new_v4(),
            SocketAddr::V6(_) => TcpSocket::new_v6(),
        }
        .map_err(|e| LinkError::Other(format!("socket creation failed: {e}")))?;

        if let Some(bind) = options.bind {
            socket.bind(SocketAddr::new(bind, 0)).map_err(|e| {
                LinkError::AddressInvalid(format!("cannot bind to {bind}: {e}"))
            })?;
            debug!("Bound control socket to {}", bind);
        }

        socket
            .connect(target)
            .await
            .map_err(|e| LinkError::from_connect_io(&addr_text, &e, options.connect_timeout))
    };

    match time::timeout(options.connect_timeout, connect).await {
        Ok(result) => result,
        Err(_) => Err(LinkError::ConnectTimeout(options.connect_timeout)),
    }
}

/// Resolve `addr`, preferring an address family that matches `bind`.
async fn resolve(addr: &str, bind: Option<IpAddr>) -> LinkResult<SocketAddr> {
    let candidates: Vec<SocketAddr> = tokio::net::lookup_host(addr)
        .await
        .map_err(|e| LinkError::AddressInvalid(format!("cannot resolve {addr}: {e}")))?
        .collect();

    let preferred = match bind {
        Some(bind) => candidates
            .iter()
            .find(|c| c.is_ipv4() == bind.is_ipv4())
            .copied(),
        None => None,
    };
    preferred
        .or_else(|| candidates.first().copied())
        .ok_or_else(|| LinkError::AddressInvalid(format!("{addr} resolved to no addresses")))
}
