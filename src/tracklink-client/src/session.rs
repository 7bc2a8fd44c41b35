// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! The owning side of the control link.
//!
//! A `ControlSession` lives on one task. It is the only caller of the
//! connection manager, drains the event bridge and feeds the dispatcher.
//! Everything it does is also reported as a human-readable status line.

use std::time::Instant;

use tracing::debug;

use tracklink_core::{CommandRecord, DetectionSample, LinkResult, LinkState};

use crate::bridge::{event_bridge, EventBridge, LinkEvent};
use crate::connection::{ConnectOptions, ConnectionManager, LinkInfo};
use crate::dispatcher::{Decision, DispatchConfig, Dispatcher, SkipReason};
use crate::endpoint::{parse_bind, parse_endpoint, DEFAULT_REMOTE_PORT};
use crate::wifi::WifiJoiner;

pub struct ControlSession {
    manager: ConnectionManager,
    bridge: EventBridge,
    dispatcher: Dispatcher,
    connect_options: ConnectOptions,
    default_port: u16,
    status: Vec<String>,
    last_skip: Option<SkipReason>,
}

impl ControlSession {
    pub fn new(dispatch: DispatchConfig, connect_options: ConnectOptions) -> Self {
        let (events, bridge) = event_bridge();
        Self {
            manager: ConnectionManager::new(events),
            bridge,
            dispatcher: Dispatcher::new(dispatch),
            connect_options,
            default_port: DEFAULT_REMOTE_PORT,
            status: Vec::new(),
            last_skip: None,
        }
    }

    pub fn with_default_port(mut self, port: u16) -> Self {
        self.default_port = port;
        self
    }

    pub fn state(&self) -> LinkState {
        self.manager.state()
    }

    pub fn link_info(&self) -> Option<&LinkInfo> {
        self.manager.link_info()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Record a status line for the frontend.
    pub fn log(&mut self, line: impl Into<String>) {
        let line = line.into();
        debug!("{}", line);
        self.status.push(line);
    }

    /// Connect using operator-entered fields. An empty port means the default.
    pub async fn connect(&mut self, host: &str, port: &str, bind: &str) -> LinkResult<()> {
        let target = parse_endpoint(host, port, self.default_port)
            .and_then(|endpoint| Ok((endpoint, parse_bind(bind)?)));
        let (endpoint, bind) = match target {
            Ok(target) => target,
            Err(e) => {
                self.log(format!("[NET] Connect error: {e}"));
                return Err(e);
            }
        };

        let options = ConnectOptions {
            bind: bind.or(self.connect_options.bind),
            ..self.connect_options
        };
        self.log(format!("[NET] Connecting to {endpoint} ..."));
        if let Some(bind) = options.bind {
            self.log(format!("[NET] Binding to {bind}"));
        }
        match self.manager.connect(&endpoint, options).await {
            Ok(()) => {
                self.log("[NET] Connected.");
                Ok(())
            }
            Err(e) => {
                self.log(format!("[NET] Connect error: {e}"));
                Err(e)
            }
        }
    }

    pub async fn disconnect(&mut self) {
        if self.manager.disconnect().await {
            self.log("[NET] Disconnected.");
        }
    }

    /// Send a free-text command typed by the operator.
    pub async fn send(&mut self, message: &str, x: &str, y: &str) -> LinkResult<()> {
        let record = match CommandRecord::from_fields(message, x, y) {
            Ok(record) => record,
            Err(e) => {
                self.log(format!("[APP] {e}"));
                return Err(e);
            }
        };
        self.send_record(&record).await
    }

    async fn send_record(&mut self, record: &CommandRecord) -> LinkResult<()> {
        match self.manager.send(record).await {
            Ok(()) => {
                self.log(format!("[TX] {record}"));
                Ok(())
            }
            Err(e) => {
                self.log(format!("[NET] Send error: {e}"));
                if e.is_mid_session() {
                    self.log("[NET] Disconnected.");
                }
                Err(e)
            }
        }
    }

    /// Feed the freshest detection result to the dispatcher.
    pub async fn offer_sample(&mut self, sample: Option<DetectionSample>) -> Decision {
        let connected = self.manager.is_connected();
        let decision = self
            .dispatcher
            .offer(sample.as_ref(), connected, Instant::now());
        self.apply(&decision).await;
        decision
    }

    /// Send one tracking command now and hold periodic tracking off.
    pub async fn single_shot(
        &mut self,
        sample: Option<DetectionSample>,
        bypass_gate: bool,
    ) -> Decision {
        let connected = self.manager.is_connected();
        let decision =
            self.dispatcher
                .single_shot(sample.as_ref(), connected, Instant::now(), bypass_gate);
        match &decision {
            Decision::Emit(_) => {
                let hold = self.dispatcher.config().hold;
                self.log(format!("[TRACK] Single shot, holding for {:?}", hold));
            }
            Decision::Skip(reason) => self.log(format!("[TRACK] Single shot skipped: {reason}")),
        }
        self.apply(&decision).await;
        decision
    }

    async fn apply(&mut self, decision: &Decision) {
        match decision {
            Decision::Emit(record) => {
                self.last_skip = None;
                // A failure here already tore the link down. A hold for a
                // command that never left would outlive its link.
                if self.send_record(record).await.is_err() {
                    self.dispatcher.clear_hold();
                }
            }
            Decision::Skip(reason) => {
                if self.last_skip != Some(*reason) {
                    debug!("Tracking sample skipped: {}", reason);
                    self.last_skip = Some(*reason);
                }
            }
        }
    }

    pub fn set_rate_hz(&mut self, rate_hz: u32) -> LinkResult<()> {
        let result = self.dispatcher.set_rate_hz(rate_hz);
        match &result {
            Ok(()) => self.log(format!("[TRACK] Rate set to {rate_hz} Hz")),
            Err(e) => self.log(format!("[APP] {e}")),
        }
        result
    }

    pub fn set_send_enabled(&mut self, enabled: bool) {
        self.dispatcher.set_send_enabled(enabled);
        self.log(format!(
            "[TRACK] Sending {}",
            if enabled { "enabled" } else { "disabled" }
        ));
    }

    pub fn set_fov(&mut self, hfov_deg: f32, vfov_deg: f32) -> LinkResult<()> {
        let result = self.dispatcher.set_fov(hfov_deg, vfov_deg);
        match &result {
            Ok(()) => self.log(format!("[TRACK] FOV set to {hfov_deg} x {vfov_deg} deg")),
            Err(e) => self.log(format!("[APP] {e}")),
        }
        result
    }

    /// Join a Wi-Fi network before connecting. Returns whether it succeeded.
    pub async fn join_wifi(&mut self, joiner: &WifiJoiner, ssid: &str, password: &str) -> bool {
        self.log(format!("[WIFI] {}", joiner.describe(ssid, password)));
        let outcome = joiner.join(ssid, password).await;
        self.log(if outcome.success {
            "[WIFI] Connected OK."
        } else {
            "[WIFI] ERROR"
        });
        for line in outcome.output.lines().filter(|l| !l.trim().is_empty()) {
            self.log(format!("[WIFI] {}", line.trim()));
        }
        outcome.success
    }

    /// One-line summary of the link and tracking state.
    pub fn status_line(&mut self) -> String {
        let link = match self.manager.link_info() {
            Some(info) => format!(
                "{} to {} (peer {}, local {}, generation {})",
                self.manager.state(),
                info.endpoint,
                info.peer,
                info.local
                    .map(|a| a.to_string())
                    .unwrap_or_else(|| "?".to_string()),
                info.generation
            ),
            None => self.manager.state().to_string(),
        };
        let cfg = self.dispatcher.config().clone();
        let hold = self
            .dispatcher
            .hold_remaining(Instant::now())
            .map(|d| format!(", hold {:.1}s", d.as_secs_f32()))
            .unwrap_or_default();
        format!(
            "[APP] {link}; tracking {} at {} Hz, FOV {} x {} deg{hold}",
            if cfg.send_enabled { "on" } else { "off" },
            cfg.rate_hz,
            cfg.hfov_deg,
            cfg.vfov_deg,
        )
    }

    /// Surface everything that happened since the last poll, in order.
    ///
    /// A terminal receive event tears its own generation down here, so the
    /// link closes exactly once whoever noticed the failure first.
    pub async fn poll(&mut self) -> Vec<String> {
        for event in self.bridge.drain() {
            match event {
                LinkEvent::Line { line, .. } => self.log(format!("[RX] {}", line.text)),
                LinkEvent::Closed { generation, error } => {
                    if let Some(e) = &error {
                        self.log(format!("[NET] RX error: {e}"));
                    }
                    if self.manager.disconnect_generation(generation).await {
                        self.log("[NET] Disconnected.");
                    } else {
                        debug!("Link {} already closed", generation);
                    }
                }
            }
        }
        std::mem::take(&mut self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tracklink_core::LinkError;

    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;
    use tokio::time;

    fn session() -> ControlSession {
        ControlSession::new(
            DispatchConfig {
                send_enabled: true,
                hfov_deg: 60.0,
                vfov_deg: 40.0,
                ..DispatchConfig::default()
            },
            ConnectOptions::default(),
        )
    }

    async fn poll_until<F>(session: &mut ControlSession, mut done: F) -> Vec<String>
    where
        F: FnMut(&[String]) -> bool,
    {
        let mut lines = Vec::new();
        time::timeout(Duration::from_secs(5), async {
            loop {
                lines.extend(session.poll().await);
                if done(&lines) {
                    break;
                }
                time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await
        .expect("timed out polling session");
        lines
    }

    #[tokio::test]
    async fn send_without_link_reports_not_connected() {
        let mut session = session();
        let err = session.send("hi", "1", "2").await.unwrap_err();
        assert_eq!(err, LinkError::NotConnected);
        assert_eq!(
            session.poll().await,
            vec!["[NET] Send error: not connected".to_string()]
        );
    }

    #[tokio::test]
    async fn invalid_axis_is_rejected_before_io() {
        let mut session = session();
        let err = session.send("hi", "abc", "2").await.unwrap_err();
        assert!(matches!(err, LinkError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn invalid_port_is_address_invalid() {
        let mut session = session();
        let err = session.connect("127.0.0.1", "port", "").await.unwrap_err();
        assert!(matches!(err, LinkError::AddressInvalid(_)));
        assert_eq!(session.state(), LinkState::Disconnected);
        let lines = session.poll().await;
        assert!(lines[0].starts_with("[NET] Connect error: invalid address"));
    }

    #[tokio::test]
    async fn peer_close_is_observed_within_a_poll_cycle() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut buf = [0u8; 64];
            let _ = socket.read(&mut buf).await;
        });

        let mut session = session();
        session
            .connect("127.0.0.1", &addr.port().to_string(), "")
            .await
            .expect("connect");
        session.send("X", "1", "2").await.expect("send");
        server.await.expect("server task");

        let lines = poll_until(&mut session, |lines| {
            lines.iter().any(|l| l == "[NET] Disconnected.")
        })
        .await;
        assert_eq!(session.state(), LinkState::Disconnected);
        assert_eq!(
            lines.iter().filter(|l| *l == "[NET] Disconnected.").count(),
            1
        );
        assert!(lines.contains(&"[TX] MSG:X;X:1;Y:2".to_string()));

        // A later user disconnect is a no-op.
        session.disconnect().await;
        assert!(session.poll().await.is_empty());
    }

    #[tokio::test]
    async fn rx_lines_surface_in_order() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let (done_tx, done_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            socket
                .write_all(b"HELLO from UNO R4 WiFi\r\nfirst\nsec")
                .await
                .expect("write");
            time::sleep(Duration::from_millis(50)).await;
            socket.write_all(b"ond\n").await.expect("write");
            let _ = done_rx.await;
        });

        let mut session = session();
        session
            .connect("127.0.0.1", &addr.port().to_string(), "")
            .await
            .expect("connect");
        let lines = poll_until(&mut session, |lines| {
            lines.iter().any(|l| l == "[RX] second")
        })
        .await;
        let rx: Vec<&String> = lines.iter().filter(|l| l.starts_with("[RX]")).collect();
        assert_eq!(
            rx,
            vec!["[RX] HELLO from UNO R4 WiFi", "[RX] first", "[RX] second"]
        );

        session.disconnect().await;
        assert_eq!(session.poll().await, vec!["[NET] Disconnected.".to_string()]);
        let _ = done_tx.send(());
        server.await.expect("server task");
    }

    #[tokio::test]
    async fn tracking_samples_reach_the_device() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let (line_tx, line_rx) = oneshot::channel::<String>();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.expect("accept");
            let mut reader = BufReader::new(socket);
            let mut line = String::new();
            reader.read_line(&mut line).await.expect("read line");
            let _ = line_tx.send(line);
        });

        let mut session = session();
        let sample = DetectionSample::new(640.0, 0.0, 640, 480);
        assert_eq!(
            session.offer_sample(Some(sample)).await,
            Decision::Skip(SkipReason::NotConnected)
        );

        session
            .connect("127.0.0.1", &addr.port().to_string(), "")
            .await
            .expect("connect");
        assert!(matches!(
            session.offer_sample(Some(sample)).await,
            Decision::Emit(_)
        ));
        assert_eq!(
            session.offer_sample(Some(sample)).await,
            Decision::Skip(SkipReason::Throttled)
        );

        let line = time::timeout(Duration::from_secs(5), line_rx)
            .await
            .expect("server line timeout")
            .expect("server line");
        assert_eq!(line, "MSG:TRACK;X:20;Y:30\n");

        session.disconnect().await;
        server.await.expect("server task");
    }

    #[tokio::test]
    async fn single_shot_holds_off_periodic_tracking() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let (done_tx, done_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.expect("accept");
            let _ = done_rx.await;
        });

        let mut session = session();
        session
            .connect("127.0.0.1", &addr.port().to_string(), "")
            .await
            .expect("connect");

        let sample = DetectionSample::new(320.0, 240.0, 640, 480);
        assert!(matches!(
            session.single_shot(Some(sample), true).await,
            Decision::Emit(_)
        ));
        time::sleep(Duration::from_millis(250)).await;
        assert_eq!(
            session.offer_sample(Some(sample)).await,
            Decision::Skip(SkipReason::Held)
        );
        assert!(session.status_line().contains("hold"));

        session.disconnect().await;
        let _ = done_tx.send(());
        server.await.expect("server task");
    }

    #[tokio::test]
    async fn failed_single_shot_leaves_no_hold() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.expect("accept");
            drop(socket);
        });

        let mut session = session();
        session
            .connect("127.0.0.1", &addr.port().to_string(), "")
            .await
            .expect("connect");
        server.await.expect("server task");

        let sample = DetectionSample::new(320.0, 240.0, 640, 480);
        for _ in 0..100 {
            assert!(matches!(
                session.single_shot(Some(sample), true).await,
                Decision::Emit(_)
            ));
            if session.state() == LinkState::Disconnected {
                break;
            }
            time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(session.state(), LinkState::Disconnected);
        assert!(session.dispatcher().state().hold.is_none());
        assert!(!session.status_line().contains("hold"));
    }

    #[test]
    fn config_changes_are_logged() {
        let mut session = session();
        assert!(session.set_rate_hz(0).is_err());
        session.set_rate_hz(10).unwrap();
        session.set_send_enabled(false);
        session.set_fov(90.0, 50.0).unwrap();
        assert_eq!(
            session.status,
            vec![
                "[APP] invalid input: rate must be > 0 Hz".to_string(),
                "[TRACK] Rate set to 10 Hz".to_string(),
                "[TRACK] Sending disabled".to_string(),
                "[TRACK] FOV set to 90 x 50 deg".to_string(),
            ]
        );
        assert_eq!(session.dispatcher().config().rate_hz, 10);
    }
}
