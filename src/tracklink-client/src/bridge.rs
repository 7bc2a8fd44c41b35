// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Ordered hand-off of receive-loop events to the owning task.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use tracklink_core::{InboundLine, LinkError};

/// Something the receive loop observed on one connection generation.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    Line {
        generation: u64,
        line: InboundLine,
    },
    /// Terminal marker: the peer closed the stream (`error: None`) or a read
    /// failed. Nothing follows it for the same generation.
    Closed {
        generation: u64,
        error: Option<LinkError>,
    },
}

impl LinkEvent {
    pub fn generation(&self) -> u64 {
        match self {
            Self::Line { generation, .. } | Self::Closed { generation, .. } => *generation,
        }
    }
}

/// Producer side, handed to each receive loop.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<LinkEvent>,
}

impl EventSender {
    /// Queue an event without waiting. Returns false once the bridge is gone.
    pub fn push(&self, event: LinkEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Consumer side, polled by the owning task.
#[derive(Debug)]
pub struct EventBridge {
    rx: mpsc::UnboundedReceiver<LinkEvent>,
}

impl EventBridge {
    /// Take every event queued so far, in push order. Never waits.
    pub fn drain(&mut self) -> Vec<LinkEvent> {
        let mut events = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        events
    }
}

pub fn event_bridge() -> (EventSender, EventBridge) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, EventBridge { rx })
}
