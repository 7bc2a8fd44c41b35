// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::fmt;
use std::time::SystemTime;

use crate::error::{LinkError, LinkResult};

/// Message tag carried by commands generated from the detection loop.
pub const TRACK_TAG: &str = "TRACK";

/// Outbound instruction for the remote controller.
///
/// The message can never contain a line break, so every record encodes to
/// exactly one protocol line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandRecord {
    message: String,
    pub x: i32,
    pub y: i32,
}

impl CommandRecord {
    /// Build a record, dropping any `\r` or `\n` from the message.
    pub fn new(message: impl Into<String>, x: i32, y: i32) -> Self {
        let mut message = message.into();
        message.retain(|c| c != '\n' && c != '\r');
        Self { message, x, y }
    }

    /// Command produced by the tracking dispatcher.
    pub fn tracking(x: i32, y: i32) -> Self {
        Self::new(TRACK_TAG, x, y)
    }

    /// Build a record from raw text fields as typed by an operator.
    ///
    /// The message is trimmed; empty X/Y fields default to `0`.
    pub fn from_fields(message: &str, x: &str, y: &str) -> LinkResult<Self> {
        Ok(Self::new(
            message.trim(),
            parse_axis("X", x)?,
            parse_axis("Y", y)?,
        ))
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_tracking(&self) -> bool {
        self.message == TRACK_TAG
    }
}

impl fmt::Display for CommandRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MSG:{};X:{};Y:{}", self.message, self.x, self.y)
    }
}

fn parse_axis(name: &str, text: &str) -> LinkResult<i32> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(0);
    }
    text.parse::<i32>()
        .map_err(|_| LinkError::InvalidInput(format!("{name} must be an integer, got '{text}'")))
}

/// One line of text received from the remote controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundLine {
    pub text: String,
    pub received_at: SystemTime,
}

impl InboundLine {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            received_at: SystemTime::now(),
        }
    }
}
