// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Control link lifecycle state.
//!
//! `Disconnected → Connecting → Connected → Disconnected`. A failed connect
//! attempt goes straight back to `Disconnected`; nothing retries on its own.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl LinkState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Whether moving from `self` to `next` is a legal lifecycle step.
    pub fn can_transition_to(&self, next: LinkState) -> bool {
        matches!(
            (self, next),
            (Self::Disconnected, Self::Connecting)
                | (Self::Connecting, Self::Connected)
                | (Self::Connecting, Self::Disconnected)
                | (Self::Connected, Self::Disconnected)
                | (Self::Disconnected, Self::Disconnected)
        )
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_disconnected() {
        assert_eq!(LinkState::default(), LinkState::Disconnected);
        assert!(!LinkState::default().is_connected());
    }

    #[test]
    fn test_transitions() {
        assert!(LinkState::Disconnected.can_transition_to(LinkState::Connecting));
        assert!(LinkState::Connecting.can_transition_to(LinkState::Connected));
        assert!(LinkState::Connecting.can_transition_to(LinkState::Disconnected));
        assert!(LinkState::Connected.can_transition_to(LinkState::Disconnected));
        assert!(!LinkState::Disconnected.can_transition_to(LinkState::Connected));
        assert!(!LinkState::Connected.can_transition_to(LinkState::Connecting));
    }

    #[test]
    fn test_display() {
        assert_eq!(LinkState::Connected.to_string(), "Connected");
    }
}
