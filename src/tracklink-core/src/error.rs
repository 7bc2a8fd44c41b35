// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the control link.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("invalid address: {0}")]
    AddressInvalid(String),

    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("connection refused by {0}")]
    ConnectRefused(String),

    #[error("already connected to {0}, disconnect first")]
    AlreadyConnected(String),

    #[error("not connected")]
    NotConnected,

    #[error("write failed: {0}")]
    WriteFailed(String),

    #[error("read failed: {0}")]
    ReadFailed(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Other(String),
}

pub type LinkResult<T> = Result<T, LinkError>;

impl LinkError {
    /// Classify an I/O error returned while establishing a connection.
    ///
    /// `timeout` is the configured connect bound, reported when the OS gives
    /// up before it does.
    pub fn from_connect_io(addr: &str, err: &io::Error, timeout: Duration) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => Self::ConnectRefused(addr.to_string()),
            io::ErrorKind::TimedOut => Self::ConnectTimeout(timeout),
            io::ErrorKind::AddrNotAvailable | io::ErrorKind::InvalidInput => {
                Self::AddressInvalid(format!("{addr}: {err}"))
            }
            _ => Self::Other(format!("connect to {addr} failed: {err}")),
        }
    }

    /// Errors that end a live session rather than a connection attempt.
    pub fn is_mid_session(&self) -> bool {
        matches!(self, Self::WriteFailed(_) | Self::ReadFailed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refused_is_classified() {
        let err = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert_eq!(
            LinkError::from_connect_io("127.0.0.1:3333", &err, Duration::from_secs(5)),
            LinkError::ConnectRefused("127.0.0.1:3333".to_string())
        );
    }

    #[test]
    fn test_unreachable_falls_back_to_other() {
        let err = io::Error::new(io::ErrorKind::Other, "network unreachable");
        let classified = LinkError::from_connect_io("10.0.0.1:3333", &err, Duration::from_secs(5));
        assert!(matches!(classified, LinkError::Other(msg) if msg.contains("unreachable")));
    }

    #[test]
    fn test_os_timeout_reports_configured_bound() {
        let err = io::Error::from(io::ErrorKind::TimedOut);
        let classified = LinkError::from_connect_io("10.0.0.1:3333", &err, Duration::from_secs(5));
        assert_eq!(classified, LinkError::ConnectTimeout(Duration::from_secs(5)));
        assert_eq!(classified.to_string(), "connect timed out after 5s");
    }

    #[test]
    fn test_mid_session_errors() {
        assert!(LinkError::WriteFailed("broken pipe".into()).is_mid_session());
        assert!(LinkError::ReadFailed("reset".into()).is_mid_session());
        assert!(!LinkError::NotConnected.is_mid_session());
    }
}
