// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Initialize logging with optional level from config.
/// Falls back to INFO if level is None or invalid.
pub fn init_logging(log_level: Option<&str>) {
    let level = log_level
        .and_then(|s| s.parse::<Level>().ok())
        .unwrap_or(Level::INFO);

    FmtSubscriber::builder()
        .with_target(false)
        .with_max_level(level)
        .init();
}

/// Reject log levels `init_logging` would silently ignore.
pub fn validate_log_level(level: Option<&str>) -> Result<(), String> {
    match level {
        Some(level) if !LOG_LEVELS.contains(&level) => Err(format!(
            "log_level '{}' is invalid (expected one of: {})",
            level,
            LOG_LEVELS.join(", ")
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_log_level() {
        assert!(validate_log_level(None).is_ok());
        assert!(validate_log_level(Some("debug")).is_ok());
        assert!(validate_log_level(Some("loud")).is_err());
    }
}
