// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Rate limiting of tracking commands derived from detection samples.
//!
//! The dispatcher is a pure decision engine: it is told the current time and
//! whether the link is up, and answers with the command to send (if any).
//! Samples that do not produce a command are dropped, never queued, so a fast
//! producer can only ever be represented by its freshest sample.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use tracklink_core::{CommandRecord, DetectionSample, LinkError, LinkResult};

pub const DEFAULT_HOLD: Duration = Duration::from_secs(5);

/// How angular offsets map onto the command's X/Y fields.
///
/// The controller expects the vertical angle in X and the horizontal angle in
/// Y, which is what `Swapped` produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisConvention {
    #[default]
    Swapped,
    Direct,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchConfig {
    pub rate_hz: u32,
    pub hfov_deg: f32,
    pub vfov_deg: f32,
    pub send_enabled: bool,
    pub hold: Duration,
    pub axes: AxisConvention,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            rate_hz: 5,
            hfov_deg: 62.2,
            vfov_deg: 48.8,
            send_enabled: false,
            hold: DEFAULT_HOLD,
            axes: AxisConvention::Swapped,
        }
    }
}

impl DispatchConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(1) / self.rate_hz.max(1)
    }
}

/// Why a sample did not produce a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Disabled,
    NotConnected,
    NoDetection,
    Throttled,
    Held,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "sending disabled"),
            Self::NotConnected => write!(f, "not connected"),
            Self::NoDetection => write!(f, "no detection"),
            Self::Throttled => write!(f, "rate limited"),
            Self::Held => write!(f, "single-shot hold active"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Emit(CommandRecord),
    Skip(SkipReason),
}

/// Single-shot result being protected from periodic overwrites.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hold {
    pub until: Instant,
    pub sample: DetectionSample,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchState {
    pub last_emit: Option<Instant>,
    pub hold: Option<Hold>,
}

/// Angular offset of the sample from the frame centre, in degrees.
///
/// Positive X is right of centre, positive Y is above centre.
pub fn sample_to_angles(sample: &DetectionSample, hfov_deg: f32, vfov_deg: f32) -> (f32, f32) {
    let w = sample.frame_width.max(1) as f32;
    let h = sample.frame_height.max(1) as f32;
    let angle_x = (sample.center_x / w - 0.5) * hfov_deg;
    let angle_y = (0.5 - sample.center_y / h) * vfov_deg;
    (angle_x, angle_y)
}

pub fn tracking_command(sample: &DetectionSample, config: &DispatchConfig) -> CommandRecord {
    let (angle_x, angle_y) = sample_to_angles(sample, config.hfov_deg, config.vfov_deg);
    let (x, y) = match config.axes {
        AxisConvention::Swapped => (angle_y, angle_x),
        AxisConvention::Direct => (angle_x, angle_y),
    };
    CommandRecord::tracking(x.round() as i32, y.round() as i32)
}

#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    config: DispatchConfig,
    state: DispatchState,
}

impl Dispatcher {
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            config,
            state: DispatchState::default(),
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn state(&self) -> &DispatchState {
        &self.state
    }

    pub fn set_rate_hz(&mut self, rate_hz: u32) -> LinkResult<()> {
        if rate_hz == 0 {
            return Err(LinkError::InvalidInput("rate must be > 0 Hz".to_string()));
        }
        self.config.rate_hz = rate_hz;
        Ok(())
    }

    pub fn set_send_enabled(&mut self, enabled: bool) {
        self.config.send_enabled = enabled;
    }

    pub fn set_fov(&mut self, hfov_deg: f32, vfov_deg: f32) -> LinkResult<()> {
        let valid = |v: f32| v.is_finite() && v > 0.0 && v < 360.0;
        if !valid(hfov_deg) || !valid(vfov_deg) {
            return Err(LinkError::InvalidInput(format!(
                "field of view must be within (0, 360) degrees, got {hfov_deg} x {vfov_deg}"
            )));
        }
        self.config.hfov_deg = hfov_deg;
        self.config.vfov_deg = vfov_deg;
        Ok(())
    }

    /// Remaining hold time, clearing the hold once it has elapsed.
    pub fn hold_remaining(&mut self, now: Instant) -> Option<Duration> {
        self.expire_hold(now);
        self.state
            .hold
            .as_ref()
            .map(|hold| hold.until.saturating_duration_since(now))
    }

    /// Drop any single-shot hold, e.g. when its command never left.
    pub fn clear_hold(&mut self) {
        self.state.hold = None;
    }

    fn expire_hold(&mut self, now: Instant) {
        if matches!(self.state.hold, Some(hold) if now >= hold.until) {
            self.state.hold = None;
        }
    }

    fn interval_elapsed(&self, now: Instant) -> bool {
        match self.state.last_emit {
            Some(last) => now.saturating_duration_since(last) >= self.config.interval(),
            None => true,
        }
    }

    fn emit(&mut self, sample: &DetectionSample, now: Instant) -> Decision {
        self.state.last_emit = Some(now);
        Decision::Emit(tracking_command(sample, &self.config))
    }

    /// Periodic path: called for every new sample from the producer.
    pub fn offer(
        &mut self,
        sample: Option<&DetectionSample>,
        connected: bool,
        now: Instant,
    ) -> Decision {
        self.expire_hold(now);
        if !self.config.send_enabled {
            return Decision::Skip(SkipReason::Disabled);
        }
        if !connected {
            return Decision::Skip(SkipReason::NotConnected);
        }
        if self.state.hold.is_some() {
            return Decision::Skip(SkipReason::Held);
        }
        let Some(sample) = sample else {
            return Decision::Skip(SkipReason::NoDetection);
        };
        if !self.interval_elapsed(now) {
            return Decision::Skip(SkipReason::Throttled);
        }
        self.emit(sample, now)
    }

    /// Operator-triggered path: emit once and hold periodic emission off.
    ///
    /// Ignores `send_enabled`. With `bypass_gate` the rate interval is
    /// ignored too. Any previous hold is cleared; a new one starts only when
    /// a command is emitted.
    pub fn single_shot(
        &mut self,
        sample: Option<&DetectionSample>,
        connected: bool,
        now: Instant,
        bypass_gate: bool,
    ) -> Decision {
        self.state.hold = None;
        if !connected {
            return Decision::Skip(SkipReason::NotConnected);
        }
        let Some(sample) = sample else {
            return Decision::Skip(SkipReason::NoDetection);
        };
        if !bypass_gate && !self.interval_elapsed(now) {
            return Decision::Skip(SkipReason::Throttled);
        }
        self.state.hold = Some(Hold {
            until: now + self.config.hold,
            sample: *sample,
        });
        self.emit(sample, now)
    }
}
