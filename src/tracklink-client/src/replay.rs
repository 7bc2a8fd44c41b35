// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Detection source that replays recorded detector output.
//!
//! Recordings are JSON lines, one frame per line:
//!
//! ```text
//! {"width":640,"height":480,"detections":[{"x1":10,"y1":20,"x2":50,"y2":80,"confidence":0.9}]}
//! ```
//!
//! Blank lines and lines starting with `#` are ignored.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::{Duration, Instant};

use bytes::Bytes;
use serde::Deserialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use tracklink_core::{best_candidate, Detection, DetectionSample, Detector, Frame};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecordedFrame {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub detections: Vec<Detection>,
}

#[derive(Debug, Clone)]
pub struct ReplayDetector {
    frames: Vec<RecordedFrame>,
    looped: bool,
}

impl ReplayDetector {
    pub fn new(frames: Vec<RecordedFrame>, looped: bool) -> Self {
        Self { frames, looped }
    }

    pub fn from_reader<R: BufRead>(reader: R, looped: bool) -> Result<Self, String> {
        let mut frames = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| format!("line {}: {}", idx + 1, e))?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let frame: RecordedFrame =
                serde_json::from_str(line).map_err(|e| format!("line {}: {}", idx + 1, e))?;
            if frame.width == 0 || frame.height == 0 {
                return Err(format!("line {}: frame size must be non-zero", idx + 1));
            }
            frames.push(frame);
        }
        Ok(Self::new(frames, looped))
    }

    pub fn load(path: &Path, looped: bool) -> Result<Self, String> {
        let file = File::open(path).map_err(|e| format!("{}: {}", path.display(), e))?;
        Self::from_reader(BufReader::new(file), looped)
            .map_err(|e| format!("{}: {}", path.display(), e))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    fn recorded(&self, index: u64) -> Option<&RecordedFrame> {
        if self.frames.is_empty() {
            return None;
        }
        let index = if self.looped {
            index % self.frames.len() as u64
        } else {
            index
        };
        self.frames.get(usize::try_from(index).ok()?)
    }

    /// Synthesize the frame with capture number `index`, or `None` once a
    /// non-looping recording is exhausted.
    pub fn frame(&self, index: u64, captured_at: Instant) -> Option<Frame> {
        let recorded = self.recorded(index)?;
        Some(Frame {
            index,
            width: recorded.width,
            height: recorded.height,
            captured_at,
            pixels: Bytes::new(),
        })
    }
}

impl Detector for ReplayDetector {
    fn detect(&mut self, frame: &Frame) -> Option<Detection> {
        best_candidate(self.recorded(frame.index)?.detections.iter().copied())
    }
}

/// Publish one sample per frame at `fps` into `samples`.
///
/// Ends when a non-looping recording runs out or every receiver is gone.
pub fn spawn_replay(
    mut detector: ReplayDetector,
    fps: u32,
    samples: watch::Sender<Option<DetectionSample>>,
) -> JoinHandle<()> {
    let period = Duration::from_secs(1) / fps.max(1);
    tokio::spawn(async move {
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut index = 0u64;
        loop {
            ticker.tick().await;
            let Some(frame) = detector.frame(index, Instant::now()) else {
                info!("Replay finished after {} frames", index);
                return;
            };
            let sample = detector.sample(&frame);
            if samples.send(sample).is_err() {
                debug!("Replay stopped, no sample receivers left");
                return;
            }
            index += 1;
        }
    })
}
