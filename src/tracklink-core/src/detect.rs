// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Detection collaborator types.
//!
//! The control link only needs a target centre point and the size of the frame
//! it was found in; everything about how frames are captured or how the model
//! runs lives behind [`Detector`].

use std::time::Instant;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A single bounding box reported by a detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
}

impl Detection {
    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }
}

/// Pick the highest-confidence candidate.
pub fn best_candidate<I>(candidates: I) -> Option<Detection>
where
    I: IntoIterator<Item = Detection>,
{
    candidates
        .into_iter()
        .filter(|d| d.confidence.is_finite())
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
}

/// A captured image handed to a detector.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Capture sequence number.
    pub index: u64,
    pub width: u32,
    pub height: u32,
    pub captured_at: Instant,
    pub pixels: Bytes,
}

/// Target position derived from one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionSample {
    pub center_x: f32,
    pub center_y: f32,
    pub frame_width: u32,
    pub frame_height: u32,
    pub captured_at: Instant,
}

impl DetectionSample {
    pub fn new(center_x: f32, center_y: f32, frame_width: u32, frame_height: u32) -> Self {
        Self {
            center_x,
            center_y,
            frame_width,
            frame_height,
            captured_at: Instant::now(),
        }
    }

    pub fn from_detection(detection: &Detection, frame: &Frame) -> Self {
        let (center_x, center_y) = detection.center();
        Self {
            center_x,
            center_y,
            frame_width: frame.width,
            frame_height: frame.height,
            captured_at: frame.captured_at,
        }
    }
}

/// Object detector returning at most one best candidate per frame.
pub trait Detector: Send {
    fn detect(&mut self, frame: &Frame) -> Option<Detection>;

    /// Run detection and reduce the result to a sample.
    fn sample(&mut self, frame: &Frame) -> Option<DetectionSample> {
        self.detect(frame)
            .map(|det| DetectionSample::from_detection(&det, frame))
    }
}
