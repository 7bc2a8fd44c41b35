// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod command;
pub mod detect;
pub mod error;
pub mod link;

pub type DynResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub use command::{CommandRecord, InboundLine, TRACK_TAG};
pub use detect::{best_candidate, Detection, DetectionSample, Detector, Frame};
pub use error::{LinkError, LinkResult};
pub use link::LinkState;
