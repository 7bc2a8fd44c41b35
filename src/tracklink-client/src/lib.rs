// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Client side of the tracklink control link.
//!
//! The [`session::ControlSession`] owns one [`connection::ConnectionManager`]
//! and is driven from a single task; background receive loops only talk to
//! it through the [`bridge`].

pub mod bridge;
pub mod config;
pub mod connection;
pub mod console;
pub mod dispatcher;
pub mod endpoint;
pub mod receiver;
pub mod replay;
pub mod session;
pub mod wifi;
