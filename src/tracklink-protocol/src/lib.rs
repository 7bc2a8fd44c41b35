// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Line protocol spoken between the control panel and the remote controller.
//!
//! Every message in either direction is one `\n`-terminated line of text;
//! a trailing `\r` is tolerated on input.

pub mod codec;

pub use codec::{decode_stream, encode, parse_command, LineDecoder, ParsedCommand};
