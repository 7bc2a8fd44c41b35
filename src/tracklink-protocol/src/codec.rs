// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Encoding of outbound commands and incremental decoding of inbound lines.

use tracklink_core::CommandRecord;

/// Encode a command as one wire line: `MSG:<message>;X:<x>;Y:<y>\n`.
pub fn encode(record: &CommandRecord) -> Vec<u8> {
    format!("{record}\n").into_bytes()
}

/// Decode `incoming` appended to `buffer`.
///
/// Returns the complete lines in stream order and the bytes left over after
/// the last `\n`, which must be passed back as `buffer` on the next call.
/// Splitting a stream into chunks never changes the resulting lines.
pub fn decode_stream(buffer: &[u8], incoming: &[u8]) -> (Vec<String>, Vec<u8>) {
    // `buffer` may hold terminators of its own, so it is scanned as new input.
    let mut decoder = LineDecoder::new();
    let mut lines = decoder.push(buffer);
    lines.extend(decoder.push(incoming));
    (lines, decoder.into_pending())
}

/// Stateful form of [`decode_stream`] that owns its remainder buffer.
#[derive(Debug, Default)]
pub struct LineDecoder {
    pending: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes read from the socket, returning every line they completed.
    pub fn push(&mut self, incoming: &[u8]) -> Vec<String> {
        // `pending` never holds a `\n`, so only the new bytes are searched.
        let search_from = self.pending.len();
        self.pending.extend_from_slice(incoming);

        let mut lines = Vec::new();
        let mut start = 0;
        let mut cursor = search_from;
        while let Some(pos) = self.pending[cursor..].iter().position(|b| *b == b'\n') {
            let end = cursor + pos;
            if let Some(line) = decode_line(&self.pending[start..end]) {
                lines.push(line);
            }
            start = end + 1;
            cursor = start;
        }
        self.pending.drain(..start);
        lines
    }

    /// Bytes received after the last complete line.
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    pub fn into_pending(self) -> Vec<u8> {
        self.pending
    }
}

fn decode_line(raw: &[u8]) -> Option<String> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    if raw.is_empty() {
        return None;
    }
    Some(String::from_utf8_lossy(raw).into_owned())
}

/// A command line as understood by the controller firmware.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCommand {
    pub message: String,
    pub x: f64,
    pub y: f64,
}

impl ParsedCommand {
    /// Convert to a record, truncating the axes toward zero.
    pub fn to_record(&self) -> CommandRecord {
        CommandRecord::new(self.message.clone(), self.x as i32, self.y as i32)
    }
}

/// Parse `MSG:<text>;X:<num>;Y:<num>` the way the controller does.
///
/// The first `;X:` and `;Y:` delimiters split the line, so the message may
/// contain `;` but not those two sequences. Axis values are trimmed, must be
/// non-empty and may carry a sign and a decimal point.
pub fn parse_command(line: &str) -> Option<ParsedCommand> {
    let rest = line.strip_prefix("MSG:")?;
    let ix = rest.find(";X:")?;
    let iy = rest.find(";Y:")?;
    if iy < ix + 3 {
        return None;
    }

    let message = &rest[..ix];
    let x = parse_number(&rest[ix + 3..iy])?;
    let y = parse_number(&rest[iy + 3..])?;
    Some(ParsedCommand {
        message: message.to_string(),
        x,
        y,
    })
}

fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty()
        || !text
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.'))
    {
        return None;
    }
    text.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const STREAM: &[u8] = b"HELLO from UNO R4 WiFi\r\nACK;MSG:hi;X:1.00;Y:2.00\n\n\r\nERR;BAD_PACKET;x\nz\xc3\xa9\xffq\ntail";

    fn decode_in_chunks(chunks: &[&[u8]]) -> (Vec<String>, Vec<u8>) {
        let mut buffer = Vec::new();
        let mut lines = Vec::new();
        for chunk in chunks {
            let (mut out, rest) = decode_stream(&buffer, chunk);
            lines.append(&mut out);
            buffer = rest;
        }
        (lines, buffer)
    }

    #[test]
    fn test_encode_exact_line() {
        let record = CommandRecord::new("hi", 12, -3);
        assert_eq!(encode(&record), b"MSG:hi;X:12;Y:-3\n".to_vec());
    }

    #[test]
    fn test_encode_then_decode_round_trip() {
        let record = CommandRecord::new("hi", 12, -3);
        let (lines, rest) = decode_stream(&[], &encode(&record));
        assert_eq!(lines, vec!["MSG:hi;X:12;Y:-3".to_string()]);
        assert!(rest.is_empty());

        let parsed = parse_command(&lines[0]).unwrap();
        assert_eq!(parsed.to_record(), record);
    }

    #[test]
    fn test_decode_whole_stream() {
        let (lines, rest) = decode_stream(&[], STREAM);
        assert_eq!(
            lines,
            vec![
                "HELLO from UNO R4 WiFi".to_string(),
                "ACK;MSG:hi;X:1.00;Y:2.00".to_string(),
                "ERR;BAD_PACKET;x".to_string(),
                "z\u{e9}\u{fffd}q".to_string(),
            ]
        );
        assert_eq!(rest, b"tail".to_vec());
    }

    #[test]
    fn test_decode_is_chunk_invariant_for_single_split() {
        let expected = decode_stream(&[], STREAM);
        for split in 0..=STREAM.len() {
            let (a, b) = STREAM.split_at(split);
            assert_eq!(decode_in_chunks(&[a, b]), expected, "split at {split}");
        }
    }

    #[test]
    fn test_decode_is_chunk_invariant_for_two_splits() {
        let expected = decode_stream(&[], STREAM);
        for first in 0..=STREAM.len() {
            for second in first..=STREAM.len() {
                let chunks = [
                    &STREAM[..first],
                    &STREAM[first..second],
                    &STREAM[second..],
                ];
                assert_eq!(decode_in_chunks(&chunks), expected);
            }
        }
    }

    #[test]
    fn test_decode_byte_by_byte() {
        let chunks: Vec<&[u8]> = STREAM.chunks(1).collect();
        assert_eq!(decode_in_chunks(&chunks), decode_stream(&[], STREAM));
    }

    #[test]
    fn test_line_decoder_keeps_partial_line() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(b"ACK;MSG").is_empty());
        assert_eq!(decoder.pending(), b"ACK;MSG");
        assert_eq!(decoder.push(b":a;X:1;Y:2\r"), Vec::<String>::new());
        assert_eq!(decoder.push(b"\nnext"), vec!["ACK;MSG:a;X:1;Y:2".to_string()]);
        assert_eq!(decoder.pending(), b"next");
    }

    #[test]
    fn test_decode_splits_terminators_already_in_buffer() {
        assert_eq!(
            decode_stream(b"a\nb", b"c\n"),
            (vec!["a".to_string(), "bc".to_string()], Vec::new())
        );
        assert_eq!(
            decode_stream(b"x\n", b""),
            (vec!["x".to_string()], Vec::new())
        );
        assert_eq!(
            decode_stream(b"\r\nok\r\npart", b"ial"),
            (vec!["ok".to_string()], b"partial".to_vec())
        );
    }

    #[test]
    fn test_only_one_trailing_cr_is_stripped() {
        let (lines, _) = decode_stream(&[], b"a\r\r\n");
        assert_eq!(lines, vec!["a\r".to_string()]);
    }

    #[test]
    fn test_parse_command_accepts_firmware_grammar() {
        let parsed = parse_command("MSG:go;left;X: -1.5 ;Y:+20").unwrap();
        assert_eq!(parsed.message, "go;left");
        assert_eq!(parsed.x, -1.5);
        assert_eq!(parsed.y, 20.0);
        assert_eq!(parsed.to_record(), CommandRecord::new("go;left", -1, 20));
    }

    #[test]
    fn test_parse_command_rejects_malformed() {
        assert!(parse_command("hello").is_none());
        assert!(parse_command(" MSG:a;X:1;Y:2").is_none());
        assert!(parse_command("MSG:a;X:;Y:2").is_none());
        assert!(parse_command("MSG:a;X:1;Y:").is_none());
        assert!(parse_command("MSG:a;X:1e3;Y:2").is_none());
        assert!(parse_command("MSG:a;Y:2;X:1").is_none());
    }
}
