// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Background reader for one connection generation.

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use tracklink_core::{InboundLine, LinkError};
use tracklink_protocol::LineDecoder;

use crate::bridge::{EventSender, LinkEvent};

const READ_CHUNK_BYTES: usize = 4096;

/// Spawn the receive loop for `generation`.
///
/// The loop exits on EOF, on a read error (both reported as
/// [`LinkEvent::Closed`]) or silently once `stop_rx` turns `true`.
pub fn spawn_receive_loop<R>(
    reader: R,
    generation: u64,
    events: EventSender,
    stop_rx: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(receive_loop(reader, generation, events, stop_rx))
}

async fn receive_loop<R>(
    mut reader: R,
    generation: u64,
    events: EventSender,
    mut stop_rx: watch::Receiver<bool>,
) where
    R: AsyncRead + Unpin,
{
    let mut decoder = LineDecoder::new();
    let mut buf = vec![0u8; READ_CHUNK_BYTES];

    loop {
        if *stop_rx.borrow() {
            debug!("Receive loop {} stopped", generation);
            return;
        }

        tokio::select! {
            biased;
            changed = stop_rx.changed() => {
                match changed {
                    Ok(()) => continue,
                    Err(_) => {
                        debug!("Receive loop {} lost its owner", generation);
                        return;
                    }
                }
            }
            read = reader.read(&mut buf) => {
                match read {
                    Ok(0) => {
                        debug!("Receive loop {}: end of stream", generation);
                        if !decoder.pending().is_empty() {
                            debug!(
                                "Dropping {} bytes of unterminated input",
                                decoder.pending().len()
                            );
                        }
                        events.push(LinkEvent::Closed { generation, error: None });
                        return;
                    }
                    Ok(n) => {
                        for text in decoder.push(&buf[..n]) {
                            events.push(LinkEvent::Line {
                                generation,
                                line: InboundLine::new(text),
                            });
                        }
                    }
                    Err(e) => {
                        if *stop_rx.borrow() {
                            return;
                        }
                        warn!("Receive loop {}: read failed: {}", generation, e);
                        events.push(LinkEvent::Closed {
                            generation,
                            error: Some(LinkError::ReadFailed(e.to_string())),
                        });
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::io::AsyncWriteExt;

    use crate::bridge::event_bridge;

    fn line_texts(events: &[LinkEvent]) -> Vec<&str> {
        events
            .iter()
            .filter_map(|e| match e {
                LinkEvent::Line { line, .. } => Some(line.text.as_str()),
                LinkEvent::Closed { .. } => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_lines_then_closed_on_eof() {
        let (mut remote, local) = tokio::io::duplex(64);
        let (events, mut bridge) = event_bridge();
        let (_stop_tx, stop_rx) = watch::channel(false);
        let handle = spawn_receive_loop(local, 7, events, stop_rx);

        remote.write_all(b"HELLO\r\nAC").await.unwrap();
        remote.write_all(b"K;1\npartial").await.unwrap();
        drop(remote);
        handle.await.unwrap();

        let drained = bridge.drain();
        assert_eq!(line_texts(&drained), vec!["HELLO", "ACK;1"]);
        assert_eq!(
            drained.last(),
            Some(&LinkEvent::Closed {
                generation: 7,
                error: None
            })
        );
        assert!(drained.iter().all(|e| e.generation() == 7));
    }

    #[tokio::test]
    async fn test_stop_exits_without_event() {
        let (_remote, local) = tokio::io::duplex(64);
        let (events, mut bridge) = event_bridge();
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = spawn_receive_loop(local, 1, events, stop_rx);

        stop_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("loop must stop promptly")
            .unwrap();
        assert!(bridge.drain().is_empty());
    }

    #[tokio::test]
    async fn test_stop_before_first_read() {
        let (_remote, local) = tokio::io::duplex(64);
        let (events, mut bridge) = event_bridge();
        let (_stop_tx, stop_rx) = watch::channel(true);
        spawn_receive_loop(local, 1, events, stop_rx).await.unwrap();
        assert!(bridge.drain().is_empty());
    }
}
