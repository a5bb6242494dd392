// src/io/marquee/reader.rs
//
// Receiver poll loop.
//
// Polls the serial link on a fixed interval, frames the byte stream on the
// message terminator, decodes complete chunks, stamps arrivals, appends
// them to the shared retention store, and persists them. Malformed chunks
// and storage failures are reported and skipped; only transport failures
// end the loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::io::codec::WireCodec;
use crate::io::marquee::codec::MarqueeCodec;
use crate::io::serial::framer::{DelimiterFramer, DEFAULT_MAX_FRAME_LENGTH};
use crate::io::serial::transport::SerialLink;
use crate::io::{now_us, LinkEvent, MessageRecord};
use crate::message_db::MessageDb;
use crate::retention::SharedRetention;
use crate::tlog;

/// Reader configuration
#[derive(Clone, Debug)]
pub struct ReaderConfig {
    /// Poll interval between reads (100 ms in the receiver deployment)
    pub poll_interval: Duration,
    /// Cap on one frame before a forced split
    pub max_frame_length: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            poll_interval: Duration::from_millis(100),
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
        }
    }
}

/// Spawn the blocking poll loop on a dedicated thread.
///
/// The task owns the link; when the loop ends the link is dropped, which
/// closes the port. Cancel by setting `cancel_flag`, then await the handle.
pub fn spawn_reader(
    link: Box<dyn SerialLink>,
    retention: SharedRetention,
    db: Arc<Mutex<MessageDb>>,
    config: ReaderConfig,
    cancel_flag: Arc<AtomicBool>,
    events: mpsc::Sender<LinkEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        run_reader_blocking(link, retention, db, config, cancel_flag, events)
    })
}

/// Blocking poll loop implementation.
fn run_reader_blocking(
    mut link: Box<dyn SerialLink>,
    retention: SharedRetention,
    db: Arc<Mutex<MessageDb>>,
    config: ReaderConfig,
    cancel_flag: Arc<AtomicBool>,
    events: mpsc::Sender<LinkEvent>,
) {
    let port = link.port_name().to_string();
    let mut framer = DelimiterFramer::new(config.max_frame_length);
    let mut buf = [0u8; 256];
    let stream_reason;

    tlog!("[reader:{}] Poll loop started", port);

    loop {
        if cancel_flag.load(Ordering::Relaxed) {
            stream_reason = "stopped";
            break;
        }

        // Only read when the device reports waiting bytes; a failed check
        // means the device went away.
        let waiting = match link.bytes_to_read() {
            Ok(n) => n,
            Err(e) => {
                let _ = events.blocking_send(LinkEvent::TransportError {
                    message: e.to_string(),
                });
                stream_reason = "disconnected";
                break;
            }
        };

        if waiting > 0 {
            match link.read(&mut buf) {
                Ok(n) if n > 0 => {
                    for chunk in framer.feed(&buf[..n]) {
                        handle_chunk(&chunk, &port, &retention, &db, &events);
                    }
                }
                Ok(_) => {
                    // Poll timeout raced the waiting-bytes check; try again
                }
                Err(e) => {
                    let _ = events.blocking_send(LinkEvent::TransportError {
                        message: e.to_string(),
                    });
                    stream_reason = "error";
                    break;
                }
            }
        }

        std::thread::sleep(config.poll_interval);
    }

    // An unterminated trailing chunk decodes best-effort at end of stream
    if let Some(residue) = framer.flush() {
        handle_chunk(&residue, &port, &retention, &db, &events);
    }

    tlog!("[reader:{}] Poll loop ended: {}", port, stream_reason);
    let _ = events.blocking_send(LinkEvent::Ended {
        reason: stream_reason.to_string(),
    });
}

/// Decode one framed chunk and run it through the lifecycle: stamp,
/// retain, persist, report.
fn handle_chunk(
    chunk: &[u8],
    port: &str,
    retention: &SharedRetention,
    db: &Arc<Mutex<MessageDb>>,
    events: &mpsc::Sender<LinkEvent>,
) {
    let text = match std::str::from_utf8(chunk) {
        Ok(t) => t,
        Err(e) => {
            let _ = events.blocking_send(LinkEvent::DecodeError {
                message: format!("invalid UTF-8 in chunk: {}", e),
            });
            return;
        }
    };

    match <MarqueeCodec as WireCodec>::decode(text) {
        Ok(msg) => {
            let record = MessageRecord::from_wire(msg, now_us());

            {
                let mut guard = retention.lock().unwrap_or_else(|e| e.into_inner());
                guard.append(record.clone());
            }

            // Persistence failure is fatal to this save only, never to the loop
            let insert_result = {
                let guard = db.lock().unwrap_or_else(|e| e.into_inner());
                guard.insert(&record.content, record.timestamp_us)
            };
            if let Err(e) = insert_result {
                tlog!("[reader:{}] {}", port, e);
                let _ = events.blocking_send(LinkEvent::StorageError {
                    message: e.to_string(),
                });
            }

            let _ = events.blocking_send(LinkEvent::Received { record });
        }
        Err(e) => {
            let _ = events.blocking_send(LinkEvent::DecodeError {
                message: e.to_string(),
            });
        }
    }
}
