// src/io/mod.rs
//
// IO layer for the marquee messaging link.
// Shared message types, the wire codec, delimiter framing, and the serial
// transport live here; the apps in the crate root wire them together.

pub mod codec;
mod error;
pub mod marquee;
pub mod serial;

#[allow(unused_imports)]
pub use codec::{MarqueeCodec, WireCodec};
pub use error::IoError;

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

// ============================================================================
// Shared Types
// ============================================================================

/// Get current time in microseconds since UNIX epoch
pub fn now_us() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

/// Scroll speed hint carried with an annotated message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScrollSpeed {
    Slow,
    Medium,
    Fast,
}

impl ScrollSpeed {
    /// Token used on the wire and in the transmitter dropdown
    pub fn wire_name(&self) -> &'static str {
        match self {
            ScrollSpeed::Slow => "Slow",
            ScrollSpeed::Medium => "Medium",
            ScrollSpeed::Fast => "Fast",
        }
    }

    pub fn from_wire(token: &str) -> Option<Self> {
        match token {
            "Slow" => Some(ScrollSpeed::Slow),
            "Medium" => Some(ScrollSpeed::Medium),
            "Fast" => Some(ScrollSpeed::Fast),
            _ => None,
        }
    }
}

/// Scroll style hint carried with an annotated message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScrollStyle {
    LeftToRight,
    BottomToTop,
}

impl ScrollStyle {
    pub fn wire_name(&self) -> &'static str {
        match self {
            ScrollStyle::LeftToRight => "Left-to-Right",
            ScrollStyle::BottomToTop => "Bottom-to-Top",
        }
    }

    pub fn from_wire(token: &str) -> Option<Self> {
        match token {
            "Left-to-Right" => Some(ScrollStyle::LeftToRight),
            "Bottom-to-Top" => Some(ScrollStyle::BottomToTop),
            _ => None,
        }
    }
}

/// One decoded (or to-be-encoded) annotated message
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    pub content: String,
    pub speed: ScrollSpeed,
    pub style: ScrollStyle,
}

/// A message held by the receiver, stamped on arrival.
///
/// `timestamp_us` is microseconds since the UNIX epoch. Deletion identity
/// on the receiver side is the `(content, timestamp_us)` pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub content: String,
    /// Display hints; `None` for messages restored without annotations
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub speed: Option<ScrollSpeed>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub style: Option<ScrollStyle>,
    pub timestamp_us: u64,
}

impl MessageRecord {
    pub fn from_wire(msg: WireMessage, timestamp_us: u64) -> Self {
        MessageRecord {
            content: msg.content,
            speed: Some(msg.speed),
            style: Some(msg.style),
            timestamp_us,
        }
    }

    /// Restore a record from the durable table (annotations are not persisted)
    pub fn restored(content: String, timestamp_us: u64) -> Self {
        MessageRecord {
            content,
            speed: None,
            style: None,
            timestamp_us,
        }
    }

    /// Age of the record relative to `now_us`, saturating for clock skew
    pub fn age_us(&self, now_us: u64) -> u64 {
        now_us.saturating_sub(self.timestamp_us)
    }
}

// ============================================================================
// Link State & Events
// ============================================================================

/// Connection state of a transmitter or receiver link.
/// Transitions are explicit: Disconnected -> Connecting -> Connected, and
/// back to Disconnected on shutdown or a failed attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

/// Events emitted by the receiver's poll and sweep tasks.
/// The presentation layer renders these; nothing in the core blocks on it.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LinkEvent {
    /// Link opened and the poll loop is running
    Connected { port: String },
    /// A valid annotated message arrived
    Received { record: MessageRecord },
    /// Records evicted by the retention sweep
    Expired { records: Vec<MessageRecord> },
    /// A chunk failed to decode and was skipped
    DecodeError { message: String },
    /// The transport failed mid-stream
    TransportError { message: String },
    /// A persistence call failed; the poll loop continues
    StorageError { message: String },
    /// The poll loop ended: "stopped", "disconnected", or "error"
    Ended { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speed_wire_tokens_roundtrip() {
        for speed in [ScrollSpeed::Slow, ScrollSpeed::Medium, ScrollSpeed::Fast] {
            assert_eq!(ScrollSpeed::from_wire(speed.wire_name()), Some(speed));
        }
        assert_eq!(ScrollSpeed::from_wire("fast"), None);
    }

    #[test]
    fn test_style_wire_tokens_roundtrip() {
        for style in [ScrollStyle::LeftToRight, ScrollStyle::BottomToTop] {
            assert_eq!(ScrollStyle::from_wire(style.wire_name()), Some(style));
        }
        assert_eq!(ScrollStyle::from_wire("Top-to-Bottom"), None);
    }

    #[test]
    fn test_record_age_saturates() {
        let rec = MessageRecord::restored("hi".to_string(), 1_000_000);
        assert_eq!(rec.age_us(1_500_000), 500_000);
        // A record stamped "in the future" has age zero, not an underflow
        assert_eq!(rec.age_us(500_000), 0);
    }
}
