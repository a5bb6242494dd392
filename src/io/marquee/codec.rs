// src/io/marquee/codec.rs
//
// Marquee ASCII wire codec.
//
// Message formats:
//   Annotated: <content>|<speed>|<style>___
//   Bare:      raw UTF-8 content, no delimiter (legacy transmit-only path)
//
// `|` separates the three fields and `___` terminates one logical message,
// so several annotated messages may be concatenated in one transmission.
// Neither sequence may appear inside a field; encode rejects content that
// would collide instead of corrupting the stream.

use crate::io::codec::WireCodec;
use crate::io::error::IoError;
use crate::io::{ScrollSpeed, ScrollStyle, WireMessage};

/// Field separator within one annotated message
pub const FIELD_SEPARATOR: char = '|';

/// Terminator between concatenated annotated messages
pub const MESSAGE_TERMINATOR: &str = "___";

/// Protocol name used in error reporting
const PROTOCOL: &str = "marquee";

/// Marquee ASCII protocol codec.
pub struct MarqueeCodec;

/// Result of decoding a received buffer: every valid message plus one
/// reported error per malformed chunk. Malformed chunks never abort the
/// chunks after them.
#[derive(Debug, Default)]
pub struct DecodeBatch {
    pub messages: Vec<WireMessage>,
    pub errors: Vec<IoError>,
}

impl WireCodec for MarqueeCodec {
    /// Raw chunk is one delimiter-stripped ASCII segment
    type RawChunk = str;
    /// Encoded payload is the annotated bytes including the terminator
    type Encoded = Vec<u8>;

    /// Decode one chunk of the form `content|speed|style`.
    ///
    /// Examples:
    ///   `Hello World|Medium|Left-to-Right` -> content "Hello World"
    ///   `Hi|Fast|Bottom-to-Top`            -> content "Hi"
    fn decode(chunk: &str) -> Result<WireMessage, IoError> {
        let fields: Vec<&str> = chunk.split(FIELD_SEPARATOR).collect();
        if fields.len() != 3 {
            return Err(IoError::protocol(
                PROTOCOL,
                format!(
                    "expected 3 fields, got {} in chunk '{}'",
                    fields.len(),
                    chunk
                ),
            ));
        }

        let speed = ScrollSpeed::from_wire(fields[1]).ok_or_else(|| {
            IoError::protocol(PROTOCOL, format!("unknown speed token '{}'", fields[1]))
        })?;
        let style = ScrollStyle::from_wire(fields[2]).ok_or_else(|| {
            IoError::protocol(PROTOCOL, format!("unknown style token '{}'", fields[2]))
        })?;

        Ok(WireMessage {
            content: fields[0].to_string(),
            speed,
            style,
        })
    }

    /// Encode an annotated message, terminator included.
    fn encode(msg: &WireMessage) -> Result<Vec<u8>, IoError> {
        MarqueeCodec::encode(&msg.content, msg.speed, msg.style)
    }
}

impl MarqueeCodec {
    /// Encode `content` with display parameters into annotated wire bytes.
    ///
    /// Content containing a reserved delimiter (`|` or `___`) fails closed
    /// rather than corrupting the stream for every downstream reader.
    pub fn encode(
        content: &str,
        speed: ScrollSpeed,
        style: ScrollStyle,
    ) -> Result<Vec<u8>, IoError> {
        validate_field(content)?;

        let mut payload = String::with_capacity(content.len() + 32);
        payload.push_str(content);
        payload.push(FIELD_SEPARATOR);
        payload.push_str(speed.wire_name());
        payload.push(FIELD_SEPARATOR);
        payload.push_str(style.wire_name());
        payload.push_str(MESSAGE_TERMINATOR);
        Ok(payload.into_bytes())
    }

    /// Bare legacy transmit path: raw UTF-8 bytes, no annotations, no
    /// terminator. Peers on this path do not parse fields.
    pub fn encode_plain(content: &str) -> Vec<u8> {
        content.as_bytes().to_vec()
    }

    /// Decode a received buffer into zero or more messages.
    ///
    /// Splits on `___`, discards empty chunks, and decodes each chunk
    /// independently. A malformed chunk is skipped and reported; decoding
    /// of subsequent chunks continues.
    pub fn decode_batch(raw: &[u8]) -> DecodeBatch {
        let mut batch = DecodeBatch::default();

        let text = match std::str::from_utf8(raw) {
            Ok(t) => t,
            Err(e) => {
                batch
                    .errors
                    .push(IoError::protocol(PROTOCOL, format!("invalid UTF-8: {}", e)));
                return batch;
            }
        };

        for chunk in text.split(MESSAGE_TERMINATOR) {
            if chunk.is_empty() {
                continue;
            }
            match <MarqueeCodec as WireCodec>::decode(chunk) {
                Ok(msg) => batch.messages.push(msg),
                Err(e) => batch.errors.push(e),
            }
        }

        batch
    }
}

/// Reject encode inputs that contain a reserved delimiter.
fn validate_field(content: &str) -> Result<(), IoError> {
    if content.contains(FIELD_SEPARATOR) {
        return Err(IoError::protocol(
            PROTOCOL,
            format!("content contains reserved '{}'", FIELD_SEPARATOR),
        ));
    }
    if content.contains(MESSAGE_TERMINATOR) {
        return Err(IoError::protocol(
            PROTOCOL,
            format!("content contains reserved '{}'", MESSAGE_TERMINATOR),
        ));
    }
    Ok(())
}
