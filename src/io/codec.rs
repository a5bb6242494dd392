// src/io/codec.rs
//
// Wire codec trait and re-export of the marquee implementation.
//
// The trait is shaped for single-chunk operations; batch decoding of a
// received buffer (zero or more concatenated messages) lives on the
// implementation as an inherent function, since the skip-and-report policy
// for malformed chunks is protocol-specific.

use crate::io::error::IoError;
use crate::io::WireMessage;

// ============================================================================
// Wire Codec Trait
// ============================================================================

/// Trait for marquee message codecs.
///
/// The associated types define the protocol-specific raw chunk and encoded
/// payload formats.
pub trait WireCodec {
    /// The raw chunk type for decoding (e.g., a delimiter-stripped string)
    type RawChunk: ?Sized;

    /// The encoded payload type for transmission
    type Encoded;

    /// Decode one raw chunk into a WireMessage.
    ///
    /// Returns `Err(IoError)` if the chunk is malformed; the caller decides
    /// whether to skip or abort.
    fn decode(raw: &Self::RawChunk) -> Result<WireMessage, IoError>;

    /// Encode a message for transmission.
    ///
    /// Returns `Err(IoError)` if the message cannot be represented on the
    /// wire (e.g., content contains a reserved delimiter).
    fn encode(msg: &WireMessage) -> Result<Self::Encoded, IoError>;
}

// ============================================================================
// Re-exports
// ============================================================================

pub use super::marquee::codec::{DecodeBatch, MarqueeCodec};
