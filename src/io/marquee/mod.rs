// src/io/marquee/mod.rs
//
// Marquee message protocol: ASCII wire codec and the receiver poll loop.

pub mod codec;
pub mod reader;

pub use codec::{DecodeBatch, MarqueeCodec};
pub use reader::{spawn_reader, ReaderConfig};
