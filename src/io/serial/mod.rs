// src/io/serial/mod.rs
//
// Serial transport and stream framing.

pub mod framer;
pub mod transport;

pub use framer::DelimiterFramer;
pub use transport::{list_ports, open_link, LoopbackLink, SerialLink, SerialPortInfo};
