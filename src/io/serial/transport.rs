// src/io/serial/transport.rs
//
// Serial transport behind a small trait so the protocol layer and tests
// never touch device-specific APIs. The real implementation wraps
// `serialport`; `LoopbackLink` is an in-memory pair for simulated links.

use serde::Serialize;
use std::collections::VecDeque;
use std::io::{Read, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::io::error::IoError;

/// Default poll timeout for reads. Short, so the poll loop stays responsive
/// to its cancel flag.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(50);

// ============================================================================
// Transport Trait
// ============================================================================

/// Byte-oriented serial link. Reads return 0 on poll timeout; closing is
/// dropping the link.
pub trait SerialLink: Send {
    /// Number of bytes waiting in the receive buffer
    fn bytes_to_read(&self) -> Result<u32, IoError>;

    /// Read available bytes; returns 0 when the poll timeout elapses
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, IoError>;

    /// Write the full payload
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), IoError>;

    /// Flush the transmit buffer
    fn flush(&mut self) -> Result<(), IoError>;

    /// Port identifier for status reporting
    fn port_name(&self) -> &str;
}

// ============================================================================
// serialport Implementation
// ============================================================================

struct SerialPortLink {
    port: Box<dyn serialport::SerialPort>,
    name: String,
}

impl SerialLink for SerialPortLink {
    fn bytes_to_read(&self) -> Result<u32, IoError> {
        self.port
            .bytes_to_read()
            .map_err(|e| IoError::connection(&self.name, e.to_string()))
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, IoError> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(IoError::connection(&self.name, format!("read error: {}", e))),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), IoError> {
        self.port
            .write_all(bytes)
            .map_err(|e| IoError::connection(&self.name, format!("write error: {}", e)))
    }

    fn flush(&mut self) -> Result<(), IoError> {
        self.port
            .flush()
            .map_err(|e| IoError::connection(&self.name, format!("flush error: {}", e)))
    }

    fn port_name(&self) -> &str {
        &self.name
    }
}

/// Open a serial device at the given port and baud rate (8N1).
///
/// The timeout bounds a single `read`; expiry surfaces as a 0-byte read,
/// not an error.
pub fn open_link(
    port: &str,
    baud_rate: u32,
    read_timeout: Duration,
) -> Result<Box<dyn SerialLink>, IoError> {
    let handle = serialport::new(port, baud_rate)
        .timeout(read_timeout)
        .open()
        .map_err(|e| IoError::connection(port, e.to_string()))?;

    Ok(Box::new(SerialPortLink {
        port: handle,
        name: port.to_string(),
    }))
}

// ============================================================================
// Port Enumeration
// ============================================================================

/// Information about an available serial port
#[derive(Clone, Serialize)]
pub struct SerialPortInfo {
    pub port_name: String,
    pub port_type: String,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
}

/// List available serial ports.
///
/// On macOS, filters out /dev/tty.* devices and only shows /dev/cu.* devices.
/// The cu (calling unit) devices are non-blocking and preferred for outgoing
/// connections; the tty devices block on open waiting for carrier detect.
pub fn list_ports() -> Result<Vec<SerialPortInfo>, IoError> {
    let ports = serialport::available_ports()
        .map_err(|e| IoError::connection("enumeration", e.to_string()))?;

    Ok(ports
        .into_iter()
        .filter(|_p| {
            #[cfg(target_os = "macos")]
            {
                !_p.port_name.starts_with("/dev/tty.")
            }
            #[cfg(not(target_os = "macos"))]
            {
                true
            }
        })
        .map(|p| {
            let (port_type, manufacturer, product) = match p.port_type {
                serialport::SerialPortType::UsbPort(info) => {
                    ("USB".to_string(), info.manufacturer, info.product)
                }
                serialport::SerialPortType::BluetoothPort => {
                    ("Bluetooth".to_string(), None, None)
                }
                serialport::SerialPortType::PciPort => ("PCI".to_string(), None, None),
                serialport::SerialPortType::Unknown => ("Unknown".to_string(), None, None),
            };
            SerialPortInfo {
                port_name: p.port_name,
                port_type,
                manufacturer,
                product,
            }
        })
        .collect())
}

// ============================================================================
// Loopback Implementation
// ============================================================================

/// In-memory serial link: whatever one end writes, the other end reads.
/// Used for simulated-transport tests and wire-format experiments.
pub struct LoopbackLink {
    rx: Arc<Mutex<VecDeque<u8>>>,
    tx: Arc<Mutex<VecDeque<u8>>>,
    name: String,
}

impl LoopbackLink {
    /// Create a connected pair of link endpoints.
    pub fn pair() -> (LoopbackLink, LoopbackLink) {
        let a_to_b = Arc::new(Mutex::new(VecDeque::new()));
        let b_to_a = Arc::new(Mutex::new(VecDeque::new()));

        let a = LoopbackLink {
            rx: b_to_a.clone(),
            tx: a_to_b.clone(),
            name: "loopback-a".to_string(),
        };
        let b = LoopbackLink {
            rx: a_to_b,
            tx: b_to_a,
            name: "loopback-b".to_string(),
        };
        (a, b)
    }
}

impl SerialLink for LoopbackLink {
    fn bytes_to_read(&self) -> Result<u32, IoError> {
        Ok(self.rx.lock().unwrap_or_else(|e| e.into_inner()).len() as u32)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, IoError> {
        let mut queue = self.rx.lock().unwrap_or_else(|e| e.into_inner());
        let mut n = 0;
        while n < buf.len() {
            match queue.pop_front() {
                Some(byte) => {
                    buf[n] = byte;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), IoError> {
        let mut queue = self.tx.lock().unwrap_or_else(|e| e.into_inner());
        queue.extend(bytes.iter().copied());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), IoError> {
        Ok(())
    }

    fn port_name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loopback_write_read() {
        let (mut a, mut b) = LoopbackLink::pair();
        a.write_all(b"hello").unwrap();
        assert_eq!(b.bytes_to_read().unwrap(), 5);

        let mut buf = [0u8; 16];
        let n = b.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");
        assert_eq!(b.bytes_to_read().unwrap(), 0);
    }

    #[test]
    fn test_loopback_read_empty_is_zero() {
        let (_a, mut b) = LoopbackLink::pair();
        let mut buf = [0u8; 8];
        assert_eq!(b.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_loopback_is_full_duplex() {
        let (mut a, mut b) = LoopbackLink::pair();
        a.write_all(b"ping").unwrap();
        b.write_all(b"pong").unwrap();

        let mut buf = [0u8; 8];
        let n = a.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"pong");
        let n = b.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"ping");
    }

    #[test]
    fn test_loopback_partial_read() {
        let (mut a, mut b) = LoopbackLink::pair();
        a.write_all(b"abcdef").unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(b.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(b.bytes_to_read().unwrap(), 2);
    }
}
