// src/transmit.rs
//
// Transmitter application: encodes marquee messages and writes them to the
// serial link, with a durable catalog of reusable canned messages.
//
// Two send paths exist on the wire: the annotated format the receiver
// parses, and the bare legacy path that writes raw content bytes with no
// delimiter for peers that do not parse fields.

use serde::Serialize;
use std::path::Path;

use crate::catalog::{Catalog, CatalogEntry};
use crate::io::marquee::codec::MarqueeCodec;
use crate::io::serial::transport::{open_link, SerialLink, DEFAULT_READ_TIMEOUT};
use crate::io::{now_us, IoError, LinkState, ScrollSpeed, ScrollStyle};
use crate::settings::AppSettings;
use crate::tlog;

/// Result of a transmit operation, for the status surface.
#[derive(Clone, Debug, Serialize)]
pub struct TransmitResult {
    /// Whether the transmission was successful
    pub success: bool,
    /// Timestamp when the payload was sent (microseconds since UNIX epoch)
    pub timestamp_us: u64,
    /// Bytes written on the wire (empty on failure)
    pub payload: Vec<u8>,
    /// Error message if transmission failed
    pub error: Option<String>,
}

impl TransmitResult {
    fn success(payload: Vec<u8>) -> Self {
        TransmitResult {
            success: true,
            timestamp_us: now_us(),
            payload,
            error: None,
        }
    }

    fn error(message: String) -> Self {
        TransmitResult {
            success: false,
            timestamp_us: now_us(),
            payload: Vec::new(),
            error: Some(message),
        }
    }
}

/// Transmitter application state.
pub struct Transmitter {
    settings: AppSettings,
    state: LinkState,
    link: Option<Box<dyn SerialLink>>,
    catalog: Catalog,
}

impl Transmitter {
    /// Create a transmitter with its catalog opened (and seeded on first
    /// run). The link is connected separately.
    pub fn new(settings: AppSettings) -> Result<Self, IoError> {
        settings.validate()?;
        let catalog = Catalog::open(Path::new(&settings.catalog_db_path))?;
        Ok(Transmitter {
            settings,
            state: LinkState::Disconnected,
            link: None,
            catalog,
        })
    }

    #[cfg(test)]
    fn with_in_memory_catalog(settings: AppSettings) -> Self {
        Transmitter {
            settings,
            state: LinkState::Disconnected,
            link: None,
            catalog: Catalog::open_in_memory().expect("in-memory catalog"),
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Connect to `port`. One-shot: on failure the state returns to
    /// `Disconnected` and the caller decides whether to retry.
    pub fn connect(&mut self, port: &str) -> Result<(), IoError> {
        self.state = LinkState::Connecting;
        match open_link(port, self.settings.baud_rate, DEFAULT_READ_TIMEOUT) {
            Ok(link) => {
                self.link = Some(link);
                self.state = LinkState::Connected;
                tlog!("[transmit] Connected to {} at {} baud", port, self.settings.baud_rate);
                Ok(())
            }
            Err(e) => {
                self.state = LinkState::Disconnected;
                Err(e)
            }
        }
    }

    /// Attach an already-open link (simulated transports in tests).
    pub fn attach_link(&mut self, link: Box<dyn SerialLink>) {
        self.link = Some(link);
        self.state = LinkState::Connected;
    }

    /// Send an annotated marquee message.
    pub fn send_marquee(
        &mut self,
        content: &str,
        speed: ScrollSpeed,
        style: ScrollStyle,
    ) -> TransmitResult {
        if content.is_empty() {
            return TransmitResult::error("Please enter a message to send".to_string());
        }
        let payload = match MarqueeCodec::encode(content, speed, style) {
            Ok(p) => p,
            Err(e) => return TransmitResult::error(e.to_string()),
        };
        self.write_payload(payload)
    }

    /// Send raw content bytes on the bare legacy path.
    pub fn send_plain(&mut self, content: &str) -> TransmitResult {
        if content.is_empty() {
            return TransmitResult::error("Please enter a message to send".to_string());
        }
        self.write_payload(MarqueeCodec::encode_plain(content))
    }

    fn write_payload(&mut self, payload: Vec<u8>) -> TransmitResult {
        let link = match self.link.as_mut() {
            Some(link) => link,
            None => return TransmitResult::error("Not connected".to_string()),
        };

        let result = link.write_all(&payload).and_then(|_| link.flush());
        match result {
            Ok(()) => TransmitResult::success(payload),
            Err(e) => {
                tlog!("[transmit] {}", e);
                TransmitResult::error(e.to_string())
            }
        }
    }

    // ------------------------------------------------------------------
    // Catalog access
    // ------------------------------------------------------------------

    pub fn catalog_entries(&self) -> Result<Vec<CatalogEntry>, IoError> {
        self.catalog.list()
    }

    pub fn catalog_add(&self, content: &str) -> Result<i64, IoError> {
        self.catalog.add(content)
    }

    pub fn catalog_get(&self, id: i64) -> Result<Option<CatalogEntry>, IoError> {
        self.catalog.get(id)
    }

    pub fn catalog_delete(&self, id: i64) -> Result<bool, IoError> {
        self.catalog.delete(id)
    }

    /// Send a canned message from the catalog by id.
    pub fn send_from_catalog(
        &mut self,
        id: i64,
        speed: ScrollSpeed,
        style: ScrollStyle,
    ) -> TransmitResult {
        match self.catalog.get(id) {
            Ok(Some(entry)) => self.send_marquee(&entry.content, speed, style),
            Ok(None) => TransmitResult::error(format!("No catalog entry with id {}", id)),
            Err(e) => TransmitResult::error(e.to_string()),
        }
    }

    /// Drop the link and close the catalog. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.link.take().is_some() {
            tlog!("[transmit] Link closed");
        }
        self.catalog.close();
        self.state = LinkState::Disconnected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::serial::transport::LoopbackLink;

    fn make_transmitter() -> (Transmitter, LoopbackLink) {
        let (tx_end, rx_end) = LoopbackLink::pair();
        let mut transmitter = Transmitter::with_in_memory_catalog(AppSettings::default());
        transmitter.attach_link(Box::new(tx_end));
        (transmitter, rx_end)
    }

    fn read_all(link: &mut LoopbackLink) -> Vec<u8> {
        let mut buf = [0u8; 512];
        let n = link.read(&mut buf).unwrap();
        buf[..n].to_vec()
    }

    #[test]
    fn test_send_marquee_writes_annotated_payload() {
        let (mut transmitter, mut rx) = make_transmitter();
        let result =
            transmitter.send_marquee("Hello", ScrollSpeed::Medium, ScrollStyle::LeftToRight);
        assert!(result.success);
        assert_eq!(read_all(&mut rx), b"Hello|Medium|Left-to-Right___");
    }

    #[test]
    fn test_send_plain_writes_bare_bytes() {
        let (mut transmitter, mut rx) = make_transmitter();
        let result = transmitter.send_plain("ad hoc");
        assert!(result.success);
        assert_eq!(read_all(&mut rx), b"ad hoc");
    }

    #[test]
    fn test_send_rejects_empty_message() {
        let (mut transmitter, _rx) = make_transmitter();
        let result = transmitter.send_marquee("", ScrollSpeed::Slow, ScrollStyle::LeftToRight);
        assert!(!result.success);
        assert!(result.error.unwrap().contains("enter a message"));
    }

    #[test]
    fn test_send_rejects_reserved_delimiter() {
        let (mut transmitter, mut rx) = make_transmitter();
        let result =
            transmitter.send_marquee("a|b", ScrollSpeed::Slow, ScrollStyle::LeftToRight);
        assert!(!result.success);
        // Nothing corrupt went out on the wire
        assert_eq!(rx.bytes_to_read().unwrap(), 0);
    }

    #[test]
    fn test_send_without_link_fails() {
        let mut transmitter = Transmitter::with_in_memory_catalog(AppSettings::default());
        let result = transmitter.send_plain("hello");
        assert!(!result.success);
        assert_eq!(result.error.unwrap(), "Not connected");
    }

    #[test]
    fn test_send_from_catalog() {
        let (mut transmitter, mut rx) = make_transmitter();
        let id = transmitter.catalog_add("Canned greeting").unwrap();

        let result = transmitter.send_from_catalog(id, ScrollSpeed::Fast, ScrollStyle::BottomToTop);
        assert!(result.success);
        assert_eq!(read_all(&mut rx), b"Canned greeting|Fast|Bottom-to-Top___");

        let missing = transmitter.send_from_catalog(9999, ScrollSpeed::Fast, ScrollStyle::BottomToTop);
        assert!(!missing.success);
    }

    #[test]
    fn test_catalog_seeded_on_open() {
        let (transmitter, _rx) = make_transmitter();
        let entries = transmitter.catalog_entries().unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_shutdown_twice_is_safe() {
        let (mut transmitter, _rx) = make_transmitter();
        transmitter.shutdown();
        transmitter.shutdown();
        assert_eq!(transmitter.state(), LinkState::Disconnected);
    }

    #[test]
    fn test_batched_sends_concatenate_on_wire() {
        let (mut transmitter, mut rx) = make_transmitter();
        transmitter.send_marquee("a", ScrollSpeed::Slow, ScrollStyle::LeftToRight);
        transmitter.send_marquee("b", ScrollSpeed::Fast, ScrollStyle::BottomToTop);

        let wire = read_all(&mut rx);
        assert_eq!(wire, b"a|Slow|Left-to-Right___b|Fast|Bottom-to-Top___");

        // The receiver-side batch decode sees both, in order
        let batch = MarqueeCodec::decode_batch(&wire);
        assert_eq!(batch.messages.len(), 2);
        assert_eq!(batch.messages[0].content, "a");
        assert_eq!(batch.messages[1].content, "b");
    }
}
