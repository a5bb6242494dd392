// src/receiver.rs
//
// Receiver application: connection state machine, task lifecycle, and the
// retention sweep.
//
// The poll task and the sweep task share the retention store through one
// mutex; the durable table is authoritative and the store is rebuilt from
// it on connect. Shutdown runs in a fixed order on every exit path: stop
// the poll task (which closes the transport), stop the sweep task, close
// the persistence adapter.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::io::marquee::reader::{spawn_reader, ReaderConfig};
use crate::io::serial::transport::{open_link, SerialLink, DEFAULT_READ_TIMEOUT};
use crate::io::{now_us, IoError, LinkEvent, LinkState, MessageRecord};
use crate::message_db::MessageDb;
use crate::retention::{RetentionStore, SharedRetention};
use crate::settings::AppSettings;
use crate::tlog;

/// Receiver application state.
pub struct ReceiverApp {
    settings: AppSettings,
    state: LinkState,
    retention: SharedRetention,
    db: Option<Arc<Mutex<MessageDb>>>,
    cancel_flag: Arc<AtomicBool>,
    reader_handle: Option<JoinHandle<()>>,
    sweep_handle: Option<JoinHandle<()>>,
}

impl ReceiverApp {
    pub fn new(settings: AppSettings) -> Self {
        ReceiverApp {
            settings,
            state: LinkState::Disconnected,
            retention: RetentionStore::shared(),
            db: None,
            cancel_flag: Arc::new(AtomicBool::new(false)),
            reader_handle: None,
            sweep_handle: None,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Ordered view of retained messages for rendering.
    pub fn snapshot(&self) -> Vec<MessageRecord> {
        self.retention
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .snapshot()
    }

    /// Connect to `port` and start the poll and sweep tasks.
    ///
    /// A failed attempt is one-shot: the state returns to `Disconnected`
    /// and the caller decides whether to retry.
    pub async fn connect(
        &mut self,
        port: &str,
        events: mpsc::Sender<LinkEvent>,
    ) -> Result<(), IoError> {
        if self.state == LinkState::Connected {
            return Err(IoError::configuration("Already connected"));
        }
        self.settings.validate()?;
        self.state = LinkState::Connecting;

        let link = match open_link(port, self.settings.baud_rate, DEFAULT_READ_TIMEOUT) {
            Ok(link) => link,
            Err(e) => {
                self.state = LinkState::Disconnected;
                return Err(e);
            }
        };

        self.start_with_link(link, port, events).await
    }

    /// Start against an already-open link. Used by `connect` and by tests
    /// that drive a simulated transport.
    pub async fn start_with_link(
        &mut self,
        link: Box<dyn SerialLink>,
        port: &str,
        events: mpsc::Sender<LinkEvent>,
    ) -> Result<(), IoError> {
        self.state = LinkState::Connecting;

        let db = match MessageDb::open(std::path::Path::new(&self.settings.receiver_db_path)) {
            Ok(db) => Arc::new(Mutex::new(db)),
            Err(e) => {
                self.state = LinkState::Disconnected;
                return Err(e);
            }
        };

        self.replay_persisted(&db)?;

        self.cancel_flag.store(false, Ordering::Relaxed);
        let reader_config = ReaderConfig {
            poll_interval: self.settings.poll_interval(),
            ..ReaderConfig::default()
        };
        let reader_handle = spawn_reader(
            link,
            self.retention.clone(),
            db.clone(),
            reader_config,
            self.cancel_flag.clone(),
            events.clone(),
        );

        let sweep_handle = spawn_sweeper(
            self.retention.clone(),
            db.clone(),
            self.settings.clone(),
            self.cancel_flag.clone(),
            events.clone(),
        );

        self.db = Some(db);
        self.reader_handle = Some(reader_handle);
        self.sweep_handle = Some(sweep_handle);
        self.state = LinkState::Connected;

        let _ = events
            .send(LinkEvent::Connected {
                port: port.to_string(),
            })
            .await;
        tlog!("[receiver] Connected to {} at {} baud", port, self.settings.baud_rate);
        Ok(())
    }

    /// Rebuild the retention cache from the durable table, dropping rows
    /// that expired while the application was down.
    fn replay_persisted(&self, db: &Arc<Mutex<MessageDb>>) -> Result<(), IoError> {
        let now = now_us();
        let ttl_us = self.settings.retention().as_micros() as u64;

        let guard = db.lock().unwrap_or_else(|e| e.into_inner());
        let rows = guard.load_all()?;
        let expired = guard.delete_expired(now, ttl_us)?;
        drop(guard);

        let mut store = self.retention.lock().unwrap_or_else(|e| e.into_inner());
        let mut restored = 0;
        for (content, timestamp_us) in rows {
            if now.saturating_sub(timestamp_us) < ttl_us {
                store.append(MessageRecord::restored(content, timestamp_us));
                restored += 1;
            }
        }

        if restored > 0 || expired > 0 {
            tlog!(
                "[receiver] Replayed {} persisted message(s), dropped {} expired",
                restored,
                expired
            );
        }
        Ok(())
    }

    /// Stop tasks and release resources, in order, on any exit path:
    /// poll task first (closing the transport), then the sweep task, then
    /// the persistence adapter. Safe to call when never connected.
    pub async fn shutdown(&mut self) {
        self.cancel_flag.store(true, Ordering::Relaxed);

        // The reader owns the link; joining it closes the port.
        if let Some(handle) = self.reader_handle.take() {
            let _ = handle.await;
        }
        if let Some(handle) = self.sweep_handle.take() {
            let _ = handle.await;
        }
        if let Some(db) = self.db.take() {
            db.lock().unwrap_or_else(|e| e.into_inner()).close();
        }

        if self.state != LinkState::Disconnected {
            tlog!("[receiver] Shut down");
        }
        self.state = LinkState::Disconnected;
    }
}

/// Spawn the periodic sweep task: every sweep interval, evict expired
/// records from the retention store and purge expired rows from the
/// durable table. The two sweeps are independent; a storage failure never
/// blocks the in-memory eviction.
fn spawn_sweeper(
    retention: SharedRetention,
    db: Arc<Mutex<MessageDb>>,
    settings: AppSettings,
    cancel_flag: Arc<AtomicBool>,
    events: mpsc::Sender<LinkEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let ttl = settings.retention();
        let mut ticker = tokio::time::interval(settings.sweep_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if cancel_flag.load(Ordering::Relaxed) {
                break;
            }

            let now = now_us();
            let evicted = {
                let mut store = retention.lock().unwrap_or_else(|e| e.into_inner());
                store.sweep(now, ttl)
            };

            // Purge the durable table on the same tick. Independent of the
            // in-memory sweep: a storage failure never blocks eviction.
            let purge_result = {
                let guard = db.lock().unwrap_or_else(|e| e.into_inner());
                guard.delete_expired(now, ttl.as_micros() as u64)
            };
            if let Err(e) = purge_result {
                let _ = events
                    .send(LinkEvent::StorageError {
                        message: e.to_string(),
                    })
                    .await;
            }

            if !evicted.is_empty() {
                let _ = events.send(LinkEvent::Expired { records: evicted }).await;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::serial::transport::LoopbackLink;
    use crate::io::{ScrollSpeed, ScrollStyle};
    use std::time::Duration;

    fn test_settings(db_path: &str) -> AppSettings {
        AppSettings {
            receiver_db_path: db_path.to_string(),
            poll_interval_ms: 5,
            sweep_interval_ms: 20,
            retention_secs: 600,
            ..AppSettings::default()
        }
    }

    fn temp_db(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!(
            "tickerwire-rx-{}-{}.db",
            tag,
            std::process::id()
        ))
    }

    #[tokio::test]
    async fn test_end_to_end_receive_persist_expire() {
        let db_path = temp_db("e2e");
        let _ = std::fs::remove_file(&db_path);

        let (mut tx_end, rx_end) = LoopbackLink::pair();
        let (events_tx, mut events_rx) = mpsc::channel(64);

        let mut app = ReceiverApp::new(test_settings(db_path.to_str().unwrap()));
        assert_eq!(app.state(), LinkState::Disconnected);

        app.start_with_link(Box::new(rx_end), "loopback-b", events_tx)
            .await
            .unwrap();
        assert_eq!(app.state(), LinkState::Connected);

        // Transmit one annotated message over the simulated link
        tx_end.write_all(b"Hi|Fast|Bottom-to-Top___").unwrap();

        let record = loop {
            match events_rx.recv().await {
                Some(LinkEvent::Received { record }) => break record,
                Some(_) => continue,
                None => panic!("reader ended early"),
            }
        };
        assert_eq!(record.content, "Hi");
        assert_eq!(record.speed, Some(ScrollSpeed::Fast));
        assert_eq!(record.style, Some(ScrollStyle::BottomToTop));

        // Visible in the snapshot immediately
        let snapshot = app.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].content, "Hi");

        // Advancing simulated time past the TTL expires it
        let ttl = app.settings.retention();
        let future = now_us() + ttl.as_micros() as u64 + 1;
        let evicted = app
            .retention
            .lock()
            .unwrap()
            .sweep(future, ttl);
        assert_eq!(evicted.len(), 1);
        assert!(app.snapshot().is_empty());

        app.shutdown().await;
        assert_eq!(app.state(), LinkState::Disconnected);
        let _ = std::fs::remove_file(&db_path);
    }

    #[tokio::test]
    async fn test_connect_failure_returns_to_disconnected() {
        let (events_tx, _events_rx) = mpsc::channel(8);
        let mut app = ReceiverApp::new(test_settings("/tmp/unused.db"));

        // A port that cannot exist: the attempt is one-shot
        let err = app
            .connect("/dev/tickerwire-no-such-port", events_tx)
            .await
            .unwrap_err();
        assert!(matches!(err, IoError::Connection { .. }));
        assert_eq!(app.state(), LinkState::Disconnected);
    }

    #[tokio::test]
    async fn test_startup_replay_restores_unexpired_rows() {
        let db_path = temp_db("replay");
        let _ = std::fs::remove_file(&db_path);
        let settings = test_settings(db_path.to_str().unwrap());
        let ttl_us = settings.retention().as_micros() as u64;

        // Seed the durable table with one fresh and one expired row
        {
            let db = MessageDb::open(std::path::Path::new(&settings.receiver_db_path)).unwrap();
            db.insert("fresh", now_us()).unwrap();
            db.insert("stale", now_us().saturating_sub(ttl_us + 1)).unwrap();
        }

        let (_tx_end, rx_end) = LoopbackLink::pair();
        let (events_tx, _events_rx) = mpsc::channel(64);
        let mut app = ReceiverApp::new(settings);
        app.start_with_link(Box::new(rx_end), "loopback-b", events_tx)
            .await
            .unwrap();

        let snapshot = app.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].content, "fresh");
        // Restored rows carry no display annotations
        assert_eq!(snapshot[0].speed, None);

        // The expired row was purged from the table during replay
        let rows = app.db.as_ref().unwrap().lock().unwrap().load_all().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, "fresh");

        app.shutdown().await;
        let _ = std::fs::remove_file(&db_path);
    }

    #[tokio::test]
    async fn test_sweep_task_expires_and_purges() {
        let db_path = temp_db("sweep");
        let _ = std::fs::remove_file(&db_path);
        // A 1-second TTL so the sweep task can do real work quickly
        let settings = AppSettings {
            receiver_db_path: db_path.to_str().unwrap().to_string(),
            poll_interval_ms: 5,
            sweep_interval_ms: 20,
            retention_secs: 1,
            ..AppSettings::default()
        };

        let (mut tx_end, rx_end) = LoopbackLink::pair();
        let (events_tx, mut events_rx) = mpsc::channel(64);
        let mut app = ReceiverApp::new(settings);
        app.start_with_link(Box::new(rx_end), "loopback-b", events_tx)
            .await
            .unwrap();

        tx_end.write_all(b"gone soon|Slow|Left-to-Right___").unwrap();

        // The sweep task must evict it within a couple of seconds
        let expired = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match events_rx.recv().await {
                    Some(LinkEvent::Expired { records }) => break records,
                    Some(_) => continue,
                    None => panic!("events channel closed"),
                }
            }
        })
        .await
        .expect("sweep task never expired the record");

        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].content, "gone soon");
        assert!(app.snapshot().is_empty());

        // And the durable row is purged too
        let rows = app.db.as_ref().unwrap().lock().unwrap().load_all().unwrap();
        assert!(rows.is_empty());

        app.shutdown().await;
        let _ = std::fs::remove_file(&db_path);
    }

    #[tokio::test]
    async fn test_shutdown_without_connect_is_safe() {
        let mut app = ReceiverApp::new(test_settings("/tmp/unused.db"));
        app.shutdown().await;
        app.shutdown().await;
        assert_eq!(app.state(), LinkState::Disconnected);
    }

    #[tokio::test]
    async fn test_shutdown_closes_adapter_once() {
        let db_path = temp_db("close");
        let _ = std::fs::remove_file(&db_path);
        let (_tx_end, rx_end) = LoopbackLink::pair();
        let (events_tx, _events_rx) = mpsc::channel(64);

        let mut app = ReceiverApp::new(test_settings(db_path.to_str().unwrap()));
        app.start_with_link(Box::new(rx_end), "loopback-b", events_tx)
            .await
            .unwrap();

        app.shutdown().await;
        // Second shutdown must be a no-op, not a double close
        app.shutdown().await;
        assert_eq!(app.state(), LinkState::Disconnected);
        let _ = std::fs::remove_file(&db_path);
    }
}
