// src/bin/receiver.rs
//
// Receiver CLI: connect to a serial port, print messages as they arrive,
// and expire them after the retention window.

use clap::Parser;
use std::io::Write;
use tokio::sync::mpsc;

use tickerwire::io::serial::transport::list_ports;
use tickerwire::tlog;
use tickerwire::{load_settings, LinkEvent, ReceiverApp};

#[derive(Parser)]
#[command(name = "tickerwire-rx", about = "Marquee message receiver")]
struct Args {
    /// Serial port (e.g., COM3, /dev/ttyUSB0); prompted for when omitted
    #[arg(long)]
    port: Option<String>,

    /// Baud rate override
    #[arg(long)]
    baud: Option<u32>,

    /// Retention window override, in seconds
    #[arg(long)]
    retention_secs: Option<u64>,

    /// Receiver database path override
    #[arg(long)]
    db: Option<String>,

    /// List available serial ports and exit
    #[arg(long)]
    list_ports: bool,

    /// Tee log output into timestamped files under this directory
    #[arg(long)]
    log_dir: Option<std::path::PathBuf>,
}

/// Prompt for a serial port on stdin when none was given on the command line.
fn prompt_for_port() -> Option<String> {
    print!("Enter serial port (e.g., COM3, /dev/ttyUSB0): ");
    let _ = std::io::stdout().flush();
    let mut line = String::new();
    std::io::stdin().read_line(&mut line).ok()?;
    let port = line.trim().to_string();
    if port.is_empty() {
        None
    } else {
        Some(port)
    }
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let args = Args::parse();

    if args.list_ports {
        let ports = list_ports().map_err(|e| e.to_string())?;
        if ports.is_empty() {
            println!("No serial ports found");
        }
        for port in ports {
            println!("{} ({})", port.port_name, port.port_type);
        }
        return Ok(());
    }

    if let Some(ref log_dir) = args.log_dir {
        tickerwire::logging::init_file_logging(log_dir)?;
    }

    let mut settings = load_settings().map_err(|e| e.to_string())?;
    if let Some(baud) = args.baud {
        settings.baud_rate = baud;
    }
    if let Some(secs) = args.retention_secs {
        settings.retention_secs = secs;
    }
    if let Some(db) = args.db {
        settings.receiver_db_path = db;
    }

    let port = match args.port.or_else(prompt_for_port) {
        Some(port) => port,
        None => return Err("No serial port given".to_string()),
    };

    let (events_tx, mut events_rx) = mpsc::channel(256);
    let mut app = ReceiverApp::new(settings);
    app.connect(&port, events_tx).await.map_err(|e| {
        // One-shot attempt: report and leave the user to retry
        e.to_string()
    })?;

    tlog!("[rx] Listening on {} (ctrl-c to quit)", port);

    loop {
        tokio::select! {
            event = events_rx.recv() => {
                match event {
                    Some(LinkEvent::Received { record }) => {
                        let speed = record.speed.map(|s| s.wire_name()).unwrap_or("-");
                        let style = record.style.map(|s| s.wire_name()).unwrap_or("-");
                        tlog!("[rx] {} (speed: {}, style: {})", record.content, speed, style);
                    }
                    Some(LinkEvent::Expired { records }) => {
                        for record in records {
                            tlog!("[rx] Expired: {}", record.content);
                        }
                    }
                    Some(LinkEvent::DecodeError { message })
                    | Some(LinkEvent::TransportError { message })
                    | Some(LinkEvent::StorageError { message }) => {
                        tlog!("[rx] {}", message);
                    }
                    Some(LinkEvent::Connected { .. }) => {}
                    Some(LinkEvent::Ended { reason }) => {
                        tlog!("[rx] Stream ended: {}", reason);
                        break;
                    }
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tlog!("[rx] Interrupted, shutting down");
                break;
            }
        }
    }

    app.shutdown().await;
    tickerwire::logging::stop_file_logging();
    Ok(())
}
