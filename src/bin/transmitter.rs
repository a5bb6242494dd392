// src/bin/transmitter.rs
//
// Transmitter CLI: send marquee messages over a serial port, either typed
// ad hoc or picked from the canned-message catalog.
//
// Line commands:
//   <text>            send with the current speed/style
//   /plain <text>     send on the bare legacy path (no annotations)
//   /speed <token>    set Slow | Medium | Fast
//   /style <token>    set Left-to-Right | Bottom-to-Top
//   /list             list catalog entries
//   /add <text>       add a catalog entry
//   /del <id>         delete a catalog entry
//   /send <id>        send a catalog entry
//   /quit             exit

use clap::Parser;
use std::io::{BufRead, Write};

use tickerwire::io::serial::transport::list_ports;
use tickerwire::tlog;
use tickerwire::{load_settings, ScrollSpeed, ScrollStyle, TransmitResult, Transmitter};

#[derive(Parser)]
#[command(name = "tickerwire-tx", about = "Marquee message transmitter")]
struct Args {
    /// Serial port (e.g., COM3, /dev/ttyUSB0); prompted for when omitted
    #[arg(long)]
    port: Option<String>,

    /// Baud rate override
    #[arg(long)]
    baud: Option<u32>,

    /// Catalog database path override
    #[arg(long)]
    catalog: Option<String>,

    /// Send one message and exit instead of starting the prompt
    #[arg(long)]
    message: Option<String>,

    /// List available serial ports and exit
    #[arg(long)]
    list_ports: bool,

    /// Tee log output into timestamped files under this directory
    #[arg(long)]
    log_dir: Option<std::path::PathBuf>,
}

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

fn report(result: &TransmitResult) {
    if result.success {
        match std::str::from_utf8(&result.payload) {
            Ok(text) => tlog!("[tx] Message sent: {}", text),
            Err(_) => tlog!("[tx] Message sent"),
        }
    } else {
        tlog!(
            "[tx] Error: {}",
            result.error.as_deref().unwrap_or("unknown")
        );
    }
}

fn main() -> Result<(), String> {
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
    if let Some(catalog) = args.catalog {
        settings.catalog_db_path = catalog;
    }

    let port = match args.port.or_else(prompt_for_port) {
        Some(port) => port,
        None => return Err("No serial port given".to_string()),
    };

    let mut transmitter = Transmitter::new(settings).map_err(|e| e.to_string())?;
    // One-shot attempt: a failure leaves the user at the shell to retry
    transmitter.connect(&port).map_err(|e| e.to_string())?;

    let mut speed = ScrollSpeed::Medium;
    let mut style = ScrollStyle::LeftToRight;

    if let Some(message) = args.message {
        let result = transmitter.send_marquee(&message, speed, style);
        report(&result);
        transmitter.shutdown();
        return if result.success {
            Ok(())
        } else {
            Err(result.error.unwrap_or_default())
        };
    }

    tlog!(
        "[tx] Connected to {}. Type a message, or /help for commands",
        port
    );

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => break,
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(rest) = input.strip_prefix('/') {
            let (command, arg) = match rest.split_once(' ') {
                Some((command, arg)) => (command, arg.trim()),
                None => (rest, ""),
            };
            match command {
                "quit" | "exit" => break,
                "help" => {
                    println!("<text>, /plain <text>, /speed <token>, /style <token>,");
                    println!("/list, /add <text>, /del <id>, /send <id>, /quit");
                }
                "plain" => report(&transmitter.send_plain(arg)),
                "speed" => match ScrollSpeed::from_wire(arg) {
                    Some(s) => {
                        speed = s;
                        tlog!("[tx] Speed set to {}", speed.wire_name());
                    }
                    None => tlog!("[tx] Unknown speed '{}' (Slow | Medium | Fast)", arg),
                },
                "style" => match ScrollStyle::from_wire(arg) {
                    Some(s) => {
                        style = s;
                        tlog!("[tx] Style set to {}", style.wire_name());
                    }
                    None => tlog!(
                        "[tx] Unknown style '{}' (Left-to-Right | Bottom-to-Top)",
                        arg
                    ),
                },
                "list" => match transmitter.catalog_entries() {
                    Ok(entries) => {
                        for entry in entries {
                            println!("{:>4}  {}", entry.id, entry.content);
                        }
                    }
                    Err(e) => tlog!("[tx] {}", e),
                },
                "add" => match transmitter.catalog_add(arg) {
                    Ok(id) => tlog!("[tx] Added catalog entry {}", id),
                    Err(e) => tlog!("[tx] {}", e),
                },
                "del" => match arg.parse::<i64>() {
                    Ok(id) => match transmitter.catalog_delete(id) {
                        Ok(true) => tlog!("[tx] Deleted catalog entry {}", id),
                        Ok(false) => tlog!("[tx] No catalog entry {}", id),
                        Err(e) => tlog!("[tx] {}", e),
                    },
                    Err(_) => tlog!("[tx] Usage: /del <id>"),
                },
                "send" => match arg.parse::<i64>() {
                    Ok(id) => report(&transmitter.send_from_catalog(id, speed, style)),
                    Err(_) => tlog!("[tx] Usage: /send <id>"),
                },
                _ => tlog!("[tx] Unknown command /{}", command),
            }
        } else {
            report(&transmitter.send_marquee(input, speed, style));
        }
    }

    transmitter.shutdown();
    tickerwire::logging::stop_file_logging();
    Ok(())
}
