//! rgbclient Demo Server
//!
//! Accepts clients and broadcasts color frames typed on stdin:
//!
//! ```text
//! abs R G B     ABSOLUTE, values 0-255
//! rel R G B     RELATIVE, values -32768..32767
//! raw BYTE      a single raw byte (e.g. `raw 7` to trigger a protocol error)
//! kick          disconnect every client
//! ```

use std::io::{self, BufRead, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

use clap::Parser;
use parking_lot::Mutex;
use rgbclient::protocol::encode_frame;
use rgbclient::Command;
use tracing_subscriber::{fmt, EnvFilter};

/// rgbclient demo server
#[derive(Parser, Debug)]
#[command(name = "rgb-server")]
#[command(about = "Broadcasts color commands typed on stdin")]
#[command(version)]
struct Args {
    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:4242")]
    listen: String,
}

type Clients = Arc<Mutex<Vec<TcpStream>>>;

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,rgbclient=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let listener = match TcpListener::bind(&args.listen) {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", args.listen, e);
            std::process::exit(1);
        }
    };
    tracing::info!("Listening on {}", args.listen);

    let clients: Clients = Arc::new(Mutex::new(Vec::new()));

    let acceptor_clients = Arc::clone(&clients);
    let acceptor = thread::Builder::new()
        .name("rgb-acceptor".to_string())
        .spawn(move || accept_loop(listener, acceptor_clients));
    if let Err(e) = acceptor {
        tracing::error!("Failed to start acceptor: {}", e);
        std::process::exit(1);
    }

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::error!("Failed to read stdin: {}", e);
                break;
            }
        };

        if line.trim() == "kick" {
            kick(&clients);
            continue;
        }

        match parse_line(&line) {
            Ok(Some(bytes)) => broadcast(&clients, &bytes),
            Ok(None) => {}
            Err(message) => println!("{}", message),
        }
    }
}

fn accept_loop(listener: TcpListener, clients: Clients) {
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let peer = stream
                    .peer_addr()
                    .map(|a| a.to_string())
                    .unwrap_or_else(|_| "unknown".to_string());
                tracing::info!("Client connected from {}", peer);
                let _ = stream.set_nodelay(true);
                clients.lock().push(stream);
            }
            Err(e) => tracing::warn!("Accept failed: {}", e),
        }
    }
}

/// Write to every client, dropping the ones that fail
fn broadcast(clients: &Clients, bytes: &[u8]) {
    let mut clients = clients.lock();
    clients.retain_mut(|stream| match stream.write_all(bytes).and_then(|_| stream.flush()) {
        Ok(()) => true,
        Err(e) => {
            tracing::info!("Dropping client: {}", e);
            false
        }
    });
    tracing::debug!("Sent {} bytes to {} clients", bytes.len(), clients.len());
}

/// Disconnect every client
fn kick(clients: &Clients) {
    let mut clients = clients.lock();
    for stream in clients.drain(..) {
        let _ = stream.shutdown(std::net::Shutdown::Both);
    }
    tracing::info!("Disconnected all clients");
}

/// Turn one stdin line into the bytes to broadcast
fn parse_line(line: &str) -> Result<Option<Vec<u8>>, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((&verb, rest)) = words.split_first() else {
        return Ok(None);
    };

    match verb {
        "abs" | "rel" => {
            let values = rest
                .iter()
                .map(|w| w.parse::<i32>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| format!("invalid value: {}", e))?;
            let &[r, g, b] = values.as_slice() else {
                return Err(format!("{} needs exactly three values", verb));
            };
            let instruction = if verb == "abs" {
                rgbclient::Instruction::Absolute
            } else {
                rgbclient::Instruction::Relative
            };
            let bytes = encode_frame(&Command::new(instruction, r, g, b))
                .map_err(|e| e.to_string())?;
            Ok(Some(bytes.to_vec()))
        }
        "raw" => {
            let byte = rest
                .first()
                .ok_or_else(|| "raw needs a byte value".to_string())?
                .parse::<u8>()
                .map_err(|e| format!("invalid byte: {}", e))?;
            Ok(Some(vec![byte]))
        }
        other => Err(format!("unknown command {:?}; try abs, rel, raw, kick", other)),
    }
}
