//! rgbclient CLI Client
//!
//! Connects to a color-command server and prints the effective color as
//! commands arrive. Reads control commands from stdin.

use std::io::{self, BufRead};
use std::sync::Arc;
use std::thread;

use clap::Parser;
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use rgbclient::color::ColorState;
use rgbclient::{Command, CommandId, Config, ConnectionErrorKind, Consumer, Endpoint, Supervisor};
use tracing_subscriber::{fmt, EnvFilter};

/// rgbclient CLI
#[derive(Parser, Debug)]
#[command(name = "rgb-client")]
#[command(about = "Client for the RGB color-command server")]
#[command(version)]
struct Args {
    /// Server address (host:port); can also be set later with `target`
    #[arg(short, long)]
    server: Option<String>,

    /// Number of commands kept for replay after `detach`/`attach`
    #[arg(long, default_value = "1000")]
    history: usize,

    /// Connect timeout in milliseconds (0 = platform default)
    #[arg(long, default_value = "0")]
    connect_timeout_ms: u64,

    /// Start with the network marked unready
    #[arg(long)]
    offline: bool,
}

/// Events handed from connection workers to the printer thread
enum Event {
    State(bool),
    Error(ConnectionErrorKind, String),
    Command(Command),
}

/// Consumer that queues events and remembers the last command it saw
struct ChannelConsumer {
    events: Sender<Event>,
    last_seen: Mutex<Option<CommandId>>,
}

impl ChannelConsumer {
    fn last_seen(&self) -> Option<CommandId> {
        *self.last_seen.lock()
    }
}

impl Consumer for ChannelConsumer {
    fn on_connection_state_changed(&self, connected: bool) {
        let _ = self.events.send(Event::State(connected));
    }

    fn on_connection_error(&self, kind: ConnectionErrorKind, message: &str) {
        let _ = self.events.send(Event::Error(kind, message.to_string()));
    }

    fn on_command_received(&self, command: &Command) {
        *self.last_seen.lock() = Some(command.id);
        let _ = self.events.send(Event::Command(*command));
    }
}

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

    tracing::info!("rgbclient v{}", rgbclient::VERSION);

    let config = Config::builder()
        .history_capacity(args.history)
        .connect_timeout_ms(args.connect_timeout_ms)
        .build();

    let supervisor = match Supervisor::new(config) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let (tx, rx) = channel::unbounded();
    let consumer = Arc::new(ChannelConsumer {
        events: tx,
        last_seen: Mutex::new(None),
    });
    supervisor.attach_consumer(consumer.clone(), None);

    let printer = thread::Builder::new()
        .name("rgb-printer".to_string())
        .spawn(move || print_events(rx));
    if let Err(e) = printer {
        tracing::error!("Failed to start printer thread: {}", e);
        std::process::exit(1);
    }

    if let Some(server) = &args.server {
        match server.parse::<Endpoint>() {
            Ok(endpoint) => supervisor.set_endpoint(endpoint),
            Err(e) => {
                tracing::error!("{}", e);
                std::process::exit(1);
            }
        }
    } else {
        println!("no server set; use `target HOST:PORT`");
    }

    if !args.offline {
        supervisor.notify_ready();
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

        let control = match parse_control(&line) {
            Ok(Some(control)) => control,
            Ok(None) => continue,
            Err(message) => {
                println!("{}", message);
                continue;
            }
        };

        match control {
            Control::Target(endpoint) => supervisor.set_endpoint(endpoint),
            Control::Up => supervisor.notify_ready(),
            Control::Down => supervisor.notify_unready(),
            Control::Restart => supervisor.restart(),
            Control::Detach => {
                supervisor.detach_consumer();
                println!("detached; commands are still recorded");
            }
            Control::Attach => {
                let since = consumer.last_seen();
                let replayed = supervisor.attach_consumer(consumer.clone(), since.as_ref());
                println!("attached; replayed {} missed commands", replayed);
            }
            Control::History(since) => {
                for command in supervisor.commands_since(since.as_ref()) {
                    println!("{}  {}", command.id, command);
                }
            }
            Control::Status => {
                let target = supervisor
                    .target()
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "none".to_string());
                println!(
                    "target={} ready={} connected={} connections={} history={}",
                    target,
                    supervisor.is_ready(),
                    supervisor.is_connected(),
                    supervisor.generation(),
                    supervisor.history().len()
                );
            }
            Control::Quit => break,
        }
    }

    supervisor.shutdown();
    tracing::info!("Client stopped");
}

/// One line of stdin input
#[derive(Debug, PartialEq)]
enum Control {
    Target(Endpoint),
    Up,
    Down,
    Restart,
    Detach,
    Attach,
    History(Option<CommandId>),
    Status,
    Quit,
}

/// Parse a stdin line; blank lines are `Ok(None)`, mistakes are a message
/// for the user
fn parse_control(line: &str) -> Result<Option<Control>, String> {
    let mut words = line.split_whitespace();
    let control = match (words.next(), words.next()) {
        (None, _) => return Ok(None),
        (Some("target"), Some(addr)) => {
            Control::Target(addr.parse::<Endpoint>().map_err(|e| e.to_string())?)
        }
        (Some("target"), None) => return Err("usage: target HOST:PORT".to_string()),
        (Some("up"), _) => Control::Up,
        (Some("down"), _) => Control::Down,
        (Some("restart"), _) => Control::Restart,
        (Some("detach"), _) => Control::Detach,
        (Some("attach"), _) => Control::Attach,
        (Some("history"), id) => Control::History(
            id.map(str::parse::<CommandId>)
                .transpose()
                .map_err(|e| format!("invalid command id: {}", e))?,
        ),
        (Some("status"), _) => Control::Status,
        (Some("quit"), _) | (Some("exit"), _) => Control::Quit,
        (Some(other), _) => {
            return Err(format!(
                "unknown command {:?}; try target, up, down, restart, detach, attach, history, status, quit",
                other
            ))
        }
    };
    Ok(Some(control))
}

/// Apply queued events to a color state and print the result
fn print_events(events: Receiver<Event>) {
    let mut color = ColorState::new();

    for event in events {
        match event {
            Event::State(true) => println!("connected"),
            Event::State(false) => println!("disconnected"),
            Event::Error(kind, message) => println!("error [{}]: {}", kind, message),
            Event::Command(command) => {
                color.apply(&command);
                match color.effective() {
                    Some(rgb) => println!("{:<28} => {} #{:06X}", command.to_string(), rgb, rgb.to_argb() & 0x00FF_FFFF),
                    None => println!("{:<28} => (no base color yet)", command.to_string()),
                }
            }
        }
    }
}
