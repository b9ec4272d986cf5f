//! `rclink` console controller entry point.
//!
//! Wires configuration, logging, the transport, the link manager, and the
//! control session together, then drives the session from stdin.
//!
//! # Usage
//!
//! ```text
//! rclink [OPTIONS]
//!
//! Options:
//!   --config <PATH>        config file [default: platform config dir]
//!   --transport <KIND>     tcp | serial
//!   --peer <ADDRESS>       host:port for tcp, device path for serial
//!   --name <NAME>          display name of the receiver
//!   --baud <RATE>          serial baud rate
//!   --connect              connect as soon as the console starts
//!   --json                 print JSON instead of status lines
//!   --write-config         write the effective config to --config and exit
//! ```
//!
//! Flags override the config file; each flag also reads an `RCLINK_*`
//! environment variable.
//!
//! # Output
//!
//! stdout carries status lines (or JSON with `--json`): one per executed
//! command and one per link state change.  Logs go to stderr and follow
//! `RUST_LOG`, falling back to `logging.level` from the config.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use rclink_controller::application::control_session::ControlSession;
use rclink_controller::application::link_manager::{LinkConfig, LinkEvent, LinkManager};
use rclink_controller::infrastructure::alternate_input::default_subsystems;
use rclink_controller::infrastructure::console::{parse_line, ConsoleCommand, HELP};
use rclink_controller::infrastructure::storage::config::{
    config_file_path, load_config_from, save_config_to, AppConfig, TransportKind,
};
use rclink_controller::infrastructure::transport::{
    serial::SerialConnector, tcp::TcpConnector, Connector,
};
use rclink_controller::infrastructure::ui_bridge::{
    execute, status_line, CommandResult, SessionSnapshotDto,
};
use rclink_core::{ConnectionState, Speed};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Remote-drive a vehicle over a serial or TCP link.
#[derive(Debug, Parser)]
#[command(name = "rclink", about = "Console controller for RcLink vehicles", version)]
struct Cli {
    /// Config file to read (and to write with --write-config).
    #[arg(long, env = "RCLINK_CONFIG")]
    config: Option<PathBuf>,

    /// Transport used to reach the receiver.
    #[arg(long, value_enum, env = "RCLINK_TRANSPORT")]
    transport: Option<TransportKind>,

    /// Receiver address: `host:port` for tcp, a device path for serial.
    #[arg(long, env = "RCLINK_PEER")]
    peer: Option<String>,

    /// Display name of the receiver.
    #[arg(long, env = "RCLINK_PEER_NAME")]
    name: Option<String>,

    /// Serial baud rate.
    #[arg(long, env = "RCLINK_BAUD")]
    baud: Option<u32>,

    /// Connect to the configured peer on startup.
    #[arg(long)]
    connect: bool,

    /// Print JSON snapshots instead of human status lines.
    #[arg(long)]
    json: bool,

    /// Write the effective configuration and exit.
    #[arg(long)]
    write_config: bool,
}

impl Cli {
    fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(transport) = self.transport {
            config.peer.transport = transport;
        }
        if let Some(peer) = &self.peer {
            config.peer.address = Some(peer.clone());
        }
        if let Some(name) = &self.name {
            config.peer.name = name.clone();
        }
        if let Some(baud) = self.baud {
            config.peer.baud_rate = baud;
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => config_file_path().context("locating the config file")?,
    };
    let mut config = load_config_from(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    cli.apply_overrides(&mut config);

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    if cli.write_config {
        save_config_to(&config, &config_path)
            .with_context(|| format!("writing {}", config_path.display()))?;
        println!("wrote {}", config_path.display());
        return Ok(());
    }

    info!(transport = ?config.peer.transport, "rclink starting");

    let connector: Arc<dyn Connector> = match config.peer.transport {
        TransportKind::Tcp => Arc::new(TcpConnector::new()),
        TransportKind::Serial => Arc::new(SerialConnector::new(config.peer.baud_rate)),
    };
    let link = LinkManager::spawn(connector, LinkConfig::from(&config.link));
    let mut session = ControlSession::new(
        link.clone(),
        default_subsystems(config.control.webcam_device.clone()),
    )
    .with_speed(Speed::new(config.control.default_speed));
    let configured_peer = config.peer.handle();

    let printer = tokio::spawn(print_link_changes(link.subscribe(), cli.json));

    if cli.connect {
        let result = execute(
            &mut session,
            ConsoleCommand::Connect { address: None },
            configured_peer.as_ref(),
        )
        .await;
        report(&session, &result, cli.json)?;
    } else if !cli.json {
        println!("type `help` for commands");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("reading stdin")? else {
                    break;
                };
                match parse_line(&line) {
                    Ok(None) => {}
                    Ok(Some(ConsoleCommand::Quit)) => break,
                    Ok(Some(ConsoleCommand::Help)) => println!("{HELP}"),
                    Ok(Some(command)) => {
                        let result = execute(&mut session, command, configured_peer.as_ref()).await;
                        report(&session, &result, cli.json)?;
                    }
                    Err(e) => {
                        let result: CommandResult<SessionSnapshotDto> = CommandResult::err(e.to_string());
                        report(&session, &result, cli.json)?;
                    }
                }
            }
            _ = &mut ctrl_c => {
                info!("interrupted");
                break;
            }
        }
    }

    if session.link().state() == ConnectionState::Connected {
        if let Err(e) = session.clear_intent().await {
            warn!("could not stop the vehicle: {e}");
        }
    }
    session.teardown().await;
    printer.abort();
    info!("rclink stopped");
    Ok(())
}

// ── Output ────────────────────────────────────────────────────────────────────

fn report(
    session: &ControlSession,
    result: &CommandResult<SessionSnapshotDto>,
    json: bool,
) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(result)?);
    } else if result.success {
        println!("{}", status_line(&session.snapshot()));
    } else if let Some(error) = &result.error {
        println!("error: {error}");
    }
    Ok(())
}

/// Prints every link state change until the link manager goes away.
async fn print_link_changes(mut events: broadcast::Receiver<LinkEvent>, json: bool) {
    loop {
        match events.recv().await {
            Ok(LinkEvent::StateChanged(published)) => {
                if json {
                    match serde_json::to_string(&published) {
                        Ok(text) => println!("{text}"),
                        Err(e) => error!("could not encode link status: {e}"),
                    }
                } else {
                    println!("[link] {}", published.status);
                }
            }
            Ok(LinkEvent::PermissionDenied(peer)) => {
                if !json {
                    println!("[link] permission denied for {peer}; grant access and `connect` again");
                }
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "status printer fell behind"),
            Err(RecvError::Closed) => break,
        }
    }
}
