//! lode-daemon: a Kademlia DHT node as a single OS process.
//!
//! Binds the UDP transport, joins the overlay through the configured
//! bootstrap peer (if any), and serves the local control socket until an
//! `exit` command or Ctrl-C arrives.

mod config;
mod control;

use std::time::Duration;

use anyhow::Context;
use lode_node::Node;
use lode_types::{Contact, NodeId};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::config::DaemonConfig;
use crate::control::ControlServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load config
    let config = DaemonConfig::load()?;
    let data_dir = DaemonConfig::data_dir();

    // Initialize tracing; RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.advanced.log_level)),
        )
        .init();

    info!("lode daemon starting");

    // Ensure data directory exists
    std::fs::create_dir_all(&data_dir)?;

    // 2. Bind the node. A bind failure is fatal.
    let node = Node::bind(config.network.listen_port)
        .await
        .context("failed to bind UDP transport")?;

    // 3. Join the overlay if a bootstrap peer is configured. An
    // unreachable bootstrap after all retries is fatal.
    match config.bootstrap_address() {
        Some(addr) => {
            let bootstrap = ping_bootstrap(
                &node,
                &addr,
                config.network.bootstrap_attempts,
                Duration::from_secs(config.network.bootstrap_interval_secs),
            )
            .await
            .with_context(|| {
                format!(
                    "bootstrap {addr} unreachable after {} attempts",
                    config.network.bootstrap_attempts
                )
            })?;
            node.join(bootstrap).await;
        }
        None => {
            info!("no bootstrap configured, listening as a bootstrap node");
        }
    }

    // 4. Create shutdown channel and start the control server
    let (shutdown_tx, _shutdown_rx) = broadcast::channel(1);
    let socket_path = config.socket_path();
    let control = ControlServer::new(node, socket_path.clone(), shutdown_tx.clone());

    // 5. Run until the control surface says exit or the process is
    // interrupted
    let mut shutdown_rx = shutdown_tx.subscribe();
    tokio::select! {
        result = control.run() => {
            if let Err(e) = result {
                error!("control server error: {}", e);
            }
        }
        _ = shutdown_rx.recv() => {
            info!("shutdown signal received");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
        }
    }

    // Graceful shutdown: in-flight lookups finish or time out on their
    // own; we only reclaim the socket file.
    let _ = std::fs::remove_file(&socket_path);

    info!("daemon stopped");
    Ok(())
}

/// PING the bootstrap address until it answers, learning its contact from
/// the PONG envelope.
async fn ping_bootstrap(
    node: &Node,
    addr: &str,
    attempts: u32,
    interval: Duration,
) -> Option<Contact> {
    for attempt in 1..=attempts {
        // The real id comes back in the PONG; the probe id is a
        // placeholder.
        let probe = Contact::new(NodeId::random(), addr);
        match node.ping(&probe).await {
            Some(contact) => {
                info!(addr, id = %contact.id, "bootstrap responded");
                return Some(contact);
            }
            None => {
                warn!(addr, attempt, attempts, "bootstrap ping failed");
            }
        }
        if attempt < attempts {
            tokio::time::sleep(interval).await;
        }
    }
    None
}
