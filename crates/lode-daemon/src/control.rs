//! Text command server over a Unix domain socket.
//!
//! This is the daemon's local control surface: newline-terminated commands
//! in, single-line responses out.
//!
//! | Command | Response |
//! |---|---|
//! | `ping` | `pong` |
//! | `get:<hexkey>` | the value, or an error string |
//! | `put:<value>` | the content key's hex form, or an error string |
//! | `exit` | `ok`, then the daemon shuts down |
//!
//! Store-validation failures and unknown keys come back as `ERROR: ...`
//! lines; they never crash the connection.

use std::path::PathBuf;

use lode_node::Node;
use lode_types::NodeId;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// The control server.
pub struct ControlServer {
    node: Node,
    socket_path: PathBuf,
    shutdown_tx: broadcast::Sender<()>,
}

impl ControlServer {
    /// Create a new control server.
    pub fn new(node: Node, socket_path: PathBuf, shutdown_tx: broadcast::Sender<()>) -> Self {
        Self {
            node,
            socket_path,
            shutdown_tx,
        }
    }

    /// Run the server, accepting connections until the process exits.
    pub async fn run(&self) -> anyhow::Result<()> {
        // Remove stale socket file
        let _ = std::fs::remove_file(&self.socket_path);

        let listener = UnixListener::bind(&self.socket_path)?;
        info!("control server listening on {:?}", self.socket_path);

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let node = self.node.clone();
                    let shutdown_tx = self.shutdown_tx.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(node, shutdown_tx, stream).await {
                            warn!("control connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("control accept error: {}", e);
                }
            }
        }
    }
}

/// Handle a single client connection.
async fn handle_connection(
    node: Node,
    shutdown_tx: broadcast::Sender<()>,
    stream: tokio::net::UnixStream,
) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            break; // EOF
        }

        let mut response = dispatch_command(&node, &shutdown_tx, line.trim()).await;
        response.push('\n');
        writer.write_all(response.as_bytes()).await?;
        writer.flush().await?;
    }

    Ok(())
}

/// Dispatch one command line and produce its single-line response.
async fn dispatch_command(
    node: &Node,
    shutdown_tx: &broadcast::Sender<()>,
    line: &str,
) -> String {
    debug!(command = line, "control command");

    let (command, argument) = match line.split_once(':') {
        Some((cmd, arg)) => (cmd, Some(arg)),
        None => (line, None),
    };

    match (command, argument) {
        ("ping", None) => "pong".to_string(),

        ("exit", None) => {
            info!("exit command received");
            let _ = shutdown_tx.send(());
            "ok".to_string()
        }

        ("get", Some(hexkey)) => match NodeId::from_hex(hexkey) {
            Ok(key) => match node.iterative_find_value(&key).await {
                (_, Some(value)) => value,
                (_, None) => format!("ERROR: no value for key {hexkey}"),
            },
            Err(e) => format!("ERROR: {e}"),
        },

        ("put", Some(value)) => {
            if value.is_empty() {
                return "ERROR: invalid value".to_string();
            }
            let (key, ok) = node.iterative_store(value).await;
            if ok {
                key
            } else {
                format!("ERROR: no node accepted value with key {key}")
            }
        }

        _ => format!("ERROR: unknown command {command:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_node() -> Node {
        Node::bind(0).await.expect("bind node")
    }

    #[tokio::test]
    async fn test_ping_command() {
        let node = test_node().await;
        let (tx, _rx) = broadcast::channel(1);
        assert_eq!(dispatch_command(&node, &tx, "ping").await, "pong");
    }

    #[tokio::test]
    async fn test_exit_signals_shutdown() {
        let node = test_node().await;
        let (tx, mut rx) = broadcast::channel(1);
        assert_eq!(dispatch_command(&node, &tx, "exit").await, "ok");
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_get_with_malformed_key() {
        let node = test_node().await;
        let (tx, _rx) = broadcast::channel(1);
        let response = dispatch_command(&node, &tx, "get:nothex").await;
        assert!(response.starts_with("ERROR:"));
    }

    #[tokio::test]
    async fn test_put_empty_value() {
        let node = test_node().await;
        let (tx, _rx) = broadcast::channel(1);
        let response = dispatch_command(&node, &tx, "put:").await;
        assert!(response.starts_with("ERROR:"));
    }

    #[tokio::test]
    async fn test_put_without_peers_reports_failure() {
        let node = test_node().await;
        let (tx, _rx) = broadcast::channel(1);
        let response = dispatch_command(&node, &tx, "put:lonely").await;
        assert!(response.starts_with("ERROR:"));
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let node = test_node().await;
        let (tx, _rx) = broadcast::channel(1);
        let response = dispatch_command(&node, &tx, "frobnicate").await;
        assert!(response.starts_with("ERROR: unknown command"));
    }
}
