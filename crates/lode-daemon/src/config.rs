//! Configuration file management.
//!
//! The daemon reads `$data_dir/config.toml` if present and falls back to
//! defaults otherwise. `LODE_DATA_DIR` overrides the data directory and
//! `BOOTSTRAP_ADDRESS` overrides the configured bootstrap peer.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Network settings.
    #[serde(default)]
    pub network: NetworkConfig,
    /// Control socket settings.
    #[serde(default)]
    pub control: ControlConfig,
    /// Advanced settings.
    #[serde(default)]
    pub advanced: AdvancedConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// UDP port to listen on. 0 = OS-assigned ephemeral port.
    #[serde(default)]
    pub listen_port: u16,
    /// Bootstrap peer as `host:port`. None = this node is the bootstrap.
    #[serde(default)]
    pub bootstrap_address: Option<String>,
    /// Bootstrap ping attempts before giving up.
    #[serde(default = "default_bootstrap_attempts")]
    pub bootstrap_attempts: u32,
    /// Seconds between bootstrap ping attempts.
    #[serde(default = "default_bootstrap_interval")]
    pub bootstrap_interval_secs: u64,
}

/// Control socket configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Unix socket path. Empty = `$data_dir/daemon.sock`.
    #[serde(default)]
    pub socket_path: String,
}

/// Advanced configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedConfig {
    /// Log level: "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions

fn default_bootstrap_attempts() -> u32 {
    5
}

fn default_bootstrap_interval() -> u64 {
    20
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_port: 0,
            bootstrap_address: None,
            bootstrap_attempts: default_bootstrap_attempts(),
            bootstrap_interval_secs: default_bootstrap_interval(),
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            socket_path: String::new(),
        }
    }
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from the default config file location.
    ///
    /// Falls back to defaults if the file does not exist.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::data_dir().join("config.toml");
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: DaemonConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// The bootstrap peer to join through, if any.
    ///
    /// The `BOOTSTRAP_ADDRESS` environment variable wins over the config
    /// file; with neither set the node listens without joining.
    pub fn bootstrap_address(&self) -> Option<String> {
        if let Ok(addr) = std::env::var("BOOTSTRAP_ADDRESS") {
            if !addr.is_empty() {
                return Some(addr);
            }
        }
        self.network.bootstrap_address.clone()
    }

    /// The control socket path.
    pub fn socket_path(&self) -> PathBuf {
        if self.control.socket_path.is_empty() {
            Self::data_dir().join("daemon.sock")
        } else {
            PathBuf::from(&self.control.socket_path)
        }
    }

    /// The data directory, from `LODE_DATA_DIR` or a home-relative default.
    pub fn data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("LODE_DATA_DIR") {
            return PathBuf::from(dir);
        }
        std::env::var("HOME")
            .map(|h| PathBuf::from(h).join(".lode"))
            .unwrap_or_else(|_| PathBuf::from("/tmp/lode"))
    }
}
