//! Command line and configuration loading.
//!
//! Configuration is resolved in order of precedence (highest wins):
//!
//! 1. **CLI**: `--url`
//! 2. **Environment variables**: `FLEET_CONSOLE_URL`, `FLEET_CONSOLE_LOG`
//! 3. **Config file**: path via `--config <path>`, or `fleet-console.toml`
//!    in CWD
//! 4. **Compiled defaults**: see each field's default value below
//!
//! The TOML file mirrors the struct hierarchy:
//!
//! ```toml
//! [backend]
//! url = "127.0.0.1:8080"        # bare host:port means http://
//! connect_timeout_ms = 10000
//! request_timeout_ms = 30000
//!
//! [feeds]
//! poll_interval_ms = 5000       # container/image/machine lists
//! retry_delay_ms = 1000         # stream feeds, initial backoff
//! retry_max_delay_ms = 30000    # stream feeds, max backoff
//!
//! [session]
//! reconnect_attempts = 0        # 0 = a dropped shell ends the session
//! reconnect_delay_ms = 1000
//! reconnect_max_delay_ms = 30000
//!
//! [logging]
//! level = "warn"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use crate::client::Timeouts;
use crate::endpoint::Backend;
use crate::mirror::MirrorOptions;
use crate::session::SessionOptions;

const DEFAULT_CONFIG_FILE: &str = "fleet-console.toml";

/// CLI arguments parsed by `clap`.
#[derive(Debug, Parser)]
#[command(
    name = "fleet-console",
    version,
    about = "Operator console for a fleet of container hosts"
)]
pub struct Cli {
    /// Path to config file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend address, e.g. `10.0.0.10:8080` or `https://fleet.example.com`
    #[arg(long, global = true)]
    pub url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List machines and their reachability
    Machines,
    /// List containers on a machine
    Containers {
        #[arg(long)]
        ip: String,
    },
    /// List images on a machine
    Images {
        #[arg(long)]
        ip: String,
    },
    /// Follow live state until interrupted
    Watch {
        #[command(subcommand)]
        target: WatchTarget,
    },
    /// Open an interactive shell on a machine, or inside a container
    Exec {
        #[arg(long)]
        ip: String,
        /// Container id; omit for a machine shell
        #[arg(long)]
        container: Option<String>,
        /// Do not check machine reachability first
        #[arg(long)]
        skip_check: bool,
    },
    /// Tail a container's log
    Logs {
        #[arg(long)]
        ip: String,
        #[arg(long)]
        container: String,
        #[arg(long)]
        skip_check: bool,
    },
    /// Start a container
    Start(ContainerArgs),
    /// Stop a container
    Stop(ContainerArgs),
    /// Restart a container
    Restart(ContainerArgs),
    /// Create and start a container from an image
    Create {
        #[arg(long)]
        ip: String,
        /// Image id or reference
        #[arg(long)]
        image: String,
        /// `docker run` arguments, e.g. "-p 8080:80 --name web"
        #[arg(long, allow_hyphen_values = true)]
        args: String,
    },
}

#[derive(Debug, Args)]
pub struct ContainerArgs {
    #[arg(long)]
    pub ip: String,
    #[arg(long)]
    pub container: String,
}

#[derive(Debug, Subcommand)]
pub enum WatchTarget {
    /// One container's inspect document
    Container {
        #[arg(long)]
        ip: String,
        #[arg(long)]
        container: String,
    },
    /// One image's inspect document
    Image {
        #[arg(long)]
        ip: String,
        #[arg(long)]
        image: String,
    },
    /// Container list of a machine
    Containers {
        #[arg(long)]
        ip: String,
    },
    /// Image list of a machine
    Images {
        #[arg(long)]
        ip: String,
    },
    /// Fleet inventory
    Machines,
}

/// Top-level configuration, deserialized from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub feeds: FeedsConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// API server address (default `127.0.0.1:8080`).
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Total time allowed for one HTTP request (default 30 000).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedsConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub reconnect_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset (default `warn`).
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_url() -> String {
    "127.0.0.1:8080".into()
}
fn default_connect_timeout_ms() -> u64 {
    10_000
}
fn default_request_timeout_ms() -> u64 {
    30_000
}
fn default_poll_interval_ms() -> u64 {
    5_000
}
fn default_retry_delay_ms() -> u64 {
    1_000
}
fn default_retry_max_delay_ms() -> u64 {
    30_000
}
fn default_log_level() -> String {
    "warn".into()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            retry_delay_ms: default_retry_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_attempts: 0,
            reconnect_delay_ms: default_retry_delay_ms(),
            reconnect_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load from `path`, else `fleet-console.toml` in CWD, else defaults;
    /// then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, String> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;
        Self::from_toml_str(&content)
            .map_err(|e| format!("Failed to parse config file {}: {e}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self, String> {
        let config: Self = toml::from_str(content).map_err(|e| e.to_string())?;
        if config.feeds.poll_interval_ms == 0 {
            return Err("feeds.poll_interval_ms must be greater than zero".into());
        }
        Ok(config)
    }

    fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(url) = env("FLEET_CONSOLE_URL").filter(|v| !v.is_empty()) {
            self.backend.url = url;
        }
        if let Some(level) = env("FLEET_CONSOLE_LOG").filter(|v| !v.is_empty()) {
            self.logging.level = level;
        }
    }

    /// Resolve the backend address, letting `--url` win over everything else.
    pub fn backend(&self, cli_url: Option<&str>) -> Result<Backend, String> {
        Backend::parse(cli_url.unwrap_or(&self.backend.url))
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            connect: Duration::from_millis(self.backend.connect_timeout_ms),
            request: Duration::from_millis(self.backend.request_timeout_ms),
        }
    }

    pub fn mirror_options(&self) -> MirrorOptions {
        MirrorOptions {
            poll_interval: Duration::from_millis(self.feeds.poll_interval_ms),
            retry_delay: Duration::from_millis(self.feeds.retry_delay_ms),
            retry_max_delay: Duration::from_millis(self.feeds.retry_max_delay_ms),
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            reconnect_attempts: self.session.reconnect_attempts,
            reconnect_delay: Duration::from_millis(self.session.reconnect_delay_ms),
            reconnect_max_delay: Duration::from_millis(self.session.reconnect_max_delay_ms),
        }
    }
}
