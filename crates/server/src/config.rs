//! Server configuration.
//!
//! Every setting can come from a command-line flag or an environment
//! variable; flags win.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Default tracing filter when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "info,server=debug,ranking=debug";

/// Top Movies API server
#[derive(Debug, Clone, Parser)]
#[command(name = "top-movies-server")]
#[command(about = "HTTP API for ranked Top Movies lists", long_about = None)]
pub struct ServerConfig {
    /// Address to listen on
    #[arg(long, env = "TOP_MOVIES_BIND", default_value = "127.0.0.1:8000")]
    pub bind: SocketAddr,

    /// Snapshot file loaded at startup and written on shutdown
    #[arg(long, env = "TOP_MOVIES_SNAPSHOT")]
    pub snapshot: Option<PathBuf>,

    /// How long a write waits for a busy list before answering 409
    #[arg(long, env = "TOP_MOVIES_LOCK_TIMEOUT_MS", default_value = "2000")]
    pub lock_timeout_ms: u64,

    /// Tracing filter used when RUST_LOG is not set
    #[arg(long, env = "TOP_MOVIES_LOG", default_value = DEFAULT_LOG_FILTER)]
    pub log_filter: String,
}

impl ServerConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8000)),
            snapshot: None,
            lock_timeout_ms: 2000,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}
