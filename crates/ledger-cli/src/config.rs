//! CLI configuration management.
//!
//! All configuration can be provided via CLI arguments or environment
//! variables. Use `--help` to see all available options.
//!
//! ```bash
//! # Configure database and server
//! ledger --postgres-host db.internal --port 8080
//!
//! # Or via environment variables
//! POSTGRES_HOST=db.internal PORT=8080 ledger
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use anyhow::{Result as AnyhowResult, anyhow};
use clap::{Args, Parser};
use ledger_postgres::PgConfig;
use serde::{Deserialize, Serialize};

use crate::TRACING_TARGET_CONFIG;

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "ledger")]
#[command(about = "Ledger entry service")]
#[command(version)]
pub struct Cli {
    /// Server network and lifecycle configuration.
    #[clap(flatten)]
    pub server: ServerConfig,

    /// Database connection and pool configuration.
    #[clap(flatten)]
    pub postgres: PgConfig,
}

/// Network binding and shutdown settings for the HTTP server.
///
/// Resolved from CLI arguments or the environment: `HOST`, `PORT`,
/// `SHUTDOWN_GRACE_SECS`.
#[derive(Debug, Clone, Args, Serialize, Deserialize)]
#[must_use = "config does nothing unless you use it"]
pub struct ServerConfig {
    /// Address to listen on. Loopback by default; a wildcard address exposes
    /// the service to the network.
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on. Unprivileged ports only.
    #[arg(short = 'p', long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Seconds to let in-flight requests drain after a shutdown signal.
    #[arg(long, env = "SHUTDOWN_GRACE_SECS", default_value_t = 30)]
    pub shutdown_grace_secs: u64,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

// Validation bounds
const MIN_UNPRIVILEGED_PORT: u16 = 1024;
const MAX_SHUTDOWN_GRACE_SECS: u64 = 300;

impl ServerConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the port is privileged or the shutdown grace
    /// period is zero or longer than five minutes.
    pub fn validate(&self) -> AnyhowResult<()> {
        if self.port < MIN_UNPRIVILEGED_PORT {
            return Err(anyhow!(
                "listen port {} is privileged; pick one in {}..=65535",
                self.port,
                MIN_UNPRIVILEGED_PORT
            ));
        }

        if self.shutdown_grace_secs == 0 || self.shutdown_grace_secs > MAX_SHUTDOWN_GRACE_SECS {
            return Err(anyhow!(
                "shutdown grace of {}s is outside 1..={}",
                self.shutdown_grace_secs,
                MAX_SHUTDOWN_GRACE_SECS
            ));
        }

        Ok(())
    }

    /// Returns the socket address the server listens on.
    #[inline]
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Returns the drain period as a [`Duration`].
    #[inline]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Returns whether the server listens on all network interfaces.
    #[inline]
    pub fn is_wildcard_bind(&self) -> bool {
        self.host.is_unspecified()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: 3000,
            shutdown_grace_secs: 30,
        }
    }
}

/// Logs the resolved server configuration.
pub fn log_server_config(config: &ServerConfig) {
    tracing::info!(
        target: TRACING_TARGET_CONFIG,
        addr = %config.bind_addr(),
        shutdown_grace_secs = config.shutdown_grace_secs,
        "Server configuration loaded"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_privileged_port_is_rejected() {
        let config = ServerConfig {
            port: 80,
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_shutdown_grace_bounds() {
        let zero = ServerConfig {
            shutdown_grace_secs: 0,
            ..ServerConfig::default()
        };
        assert!(zero.validate().is_err());

        let too_long = ServerConfig {
            shutdown_grace_secs: 600,
            ..ServerConfig::default()
        };
        assert!(too_long.validate().is_err());
    }

    #[test]
    fn test_wildcard_bind_detection() {
        let wildcard = ServerConfig {
            host: "0.0.0.0".parse().expect("valid address"),
            ..ServerConfig::default()
        };
        assert!(wildcard.is_wildcard_bind());
        assert!(!ServerConfig::default().is_wildcard_bind());
    }
}
