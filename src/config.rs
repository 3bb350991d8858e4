/*!
 * Name Server Configuration
 *
 * Port range and bind retry settings for the name server, plus the URL
 * helpers derived from them. Created once at startup and passed to
 * whatever needs it; there is no process-wide mutable state.
 */

use crate::core::errors::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Plain TCP scheme
pub const URL_TCP: &str = "tcp://";
/// TLS-secured TCP scheme
pub const URL_TCPS: &str = "tcps://";
/// Host the name server listens on
pub const LOCAL_HOST: &str = "127.0.0.1";

/// Offset of the plain name server port from `min_port`
pub const NS_TCP_PORT_OFFSET: u16 = 2;
/// Offset of the secure name server port from `min_port`
pub const NS_TCPS_PORT_OFFSET: u16 = 3;

/// Environment overrides
pub const ENV_MIN_PORT: &str = "IPC_NS_MIN_PORT";
pub const ENV_MAX_PORT: &str = "IPC_NS_MAX_PORT";
pub const ENV_BIND_RETRY_CNT: &str = "IPC_NS_BIND_RETRY_CNT";

/// Name server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NameServerConfig {
    /// Lowest port the name server may use
    pub min_port: u16,
    /// Highest port the name server may use
    pub max_port: u16,
    /// Attempts to bind an address before giving up
    pub bind_retry_count: u32,
}

impl Default for NameServerConfig {
    fn default() -> Self {
        Self {
            min_port: 60000,
            max_port: 65000,
            bind_retry_count: 5,
        }
    }
}

impl NameServerConfig {
    /// Check the port range and that the name server ports fit inside it
    pub fn validate(&self) -> ConfigResult<()> {
        if self.min_port > self.max_port {
            return Err(ConfigError::InvalidPortRange {
                min: self.min_port,
                max: self.max_port,
            });
        }
        self.port_at(NS_TCPS_PORT_OFFSET)?;
        Ok(())
    }

    /// Defaults with `IPC_NS_*` environment overrides applied, validated
    pub fn from_env() -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(port) = env_override(ENV_MIN_PORT)? {
            config.min_port = port;
        }
        if let Some(port) = env_override(ENV_MAX_PORT)? {
            config.max_port = port;
        }
        if let Some(count) = env_override(ENV_BIND_RETRY_CNT)? {
            config.bind_retry_count = count;
        }

        config.validate()?;
        debug!(?config, "name server configuration loaded from environment");
        Ok(config)
    }

    /// Parse and validate a JSON document; missing fields take defaults
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&contents)?;
        info!(path = %path.display(), "name server configuration loaded");
        Ok(config)
    }

    /// Port `offset` above `min_port`, if it stays within the range
    pub fn port_at(&self, offset: u16) -> ConfigResult<u16> {
        self.min_port
            .checked_add(offset)
            .filter(|port| *port <= self.max_port)
            .ok_or(ConfigError::PortOutOfRange {
                offset,
                min: self.min_port,
                max: self.max_port,
            })
    }

    /// URL of the name server's TCP endpoint
    ///
    /// `tcp://127.0.0.1:{min_port + 2}`, or `tcps://127.0.0.1:{min_port + 3}`
    /// when `secure`.
    pub fn name_server_tcp_url(&self, secure: bool) -> ConfigResult<String> {
        let (scheme, offset) = if secure {
            (URL_TCPS, NS_TCPS_PORT_OFFSET)
        } else {
            (URL_TCP, NS_TCP_PORT_OFFSET)
        };
        let port = self.port_at(offset)?;
        Ok(format!("{scheme}{LOCAL_HOST}:{port}"))
    }
}

fn env_override<T: std::str::FromStr>(key: &str) -> ConfigResult<Option<T>> {
    match std::env::var(key) {
        Ok(value) => match value.trim().parse() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        },
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NameServerConfig::default();
        assert_eq!(config.min_port, 60000);
        assert_eq!(config.max_port, 65000);
        assert_eq!(config.bind_retry_count, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_urls() {
        let config = NameServerConfig::default();
        assert_eq!(
            config.name_server_tcp_url(false).unwrap(),
            "tcp://127.0.0.1:60002"
        );
        assert_eq!(
            config.name_server_tcp_url(true).unwrap(),
            "tcps://127.0.0.1:60003"
        );
    }

    #[test]
    fn test_inverted_range_rejected() {
        let config = NameServerConfig {
            min_port: 5000,
            max_port: 4000,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidPortRange { min: 5000, max: 4000 })
        ));
    }

    #[test]
    fn test_port_offset_overflow() {
        let config = NameServerConfig {
            min_port: u16::MAX,
            max_port: u16::MAX,
            ..Default::default()
        };
        assert!(matches!(
            config.port_at(NS_TCP_PORT_OFFSET),
            Err(ConfigError::PortOutOfRange { .. })
        ));
    }
}
