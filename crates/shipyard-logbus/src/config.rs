use std::time::Duration;

use crate::BusError;

pub const ENV_BUS_SERVERS: &str = "SHIPYARD_BUS_SERVERS";
pub const ENV_BUS_NKEY_SEED: &str = "SHIPYARD_BUS_NKEY_SEED";
pub const ENV_BUS_PREFIX: &str = "SHIPYARD_BUS_PREFIX";
pub const ENV_BUS_STREAM: &str = "SHIPYARD_BUS_STREAM";

/// Connection parameters of the log bus.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Server URLs; empty means the bus is not configured.
    pub servers: Vec<String>,
    /// NKey seed used to sign the connection handshake.
    pub nkey_seed: Option<String>,
    /// Subject namespace prefix for tenant isolation.
    pub prefix: String,
    /// JetStream stream to create when missing. `None` expects it to exist.
    pub stream: Option<String>,
    /// Reconnect attempts after a lost connection.
    pub max_reconnects: usize,
    /// Fixed delay between reconnect attempts.
    pub reconnect_delay: Duration,
    pub connect_timeout: Duration,
    /// Upper bound for one publish including its acknowledgement.
    pub publish_timeout: Duration,
    /// Flush the connection after every acknowledged publish.
    pub flush_after_publish: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            nkey_seed: None,
            prefix: String::new(),
            stream: None,
            max_reconnects: 10,
            reconnect_delay: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(5),
            publish_timeout: Duration::from_secs(5),
            flush_after_publish: true,
        }
    }
}

impl BusConfig {
    /// Defaults overridden by the `SHIPYARD_BUS_*` variables.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let servers = non_blank(ENV_BUS_SERVERS)
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            servers,
            nkey_seed: non_blank(ENV_BUS_NKEY_SEED),
            prefix: non_blank(ENV_BUS_PREFIX).unwrap_or_default(),
            stream: non_blank(ENV_BUS_STREAM),
            ..Self::default()
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    #[inline]
    pub fn is_configured(&self) -> bool {
        !self.servers.is_empty()
    }

    pub fn validate(&self) -> Result<(), BusError> {
        if !self.is_configured() {
            return Err(BusError::NotConfigured);
        }
        if self.prefix.contains(['*', '>', ' ']) {
            return Err(BusError::InvalidConfig(format!(
                "prefix {:?} contains wildcard or whitespace",
                self.prefix
            )));
        }
        if self.publish_timeout.is_zero() {
            return Err(BusError::InvalidConfig("publish timeout must be > 0".into()));
        }
        Ok(())
    }
}
