use anyhow::{Context, Result};
use std::time::Duration;

/// How long to wait while connecting to the remote write endpoint.
/// Use the `REMOTE_WRITE_DIAL_TIMEOUT` env var to override (seconds).
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait for response headers after sending a request.
/// Use the `REMOTE_WRITE_TIMEOUT` env var to override (seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// How many keep-alive connections to hold open per host.
pub const DEFAULT_MAX_CONNECTIONS_PER_HOST: usize = 100;

#[derive(Clone, Debug, PartialEq)]
pub struct ClientConfig {
    /// Bounds establishing a connection
    pub dial_timeout: Duration,

    /// Bounds waiting for response headers once connected
    pub timeout: Duration,

    /// The maximum number of pooled connections per host
    pub max_connections_per_host: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            timeout: DEFAULT_TIMEOUT,
            max_connections_per_host: DEFAULT_MAX_CONNECTIONS_PER_HOST,
        }
    }
}

impl ClientConfig {
    pub fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_connections_per_host(mut self, max: usize) -> Self {
        self.max_connections_per_host = max;
        self
    }

    /// Loads configuration from environment variables (and `.env`), falling back to defaults.
    pub fn from_env() -> Result<ClientConfig> {
        let mut config = ClientConfig::default();
        if let Ok(val) = dotenv::var("REMOTE_WRITE_DIAL_TIMEOUT") {
            let secs = val.parse().context("invalid REMOTE_WRITE_DIAL_TIMEOUT")?;
            config.dial_timeout = Duration::from_secs(secs);
        }
        if let Ok(val) = dotenv::var("REMOTE_WRITE_TIMEOUT") {
            let secs = val.parse().context("invalid REMOTE_WRITE_TIMEOUT")?;
            config.timeout = Duration::from_secs(secs);
        }
        if let Ok(val) = dotenv::var("REMOTE_WRITE_MAX_CONNECTIONS") {
            config.max_connections_per_host =
                val.parse().context("invalid REMOTE_WRITE_MAX_CONNECTIONS")?;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_match_protocol_client() {
        let config = ClientConfig::default();
        assert_eq!(config.dial_timeout, Duration::from_secs(5));
        assert_eq!(config.timeout, Duration::from_secs(15));
        assert_eq!(config.max_connections_per_host, 100);

        let config = config
            .with_dial_timeout(Duration::from_millis(250))
            .with_timeout(Duration::from_secs(1))
            .with_max_connections_per_host(4);
        assert_eq!(config.dial_timeout, Duration::from_millis(250));
        assert_eq!(config.timeout, Duration::from_secs(1));
        assert_eq!(config.max_connections_per_host, 4);
    }

    // The only test in this crate that touches these variables
    #[test]
    fn loads_from_env() {
        std::env::set_var("REMOTE_WRITE_DIAL_TIMEOUT", "2");
        std::env::set_var("REMOTE_WRITE_TIMEOUT", "30");
        std::env::remove_var("REMOTE_WRITE_MAX_CONNECTIONS");
        let config = ClientConfig::from_env().unwrap();
        assert_eq!(config.dial_timeout, Duration::from_secs(2));
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_connections_per_host, 100);

        std::env::set_var("REMOTE_WRITE_TIMEOUT", "soon");
        let err = ClientConfig::from_env().unwrap_err();
        assert_eq!(err.to_string(), "invalid REMOTE_WRITE_TIMEOUT");

        std::env::remove_var("REMOTE_WRITE_TIMEOUT");
        std::env::set_var("REMOTE_WRITE_URL", "http://localhost:9090/api/v1/write");
        let client = crate::RemoteWriteClient::from_env().unwrap();
        assert_eq!(client.url(), "http://localhost:9090/api/v1/write");
        assert_eq!(client.config().dial_timeout, Duration::from_secs(2));

        std::env::remove_var("REMOTE_WRITE_URL");
        std::env::remove_var("REMOTE_WRITE_DIAL_TIMEOUT");
    }
}
