//! Client configuration.

use std::env;
use std::time::Duration;

use crate::error::ApiError;

pub const DEFAULT_ADDRESS: &str = "http://localhost:28902/";

/// Where the management server lives and how long a single call may take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub address: String,
    /// Whole-call timeout handed to the transport. `None` keeps its default.
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Reads `AXLE_ADDRESS` and `AXLE_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ApiError> {
        let address = env::var("AXLE_ADDRESS").unwrap_or_else(|_| DEFAULT_ADDRESS.to_string());
        let timeout = match env::var("AXLE_TIMEOUT_SECS") {
            Ok(raw) => Some(parse_timeout(&raw)?),
            Err(_) => None,
        };
        Ok(Self { address, timeout })
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ADDRESS)
    }
}

fn parse_timeout(raw: &str) -> Result<Duration, ApiError> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| {
            ApiError::InvalidConfig(format!(
                "AXLE_TIMEOUT_SECS={raw:?} is not a whole number of seconds"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_points_at_local_server() {
        let config = ClientConfig::default();
        assert_eq!(config.address, "http://localhost:28902/");
        assert!(config.timeout.is_none());
    }

    #[test]
    fn timeout_parses_whole_seconds() {
        assert_eq!(parse_timeout(" 5 ").unwrap(), Duration::from_secs(5));
        assert!(parse_timeout("soon").is_err());
    }
}
