//! API Configuration Module
//!
//! Configuration is loaded from environment variables with defaults suited
//! to local development.

use crate::error::{ApiError, ApiResult};
use parley_core::ParleyConfig;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Server and messaging configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind, e.g. `0.0.0.0`.
    pub bind_host: String,

    /// Port to bind.
    pub port: u16,

    /// Requests running longer than this are answered with 408.
    pub request_timeout: Duration,

    /// Messaging core configuration.
    pub parley: ParleyConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: 3000,
            request_timeout: Duration::from_secs(30),
            parley: ParleyConfig::default(),
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `PARLEY_API_BIND`: Host to bind (default: 0.0.0.0)
    /// - `PORT` / `PARLEY_API_PORT`: Port to bind (default: 3000)
    /// - `PARLEY_REQUEST_TIMEOUT_SECS`: Per-request timeout (default: 30)
    /// - `PARLEY_KEYSPACE`: Keyspace name (default: messenger)
    /// - `PARLEY_REPLICATION_FACTOR`: Keyspace replication (default: 3)
    /// - `PARLEY_DEFAULT_PAGE_LIMIT`: Page size when none is given (default: 20)
    /// - `PARLEY_MAX_PAGE_LIMIT`: Largest accepted page size (default: 100)
    /// - `PARLEY_SCAN_FETCH_SIZE`: Rows per store round-trip (default: 100)
    /// - `PARLEY_MAX_MESSAGE_LEN`: Longest accepted message (default: 4096)
    /// - `PARLEY_FAN_OUT_MAX_RETRIES`: Index write retries (default: 3)
    pub fn from_env() -> ApiResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> ApiResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parley_defaults = defaults.parley.clone();

        let bind_host = lookup("PARLEY_API_BIND").unwrap_or(defaults.bind_host);

        let port = match lookup("PORT").or_else(|| lookup("PARLEY_API_PORT")) {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ApiError::invalid_input(format!("Invalid port value: {}", raw)))?,
            None => defaults.port,
        };

        let request_timeout = parsed(&lookup, "PARLEY_REQUEST_TIMEOUT_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        let mut fan_out_retry = parley_defaults.fan_out_retry.clone();
        if let Some(max_retries) = parsed(&lookup, "PARLEY_FAN_OUT_MAX_RETRIES") {
            fan_out_retry.max_retries = max_retries;
        }

        let parley = ParleyConfig {
            keyspace: lookup("PARLEY_KEYSPACE").unwrap_or(parley_defaults.keyspace),
            replication_factor: parsed(&lookup, "PARLEY_REPLICATION_FACTOR")
                .unwrap_or(parley_defaults.replication_factor),
            scan_fetch_size: parsed(&lookup, "PARLEY_SCAN_FETCH_SIZE")
                .unwrap_or(parley_defaults.scan_fetch_size),
            default_page_limit: parsed(&lookup, "PARLEY_DEFAULT_PAGE_LIMIT")
                .unwrap_or(parley_defaults.default_page_limit),
            max_page_limit: parsed(&lookup, "PARLEY_MAX_PAGE_LIMIT")
                .unwrap_or(parley_defaults.max_page_limit),
            max_message_len: parsed(&lookup, "PARLEY_MAX_MESSAGE_LEN")
                .unwrap_or(parley_defaults.max_message_len),
            fan_out_retry,
        };
        parley.validate()?;

        Ok(Self {
            bind_host,
            port,
            request_timeout,
            parley,
        })
    }

    /// Socket address to listen on.
    pub fn bind_addr(&self) -> ApiResult<SocketAddr> {
        let addr = format!("{}:{}", self.bind_host, self.port);
        addr.parse::<SocketAddr>().map_err(|e| {
            ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e))
        })
    }
}

/// Parse a variable, ignoring unparsable values.
fn parsed<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|value| value.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let config = ApiConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.parley.keyspace, "messenger");
        assert_eq!(config.parley.default_page_limit, 20);
        assert_eq!(config.bind_addr().unwrap().to_string(), "0.0.0.0:3000");
    }

    #[test]
    fn test_port_prefers_platform_variable() {
        let config =
            ApiConfig::from_lookup(lookup(&[("PORT", "8080"), ("PARLEY_API_PORT", "9000")]))
                .unwrap();
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let err = ApiConfig::from_lookup(lookup(&[("PARLEY_API_PORT", "http")])).unwrap_err();
        assert!(err.message.contains("http"));
    }

    #[test]
    fn test_overrides_are_validated() {
        let config = ApiConfig::from_lookup(lookup(&[
            ("PARLEY_KEYSPACE", "chat"),
            ("PARLEY_MAX_PAGE_LIMIT", "50"),
            ("PARLEY_FAN_OUT_MAX_RETRIES", "0"),
        ]))
        .unwrap();
        assert_eq!(config.parley.keyspace, "chat");
        assert_eq!(config.parley.max_page_limit, 50);
        assert_eq!(config.parley.fan_out_retry.max_retries, 0);

        let result = ApiConfig::from_lookup(lookup(&[
            ("PARLEY_DEFAULT_PAGE_LIMIT", "80"),
            ("PARLEY_MAX_PAGE_LIMIT", "50"),
        ]));
        assert!(result.is_err());
    }
}
