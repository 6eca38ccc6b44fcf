//! Configuration types

use crate::{ConfigError, PageRequest, ParleyResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry policy for index fan-out writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts after the first one.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f32,
}

impl RetryConfig {
    /// Never retry.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Delay before retry number `attempt` (1-based), capped at `max_backoff`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let factor = f64::from(self.backoff_multiplier.max(1.0)).powi(exponent);
        Duration::try_from_secs_f64(self.initial_backoff.as_secs_f64() * factor)
            .map(|delay| delay.min(self.max_backoff))
            .unwrap_or(self.max_backoff)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(2),
            backoff_multiplier: 2.0,
        }
    }
}

/// Master configuration struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParleyConfig {
    // Storage
    pub keyspace: String,
    pub replication_factor: u32,
    /// Rows requested per store round-trip when scanning a partition.
    pub scan_fetch_size: u32,

    // Pagination
    pub default_page_limit: u32,
    pub max_page_limit: u32,

    // Messages
    pub max_message_len: usize,

    // Fan-out
    pub fan_out_retry: RetryConfig,
}

impl Default for ParleyConfig {
    fn default() -> Self {
        Self {
            keyspace: "messenger".to_string(),
            replication_factor: 3,
            scan_fetch_size: 100,
            default_page_limit: 20,
            max_page_limit: 100,
            max_message_len: 4096,
            fan_out_retry: RetryConfig::default(),
        }
    }
}

impl ParleyConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> ParleyResult<()> {
        if self.keyspace.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "keyspace".to_string(),
            }
            .into());
        }
        if !self
            .keyspace
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(invalid("keyspace", &self.keyspace, "must be alphanumeric or '_'"));
        }

        let positive = [
            ("replication_factor", self.replication_factor),
            ("scan_fetch_size", self.scan_fetch_size),
            ("default_page_limit", self.default_page_limit),
            ("max_page_limit", self.max_page_limit),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(invalid(field, &value.to_string(), "must be positive"));
            }
        }

        if self.default_page_limit > self.max_page_limit {
            return Err(invalid(
                "default_page_limit",
                &self.default_page_limit.to_string(),
                "must not exceed max_page_limit",
            ));
        }
        if self.max_message_len == 0 {
            return Err(invalid("max_message_len", "0", "must be positive"));
        }
        if self.fan_out_retry.backoff_multiplier < 1.0 {
            return Err(invalid(
                "fan_out_retry.backoff_multiplier",
                &self.fan_out_retry.backoff_multiplier.to_string(),
                "must be >= 1.0",
            ));
        }
        if self.fan_out_retry.initial_backoff > self.fan_out_retry.max_backoff {
            return Err(invalid(
                "fan_out_retry.initial_backoff",
                &format!("{:?}", self.fan_out_retry.initial_backoff),
                "must not exceed max_backoff",
            ));
        }

        Ok(())
    }

    /// Build a page request, filling in the default limit and enforcing the max.
    pub fn page_request(&self, page: Option<i64>, limit: Option<i64>) -> ParleyResult<PageRequest> {
        PageRequest::with_max_limit(
            page.unwrap_or(1),
            limit.unwrap_or(self.default_page_limit as i64),
            self.max_page_limit,
        )
    }
}

fn invalid(field: &str, value: &str, reason: &str) -> crate::ParleyError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
    .into()
}
