// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Connection settings for a [`RedisTier`](crate::RedisTier).
///
/// Missing fields fall back to [`RedisConfig::default`] when deserializing, so a configuration
/// file only needs to name what it changes.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use strata_redis::RedisConfig;
///
/// let config = RedisConfig {
///     url: "redis://cache.internal:6379/2".to_string(),
///     response_timeout: Duration::from_millis(250),
///     ..RedisConfig::default()
/// };
/// assert_eq!(config.connection_timeout, Duration::from_secs(5));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Server address, including credentials and database number when needed.
    pub url: String,
    /// Prepended to every key before it reaches Redis.
    pub key_prefix: String,
    /// Upper bound for establishing the connection.
    pub connection_timeout: Duration,
    /// Upper bound for a single command or pipeline round trip.
    pub response_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: String::new(),
            connection_timeout: Duration::from_secs(5),
            response_timeout: Duration::from_secs(3),
        }
    }
}
