// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Redis-backed cache tier.
//!
//! [`RedisTier`] stores values in Redis through a [`Codec`](strata_tier::Codec), so it can sit
//! below an in-process tier and share cached values between processes. Single-key operations
//! map to `GET`, `SET` (with `PX` expiry) and `DEL`; batch reads use one `MGET` and batch writes
//! are pipelined.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use strata_redis::{RedisConfig, RedisTier};
//! use strata_tier::{CacheTier, JsonCodec};
//!
//! # async fn example() -> Result<(), strata_tier::Error> {
//! let config = RedisConfig {
//!     key_prefix: "profiles:".to_string(),
//!     ..RedisConfig::default()
//! };
//! let tier = RedisTier::<String>::connect(&config, JsonCodec).await?;
//!
//! tier.set("42", "Ada".to_string(), Duration::from_secs(600)).await?;
//! assert_eq!(tier.get("42").await?, Some("Ada".to_string()));
//! # Ok(())
//! # }
//! ```

mod config;
mod tier;

pub use config::RedisConfig;
pub use tier::RedisTier;
