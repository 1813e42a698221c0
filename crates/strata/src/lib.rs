// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Multi-tier read-through caching with backfill and stampede protection.
//!
//! A strata cache stacks independent [`CacheTier`]s, fastest first, typically an in-process
//! [`MemoryTier`] above a shared networked tier. Lookups walk the tiers in order:
//!
//! - A hit in a lower tier is copied into every tier above it (backfill), using the caller's TTL.
//! - When no tier has the key, the caller's compute function produces the value, and the value
//!   is written through to every tier.
//! - Concurrent misses on the same key share one compute (stampede protection).
//!
//! Two caches are provided:
//!
//! - [`TieredCache`] resolves one key per call and is strict: a tier failure aborts the lookup.
//! - [`BatchTieredCache`] resolves many keys per call and is tolerant: a failing tier is skipped
//!   and only a failing compute fails the call, returning the partial result in a
//!   [`BatchError`].
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use strata::{MemoryTier, TieredCache};
//! # futures::executor::block_on(async {
//!
//! let l1 = MemoryTier::with_capacity(10_000);
//! let l2 = MemoryTier::new();
//!
//! let cache = TieredCache::<u64>::builder()
//!     .name("word_lengths")
//!     .tier(l1)
//!     .tier(l2)
//!     .build();
//!
//! let len = cache
//!     .get("strata", Duration::from_secs(300), |key| async move { Ok(key.len() as u64) })
//!     .await?;
//! assert_eq!(len, 6);
//! # Ok::<(), strata::Error>(())
//! # });
//! ```
//!
//! # Logging
//!
//! Cache events are emitted through [`tracing`] under the `cache.event` message, with the
//! fields `cache.name`, `cache.operation`, `cache.activity`, `cache.tier`, `cache.key` (single
//! key), `cache.keys` (key count) and `error`. Hits, misses and computes are `debug` events;
//! failures that the cache swallows, such as a failed backfill, are `warn` events.
//!
//! # Testing
//!
//! With the `test-util` feature, [`MockTier`] provides an in-memory tier that records every
//! operation and can be told to fail.

pub mod builder;
mod batch;
mod telemetry;
mod tiered;

/// Name attached to every event a cache emits.
pub type CacheName = &'static str;

pub use batch::{BatchError, BatchTieredCache};
pub use builder::{BatchTieredCacheBuilder, TieredCacheBuilder};
#[cfg(feature = "memory")]
pub use strata_memory::{MemoryTier, MemoryTierBuilder};
pub use strata_tier::{CacheTier, DynamicTier, DynamicTierExt, Error, ErrorKind, Result};
#[cfg(any(feature = "test-util", test))]
pub use strata_tier::testing::{MockTier, TierOp};
pub use tiered::TieredCache;
