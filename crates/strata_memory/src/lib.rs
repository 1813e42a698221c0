// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! High-performance in-process cache tier backed by moka.
//!
//! This crate provides [`MemoryTier`], a concurrent in-memory [`CacheTier`] using moka's
//! `TinyLFU` eviction algorithm. Every entry expires after the `ttl` it was written with,
//! so a tiered cache can share one expiry across its in-process and remote tiers. Use
//! [`MemoryTierBuilder`] to configure capacity and idle expiry without exposing moka types.
//!
//! # Quick Start
//!
//! ```
//! use std::time::Duration;
//!
//! use strata_memory::MemoryTier;
//! use strata_tier::CacheTier;
//!
//! # futures::executor::block_on(async {
//! let tier = MemoryTier::<i32>::builder()
//!     .max_capacity(1000)
//!     .build();
//!
//! tier.set("key", 42, Duration::from_secs(300)).await.unwrap();
//! assert_eq!(tier.get("key").await.unwrap(), Some(42));
//! # });
//! ```
//!
//! # Features
//!
//! - **Capacity limits**: Set maximum entry count with automatic eviction
//! - **Per-entry TTL**: Each write carries its own expiry; a zero TTL never expires
//! - **TTI**: Optionally expire entries that are not accessed for a while
//! - **Zero external types**: Builder API avoids exposing moka in your public API
//!
//! [`CacheTier`]: strata_tier::CacheTier

pub mod builder;
pub mod tier;

#[doc(inline)]
pub use builder::MemoryTierBuilder;
#[doc(inline)]
pub use tier::MemoryTier;
