// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Core cache tier abstractions for building strata cache backends.
//!
//! This crate defines the [`CacheTier`] trait that every backend must satisfy, the [`Error`]
//! type shared by the whole strata family, and the [`Codec`] contract used by byte-oriented
//! backends.
//!
//! # Overview
//!
//! A tier is an independent key-value store with per-entry expiry. Keys are opaque strings,
//! values are of one type `V` per tier. A tier reports an absent key as a **miss**, which is
//! always distinguishable from a backend failure:
//!
//! - [`CacheTier::get`] returns `Ok(None)` on a miss.
//! - [`CacheTier::delete`] returns `Ok(false)` on a miss.
//! - A tier may also report a miss as an [`Error`] whose [`is_miss`](Error::is_miss) is `true`.
//!
//! The `strata` crate stacks tiers into a read-through chain with backfill and stampede
//! protection.
//!
//! # Implementing a Cache Tier
//!
//! Only the single-key operations are required. The batch operations default to looping
//! over them; backends with a native multi-key command should override them.
//!
//! ```
//! use std::collections::HashMap;
//! use std::sync::RwLock;
//! use std::time::Duration;
//!
//! use strata_tier::{CacheTier, Error};
//!
//! struct SimpleTier<V>(RwLock<HashMap<String, V>>);
//!
//! impl<V> CacheTier<V> for SimpleTier<V>
//! where
//!     V: Clone + Send + Sync,
//! {
//!     async fn get(&self, key: &str) -> Result<Option<V>, Error> {
//!         Ok(self.0.read().unwrap().get(key).cloned())
//!     }
//!
//!     async fn set(&self, key: &str, value: V, _ttl: Duration) -> Result<(), Error> {
//!         self.0.write().unwrap().insert(key.to_owned(), value);
//!         Ok(())
//!     }
//!
//!     async fn delete(&self, key: &str) -> Result<bool, Error> {
//!         Ok(self.0.write().unwrap().remove(key).is_some())
//!     }
//! }
//! ```
//!
//! # Dynamic Dispatch
//!
//! [`DynamicTier`] wraps any `CacheTier` in a clonable, type-erased container so that tier
//! chains can mix heterogeneous backends.

pub mod codec;
mod dynamic;
pub mod error;
#[cfg(any(feature = "test-util", test))]
pub mod testing;
pub(crate) mod tier;

#[doc(inline)]
pub use codec::Codec;
#[cfg(feature = "serde")]
#[doc(inline)]
pub use codec::{JsonCodec, MessagePackCodec};
#[doc(inline)]
pub use dynamic::{DynamicTier, DynamicTierExt};
#[doc(inline)]
pub use error::{Error, ErrorKind, Result};
#[doc(inline)]
pub use tier::CacheTier;
