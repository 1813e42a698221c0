// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! In-process cache tier using moka.
//!
//! This module provides an in-memory cache tier backed by the moka crate,
//! which offers high-performance concurrent caching with eviction policies.

use std::{
    fmt,
    time::{Duration, Instant},
};

use moka::{Expiry, future::Cache};
use strata_tier::{CacheTier, Error};

use crate::builder::MemoryTierBuilder;

/// A value together with the expiry it was written with.
#[derive(Clone)]
struct Stored<V> {
    value: V,
    ttl: Option<Duration>,
}

impl<V> Stored<V> {
    fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            ttl: (!ttl.is_zero()).then_some(ttl),
        }
    }
}

/// Expires each entry after the TTL it was last written with.
struct PerEntryTtl;

impl<V> Expiry<String, Stored<V>> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, value: &Stored<V>, _created_at: Instant) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Stored<V>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl
    }
}

/// An in-process cache tier backed by moka.
///
/// This tier provides:
/// - Concurrent access with high performance
/// - Automatic eviction based on capacity
/// - Expiry per entry, taken from the `ttl` of each write
///
/// Cloning is cheap and shares the underlying storage.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use strata_memory::MemoryTier;
/// use strata_tier::CacheTier;
/// # futures::executor::block_on(async {
///
/// let tier = MemoryTier::<i32>::new();
///
/// tier.set("key", 42, Duration::ZERO).await.unwrap();
/// assert_eq!(tier.get("key").await.unwrap(), Some(42));
/// assert!(tier.delete("key").await.unwrap());
/// # });
/// ```
#[derive(Clone)]
pub struct MemoryTier<V>
where
    V: Clone + Send + Sync + 'static,
{
    inner: Cache<String, Stored<V>>,
}

impl<V> fmt::Debug for MemoryTier<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryTier")
            .field("name", &self.inner.name())
            .field("entry_count", &self.inner.entry_count())
            .finish()
    }
}

impl<V> Default for MemoryTier<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> MemoryTier<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a new unbounded in-process tier.
    ///
    /// The tier will use default eviction policy (`TinyLFU`).
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a new in-process tier holding at most `max_capacity` entries.
    ///
    /// # Examples
    ///
    /// ```
    /// use strata_memory::MemoryTier;
    ///
    /// let tier = MemoryTier::<i32>::with_capacity(1000);
    /// ```
    #[must_use]
    pub fn with_capacity(max_capacity: u64) -> Self {
        Self::builder().max_capacity(max_capacity).build()
    }

    /// Creates a new builder for configuring an in-process tier.
    #[must_use]
    pub fn builder() -> MemoryTierBuilder<V> {
        MemoryTierBuilder::new()
    }

    /// Returns the name given to this tier, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.inner.name()
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.inner.invalidate_all();
    }

    /// Processes pending evictions and expirations.
    ///
    /// moka performs maintenance lazily; call this before inspecting [`CacheTier::len`] when
    /// an exact count matters.
    pub async fn run_pending_tasks(&self) {
        self.inner.run_pending_tasks().await;
    }

    /// Constructs a `MemoryTier` from a builder.
    pub(crate) fn from_builder(builder: &MemoryTierBuilder<V>) -> Self {
        let mut moka_builder = Cache::builder().expire_after(PerEntryTtl);

        if let Some(capacity) = builder.max_capacity {
            moka_builder = moka_builder.max_capacity(capacity);
        }

        if let Some(capacity) = builder.initial_capacity {
            moka_builder = moka_builder.initial_capacity(capacity);
        }

        if let Some(tti) = builder.time_to_idle {
            moka_builder = moka_builder.time_to_idle(tti);
        }

        if let Some(name) = builder.name.as_deref() {
            moka_builder = moka_builder.name(name);
        }

        Self {
            inner: moka_builder.build(),
        }
    }
}

impl<V> CacheTier<V> for MemoryTier<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<Option<V>, Error> {
        Ok(self.inner.get(key).await.map(|stored| stored.value))
    }

    async fn set(&self, key: &str, value: V, ttl: Duration) -> Result<(), Error> {
        self.inner.insert(key.to_owned(), Stored::new(value, ttl)).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, Error> {
        Ok(self.inner.remove(key).await.is_some())
    }

    fn len(&self) -> Option<u64> {
        Some(self.inner.entry_count())
    }
}
