// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builders for [`TieredCache`] and [`BatchTieredCache`].
//!
//! Both caches are assembled the same way: tiers are added in lookup order, fastest first, and
//! the builder decides whether concurrent misses share one compute. The builder's mode type
//! parameter selects which cache [`build`](CacheBuilder::build) produces.

use std::{fmt, marker::PhantomData};

use strata_tier::{CacheTier, DynamicTier, DynamicTierExt};

use crate::{BatchTieredCache, CacheName, TieredCache};

/// Builder mode producing a [`TieredCache`].
#[derive(Clone, Copy, Debug)]
pub struct SingleKey;

/// Builder mode producing a [`BatchTieredCache`].
#[derive(Clone, Copy, Debug)]
pub struct Batch;

/// Builder for [`TieredCache`].
pub type TieredCacheBuilder<V> = CacheBuilder<V, SingleKey>;

/// Builder for [`BatchTieredCache`].
pub type BatchTieredCacheBuilder<V> = CacheBuilder<V, Batch>;

/// Assembles an ordered list of tiers into a cache.
///
/// Tiers are consulted in the order they are added. A cache built without any tier is a
/// plain read-through memoizer over its compute function.
///
/// # Examples
///
/// ```
/// use strata::{MemoryTier, TieredCache};
///
/// let cache = TieredCache::<String>::builder()
///     .name("profiles")
///     .tier(MemoryTier::with_capacity(1_000))
///     .optional_tier(None::<MemoryTier<String>>)
///     .build();
///
/// assert_eq!(cache.name(), "profiles");
/// assert_eq!(cache.tier_count(), 1);
/// ```
#[must_use]
pub struct CacheBuilder<V, Mode> {
    name: Option<CacheName>,
    tiers: Vec<DynamicTier<V>>,
    deduplicate: bool,
    _mode: PhantomData<Mode>,
}

impl<V, Mode> fmt::Debug for CacheBuilder<V, Mode> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheBuilder")
            .field("name", &self.name)
            .field("tiers", &self.tiers.len())
            .field("deduplicate", &self.deduplicate)
            .finish()
    }
}

impl<V, Mode> CacheBuilder<V, Mode>
where
    V: Clone + Send + Sync + 'static,
{
    const fn with_deduplication(deduplicate: bool) -> Self {
        Self {
            name: None,
            tiers: Vec::new(),
            deduplicate,
            _mode: PhantomData,
        }
    }

    /// Sets the name reported in the `cache.name` field of every log event.
    pub fn name(mut self, name: CacheName) -> Self {
        self.name = Some(name);
        self
    }

    /// Appends a tier below the ones already added.
    pub fn tier<T>(mut self, tier: T) -> Self
    where
        T: CacheTier<V> + 'static,
    {
        self.tiers.push(tier.into_dynamic());
        self
    }

    /// Appends a tier if it is present.
    ///
    /// Tiers that are only configured in some deployments can be passed straight through
    /// without branching at the call site.
    pub fn optional_tier<T>(self, tier: Option<T>) -> Self
    where
        T: CacheTier<V> + 'static,
    {
        match tier {
            Some(tier) => self.tier(tier),
            None => self,
        }
    }

    /// Appends an unbounded in-process tier.
    #[cfg(feature = "memory")]
    pub fn memory(self) -> Self {
        self.tier(strata_memory::MemoryTier::new())
    }

    fn into_parts(self, default_name: CacheName) -> (CacheName, Vec<DynamicTier<V>>, bool) {
        (self.name.unwrap_or(default_name), self.tiers, self.deduplicate)
    }
}

impl<V> CacheBuilder<V, SingleKey>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a builder with stampede protection enabled and no tiers.
    pub const fn new() -> Self {
        Self::with_deduplication(true)
    }

    /// Controls whether concurrent misses on one key share a single compute.
    ///
    /// Enabled by default. When disabled, every miss invokes the compute function.
    pub fn stampede_protection(mut self, enabled: bool) -> Self {
        self.deduplicate = enabled;
        self
    }

    /// Builds the cache.
    #[must_use]
    pub fn build(self) -> TieredCache<V> {
        let (name, tiers, stampede_protection) = self.into_parts("TieredCache");
        TieredCache::new(name, tiers, stampede_protection)
    }
}

impl<V> Default for CacheBuilder<V, SingleKey>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> CacheBuilder<V, Batch>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a builder with miss coalescing disabled and no tiers.
    pub const fn new() -> Self {
        Self::with_deduplication(false)
    }

    /// Controls whether concurrent batch gets with an identical set of unresolved keys share
    /// a single batch compute.
    ///
    /// Disabled by default.
    pub fn coalesce_misses(mut self, enabled: bool) -> Self {
        self.deduplicate = enabled;
        self
    }

    /// Builds the cache.
    #[must_use]
    pub fn build(self) -> BatchTieredCache<V> {
        let (name, tiers, coalesce_misses) = self.into_parts("BatchTieredCache");
        BatchTieredCache::new(name, tiers, coalesce_misses)
    }
}

impl<V> Default for CacheBuilder<V, Batch>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
