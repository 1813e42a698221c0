// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builder for configuring in-process tiers.
//!
//! This module provides a builder API for `MemoryTier` that abstracts
//! the underlying moka configuration, providing a stable API surface
//! without exposing moka's types.

use std::marker::PhantomData;
use std::time::Duration;

use crate::tier::MemoryTier;

/// Builder for configuring a `MemoryTier`.
///
/// There is no tier-wide time-to-live: every entry expires after the `ttl` passed to
/// [`CacheTier::set`](strata_tier::CacheTier::set).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use strata_memory::MemoryTier;
///
/// let tier = MemoryTier::<i32>::builder()
///     .max_capacity(1000)
///     .time_to_idle(Duration::from_secs(60))
///     .initial_capacity(100)
///     .name("profiles")
///     .build();
/// ```
#[derive(Debug)]
pub struct MemoryTierBuilder<V> {
    pub(crate) max_capacity: Option<u64>,
    pub(crate) initial_capacity: Option<usize>,
    pub(crate) time_to_idle: Option<Duration>,
    pub(crate) name: Option<String>,
    _phantom: PhantomData<V>,
}

impl<V> Default for MemoryTierBuilder<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> MemoryTierBuilder<V> {
    /// Creates a new builder with default settings.
    ///
    /// The default configuration creates an unbounded tier with `TinyLFU`
    /// eviction policy and no idle expiration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_capacity: None,
            initial_capacity: None,
            time_to_idle: None,
            name: None,
            _phantom: PhantomData,
        }
    }

    /// Sets the maximum number of entries.
    ///
    /// Once the capacity is reached, entries will be evicted to make room
    /// for new entries using the `TinyLFU` eviction policy (combination of
    /// LRU eviction and LFU admission).
    ///
    /// If not set, the tier will be unbounded (limited only by available memory).
    #[must_use]
    pub fn max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = Some(capacity);
        self
    }

    /// Sets the initial capacity (pre-allocation hint).
    ///
    /// The tier may still grow beyond this size.
    #[must_use]
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = Some(capacity);
        self
    }

    /// Sets the time-to-idle (TTI) for all entries.
    ///
    /// Entries will expire after this duration of inactivity (no reads or writes), or after
    /// their own TTL, whichever comes first.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use strata_memory::MemoryTier;
    ///
    /// let tier = MemoryTier::<i32>::builder()
    ///     .time_to_idle(Duration::from_secs(60))
    ///     .build();
    /// ```
    #[must_use]
    pub fn time_to_idle(mut self, duration: Duration) -> Self {
        self.time_to_idle = Some(duration);
        self
    }

    /// Sets a name for the tier.
    ///
    /// This name may appear in logs or debugging output.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builds the configured `MemoryTier`.
    #[must_use]
    pub fn build(self) -> MemoryTier<V>
    where
        V: Clone + Send + Sync + 'static,
    {
        MemoryTier::from_builder(&self)
    }
}
