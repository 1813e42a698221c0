// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Single-key read-through cache over an ordered list of tiers.

use std::{fmt, time::Duration};

use strata_flight::Merger;
use strata_tier::{CacheTier, DynamicTier, Error};

use crate::{
    CacheName,
    builder::TieredCacheBuilder,
    telemetry::{CacheActivity, CacheEvent, CacheOperation},
};

/// A read-through cache that resolves one key at a time across an ordered list of tiers.
///
/// Lookups walk the tiers fastest first. A hit in a lower tier is copied into every tier above
/// it (backfill), so the next lookup is served from the top. When every tier misses, the
/// caller's compute function produces the value, which is then written through to every tier.
///
/// With stampede protection enabled (the default), concurrent misses on the same key share a
/// single compute: one caller runs it and the others receive a clone of its result, value or
/// error alike.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use strata::{MemoryTier, TieredCache};
/// # futures::executor::block_on(async {
///
/// let cache = TieredCache::<String>::builder()
///     .name("greetings")
///     .tier(MemoryTier::new())
///     .build();
///
/// let value = cache
///     .get("en", Duration::from_secs(60), |key| async move { Ok(format!("hello ({key})")) })
///     .await?;
/// assert_eq!(value, "hello (en)");
///
/// // Served from the tier, the compute function is not called again.
/// let cached = cache.get_cached("en", Duration::from_secs(60)).await?;
/// assert_eq!(cached, value);
/// # Ok::<(), strata::Error>(())
/// # });
/// ```
pub struct TieredCache<V> {
    name: CacheName,
    tiers: Vec<DynamicTier<V>>,
    flights: Option<Merger<String, Result<V, Error>>>,
}

impl<V> fmt::Debug for TieredCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TieredCache")
            .field("name", &self.name)
            .field("tiers", &self.tiers.len())
            .field("stampede_protection", &self.flights.is_some())
            .finish()
    }
}

impl<V> TieredCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a builder for a single-key tiered cache.
    pub const fn builder() -> TieredCacheBuilder<V> {
        TieredCacheBuilder::new()
    }

    pub(crate) fn new(name: CacheName, tiers: Vec<DynamicTier<V>>, stampede_protection: bool) -> Self {
        Self {
            name,
            tiers,
            flights: stampede_protection.then(Merger::new),
        }
    }

    /// Returns the name used in log events.
    #[must_use]
    pub const fn name(&self) -> CacheName {
        self.name
    }

    /// Returns the number of tiers.
    #[must_use]
    pub fn tier_count(&self) -> usize {
        self.tiers.len()
    }

    /// Returns `true` if concurrent misses on one key share a single compute.
    #[must_use]
    pub const fn stampede_protection(&self) -> bool {
        self.flights.is_some()
    }

    /// Returns the number of keys with a compute currently in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.flights.as_ref().map_or(0, Merger::len)
    }

    /// Returns the value for `key`, computing and storing it when no tier has it.
    ///
    /// `ttl` applies to every write this call makes, both backfills and the write-through of a
    /// computed value. A zero `ttl` stores entries without expiry.
    ///
    /// # Errors
    ///
    /// - A tier error that is not a miss aborts the lookup and is returned as is; lower tiers are
    ///   not consulted.
    /// - An error from `compute` is returned unchanged, to every caller sharing that compute.
    /// - A failure to write the computed value into a tier is returned even though the compute
    ///   succeeded.
    /// - [`ErrorKind::Panicked`](strata_tier::ErrorKind::Panicked) if the shared compute
    ///   panicked.
    pub async fn get<F, Fut>(&self, key: &str, ttl: Duration, compute: F) -> Result<V, Error>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<V, Error>>,
    {
        if let Some(value) = self.lookup(CacheOperation::Get, key, ttl).await? {
            return Ok(value);
        }

        match &self.flights {
            Some(flights) => flights
                .execute(key, || self.load(key, ttl, compute))
                .await
                .unwrap_or_else(|panicked| Err(Error::panicked(panicked))),
            None => self.compute_and_store(key, ttl, compute).await,
        }
    }

    /// Returns the value for `key` from the first tier that has it, without computing.
    ///
    /// Upper tiers are backfilled exactly as in [`get`](Self::get).
    ///
    /// # Errors
    ///
    /// Returns a miss error ([`Error::is_miss`]) if no tier has the key, or the first tier
    /// error that is not a miss.
    pub async fn get_cached(&self, key: &str, ttl: Duration) -> Result<V, Error> {
        self.lookup(CacheOperation::GetCached, key, ttl).await?.ok_or_else(Error::miss)
    }

    /// Stores `value` under `key` in every tier, top to bottom.
    ///
    /// # Errors
    ///
    /// Returns the first tier error. Tiers written before the failure keep the value.
    pub async fn set(&self, key: &str, value: V, ttl: Duration) -> Result<(), Error> {
        for tier in &self.tiers {
            tier.set(key, value.clone(), ttl).await?;
        }
        Ok(())
    }

    /// Removes `key` from every tier, top to bottom.
    ///
    /// A tier that does not hold the key does not stop the removal from the others.
    ///
    /// # Errors
    ///
    /// Returns the first tier error that is not a miss. Tiers below it are left untouched.
    pub async fn delete(&self, key: &str) -> Result<(), Error> {
        for tier in &self.tiers {
            match tier.delete(key).await {
                Ok(_) => {}
                Err(error) if error.is_miss() => {}
                Err(error) => return Err(error),
            }
        }
        Ok(())
    }

    /// Walks the tiers until one has `key`, backfilling the tiers above the hit.
    async fn lookup(&self, operation: CacheOperation, key: &str, ttl: Duration) -> Result<Option<V>, Error> {
        for (index, tier) in self.tiers.iter().enumerate() {
            let value = match tier.get(key).await {
                Ok(Some(value)) => value,
                Ok(None) => continue,
                Err(error) if error.is_miss() => continue,
                Err(error) => return Err(error),
            };

            CacheEvent::new(self.name, operation, CacheActivity::Hit).tier(index).key(key).emit();
            self.backfill(operation, key, &value, ttl, index).await;
            return Ok(Some(value));
        }

        CacheEvent::new(self.name, operation, CacheActivity::Miss).key(key).emit();
        Ok(None)
    }

    /// Best-effort copy of a hit into the tiers above `hit`.
    async fn backfill(&self, operation: CacheOperation, key: &str, value: &V, ttl: Duration, hit: usize) {
        for (index, tier) in self.tiers[..hit].iter().enumerate() {
            if let Err(error) = tier.set(key, value.clone(), ttl).await {
                CacheEvent::new(self.name, operation, CacheActivity::BackfillFailed)
                    .tier(index)
                    .key(key)
                    .emit_error(&error);
            }
        }
    }

    /// Runs under the in-flight record: another caller may have filled a tier meanwhile.
    async fn load<F, Fut>(&self, key: &str, ttl: Duration, compute: F) -> Result<V, Error>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<V, Error>>,
    {
        if let Some(value) = self.lookup(CacheOperation::Get, key, ttl).await? {
            return Ok(value);
        }
        self.compute_and_store(key, ttl, compute).await
    }

    async fn compute_and_store<F, Fut>(&self, key: &str, ttl: Duration, compute: F) -> Result<V, Error>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<V, Error>>,
    {
        CacheEvent::new(self.name, CacheOperation::Get, CacheActivity::Compute).key(key).emit();
        let value = compute(key.to_owned()).await?;
        self.set(key, value.clone(), ttl).await?;
        Ok(value)
    }
}
