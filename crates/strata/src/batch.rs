// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Multi-key read-through cache over an ordered list of tiers.

use std::{collections::HashMap, fmt, time::Duration};

use strata_flight::Merger;
use strata_tier::{CacheTier, DynamicTier, Error};

use crate::{
    CacheName,
    builder::BatchTieredCacheBuilder,
    telemetry::{CacheActivity, CacheEvent, CacheOperation},
};

type Computed<V> = Result<HashMap<String, V>, Error>;

/// A read-through cache that resolves many keys per call across an ordered list of tiers.
///
/// Each tier is asked only for the keys the tiers above it did not have. Hits from a lower tier
/// are copied into every tier above it, and the keys no tier has are passed to the compute
/// function in one call. Computed values are written to every tier.
///
/// The batch path favours availability: a tier that fails is skipped for the call, and failed
/// backfills or write-throughs are logged rather than returned.
///
/// # Examples
///
/// ```
/// use std::{collections::HashMap, time::Duration};
///
/// use strata::{BatchTieredCache, MemoryTier};
/// # futures::executor::block_on(async {
///
/// let cache = BatchTieredCache::<usize>::builder().tier(MemoryTier::new()).build();
/// let keys = vec!["a".to_string(), "bb".to_string()];
///
/// let found = cache
///     .batch_get(&keys, Duration::from_secs(60), |missing| async move {
///         Ok(missing.into_iter().map(|key| {
///             let len = key.len();
///             (key, len)
///         }).collect())
///     })
///     .await?;
///
/// assert_eq!(found, HashMap::from([("a".to_string(), 1), ("bb".to_string(), 2)]));
/// # Ok::<(), strata::BatchError<usize>>(())
/// # });
/// ```
pub struct BatchTieredCache<V> {
    name: CacheName,
    tiers: Vec<DynamicTier<V>>,
    coalescer: Option<Merger<Vec<String>, Computed<V>>>,
}

impl<V> fmt::Debug for BatchTieredCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchTieredCache")
            .field("name", &self.name)
            .field("tiers", &self.tiers.len())
            .field("coalesce_misses", &self.coalescer.is_some())
            .finish()
    }
}

impl<V> BatchTieredCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a builder for a batch tiered cache.
    pub const fn builder() -> BatchTieredCacheBuilder<V> {
        BatchTieredCacheBuilder::new()
    }

    pub(crate) fn new(name: CacheName, tiers: Vec<DynamicTier<V>>, coalesce_misses: bool) -> Self {
        Self {
            name,
            tiers,
            coalescer: coalesce_misses.then(Merger::new),
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

    /// Returns `true` if concurrent calls with identical unresolved keys share one compute.
    #[must_use]
    pub const fn coalesces_misses(&self) -> bool {
        self.coalescer.is_some()
    }

    /// Returns the number of batch computes currently in flight under miss coalescing.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.coalescer.as_ref().map_or(0, Merger::len)
    }

    /// Returns the values for `keys`, computing those that no tier has.
    ///
    /// `keys` should not contain duplicates. The returned map holds every key found in a tier
    /// or returned by `compute`; keys that `compute` leaves out are simply absent. `compute` is
    /// called at most once, with the unresolved keys in request order, and not at all when the
    /// tiers resolve everything. An empty `keys` returns an empty map without touching any tier.
    ///
    /// # Errors
    ///
    /// Only a failing compute fails the call. The returned [`BatchError`] carries the compute
    /// error together with everything the tiers resolved.
    pub async fn batch_get<F, Fut>(&self, keys: &[String], ttl: Duration, compute: F) -> Result<HashMap<String, V>, BatchError<V>>
    where
        F: FnOnce(Vec<String>) -> Fut,
        Fut: Future<Output = Computed<V>>,
    {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let mut found = HashMap::with_capacity(keys.len());
        let mut remaining = keys.to_vec();

        for (index, tier) in self.tiers.iter().enumerate() {
            if remaining.is_empty() {
                break;
            }

            let hits = match tier.batch_get(&remaining).await {
                Ok(hits) => hits,
                Err(error) => {
                    CacheEvent::new(self.name, CacheOperation::BatchGet, CacheActivity::TierSkipped)
                        .tier(index)
                        .keys(remaining.len())
                        .emit_error(&error);
                    continue;
                }
            };
            if hits.is_empty() {
                continue;
            }

            CacheEvent::new(self.name, CacheOperation::BatchGet, CacheActivity::Hit)
                .tier(index)
                .keys(hits.len())
                .emit();
            remaining.retain(|key| !hits.contains_key(key));
            self.write_best_effort(&self.tiers[..index], &hits, ttl, CacheActivity::BackfillFailed)
                .await;
            found.extend(hits);
        }

        if remaining.is_empty() {
            return Ok(found);
        }

        CacheEvent::new(self.name, CacheOperation::BatchGet, CacheActivity::Miss)
            .keys(remaining.len())
            .emit();

        let computed = match &self.coalescer {
            Some(coalescer) => {
                let mut key_set = remaining.clone();
                key_set.sort_unstable();
                coalescer
                    .execute(&key_set[..], || self.compute_and_store(remaining, ttl, compute))
                    .await
                    .unwrap_or_else(|panicked| Err(Error::panicked(panicked)))
            }
            None => self.compute_and_store(remaining, ttl, compute).await,
        };

        match computed {
            Ok(values) => {
                found.extend(values);
                Ok(found)
            }
            Err(error) => Err(BatchError::new(found, error)),
        }
    }

    /// Stores every item in every tier, top to bottom.
    ///
    /// An empty `items` is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the first tier error. Tiers written before the failure keep the items.
    pub async fn batch_set(&self, items: &HashMap<String, V>, ttl: Duration) -> Result<(), Error> {
        if items.is_empty() {
            return Ok(());
        }
        for tier in &self.tiers {
            tier.batch_set(items, ttl).await?;
        }
        Ok(())
    }

    async fn compute_and_store<F, Fut>(&self, keys: Vec<String>, ttl: Duration, compute: F) -> Computed<V>
    where
        F: FnOnce(Vec<String>) -> Fut,
        Fut: Future<Output = Computed<V>>,
    {
        CacheEvent::new(self.name, CacheOperation::BatchGet, CacheActivity::Compute)
            .keys(keys.len())
            .emit();
        let values = compute(keys).await?;
        if !values.is_empty() {
            self.write_best_effort(&self.tiers, &values, ttl, CacheActivity::WriteFailed).await;
        }
        Ok(values)
    }

    async fn write_best_effort(&self, tiers: &[DynamicTier<V>], items: &HashMap<String, V>, ttl: Duration, on_failure: CacheActivity) {
        for (index, tier) in tiers.iter().enumerate() {
            if let Err(error) = tier.batch_set(items, ttl).await {
                CacheEvent::new(self.name, CacheOperation::BatchGet, on_failure)
                    .tier(index)
                    .keys(items.len())
                    .emit_error(&error);
            }
        }
    }
}

/// A failed batch compute, together with the values the tiers resolved before it.
///
/// # Examples
///
/// ```
/// use std::{collections::HashMap, time::Duration};
///
/// use strata::{BatchTieredCache, Error, MemoryTier};
/// # futures::executor::block_on(async {
///
/// let cache = BatchTieredCache::<i32>::builder().tier(MemoryTier::new()).build();
/// cache.batch_set(&HashMap::from([("a".to_string(), 1)]), Duration::ZERO).await?;
///
/// let keys = vec!["a".to_string(), "b".to_string()];
/// let err = cache
///     .batch_get(&keys, Duration::ZERO, |_| async { Err(Error::compute("origin offline")) })
///     .await
///     .unwrap_err();
///
/// assert_eq!(err.partial(), &HashMap::from([("a".to_string(), 1)]));
/// assert_eq!(err.error().kind(), strata::ErrorKind::Compute);
/// # Ok::<(), Error>(())
/// # });
/// ```
#[derive(Clone)]
pub struct BatchError<V> {
    partial: HashMap<String, V>,
    error: Error,
}

impl<V> BatchError<V> {
    pub(crate) const fn new(partial: HashMap<String, V>, error: Error) -> Self {
        Self { partial, error }
    }

    /// Returns the values resolved from tiers before the compute failed.
    #[must_use]
    pub const fn partial(&self) -> &HashMap<String, V> {
        &self.partial
    }

    /// Returns the compute error.
    #[must_use]
    pub const fn error(&self) -> &Error {
        &self.error
    }

    /// Splits into the resolved values and the compute error.
    #[must_use]
    pub fn into_parts(self) -> (HashMap<String, V>, Error) {
        (self.partial, self.error)
    }
}

impl<V> fmt::Debug for BatchError<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchError")
            .field("resolved", &self.partial.len())
            .field("error", &self.error)
            .finish()
    }
}

impl<V> fmt::Display for BatchError<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "batch compute failed with {} keys already resolved", self.partial.len())
    }
}

impl<V> std::error::Error for BatchError<V> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl<V> From<BatchError<V>> for Error {
    fn from(error: BatchError<V>) -> Self {
        error.error
    }
}
