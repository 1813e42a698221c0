// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Dynamic cache tier wrapper for type erasure.

use std::{collections::HashMap, fmt::Debug, sync::Arc, time::Duration};

use futures::future::BoxFuture;

use crate::{CacheTier, Error};

/// Object-safe mirror of [`CacheTier`] with boxed futures.
trait ErasedTier<V>: Send + Sync {
    fn erased_get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<V>, Error>>;

    fn erased_set<'a>(&'a self, key: &'a str, value: V, ttl: Duration) -> BoxFuture<'a, Result<(), Error>>;

    fn erased_delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool, Error>>;

    fn erased_batch_get<'a>(&'a self, keys: &'a [String]) -> BoxFuture<'a, Result<HashMap<String, V>, Error>>;

    fn erased_batch_set<'a>(&'a self, items: &'a HashMap<String, V>, ttl: Duration) -> BoxFuture<'a, Result<(), Error>>;

    fn erased_len(&self) -> Option<u64>;
}

impl<V, T> ErasedTier<V> for T
where
    T: CacheTier<V>,
    V: Clone + Send + Sync + 'static,
{
    fn erased_get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<V>, Error>> {
        Box::pin(<T as CacheTier<V>>::get(self, key))
    }

    fn erased_set<'a>(&'a self, key: &'a str, value: V, ttl: Duration) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(<T as CacheTier<V>>::set(self, key, value, ttl))
    }

    fn erased_delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool, Error>> {
        Box::pin(<T as CacheTier<V>>::delete(self, key))
    }

    fn erased_batch_get<'a>(&'a self, keys: &'a [String]) -> BoxFuture<'a, Result<HashMap<String, V>, Error>> {
        Box::pin(<T as CacheTier<V>>::batch_get(self, keys))
    }

    fn erased_batch_set<'a>(&'a self, items: &'a HashMap<String, V>, ttl: Duration) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(<T as CacheTier<V>>::batch_set(self, items, ttl))
    }

    fn erased_len(&self) -> Option<u64> {
        <T as CacheTier<V>>::len(self)
    }
}

/// Extension trait for converting any `CacheTier` into a `DynamicTier`.
///
/// This trait is automatically implemented for all types that implement `CacheTier`.
///
/// # Examples
///
/// ```
/// use strata_tier::{CacheTier, DynamicTier, DynamicTierExt};
///
/// fn erase<T>(tier: T) -> DynamicTier<i32>
/// where
///     T: CacheTier<i32> + 'static,
/// {
///     tier.into_dynamic()
/// }
/// ```
pub trait DynamicTierExt<V>: Sized {
    /// Converts this cache tier into a `DynamicTier`.
    fn into_dynamic(self) -> DynamicTier<V>;
}

impl<V, T> DynamicTierExt<V> for T
where
    T: CacheTier<V> + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn into_dynamic(self) -> DynamicTier<V> {
        DynamicTier::new(self)
    }
}

/// A clonable cache tier with type erasure.
///
/// `DynamicTier` wraps a trait object in an `Arc` to enable cloning while keeping
/// dynamic dispatch. Tier chains hold `DynamicTier`s so that an in-process tier and a
/// networked tier can sit side by side.
///
/// Cloning shares the underlying tier; it does not copy its contents.
pub struct DynamicTier<V>(Arc<dyn ErasedTier<V>>);

impl<V> DynamicTier<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a new dynamic tier from any `CacheTier` implementation.
    pub fn new<T>(tier: T) -> Self
    where
        T: CacheTier<V> + 'static,
    {
        Self(Arc::new(tier))
    }
}

impl<V> Debug for DynamicTier<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicTier").finish_non_exhaustive()
    }
}

impl<V> Clone for DynamicTier<V> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<V> CacheTier<V> for DynamicTier<V>
where
    V: Clone + Send + Sync,
{
    async fn get(&self, key: &str) -> Result<Option<V>, Error> {
        self.0.erased_get(key).await
    }

    async fn set(&self, key: &str, value: V, ttl: Duration) -> Result<(), Error> {
        self.0.erased_set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<bool, Error> {
        self.0.erased_delete(key).await
    }

    async fn batch_get(&self, keys: &[String]) -> Result<HashMap<String, V>, Error> {
        self.0.erased_batch_get(keys).await
    }

    async fn batch_set(&self, items: &HashMap<String, V>, ttl: Duration) -> Result<(), Error> {
        self.0.erased_batch_set(items, ttl).await
    }

    fn len(&self) -> Option<u64> {
        self.0.erased_len()
    }
}
