// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The core trait for cache storage backends.
//!
//! [`CacheTier`] defines the interface that all cache backends must implement.
//! The trait is designed for composition: implement the storage operations,
//! then let `strata` chain tiers together with backfill and stampede protection.

use std::{collections::HashMap, time::Duration};

use crate::Error;

/// Trait for cache tier implementations.
///
/// The three single-key methods are required: `get`, `set` and `delete`.
/// The batch methods have default implementations built on them:
/// - `batch_get`: Calls `get` per key, treating per-key failures as misses
/// - `batch_set`: Calls `set` per item, stopping at the first failure
///
/// A zero `ttl` means the entry does not expire.
pub trait CacheTier<V>: Send + Sync
where
    V: Clone + Send + Sync,
{
    /// Gets a value.
    ///
    /// Returns `Ok(None)` when the key is absent and `Err` when the backend failed.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<V>, Error>> + Send;

    /// Stores a value with an expiry, overwriting any existing value for the key.
    fn set(&self, key: &str, value: V, ttl: Duration) -> impl Future<Output = Result<(), Error>> + Send;

    /// Removes a value.
    ///
    /// Returns `Ok(true)` if the key was removed and `Ok(false)` if it was absent.
    fn delete(&self, key: &str) -> impl Future<Output = Result<bool, Error>> + Send;

    /// Gets several values at once.
    ///
    /// The returned map only contains the keys that were found. A failure affecting a single
    /// key is treated as a miss for that key; keys resolved before the failure are kept.
    fn batch_get(&self, keys: &[String]) -> impl Future<Output = Result<HashMap<String, V>, Error>> + Send {
        async move {
            let mut found = HashMap::with_capacity(keys.len());
            for key in keys {
                if let Ok(Some(value)) = self.get(key).await {
                    found.insert(key.clone(), value);
                }
            }
            Ok(found)
        }
    }

    /// Stores several values sharing one expiry.
    ///
    /// The first failure aborts the batch; items written before it are not rolled back.
    fn batch_set(&self, items: &HashMap<String, V>, ttl: Duration) -> impl Future<Output = Result<(), Error>> + Send {
        async move {
            for (key, value) in items {
                self.set(key, value.clone(), ttl).await?;
            }
            Ok(())
        }
    }

    /// Returns the number of entries, if supported.
    ///
    /// Returns `None` for implementations that don't track size.
    fn len(&self) -> Option<u64> {
        None
    }

    /// Returns `true` if the tier contains no entries.
    ///
    /// Returns `None` for implementations that don't track size.
    fn is_empty(&self) -> Option<bool> {
        self.len().map(|len| len == 0)
    }
}
