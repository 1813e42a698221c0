// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Mock cache tier for testing.
//!
//! This module provides `MockTier`, a configurable in-memory tier that records all
//! operations and supports failure injection for testing error paths.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use parking_lot::Mutex;

use crate::{CacheTier, Error};

/// Recorded tier operation with full context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TierOp<V> {
    /// A get operation was performed with the given key.
    Get(String),
    /// A set operation was performed.
    Set {
        /// The key that was written.
        key: String,
        /// The value that was written.
        value: V,
        /// The expiry that was requested.
        ttl: Duration,
    },
    /// A delete operation was performed with the given key.
    Delete(String),
    /// A batch get operation was performed with the given keys.
    BatchGet(Vec<String>),
    /// A batch set operation was performed.
    BatchSet {
        /// The items that were written.
        items: HashMap<String, V>,
        /// The expiry that was requested.
        ttl: Duration,
    },
}

type FailPredicate<V> = Box<dyn Fn(&TierOp<V>) -> bool + Send + Sync>;

/// A configurable mock cache tier for testing.
///
/// This tier stores values in memory and can be configured to fail operations on
/// demand, making it useful for testing error handling paths. All operations are
/// recorded for later verification. Clones share storage, the operation log and the
/// failure predicate.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use strata_tier::{CacheTier, testing::{MockTier, TierOp}};
///
/// # futures::executor::block_on(async {
/// let tier = MockTier::<i32>::new();
///
/// tier.set("key", 42, Duration::from_secs(60)).await.unwrap();
/// assert_eq!(tier.get("key").await.unwrap(), Some(42));
///
/// assert_eq!(tier.operations(), vec![
///     TierOp::Set { key: "key".to_string(), value: 42, ttl: Duration::from_secs(60) },
///     TierOp::Get("key".to_string()),
/// ]);
/// # });
/// ```
///
/// # Failure Injection
///
/// ```
/// use strata_tier::{CacheTier, testing::{MockTier, TierOp}};
///
/// # futures::executor::block_on(async {
/// let tier = MockTier::<i32>::new();
///
/// // Fail only specific keys
/// tier.fail_when(|op| matches!(op, TierOp::Get(k) if k == "forbidden"));
/// assert!(tier.get("forbidden").await.is_err());
/// assert!(tier.get("allowed").await.is_ok());
/// # });
/// ```
pub struct MockTier<V> {
    data: Arc<Mutex<HashMap<String, (V, Duration)>>>,
    operations: Arc<Mutex<Vec<TierOp<V>>>>,
    fail_when: Arc<Mutex<Option<FailPredicate<V>>>>,
    misses_as_errors: Arc<AtomicBool>,
}

impl<V> std::fmt::Debug for MockTier<V>
where
    V: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTier")
            .field("data", &self.data)
            .field("operations", &self.operations)
            .field("fail_when", &self.fail_when.lock().is_some())
            .finish_non_exhaustive()
    }
}

impl<V> Clone for MockTier<V> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            operations: Arc::clone(&self.operations),
            fail_when: Arc::clone(&self.fail_when),
            misses_as_errors: Arc::clone(&self.misses_as_errors),
        }
    }
}

impl<V> Default for MockTier<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> MockTier<V> {
    /// Creates a new empty mock tier.
    #[must_use]
    pub fn new() -> Self {
        Self::with_data(HashMap::new())
    }

    /// Creates a mock tier with pre-populated values, all stored without expiry.
    #[must_use]
    pub fn with_values<I, K>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
    {
        Self::with_data(values.into_iter().map(|(k, v)| (k.into(), (v, Duration::ZERO))).collect())
    }

    fn with_data(data: HashMap<String, (V, Duration)>) -> Self {
        Self {
            data: Arc::new(Mutex::new(data)),
            operations: Arc::new(Mutex::new(Vec::new())),
            fail_when: Arc::new(Mutex::new(None)),
            misses_as_errors: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns the number of entries in the tier.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.data.lock().len()
    }

    /// Returns true if the tier contains the given key.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.lock().contains_key(key)
    }

    /// Returns the expiry the given key was last written with.
    #[must_use]
    pub fn ttl_of(&self, key: &str) -> Option<Duration> {
        self.data.lock().get(key).map(|(_, ttl)| *ttl)
    }

    /// Reports misses as [`Error::miss`] instead of `Ok(None)` / `Ok(false)`.
    ///
    /// Both forms are valid ways for a tier to signal an absent key.
    pub fn report_misses_as_errors(&self) {
        self.misses_as_errors.store(true, Ordering::Relaxed);
    }

    /// Sets a predicate that determines when operations should fail.
    ///
    /// The predicate receives the operation and returns `true` if it should fail.
    /// Failed operations are still recorded but leave the stored data untouched.
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&TierOp<V>) -> bool + Send + Sync + 'static,
    {
        *self.fail_when.lock() = Some(Box::new(predicate));
    }

    /// Clears the failure predicate, allowing all operations to succeed.
    pub fn clear_failures(&self) {
        *self.fail_when.lock() = None;
    }

    /// Clears all recorded operations.
    pub fn clear_operations(&self) {
        self.operations.lock().clear();
    }

    fn should_fail(&self, op: &TierOp<V>) -> bool {
        self.fail_when.lock().as_ref().is_some_and(|predicate| predicate(op))
    }
}

impl<V> MockTier<V>
where
    V: Clone,
{
    /// Returns the value stored under the given key.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<V> {
        self.data.lock().get(key).map(|(value, _)| value.clone())
    }

    /// Returns a clone of all recorded operations.
    #[must_use]
    pub fn operations(&self) -> Vec<TierOp<V>> {
        self.operations.lock().clone()
    }

    /// Records `op`, returning an error if the failure predicate matches it.
    fn record(&self, op: TierOp<V>, failure: &'static str) -> Result<(), Error> {
        let fail = self.should_fail(&op);
        self.operations.lock().push(op);
        if fail { Err(Error::backend(failure)) } else { Ok(()) }
    }
}

impl<V> CacheTier<V> for MockTier<V>
where
    V: Clone + Send + Sync,
{
    async fn get(&self, key: &str) -> Result<Option<V>, Error> {
        self.record(TierOp::Get(key.to_owned()), "mock: get failed")?;
        match self.value(key) {
            None if self.misses_as_errors.load(Ordering::Relaxed) => Err(Error::miss()),
            found => Ok(found),
        }
    }

    async fn set(&self, key: &str, value: V, ttl: Duration) -> Result<(), Error> {
        let op = TierOp::Set {
            key: key.to_owned(),
            value: value.clone(),
            ttl,
        };
        self.record(op, "mock: set failed")?;
        self.data.lock().insert(key.to_owned(), (value, ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, Error> {
        self.record(TierOp::Delete(key.to_owned()), "mock: delete failed")?;
        let removed = self.data.lock().remove(key).is_some();
        if !removed && self.misses_as_errors.load(Ordering::Relaxed) {
            return Err(Error::miss());
        }
        Ok(removed)
    }

    async fn batch_get(&self, keys: &[String]) -> Result<HashMap<String, V>, Error> {
        self.record(TierOp::BatchGet(keys.to_vec()), "mock: batch_get failed")?;
        let data = self.data.lock();
        Ok(keys
            .iter()
            .filter_map(|key| data.get(key).map(|(value, _)| (key.clone(), value.clone())))
            .collect())
    }

    async fn batch_set(&self, items: &HashMap<String, V>, ttl: Duration) -> Result<(), Error> {
        let op = TierOp::BatchSet { items: items.clone(), ttl };
        self.record(op, "mock: batch_set failed")?;
        let mut data = self.data.lock();
        for (key, value) in items {
            data.insert(key.clone(), (value.clone(), ttl));
        }
        Ok(())
    }

    fn len(&self) -> Option<u64> {
        Some(self.data.lock().len() as u64)
    }
}
