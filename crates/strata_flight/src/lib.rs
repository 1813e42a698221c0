// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Collapses concurrent identical async computations into a single execution.
//!
//! This crate provides [`Merger`], a mechanism for deduplicating concurrent async operations.
//! When multiple tasks request the same work (identified by a key), only the first task (the
//! "leader") performs the actual work while subsequent tasks (the "followers") wait and receive
//! a clone of the result.
//!
//! # When to Use
//!
//! Use `Merger` in front of expensive or rate-limited operations that may be requested
//! concurrently with the same parameters, such as filling a cache entry from its origin after
//! every cache tier missed.
//!
//! # Example
//!
//! ```
//! use strata_flight::Merger;
//!
//! # async fn example() {
//! let merger: Merger<String, String> = Merger::new();
//!
//! // Multiple concurrent calls with the same key will share a single execution
//! let result = merger.execute("user:123", || async {
//!     "expensive_result".to_string()
//! }).await;
//!
//! assert_eq!(result.unwrap(), "expensive_result");
//! # }
//! ```
//!
//! # Cancellation and Panic Safety
//!
//! - If the leader is dropped before finishing, a waiting follower runs its own work instead.
//! - If the leader panics, the panic is caught and every caller that joined the same execution
//!   receives [`LeaderPanicked`].
//! - The record for a key is removed once its work completes, panics, or is abandoned by every
//!   caller, so later calls for the same key start a fresh execution.
//!
//! # Thread Safety
//!
//! [`Merger`] is `Send` and `Sync`, and can be shared across threads. Different keys never block
//! each other.

use std::{
    any::Any,
    borrow::Borrow,
    fmt,
    hash::{BuildHasher, Hash},
    panic::AssertUnwindSafe,
    sync::Arc,
};

use async_once_cell::OnceCell;
use dashmap::DashMap;
use futures_util::FutureExt;

type Call<T> = OnceCell<Result<T, LeaderPanicked>>;

/// Represents a class of work and creates a space in which units of work
/// can be executed with duplicate suppression.
pub struct Merger<K, T, S = ahash::RandomState> {
    calls: DashMap<K, Arc<Call<T>>, S>,
}

impl<K, T, S> fmt::Debug for Merger<K, T, S>
where
    K: Eq + Hash,
    S: BuildHasher + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Merger").field("in_flight", &self.calls.len()).finish()
    }
}

impl<K, T, S> Default for Merger<K, T, S>
where
    K: Eq + Hash,
    S: BuildHasher + Clone + Default,
{
    fn default() -> Self {
        Self {
            calls: DashMap::with_hasher(S::default()),
        }
    }
}

impl<K, T> Merger<K, T>
where
    K: Eq + Hash,
{
    /// Creates a new `Merger` with no work in flight.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<K, T, S> Merger<K, T, S>
where
    K: Eq + Hash,
    S: BuildHasher + Clone,
{
    /// Creates a new `Merger` that hashes keys with `hasher`.
    #[must_use]
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            calls: DashMap::with_hasher(hasher),
        }
    }

    /// Returns the number of keys that currently have work in flight.
    #[must_use]
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Returns `true` if no work is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Executes `func` for `key`, unless an execution for the same key is already in flight,
    /// in which case this call waits for that execution and returns a clone of its result.
    ///
    /// `func` is only invoked when this caller becomes the leader.
    ///
    /// # Errors
    ///
    /// Returns [`LeaderPanicked`] if the execution this call joined panicked.
    pub async fn execute<Q, F, Fut>(&self, key: &Q, func: F) -> Result<T, LeaderPanicked>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
        T: Clone,
    {
        // Declared before the record handle so that it is dropped after it, on every exit path.
        let mut membership = Membership {
            calls: &self.calls,
            key,
            joined: None,
        };
        let call = self.join(key);
        membership.joined = Some(Arc::as_ptr(&call).addr());

        let result = call
            .get_or_init(async {
                AssertUnwindSafe(async { func().await })
                    .catch_unwind()
                    .await
                    .map_err(LeaderPanicked::from_payload)
            })
            .await
            .clone();

        drop(call);
        drop(membership);
        result
    }

    /// Returns the in-flight record for `key`, inserting a fresh one if there is none.
    fn join<Q>(&self, key: &Q) -> Arc<Call<T>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        // The shard guard must be released before the caller awaits.
        if let Some(existing) = self.calls.get(key) {
            return Arc::clone(existing.value());
        }

        Arc::clone(self.calls.entry(key.to_owned()).or_insert_with(|| Arc::new(OnceCell::new())).value())
    }
}

/// Detaches a caller from its in-flight record on drop, whether the caller finished, panicked,
/// or was cancelled. Must be dropped after the caller's own handle to the record.
struct Membership<'a, K, Q, T, S>
where
    K: Eq + Hash + Borrow<Q>,
    Q: Hash + Eq + ?Sized,
    S: BuildHasher + Clone,
{
    calls: &'a DashMap<K, Arc<Call<T>>, S>,
    key: &'a Q,
    joined: Option<usize>,
}

impl<K, Q, T, S> Drop for Membership<'_, K, Q, T, S>
where
    K: Eq + Hash + Borrow<Q>,
    Q: Hash + Eq + ?Sized,
    S: BuildHasher + Clone,
{
    fn drop(&mut self) {
        let Some(joined) = self.joined else {
            return;
        };

        // A finished record is retired so the next caller starts a fresh execution. An unfinished
        // one survives while anyone else still holds it, since a follower takes over its work.
        let _ = self.calls.remove_if(self.key, |_, current| {
            Arc::as_ptr(current).addr() == joined && (current.get().is_some() || Arc::strong_count(current) == 1)
        });
    }
}

/// The execution a caller joined panicked before producing a value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeaderPanicked {
    message: Option<String>,
}

impl LeaderPanicked {
    fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned());
        Self { message }
    }

    /// Returns the panic message, if the panic payload was a string.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl fmt::Display for LeaderPanicked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "in-flight work panicked: {message}"),
            None => f.write_str("in-flight work panicked"),
        }
    }
}

impl std::error::Error for LeaderPanicked {}
