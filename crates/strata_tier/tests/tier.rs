// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for `CacheTier` trait default implementations.

use std::{collections::HashMap, sync::Mutex, time::Duration};

use strata_tier::{CacheTier, DynamicTierExt, Error};

/// Minimal implementation that only provides required methods
struct MinimalTier<V> {
    data: Mutex<HashMap<String, V>>,
    broken: Option<&'static str>,
}

impl<V> MinimalTier<V> {
    fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
            broken: None,
        }
    }

    /// Every operation on `key` fails with a backend error.
    fn broken_for(key: &'static str) -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
            broken: Some(key),
        }
    }

    fn check(&self, key: &str) -> Result<(), Error> {
        match self.broken {
            Some(broken) if broken == key => Err(Error::backend("tier unavailable")),
            _ => Ok(()),
        }
    }
}

impl<V> CacheTier<V> for MinimalTier<V>
where
    V: Clone + Send + Sync,
{
    async fn get(&self, key: &str) -> Result<Option<V>, Error> {
        self.check(key)?;
        Ok(self.data.lock().expect("lock poisoned").get(key).cloned())
    }

    async fn set(&self, key: &str, value: V, _ttl: Duration) -> Result<(), Error> {
        self.check(key)?;
        self.data.lock().expect("lock poisoned").insert(key.to_owned(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, Error> {
        self.check(key)?;
        Ok(self.data.lock().expect("lock poisoned").remove(key).is_some())
    }
}

fn keys(keys: &[&str]) -> Vec<String> {
    keys.iter().map(|k| (*k).to_string()).collect()
}

#[tokio::test]
async fn minimal_tier_get_miss() {
    let tier = MinimalTier::<i32>::new();
    let result = tier.get("key").await.expect("error on get");
    assert!(result.is_none());
}

#[tokio::test]
async fn minimal_tier_set_then_get() {
    let tier = MinimalTier::<i32>::new();
    tier.set("key", 42, Duration::from_secs(60)).await.expect("error on set");
    assert_eq!(tier.get("key").await.expect("error on get"), Some(42));
}

#[tokio::test]
async fn minimal_tier_delete_reports_presence() {
    let tier = MinimalTier::<i32>::new();
    tier.set("key", 1, Duration::ZERO).await.expect("error on set");

    assert!(tier.delete("key").await.expect("error on delete"));
    assert!(!tier.delete("key").await.expect("error on delete"));
}

#[tokio::test]
async fn default_batch_get_returns_only_found_keys() {
    let tier = MinimalTier::<i32>::new();
    tier.set("a", 1, Duration::ZERO).await.expect("error on set");
    tier.set("c", 3, Duration::ZERO).await.expect("error on set");

    let found = tier.batch_get(&keys(&["a", "b", "c"])).await.expect("error on batch_get");

    assert_eq!(found, HashMap::from([("a".to_string(), 1), ("c".to_string(), 3)]));
}

#[tokio::test]
async fn default_batch_get_treats_per_key_failures_as_misses() {
    let tier = MinimalTier::<i32>::broken_for("b");
    tier.set("a", 1, Duration::ZERO).await.expect("error on set");
    tier.set("c", 3, Duration::ZERO).await.expect("error on set");

    let found = tier.batch_get(&keys(&["a", "b", "c"])).await.expect("error on batch_get");

    assert_eq!(found.len(), 2);
    assert!(!found.contains_key("b"));
}

#[tokio::test]
async fn default_batch_get_of_no_keys_is_empty() {
    let tier = MinimalTier::<i32>::new();
    let found = tier.batch_get(&[]).await.expect("error on batch_get");
    assert!(found.is_empty());
}

#[tokio::test]
async fn default_batch_set_writes_every_item() {
    let tier = MinimalTier::<i32>::new();
    let items = HashMap::from([("a".to_string(), 1), ("b".to_string(), 2)]);

    tier.batch_set(&items, Duration::from_secs(5)).await.expect("error on batch_set");

    assert_eq!(tier.get("a").await.expect("error on get"), Some(1));
    assert_eq!(tier.get("b").await.expect("error on get"), Some(2));
}

#[tokio::test]
async fn default_batch_set_surfaces_failure() {
    let tier = MinimalTier::<i32>::broken_for("b");
    let items = HashMap::from([("b".to_string(), 2)]);

    let err = tier.batch_set(&items, Duration::ZERO).await.expect_err("batch_set should fail");
    assert!(!err.is_miss());
}

#[tokio::test]
async fn default_len_is_unknown() {
    let tier = MinimalTier::<i32>::new();
    assert_eq!(tier.len(), None);
    assert_eq!(tier.is_empty(), None);
}

#[tokio::test]
async fn custom_tier_erases_into_dynamic_tier() {
    let tier = MinimalTier::<String>::new().into_dynamic();
    let shared = tier.clone();

    tier.set("a", "one".to_string(), Duration::ZERO).await.expect("set failed");

    assert_eq!(shared.get("a").await.expect("get failed"), Some("one".to_string()));
    let found = shared.batch_get(&keys(&["a", "b"])).await.expect("batch_get failed");
    assert_eq!(found, HashMap::from([("a".to_string(), "one".to_string())]));
    assert!(shared.delete("a").await.expect("delete failed"));
}
