// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Two-tier read-through cache.
//!
//! A small in-process tier sits above a larger one standing in for a shared cache. The first
//! lookup computes the value and writes it through to both tiers; evicting the top tier shows
//! the backfill from the tier below. Concurrent misses on one key share a single compute.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use strata::{CacheTier, Error, MemoryTier, TieredCache};
use tracing::Level;

const TTL: Duration = Duration::from_secs(300);

/// Stands in for a slow database lookup.
async fn load_profile(calls: &AtomicU32, user_id: String) -> Result<String, Error> {
    calls.fetch_add(1, Ordering::Relaxed);
    tokio::time::sleep(Duration::from_millis(50)).await;
    Ok(format!("profile of {user_id}"))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt().with_max_level(Level::DEBUG).init();

    let l1 = MemoryTier::with_capacity(100);
    let l2 = MemoryTier::new();
    let cache = Arc::new(
        TieredCache::builder()
            .name("profiles")
            .tier(l1.clone())
            .tier(l2)
            .build(),
    );
    let calls = Arc::new(AtomicU32::new(0));

    // Miss everywhere: computed once, then stored in both tiers.
    let profile = cache.get("user:1", TTL, |key| load_profile(&calls, key)).await?;
    println!("first lookup: {profile}");

    // Drop it from the top tier; the next lookup is served by l2 and refills l1.
    l1.delete("user:1").await?;
    let profile = cache.get("user:1", TTL, |key| load_profile(&calls, key)).await?;
    println!("after eviction: {profile}");

    // Ten concurrent lookups of a new key trigger a single compute.
    let mut handles = Vec::new();
    for _ in 0..10 {
        let cache = Arc::clone(&cache);
        let calls = Arc::clone(&calls);
        handles.push(tokio::spawn(async move {
            cache.get("user:2", TTL, |key| async move { load_profile(&calls, key).await }).await
        }));
    }
    for handle in handles {
        let _ = handle.await.expect("task panicked")?;
    }

    println!("origin calls: {}", calls.load(Ordering::Relaxed));
    Ok(())
}
