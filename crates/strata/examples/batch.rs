// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Batch read-through cache.
//!
//! Keys found in a tier are served from it, and only the remaining keys reach the origin in a
//! single batch call. A failing origin still hands back what the tiers resolved.

use std::{collections::HashMap, time::Duration};

use strata::{BatchTieredCache, Error, MemoryTier};
use tracing::Level;

const TTL: Duration = Duration::from_secs(60);

/// Stands in for a bulk price lookup.
async fn fetch_prices(skus: Vec<String>) -> Result<HashMap<String, u32>, Error> {
    println!("origin asked for {skus:?}");
    Ok(skus
        .into_iter()
        .map(|sku| {
            let price = u32::try_from(sku.len()).unwrap_or(u32::MAX) * 250;
            (sku, price)
        })
        .collect())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt().with_max_level(Level::DEBUG).init();

    let cache = BatchTieredCache::builder()
        .name("prices")
        .tier(MemoryTier::with_capacity(1_000))
        .tier(MemoryTier::new())
        .coalesce_misses(true)
        .build();

    cache.batch_set(&HashMap::from([("sku-1".to_string(), 999)]), TTL).await?;

    let skus: Vec<String> = ["sku-1", "sku-22", "sku-333"].into_iter().map(String::from).collect();
    let prices = cache.batch_get(&skus, TTL, fetch_prices).await?;
    println!("prices: {prices:?}");

    // Everything is cached now, so the origin is not consulted.
    let prices = cache.batch_get(&skus, TTL, fetch_prices).await?;
    println!("cached prices: {prices:?}");

    // An unavailable origin still returns what the tiers hold.
    let mut more = skus.clone();
    more.push("sku-4444".to_string());
    match cache
        .batch_get(&more, TTL, |_| async { Err(Error::compute("price service unavailable")) })
        .await
    {
        Ok(prices) => println!("prices: {prices:?}"),
        Err(err) => println!("partial prices: {:?} ({})", err.partial(), err.error()),
    }

    Ok(())
}
