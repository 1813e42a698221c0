// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for `TieredCache`.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use futures_util::{StreamExt, stream::FuturesUnordered};
use strata::{Error, ErrorKind, TieredCache};
use strata_tier::testing::{MockTier, TierOp};

const TTL: Duration = Duration::from_secs(60);

fn block_on<F: std::future::Future>(f: F) -> F::Output {
    futures::executor::block_on(f)
}

fn two_tiers() -> (MockTier<String>, MockTier<String>, TieredCache<String>) {
    let l1 = MockTier::new();
    let l2 = MockTier::new();
    let cache = TieredCache::builder().name("test").tier(l1.clone()).tier(l2.clone()).build();
    (l1, l2, cache)
}

async fn unreachable_compute(_: String) -> Result<String, Error> {
    panic!("compute must not run when a tier has the key")
}

#[test]
fn full_miss_computes_and_writes_through() {
    block_on(async {
        let (l1, l2, cache) = two_tiers();

        let value = cache
            .get("k", TTL, |key| async move { Ok(format!("computed-{key}")) })
            .await
            .expect("get failed");

        assert_eq!(value, "computed-k");
        for tier in [&l1, &l2] {
            assert_eq!(tier.value("k").as_deref(), Some("computed-k"));
            assert_eq!(tier.ttl_of("k"), Some(TTL));
        }
    });
}

#[test]
fn hit_in_top_tier_skips_lower_tiers() {
    block_on(async {
        let l1 = MockTier::with_values([("k", "top".to_string())]);
        let l2 = MockTier::with_values([("k", "bottom".to_string())]);
        let cache = TieredCache::builder().tier(l1.clone()).tier(l2.clone()).build();

        let value = cache.get("k", TTL, unreachable_compute).await.expect("get failed");

        assert_eq!(value, "top");
        assert_eq!(l1.operations(), vec![TierOp::Get("k".to_string())]);
        assert!(l2.operations().is_empty());
    });
}

#[test]
fn hit_in_lowest_tier_backfills_every_upper_tier() {
    block_on(async {
        let l1 = MockTier::new();
        let l2 = MockTier::new();
        let l3 = MockTier::with_values([("k", "deep".to_string())]);
        let cache = TieredCache::builder().tier(l1.clone()).tier(l2.clone()).tier(l3.clone()).build();

        let value = cache.get("k", TTL, unreachable_compute).await.expect("get failed");

        assert_eq!(value, "deep");
        assert_eq!(l1.value("k").as_deref(), Some("deep"));
        assert_eq!(l2.value("k").as_deref(), Some("deep"));
        assert_eq!(l1.ttl_of("k"), Some(TTL));
        assert_eq!(l2.ttl_of("k"), Some(TTL));
        // The tier that had the value is not rewritten.
        assert_eq!(l3.operations(), vec![TierOp::Get("k".to_string())]);
    });
}

#[test]
fn failed_backfill_is_not_surfaced() {
    block_on(async {
        let l1 = MockTier::new();
        let l2 = MockTier::with_values([("k", "bottom".to_string())]);
        l1.fail_when(|op| matches!(op, TierOp::Set { .. }));
        let cache = TieredCache::builder().tier(l1.clone()).tier(l2).build();

        let value = cache.get("k", TTL, unreachable_compute).await.expect("get failed");

        assert_eq!(value, "bottom");
        assert!(!l1.contains_key("k"));
    });
}

#[test]
fn written_through_value_is_served_without_compute() {
    block_on(async {
        let (_, _, cache) = two_tiers();

        cache
            .get("k", TTL, |_| async { Ok("first".to_string()) })
            .await
            .expect("get failed");
        let again = cache
            .get("k", TTL, |_| async { Err(Error::compute("origin down")) })
            .await
            .expect("second get should be served from a tier");

        assert_eq!(again, "first");
    });
}

#[test]
fn tier_failure_short_circuits() {
    block_on(async {
        let (l1, l2, cache) = two_tiers();
        l1.fail_when(|op| matches!(op, TierOp::Get(_)));
        let calls = AtomicUsize::new(0);

        let err = cache
            .get("k", TTL, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok("never".to_string()) }
            })
            .await
            .expect_err("tier failure must abort the get");

        assert_eq!(err.kind(), ErrorKind::Backend);
        assert!(err.to_string().contains("mock: get failed"), "{err}");
        assert!(l2.operations().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    });
}

#[test]
fn miss_errors_count_as_misses() {
    block_on(async {
        let (l1, _, cache) = two_tiers();
        l1.report_misses_as_errors();

        let value = cache.get("k", TTL, |_| async { Ok("v".to_string()) }).await.expect("get failed");

        assert_eq!(value, "v");
        assert!(l1.contains_key("k"));
    });
}

#[test]
fn write_through_failure_is_surfaced() {
    block_on(async {
        let (l1, l2, cache) = two_tiers();
        l2.fail_when(|op| matches!(op, TierOp::Set { .. }));

        let err = cache
            .get("k", TTL, |_| async { Ok("v".to_string()) })
            .await
            .expect_err("write-through failure must be returned");

        assert_eq!(err.kind(), ErrorKind::Backend);
        assert_eq!(l1.value("k").as_deref(), Some("v"));
        assert!(!l2.contains_key("k"));
    });
}

#[test]
fn compute_error_is_returned_and_nothing_is_stored() {
    block_on(async {
        let (l1, l2, cache) = two_tiers();

        let err = cache
            .get("k", TTL, |_| async { Err(Error::compute("origin down")) })
            .await
            .expect_err("compute failed");

        assert_eq!(err.kind(), ErrorKind::Compute);
        assert!(err.to_string().contains("origin down"), "{err}");
        assert_eq!(l1.entry_count(), 0);
        assert_eq!(l2.entry_count(), 0);
    });
}

#[test]
fn compute_may_report_origin_miss() {
    block_on(async {
        let (_, _, cache) = two_tiers();

        let err = cache
            .get("k", TTL, |_| async { Err(Error::miss()) })
            .await
            .expect_err("origin has no value");

        assert!(err.is_miss());
    });
}

#[tokio::test]
async fn concurrent_misses_share_one_compute() {
    let (l1, _, cache) = two_tiers();
    let calls = AtomicUsize::new(0);

    let results: Vec<_> = (0..10)
        .map(|_| {
            cache.get("k", TTL, |key| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok(format!("computed-{key}"))
                }
            })
        })
        .collect::<FuturesUnordered<_>>()
        .collect()
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(results.len(), 10);
    for result in results {
        assert_eq!(result.expect("get failed"), "computed-k");
    }
    // Only the leader wrote through.
    let sets = l1.operations().into_iter().filter(|op| matches!(op, TierOp::Set { .. })).count();
    assert_eq!(sets, 1);
    assert_eq!(cache.in_flight(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn misses_from_parallel_tasks_share_one_compute() {
    let (l1, _, cache) = two_tiers();
    let cache = Arc::new(cache);

    for round in 0..20 {
        let key = format!("k{round}");
        let calls = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..64)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                let key = key.clone();
                tokio::spawn(async move {
                    cache
                        .get(&key, TTL, move |key| {
                            calls.fetch_add(1, Ordering::SeqCst);
                            async move {
                                tokio::time::sleep(Duration::from_millis(20)).await;
                                Ok(format!("computed-{key}"))
                            }
                        })
                        .await
                })
            })
            .collect();

        for task in tasks {
            let value = task.await.expect("task panicked").expect("get failed");
            assert_eq!(value, format!("computed-{key}"));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1, "round {round}");
        assert_eq!(cache.in_flight(), 0);
        assert_eq!(l1.value(&key), Some(format!("computed-{key}")));
    }
}

#[tokio::test]
async fn concurrent_misses_share_one_error() {
    let (_, _, cache) = two_tiers();
    let calls = AtomicUsize::new(0);

    let results: Vec<_> = (0..5)
        .map(|_| {
            cache.get("k", TTL, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Err(Error::compute("origin down"))
                }
            })
        })
        .collect::<FuturesUnordered<_>>()
        .collect()
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    for result in results {
        assert_eq!(result.expect_err("compute failed").kind(), ErrorKind::Compute);
    }
    assert_eq!(cache.in_flight(), 0);
}

#[tokio::test]
async fn distinct_keys_compute_independently() {
    let (_, _, cache) = two_tiers();
    let calls = AtomicUsize::new(0);

    let results: Vec<_> = ["a", "b", "c"]
        .into_iter()
        .map(|key| {
            cache.get(key, TTL, |key| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Ok(key)
                }
            })
        })
        .collect::<FuturesUnordered<_>>()
        .collect()
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(results.iter().all(Result::is_ok));
}

#[tokio::test]
async fn without_stampede_protection_every_miss_computes() {
    let tier = MockTier::<String>::new();
    let cache = TieredCache::builder().tier(tier).stampede_protection(false).build();
    let calls = AtomicUsize::new(0);

    let results: Vec<_> = (0..4)
        .map(|_| {
            cache.get("k", TTL, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok("v".to_string())
                }
            })
        })
        .collect::<FuturesUnordered<_>>()
        .collect()
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert!(results.iter().all(Result::is_ok));
    assert_eq!(cache.in_flight(), 0);
}

#[test]
fn panicking_compute_becomes_panicked_error() {
    block_on(async {
        let (l1, _, cache) = two_tiers();

        let err = cache
            .get("k", TTL, |_| async { panic!("origin exploded") })
            .await
            .expect_err("compute panicked");

        assert_eq!(err.kind(), ErrorKind::Panicked);
        assert!(err.to_string().contains("origin exploded"), "{err}");
        assert_eq!(cache.in_flight(), 0);
        assert!(!l1.contains_key("k"));

        // The key is usable again afterwards.
        let value = cache.get("k", TTL, |_| async { Ok("v".to_string()) }).await.expect("get failed");
        assert_eq!(value, "v");
    });
}

#[tokio::test]
async fn cancelled_get_leaves_no_in_flight_record() {
    let (l1, _, cache) = two_tiers();

    let _elapsed = tokio::time::timeout(
        Duration::from_millis(20),
        cache.get("k", TTL, |_| async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok("late".to_string())
        }),
    )
    .await
    .expect_err("the get should have timed out");

    assert_eq!(cache.in_flight(), 0);
    assert!(!l1.contains_key("k"));

    let value = cache.get("k", TTL, |_| async { Ok("fresh".to_string()) }).await.expect("get failed");
    assert_eq!(value, "fresh");
}

#[test]
fn get_cached_reports_miss_without_computing() {
    block_on(async {
        let (_, _, cache) = two_tiers();

        let err = cache.get_cached("k", TTL).await.expect_err("nothing cached");
        assert!(err.is_miss());
        assert_eq!(err.kind(), ErrorKind::Miss);
    });
}

#[test]
fn get_cached_backfills() {
    block_on(async {
        let l1 = MockTier::new();
        let l2 = MockTier::with_values([("k", "bottom".to_string())]);
        let cache = TieredCache::builder().tier(l1.clone()).tier(l2).build();

        assert_eq!(cache.get_cached("k", TTL).await.expect("cached"), "bottom");
        assert_eq!(l1.value("k").as_deref(), Some("bottom"));
    });
}

#[test]
fn get_cached_surfaces_tier_failures() {
    block_on(async {
        let (l1, _, cache) = two_tiers();
        l1.fail_when(|op| matches!(op, TierOp::Get(_)));

        let err = cache.get_cached("k", TTL).await.expect_err("tier failed");
        assert_eq!(err.kind(), ErrorKind::Backend);
    });
}

#[test]
fn set_writes_every_tier_and_is_idempotent() {
    block_on(async {
        let (l1, l2, cache) = two_tiers();

        cache.set("k", "v".to_string(), TTL).await.expect("set failed");
        cache.set("k", "v".to_string(), TTL).await.expect("set failed");

        for tier in [&l1, &l2] {
            assert_eq!(tier.entry_count(), 1);
            assert_eq!(tier.value("k").as_deref(), Some("v"));
        }
    });
}

#[test]
fn set_stops_at_first_failure() {
    block_on(async {
        let (l1, l2, cache) = two_tiers();
        l1.fail_when(|op| matches!(op, TierOp::Set { .. }));

        let err = cache.set("k", "v".to_string(), TTL).await.expect_err("l1 failed");

        assert_eq!(err.kind(), ErrorKind::Backend);
        assert!(l2.operations().is_empty());
    });
}

#[test]
fn delete_continues_past_tiers_without_the_key() {
    block_on(async {
        let l1 = MockTier::<String>::new();
        let l2 = MockTier::with_values([("k", "v".to_string())]);
        let cache = TieredCache::builder().tier(l1.clone()).tier(l2.clone()).build();

        cache.delete("k").await.expect("delete failed");

        assert!(!l1.contains_key("k"));
        assert!(!l2.contains_key("k"));
        assert_eq!(l2.operations(), vec![TierOp::Delete("k".to_string())]);
    });
}

#[test]
fn delete_treats_miss_errors_as_absent() {
    block_on(async {
        let (l1, _, cache) = two_tiers();
        l1.report_misses_as_errors();

        cache.delete("k").await.expect("a miss is not a failure");
    });
}

#[test]
fn delete_aborts_on_failure() {
    block_on(async {
        let l1 = MockTier::with_values([("k", "v".to_string())]);
        let l2 = MockTier::with_values([("k", "v".to_string())]);
        l1.fail_when(|op| matches!(op, TierOp::Delete(_)));
        let cache = TieredCache::builder().tier(l1.clone()).tier(l2.clone()).build();

        let err = cache.delete("k").await.expect_err("l1 failed");

        assert_eq!(err.kind(), ErrorKind::Backend);
        assert!(l1.contains_key("k"));
        assert!(l2.contains_key("k"));
        assert!(l2.operations().is_empty());
    });
}

#[test]
fn cache_without_tiers_always_computes() {
    block_on(async {
        let cache = TieredCache::<u32>::builder().build();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .get("k", TTL, |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok(7) }
                })
                .await
                .expect("get failed");
            assert_eq!(value, 7);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        cache.set("k", 1, TTL).await.expect("set without tiers is a no-op");
        cache.delete("k").await.expect("delete without tiers is a no-op");
    });
}

#[test]
fn debug_shows_configuration() {
    let (_, _, cache) = two_tiers();
    let debug = format!("{cache:?}");

    assert!(debug.contains("\"test\""));
    assert!(debug.contains("tiers: 2"));
    assert!(debug.contains("stampede_protection: true"));
}
