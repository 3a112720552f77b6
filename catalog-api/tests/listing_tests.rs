//! Listing behaviour across the position cache and the store of record.

mod support;

use std::sync::Arc;

use catalog_core::{CatalogResult, NullableText, Window};
use catalog_storage::{CacheKey, KeyValueStore};
use catalog_test_utils::{fixtures, generators, FailingKeyValueStore};
use proptest::prelude::*;
use support::Harness;

fn ids(items: &[catalog_core::Item]) -> Vec<i32> {
    items.iter().map(|item| item.id).collect()
}

#[tokio::test]
async fn test_fully_cached_window_never_reads_store() -> CatalogResult<()> {
    let harness = Harness::new(fixtures::seeded_store(1, 20));

    let cold = harness.service.list(Window::new(5, 0)).await?;
    assert_eq!(harness.store.window_reads(), 1);

    let warm = harness.service.list(Window::new(5, 0)).await?;
    assert_eq!(harness.store.window_reads(), 1);
    assert_eq!(ids(&warm.items), ids(&cold.items));
    assert_eq!((warm.meta.total, warm.meta.removed), (0, 0));
    assert_eq!((warm.meta.limit, warm.meta.offset), (5, 0));
    Ok(())
}

#[tokio::test]
async fn test_write_back_uses_one_based_ranks() -> CatalogResult<()> {
    let harness = Harness::new(fixtures::seeded_store(4, 10));

    harness.service.list(Window::new(3, 5)).await?;

    for (rank, id) in [(6, 6), (7, 7), (8, 8)] {
        let key = CacheKey::at_rank(id, 4, rank).to_string();
        assert!(harness.kv.get(&key).await?.is_some(), "missing {key}");
    }
    assert!(harness.kv.find_first(&CacheKey::rank_pattern(5)).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_interior_hits_are_refetched_with_the_gap() -> CatalogResult<()> {
    let harness = Harness::new(fixtures::seeded_store(1, 10));
    harness.service.list(Window::new(1, 3)).await?;

    // ranks 1..=3 and 5..=6 miss, rank 4 hits; one read covers 1..=6
    let page = harness.service.list(Window::new(6, 0)).await?;
    assert_eq!(harness.store.window_reads(), 2);
    assert_eq!((page.meta.limit, page.meta.offset), (6, 0));
    assert_eq!(page.meta.total, 10);
    // the cached copy of rank 4 stays behind the spliced block
    assert_eq!(page.items.len(), 7);
    assert_eq!(ids(&page.items[..6]), vec![1, 2, 3, 4, 5, 6]);
    Ok(())
}

#[tokio::test]
async fn test_unavailable_cache_degrades_to_store_read() -> CatalogResult<()> {
    let harness = Harness::with_kv(fixtures::seeded_store(1, 8), Arc::new(FailingKeyValueStore));

    let page = harness.service.list(Window::new(4, 2)).await?;
    assert_eq!(ids(&page.items), vec![3, 4, 5, 6]);
    assert_eq!(page.meta.total, 8);

    // mutations still succeed when the cache cannot be refreshed
    let updated = harness
        .service
        .update(3, 1, "still saved", NullableText::null())
        .await?;
    assert_eq!(updated.name, "still saved");
    Ok(())
}

#[tokio::test]
async fn test_removed_items_are_counted() -> CatalogResult<()> {
    let harness = Harness::new(fixtures::seeded_store(1, 5));
    harness.service.remove(2, 1).await?;
    harness.service.remove(4, 1).await?;

    let page = harness.service.list(Window::new(5, 0)).await?;
    assert_eq!((page.meta.total, page.meta.removed), (5, 2));
    Ok(())
}

#[tokio::test]
async fn test_create_does_not_touch_cache() -> CatalogResult<()> {
    let harness = Harness::new(fixtures::seeded_store(1, 3));
    harness.service.list(Window::new(3, 0)).await?;

    let created = harness.service.create(1, "late").await?;
    let pattern = CacheKey::item_pattern(created.id, created.project_id);
    assert!(harness.kv.scan_match(&pattern).await?.is_empty());
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// After updating (id, project_id), every cached entry of that pair
    /// decodes to the updated value.
    #[test]
    fn prop_update_overwrites_every_cached_position(
        windows in prop::collection::vec(generators::arb_window(), 1..4),
        target in 1i32..=30,
        description in generators::arb_description(),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");

        runtime.block_on(async {
            let harness = Harness::new(fixtures::seeded_store(2, 30));
            for window in &windows {
                harness.service.list(*window).await.expect("listing");
            }

            harness
                .service
                .update(target, 2, "updated", description.clone())
                .await
                .expect("update");

            let keys = harness
                .kv
                .scan_match(&CacheKey::item_pattern(target, 2))
                .await
                .expect("scan");
            for key in keys {
                let raw = harness.kv.get(&key).await.expect("get").expect("present");
                let cached: catalog_core::Item = serde_json::from_str(&raw).expect("decodes");
                assert_eq!(cached.name, "updated");
                assert_eq!(cached.description, description);
            }
        });
    }
}
