//! Reconciliation of cache probes against the store of record.
//!
//! Given the requested window and a probe, decide whether the cache alone
//! answers the request or which contiguous range has to be read from the
//! store of record. The gap always spans from the lowest to the highest
//! missing rank, so hits interleaved with misses are read again; one store
//! round trip is traded for a slightly larger read.

use catalog_core::{splice, Item, Window};

use crate::cache::ProbeResult;

/// A store-of-record read required to complete a window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GapPlan {
    /// Cache hits in ascending rank order.
    pub hits: Vec<Item>,
    /// Ranks absent from the cache, ascending.
    pub misses: Vec<i64>,
    /// Contiguous range covering every miss.
    pub gap: Window,
    /// Offset into `hits` where the fetched rows are spliced. May be
    /// negative; [`merge`] clamps it.
    pub merge_index: i64,
}

impl GapPlan {
    /// Splice rows fetched for [`GapPlan::gap`] into the cache hits.
    pub fn merge(self, fetched: Vec<Item>) -> Vec<Item> {
        merge(self.hits, fetched, self.merge_index)
    }
}

/// Result of reconciling a probe with its window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// Every rank was cached; no store access is needed.
    Complete(Vec<Item>),
    /// Part of the window must be read from the store of record.
    Gap(GapPlan),
}

/// Reconcile `probe` against the requested `window`.
pub fn reconcile(window: Window, probe: ProbeResult) -> Reconciliation {
    let Some(gap) = gap_window(&probe.misses) else {
        return Reconciliation::Complete(probe.hits);
    };

    Reconciliation::Gap(GapPlan {
        hits: probe.hits,
        misses: probe.misses,
        merge_index: window.offset - gap.offset,
        gap,
    })
}

/// Smallest window covering every rank in `misses`.
///
/// `misses` must be ascending, as produced by a probe. Returns None when
/// there is nothing to fetch.
pub fn gap_window(misses: &[i64]) -> Option<Window> {
    let (first, last) = (misses.first()?, misses.last()?);
    let offset = first - 1;
    Some(Window::new(last - offset, offset))
}

/// Splice `fetched` into `hits` at `merge_index`, clamped to the bounds of
/// `hits`. Empty `hits` yields `fetched`.
pub fn merge(hits: Vec<Item>, fetched: Vec<Item>, merge_index: i64) -> Vec<Item> {
    splice(hits, fetched, merge_index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::NullableText;
    use chrono::Utc;
    use proptest::prelude::*;

    fn item(id: i32) -> Item {
        Item {
            id,
            project_id: 1,
            name: format!("item-{id}"),
            description: NullableText::null(),
            priority: id,
            removed: false,
            created_at: Utc::now(),
        }
    }

    fn probe(window: Window, missing: &[i64]) -> ProbeResult {
        let mut result = ProbeResult::default();
        for rank in window.ranks() {
            if missing.contains(&rank) {
                result.misses.push(rank);
            } else {
                result.hits.push(item(rank as i32));
                result.hit_ranks.push(rank);
            }
        }
        result
    }

    #[test]
    fn test_no_misses_is_complete() {
        let window = Window::new(3, 0);
        let probe = probe(window, &[]);
        let hits = probe.hits.clone();
        assert_eq!(reconcile(window, probe), Reconciliation::Complete(hits));
    }

    #[test]
    fn test_sparse_misses_cover_range() {
        let window = Window::new(10, 0);
        let Reconciliation::Gap(plan) = reconcile(window, probe(window, &[3, 7])) else {
            panic!("expected a gap");
        };
        assert_eq!(plan.gap, Window::new(5, 2));
        assert_eq!(plan.merge_index, -2);
        assert_eq!(plan.misses, vec![3, 7]);
    }

    #[test]
    fn test_interior_gap() {
        // ranks 6..=10, cache holds 6 and 10
        let window = Window::new(5, 5);
        let Reconciliation::Gap(plan) = reconcile(window, probe(window, &[7, 8, 9])) else {
            panic!("expected a gap");
        };
        assert_eq!(plan.gap, Window::new(3, 6));
        assert_eq!(plan.gap.ranks().collect::<Vec<_>>(), vec![7, 8, 9]);
        assert_eq!(plan.merge_index, -1);
    }

    #[test]
    fn test_total_miss_fetches_whole_window() {
        let window = Window::new(4, 2);
        let Reconciliation::Gap(plan) = reconcile(window, ProbeResult::all_missed(window)) else {
            panic!("expected a gap");
        };
        assert_eq!(plan.gap, window);
        assert_eq!(plan.merge_index, 0);

        let fetched: Vec<_> = (3..=6).map(item).collect();
        assert_eq!(plan.merge(fetched.clone()), fetched);
    }

    #[test]
    fn test_negative_merge_index_clamps_to_front() {
        let merged = merge(vec![item(8), item(9)], vec![item(3), item(4)], -2);
        let ids: Vec<_> = merged.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![3, 4, 8, 9]);
    }

    #[test]
    fn test_merge_into_empty_hits() {
        let fetched = vec![item(1), item(2)];
        assert_eq!(merge(Vec::new(), fetched.clone(), 5), fetched);
    }

    fn window_and_misses() -> impl Strategy<Value = (Window, Vec<i64>)> {
        (1i64..20, 0i64..50).prop_flat_map(|(limit, offset)| {
            let window = Window::new(limit, offset);
            let ranks: Vec<i64> = window.ranks().collect();
            (Just(window), proptest::sample::subsequence(ranks.clone(), 0..=ranks.len()))
        })
    }

    proptest! {
        #[test]
        fn prop_gap_covers_all_misses((window, misses) in window_and_misses()) {
            match reconcile(window, probe(window, &misses)) {
                Reconciliation::Complete(items) => {
                    prop_assert!(misses.is_empty());
                    prop_assert_eq!(items.len() as i64, window.limit);
                }
                Reconciliation::Gap(plan) => {
                    prop_assert!(!misses.is_empty());
                    prop_assert!(misses.iter().all(|rank| plan.gap.contains(*rank)));
                    prop_assert_eq!(plan.gap.first_rank(), misses[0]);
                    prop_assert_eq!(plan.gap.last_rank(), *misses.last().unwrap());
                    prop_assert!(plan.gap.first_rank() >= window.first_rank());
                    prop_assert!(plan.gap.last_rank() <= window.last_rank());
                    prop_assert_eq!(plan.merge_index, window.offset - plan.gap.offset);
                }
            }
        }
    }
}
