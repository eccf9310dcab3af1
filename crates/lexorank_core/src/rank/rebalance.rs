//! Evenly spaced replacement ranks for a whole list.

use super::arithmetic::RankArithmetic;
use super::{Rank, RankResult};

/// Lays fresh, evenly spaced ranks over items given in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebalanceEngine {
    arithmetic: RankArithmetic,
}

impl RebalanceEngine {
    pub fn new(arithmetic: RankArithmetic) -> Self {
        Self { arithmetic }
    }

    /// Pairs every item with a new rank, preserving input order.
    ///
    /// The first item gets `min_rank + step`, every following item one more
    /// step. For `k` items and `collection_size == k` all ranks have
    /// `rank_length(k, default_length)` digits and strictly increase.
    ///
    /// The caller commits the whole batch at once, under the scope lock.
    pub fn rebalance<T>(
        &self,
        ordered_items: impl IntoIterator<Item = T>,
        collection_size: u64,
        default_length: usize,
    ) -> RankResult<Vec<(T, Rank)>> {
        let mut rank = self.arithmetic.min_rank(collection_size, default_length);
        let mut assigned = Vec::new();
        for item in ordered_items {
            rank = self
                .arithmetic
                .increment(&rank, collection_size, default_length)?;
            assigned.push((item, rank.clone()));
        }
        Ok(assigned)
    }
}

#[cfg(test)]
mod tests {
    use super::RebalanceEngine;
    use crate::config::RankConfig;
    use crate::rank::{Rank, RankArithmetic};

    fn engine() -> RebalanceEngine {
        RebalanceEngine::new(RankArithmetic::new(&RankConfig::default()))
    }

    #[test]
    fn rebalance_of_nothing_is_empty() {
        let assigned = engine().rebalance(Vec::<u32>::new(), 0, 6).unwrap();
        assert!(assigned.is_empty());
    }

    #[test]
    fn rebalance_two_items_splits_key_space() {
        let assigned = engine().rebalance(["first", "second"], 2, 6).unwrap();
        assert_eq!(
            assigned,
            vec![
                ("first", Rank::new("mzzzzz")),
                ("second", Rank::new("zzzzzy")),
            ]
        );
    }

    #[test]
    fn rebalance_preserves_order_with_strictly_increasing_ranks() {
        let engine = engine();
        for count in [1_u64, 3, 26, 27, 100, 700] {
            let items: Vec<u64> = (0..count).collect();
            let assigned = engine.rebalance(items.clone(), count, 6).unwrap();

            let expected_length = RankArithmetic::new(&RankConfig::default()).rank_length(count, 6);
            assert_eq!(
                assigned.iter().map(|(item, _)| *item).collect::<Vec<_>>(),
                items
            );
            for (_, rank) in &assigned {
                assert_eq!(rank.len(), expected_length, "count={count} rank={rank}");
            }
            for pair in assigned.windows(2) {
                assert!(pair[0].1 < pair[1].1, "count={count}");
            }
        }
    }
}
