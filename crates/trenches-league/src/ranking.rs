//! Leaderboard ranking.
//!
//! Entries are ordered by descending score with a stable sort, so equal
//! scores keep their input order. Positions are 1-based and consecutive:
//! ties do not share a rank. Missing or NaN scores sort last.

use std::cmp::Reverse;
use std::sync::Arc;

use ordered_float::OrderedFloat;
use serde::Serialize;
use trenches_core::error::StoreError;
use trenches_core::traits::CallerStore;
use trenches_core::types::CallerId;

/// One ranked entry.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Ranked<Id> {
    pub id: Id,
    pub score: Option<f64>,
    pub rank: u32,
}

fn sort_key(score: Option<f64>) -> Reverse<OrderedFloat<f64>> {
    let value = match score {
        Some(v) if !v.is_nan() => v,
        _ => f64::NEG_INFINITY,
    };
    Reverse(OrderedFloat(value))
}

/// Order entries by descending score and number them from 1.
pub fn assign_ranks<Id>(mut entries: Vec<(Id, Option<f64>)>) -> Vec<Ranked<Id>> {
    entries.sort_by_key(|(_, score)| sort_key(*score));
    entries
        .into_iter()
        .zip(1u32..)
        .map(|((id, score), rank)| Ranked { id, score, rank })
        .collect()
}

/// Ranks every caller by persisted power and writes the rank back.
pub struct RankingService {
    callers: Arc<dyn CallerStore>,
}

impl RankingService {
    pub fn new(callers: Arc<dyn CallerStore>) -> Self {
        Self { callers }
    }

    /// Rank the callers present in one read of the store.
    ///
    /// Callers added after the read keep their previous rank until the next
    /// run. Running twice without a power change writes the same ranks.
    pub fn rank_callers(&self) -> Result<Vec<Ranked<CallerId>>, StoreError> {
        let snapshot = self.callers.callers()?;
        let ranked = assign_ranks(snapshot.into_iter().map(|c| (c.id, c.power)).collect());
        for entry in &ranked {
            self.callers.set_rank(entry.id, entry.rank)?;
        }
        tracing::info!(callers = ranked.len(), "ranking: callers ranked");
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use trenches_core::memory::MemoryStore;
    use trenches_core::types::Caller;

    fn ids<Id: Copy>(ranked: &[Ranked<Id>]) -> Vec<Id> {
        ranked.iter().map(|r| r.id).collect()
    }

    // --- assign_ranks ---

    #[test]
    fn descending_with_missing_last() {
        let ranked = assign_ranks(vec![
            ('A', Some(100.0)),
            ('B', Some(300.0)),
            ('C', Some(200.0)),
            ('D', None),
        ]);
        assert_eq!(ids(&ranked), vec!['B', 'C', 'A', 'D']);
        let ranks: Vec<u32> = ranked.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4]);
    }

    #[test]
    fn ties_keep_input_order() {
        let ranked = assign_ranks(vec![('X', Some(5.0)), ('Y', Some(5.0)), ('Z', Some(9.0))]);
        assert_eq!(ids(&ranked), vec!['Z', 'X', 'Y']);
        assert_eq!(ranked[1].rank, 2);
        assert_eq!(ranked[2].rank, 3);
    }

    #[test]
    fn nan_sorts_with_missing() {
        let ranked = assign_ranks(vec![(1, Some(f64::NAN)), (2, None), (3, Some(-4.0))]);
        assert_eq!(ids(&ranked), vec![3, 1, 2]);
    }

    #[test]
    fn empty_input() {
        assert!(assign_ranks::<u8>(Vec::new()).is_empty());
    }

    // --- RankingService ---

    fn store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.insert_caller(Caller::new(CallerId(1), "A").with_power(100.0));
        store.insert_caller(Caller::new(CallerId(2), "B").with_power(300.0));
        store.insert_caller(Caller::new(CallerId(3), "C").with_power(200.0));
        store.insert_caller(Caller::new(CallerId(4), "D"));
        store
    }

    #[test]
    fn rank_callers_persists_ranks() {
        let store = store();
        let service = RankingService::new(store.clone());
        let ranked = service.rank_callers().unwrap();
        assert_eq!(
            ids(&ranked),
            vec![CallerId(2), CallerId(3), CallerId(1), CallerId(4)]
        );
        let rank_of = |id| store.caller(id).unwrap().unwrap().rank;
        assert_eq!(rank_of(CallerId(2)), Some(1));
        assert_eq!(rank_of(CallerId(3)), Some(2));
        assert_eq!(rank_of(CallerId(1)), Some(3));
        assert_eq!(rank_of(CallerId(4)), Some(4));
    }

    #[test]
    fn rank_callers_idempotent() {
        let store = store();
        let service = RankingService::new(store.clone());
        let first = service.rank_callers().unwrap();
        let after_first = store.to_snapshot();
        let second = service.rank_callers().unwrap();
        assert_eq!(first, second);
        assert_eq!(store.to_snapshot(), after_first);
    }

    // --- proptest ---

    proptest! {
        #[test]
        fn ranking_is_idempotent(scores in proptest::collection::vec(
            proptest::option::of(-1e6f64..1e6), 0..40)
        ) {
            let entries: Vec<(usize, Option<f64>)> = scores.into_iter().enumerate().collect();
            let once = assign_ranks(entries);
            let again = assign_ranks(once.iter().map(|r| (r.id, r.score)).collect());
            prop_assert_eq!(&once, &again);
            for pair in once.windows(2) {
                prop_assert!(sort_key(pair[0].score) <= sort_key(pair[1].score));
            }
        }
    }
}
