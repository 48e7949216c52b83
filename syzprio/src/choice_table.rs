//! Weighted random draw over a [`PriorityMatrix`] (spec.md §4.6).
//!
//! A `ChoiceTable` is immutable once built: each row is stored as a
//! prefix sum so a draw is a single random float plus a binary search.
//! Rebuilding (e.g. after folding more corpus signal into the priority
//! matrix) produces a brand new table; callers publish it for readers via
//! [`ChoiceTablePublisher`], mirroring how `anvil`'s miner swaps its
//! `Arc<RwLock<MiningMode>>` rather than mutating mode state in place.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use rand::Rng;

use syzprio_core::SyscallId;

use crate::priority::PriorityMatrix;
use crate::tfidf::TfIdfModel;

#[derive(Debug)]
pub struct ChoiceTable {
    ids: Vec<SyscallId>,
    index: HashMap<SyscallId, usize>,
    /// Prefix sums per row; `runs[i][len-1]` is the row total.
    runs: Vec<Vec<f64>>,
}

impl ChoiceTable {
    pub fn from_matrix(matrix: &PriorityMatrix) -> Self {
        let ids = matrix.ids().to_vec();
        let index = ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        let runs = ids
            .iter()
            .map(|&id| {
                let row = matrix.row(id).unwrap_or(&[]);
                let mut acc = 0.0;
                row.iter()
                    .map(|&w| {
                        acc += w;
                        acc
                    })
                    .collect::<Vec<f64>>()
            })
            .collect();
        Self { ids, index, runs }
    }

    pub fn ids(&self) -> &[SyscallId] {
        &self.ids
    }

    fn row_index(&self, caller: SyscallId) -> Option<usize> {
        self.index.get(&caller).copied()
    }

    fn draw_from_row(&self, row_idx: usize, rng: &mut impl Rng) -> SyscallId {
        let run = &self.runs[row_idx];
        let total = *run.last().unwrap_or(&0.0);
        if total <= 0.0 {
            return self.ids[row_idx];
        }
        let target = rng.gen_range(0.0..total);
        let pos = run.partition_point(|&cum| cum <= target);
        self.ids[pos.min(self.ids.len() - 1)]
    }

    /// Plain weighted draw over `caller`'s row. `caller` not having a row
    /// only happens for an ID outside the generatable set the table was
    /// built from — a programmer error (spec.md §4.6 Errors): this panics
    /// in debug builds, and in release retries with a uniformly random
    /// generatable bias instead of the bad one.
    pub fn choose(&self, caller: SyscallId, rng: &mut impl Rng) -> SyscallId {
        match self.row_index(caller) {
            Some(i) => self.draw_from_row(i, rng),
            None => {
                crate::error::assert_generatable(false, caller);
                let retry_idx = rng.gen_range(0..self.ids.len().max(1));
                self.ids.get(retry_idx).map_or(caller, |&id| self.choose(id, rng))
            }
        }
    }

    /// Weighted draw restricted to callees not yet in `visited`.
    ///
    /// Reproduces the original's "biased toward first unvisited" quirk
    /// rather than fixing it: a weighted index is drawn over the *full*
    /// row first, then the table scans forward from that index (wrapping
    /// around) for the first unvisited callee. Because the scan always
    /// moves forward, a callee placed early in `ids()` order is reachable
    /// from every wraparound, while one placed late is only reachable
    /// from draws that land close to it — so early callees are chosen
    /// disproportionately often relative to a true restricted re-weighting.
    /// Kept intentionally, per spec.md §9.
    pub fn choose_front(&self, caller: SyscallId, visited: &std::collections::HashSet<SyscallId>, rng: &mut impl Rng) -> Option<SyscallId> {
        let row_idx = self.row_index(caller)?;
        let n = self.ids.len();
        if n == 0 || visited.len() >= n {
            return None;
        }
        let run = &self.runs[row_idx];
        let total = *run.last().unwrap_or(&0.0);
        let start = if total > 0.0 {
            let target = rng.gen_range(0.0..total);
            run.partition_point(|&cum| cum <= target).min(n - 1)
        } else {
            rng.gen_range(0..n)
        };
        for offset in 0..n {
            let idx = (start + offset) % n;
            let id = self.ids[idx];
            if !visited.contains(&id) {
                return Some(id);
            }
        }
        None
    }

    /// Weighted draw with a TF-IDF bias: 5% of the time, escapes to a
    /// uniform draw over the entire ID set regardless of `caller`'s row.
    /// Otherwise partitions `caller`'s row into callees the model has
    /// seen zero times (`all_terms[id] == 0` or absent) and callees it
    /// has seen at least once, and draws from the zero-count partition
    /// with probability 0.618, falling back to `choose` on an empty
    /// partition.
    pub fn choose_with_tfidf(&self, caller: SyscallId, tfidf: &TfIdfModel, rng: &mut impl Rng) -> SyscallId {
        if rng.gen_bool(0.05) {
            let idx = rng.gen_range(0..self.ids.len().max(1));
            return self.ids.get(idx).copied().unwrap_or(caller);
        }

        let Some(row_idx) = self.row_index(caller) else { return caller };
        let all_terms = tfidf.all_terms();
        let (zero, nonzero): (Vec<usize>, Vec<usize>) = (0..self.ids.len())
            .partition(|&j| all_terms.get(&self.ids[j]).copied().unwrap_or(0) == 0);

        let pick_from = if rng.gen_bool(0.618) && !zero.is_empty() {
            &zero
        } else if !nonzero.is_empty() {
            &nonzero
        } else {
            return self.draw_from_row(row_idx, rng);
        };

        let idx = pick_from[rng.gen_range(0..pick_from.len())];
        self.ids[idx]
    }
}

/// Publishes `ChoiceTable` snapshots for concurrent readers via a
/// read-mostly lock around an `Arc`, so a rebuild never blocks an
/// in-flight draw on the old table (spec.md §5; grounded in `anvil`'s
/// `Arc<RwLock<MiningMode>>` mode-swap).
#[derive(Debug)]
pub struct ChoiceTablePublisher {
    current: RwLock<Arc<ChoiceTable>>,
}

impl ChoiceTablePublisher {
    pub fn new(initial: ChoiceTable) -> Self {
        Self { current: RwLock::new(Arc::new(initial)) }
    }

    pub fn current(&self) -> Arc<ChoiceTable> {
        self.current.read().clone()
    }

    pub fn publish(&self, next: ChoiceTable) {
        *self.current.write() = Arc::new(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn table() -> ChoiceTable {
        let ids = vec![1, 2, 3];
        let mut composer = crate::priority::PriorityComposer::new(&ids);
        composer.fold_static(1.0);
        ChoiceTable::from_matrix(&composer.finish())
    }

    #[test]
    fn choose_always_returns_a_known_id() {
        let t = table();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let id = t.choose(1, &mut rng);
            assert!(t.ids().contains(&id));
        }
    }

    #[test]
    fn choose_front_never_returns_a_visited_id() {
        let t = table();
        let mut rng = StdRng::seed_from_u64(1);
        let mut visited = std::collections::HashSet::new();
        visited.insert(2);
        for _ in 0..50 {
            let id = t.choose_front(1, &visited, &mut rng).unwrap();
            assert!(!visited.contains(&id));
        }
    }

    #[test]
    fn choose_front_exhausted_returns_none() {
        let t = table();
        let mut rng = StdRng::seed_from_u64(1);
        let visited: std::collections::HashSet<SyscallId> = [1, 2, 3].into_iter().collect();
        assert_eq!(t.choose_front(1, &visited, &mut rng), None);
    }

    #[test]
    fn publisher_readers_see_the_latest_publish() {
        let publisher = ChoiceTablePublisher::new(table());
        let before = publisher.current();
        publisher.publish(table());
        let after = publisher.current();
        assert!(!Arc::ptr_eq(&before, &after));
    }
}
