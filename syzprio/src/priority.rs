//! Builds the priority matrix `P[i][j]` consumed by
//! [`crate::choice_table::ChoiceTable`] (spec.md §4.5).
//!
//! Four independent contributions are folded into one matrix, dense over
//! the target's generatable calls: a static base (coarse "these calls
//! tend to go together" weights), a dynamic adjustment (feedback from
//! observed corpus behavior), 2-gram transition probabilities, and an
//! external successor table. Everything is accumulated in `f64` — the
//! dynamic contribution alone can run into the tens of thousands of
//! updates over a long fuzzing run, and `i32` accumulation overflows well
//! before that.

use std::collections::HashMap;

use syzprio_core::SyscallId;

use crate::successor::SuccessorTable;
use crate::twogram::TwoGramTable;

/// A dense `N x N` matrix over a fixed set of generatable [`SyscallId`]s,
/// row-normalized so each row sums to `10 * N`.
#[derive(Debug, Clone)]
pub struct PriorityMatrix {
    ids: Vec<SyscallId>,
    index: HashMap<SyscallId, usize>,
    rows: Vec<Vec<f64>>,
}

impl PriorityMatrix {
    pub fn ids(&self) -> &[SyscallId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Returns the normalized row for `caller`, in `ids()` order, or
    /// `None` if `caller` isn't in this matrix.
    pub fn row(&self, caller: SyscallId) -> Option<&[f64]> {
        let i = *self.index.get(&caller)?;
        Some(&self.rows[i])
    }

    pub fn index_of(&self, id: SyscallId) -> Option<usize> {
        self.index.get(&id).copied()
    }
}

/// Accumulates contributions before normalizing into a [`PriorityMatrix`].
pub struct PriorityComposer {
    ids: Vec<SyscallId>,
    index: HashMap<SyscallId, usize>,
    rows: Vec<Vec<f64>>,
}

impl PriorityComposer {
    /// Starts a composer over exactly the given generatable call IDs,
    /// every cell initialized to zero.
    pub fn new(ids: &[SyscallId]) -> Self {
        let index = ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        let rows = vec![vec![0.0; ids.len()]; ids.len()];
        Self { ids: ids.to_vec(), index, rows }
    }

    fn add(&mut self, caller: SyscallId, callee: SyscallId, weight: f64) {
        if caller == callee {
            return;
        }
        let (Some(&i), Some(&j)) = (self.index.get(&caller), self.index.get(&callee)) else {
            return;
        };
        self.rows[i][j] += weight;
    }

    /// Folds in a static base priority: a flat weight for every ordered
    /// pair of distinct generatable calls, representing "no information
    /// yet, treat all successors as equally likely".
    pub fn fold_static(&mut self, weight: f64) -> &mut Self {
        let ids = self.ids.clone();
        for &caller in &ids {
            for &callee in &ids {
                self.add(caller, callee, weight);
            }
        }
        self
    }

    /// Folds in a sparse dynamic adjustment, e.g. derived from observed
    /// corpus coverage correlations.
    pub fn fold_dynamic(&mut self, adjustments: &HashMap<(SyscallId, SyscallId), f64>, weight: f64) -> &mut Self {
        for (&(caller, callee), &value) in adjustments {
            self.add(caller, callee, value * weight);
        }
        self
    }

    /// Folds in 2-gram transition probabilities, square-root-compressed
    /// and row-renormalized exactly as spec.md §4.5 step 3 describes:
    /// `ngramMat[i][j] = round(target_sum * 2 * sqrt(Prope[i][j]))`, then
    /// each row is rescaled back to sum to `target_sum = 10 * N` before
    /// being added into the priority matrix at `weight`. The compression
    /// flattens the gap between a dominant successor and the rest of the
    /// row so one very common transition can't fully crowd out the
    /// others once blended with the static/successor contributions.
    pub fn fold_ngram(&mut self, table: &TwoGramTable, weight: f64) -> &mut Self {
        let target_sum = 10.0 * self.ids.len() as f64;
        let ids = self.ids.clone();
        for &caller in &ids {
            let Some(row) = table.row(caller) else { continue };
            for (callee, compressed) in compress_row(&row, target_sum) {
                self.add(caller, callee, compressed * weight);
            }
        }
        self
    }

    /// Folds in an externally supplied successor table, using the same
    /// square-root compression and row renormalization as `fold_ngram`
    /// (spec.md §4.5 step 4's `dtMat`).
    pub fn fold_successor(&mut self, table: &SuccessorTable, weight: f64) -> &mut Self {
        let target_sum = 10.0 * self.ids.len() as f64;
        let ids = self.ids.clone();
        for &caller in &ids {
            let Some(row) = table.row(caller) else { continue };
            for (callee, compressed) in compress_row(row, target_sum) {
                self.add(caller, callee, compressed * weight);
            }
        }
        self
    }

    /// Returns, for every caller in this composer's ID set, the
    /// successor table's row renormalized to a probability distribution
    /// (sum to 1) rather than the `target_sum`-scaled `dtMat` shape —
    /// the form `TwoGramTable::set_successor_bias` expects when folding
    /// the successor table's bias back into `Prope` (spec.md §4.5 step
    /// 4's "renormalize the global TwoGramTable.Prope by folding dtMat
    /// row-wise into it").
    pub fn successor_probability_rows(&self, table: &SuccessorTable) -> HashMap<SyscallId, HashMap<SyscallId, f64>> {
        let mut out = HashMap::new();
        for &caller in &self.ids {
            let Some(row) = table.row(caller) else { continue };
            let total: f64 = row.values().sum();
            if total <= 0.0 {
                continue;
            }
            out.insert(caller, row.iter().map(|(&callee, &p)| (callee, p / total)).collect());
        }
        out
    }

    /// Normalizes every row to sum to `10 * N` (falling back to a uniform
    /// row when a caller accumulated zero total weight, so every row
    /// remains a valid input to `ChoiceTable`), consuming the composer.
    pub fn finish(self) -> PriorityMatrix {
        let n = self.ids.len();
        let target_sum = 10.0 * n as f64;
        let mut rows = self.rows;
        for row in &mut rows {
            let total: f64 = row.iter().sum();
            if total <= 0.0 {
                let uniform = if n > 0 { target_sum / n as f64 } else { 0.0 };
                row.fill(uniform);
            } else {
                let scale = target_sum / total;
                for v in row.iter_mut() {
                    *v *= scale;
                }
            }
        }
        PriorityMatrix { ids: self.ids, index: self.index, rows }
    }
}

/// Square-root-compresses a probability row into `round(target_sum * 2 *
/// sqrt(p))`, then rescales the whole row back to sum to `target_sum`
/// (spec.md §4.5 steps 3-4, shared by the `ngramMat` and `dtMat`
/// contributions). A row with zero total probability compresses to an
/// empty map.
fn compress_row(row: &HashMap<SyscallId, f64>, target_sum: f64) -> HashMap<SyscallId, f64> {
    let mut compressed: HashMap<SyscallId, f64> =
        row.iter().map(|(&callee, &p)| (callee, (target_sum * 2.0 * p.max(0.0).sqrt()).round())).collect();
    let total: f64 = compressed.values().sum();
    if total > 0.0 {
        let scale = target_sum / total;
        for v in compressed.values_mut() {
            *v *= scale;
        }
    }
    compressed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_sum_to_ten_times_n() {
        let ids = vec![1, 2, 3];
        let mut composer = PriorityComposer::new(&ids);
        composer.fold_static(1.0);
        let matrix = composer.finish();
        for &id in &ids {
            let row = matrix.row(id).unwrap();
            let sum: f64 = row.iter().sum();
            assert!((sum - 30.0).abs() < 1e-9, "row for {id} summed to {sum}");
        }
    }

    #[test]
    fn dynamic_contribution_skews_the_row() {
        let ids = vec![1, 2, 3];
        let mut composer = PriorityComposer::new(&ids);
        composer.fold_static(1.0);
        let mut adjustments = HashMap::new();
        adjustments.insert((1, 2), 100.0);
        composer.fold_dynamic(&adjustments, 1.0);
        let matrix = composer.finish();
        let row = matrix.row(1).unwrap();
        let j2 = matrix.index_of(2).unwrap();
        let j3 = matrix.index_of(3).unwrap();
        assert!(row[j2] > row[j3]);
    }

    #[test]
    fn zero_weight_row_falls_back_to_uniform() {
        let ids = vec![1, 2];
        let composer = PriorityComposer::new(&ids);
        let matrix = composer.finish();
        let row = matrix.row(1).unwrap();
        assert!((row[0] - 10.0).abs() < 1e-9);
        assert!((row[1] - 10.0).abs() < 1e-9);
    }

    #[test]
    fn fold_ngram_applies_sqrt_compression_and_row_normalizes() {
        let ids = vec![1, 2, 3];
        let ngram = TwoGramTable::new();
        for _ in 0..3 {
            ngram.add_program(&[1, 2]);
        }
        ngram.add_program(&[1, 3]);
        // Prope[1] = {2: 0.75, 3: 0.25}.

        let mut composer = PriorityComposer::new(&ids);
        composer.fold_ngram(&ngram, 1.0);
        let matrix = composer.finish();
        let row = matrix.row(1).unwrap();
        assert!((row.iter().sum::<f64>() - 30.0).abs() < 1e-9);

        let j2 = matrix.index_of(2).unwrap();
        let j3 = matrix.index_of(3).unwrap();
        assert!(row[j2] > row[j3], "2 is still the more likely successor");

        // sqrt compression preserves the sqrt-probability ratio up to the
        // `round()` step in `compress_row`; row-normalization afterward
        // scales both sides by the same factor so it doesn't move the
        // ratio any further.
        let want_ratio = 0.75_f64.sqrt() / 0.25_f64.sqrt();
        assert!((row[j2] / row[j3] - want_ratio).abs() < 0.05);
    }

    #[test]
    fn self_transitions_are_never_added() {
        let ids = vec![1, 2];
        let mut composer = PriorityComposer::new(&ids);
        composer.add(1, 1, 500.0);
        let matrix = composer.finish();
        let row = matrix.row(1).unwrap();
        let j1 = matrix.index_of(1).unwrap();
        assert_eq!(row[j1], 10.0);
    }
}
