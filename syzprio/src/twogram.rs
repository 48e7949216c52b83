//! 2-gram transition frequency/probability table over adjacent syscall IDs
//! (spec.md §4.3).

use std::collections::HashMap;

use parking_lot::RwLock;

#[derive(Debug, Default)]
struct TwoGramState {
    /// fre[caller][callee] = raw co-occurrence count.
    fre: HashMap<u32, HashMap<u32, u32>>,
    /// prope[caller][callee] = fre / sum(fre[caller]), recomputed lazily,
    /// then blended with `successor_bias` (spec.md §4.5 step 4).
    prope: HashMap<u32, HashMap<u32, f64>>,
    /// Externally supplied successor probabilities (already row-normalized
    /// to sum to 1), folded row-wise into `prope` on the next
    /// `probabilize()`. Replaced wholesale by `set_successor_bias` rather
    /// than accumulated, so repeated `PriorityComposer` rebuilds against
    /// the same successor table stay idempotent.
    successor_bias: HashMap<u32, HashMap<u32, f64>>,
    dirty: bool,
}

/// Pairwise transition counts and derived probabilities, built up from
/// observed programs. Readers call [`TwoGramTable::probabilize`] to force a
/// recompute before reading stale `prope` data; writers only ever touch
/// `fre` and mark the table dirty.
#[derive(Debug, Default)]
pub struct TwoGramTable {
    state: RwLock<TwoGramState>,
}

impl TwoGramTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records every adjacent-pair transition in `calls`.
    pub fn add_program(&self, calls: &[u32]) {
        if calls.len() < 2 {
            return;
        }
        let mut state = self.state.write();
        for pair in calls.windows(2) {
            let (caller, callee) = (pair[0], pair[1]);
            *state.fre.entry(caller).or_default().entry(callee).or_insert(0) += 1;
        }
        state.dirty = true;
    }

    /// Recomputes `prope` from `fre` if any `add_program` call (or
    /// `set_successor_bias`) happened since the last recompute, then folds
    /// in `successor_bias` row-wise: each caller's row becomes the average
    /// of its corpus-derived probabilities and the successor table's
    /// probabilities (whichever side lacks a row contributes nothing),
    /// renormalized to sum to 1 (spec.md §4.5 step 4, "renormalize the
    /// global TwoGramTable.Prope by folding dtMat row-wise into it").
    pub fn probabilize(&self) {
        let mut state = self.state.write();
        if !state.dirty {
            return;
        }
        let mut prope = HashMap::with_capacity(state.fre.len());
        for (&caller, callees) in &state.fre {
            let total: u32 = callees.values().sum();
            if total == 0 {
                continue;
            }
            let row = callees
                .iter()
                .map(|(&callee, &count)| (callee, count as f64 / total as f64))
                .collect();
            prope.insert(caller, row);
        }

        for (&caller, bias_row) in &state.successor_bias {
            let mut row = prope.remove(&caller).unwrap_or_default();
            for (&callee, &bias_prob) in bias_row {
                let existing = row.get(&callee).copied().unwrap_or(0.0);
                row.insert(callee, existing + bias_prob);
            }
            let total: f64 = row.values().sum();
            if total > 0.0 {
                for v in row.values_mut() {
                    *v /= total;
                }
                prope.insert(caller, row);
            }
        }

        state.prope = prope;
        state.dirty = false;
    }

    /// Replaces the successor-table bias folded into `Prope` on the next
    /// `probabilize()`. Pass already row-normalized probabilities (sum to
    /// 1 per caller) — see `PriorityComposer::successor_probability_rows`.
    pub fn set_successor_bias(&self, bias: HashMap<u32, HashMap<u32, f64>>) {
        let mut state = self.state.write();
        state.successor_bias = bias;
        state.dirty = true;
    }

    /// Returns `P(callee | caller)`, or 0.0 if never observed. Forces a
    /// `probabilize` first if the table is dirty.
    pub fn probability(&self, caller: u32, callee: u32) -> f64 {
        self.probabilize();
        self.state
            .read()
            .prope
            .get(&caller)
            .and_then(|row| row.get(&callee))
            .copied()
            .unwrap_or(0.0)
    }

    /// Returns the full transition row for `caller`, or `None` if no
    /// transitions from it were ever observed.
    pub fn row(&self, caller: u32) -> Option<HashMap<u32, f64>> {
        self.probabilize();
        self.state.read().prope.get(&caller).cloned()
    }

    /// Every caller with at least one observed transition.
    pub fn callers(&self) -> Vec<u32> {
        self.probabilize();
        self.state.read().prope.keys().copied().collect()
    }

    pub fn merge(&self, other: &TwoGramTable) {
        let other_state = other.state.read();
        let mut state = self.state.write();
        for (&caller, callees) in &other_state.fre {
            let row = state.fre.entry(caller).or_default();
            for (&callee, &count) in callees {
                *row.entry(callee).or_insert(0) += count;
            }
        }
        state.dirty = true;
    }
}
