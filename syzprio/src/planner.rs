//! Random-walk sequence planner (spec.md §4.7).
//!
//! Grows a small DAG of syscall IDs one vertex at a time by drawing
//! successors from whichever sources [`PsyzFlags`] enables, linearizes it
//! with [`crate::dag::Dag::topo_sort_simple`], then hands the linear ID
//! sequence to an external [`ProgramSynthesizer`] to turn IDs into actual
//! [`Call`]s. Mirrors the original's `GenerateACT` flag dispatch, but as
//! one planner whose behavior varies by flag rather than four separate
//! top-level functions.

use std::collections::HashSet;

use rand::Rng;

use syzprio_core::{Program, ProgramSynthesizer, SyscallId, Target};

use crate::choice_table::ChoiceTable;
use crate::dag::Dag;
use crate::flags::PsyzFlags;
use crate::tfidf::TfIdfModel;
use crate::twogram::TwoGramTable;

pub struct SequencePlanner<'a> {
    target: &'a Target,
    choice_table: &'a ChoiceTable,
    ngram: &'a TwoGramTable,
    tfidf: Option<&'a TfIdfModel>,
    flags: PsyzFlags,
}

impl<'a> SequencePlanner<'a> {
    pub fn new(target: &'a Target, choice_table: &'a ChoiceTable, ngram: &'a TwoGramTable, flags: PsyzFlags) -> Self {
        Self { target, choice_table, ngram, tfidf: None, flags }
    }

    pub fn with_tfidf(mut self, tfidf: &'a TfIdfModel) -> Self {
        self.tfidf = Some(tfidf);
        self
    }

    /// Draws the next call after `caller`, given what's already in the
    /// walk (`visited`). Dispatches on `self.flags`, mirroring the
    /// original `GenerateACT`'s branch on `PsyzRandomW`/`PsyzTFIDF`:
    ///
    /// - `NGRAM` set: draw a 2-gram successor weighted by its observed
    ///   transition frequency (`NgramChoose`'s weighted draw, not the
    ///   single most likely one), restricted to unvisited calls, falling
    ///   back to the choice table if the n-gram table has no row for
    ///   `caller` or every successor is already visited.
    /// - `TFIDF` set (and a model attached): bias the choice-table draw
    ///   with [`ChoiceTable::choose_with_tfidf`].
    /// - neither: plain [`ChoiceTable::choose_front`].
    fn next_call(&self, caller: SyscallId, visited: &HashSet<SyscallId>, rng: &mut impl Rng) -> Option<SyscallId> {
        if self.flags.contains(PsyzFlags::NGRAM) {
            if let Some(row) = self.ngram.row(caller) {
                let mut candidates: Vec<(SyscallId, f64)> =
                    row.into_iter().filter(|(id, _)| !visited.contains(id)).collect();
                if !candidates.is_empty() {
                    candidates.sort_by_key(|(id, _)| *id);
                    let mut acc = 0.0;
                    let prefix: Vec<f64> = candidates
                        .iter()
                        .map(|(_, p)| {
                            acc += p;
                            acc
                        })
                        .collect();
                    let total = *prefix.last().unwrap_or(&0.0);
                    let pick = if total > 0.0 {
                        let target = rng.gen_range(0.0..total);
                        prefix.partition_point(|&cum| cum <= target).min(candidates.len() - 1)
                    } else {
                        rng.gen_range(0..candidates.len())
                    };
                    return Some(candidates[pick].0);
                }
            }
        }

        if self.flags.contains(PsyzFlags::TFIDF) {
            if let Some(tfidf) = self.tfidf {
                let id = self.choice_table.choose_with_tfidf(caller, tfidf, rng);
                if !visited.contains(&id) {
                    return Some(id);
                }
            }
        }

        self.choice_table.choose_front(caller, visited, rng)
    }

    /// Picks which already-placed vertex in `id_at` to branch the next
    /// call from (spec.md §4.7 step 3's "pick a bias element from
    /// globalVisit"). With the `TFIDF` flag set and at least one document
    /// observed, scores every vertex via `TfIdfModel::cal` on the
    /// space-joined ID sequence and draws an index proportional to the
    /// prefix-summed weights, falling back to a uniform draw when every
    /// weight is zero. Otherwise: `RANDOM_W` picks uniformly among every
    /// placed vertex (branching the walk into a wider DAG); without it,
    /// only the most recently added vertex is eligible (a plain chain).
    fn pick_bias_index(&self, id_at: &[SyscallId], rng: &mut impl Rng) -> usize {
        if self.flags.contains(PsyzFlags::TFIDF) {
            if let Some(tfidf) = self.tfidf {
                if tfidf.doc_count() > 0 {
                    let doc: String = id_at.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(" ");
                    let weights = tfidf.cal(&doc);
                    let mut acc = 0.0;
                    let prefix: Vec<f64> = id_at
                        .iter()
                        .map(|id| {
                            acc += weights.get(id).copied().unwrap_or(0.0);
                            acc
                        })
                        .collect();
                    let total = *prefix.last().unwrap_or(&0.0);
                    if total > 0.0 {
                        let target = rng.gen_range(0.0..total);
                        return prefix.partition_point(|&cum| cum <= target).min(id_at.len() - 1);
                    }
                    return rng.gen_range(0..id_at.len());
                }
            }
        }

        if self.flags.contains(PsyzFlags::RANDOM_W) && id_at.len() > 1 {
            rng.gen_range(0..id_at.len())
        } else {
            id_at.len() - 1
        }
    }

    /// Grows a random walk of at most `max_vertices` distinct calls
    /// starting from `seed`, recording every draw as a DAG edge from its
    /// caller, then linearizes the DAG.
    ///
    /// When `PsyzFlags::RANDOM_W` is unset, the walk only ever extends
    /// forward from the most recently added vertex (a simple chain).
    /// When set, each step also has a chance to branch backward from an
    /// earlier vertex in the walk, producing a wider DAG before
    /// linearization — matching the original's distinction between the
    /// plain linear generator and the random-walk graph generator.
    pub fn walk(&self, seed: SyscallId, max_vertices: usize, rng: &mut impl Rng) -> Vec<SyscallId> {
        if max_vertices == 0 {
            return Vec::new();
        }
        let mut visited = HashSet::new();
        visited.insert(seed);
        let mut id_at = vec![seed];
        let mut edges = Vec::new();

        while id_at.len() < max_vertices {
            let branch_from_idx = self.pick_bias_index(&id_at, rng);
            let caller = id_at[branch_from_idx];

            let Some(next) = self.next_call(caller, &visited, rng) else { break };
            edges.push((branch_from_idx, id_at.len()));
            id_at.push(next);
            visited.insert(next);
        }

        let mut dag = Dag::new(id_at.len());
        for (from, to) in edges {
            dag.add_edge(from, to);
        }

        let linear = dag.topo_sort_simple(rng);
        linear.into_iter().map(|i| id_at[i]).collect()
    }

    /// Runs [`Self::walk`], synthesizes each ID into calls via
    /// `synthesizer`, and truncates the resulting program to at most
    /// `ncalls` calls (spec.md §4.7 edge case: synthesis can expand one
    /// ID into several calls, so truncation happens after expansion, not
    /// before).
    pub fn generate(
        &self,
        seed: SyscallId,
        max_vertices: usize,
        ncalls: usize,
        synthesizer: &dyn ProgramSynthesizer,
        rng: &mut impl Rng,
    ) -> Program {
        let order = self.walk(seed, max_vertices, rng);
        let mut calls = Vec::new();
        for id in order {
            calls.extend(synthesizer.synthesize(id));
        }
        let mut program = Program::new(calls);
        program.truncate(ncalls);
        program
    }

    pub fn target(&self) -> &Target {
        self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::priority::PriorityComposer;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use syzprio_core::Call;

    struct IdentitySynthesizer;
    impl ProgramSynthesizer for IdentitySynthesizer {
        fn synthesize(&self, id: SyscallId) -> Vec<Call> {
            vec![Call::new(id, Vec::new())]
        }
    }

    fn make_choice_table(ids: &[SyscallId]) -> ChoiceTable {
        let mut composer = PriorityComposer::new(ids);
        composer.fold_static(1.0);
        ChoiceTable::from_matrix(&composer.finish())
    }

    #[test]
    fn walk_never_exceeds_requested_vertex_count() {
        let ids = vec![1, 2, 3, 4];
        let table = make_choice_table(&ids);
        let ngram = TwoGramTable::new();
        let target = Target::new(ids.iter().map(|&id| syzprio_core::Syscall::new(id, id as i64, format!("c{id}"))).collect());
        let planner = SequencePlanner::new(&target, &table, &ngram, PsyzFlags::empty());
        let mut rng = StdRng::seed_from_u64(3);
        let walk = planner.walk(1, 3, &mut rng);
        assert!(walk.len() <= 3);
        assert!(walk.iter().all(|id| ids.contains(id)));
    }

    #[test]
    fn tfidf_bias_pick_falls_back_to_random_when_no_documents_observed() {
        let ids = vec![1, 2, 3, 4];
        let table = make_choice_table(&ids);
        let ngram = TwoGramTable::new();
        let tfidf = TfIdfModel::new();
        let target = Target::new(ids.iter().map(|&id| syzprio_core::Syscall::new(id, id as i64, format!("c{id}"))).collect());
        let planner = SequencePlanner::new(&target, &table, &ngram, PsyzFlags::TFIDF).with_tfidf(&tfidf);
        let mut rng = StdRng::seed_from_u64(9);
        let walk = planner.walk(1, 4, &mut rng);
        assert!(walk.len() <= 4);
        assert!(walk.iter().all(|id| ids.contains(id)));
    }

    #[test]
    fn generate_truncates_to_ncalls() {
        let ids = vec![1, 2, 3, 4];
        let table = make_choice_table(&ids);
        let ngram = TwoGramTable::new();
        let target = Target::new(ids.iter().map(|&id| syzprio_core::Syscall::new(id, id as i64, format!("c{id}"))).collect());
        let planner = SequencePlanner::new(&target, &table, &ngram, PsyzFlags::empty());
        let mut rng = StdRng::seed_from_u64(3);
        let program = planner.generate(1, 4, 2, &IdentitySynthesizer, &mut rng);
        assert!(program.len() <= 2);
    }
}
