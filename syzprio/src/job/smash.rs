//! Smash: repeatedly mutate a seed program and look for new coverage,
//! plus two follow-on passes (collide variants, fault injection).

use rand::Rng;

use syzprio_core::{Program, SyscallId};

use crate::corpus::{Corpus, NewInput};
use crate::error::Result;
use crate::executor::{ExecRequest, Executor, FaultInjection};
use crate::job::{HintsSeed, Job, JobBody, JobKind, Scheduler};

/// Produces a mutated copy of a program. Argument-level mutation (the
/// actual bit-flipping / buffer-resizing) is an explicit external
/// collaborator, same as `ProgramSynthesizer`.
pub trait Mutator {
    fn mutate(&self, program: &Program, rng: &mut dyn rand::RngCore) -> Program;
}

const MUTATE_ITERATIONS: usize = 100;
const MAX_FAULT_ATTEMPTS: usize = 100;

pub struct SmashJob {
    pub call: SyscallId,
    pub program: Program,
}

impl SmashJob {
    pub fn new(call: SyscallId, program: Program) -> Self {
        Self { call, program }
    }

    /// Runs the full smash pipeline against `executor`: optionally enqueues
    /// a follow-up [`HintsJob`](super::HintsJob) when `comparison_coverage`
    /// indicates the executor can report comparison operands for this
    /// program, then runs `MUTATE_ITERATIONS` mutate-and-execute rounds
    /// (each optionally replaced by a collide variant), followed by a
    /// fault-injection sweep. Any round whose signal contains edges the
    /// corpus hasn't seen is saved.
    pub fn run(
        &self,
        executor: &dyn Executor,
        mutator: &dyn Mutator,
        corpus: &Corpus,
        scheduler: &Scheduler,
        comparison_coverage: bool,
        rng: &mut impl Rng,
    ) -> Result<()> {
        if comparison_coverage {
            scheduler.submit(Job::new(
                JobKind::Smash,
                scheduler.next_creation_id(),
                JobBody::Hints(HintsSeed { call: self.call, program: self.program.clone() }),
            ));
        }

        for _ in 0..MUTATE_ITERATIONS {
            let candidate = if let Some(collided) = self.random_collide(executor, mutator, rng)? {
                collided
            } else {
                mutator.mutate(&self.program, rng)
            };
            self.exec_and_maybe_save(executor, corpus, candidate)?;
        }

        self.fault_injection(executor, corpus)?;
        Ok(())
    }

    fn exec_and_maybe_save(&self, executor: &dyn Executor, corpus: &Corpus, candidate: Program) -> Result<()> {
        let result = executor.exec(ExecRequest::new(candidate.clone()))?;
        let signal = result.program_signal();
        let new_edges = corpus.diff_signal(&signal);
        if !new_edges.is_empty() {
            corpus.save(NewInput { call: self.call, program: candidate, signal, raw_cover: Vec::new() });
        }
        Ok(())
    }

    /// Variant execution strategies, picked with the original's
    /// probabilities: 20% re-execute the same mutated program twice in a
    /// row (catching flaky coverage), 20% duplicate a random call within
    /// it, 60% leave collision to an async/interleaved re-run of which
    /// half also gets a conditional immediate rerun. Returns `None` to
    /// tell the caller to fall back to a plain mutation this round.
    fn random_collide(&self, executor: &dyn Executor, mutator: &dyn Mutator, rng: &mut impl Rng) -> Result<Option<Program>> {
        let roll: f64 = rng.gen_range(0.0..1.0);
        if roll < 0.20 {
            let candidate = mutator.mutate(&self.program, rng);
            executor.exec(ExecRequest::new(candidate.clone()))?;
            Ok(Some(candidate))
        } else if roll < 0.40 {
            let mut candidate = mutator.mutate(&self.program, rng);
            if !candidate.is_empty() {
                let idx = rng.gen_range(0..candidate.len());
                let dup = candidate.calls[idx].clone();
                candidate.insert_call(idx, dup);
            }
            Ok(Some(candidate))
        } else {
            let candidate = mutator.mutate(&self.program, rng);
            if rng.gen_bool(0.5) {
                executor.exec(ExecRequest::new(candidate.clone()))?;
            }
            Ok(Some(candidate))
        }
    }

    /// Injects a fault into the focal call only (the call in `self.program`
    /// matching `self.call`), increasing the `nth` occurrence count
    /// attempted up to `MAX_FAULT_ATTEMPTS` times, and stops as soon as a
    /// round reports the fault wasn't actually injected — the executor
    /// has told us it can't push this call any further. No-op if the
    /// focal call isn't present in the program.
    fn fault_injection(&self, executor: &dyn Executor, corpus: &Corpus) -> Result<()> {
        let Some(call_index) = self.program.calls.iter().position(|c| c.id == self.call) else {
            return Ok(());
        };

        for nth in 0..MAX_FAULT_ATTEMPTS as u32 {
            let mut req = ExecRequest::new(self.program.clone());
            req.fault_injection = FaultInjection::Call { call_index, nth };
            let result = executor.exec(req)?;

            let injected = result.calls.get(call_index).is_some_and(|c| c.flags.fault_injected);
            if !injected {
                break;
            }

            let signal = result.program_signal();
            let new_edges = corpus.diff_signal(&signal);
            if !new_edges.is_empty() {
                corpus.save(NewInput {
                    call: self.call,
                    program: self.program.clone(),
                    signal,
                    raw_cover: Vec::new(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{CallFlags, CallInfo, ExecResult};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use syzprio_core::{Call, Signal};

    struct IdentityMutator;
    impl Mutator for IdentityMutator {
        fn mutate(&self, program: &Program, _rng: &mut dyn rand::RngCore) -> Program {
            program.clone()
        }
    }

    struct StubExecutor;
    impl Executor for StubExecutor {
        fn exec(&self, req: ExecRequest) -> Result<ExecResult> {
            let fault_injected = matches!(req.fault_injection, FaultInjection::Call { nth, .. } if nth == 0);
            Ok(ExecResult {
                calls: vec![CallInfo {
                    flags: CallFlags { executed: true, finished: true, fault_injected },
                    signal: Signal::from_raw([1], 1),
                    raw_cover: Vec::new(),
                }],
                hints: Vec::new(),
            })
        }
    }

    #[test]
    fn run_does_not_error_and_may_save_new_coverage() {
        let program = Program::new(vec![Call::new(1, vec![])]);
        let job = SmashJob::new(1, program);
        let corpus = Corpus::new();
        let scheduler = Scheduler::new();
        let mut rng = StdRng::seed_from_u64(0);
        job.run(&StubExecutor, &IdentityMutator, &corpus, &scheduler, false, &mut rng).unwrap();
        assert_eq!(corpus.stat_len(), 1);
        assert!(scheduler.is_empty(), "no hints job should be queued when comparison_coverage is false");
    }

    #[test]
    fn run_enqueues_a_hints_job_when_comparison_coverage_is_available() {
        let program = Program::new(vec![Call::new(1, vec![])]);
        let job = SmashJob::new(1, program);
        let corpus = Corpus::new();
        let scheduler = Scheduler::new();
        let mut rng = StdRng::seed_from_u64(0);
        job.run(&StubExecutor, &IdentityMutator, &corpus, &scheduler, true, &mut rng).unwrap();
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn fault_injection_stops_after_first_non_injected_round() {
        let program = Program::new(vec![Call::new(1, vec![])]);
        let job = SmashJob::new(1, program);
        let corpus = Corpus::new();
        job.fault_injection(&StubExecutor, &corpus).unwrap();
    }
}
