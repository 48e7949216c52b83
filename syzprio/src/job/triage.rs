//! Triage: decide whether a candidate program is worth keeping, minimize
//! it, and hand it off to the corpus and a follow-up smash job.

use syzprio_core::{Program, Signal, SyscallId};

use crate::corpus::{Corpus, NewInput};
use crate::error::{JobError, Result};
use crate::executor::{CallFlags, ExecRequest, Executor};
use crate::job::{Job, JobBody, JobKind, Scheduler, SmashSeed};

/// Re-executions used to separate stable coverage from flaky noise.
const SIGNAL_RUNS: usize = 3;

pub struct TriageJob {
    pub call: SyscallId,
    pub program: Program,
    pub pre_minimized: bool,
}

impl TriageJob {
    pub fn new(call: SyscallId, program: Program) -> Self {
        Self { call, program, pre_minimized: false }
    }

    pub fn pre_minimized(call: SyscallId, program: Program) -> Self {
        Self { call, program, pre_minimized: true }
    }

    /// Runs the full triage pipeline: deflake, check against the corpus's
    /// accumulated signal, minimize (skipped if the input arrived
    /// pre-minimized), save, and enqueue a follow-up smash job. Returns
    /// `Ok(false)` (without touching the corpus) if the program's stable
    /// signal adds nothing new.
    pub fn run(
        &self,
        executor: &dyn Executor,
        corpus: &Corpus,
        scheduler: &Scheduler,
    ) -> Result<bool> {
        let stable = self.deflake(executor, &self.program)?;
        let new_edges = corpus.diff_signal(&stable);
        if new_edges.is_empty() {
            return Ok(false);
        }

        let minimized = if self.pre_minimized {
            self.program.clone()
        } else {
            self.minimize(executor, self.program.clone(), &new_edges)?
        };
        let final_signal = self.deflake(executor, &minimized)?;

        corpus.save(NewInput {
            call: self.call,
            program: minimized.clone(),
            signal: final_signal,
            raw_cover: Vec::new(),
        });

        scheduler.submit(Job::new(
            JobKind::Smash,
            scheduler.next_creation_id(),
            JobBody::Smash(SmashSeed { call: self.call, program: minimized }),
        ));

        Ok(true)
    }

    /// Executes `program` up to `SIGNAL_RUNS` times and intersects the
    /// resulting signals, discarding edges that don't reproduce on every
    /// run. Abandons (returns [`JobError::DeflakeAbandoned`]) if a
    /// majority of runs fail to execute the program at all.
    fn deflake(&self, executor: &dyn Executor, program: &Program) -> Result<Signal> {
        let mut stable: Option<Signal> = None;
        let mut not_executed = 0usize;

        for _ in 0..SIGNAL_RUNS {
            let result = executor.exec(ExecRequest::new(program.clone()))?;
            let executed = result.calls.iter().any(|c| c.flags.executed);
            if !executed {
                not_executed += 1;
                continue;
            }
            let signal = result.program_signal();
            stable = Some(match stable {
                Some(prev) => prev.intersection(&signal),
                None => signal,
            });
        }

        if not_executed >= SIGNAL_RUNS / 2 + 1 {
            return Err(JobError::DeflakeAbandoned.into());
        }

        Ok(stable.unwrap_or_default())
    }

    /// Monotonically shrinks `program`: repeatedly tries removing one
    /// call at a time, keeping the removal only if the program still
    /// reproduces every edge in `must_keep` after re-execution.
    fn minimize(&self, executor: &dyn Executor, mut program: Program, must_keep: &Signal) -> Result<Program> {
        let mut index = 0;
        while index < program.len() {
            let mut candidate = program.clone();
            candidate.remove_call(index);

            let result = executor.exec(ExecRequest::new(candidate.clone()))?;
            let signal = result.program_signal();
            let still_covers = must_keep.edges().all(|edge| signal.contains(edge));

            if still_covers {
                program = candidate;
            } else {
                index += 1;
            }
        }
        Ok(program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Corpus;
    use crate::executor::{CallInfo, ExecResult};
    use syzprio_core::Call;

    struct StubExecutor {
        signal: Signal,
    }

    impl Executor for StubExecutor {
        fn exec(&self, req: ExecRequest) -> Result<ExecResult> {
            let _ = req;
            Ok(ExecResult {
                calls: vec![CallInfo {
                    flags: CallFlags { executed: true, finished: true, fault_injected: false },
                    signal: self.signal.clone(),
                    raw_cover: Vec::new(),
                }],
                hints: Vec::new(),
            })
        }
    }

    #[test]
    fn triage_saves_a_program_with_new_coverage() {
        let program = Program::new(vec![Call::new(1, vec![])]);
        let job = TriageJob::new(1, program);
        let executor = StubExecutor { signal: Signal::from_raw([1, 2], 1) };
        let corpus = Corpus::new();
        let scheduler = Scheduler::new();

        let saved = job.run(&executor, &corpus, &scheduler).unwrap();
        assert!(saved);
        assert_eq!(corpus.stat_len(), 1);
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn pre_minimized_input_skips_the_minimize_pass() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct CountingExecutor {
            signal: Signal,
            calls: AtomicUsize,
        }
        impl Executor for CountingExecutor {
            fn exec(&self, req: ExecRequest) -> Result<ExecResult> {
                let _ = req;
                self.calls.fetch_add(1, Ordering::Relaxed);
                Ok(ExecResult {
                    calls: vec![CallInfo {
                        flags: CallFlags { executed: true, finished: true, fault_injected: false },
                        signal: self.signal.clone(),
                        raw_cover: Vec::new(),
                    }],
                    hints: Vec::new(),
                })
            }
        }

        let program = Program::new(vec![Call::new(1, vec![])]);
        let executor = CountingExecutor { signal: Signal::from_raw([1, 2], 1), calls: AtomicUsize::new(0) };
        let corpus = Corpus::new();
        let scheduler = Scheduler::new();

        let job = TriageJob::pre_minimized(1, program);
        let saved = job.run(&executor, &corpus, &scheduler).unwrap();
        assert!(saved);
        // Two deflake passes (SIGNAL_RUNS each) and zero minimize
        // executions: exactly 2 * SIGNAL_RUNS calls total.
        assert_eq!(executor.calls.load(Ordering::Relaxed), 2 * SIGNAL_RUNS);
    }

    #[test]
    fn triage_skips_a_program_with_no_new_coverage() {
        let program = Program::new(vec![Call::new(1, vec![])]);
        let executor = StubExecutor { signal: Signal::from_raw([1], 1) };
        let corpus = Corpus::new();
        let scheduler = Scheduler::new();

        TriageJob::new(1, program.clone()).run(&executor, &corpus, &scheduler).unwrap();
        assert_eq!(corpus.stat_len(), 1);

        let saved = TriageJob::new(1, program).run(&executor, &corpus, &scheduler).unwrap();
        assert!(!saved);
        assert_eq!(corpus.stat_len(), 1);
    }

    #[test]
    fn deflake_abandons_when_majority_of_runs_fail() {
        struct FlakyExecutor;
        impl Executor for FlakyExecutor {
            fn exec(&self, _req: ExecRequest) -> Result<ExecResult> {
                Ok(ExecResult {
                    calls: vec![CallInfo {
                        flags: CallFlags::default(),
                        signal: Signal::new(),
                        raw_cover: Vec::new(),
                    }],
                    hints: Vec::new(),
                })
            }
        }

        let program = Program::new(vec![Call::new(1, vec![])]);
        let job = TriageJob::new(1, program);
        let corpus = Corpus::new();
        let scheduler = Scheduler::new();
        let err = job.run(&FlakyExecutor, &corpus, &scheduler).unwrap_err();
        assert!(matches!(err, crate::error::FuzzerError::Job(JobError::DeflakeAbandoned)));
    }
}
