//! Job pipeline: triage, smash, and hints, run under a priority scheduler
//! (spec.md §4.9).

mod hints;
mod scheduler;
mod smash;
mod triage;

pub use hints::{HintMutator, HintsJob};
pub use scheduler::Scheduler;
pub use smash::{Mutator, SmashJob};
pub use triage::TriageJob;

use rand::Rng;

use syzprio_core::{Program, SyscallId};

use crate::corpus::Corpus;
use crate::error::Result;
use crate::executor::Executor;

/// The five priority bands jobs can occupy, in the original's numbering.
/// Lower numeric value runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum JobKind {
    Smash = 1,
    Generate = 2,
    Triage = 3,
    Candidate = 4,
    CandidateTriage = 5,
}

impl JobKind {
    pub fn base_priority(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone)]
pub enum JobBody {
    Triage(TriageSeed),
    Smash(SmashSeed),
    Hints(HintsSeed),
}

#[derive(Debug, Clone)]
pub struct TriageSeed {
    pub call: SyscallId,
    pub program: Program,
    /// Whether `program` arrived already minimized (e.g. a candidate
    /// re-triaged after a previous minimization pass), in which case
    /// `TriageJob::run` skips `Minimize` (spec.md §4.9).
    pub pre_minimized: bool,
}

#[derive(Debug, Clone)]
pub struct SmashSeed {
    pub call: SyscallId,
    pub program: Program,
}

#[derive(Debug, Clone)]
pub struct HintsSeed {
    pub call: SyscallId,
    pub program: Program,
}

/// One unit of scheduled work: its priority band, a monotonic creation
/// ID used to break ties in FIFO order, and the actual payload.
#[derive(Debug, Clone)]
pub struct Job {
    pub kind: JobKind,
    pub creation_id: u64,
    pub body: JobBody,
}

impl Job {
    pub fn new(kind: JobKind, creation_id: u64, body: JobBody) -> Self {
        Self { kind, creation_id, body }
    }
}

/// Routes a popped [`Job`] to the runner matching its [`JobBody`] — the
/// worker pool's dispatch function (spec.md §9: "a tagged variant
/// executed by the worker pool's dispatch function"). Follow-up jobs a
/// runner enqueues (smash after triage, hints after smash) go back onto
/// `scheduler`, so looping `dispatch` over `scheduler.next()` drives the
/// whole triage/smash/hints feedback cycle.
pub fn dispatch(
    job: Job,
    executor: &dyn Executor,
    mutator: &dyn Mutator,
    hint_mutator: &dyn HintMutator,
    corpus: &Corpus,
    scheduler: &Scheduler,
    comparison_coverage: bool,
    rng: &mut impl Rng,
) -> Result<()> {
    match job.body {
        JobBody::Triage(seed) => {
            let job = if seed.pre_minimized {
                TriageJob::pre_minimized(seed.call, seed.program)
            } else {
                TriageJob::new(seed.call, seed.program)
            };
            job.run(executor, corpus, scheduler)?;
        }
        JobBody::Smash(seed) => {
            SmashJob::new(seed.call, seed.program)
                .run(executor, mutator, corpus, scheduler, comparison_coverage, rng)?;
        }
        JobBody::Hints(seed) => {
            HintsJob::new(seed.call, seed.program).run(executor, hint_mutator, corpus)?;
        }
    }
    Ok(())
}

/// Worker loop: pops jobs off `scheduler` and dispatches each in turn
/// until the scheduler is cancelled and drains empty (spec.md §5's
/// worker-pool scheduling model).
pub async fn run_worker(
    scheduler: &Scheduler,
    executor: &dyn Executor,
    mutator: &dyn Mutator,
    hint_mutator: &dyn HintMutator,
    corpus: &Corpus,
    comparison_coverage: bool,
    rng: &mut impl Rng,
) -> Result<()> {
    while let Some(job) = scheduler.next().await {
        dispatch(job, executor, mutator, hint_mutator, corpus, scheduler, comparison_coverage, rng)?;
    }
    Ok(())
}

#[cfg(test)]
mod dispatch_tests {
    use super::*;
    use crate::executor::{CallFlags, CallInfo, ExecRequest, ExecResult};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use syzprio_core::{Call, Signal};

    struct StubExecutor;
    impl Executor for StubExecutor {
        fn exec(&self, req: ExecRequest) -> Result<ExecResult> {
            let hints = if req.need_hints {
                vec![crate::executor::HintCandidate { call_index: 0, arg_offset: 0, replacement: vec![1] }]
            } else {
                Vec::new()
            };
            Ok(ExecResult {
                calls: vec![CallInfo {
                    flags: CallFlags { executed: true, finished: true, fault_injected: false },
                    signal: Signal::from_raw([1, 2], 1),
                    raw_cover: Vec::new(),
                }],
                hints,
            })
        }
    }

    struct IdentityMutator;
    impl Mutator for IdentityMutator {
        fn mutate(&self, program: &Program, _rng: &mut dyn rand::RngCore) -> Program {
            program.clone()
        }
    }

    struct StopHintMutator;
    impl HintMutator for StopHintMutator {
        fn apply(&self, _program: &Program, _hint: &crate::executor::HintCandidate) -> Option<Program> {
            None
        }
    }

    #[test]
    fn dispatching_a_triage_job_chains_into_a_submitted_smash_job() {
        let program = Program::new(vec![Call::new(1, vec![])]);
        let corpus = Corpus::new();
        let scheduler = Scheduler::new();
        let mut rng = StdRng::seed_from_u64(0);

        let job = Job::new(
            JobKind::Triage,
            scheduler.next_creation_id(),
            JobBody::Triage(TriageSeed { call: 1, program, pre_minimized: false }),
        );
        dispatch(job, &StubExecutor, &IdentityMutator, &StopHintMutator, &corpus, &scheduler, false, &mut rng).unwrap();

        assert_eq!(corpus.stat_len(), 1);
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn dispatching_a_hints_job_runs_without_enqueueing_more_work() {
        let program = Program::new(vec![Call::new(1, vec![])]);
        let corpus = Corpus::new();
        let scheduler = Scheduler::new();
        let mut rng = StdRng::seed_from_u64(0);

        let job = Job::new(
            JobKind::Smash,
            scheduler.next_creation_id(),
            JobBody::Hints(HintsSeed { call: 1, program }),
        );
        dispatch(job, &StubExecutor, &IdentityMutator, &StopHintMutator, &corpus, &scheduler, false, &mut rng).unwrap();

        assert!(scheduler.is_empty());
    }
}
