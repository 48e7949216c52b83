//! Hints: execute once with comparison tracing enabled, then try
//! replacing matched comparison operands one at a time.

use syzprio_core::{Program, SyscallId};

use crate::corpus::{Corpus, NewInput};
use crate::error::Result;
use crate::executor::{ExecRequest, Executor, HintCandidate};

/// Applies one hint candidate to a program, producing the mutated
/// program to re-execute. Returning `None` tells [`HintsJob::run`] to
/// stop processing further candidates for this program — mirrors the
/// original's `MutateWithHints` callback returning `Stop`.
pub trait HintMutator {
    fn apply(&self, program: &Program, hint: &HintCandidate) -> Option<Program>;
}

pub struct HintsJob {
    pub call: SyscallId,
    pub program: Program,
}

impl HintsJob {
    pub fn new(call: SyscallId, program: Program) -> Self {
        Self { call, program }
    }

    pub fn run(&self, executor: &dyn Executor, mutator: &dyn HintMutator, corpus: &Corpus) -> Result<()> {
        let mut req = ExecRequest::new(self.program.clone());
        req.need_hints = true;
        let result = executor.exec(req)?;

        for hint in &result.hints {
            let Some(candidate) = mutator.apply(&self.program, hint) else {
                break;
            };

            let exec_result = executor.exec(ExecRequest::new(candidate.clone()))?;
            let signal = exec_result.program_signal();
            let new_edges = corpus.diff_signal(&signal);
            if !new_edges.is_empty() {
                corpus.save(NewInput { call: self.call, program: candidate, signal, raw_cover: Vec::new() });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{CallFlags, CallInfo, ExecResult};
    use syzprio_core::{Call, Signal};

    struct StubExecutor;
    impl Executor for StubExecutor {
        fn exec(&self, req: ExecRequest) -> Result<ExecResult> {
            let hints = if req.need_hints {
                vec![HintCandidate { call_index: 0, arg_offset: 0, replacement: vec![42] }]
            } else {
                Vec::new()
            };
            Ok(ExecResult {
                calls: vec![CallInfo {
                    flags: CallFlags { executed: true, finished: true, fault_injected: false },
                    signal: Signal::from_raw([1], 1),
                    raw_cover: Vec::new(),
                }],
                hints,
            })
        }
    }

    struct AlwaysReplace;
    impl HintMutator for AlwaysReplace {
        fn apply(&self, program: &Program, hint: &HintCandidate) -> Option<Program> {
            let mut p = program.clone();
            if let Some(call) = p.calls.get_mut(hint.call_index) {
                call.payload = hint.replacement.clone();
            }
            Some(p)
        }
    }

    struct AlwaysStop;
    impl HintMutator for AlwaysStop {
        fn apply(&self, _program: &Program, _hint: &HintCandidate) -> Option<Program> {
            None
        }
    }

    #[test]
    fn applies_hints_and_saves_new_coverage() {
        let program = Program::new(vec![Call::new(1, vec![0])]);
        let job = HintsJob::new(1, program);
        let corpus = Corpus::new();
        job.run(&StubExecutor, &AlwaysReplace, &corpus).unwrap();
        assert_eq!(corpus.stat_len(), 1);
    }

    #[test]
    fn stops_immediately_when_mutator_returns_none() {
        let program = Program::new(vec![Call::new(1, vec![0])]);
        let job = HintsJob::new(1, program);
        let corpus = Corpus::new();
        job.run(&StubExecutor, &AlwaysStop, &corpus).unwrap();
        assert_eq!(corpus.stat_len(), 0);
    }
}
