//! The kernel-execution boundary this crate generates input for.
//!
//! Actually running a program against a target kernel — sandboxing,
//! process management, the wire protocol to the executor binary — is an
//! explicit external collaborator (spec.md §1 Non-goals). This module
//! only declares the contract triage/smash/hints jobs need from it.

use syzprio_core::{Program, Signal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultInjection {
    None,
    Call { call_index: usize, nth: u32 },
}

#[derive(Debug, Clone)]
pub struct ExecRequest {
    pub program: Program,
    pub need_hints: bool,
    pub need_cover: bool,
    pub fault_injection: FaultInjection,
}

impl ExecRequest {
    pub fn new(program: Program) -> Self {
        Self { program, need_hints: false, need_cover: true, fault_injection: FaultInjection::None }
    }
}

/// Per-call flags reported back for one executed program.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallFlags {
    pub executed: bool,
    pub finished: bool,
    pub fault_injected: bool,
}

#[derive(Debug, Clone)]
pub struct CallInfo {
    pub flags: CallFlags,
    pub signal: Signal,
    pub raw_cover: Vec<u32>,
}

#[derive(Debug, Clone)]
pub struct ExecResult {
    pub calls: Vec<CallInfo>,
    /// Hint candidates streamed back when `need_hints` was set, one entry
    /// per (call index, comparison) observed. `HintsJob` mutates on each
    /// and re-executes.
    pub hints: Vec<HintCandidate>,
}

impl ExecResult {
    pub fn program_signal(&self) -> Signal {
        let mut out = Signal::new();
        for call in &self.calls {
            out.merge(&call.signal);
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct HintCandidate {
    pub call_index: usize,
    pub arg_offset: usize,
    pub replacement: Vec<u8>,
}

/// Runs one program against the target kernel and reports per-call
/// results. Implemented outside this crate; the reference implementation
/// talks over a pipe to a separate executor binary running in a VM.
pub trait Executor: Send + Sync {
    fn exec(&self, req: ExecRequest) -> crate::error::Result<ExecResult>;
}
