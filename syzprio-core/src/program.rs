//! Program representation: an ordered sequence of syscalls.
//!
//! Per-syscall argument synthesis is an explicit external collaborator
//! (spec.md §1 Non-goals): a [`Call`]'s concrete argument bytes are
//! produced by whatever implements [`ProgramSynthesizer`], not by this
//! crate. `Program` only owns the structural sequence and the opaque
//! bytes that synthesizer handed back, which is all the choice-table /
//! sequence-planner / corpus layers need to reason about.

use crate::hash;
use crate::syscall::SyscallId;

/// One call in a program: which syscall, and the opaque argument bytes a
/// [`ProgramSynthesizer`] produced for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub id: SyscallId,
    pub payload: Vec<u8>,
}

impl Call {
    pub fn new(id: SyscallId, payload: Vec<u8>) -> Self {
        Self { id, payload }
    }
}

/// Produces concrete argument bytes for a syscall. The real implementation
/// (type-aware argument generation) lives outside this crate; tests and
/// examples here use simple stand-ins.
pub trait ProgramSynthesizer {
    /// Synthesizes a concrete call for `id`. May push more than one call
    /// onto the stream it eventually contributes to (e.g. to also
    /// synthesize a resource the call depends on) — see
    /// `SequencePlanner::generate`'s truncate-from-the-tail step in
    /// SPEC_FULL.md §4.7.
    fn synthesize(&self, id: SyscallId) -> Vec<Call>;
}

/// Ordered sequence of calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    pub calls: Vec<Call>,
}

impl Program {
    pub fn new(calls: Vec<Call>) -> Self {
        Self { calls }
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Canonical serialization used for content hashing: each call is a
    /// little-endian syscall ID, a little-endian payload length, then the
    /// payload bytes. This is a stand-in for the real wire format, which
    /// is an explicit external collaborator (spec.md §1 Non-goals).
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for call in &self.calls {
            out.extend_from_slice(&call.id.to_le_bytes());
            out.extend_from_slice(&(call.payload.len() as u32).to_le_bytes());
            out.extend_from_slice(&call.payload);
        }
        out
    }

    /// Content hash of the canonical serialization — the corpus item key.
    pub fn content_hash(&self) -> String {
        hash::sig(&self.serialize())
    }

    pub fn remove_call(&mut self, index: usize) -> Option<Call> {
        if index < self.calls.len() {
            Some(self.calls.remove(index))
        } else {
            None
        }
    }

    pub fn insert_call(&mut self, index: usize, call: Call) {
        let index = index.min(self.calls.len());
        self.calls.insert(index, call);
    }

    /// Whether the program contains squashed ("any") arguments. Argument
    /// squashing is part of the synthesis layer this crate does not
    /// implement, so this is always `false` here; it exists so
    /// `CorpusItem::has_squashed_args` has a stable field to read.
    pub fn contains_any(&self) -> bool {
        false
    }

    pub fn truncate(&mut self, max_calls: usize) {
        if self.calls.len() > max_calls {
            self.calls.truncate(max_calls);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_is_deterministic_and_order_sensitive() {
        let p1 = Program::new(vec![Call::new(1, vec![]), Call::new(2, vec![9])]);
        let p2 = Program::new(vec![Call::new(2, vec![9]), Call::new(1, vec![])]);
        assert_eq!(p1.content_hash(), p1.content_hash());
        assert_ne!(p1.content_hash(), p2.content_hash());
    }

    #[test]
    fn remove_call_shrinks_program() {
        let mut p = Program::new(vec![Call::new(1, vec![]), Call::new(2, vec![])]);
        let removed = p.remove_call(0).unwrap();
        assert_eq!(removed.id, 1);
        assert_eq!(p.len(), 1);
    }
}
