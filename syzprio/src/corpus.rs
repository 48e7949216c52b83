//! Concurrent, content-hash-keyed corpus of interesting programs
//! (spec.md §4.8).
//!
//! Mirrors the shape of `anvil`'s `Pool`: a single `RwLock` around the
//! map and the accumulated signal, items themselves immutable and shared
//! via `Arc` so a reader holding one doesn't block a writer replacing the
//! map entry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use syzprio_core::{Program, Signal, SyscallId};
use tokio::sync::mpsc::UnboundedSender;

/// Maximum number of update records kept per item; beyond this the
/// oldest are dropped, matching `original_source/pkg/corpus/corpus.go`'s
/// `Updates` cap.
const MAX_UPDATES: usize = 32;

/// One observation that grew or refreshed a [`CorpusItem`]'s signal.
#[derive(Debug, Clone)]
pub struct ItemUpdate {
    pub raw_cover: Vec<u32>,
}

/// An immutable, copy-on-write snapshot of one corpus entry. Saving a
/// program that already exists replaces this with a new `CorpusItem`
/// rather than mutating fields in place, so any `Arc<CorpusItem>` a
/// reader is holding stays valid.
#[derive(Debug, Clone)]
pub struct CorpusItem {
    pub call: SyscallId,
    pub program: Program,
    pub has_any: bool,
    pub signal: Signal,
    pub updates: Vec<ItemUpdate>,
}

impl CorpusItem {
    fn new(call: SyscallId, program: Program, signal: Signal) -> Self {
        let has_any = program.contains_any();
        Self { call, program, has_any, signal, updates: vec![ItemUpdate { raw_cover: Vec::new() }] }
    }

    fn with_update(&self, signal: Signal, update: ItemUpdate) -> Self {
        let mut merged_signal = self.signal.clone();
        merged_signal.merge(&signal);
        let mut updates = self.updates.clone();
        updates.push(update);
        if updates.len() > MAX_UPDATES {
            let overflow = updates.len() - MAX_UPDATES;
            updates.drain(0..overflow);
        }
        Self { call: self.call, program: self.program.clone(), has_any: self.has_any, signal: merged_signal, updates }
    }
}

/// A new or refreshed corpus item worth saving.
pub struct NewInput {
    pub call: SyscallId,
    pub program: Program,
    pub signal: Signal,
    pub raw_cover: Vec<u32>,
}

/// Fired on every successful `Corpus::save`, so a generation loop can
/// react to newly admitted coverage without polling the corpus.
#[derive(Debug, Clone)]
pub struct NewItemEvent {
    pub key: String,
    pub is_new: bool,
}

#[derive(Default)]
struct CorpusState {
    items: HashMap<String, Arc<CorpusItem>>,
    signal: Signal,
}

pub struct Corpus {
    state: RwLock<CorpusState>,
    updates: Option<UnboundedSender<NewItemEvent>>,
}

impl Corpus {
    pub fn new() -> Self {
        Self { state: RwLock::new(CorpusState::default()), updates: None }
    }

    pub fn with_update_channel(updates: UnboundedSender<NewItemEvent>) -> Self {
        Self { state: RwLock::new(CorpusState::default()), updates: Some(updates) }
    }

    /// Inserts or merges `input`. A program whose content hash is already
    /// present has its signal merged and an `ItemUpdate` appended
    /// (capped at [`MAX_UPDATES`]); otherwise it's inserted fresh. Either
    /// way the corpus-wide signal is grown by `input.signal`, and a
    /// `NewItemEvent` is sent if an update channel was configured.
    pub fn save(&self, input: NewInput) {
        let key = input.program.content_hash();
        let mut state = self.state.write();

        let is_new = !state.items.contains_key(&key);
        let item = match state.items.get(&key) {
            Some(existing) => Arc::new(existing.with_update(input.signal.clone(), ItemUpdate { raw_cover: input.raw_cover })),
            None => Arc::new(CorpusItem::new(input.call, input.program, input.signal.clone())),
        };
        state.items.insert(key.clone(), item);
        state.signal.merge(&input.signal);

        if let Some(tx) = &self.updates {
            let _ = tx.send(NewItemEvent { key, is_new });
        }
    }

    /// Edges in `candidate` not already covered by the corpus-wide
    /// signal — what a triage job checks to decide whether a program is
    /// worth keeping at all.
    pub fn diff_signal(&self, candidate: &Signal) -> Signal {
        candidate.diff(&self.state.read().signal)
    }

    pub fn signal(&self) -> Signal {
        self.state.read().signal.clone()
    }

    pub fn items(&self) -> Vec<Arc<CorpusItem>> {
        self.state.read().items.values().cloned().collect()
    }

    pub fn item(&self, key: &str) -> Option<Arc<CorpusItem>> {
        self.state.read().items.get(key).cloned()
    }

    pub fn stat_len(&self) -> usize {
        self.state.read().items.len()
    }

    /// Coverage belonging to calls of a specific syscall ID, across every
    /// stored item — used for per-call coverage reporting.
    pub fn call_cover(&self, call: SyscallId) -> Signal {
        let state = self.state.read();
        let mut out = Signal::new();
        for item in state.items.values() {
            if item.call == call {
                out.merge(&item.signal);
            }
        }
        out
    }
}

impl Default for Corpus {
    fn default() -> Self {
        Self::new()
    }
}
