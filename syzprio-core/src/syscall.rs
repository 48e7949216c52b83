//! Syscall descriptors and the target they belong to.

use std::collections::HashMap;

use bitflags::bitflags;

bitflags! {
    /// Flags carried by a syscall descriptor.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SyscallFlags: u8 {
        const DISABLED    = 1 << 0;
        const NO_GENERATE = 1 << 1;
    }
}

/// Dense, small-integer identifier for a syscall within a [`Target`].
///
/// This is the ID space every other component in the crate (choice table,
/// 2-gram table, successor table, TF-IDF documents) operates on; kernel
/// call numbers (`NR`) only show up at the `Target`/`SuccessorTable`
/// boundary.
pub type SyscallId = u32;

/// A single syscall descriptor. Opaque beyond what the prioritization
/// engine needs: a stable ID, the underlying kernel call number, and
/// generation flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Syscall {
    pub id: SyscallId,
    pub nr: i64,
    pub name: String,
    pub flags: SyscallFlags,
}

impl Syscall {
    pub fn new(id: SyscallId, nr: i64, name: impl Into<String>) -> Self {
        Self { id, nr, name: name.into(), flags: SyscallFlags::empty() }
    }

    pub fn disabled(mut self) -> Self {
        self.flags |= SyscallFlags::DISABLED;
        self
    }

    pub fn no_generate(mut self) -> Self {
        self.flags |= SyscallFlags::NO_GENERATE;
        self
    }

    /// A syscall is generatable iff it is neither disabled nor marked
    /// no-generate.
    pub fn generatable(&self) -> bool {
        !self.flags.intersects(SyscallFlags::DISABLED | SyscallFlags::NO_GENERATE)
    }
}

/// The full set of syscalls known to the fuzzer for one OS/arch pair.
///
/// `Target` owns the dense ID space and the `NR -> [ID]` mapping used by
/// `SuccessorTable`'s `DongTing` translation (one kernel `NR` can back
/// several syscall variants/IDs).
#[derive(Debug, Clone, Default)]
pub struct Target {
    syscalls: Vec<Syscall>,
    nr_to_ids: HashMap<i64, Vec<SyscallId>>,
}

impl Target {
    pub fn new(syscalls: Vec<Syscall>) -> Self {
        let mut nr_to_ids: HashMap<i64, Vec<SyscallId>> = HashMap::new();
        for sc in &syscalls {
            nr_to_ids.entry(sc.nr).or_default().push(sc.id);
        }
        Self { syscalls, nr_to_ids }
    }

    pub fn syscalls(&self) -> &[Syscall] {
        &self.syscalls
    }

    pub fn syscall(&self, id: SyscallId) -> Option<&Syscall> {
        self.syscalls.iter().find(|s| s.id == id)
    }

    pub fn ids_for_nr(&self, nr: i64) -> &[SyscallId] {
        self.nr_to_ids.get(&nr).map(Vec::as_slice).unwrap_or(&[])
    }

    /// IDs of every syscall that is generatable, in ascending ID order.
    pub fn generatable_calls(&self) -> Vec<SyscallId> {
        let mut ids: Vec<SyscallId> =
            self.syscalls.iter().filter(|s| s.generatable()).map(|s| s.id).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.syscalls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.syscalls.is_empty()
    }
}
