//! Data model shared by the `syzprio` prioritization/generation engine:
//! syscall descriptors, programs, and the signal/coverage set algebra.
//!
//! This crate deliberately knows nothing about priorities, corpora, or
//! jobs — those live in `syzprio`, which depends on this crate the same
//! way `anvil` depends on `anvil-core`.

pub mod hash;
pub mod program;
pub mod signal;
pub mod syscall;

pub use program::{Call, Program, ProgramSynthesizer};
pub use signal::{Cover, Signal};
pub use syscall::{Syscall, SyscallFlags, SyscallId, Target};
