//! Aggregated error type for this crate.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FuzzerError>;

#[derive(Error, Debug)]
pub enum FuzzerError {
    #[error(transparent)]
    SuccessorTable(#[from] SuccessorTableError),
    #[error(transparent)]
    Job(#[from] JobError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors constructing a [`crate::successor::SuccessorTable`].
#[derive(Error, Debug)]
pub enum SuccessorTableError {
    #[error("successor JSON is empty")]
    EmptyJson,
    #[error("failed to parse successor JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors surfaced while running triage/smash/hints jobs.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("deflake abandoned: majority of re-executions did not reproduce the call")]
    DeflakeAbandoned,
    #[error("cancelled")]
    Cancelled,
}

/// Selecting a non-generatable call out of a [`crate::choice_table::ChoiceTable`]
/// is a programmer error — the table's own construction invariant (spec.md
/// §8 invariant 1) guarantees every populated row only ever points at
/// generatable callees. In debug builds this panics immediately to surface
/// the bug where it was introduced rather than downstream; release builds
/// let the caller retry instead (spec.md §4.6 Errors).
#[track_caller]
pub(crate) fn assert_generatable(generatable: bool, id: u32) {
    if !generatable {
        debug_assert!(false, "choice table drew non-generatable call {id}; composition is broken");
    }
}
