//! Process-level feature selection bitset (spec.md §6 "Feature selection").

use bitflags::bitflags;

bitflags! {
    /// Which priority sources and generation strategies are active. Empty
    /// flags yield the unmodified baseline: static + dynamic priorities
    /// only, uniform-random bias selection, no successor-table folding.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PsyzFlags: u16 {
        /// Fold 2-gram transition probabilities into the priority matrix.
        const NGRAM           = 1 << 0;
        /// Bias bias-call selection and choice-table draws with TF-IDF.
        const TFIDF           = 1 << 1;
        /// Use the random-walk graph generator instead of the plain
        /// linear generator.
        const RANDOM_W        = 1 << 2;
        /// Fold in a `DongTing`-format successor table (external `NR`
        /// keys, translated through `Target::ids_for_nr`).
        const DONG_TING       = 1 << 3;
        /// Mix two successor-probability tables before folding (offline
        /// tool path only; see `bin/mix_probabilities.rs`).
        const MIX             = 1 << 4;
        /// Fold in a `DongTingSyzk`-format successor table (keys are
        /// already internal syscall IDs).
        const DONG_TING_SYZK  = 1 << 5;
    }
}
