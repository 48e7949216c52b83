//! Signal and coverage set algebra.
//!
//! `Signal` models the executor-reported kernel-edge fingerprints used to
//! decide whether a program is "interesting". It is a map from a raw edge
//! ID to a priority, kept because two executions of the same edge can
//! carry different weights (e.g. rare paths are weighted higher); `Cover`
//! is the simpler raw-edge set used only for reporting.

use std::collections::BTreeMap;

/// A set of edge fingerprints, each carrying the highest priority seen for
/// it. Merging two signals keeps the max priority per edge, matching the
/// "union" semantics `Corpus` relies on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signal {
    elems: BTreeMap<u32, i32>,
}

impl Signal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_raw(raw: impl IntoIterator<Item = u32>, prio: i32) -> Self {
        let mut elems = BTreeMap::new();
        for edge in raw {
            elems
                .entry(edge)
                .and_modify(|p: &mut i32| {
                    if prio > *p {
                        *p = prio;
                    }
                })
                .or_insert(prio);
        }
        Self { elems }
    }

    pub fn len(&self) -> usize {
        self.elems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    pub fn empty(&self) -> bool {
        self.is_empty()
    }

    pub fn contains(&self, edge: u32) -> bool {
        self.elems.contains_key(&edge)
    }

    /// Merges `other` into `self` in place, keeping the max priority per
    /// shared edge. This is what `Corpus::signal` accumulates across all
    /// items, and what a new item's signal is folded into on `Save`.
    pub fn merge(&mut self, other: &Signal) {
        for (&edge, &prio) in &other.elems {
            self.elems
                .entry(edge)
                .and_modify(|p| {
                    if prio > *p {
                        *p = prio;
                    }
                })
                .or_insert(prio);
        }
    }

    /// Returns a signal containing only the edges present in both `self`
    /// and `other`. Used by deflaking to compute the stable signal across
    /// repeated executions.
    pub fn intersection(&self, other: &Signal) -> Signal {
        let elems = self
            .elems
            .iter()
            .filter_map(|(&edge, &prio)| other.elems.get(&edge).map(|&p2| (edge, prio.max(p2))))
            .collect();
        Signal { elems }
    }

    /// Returns the edges in `self` that are not present in `other`.
    pub fn diff(&self, other: &Signal) -> Signal {
        let elems =
            self.elems.iter().filter(|(edge, _)| !other.elems.contains_key(edge)).map(|(&e, &p)| (e, p)).collect();
        Signal { elems }
    }

    pub fn union(&self, other: &Signal) -> Signal {
        let mut out = self.clone();
        out.merge(other);
        out
    }

    pub fn edges(&self) -> impl Iterator<Item = u32> + '_ {
        self.elems.keys().copied()
    }
}

impl FromIterator<(u32, i32)> for Signal {
    fn from_iter<T: IntoIterator<Item = (u32, i32)>>(iter: T) -> Self {
        Self { elems: iter.into_iter().collect() }
    }
}

/// Raw coverage: the set of edges touched, without priority weighting.
/// Used only when reporting cover back through the update channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cover {
    elems: std::collections::BTreeSet<u32>,
}

impl Cover {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, raw: impl IntoIterator<Item = u32>) {
        self.elems.extend(raw);
    }

    pub fn serialize(&self) -> Vec<u32> {
        self.elems.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.elems.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_union_of_edges() {
        let mut a = Signal::from_raw([1, 2], 1);
        let b = Signal::from_raw([2, 3], 1);
        a.merge(&b);
        assert_eq!(a.len(), 3);
        assert!(a.contains(1) && a.contains(2) && a.contains(3));
    }

    #[test]
    fn merge_keeps_max_priority() {
        let mut a = Signal::from_raw([1], 1);
        let b = Signal::from_raw([1], 5);
        a.merge(&b);
        assert_eq!(a.intersection(&b).len(), 1);
    }

    #[test]
    fn intersection_is_common_edges_only() {
        let a = Signal::from_raw([1, 2, 3], 1);
        let b = Signal::from_raw([2, 3, 4], 1);
        let i = a.intersection(&b);
        assert_eq!(i.len(), 2);
        assert!(i.contains(2) && i.contains(3));
    }
}
