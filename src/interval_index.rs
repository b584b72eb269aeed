use coitrees::{COITree, Interval, IntervalTree};
use std::collections::BTreeMap;

use crate::data_types::coordinates::InternalSpan;

/// Per-chromosome lookup trees over stored spans.
/// Each interval carries a slot number chosen by the owner (the position of the record in its table).
/// The index is derived data: owners rebuild a chromosome whenever its records change.
#[derive(Default)]
pub struct IntervalIndex {
    /// Lookup from a chromosome to a COITree, which has 1-based inclusive ranges
    lookup_trees: BTreeMap<String, COITree<usize, usize>>
}

impl std::fmt::Debug for IntervalIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // COITree has no Debug, report tree sizes instead
        let lookup_counts: BTreeMap<String, usize> = self.lookup_trees.iter()
            .map(|(s, c)| {
                (s.clone(), c.len())
            })
            .collect();
        f.debug_struct("IntervalIndex").field("lookup_trees_len", &lookup_counts).finish()
    }
}

impl IntervalIndex {
    /// Replaces the tree for one chromosome.
    /// # Arguments
    /// * `chrom` - the chromosome to rebuild
    /// * `spans` - every (span, slot) pair currently stored on that chromosome
    pub fn rebuild_chromosome<'a, I>(&mut self, chrom: &str, spans: I)
    where
        I: IntoIterator<Item = (&'a InternalSpan, usize)>
    {
        let coi_intervals: Vec<Interval<usize>> = spans.into_iter()
            .map(|(span, slot)| {
                Interval::new(clamp_i32(span.start().get()), clamp_i32(span.end().get()), slot)
            })
            .collect();

        if coi_intervals.is_empty() {
            self.lookup_trees.remove(chrom);
        } else {
            let coi_tree = COITree::new(&coi_intervals);
            self.lookup_trees.insert(chrom.to_string(), coi_tree);
        }
    }

    /// Drops every tree
    pub fn clear(&mut self) {
        self.lookup_trees.clear();
    }

    /// Returns the slots of every span overlapping `query`, sorted ascending.
    /// Both the stored spans and the query are closed, so `[a, b]` and `[c, d]` overlap iff `a <= d && b >= c`.
    /// # Arguments
    /// * `chrom` - the chromosome to search
    /// * `query` - the 1-based inclusive span to look up
    pub fn query(&self, chrom: &str, query: &InternalSpan) -> Vec<usize> {
        let mut slots = vec![];
        if let Some(coi_tree) = self.lookup_trees.get(chrom) {
            let first = clamp_i32(query.start().get());
            let last = clamp_i32(query.end().get());
            coi_tree.query(first, last, |i| {
                slots.push(i.metadata.clone());
            });
        }
        slots.sort_unstable();
        slots
    }
}

/// Spans are validated against `MAX_COORDINATE` before they get here, so this only guards the conversion
fn clamp_i32(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}
