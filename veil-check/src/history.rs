//! Snapshot history of groupified partitions.
//!
//! A snapshot stores, per class, the representative row plus the class
//! aggregates. A node that is an ancestor-or-equal of a previously checked
//! node can be groupified by generalizing each representative's base row
//! under the new transformation and merging counts, instead of rescanning
//! the whole dataset. With monotonic hierarchies this yields the exact same
//! partition.
//!
//! The store is LRU over node identifiers, with admission gated by two
//! relative-size thresholds (both must hold).

use rustc_hash::FxHashMap;

use veil_core::lattice::{Property, SolutionSpace};

use crate::distribution::Distribution;
use crate::groupify::HashGroupify;

/// One serialized class.
#[derive(Clone, Debug)]
pub struct SnapshotEntry {
    /// First row seen with the class key; regeneralization starts here.
    pub representative: u32,
    pub count: u32,
    pub pcount: u32,
    pub distributions: Vec<Distribution>,
}

/// A serialized partition of one checked node.
#[derive(Clone, Debug)]
pub struct Snapshot {
    /// The node the partition belongs to.
    pub node: u64,
    pub entries: Vec<SnapshotEntry>,
}

impl Snapshot {
    fn from_groupify(node: u64, groupify: &HashGroupify) -> Self {
        let entries = groupify
            .ordered()
            .map(|entry| SnapshotEntry {
                representative: entry.representative,
                count: entry.count,
                pcount: entry.pcount,
                distributions: entry.distributions.clone(),
            })
            .collect();
        Self { node, entries }
    }
}

/// LRU snapshot store keyed by node id.
#[derive(Debug)]
pub struct History {
    capacity: usize,
    snapshot_size_dataset: f64,
    snapshot_size_snapshot: f64,
    snapshots: FxHashMap<u64, Snapshot>,
    /// Node ids from least to most recently used.
    usage: Vec<u64>,
}

impl History {
    /// Create a history holding up to `capacity` snapshots.
    pub fn new(capacity: usize, snapshot_size_dataset: f64, snapshot_size_snapshot: f64) -> Self {
        Self {
            capacity,
            snapshot_size_dataset,
            snapshot_size_snapshot,
            snapshots: FxHashMap::default(),
            usage: Vec::new(),
        }
    }

    /// Number of stored snapshots.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether the history is empty.
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Whether a snapshot for `node` is stored.
    pub fn contains(&self, node: u64) -> bool {
        self.snapshots.contains_key(&node)
    }

    /// The best usable snapshot for `target`: among stored ancestors-or-equal
    /// of `target`, the one with the fewest classes (ties: smaller node id).
    /// Touches the LRU order of the returned snapshot.
    pub fn find_ancestor(&mut self, space: &SolutionSpace, target: u64) -> Option<&Snapshot> {
        let mut best: Option<(usize, u64)> = None;
        for (&node, snapshot) in &self.snapshots {
            if !space.is_parent_child_or_equal(target, node) {
                continue;
            }
            let candidate = (snapshot.entries.len(), node);
            if best.map_or(true, |current| candidate < current) {
                best = Some(candidate);
            }
        }
        let (_, node) = best?;
        self.touch(node);
        self.snapshots.get(&node)
    }

    /// Store the partition of a just-checked node, subject to admission.
    ///
    /// Admission requires the class count to fit both thresholds: relative
    /// to the dataset, and (when the partition was rebuilt from a snapshot)
    /// relative to the source snapshot's class count. A node carrying
    /// `FORCE_SNAPSHOT` bypasses admission.
    pub fn store(
        &mut self,
        space: &SolutionSpace,
        node: u64,
        groupify: &HashGroupify,
        rows: u64,
        source_classes: Option<usize>,
    ) {
        if self.capacity == 0 || self.snapshots.contains_key(&node) {
            return;
        }
        let classes = groupify.num_classes();
        if !space.has_property(node, Property::ForceSnapshot) {
            if classes as f64 > self.snapshot_size_dataset * rows as f64 {
                return;
            }
            if let Some(source) = source_classes {
                if classes as f64 > self.snapshot_size_snapshot * source as f64 {
                    return;
                }
            }
        }

        while self.snapshots.len() >= self.capacity {
            let evicted = self.usage.remove(0);
            self.snapshots.remove(&evicted);
            tracing::trace!(node = evicted, "evicted snapshot");
        }
        self.snapshots.insert(node, Snapshot::from_groupify(node, groupify));
        self.usage.push(node);
    }

    fn touch(&mut self, node: u64) {
        if let Some(position) = self.usage.iter().position(|&n| n == node) {
            self.usage.remove(position);
            self.usage.push(node);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space_3x3() -> SolutionSpace {
        SolutionSpace::new(&[0, 0], &[2, 2]).unwrap()
    }

    fn groupify_with_classes(classes: usize) -> HashGroupify {
        let mut groupify = HashGroupify::with_capacity(classes.max(1));
        for i in 0..classes {
            groupify.add_row(vec![i as u32], i as u32, 0, &[]);
        }
        groupify
    }

    #[test]
    fn admission_rejects_large_partitions() {
        let space = space_3x3();
        let mut history = History::new(4, 0.2, 0.8);

        // 3 classes over 10 rows: 30% > 20%, rejected.
        let groupify = groupify_with_classes(3);
        history.store(&space, 0, &groupify, 10, None);
        assert!(history.is_empty());

        // 2 classes over 10 rows: admitted.
        let groupify = groupify_with_classes(2);
        history.store(&space, 0, &groupify, 10, None);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn admission_requires_contraction_from_source() {
        let space = space_3x3();
        let mut history = History::new(4, 0.9, 0.8);

        // 5 classes from a 6-class source: 5 > 0.8 * 6, rejected.
        let groupify = groupify_with_classes(5);
        history.store(&space, 1, &groupify, 100, Some(6));
        assert!(history.is_empty());

        // 4 classes from a 6-class source: admitted.
        let groupify = groupify_with_classes(4);
        history.store(&space, 1, &groupify, 100, Some(6));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn force_snapshot_bypasses_admission() {
        let mut space = space_3x3();
        let mut history = History::new(4, 0.01, 0.01);
        space.put_property(7, Property::ForceSnapshot);

        let groupify = groupify_with_classes(5);
        history.store(&space, 7, &groupify, 5, Some(1));
        assert!(history.contains(7));
    }

    #[test]
    fn lru_evicts_least_recently_used() {
        let space = space_3x3();
        let mut history = History::new(2, 0.9, 0.9);
        let groupify = groupify_with_classes(1);

        let a = space.id_of(&[0, 0]);
        let b = space.id_of(&[0, 1]);
        let c = space.id_of(&[0, 2]);
        history.store(&space, a, &groupify, 10, None);
        history.store(&space, b, &groupify, 10, None);

        // Touch `a` so `b` becomes the eviction victim.
        assert!(history.find_ancestor(&space, a).is_some());
        history.store(&space, c, &groupify, 10, None);

        assert!(history.contains(a));
        assert!(!history.contains(b));
        assert!(history.contains(c));
    }

    #[test]
    fn find_ancestor_prefers_fewest_classes() {
        let space = space_3x3();
        let mut history = History::new(4, 0.9, 0.9);

        let low = space.id_of(&[0, 0]);
        let mid = space.id_of(&[1, 0]);
        history.store(&space, low, &groupify_with_classes(4), 10, None);
        history.store(&space, mid, &groupify_with_classes(2), 10, None);

        // Both stored nodes sit below (1,1); mid has fewer classes and wins.
        let target = space.id_of(&[1, 1]);
        let snapshot = history.find_ancestor(&space, target).unwrap();
        assert_eq!(snapshot.node, mid);

        // A target below `mid` can only use `low`.
        let target = space.id_of(&[0, 1]);
        let snapshot = history.find_ancestor(&space, target).unwrap();
        assert_eq!(snapshot.node, low);

        let mut empty = History::new(4, 0.9, 0.9);
        assert!(empty.find_ancestor(&space, low).is_none());
    }
}
