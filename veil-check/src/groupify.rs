//! Equivalence-class groupification.
//!
//! [`HashGroupify`] hashes rows by their generalized QI key into a
//! preallocated bucket array with chained entries. Classes thread a second
//! chain in first-seen order; all downstream reductions (criteria, metrics)
//! walk that chain, so results are reproducible for a given row order.
//!
//! The hash is a fixed-seed 31-multiplier 32-bit hash over the key codes.
//! Collision behavior is independent of process layout, which keeps class
//! iteration order stable across runs and platforms.

use crate::distribution::Distribution;

const EMPTY: i32 = -1;

/// One equivalence class.
#[derive(Clone, Debug)]
pub struct GroupEntry {
    /// Generalized QI key, one code per dimension.
    pub key: Vec<u32>,
    hash: u32,
    next_in_bucket: i32,
    next_ordered: i32,
    /// First row seen with this key.
    pub representative: u32,
    /// Number of sample rows in the class.
    pub count: u32,
    /// Number of population records in the class; 0 without population data.
    pub pcount: u32,
    /// Per-sensitive-attribute value distributions.
    pub distributions: Vec<Distribution>,
    /// Cleared when the class is suppressed as an outlier.
    pub is_not_outlier: bool,
}

/// Aggregate verdicts of one analysis pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GroupStats {
    /// All classes pass all criteria, up to the suppression budget.
    pub anonymous: bool,
    /// All classes reach k, up to the suppression budget.
    pub k_anonymous: bool,
    /// Total count of rows in suppressed classes.
    pub suppressed: u64,
}

/// Hash table of equivalence classes with insertion-order traversal.
#[derive(Clone, Debug)]
pub struct HashGroupify {
    buckets: Vec<i32>,
    entries: Vec<GroupEntry>,
    first_ordered: i32,
    last_ordered: i32,
    rows_total: u64,
}

impl HashGroupify {
    /// Create a groupifier sized for roughly `capacity` classes.
    pub fn with_capacity(capacity: usize) -> Self {
        let buckets = (capacity.max(8) * 4 / 3).next_power_of_two();
        Self {
            buckets: vec![EMPTY; buckets],
            entries: Vec::with_capacity(capacity),
            first_ordered: EMPTY,
            last_ordered: EMPTY,
            rows_total: 0,
        }
    }

    /// Drop all classes, keeping the allocated buckets for reuse.
    pub fn clear(&mut self) {
        self.buckets.fill(EMPTY);
        self.entries.clear();
        self.first_ordered = EMPTY;
        self.last_ordered = EMPTY;
        self.rows_total = 0;
    }

    /// Number of classes.
    pub fn num_classes(&self) -> usize {
        self.entries.len()
    }

    /// Total number of rows added.
    pub fn rows(&self) -> u64 {
        self.rows_total
    }

    /// Add one base-data row: `key` is its generalized QI tuple,
    /// `sensitive` its sensitive-attribute codes, `pcount` its population
    /// multiplicity.
    pub fn add_row(&mut self, key: Vec<u32>, row: u32, pcount: u32, sensitive: &[u32]) {
        let index = self.entry_for(key, row, sensitive.len());
        let entry = &mut self.entries[index];
        entry.count += 1;
        entry.pcount += pcount;
        for (i, &value) in sensitive.iter().enumerate() {
            entry.distributions[i].add(value, 1);
        }
        self.rows_total += 1;
    }

    /// Merge one class of a snapshot.
    pub fn add_from_snapshot(
        &mut self,
        key: Vec<u32>,
        representative: u32,
        count: u32,
        pcount: u32,
        distributions: &[Distribution],
    ) {
        let index = self.entry_for(key, representative, distributions.len());
        let entry = &mut self.entries[index];
        entry.count += count;
        entry.pcount += pcount;
        for (i, distribution) in distributions.iter().enumerate() {
            entry.distributions[i].merge(distribution);
        }
        self.rows_total += count as u64;
    }

    /// The class of a key, if present.
    pub fn get(&self, key: &[u32]) -> Option<&GroupEntry> {
        let hash = hash_key(key);
        let mut slot = self.buckets[self.bucket_of(hash)];
        while slot != EMPTY {
            let entry = &self.entries[slot as usize];
            if entry.hash == hash && entry.key == key {
                return Some(entry);
            }
            slot = entry.next_in_bucket;
        }
        None
    }

    /// Iterate classes in first-seen order.
    pub fn ordered(&self) -> OrderedClasses<'_> {
        OrderedClasses {
            groupify: self,
            next: self.first_ordered,
        }
    }

    /// Classify outliers and compute the node verdicts.
    ///
    /// Walks classes in insertion order. A class failing any criterion is
    /// suppressed while its count still fits in `budget`; once the budget is
    /// exhausted, further failures make the node not anonymous. The
    /// k-anonymity verdict is computed independently against the same
    /// budget, to feed distinct-direction pruning.
    pub fn analyze<F>(&mut self, k: Option<u32>, budget: u64, mut fails: F) -> GroupStats
    where
        F: FnMut(&GroupEntry) -> bool,
    {
        let mut anonymous = true;
        let mut remaining = budget;
        let mut suppressed = 0u64;
        let mut below_k = 0u64;

        let mut slot = self.first_ordered;
        while slot != EMPTY {
            let index = slot as usize;
            slot = self.entries[index].next_ordered;

            self.entries[index].is_not_outlier = true;
            let entry = &self.entries[index];
            if entry.count == 0 {
                continue;
            }
            if let Some(k) = k {
                if entry.count < k {
                    below_k += entry.count as u64;
                }
            }
            if fails(entry) {
                let count = entry.count as u64;
                if count <= remaining {
                    remaining -= count;
                    suppressed += count;
                    self.entries[index].is_not_outlier = false;
                } else {
                    anonymous = false;
                }
            }
        }

        GroupStats {
            anonymous,
            k_anonymous: below_k <= budget,
            suppressed,
        }
    }

    #[inline]
    fn bucket_of(&self, hash: u32) -> usize {
        (hash as usize) & (self.buckets.len() - 1)
    }

    fn entry_for(&mut self, key: Vec<u32>, representative: u32, num_sensitive: usize) -> usize {
        let hash = hash_key(&key);
        let bucket = self.bucket_of(hash);
        let mut slot = self.buckets[bucket];
        while slot != EMPTY {
            let entry = &self.entries[slot as usize];
            if entry.hash == hash && entry.key == key {
                return slot as usize;
            }
            slot = entry.next_in_bucket;
        }

        if self.entries.len() + 1 > self.buckets.len() * 3 / 4 {
            self.grow();
        }
        let bucket = self.bucket_of(hash);
        let index = self.entries.len();
        self.entries.push(GroupEntry {
            key,
            hash,
            next_in_bucket: self.buckets[bucket],
            next_ordered: EMPTY,
            representative,
            count: 0,
            pcount: 0,
            distributions: vec![Distribution::new(); num_sensitive],
            is_not_outlier: true,
        });
        self.buckets[bucket] = index as i32;
        if self.first_ordered == EMPTY {
            self.first_ordered = index as i32;
        } else {
            self.entries[self.last_ordered as usize].next_ordered = index as i32;
        }
        self.last_ordered = index as i32;
        index
    }

    fn grow(&mut self) {
        let new_len = self.buckets.len() * 2;
        self.buckets = vec![EMPTY; new_len];
        for (index, entry) in self.entries.iter_mut().enumerate() {
            let bucket = (entry.hash as usize) & (new_len - 1);
            entry.next_in_bucket = self.buckets[bucket];
            self.buckets[bucket] = index as i32;
        }
    }
}

/// Insertion-order class iterator.
pub struct OrderedClasses<'a> {
    groupify: &'a HashGroupify,
    next: i32,
}

impl<'a> Iterator for OrderedClasses<'a> {
    type Item = &'a GroupEntry;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next == EMPTY {
            return None;
        }
        let entry = &self.groupify.entries[self.next as usize];
        self.next = entry.next_ordered;
        Some(entry)
    }
}

/// Fixed-seed 32-bit hash over a code tuple.
#[inline]
pub fn hash_key(key: &[u32]) -> u32 {
    let mut hash: u32 = 1;
    for &code in key {
        hash = hash.wrapping_mul(31).wrapping_add(code);
    }
    hash
}
