//! Generalization hierarchies and domain shares.
//!
//! A hierarchy is a rectangular matrix `matrix[leaf_code][level]` of
//! dictionary codes. Column 0 is the identity mapping; each further column
//! replaces values with coarser ones. Monotonicity means that two values
//! merged at some level never re-split at a higher level.
//!
//! [`DomainShare`] precomputes, per level, the fraction of the level-0
//! domain covered by each generalized code. Shares drive the entropy-based
//! information-loss computation.

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};

/// A per-attribute generalization hierarchy.
#[derive(Clone, Debug)]
pub struct GeneralizationHierarchy {
    name: String,
    height: usize,
    /// `matrix[leaf_code][level]`, rectangular, column 0 the identity.
    matrix: Vec<Vec<u32>>,
}

impl GeneralizationHierarchy {
    /// Create a hierarchy from a code matrix.
    ///
    /// Validates that the matrix is non-empty, rectangular, has height >= 1,
    /// and that leaf rows are distinct (dense codes `0..num_leaves` are
    /// expected, row `i` describing leaf code `i`).
    pub fn new(name: impl Into<String>, matrix: Vec<Vec<u32>>) -> Result<Self> {
        let name = name.into();
        if matrix.is_empty() {
            return Err(Error::hierarchy(format!("hierarchy '{name}' has no rows")));
        }
        let height = matrix[0].len();
        if height == 0 {
            return Err(Error::hierarchy(format!("hierarchy '{name}' has height 0")));
        }
        for (row, levels) in matrix.iter().enumerate() {
            if levels.len() != height {
                return Err(Error::hierarchy(format!(
                    "hierarchy '{name}' is not rectangular: row {row} has {} levels, expected {height}",
                    levels.len()
                )));
            }
        }
        for (row, levels) in matrix.iter().enumerate() {
            if levels[0] != row as u32 {
                return Err(Error::hierarchy(format!(
                    "hierarchy '{name}': row {row} does not describe leaf code {row}"
                )));
            }
        }
        Ok(Self { name, height, matrix })
    }

    /// Attribute name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of levels, including the identity level 0.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of leaf values (the level-0 domain size).
    pub fn num_leaves(&self) -> usize {
        self.matrix.len()
    }

    /// Map a leaf code to its generalized code at `level`.
    pub fn map(&self, leaf: u32, level: usize) -> u32 {
        self.matrix[leaf as usize][level]
    }

    /// Whether the hierarchy is monotonic: once two values share a code at
    /// some level, they share a code at every higher level.
    pub fn is_monotonic(&self) -> bool {
        for level in 0..self.height.saturating_sub(1) {
            let mut up: FxHashMap<u32, u32> = FxHashMap::default();
            for levels in &self.matrix {
                let from = levels[level];
                let to = levels[level + 1];
                if let Some(&prev) = up.get(&from) {
                    if prev != to {
                        return false;
                    }
                } else {
                    up.insert(from, to);
                }
            }
        }
        true
    }

    /// Number of distinct codes at `level` (the domain size of that level).
    pub fn distinct_values(&self, level: usize) -> usize {
        let mut codes: Vec<u32> = self.matrix.iter().map(|levels| levels[level]).collect();
        codes.sort_unstable();
        codes.dedup();
        codes.len()
    }
}

/// Precomputed per-level share tables for one attribute.
///
/// The share of a generalized code at level `l` is the size of its leaf
/// preimage divided by the level-0 domain size, so shares lie in `(0, 1]`
/// and the share of every leaf is `1 / domain_size`.
#[derive(Clone, Debug)]
pub struct DomainShare {
    shares: Vec<FxHashMap<u32, f64>>,
    domain_size: usize,
}

impl DomainShare {
    /// Build share tables from a hierarchy.
    pub fn from_hierarchy(hierarchy: &GeneralizationHierarchy) -> Self {
        let domain_size = hierarchy.num_leaves();
        let mut shares = Vec::with_capacity(hierarchy.height());
        for level in 0..hierarchy.height() {
            let mut counts: FxHashMap<u32, u32> = FxHashMap::default();
            for leaf in 0..domain_size {
                *counts.entry(hierarchy.map(leaf as u32, level)).or_insert(0) += 1;
            }
            let table = counts
                .into_iter()
                .map(|(code, count)| (code, count as f64 / domain_size as f64))
                .collect();
            shares.push(table);
        }
        Self { shares, domain_size }
    }

    /// Share of a generalized code at `level`; 0 for unknown codes.
    pub fn share(&self, code: u32, level: usize) -> f64 {
        self.shares[level].get(&code).copied().unwrap_or(0.0)
    }

    /// The level-0 domain size.
    pub fn domain_size(&self) -> usize {
        self.domain_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The age hierarchy used throughout the engine tests:
    /// 25, 26 -> "25*"; 51, 52 -> "5*" (codes 4 and 5).
    fn age_hierarchy() -> GeneralizationHierarchy {
        GeneralizationHierarchy::new(
            "age",
            vec![vec![0, 4], vec![1, 4], vec![2, 5], vec![3, 5]],
        )
        .unwrap()
    }

    #[test]
    fn rejects_ragged_matrix() {
        let err = GeneralizationHierarchy::new("x", vec![vec![0, 1], vec![1]]).unwrap_err();
        assert!(err.to_string().contains("not rectangular"));
    }

    #[test]
    fn rejects_non_dense_leaves() {
        assert!(GeneralizationHierarchy::new("x", vec![vec![3, 1]]).is_err());
    }

    #[test]
    fn monotonicity_detects_resplit() {
        let h = age_hierarchy();
        assert!(h.is_monotonic());

        // 0 and 1 merge at level 1 but diverge again at level 2.
        let bad = GeneralizationHierarchy::new(
            "bad",
            vec![vec![0, 4, 6], vec![1, 4, 7], vec![2, 5, 6], vec![3, 5, 7]],
        )
        .unwrap();
        assert!(!bad.is_monotonic());
    }

    #[test]
    fn domain_sizes_per_level() {
        let h = age_hierarchy();
        assert_eq!(h.distinct_values(0), 4);
        assert_eq!(h.distinct_values(1), 2);
    }

    #[test]
    fn shares_are_preimage_fractions() {
        let h = age_hierarchy();
        let shares = DomainShare::from_hierarchy(&h);
        assert_eq!(shares.domain_size(), 4);
        // Leaves cover 1/4 of the domain each.
        assert_eq!(shares.share(0, 0), 0.25);
        // Level-1 codes cover half the domain each.
        assert_eq!(shares.share(4, 1), 0.5);
        assert_eq!(shares.share(5, 1), 0.5);
        // Unknown code at a level has no preimage.
        assert_eq!(shares.share(0, 1), 0.0);
    }
}
