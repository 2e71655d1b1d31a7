//! Traversal ordering for the FLASH search.
//!
//! Candidates are ordered by the sum of their per-dimension *height
//! shares* (level divided by hierarchy height minus one), biasing the
//! search toward less generalization. Ties are broken by comparing levels
//! along a dimension priority derived from hierarchy heights (tallest
//! first), then by node id, so the order is a pure function of lattice and
//! hierarchies.

use std::cmp::Ordering;

use veil_core::hierarchy::GeneralizationHierarchy;
use veil_core::lattice::SolutionSpace;

/// Precomputed ordering over lattice nodes.
#[derive(Clone, Debug)]
pub struct FlashStrategy {
    /// `weights[d][level]` = level / (height_d - 1); 0 for height-1 dims.
    weights: Vec<Vec<f64>>,
    /// Dimension evaluation order for tie-breaking.
    priority: Vec<usize>,
}

impl FlashStrategy {
    /// Build the strategy for a solution space and its hierarchies.
    pub fn new(space: &SolutionSpace, hierarchies: &[GeneralizationHierarchy]) -> Self {
        debug_assert_eq!(space.num_dimensions(), hierarchies.len());
        let weights: Vec<Vec<f64>> = hierarchies
            .iter()
            .map(|hierarchy| {
                let height = hierarchy.height();
                (0..height)
                    .map(|level| {
                        if height > 1 {
                            level as f64 / (height - 1) as f64
                        } else {
                            0.0
                        }
                    })
                    .collect()
            })
            .collect();

        let mut priority: Vec<usize> = (0..hierarchies.len()).collect();
        priority.sort_by(|&a, &b| {
            hierarchies[b]
                .height()
                .cmp(&hierarchies[a].height())
                .then(a.cmp(&b))
        });

        Self { weights, priority }
    }

    /// The ordering weight of a node's levels.
    pub fn weight(&self, levels: &[u32]) -> f64 {
        levels
            .iter()
            .enumerate()
            .map(|(d, &level)| self.weights[d][level as usize])
            .sum()
    }

    /// Compare two nodes in traversal order.
    pub fn compare(&self, space: &SolutionSpace, a: u64, b: u64) -> Ordering {
        if a == b {
            return Ordering::Equal;
        }
        let levels_a = space.levels_of(a);
        let levels_b = space.levels_of(b);
        let weight_a = self.weight(&levels_a);
        let weight_b = self.weight(&levels_b);
        weight_a
            .partial_cmp(&weight_b)
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                for &d in &self.priority {
                    match levels_a[d].cmp(&levels_b[d]) {
                        Ordering::Equal => continue,
                        other => return other,
                    }
                }
                Ordering::Equal
            })
            .then(a.cmp(&b))
    }

    /// Sort nodes into traversal order.
    pub fn sort(&self, space: &SolutionSpace, nodes: &mut [u64]) {
        nodes.sort_by(|&a, &b| self.compare(space, a, b));
    }

    /// The minimum node of a non-empty slice in traversal order.
    pub fn min_of(&self, space: &SolutionSpace, nodes: &[u64]) -> Option<u64> {
        let mut iter = nodes.iter().copied();
        let mut best = iter.next()?;
        for node in iter {
            if self.compare(space, node, best) == Ordering::Less {
                best = node;
            }
        }
        Some(best)
    }
}
