//! The solution-space lattice.
//!
//! Candidate transformations form a product lattice over per-attribute
//! generalization levels. Nodes are encoded as mixed-radix 64-bit
//! identifiers with precomputed per-dimension multipliers (leftmost
//! dimension most significant), so level extraction, ancestor tests, and
//! one-step neighbor enumeration are plain integer arithmetic.
//!
//! Nodes accumulate *predictive properties*: a property with direction UP
//! implicitly holds on every ancestor of a node that carries it, DOWN on
//! every descendant, NONE only on the node itself. Property state is stored
//! as per-node bitmaps for materialized nodes plus minimal seed sets per
//! directional property; `has_property` consults both.
//!
//! Ancestor here means "at least as generalized": `a` is an ancestor of `b`
//! iff `a_d >= b_d` for every dimension `d`.

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::loss::InformationLoss;

/// Hard upper bound on the number of quasi-identifiers.
pub const MAX_DIMENSIONS: usize = 15;

/// Propagation direction of a predictive property.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Holds on every ancestor of a carrying node.
    Up,
    /// Holds on every descendant of a carrying node.
    Down,
    /// Holds only on the carrying node.
    None,
}

/// Predictive properties tracked per node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Property {
    Checked = 0,
    Visited = 1,
    Expanded = 2,
    Anonymous = 3,
    NotAnonymous = 4,
    KAnonymous = 5,
    NotKAnonymous = 6,
    InsufficientUtility = 7,
    SuccessorsPruned = 8,
    ForceSnapshot = 9,
}

/// Number of distinct properties.
pub const PROPERTY_COUNT: usize = 10;

impl Property {
    #[inline]
    fn bit(self) -> u16 {
        1 << (self as u8)
    }

    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

/// A transformation: one generalization level per quasi-identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transformation {
    id: u64,
    levels: Vec<u32>,
}

impl Transformation {
    /// The node identifier.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Per-dimension generalization levels.
    pub fn levels(&self) -> &[u32] {
        &self.levels
    }

    /// The lattice level: the sum of all dimension levels.
    pub fn level(&self) -> u32 {
        self.levels.iter().sum()
    }
}

/// The solution space: encoding, neighbor enumeration, predictive
/// properties, and per-node loss cells.
#[derive(Debug)]
pub struct SolutionSpace {
    min_levels: Vec<u32>,
    max_levels: Vec<u32>,
    radices: Vec<u64>,
    multipliers: Vec<u64>,
    num_nodes: u64,
    anonymity_predictable: bool,
    /// Own property bits of materialized nodes.
    properties: FxHashMap<u64, u16>,
    /// Materialized node ids in insertion order.
    materialized: Vec<u64>,
    /// Minimal seed sets per directional property.
    seeds: Vec<Vec<u64>>,
    utility: FxHashMap<u64, InformationLoss>,
    lower_bound: FxHashMap<u64, InformationLoss>,
}

impl SolutionSpace {
    /// Create a solution space over the given per-dimension level ranges.
    pub fn new(min_levels: &[u32], max_levels: &[u32]) -> Result<Self> {
        if min_levels.is_empty() {
            return Err(Error::configuration("no quasi-identifiers defined"));
        }
        if min_levels.len() != max_levels.len() {
            return Err(Error::configuration(format!(
                "min levels ({}) and max levels ({}) differ in length",
                min_levels.len(),
                max_levels.len()
            )));
        }
        if min_levels.len() > MAX_DIMENSIONS {
            return Err(Error::configuration(format!(
                "too many quasi-identifiers: {} (maximum {MAX_DIMENSIONS})",
                min_levels.len()
            )));
        }
        for (d, (&min, &max)) in min_levels.iter().zip(max_levels).enumerate() {
            if min > max {
                return Err(Error::configuration(format!(
                    "dimension {d}: minimum level {min} exceeds maximum level {max}"
                )));
            }
        }

        let radices: Vec<u64> = min_levels
            .iter()
            .zip(max_levels)
            .map(|(&min, &max)| (max - min + 1) as u64)
            .collect();
        let mut num_nodes: u64 = 1;
        for &radix in &radices {
            num_nodes = num_nodes
                .checked_mul(radix)
                .filter(|&n| n <= 1u64 << 63)
                .ok_or_else(|| Error::configuration("solution space exceeds 2^63 nodes"))?;
        }

        let dims = radices.len();
        let mut multipliers = vec![1u64; dims];
        for d in (0..dims.saturating_sub(1)).rev() {
            multipliers[d] = multipliers[d + 1] * radices[d + 1];
        }

        Ok(Self {
            min_levels: min_levels.to_vec(),
            max_levels: max_levels.to_vec(),
            radices,
            multipliers,
            num_nodes,
            anonymity_predictable: true,
            properties: FxHashMap::default(),
            materialized: Vec::new(),
            seeds: vec![Vec::new(); PROPERTY_COUNT],
            utility: FxHashMap::default(),
            lower_bound: FxHashMap::default(),
        })
    }

    /// Number of dimensions.
    pub fn num_dimensions(&self) -> usize {
        self.radices.len()
    }

    /// Per-dimension minimum levels.
    pub fn min_levels(&self) -> &[u32] {
        &self.min_levels
    }

    /// Per-dimension maximum levels.
    pub fn max_levels(&self) -> &[u32] {
        &self.max_levels
    }

    /// Total number of nodes in the space.
    pub fn size(&self) -> u64 {
        self.num_nodes
    }

    /// The bottom node (all minimum levels).
    pub fn bottom(&self) -> u64 {
        0
    }

    /// The top node (all maximum levels).
    pub fn top(&self) -> u64 {
        self.num_nodes - 1
    }

    /// Make the aggregate anonymity verdict predictive (UP/DOWN) or local
    /// (NONE). Predictable only under a fully monotonic privacy model.
    pub fn set_anonymity_predictable(&mut self, predictable: bool) {
        self.anonymity_predictable = predictable;
    }

    /// Whether the aggregate anonymity verdict is predictive.
    pub fn anonymity_predictable(&self) -> bool {
        self.anonymity_predictable
    }

    /// Propagation direction of a property in this space.
    pub fn direction_of(&self, property: Property) -> Direction {
        match property {
            Property::KAnonymous
            | Property::InsufficientUtility
            | Property::SuccessorsPruned => Direction::Up,
            Property::NotKAnonymous => Direction::Down,
            Property::Anonymous => {
                if self.anonymity_predictable {
                    Direction::Up
                } else {
                    Direction::None
                }
            }
            Property::NotAnonymous => {
                if self.anonymity_predictable {
                    Direction::Down
                } else {
                    Direction::None
                }
            }
            _ => Direction::None,
        }
    }

    /// Decode a node id into its per-dimension levels.
    pub fn levels_of(&self, id: u64) -> Vec<u32> {
        debug_assert!(id < self.num_nodes);
        let mut levels = Vec::with_capacity(self.radices.len());
        for d in 0..self.radices.len() {
            let digit = (id / self.multipliers[d]) % self.radices[d];
            levels.push(self.min_levels[d] + digit as u32);
        }
        levels
    }

    /// Encode per-dimension levels into a node id.
    pub fn id_of(&self, levels: &[u32]) -> u64 {
        debug_assert_eq!(levels.len(), self.radices.len());
        let mut id = 0u64;
        for (d, &level) in levels.iter().enumerate() {
            debug_assert!(level >= self.min_levels[d] && level <= self.max_levels[d]);
            id += (level - self.min_levels[d]) as u64 * self.multipliers[d];
        }
        id
    }

    /// The lattice level of a node: the sum of its dimension levels.
    pub fn level_of(&self, id: u64) -> u32 {
        let mut rest = id;
        let mut level = 0u32;
        for d in 0..self.radices.len() {
            level += self.min_levels[d] + (rest / self.multipliers[d]) as u32;
            rest %= self.multipliers[d];
        }
        level
    }

    /// Decode a node id into a [`Transformation`].
    pub fn transformation(&self, id: u64) -> Transformation {
        Transformation {
            id,
            levels: self.levels_of(id),
        }
    }

    /// One-step predecessors (one dimension decremented), in ascending
    /// dimension order.
    pub fn predecessors(&self, id: u64) -> Vec<u64> {
        let levels = self.levels_of(id);
        let mut out = Vec::new();
        for d in 0..levels.len() {
            if levels[d] > self.min_levels[d] {
                out.push(id - self.multipliers[d]);
            }
        }
        out
    }

    /// One-step successors (one dimension incremented), in *reverse*
    /// dimension order. Traversal reproducibility depends on this order;
    /// keep it.
    pub fn successors(&self, id: u64) -> Vec<u64> {
        let levels = self.levels_of(id);
        let mut out = Vec::new();
        for d in (0..levels.len()).rev() {
            if levels[d] < self.max_levels[d] {
                out.push(id + self.multipliers[d]);
            }
        }
        out
    }

    /// Whether `parent` is at least as generalized as `child` in every
    /// dimension (ancestor-or-equal).
    pub fn is_parent_child_or_equal(&self, parent: u64, child: u64) -> bool {
        let mut p = parent;
        let mut c = child;
        for d in 0..self.radices.len() {
            if p / self.multipliers[d] < c / self.multipliers[d] {
                return false;
            }
            p %= self.multipliers[d];
            c %= self.multipliers[d];
        }
        true
    }

    /// Bitmask with bit `d` set iff `a` and `b` agree in dimension `d`.
    pub fn equal_dimensions_bitmask(&self, a: u64, b: u64) -> u64 {
        let mut x = a;
        let mut y = b;
        let mut mask = 0u64;
        for d in 0..self.radices.len() {
            if x / self.multipliers[d] == y / self.multipliers[d] {
                mask |= 1u64 << d;
            }
            x %= self.multipliers[d];
            y %= self.multipliers[d];
        }
        mask
    }

    fn materialize(&mut self, id: u64) -> &mut u16 {
        self.properties.entry(id).or_insert_with(|| {
            self.materialized.push(id);
            0
        })
    }

    /// Set a property on a node. Directional properties also enter the
    /// property's seed set (with dominated seeds dropped) so implied nodes
    /// answer `has_property` without being materialized.
    pub fn put_property(&mut self, id: u64, property: Property) {
        *self.materialize(id) |= property.bit();
        match self.direction_of(property) {
            Direction::None => {}
            Direction::Up => {
                let seeds = &self.seeds[property.index()];
                // Redundant if an existing seed already implies this node.
                if seeds
                    .iter()
                    .any(|&s| self.is_parent_child_or_equal(id, s))
                {
                    return;
                }
                let implied: Vec<u64> = seeds
                    .iter()
                    .copied()
                    .filter(|&s| !self.is_parent_child_or_equal(s, id))
                    .collect();
                let seeds = &mut self.seeds[property.index()];
                *seeds = implied;
                seeds.push(id);
            }
            Direction::Down => {
                let seeds = &self.seeds[property.index()];
                if seeds
                    .iter()
                    .any(|&s| self.is_parent_child_or_equal(s, id))
                {
                    return;
                }
                let implied: Vec<u64> = seeds
                    .iter()
                    .copied()
                    .filter(|&s| !self.is_parent_child_or_equal(id, s))
                    .collect();
                let seeds = &mut self.seeds[property.index()];
                *seeds = implied;
                seeds.push(id);
            }
        }
    }

    /// Whether a node has a property, directly or by directional implication.
    pub fn has_property(&self, id: u64, property: Property) -> bool {
        if let Some(bits) = self.properties.get(&id) {
            if bits & property.bit() != 0 {
                return true;
            }
        }
        match self.direction_of(property) {
            Direction::None => false,
            Direction::Up => self.seeds[property.index()]
                .iter()
                .any(|&s| self.is_parent_child_or_equal(id, s)),
            Direction::Down => self.seeds[property.index()]
                .iter()
                .any(|&s| self.is_parent_child_or_equal(s, id)),
        }
    }

    /// Materialized node ids in insertion order.
    pub fn materialized(&self) -> &[u64] {
        &self.materialized
    }

    /// All node ids at the given lattice level, ascending. Full enumeration;
    /// only viable for small spaces.
    pub fn unsafe_level(&self, level: u32) -> Vec<u64> {
        let dims = self.radices.len();
        let mut suffix_min = vec![0u32; dims + 1];
        let mut suffix_max = vec![0u32; dims + 1];
        for d in (0..dims).rev() {
            suffix_min[d] = suffix_min[d + 1] + self.min_levels[d];
            suffix_max[d] = suffix_max[d + 1] + self.max_levels[d];
        }
        let mut out = Vec::new();
        let mut levels = self.min_levels.clone();
        self.enumerate_level(0, 0, level, &suffix_min, &suffix_max, &mut levels, &mut out);
        out
    }

    #[allow(clippy::too_many_arguments)]
    fn enumerate_level(
        &self,
        d: usize,
        sum: u32,
        target: u32,
        suffix_min: &[u32],
        suffix_max: &[u32],
        levels: &mut Vec<u32>,
        out: &mut Vec<u64>,
    ) {
        if d == self.radices.len() {
            if sum == target {
                out.push(self.id_of(levels));
            }
            return;
        }
        for level in self.min_levels[d]..=self.max_levels[d] {
            let next = sum + level;
            if next + suffix_min[d + 1] > target || next + suffix_max[d + 1] < target {
                continue;
            }
            levels[d] = level;
            self.enumerate_level(d + 1, next, target, suffix_min, suffix_max, levels, out);
        }
        levels[d] = self.min_levels[d];
    }

    /// Record the information loss of a node.
    pub fn set_information_loss(&mut self, id: u64, loss: InformationLoss) {
        self.materialize(id);
        self.utility.insert(id, loss);
    }

    /// The recorded information loss of a node, if any.
    pub fn information_loss(&self, id: u64) -> Option<InformationLoss> {
        self.utility.get(&id).copied()
    }

    /// Record the lower bound of a node.
    pub fn set_lower_bound(&mut self, id: u64, bound: InformationLoss) {
        self.materialize(id);
        self.lower_bound.insert(id, bound);
    }

    /// The recorded lower bound of a node, if any.
    pub fn lower_bound(&self, id: u64) -> Option<InformationLoss> {
        self.lower_bound.get(&id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space_3x3() -> SolutionSpace {
        SolutionSpace::new(&[0, 0], &[2, 2]).unwrap()
    }

    #[test]
    fn encoding_round_trips_every_node() {
        let space = SolutionSpace::new(&[0, 1, 0], &[2, 3, 1]).unwrap();
        for id in 0..space.size() {
            let levels = space.levels_of(id);
            assert_eq!(space.id_of(&levels), id);
            let sum: u32 = levels.iter().sum();
            assert_eq!(space.level_of(id), sum);
        }
    }

    #[test]
    fn nine_node_space_has_expected_bounds() {
        let space = space_3x3();
        assert_eq!(space.size(), 9);
        assert_eq!(space.bottom(), 0);
        assert_eq!(space.levels_of(space.bottom()), vec![0, 0]);
        assert_eq!(space.levels_of(space.top()), vec![2, 2]);
        assert_eq!(space.level_of(space.top()), 4);
    }

    #[test]
    fn predecessor_successor_duality() {
        let space = SolutionSpace::new(&[0, 0, 0], &[2, 1, 2]).unwrap();
        for m in 0..space.size() {
            for n in space.successors(m) {
                assert!(space.predecessors(n).contains(&m));
            }
            for p in space.predecessors(m) {
                assert!(space.successors(p).contains(&m));
            }
        }
    }

    #[test]
    fn successors_come_in_reverse_dimension_order() {
        let space = space_3x3();
        let bottom = space.bottom();
        let succs = space.successors(bottom);
        assert_eq!(succs.len(), 2);
        // Dimension 1 incremented first, then dimension 0.
        assert_eq!(space.levels_of(succs[0]), vec![0, 1]);
        assert_eq!(space.levels_of(succs[1]), vec![1, 0]);
    }

    #[test]
    fn parent_child_and_bitmask() {
        let space = space_3x3();
        let a = space.id_of(&[2, 1]);
        let b = space.id_of(&[1, 1]);
        let c = space.id_of(&[0, 2]);
        assert!(space.is_parent_child_or_equal(a, b));
        assert!(!space.is_parent_child_or_equal(b, a));
        assert!(!space.is_parent_child_or_equal(a, c));
        assert!(space.is_parent_child_or_equal(a, a));

        assert_eq!(space.equal_dimensions_bitmask(a, b), 0b10);
        assert_eq!(space.equal_dimensions_bitmask(b, c), 0b00);
        assert_eq!(space.equal_dimensions_bitmask(a, a), 0b11);
    }

    #[test]
    fn up_properties_propagate_to_ancestors() {
        let mut space = space_3x3();
        let mid = space.id_of(&[1, 1]);
        space.put_property(mid, Property::KAnonymous);

        assert!(space.has_property(mid, Property::KAnonymous));
        assert!(space.has_property(space.id_of(&[2, 1]), Property::KAnonymous));
        assert!(space.has_property(space.top(), Property::KAnonymous));
        assert!(!space.has_property(space.id_of(&[0, 2]), Property::KAnonymous));
        assert!(!space.has_property(space.bottom(), Property::KAnonymous));
    }

    #[test]
    fn down_properties_propagate_to_descendants() {
        let mut space = space_3x3();
        let mid = space.id_of(&[1, 1]);
        space.put_property(mid, Property::NotKAnonymous);

        assert!(space.has_property(space.bottom(), Property::NotKAnonymous));
        assert!(space.has_property(space.id_of(&[1, 0]), Property::NotKAnonymous));
        assert!(!space.has_property(space.id_of(&[2, 1]), Property::NotKAnonymous));
        assert!(!space.has_property(space.id_of(&[0, 2]), Property::NotKAnonymous));
    }

    #[test]
    fn anonymity_direction_follows_predictability() {
        let mut space = space_3x3();
        let mid = space.id_of(&[1, 1]);
        space.set_anonymity_predictable(false);
        space.put_property(mid, Property::Anonymous);
        assert!(!space.has_property(space.top(), Property::Anonymous));

        let mut space = space_3x3();
        space.set_anonymity_predictable(true);
        space.put_property(space.id_of(&[1, 1]), Property::Anonymous);
        assert!(space.has_property(space.top(), Property::Anonymous));
    }

    #[test]
    fn none_properties_stay_local() {
        let mut space = space_3x3();
        let mid = space.id_of(&[1, 1]);
        space.put_property(mid, Property::Checked);
        assert!(space.has_property(mid, Property::Checked));
        assert!(!space.has_property(space.top(), Property::Checked));
        assert!(!space.has_property(space.bottom(), Property::Checked));
    }

    #[test]
    fn seed_sets_stay_minimal() {
        let mut space = space_3x3();
        space.put_property(space.id_of(&[2, 2]), Property::KAnonymous);
        space.put_property(space.id_of(&[1, 1]), Property::KAnonymous);
        // The (2,2) seed is implied by (1,1) and must be dropped.
        assert_eq!(space.seeds[Property::KAnonymous.index()], vec![space.id_of(&[1, 1])]);
        // Adding an implied node changes nothing.
        space.put_property(space.id_of(&[2, 1]), Property::KAnonymous);
        assert_eq!(space.seeds[Property::KAnonymous.index()], vec![space.id_of(&[1, 1])]);
    }

    #[test]
    fn unsafe_level_enumerates_exactly_the_level() {
        let space = space_3x3();
        assert_eq!(space.unsafe_level(0).len(), 1);
        assert_eq!(space.unsafe_level(1).len(), 2);
        assert_eq!(space.unsafe_level(2).len(), 3);
        assert_eq!(space.unsafe_level(3).len(), 2);
        assert_eq!(space.unsafe_level(4).len(), 1);
        for level in 0..=4 {
            for id in space.unsafe_level(level) {
                assert_eq!(space.level_of(id), level);
            }
        }
    }

    #[test]
    fn materialized_iteration_preserves_insertion_order() {
        let mut space = space_3x3();
        let a = space.id_of(&[2, 0]);
        let b = space.id_of(&[0, 1]);
        space.put_property(a, Property::Visited);
        space.put_property(b, Property::Visited);
        space.put_property(a, Property::Checked);
        assert_eq!(space.materialized(), &[a, b]);
    }

    #[test]
    fn rejects_too_many_dimensions() {
        let mins = vec![0u32; 16];
        let maxs = vec![1u32; 16];
        let err = SolutionSpace::new(&mins, &maxs).unwrap_err();
        assert!(err.to_string().contains("too many quasi-identifiers"));
    }

    #[test]
    fn rejects_min_above_max() {
        assert!(SolutionSpace::new(&[1], &[0]).is_err());
    }

    #[test]
    fn loss_cells_store_and_return() {
        let mut space = space_3x3();
        let id = space.id_of(&[1, 2]);
        assert_eq!(space.information_loss(id), None);
        space.set_information_loss(id, InformationLoss::new(2.0));
        space.set_lower_bound(id, InformationLoss::new(1.5));
        assert_eq!(space.information_loss(id), Some(InformationLoss::new(2.0)));
        assert_eq!(space.lower_bound(id), Some(InformationLoss::new(1.5)));
    }
}
