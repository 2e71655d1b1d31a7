//! Anonymization configuration.
//!
//! The configuration is plain data: criteria and metric choices are
//! described here and evaluated elsewhere. Validation happens once in the
//! anonymizer front-end, before any lattice is built.

use serde::{Deserialize, Serialize};

/// Monotonicity of the combined privacy model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Monotonicity {
    /// All criteria are monotonic; the aggregate verdict propagates UP/DOWN.
    Full,
    /// Some criteria are monotonic; only the k-anonymity verdict propagates.
    Partial,
    /// No monotonicity is assumed.
    None,
}

/// Attacker model for the publisher-payout metric.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttackerModel {
    /// The attacker knows the victim is in the dataset.
    Prosecutor,
    /// The attacker only knows the victim is in a larger population.
    Journalist,
}

/// A privacy criterion, as data. Non-k criteria name the sensitive
/// attribute they apply to by its index in the sensitive attribute list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PrivacyCriterion {
    KAnonymity { k: u32 },
    DistinctLDiversity { attribute: usize, l: u32 },
    RecursiveCLDiversity { attribute: usize, c: f64, l: u32 },
    EntropyLDiversity { attribute: usize, l: u32 },
    EqualTCloseness { attribute: usize, t: f64 },
    HierarchicalTCloseness { attribute: usize, t: f64 },
}

impl PrivacyCriterion {
    /// The sensitive attribute this criterion evaluates, if any.
    pub fn sensitive_attribute(&self) -> Option<usize> {
        match *self {
            PrivacyCriterion::KAnonymity { .. } => None,
            PrivacyCriterion::DistinctLDiversity { attribute, .. }
            | PrivacyCriterion::RecursiveCLDiversity { attribute, .. }
            | PrivacyCriterion::EntropyLDiversity { attribute, .. }
            | PrivacyCriterion::EqualTCloseness { attribute, .. }
            | PrivacyCriterion::HierarchicalTCloseness { attribute, .. } => Some(attribute),
        }
    }
}

/// Utility metric selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricKind {
    /// Entropy-based information loss.
    EntropyLoss,
    /// Stackelberg-game publisher payout.
    PublisherPayout,
}

/// Full configuration of one anonymization run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnonymizationConfig {
    /// Maximum fraction of rows that may be suppressed, in `[0, 1)`.
    pub allowed_outliers: f64,
    /// Privacy criteria; a node is anonymous iff all of them hold.
    pub criteria: Vec<PrivacyCriterion>,
    /// Utility metric.
    pub metric: MetricKind,
    /// Declared monotonicity of the privacy model.
    pub monotonicity: Monotonicity,
    /// Attacker model for the publisher-payout metric.
    pub attacker_model: AttackerModel,
    /// Publisher benefit of an unmodified record (the maximum payout).
    pub publisher_benefit: f64,
    /// Attacker's cost per attempted re-identification.
    pub attacker_cost: f64,
    /// Generalization/suppression weighting factor in `[0, 1]`; 0.5 treats
    /// both equally.
    pub gs_factor: f64,
    /// Per-QI minimum generalization levels; empty means all zero.
    pub min_levels: Vec<u32>,
    /// Per-QI maximum generalization levels; empty means full heights.
    pub max_levels: Vec<u32>,
    /// Maximum number of snapshots kept in the history.
    pub history_size: usize,
    /// Maximum snapshot size relative to the dataset, in `(0, 1)`.
    pub snapshot_size_dataset: f64,
    /// Maximum snapshot size relative to its source snapshot, in `(0, 1)`.
    pub snapshot_size_snapshot: f64,
    /// Marker rendered for suppressed values.
    pub suppression_marker: String,
}

impl Default for AnonymizationConfig {
    fn default() -> Self {
        Self {
            allowed_outliers: 0.0,
            criteria: Vec::new(),
            metric: MetricKind::EntropyLoss,
            monotonicity: Monotonicity::Full,
            attacker_model: AttackerModel::Prosecutor,
            publisher_benefit: 1200.0,
            attacker_cost: 4.0,
            gs_factor: 0.5,
            min_levels: Vec::new(),
            max_levels: Vec::new(),
            history_size: 200,
            snapshot_size_dataset: 0.2,
            snapshot_size_snapshot: 0.8,
            suppression_marker: "*".to_string(),
        }
    }
}

impl AnonymizationConfig {
    /// The k of the k-anonymity criterion, if one is configured.
    pub fn k(&self) -> Option<u32> {
        self.criteria.iter().find_map(|criterion| match criterion {
            PrivacyCriterion::KAnonymity { k } => Some(*k),
            _ => None,
        })
    }
}
