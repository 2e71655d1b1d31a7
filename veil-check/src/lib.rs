//! # Veil Check
//!
//! Node checking for the veil anonymization engine.
//!
//! This crate provides:
//! - The equivalence-class groupifier with insertion-order traversal
//! - The LRU snapshot history with relative-size admission
//! - Privacy-criterion evaluation (k-anonymity, l-diversity variants,
//!   t-closeness variants)
//! - Utility metrics (entropy loss, publisher payout) and risk models
//! - The [`NodeChecker`] orchestrating all of the above per lattice node
//!
//! Everything here is deterministic: class lists iterate in first-seen
//! order, distributions iterate in code order, and the groupifier hash is
//! fixed-seed.

pub mod checker;
pub mod criteria;
pub mod distribution;
pub mod groupify;
pub mod history;
pub mod metric;
pub mod risk;

// Re-export main types
pub use checker::{NodeCheckResult, NodeChecker};
pub use criteria::{class_satisfies, CriteriaContext};
pub use distribution::Distribution;
pub use groupify::{GroupEntry, GroupStats, HashGroupify};
pub use history::{History, Snapshot, SnapshotEntry};
pub use metric::{LossWithBound, MetricState};
pub use risk::{RiskEstimator, RiskModelStackelberg};
