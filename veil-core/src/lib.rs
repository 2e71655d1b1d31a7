//! # Veil Core
//!
//! Core types for the veil anonymization engine.
//!
//! This crate provides:
//! - Dictionary-encoded data views (`DataManager`, `DataMatrix`)
//! - Generalization hierarchies and domain shares
//! - The solution-space lattice with predictive properties
//! - The run configuration and the progress-sink capability
//!
//! ## Design Principles
//!
//! 1. **Dense codes everywhere**: strings are interned once; the search
//!    path only touches `u32` codes
//! 2. **Arena-style ownership**: the lattice owns all per-node state;
//!    callers hold plain `u64` identifiers, never references into it
//! 3. **Determinism**: neighbor enumeration, property propagation, and
//!    level enumeration are pure functions of the inputs

pub mod config;
pub mod data;
pub mod dictionary;
pub mod error;
pub mod hierarchy;
pub mod lattice;
pub mod loss;
pub mod progress;

// Re-export main types
pub use config::{AnonymizationConfig, AttackerModel, MetricKind, Monotonicity, PrivacyCriterion};
pub use data::{AttributeRole, AttributeSpec, DataManager, DataMatrix};
pub use dictionary::Dictionary;
pub use error::{Error, Result};
pub use hierarchy::{DomainShare, GeneralizationHierarchy};
pub use lattice::{Direction, Property, SolutionSpace, Transformation, MAX_DIMENSIONS};
pub use loss::InformationLoss;
pub use progress::{CheckEvent, NoopProgress, ProgressSink};
