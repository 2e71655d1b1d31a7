//! # Veil Flash
//!
//! FLASH lattice search and anonymizer front-end for the veil engine.
//!
//! This crate provides:
//! - The FLASH traversal strategy and two-phase algorithm
//! - The [`anonymize`] front-end with up-front configuration validation
//! - Result objects and output rendering with suppression markers
//! - The persisted lattice-state record format
//!
//! ## Example
//!
//! ```ignore
//! use veil_core::{AnonymizationConfig, DataManager, NoopProgress, PrivacyCriterion};
//! use veil_flash::anonymize;
//!
//! let config = AnonymizationConfig {
//!     criteria: vec![PrivacyCriterion::KAnonymity { k: 2 }],
//!     ..Default::default()
//! };
//! let result = anonymize(&manager, &config, &mut NoopProgress)?;
//! ```

pub mod algorithm;
pub mod anonymizer;
pub mod result;
pub mod state;
pub mod strategy;

// Re-export main types
pub use algorithm::{traverse, SearchOutcome};
pub use anonymizer::{anonymize, validate_configuration};
pub use result::{render_output, AnonymizationResult, OptimalTransformation};
pub use state::{export_state, from_json, import_state, to_json, CheckedNodeRecord, Verdict};
pub use strategy::FlashStrategy;
