//! The anonymizer front-end.
//!
//! [`anonymize`] validates the configuration against the data, builds the
//! solution space, checker, and strategy, runs the FLASH traversal, and
//! renders the result. All configuration faults are reported here, before
//! any lattice exists; the search itself cannot fail.

use std::time::Instant;

use veil_check::checker::NodeChecker;
use veil_core::config::{AnonymizationConfig, MetricKind, Monotonicity, PrivacyCriterion};
use veil_core::data::DataManager;
use veil_core::error::{Error, Result};
use veil_core::lattice::{SolutionSpace, MAX_DIMENSIONS};
use veil_core::progress::ProgressSink;

use crate::algorithm::traverse;
use crate::result::{render_output, AnonymizationResult, OptimalTransformation};
use crate::strategy::FlashStrategy;

/// Anonymize a dataset under a configuration, reporting progress to `sink`.
pub fn anonymize(
    manager: &DataManager,
    config: &AnonymizationConfig,
    sink: &mut dyn ProgressSink,
) -> Result<AnonymizationResult> {
    validate_configuration(manager, config)?;
    let (min_levels, max_levels) = resolve_levels(manager, config)?;

    let start = Instant::now();
    let mut space = SolutionSpace::new(&min_levels, &max_levels)?;
    space.set_anonymity_predictable(config.monotonicity == Monotonicity::Full);
    let mut checker = NodeChecker::new(manager, config);
    let strategy = FlashStrategy::new(&space, manager.hierarchies());

    let outcome = traverse(&mut space, &mut checker, &strategy, sink);
    let elapsed = start.elapsed();
    tracing::info!(
        checks = outcome.checks,
        elapsed_ms = elapsed.as_millis() as u64,
        optimum = ?outcome.optimum,
        "search finished"
    );

    match outcome.optimum {
        Some(id) => {
            let suppressed = checker.partition(&space, id);
            let transformation = space.transformation(id);
            let output = render_output(
                manager,
                &transformation,
                &suppressed,
                &config.suppression_marker,
            );
            let loss = space
                .information_loss(id)
                .ok_or_else(|| Error::other("optimum has no recorded loss"))?;
            Ok(AnonymizationResult {
                optimum: Some(OptimalTransformation {
                    id,
                    levels: transformation.levels().to_vec(),
                    loss,
                }),
                elapsed,
                checks: outcome.checks,
                output: Some(output),
            })
        }
        None => Ok(AnonymizationResult {
            optimum: None,
            elapsed,
            checks: outcome.checks,
            output: None,
        }),
    }
}

/// Validate a configuration against the data. Every fault found here is a
/// `ConfigurationError`; nothing downstream validates again.
pub fn validate_configuration(manager: &DataManager, config: &AnonymizationConfig) -> Result<()> {
    let rows = manager.rows() as u32;
    if rows == 0 {
        return Err(Error::configuration("the input table has no rows"));
    }

    if !(0.0..1.0).contains(&config.allowed_outliers) {
        return Err(Error::configuration(format!(
            "suppression rate {} must be in [0, 1)",
            config.allowed_outliers
        )));
    }

    let num_qis = manager.qi_indices().len();
    if num_qis == 0 {
        return Err(Error::configuration(
            "at least one quasi-identifier is required",
        ));
    }
    if num_qis > MAX_DIMENSIONS {
        return Err(Error::configuration(format!(
            "too many quasi-identifiers: {num_qis} (maximum {MAX_DIMENSIONS})"
        )));
    }

    let num_sensitive = manager.sensitive_indices().len();
    for criterion in &config.criteria {
        if let Some(attribute) = criterion.sensitive_attribute() {
            if num_sensitive == 0 {
                return Err(Error::configuration(
                    "this criterion requires a sensitive attribute",
                ));
            }
            if attribute >= num_sensitive {
                return Err(Error::configuration(format!(
                    "criterion references sensitive attribute {attribute}, but only {num_sensitive} are defined"
                )));
            }
        }
        match *criterion {
            PrivacyCriterion::KAnonymity { k } => {
                if k < 1 || k > rows {
                    return Err(Error::configuration(format!(
                        "group size k = {k} must be positive and at most the number of rows ({rows})"
                    )));
                }
            }
            PrivacyCriterion::DistinctLDiversity { l, .. }
            | PrivacyCriterion::EntropyLDiversity { l, .. } => {
                if l < 1 || l > rows {
                    return Err(Error::configuration(format!(
                        "diversity l = {l} must be positive and at most the number of rows ({rows})"
                    )));
                }
            }
            PrivacyCriterion::RecursiveCLDiversity { c, l, .. } => {
                if l < 1 || l > rows {
                    return Err(Error::configuration(format!(
                        "diversity l = {l} must be positive and at most the number of rows ({rows})"
                    )));
                }
                if c <= 0.0 {
                    return Err(Error::configuration(format!(
                        "recursive diversity factor c = {c} must be positive"
                    )));
                }
            }
            PrivacyCriterion::EqualTCloseness { t, .. } => {
                if !(t > 0.0 && t <= 1.0) {
                    return Err(Error::configuration(format!(
                        "closeness t = {t} must be in (0, 1]"
                    )));
                }
            }
            PrivacyCriterion::HierarchicalTCloseness { attribute, t } => {
                if !(t > 0.0 && t <= 1.0) {
                    return Err(Error::configuration(format!(
                        "closeness t = {t} must be in (0, 1]"
                    )));
                }
                if manager
                    .sensitive_hierarchies()
                    .get(attribute)
                    .map_or(true, |hierarchy| hierarchy.is_none())
                {
                    return Err(Error::configuration(
                        "hierarchical t-closeness requires a hierarchy on its sensitive attribute",
                    ));
                }
            }
        }
    }

    for hierarchy in manager.hierarchies() {
        if !hierarchy.is_monotonic() {
            return Err(Error::configuration(format!(
                "the hierarchy for attribute '{}' is not monotonic",
                hierarchy.name()
            )));
        }
    }

    if !(0.0..=1.0).contains(&config.gs_factor) {
        return Err(Error::configuration(format!(
            "gs factor {} must be in [0, 1]",
            config.gs_factor
        )));
    }
    for (name, value) in [
        ("snapshot size (dataset)", config.snapshot_size_dataset),
        ("snapshot size (snapshot)", config.snapshot_size_snapshot),
    ] {
        if !(value > 0.0 && value < 1.0) {
            return Err(Error::configuration(format!(
                "{name} {value} must be in (0, 1)"
            )));
        }
    }

    if config.metric == MetricKind::PublisherPayout {
        if config.publisher_benefit <= 0.0 {
            return Err(Error::configuration(format!(
                "publisher benefit {} must be positive",
                config.publisher_benefit
            )));
        }
        if config.attacker_cost < 0.0 {
            return Err(Error::configuration(format!(
                "attacker cost {} must not be negative",
                config.attacker_cost
            )));
        }
    }

    Ok(())
}

/// Resolve the configured level restrictions against hierarchy heights.
fn resolve_levels(
    manager: &DataManager,
    config: &AnonymizationConfig,
) -> Result<(Vec<u32>, Vec<u32>)> {
    let heights: Vec<u32> = manager
        .hierarchies()
        .iter()
        .map(|hierarchy| hierarchy.height() as u32)
        .collect();
    let dims = heights.len();

    let min_levels = if config.min_levels.is_empty() {
        vec![0; dims]
    } else {
        config.min_levels.clone()
    };
    let max_levels = if config.max_levels.is_empty() {
        heights.iter().map(|&height| height - 1).collect()
    } else {
        config.max_levels.clone()
    };

    if min_levels.len() != dims || max_levels.len() != dims {
        return Err(Error::configuration(format!(
            "level restrictions must name all {dims} quasi-identifiers"
        )));
    }
    for (d, ((&min, &max), &height)) in min_levels
        .iter()
        .zip(&max_levels)
        .zip(&heights)
        .enumerate()
    {
        let name = manager.hierarchies()[d].name();
        if max > height - 1 {
            return Err(Error::configuration(format!(
                "invalid maximum generalization for attribute '{name}': {max} > {}",
                height - 1
            )));
        }
        if min > max {
            return Err(Error::configuration(format!(
                "the minimum generalization for attribute '{name}' exceeds its maximum"
            )));
        }
    }
    Ok((min_levels, max_levels))
}
