//! End-to-end scenarios for the FLASH search.
//!
//! These tests drive the full pipeline: encode a table, validate a
//! configuration, traverse the lattice, and render output.

use veil_core::config::{AnonymizationConfig, MetricKind, Monotonicity, PrivacyCriterion};
use veil_core::data::{AttributeSpec, DataManager};
use veil_core::error::Error;
use veil_core::progress::{CheckEvent, NoopProgress, ProgressSink};
use veil_flash::anonymize;

/// Opt-in log output for debugging: `RUST_LOG=debug cargo test`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Counts check events for traversal-size assertions.
#[derive(Default)]
struct CountingProgress {
    events: Vec<CheckEvent>,
    finished_checks: Option<usize>,
}

impl ProgressSink for CountingProgress {
    fn node_checked(&mut self, event: &CheckEvent) {
        self.events.push(event.clone());
    }

    fn finished(&mut self, checks: usize) {
        self.finished_checks = Some(checks);
    }
}

fn rows(values: &[&[&str]]) -> Vec<Vec<String>> {
    values
        .iter()
        .map(|row| row.iter().map(|s| s.to_string()).collect())
        .collect()
}

fn labels(values: &[&[&str]]) -> Vec<Vec<String>> {
    rows(values)
}

/// 4 rows, one QI "age" with a two-level hierarchy.
fn small_manager() -> DataManager {
    DataManager::from_rows(
        vec![AttributeSpec::quasi_identifying(
            "age",
            labels(&[&["25", "25*"], &["26", "25*"], &["51", "5*"], &["52", "5*"]]),
        )],
        &rows(&[&["25"], &["26"], &["51"], &["52"]]),
        None,
    )
    .unwrap()
}

/// 6 rows, two QIs with height-3 hierarchies, one sensitive attribute.
fn two_qi_manager() -> DataManager {
    let age = labels(&[
        &["25", "2*", "*"],
        &["26", "2*", "*"],
        &["27", "2*", "*"],
        &["51", "5*", "*"],
        &["52", "5*", "*"],
    ]);
    let zip = labels(&[
        &["47906", "479*", "*"],
        &["47905", "479*", "*"],
        &["13053", "130*", "*"],
        &["13068", "130*", "*"],
    ]);
    DataManager::from_rows(
        vec![
            AttributeSpec::quasi_identifying("age", age),
            AttributeSpec::quasi_identifying("zip", zip),
            AttributeSpec::sensitive("diagnosis"),
        ],
        &rows(&[
            &["25", "47906", "flu"],
            &["25", "47906", "cold"],
            &["26", "47905", "flu"],
            &["27", "47905", "angina"],
            &["51", "13053", "flu"],
            &["52", "13068", "cold"],
        ]),
        None,
    )
    .unwrap()
}

fn k2_config() -> AnonymizationConfig {
    AnonymizationConfig {
        criteria: vec![PrivacyCriterion::KAnonymity { k: 2 }],
        ..Default::default()
    }
}

#[test]
fn single_qi_search_finds_level_one() {
    let manager = small_manager();
    let result = anonymize(&manager, &k2_config(), &mut NoopProgress).unwrap();

    let optimum = result.optimum.expect("a solution exists");
    assert_eq!(optimum.levels, vec![1]);
    assert!((optimum.loss.value() - 2.0).abs() < 1e-12);

    let output = result.output.expect("solution implies output");
    let ages: Vec<&str> = output.iter().map(|row| row[0].as_str()).collect();
    assert_eq!(ages, vec!["25*", "25*", "5*", "5*"]);
}

#[test]
fn two_qi_search_finds_minimal_loss_node() {
    init_tracing();
    let manager = two_qi_manager();
    let mut progress = CountingProgress::default();
    let result = anonymize(&manager, &k2_config(), &mut progress).unwrap();

    // The 3x3 lattice has 9 nodes; nothing may be checked twice.
    assert!(result.checks <= 9);
    assert_eq!(progress.finished_checks, Some(result.checks));
    assert_eq!(progress.events.len(), result.checks);

    // (1,1) dominates all other anonymous nodes on entropy loss.
    let optimum = result.optimum.expect("a solution exists");
    assert_eq!(optimum.levels, vec![1, 1]);
    let anonymous_events: Vec<&CheckEvent> =
        progress.events.iter().filter(|e| e.anonymous).collect();
    assert!(!anonymous_events.is_empty());
    for event in anonymous_events {
        assert!(optimum.loss <= event.loss);
    }
}

#[test]
fn suppression_budget_changes_the_optimum() {
    // Three rows of one class, one singleton. With a one-row budget the
    // singleton is suppressed at level 1 instead of forcing level 2.
    let manager = DataManager::from_rows(
        vec![AttributeSpec::quasi_identifying(
            "age",
            labels(&[&["25", "25*"], &["26", "25*"], &["51", "5*"], &["52", "5*"]]),
        )],
        &rows(&[&["25"], &["26"], &["51"], &["25"]]),
        None,
    )
    .unwrap();
    let config = AnonymizationConfig {
        allowed_outliers: 0.3,
        ..k2_config()
    };
    let result = anonymize(&manager, &config, &mut NoopProgress).unwrap();

    let optimum = result.optimum.expect("a solution exists");
    assert_eq!(optimum.levels, vec![1]);
    // Non-outlier class: 3 rows at loss 0.5; outlier: 1 row at loss 1.
    assert!((optimum.loss.value() - 2.5).abs() < 1e-12);

    let output = result.output.expect("solution implies output");
    assert_eq!(output[0][0], "25*");
    assert_eq!(output[1][0], "25*");
    assert_eq!(output[2][0], "*");
    assert_eq!(output[3][0], "25*");
}

#[test]
fn publisher_payout_search_under_partial_monotonicity() {
    let manager = small_manager();
    let config = AnonymizationConfig {
        metric: MetricKind::PublisherPayout,
        monotonicity: Monotonicity::Partial,
        ..k2_config()
    };
    let result = anonymize(&manager, &config, &mut NoopProgress).unwrap();

    // Level 1: two classes of two, class loss 0.5, p = 1/2.
    // Payout per record: 1200 * 0.5 * (1 - 0.5 * 4/1200) = 599.
    // Total: 2 classes * 2 rows * (1200 - 599) = 2404.
    let optimum = result.optimum.expect("a solution exists");
    assert_eq!(optimum.levels, vec![1]);
    assert!((optimum.loss.value() - 2404.0).abs() < 1e-9);
}

#[test]
fn unsatisfiable_criteria_yield_no_solution() {
    // Every row shares one diagnosis: no node is 2-diverse.
    let manager = DataManager::from_rows(
        vec![
            AttributeSpec::quasi_identifying(
                "age",
                labels(&[&["25", "25*"], &["26", "25*"], &["51", "5*"], &["52", "5*"]]),
            ),
            AttributeSpec::sensitive("diagnosis"),
        ],
        &rows(&[
            &["25", "flu"],
            &["26", "flu"],
            &["51", "flu"],
            &["52", "flu"],
        ]),
        None,
    )
    .unwrap();
    let config = AnonymizationConfig {
        criteria: vec![
            PrivacyCriterion::KAnonymity { k: 2 },
            PrivacyCriterion::DistinctLDiversity { attribute: 0, l: 2 },
        ],
        monotonicity: Monotonicity::Partial,
        ..Default::default()
    };
    let result = anonymize(&manager, &config, &mut NoopProgress).unwrap();
    assert!(!result.has_solution());
    assert!(result.output.is_none());
}

#[test]
fn identifying_columns_render_as_marker() {
    let manager = DataManager::from_rows(
        vec![
            AttributeSpec::identifying("name"),
            AttributeSpec::quasi_identifying(
                "age",
                labels(&[&["25", "25*"], &["26", "25*"], &["51", "5*"], &["52", "5*"]]),
            ),
            AttributeSpec::insensitive("note"),
        ],
        &rows(&[
            &["alice", "25", "a"],
            &["bob", "26", "b"],
            &["carol", "51", "c"],
            &["dan", "52", "d"],
        ]),
        None,
    )
    .unwrap();
    let result = anonymize(&manager, &k2_config(), &mut NoopProgress).unwrap();
    let output = result.output.expect("solution implies output");
    assert_eq!(output[0], vec!["*", "25*", "a"]);
    assert_eq!(output[3], vec!["*", "5*", "d"]);
}

#[test]
fn sixteen_quasi_identifiers_fail_before_any_search() {
    let attributes: Vec<AttributeSpec> = (0..16)
        .map(|i| {
            AttributeSpec::quasi_identifying(format!("qi{i}"), labels(&[&["0"], &["1"]]))
        })
        .collect();
    let row: Vec<String> = (0..16).map(|_| "0".to_string()).collect();
    let manager = DataManager::from_rows(attributes, &[row], None).unwrap();

    let mut progress = CountingProgress::default();
    let config = AnonymizationConfig {
        criteria: vec![PrivacyCriterion::KAnonymity { k: 1 }],
        ..Default::default()
    };
    let err = anonymize(&manager, &config, &mut progress).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
    assert!(err.to_string().contains("too many quasi-identifiers"));
    // Nothing ran.
    assert!(progress.events.is_empty());
    assert!(progress.finished_checks.is_none());
}

#[test]
fn invalid_parameters_are_configuration_errors() {
    let manager = small_manager();

    let bad_outliers = AnonymizationConfig {
        allowed_outliers: 1.0,
        ..k2_config()
    };
    assert!(matches!(
        anonymize(&manager, &bad_outliers, &mut NoopProgress),
        Err(Error::Configuration(_))
    ));

    let bad_k = AnonymizationConfig {
        criteria: vec![PrivacyCriterion::KAnonymity { k: 5 }],
        ..Default::default()
    };
    assert!(matches!(
        anonymize(&manager, &bad_k, &mut NoopProgress),
        Err(Error::Configuration(_))
    ));

    let bad_snapshot = AnonymizationConfig {
        snapshot_size_dataset: 1.0,
        ..k2_config()
    };
    assert!(matches!(
        anonymize(&manager, &bad_snapshot, &mut NoopProgress),
        Err(Error::Configuration(_))
    ));

    let bad_levels = AnonymizationConfig {
        min_levels: vec![1],
        max_levels: vec![4],
        ..k2_config()
    };
    assert!(matches!(
        anonymize(&manager, &bad_levels, &mut NoopProgress),
        Err(Error::Configuration(_))
    ));

    let missing_sensitive = AnonymizationConfig {
        criteria: vec![PrivacyCriterion::DistinctLDiversity { attribute: 0, l: 2 }],
        ..Default::default()
    };
    assert!(matches!(
        anonymize(&manager, &missing_sensitive, &mut NoopProgress),
        Err(Error::Configuration(_))
    ));
}

#[test]
fn level_restrictions_narrow_the_search() {
    let manager = two_qi_manager();
    let config = AnonymizationConfig {
        min_levels: vec![2, 0],
        max_levels: vec![2, 2],
        ..k2_config()
    };
    let result = anonymize(&manager, &config, &mut NoopProgress).unwrap();
    let optimum = result.optimum.expect("a solution exists");
    // Age is pinned to level 2; (2,1) is the cheapest anonymous node left.
    assert_eq!(optimum.levels, vec![2, 1]);
}
