//! The node checker.
//!
//! [`NodeChecker`] materializes the equivalence-class partition of a
//! candidate transformation (from the base data or from a stored snapshot
//! of an ancestor), evaluates the privacy criteria with the outlier budget,
//! computes the metric, and records the resulting predictive properties and
//! loss cells on the lattice. Its groupifier buffers are reused across
//! checks.

use veil_core::config::AnonymizationConfig;
use veil_core::data::DataManager;
use veil_core::lattice::{Property, SolutionSpace, Transformation};
use veil_core::loss::InformationLoss;

use crate::criteria::{class_satisfies, CriteriaContext};
use crate::distribution::Distribution;
use crate::groupify::HashGroupify;
use crate::history::History;
use crate::metric::MetricState;

/// Verdicts and losses of one checked transformation.
#[derive(Clone, Copy, Debug)]
pub struct NodeCheckResult {
    /// All criteria hold, up to the outlier budget.
    pub anonymous: bool,
    /// k-anonymity holds, up to the outlier budget.
    pub k_anonymous: bool,
    /// Realized information loss.
    pub loss: InformationLoss,
    /// Lower bound on the loss of this node and all its ancestors.
    pub bound: InformationLoss,
    /// Number of equivalence classes.
    pub classes: usize,
    /// Number of suppressed rows.
    pub suppressed: u64,
}

/// Checks candidate transformations against data, criteria, and metric.
pub struct NodeChecker<'a> {
    manager: &'a DataManager,
    config: &'a AnonymizationConfig,
    metric: MetricState,
    history: History,
    groupify: HashGroupify,
    global_distributions: Vec<Distribution>,
    budget: u64,
    k: Option<u32>,
    checked: usize,
}

impl<'a> NodeChecker<'a> {
    /// Create a checker for one run.
    pub fn new(manager: &'a DataManager, config: &'a AnonymizationConfig) -> Self {
        let rows = manager.rows();
        let data_se = manager.data_se();
        let mut global_distributions = vec![Distribution::new(); data_se.cols()];
        for row in 0..rows {
            for (attribute, distribution) in global_distributions.iter_mut().enumerate() {
                distribution.add(data_se.value(row, attribute), 1);
            }
        }
        Self {
            manager,
            config,
            metric: MetricState::new(config, manager.hierarchies(), rows as u64),
            history: History::new(
                config.history_size,
                config.snapshot_size_dataset,
                config.snapshot_size_snapshot,
            ),
            groupify: HashGroupify::with_capacity(rows),
            global_distributions,
            budget: (config.allowed_outliers * rows as f64).floor() as u64,
            k: config.k(),
            checked: 0,
        }
    }

    /// Number of checks performed so far.
    pub fn checked(&self) -> usize {
        self.checked
    }

    /// The metric state of this run.
    pub fn metric(&self) -> &MetricState {
        &self.metric
    }

    /// The absolute outlier budget.
    pub fn outlier_budget(&self) -> u64 {
        self.budget
    }

    /// Check one transformation and record its properties on the lattice.
    pub fn check(&mut self, space: &mut SolutionSpace, id: u64) -> NodeCheckResult {
        let transformation = space.transformation(id);
        let source_classes = self.groupify_node(space, &transformation);
        let stats = self.analyze();
        let losses = self.metric.information_loss(&transformation, &self.groupify);

        space.put_property(id, Property::Checked);
        if stats.anonymous {
            space.put_property(id, Property::Anonymous);
        } else {
            space.put_property(id, Property::NotAnonymous);
        }
        if stats.k_anonymous {
            space.put_property(id, Property::KAnonymous);
        } else {
            space.put_property(id, Property::NotKAnonymous);
        }
        space.set_information_loss(id, losses.loss);
        space.set_lower_bound(id, losses.bound);

        self.history.store(
            space,
            id,
            &self.groupify,
            self.manager.rows() as u64,
            source_classes,
        );
        self.checked += 1;
        tracing::debug!(
            node = id,
            classes = self.groupify.num_classes(),
            anonymous = stats.anonymous,
            loss = losses.loss.value(),
            "checked transformation"
        );

        NodeCheckResult {
            anonymous: stats.anonymous,
            k_anonymous: stats.k_anonymous,
            loss: losses.loss,
            bound: losses.bound,
            classes: self.groupify.num_classes(),
            suppressed: stats.suppressed,
        }
    }

    /// Build the partition of a transformation and report, per row, whether
    /// it belongs to a suppressed class. Used for output rendering.
    pub fn partition(&mut self, space: &SolutionSpace, id: u64) -> Vec<bool> {
        let transformation = space.transformation(id);
        self.groupify_fresh(&transformation);
        self.analyze();
        let rows = self.manager.rows();
        let mut suppressed = Vec::with_capacity(rows);
        for row in 0..rows {
            let key = self.generalized_key(&transformation, row);
            let entry = self.groupify.get(&key).expect("every row is grouped");
            suppressed.push(!entry.is_not_outlier);
        }
        suppressed
    }

    /// Groupify from the best snapshot, or from the base data; returns the
    /// source snapshot's class count when one was used.
    fn groupify_node(
        &mut self,
        space: &SolutionSpace,
        transformation: &Transformation,
    ) -> Option<usize> {
        let hierarchies = self.manager.hierarchies();
        let data_qi = self.manager.data_qi();
        let levels = transformation.levels();

        if let Some(snapshot) = self.history.find_ancestor(space, transformation.id()) {
            tracing::trace!(
                node = transformation.id(),
                source = snapshot.node,
                classes = snapshot.entries.len(),
                "groupifying from snapshot"
            );
            self.groupify.clear();
            for entry in &snapshot.entries {
                let row = entry.representative as usize;
                let key: Vec<u32> = hierarchies
                    .iter()
                    .enumerate()
                    .map(|(d, hierarchy)| hierarchy.map(data_qi.value(row, d), levels[d] as usize))
                    .collect();
                self.groupify.add_from_snapshot(
                    key,
                    entry.representative,
                    entry.count,
                    entry.pcount,
                    &entry.distributions,
                );
            }
            return Some(snapshot.entries.len());
        }

        self.groupify_fresh(transformation);
        None
    }

    fn groupify_fresh(&mut self, transformation: &Transformation) {
        self.groupify.clear();
        let data_se = self.manager.data_se();
        for row in 0..self.manager.rows() {
            let key = self.generalized_key(transformation, row);
            let pcount = self.manager.population_of(row);
            self.groupify
                .add_row(key, row as u32, pcount, data_se.row(row));
        }
    }

    fn generalized_key(&self, transformation: &Transformation, row: usize) -> Vec<u32> {
        let data_qi = self.manager.data_qi();
        self.manager
            .hierarchies()
            .iter()
            .enumerate()
            .map(|(d, hierarchy)| {
                hierarchy.map(data_qi.value(row, d), transformation.levels()[d] as usize)
            })
            .collect()
    }

    fn analyze(&mut self) -> crate::groupify::GroupStats {
        let criteria = &self.config.criteria;
        let context = CriteriaContext {
            rows: self.manager.rows() as u64,
            global_distributions: &self.global_distributions,
            sensitive_hierarchies: self.manager.sensitive_hierarchies(),
        };
        self.groupify.analyze(self.k, self.budget, |entry| {
            criteria
                .iter()
                .any(|criterion| !class_satisfies(criterion, entry, &context))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veil_core::config::PrivacyCriterion;
    use veil_core::data::AttributeSpec;

    fn rows(values: &[[&str; 2]]) -> Vec<Vec<String>> {
        values
            .iter()
            .map(|row| row.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    fn age_hierarchy_labels() -> Vec<Vec<String>> {
        [
            ["25", "25*", "*"],
            ["26", "25*", "*"],
            ["51", "5*", "*"],
            ["52", "5*", "*"],
        ]
        .iter()
        .map(|row| row.iter().map(|s| s.to_string()).collect())
        .collect()
    }

    fn manager() -> DataManager {
        DataManager::from_rows(
            vec![
                AttributeSpec::quasi_identifying("age", age_hierarchy_labels()),
                AttributeSpec::sensitive("diagnosis"),
            ],
            &rows(&[
                ["25", "flu"],
                ["26", "cold"],
                ["51", "flu"],
                ["52", "angina"],
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
    fn identity_is_not_two_anonymous_but_level_one_is() {
        let manager = manager();
        let config = k2_config();
        let mut space = SolutionSpace::new(&[0], &[2]).unwrap();
        let mut checker = NodeChecker::new(&manager, &config);

        let identity = space.id_of(&[0]);
        let result = checker.check(&mut space, identity);
        assert!(!result.anonymous);
        assert!(!result.k_anonymous);
        assert_eq!(result.classes, 4);
        assert!(space.has_property(identity, Property::Checked));
        assert!(space.has_property(identity, Property::NotAnonymous));
        assert!(space.has_property(identity, Property::NotKAnonymous));

        let level1 = space.id_of(&[1]);
        let result = checker.check(&mut space, level1);
        assert!(result.anonymous);
        assert!(result.k_anonymous);
        assert_eq!(result.classes, 2);
        assert!((result.loss.value() - 2.0).abs() < 1e-12);
        assert!(space.has_property(level1, Property::Anonymous));
        assert!(space.has_property(level1, Property::KAnonymous));
    }

    #[test]
    fn k_anonymity_is_monotone_along_ascents() {
        let manager = manager();
        let config = k2_config();
        let mut space = SolutionSpace::new(&[0], &[2]).unwrap();
        let mut checker = NodeChecker::new(&manager, &config);

        let mut last_k_anonymous = false;
        for level in 0..=2u32 {
            let node_id = space.id_of(&[level]);
            let result = checker.check(&mut space, node_id);
            // Once k-anonymous, every more general node stays k-anonymous.
            assert!(!last_k_anonymous || result.k_anonymous);
            last_k_anonymous = result.k_anonymous;
        }
        assert!(last_k_anonymous);
    }

    #[test]
    fn snapshot_rebuild_matches_fresh_scan() {
        let manager = manager();
        // Widen the admission thresholds: 2 classes over 4 rows would not
        // pass the default 0.2 dataset ratio.
        let config = AnonymizationConfig {
            snapshot_size_dataset: 0.9,
            snapshot_size_snapshot: 0.9,
            ..k2_config()
        };
        let mut space = SolutionSpace::new(&[0], &[2]).unwrap();

        // Fresh scan of level 2.
        let mut fresh = NodeChecker::new(&manager, &config);
        let level2_id = space.id_of(&[2]);
        let from_scratch = fresh.check(&mut space, level2_id);

        // Check level 1 first so level 2 is rebuilt from its snapshot.
        let mut space2 = SolutionSpace::new(&[0], &[2]).unwrap();
        let mut via_snapshot = NodeChecker::new(&manager, &config);
        let level1_id = space2.id_of(&[1]);
        via_snapshot.check(&mut space2, level1_id);
        assert!(via_snapshot.history.contains(space2.id_of(&[1])));
        let level2_id2 = space2.id_of(&[2]);
        let rebuilt = via_snapshot.check(&mut space2, level2_id2);

        assert_eq!(from_scratch.anonymous, rebuilt.anonymous);
        assert_eq!(from_scratch.classes, rebuilt.classes);
        assert_eq!(from_scratch.loss, rebuilt.loss);
        assert_eq!(from_scratch.bound, rebuilt.bound);
    }

    #[test]
    fn outlier_budget_suppresses_within_limit() {
        let manager = manager();
        // Budget of one row (0.25 * 4): still not enough for 4 singletons.
        let config = AnonymizationConfig {
            allowed_outliers: 0.25,
            ..k2_config()
        };
        let mut space = SolutionSpace::new(&[0], &[2]).unwrap();
        let mut checker = NodeChecker::new(&manager, &config);
        assert_eq!(checker.outlier_budget(), 1);

        let node_id = space.id_of(&[0]);
        let result = checker.check(&mut space, node_id);
        assert!(!result.anonymous);
        assert!(result.suppressed <= 1);
    }

    #[test]
    fn partition_flags_suppressed_rows() {
        // Three rows in one class, one singleton; budget covers the singleton.
        let manager = DataManager::from_rows(
            vec![
                AttributeSpec::quasi_identifying("age", age_hierarchy_labels()),
                AttributeSpec::sensitive("diagnosis"),
            ],
            &rows(&[
                ["25", "flu"],
                ["26", "cold"],
                ["51", "flu"],
                ["25", "angina"],
            ]),
            None,
        )
        .unwrap();
        let config = AnonymizationConfig {
            allowed_outliers: 0.3,
            ..k2_config()
        };
        let mut space = SolutionSpace::new(&[0], &[2]).unwrap();
        let mut checker = NodeChecker::new(&manager, &config);

        let level1 = space.id_of(&[1]);
        let result = checker.check(&mut space, level1);
        assert!(result.anonymous);
        assert_eq!(result.suppressed, 1);

        let suppressed = checker.partition(&space, level1);
        // Rows 0, 1, 3 share the 25* class; row 2 is the 5* singleton.
        assert_eq!(suppressed, vec![false, false, true, false]);
    }
}
