//! Utility metrics.
//!
//! Both metrics share the entropy-based per-class information loss: the
//! product of the domain shares of the class key, log-normalized into
//! `[0, 1]` (0 at the identity transformation, 1 at full generalization).
//!
//! The entropy metric charges each record its class loss; the publisher
//! payout metric prices each record through the Stackelberg game of
//! [`RiskModelStackelberg`]. Every metric also produces a lower bound that
//! assumes no attacker success and no suppression, which is monotone along
//! lattice ascents and drives UP-directional pruning.

use veil_core::config::{AnonymizationConfig, AttackerModel, MetricKind};
use veil_core::hierarchy::{DomainShare, GeneralizationHierarchy};
use veil_core::lattice::Transformation;
use veil_core::loss::InformationLoss;

use crate::groupify::{GroupEntry, HashGroupify};
use crate::risk::RiskModelStackelberg;

/// A realized loss together with its lower bound.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LossWithBound {
    pub loss: InformationLoss,
    pub bound: InformationLoss,
}

/// Initialized metric state for one anonymization run.
#[derive(Clone, Debug)]
pub struct MetricState {
    kind: MetricKind,
    shares: Vec<DomainShare>,
    /// `log10` of the product of level-0 domain sizes.
    max_il: f64,
    generalization_factor: f64,
    suppression_factor: f64,
    rows: u64,
    risk: RiskModelStackelberg,
    journalist: bool,
    publisher_benefit: f64,
}

impl MetricState {
    /// Initialize the metric from the configuration and the QI hierarchies.
    pub fn new(
        config: &AnonymizationConfig,
        hierarchies: &[GeneralizationHierarchy],
        rows: u64,
    ) -> Self {
        let shares: Vec<DomainShare> =
            hierarchies.iter().map(DomainShare::from_hierarchy).collect();
        let mut max_il = 1.0;
        for share in &shares {
            max_il *= share.domain_size() as f64;
        }
        let max_il = max_il.log10();

        let gs = config.gs_factor;
        let generalization_factor = if gs < 0.5 { 2.0 * gs } else { 1.0 };
        let suppression_factor = if gs > 0.5 { 2.0 * (1.0 - gs) } else { 1.0 };

        Self {
            kind: config.metric,
            shares,
            max_il,
            generalization_factor,
            suppression_factor,
            rows,
            risk: RiskModelStackelberg::new(config.publisher_benefit, config.attacker_cost),
            journalist: config.attacker_model == AttackerModel::Journalist,
            publisher_benefit: config.publisher_benefit,
        }
    }

    /// The generalization weight derived from the gs factor.
    pub fn generalization_factor(&self) -> f64 {
        self.generalization_factor
    }

    /// The suppression weight derived from the gs factor.
    pub fn suppression_factor(&self) -> f64 {
        self.suppression_factor
    }

    /// Entropy-based information loss of one class, in `[0, 1]`.
    pub fn entropy_information_loss(
        &self,
        transformation: &Transformation,
        entry: &GroupEntry,
    ) -> f64 {
        if self.max_il == 0.0 {
            return 0.0;
        }
        let mut product = 1.0;
        for (dimension, share) in self.shares.iter().enumerate() {
            let value = entry.key[dimension];
            let level = transformation.levels()[dimension] as usize;
            product *= share.share(value, level);
        }
        product.log10() / self.max_il + 1.0
    }

    /// The attacker's success probability for a class. The journalist model
    /// uses the population count and silently defaults to the prosecutor
    /// model when no population data is present.
    fn success_probability(&self, entry: &GroupEntry) -> f64 {
        if !self.journalist || entry.pcount == 0 {
            1.0 / entry.count as f64
        } else {
            1.0 / entry.pcount as f64
        }
    }

    /// Realized loss and lower bound of a transformation over its classes.
    /// Classes are reduced in insertion order.
    pub fn information_loss(
        &self,
        transformation: &Transformation,
        groupify: &HashGroupify,
    ) -> LossWithBound {
        match self.kind {
            MetricKind::EntropyLoss => self.entropy_loss(transformation, groupify),
            MetricKind::PublisherPayout => self.publisher_payout(transformation, groupify),
        }
    }

    fn entropy_loss(
        &self,
        transformation: &Transformation,
        groupify: &HashGroupify,
    ) -> LossWithBound {
        let g = self.generalization_factor;
        let s = self.suppression_factor;
        let mut real = 0.0;
        let mut bound = 0.0;
        for entry in groupify.ordered() {
            if entry.count == 0 {
                continue;
            }
            let count = entry.count as f64;
            let loss = self.entropy_information_loss(transformation, entry);
            real += if entry.is_not_outlier {
                g * count * loss
            } else {
                s * count
            };
            bound += g * count * loss;
        }
        LossWithBound {
            loss: InformationLoss::new(real),
            bound: InformationLoss::new(bound),
        }
    }

    fn publisher_payout(
        &self,
        transformation: &Transformation,
        groupify: &HashGroupify,
    ) -> LossWithBound {
        let g = self.generalization_factor;
        let s = self.suppression_factor;
        let max_payout = self.publisher_benefit;
        let mut real = 0.0;
        let mut bound = 0.0;
        for entry in groupify.ordered() {
            if entry.count == 0 {
                continue;
            }
            let count = entry.count as f64;
            let success_probability = self.success_probability(entry);
            let loss = self.entropy_information_loss(transformation, entry);
            let real_payout = self.risk.expected_publisher_payout(loss, success_probability);
            let bound_payout = self.risk.expected_publisher_payout(loss, 0.0);
            real += if entry.is_not_outlier {
                g * count * (max_payout - real_payout)
            } else {
                s * count * max_payout
            };
            bound += g * count * (max_payout - bound_payout);
        }
        LossWithBound {
            loss: InformationLoss::new(real),
            bound: InformationLoss::new(bound),
        }
    }

    /// The maximum loss any transformation can realize.
    pub fn max_information_loss(&self) -> InformationLoss {
        match self.kind {
            MetricKind::EntropyLoss => InformationLoss::new(self.rows as f64),
            MetricKind::PublisherPayout => {
                InformationLoss::new(self.rows as f64 * self.publisher_benefit)
            }
        }
    }

    /// The minimum loss any transformation can realize.
    pub fn min_information_loss(&self) -> InformationLoss {
        InformationLoss::ZERO
    }
}
