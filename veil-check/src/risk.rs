//! Re-identification risk models.
//!
//! Two independent pieces live here:
//!
//! - [`RiskModelStackelberg`]: the publisher/attacker game behind the
//!   publisher-payout metric. The attacker mounts an attack only when the
//!   expected gain exceeds the cost; the publisher's payout shrinks with
//!   information loss and, under attack, with the attacker's success
//!   probability.
//! - [`RiskEstimator`]: disclosure-risk measures over an equivalence-class
//!   partition, including the population-uniques estimate with the
//!   Dankar et al. model-selection rule (Pitman, Zayatz, SNB) and
//!   NaN-driven fallback between the models.

use veil_core::error::{Error, Result};

use crate::groupify::HashGroupify;

/// The Stackelberg game of the publisher-payout metric.
#[derive(Clone, Copy, Debug)]
pub struct RiskModelStackelberg {
    publisher_benefit: f64,
    attacker_cost: f64,
}

impl RiskModelStackelberg {
    /// Create a model from the publisher's benefit per unmodified record
    /// and the attacker's cost per attempt.
    pub fn new(publisher_benefit: f64, attacker_cost: f64) -> Self {
        Self {
            publisher_benefit,
            attacker_cost,
        }
    }

    /// The attacker's expected payout at success probability `p`. The gain
    /// of a successful re-identification equals the publisher's benefit.
    pub fn expected_attacker_payout(&self, success_probability: f64) -> f64 {
        success_probability * self.publisher_benefit - self.attacker_cost
    }

    /// The publisher's expected payout for a record with the given
    /// information loss and attacker success probability. A rational
    /// attacker with non-positive expected payout does not attack.
    pub fn expected_publisher_payout(
        &self,
        information_loss: f64,
        success_probability: f64,
    ) -> f64 {
        let benefit = self.publisher_benefit * (1.0 - information_loss);
        if self.expected_attacker_payout(success_probability) > 0.0 {
            benefit * (1.0 - success_probability * self.attacker_cost / self.publisher_benefit)
        } else {
            benefit
        }
    }
}

/// Disclosure-risk measures over an equivalence-class partition.
#[derive(Clone, Debug)]
pub struct RiskEstimator {
    /// (class size, number of classes of that size), ascending by size.
    histogram: Vec<(u32, u32)>,
    num_rows: u64,
    num_classes: u64,
    sampling_fraction: f64,
    exclude_snb: bool,
}

impl RiskEstimator {
    /// Build an estimator from a groupified partition.
    ///
    /// `sampling_fraction` is the ratio of sample size to population size;
    /// values outside `(0, 1]` fall back to the default 0.1.
    pub fn from_groupify(groupify: &HashGroupify, sampling_fraction: f64) -> Self {
        let sampling_fraction = if sampling_fraction <= 0.0 || sampling_fraction > 1.0 {
            0.1
        } else {
            sampling_fraction
        };
        let mut sizes: Vec<u32> = groupify
            .ordered()
            .filter(|entry| entry.count > 0)
            .map(|entry| entry.count)
            .collect();
        sizes.sort_unstable();
        let mut histogram: Vec<(u32, u32)> = Vec::new();
        for size in sizes {
            match histogram.last_mut() {
                Some((s, frequency)) if *s == size => *frequency += 1,
                _ => histogram.push((size, 1)),
            }
        }
        let num_classes = histogram.iter().map(|&(_, f)| f as u64).sum();
        Self {
            histogram,
            num_rows: groupify.rows(),
            num_classes,
            sampling_fraction,
            exclude_snb: true,
        }
    }

    /// Include or exclude the SNB model from the selection rule.
    pub fn set_exclude_snb(&mut self, exclude: bool) {
        self.exclude_snb = exclude;
    }

    /// Number of classes of the given size.
    pub fn frequency_of(&self, size: u32) -> u32 {
        self.histogram
            .binary_search_by_key(&size, |&(s, _)| s)
            .map(|i| self.histogram[i].1)
            .unwrap_or(0)
    }

    /// Size of the smallest class; 0 when the partition is empty.
    pub fn minimal_class_size(&self) -> u32 {
        self.histogram.first().map_or(0, |&(size, _)| size)
    }

    /// Size of the largest class; 0 when the partition is empty.
    pub fn maximal_class_size(&self) -> u32 {
        self.histogram.last().map_or(0, |&(size, _)| size)
    }

    /// Average per-record risk: the probability of re-identifying a random
    /// record knowing only its class, `num_classes / num_rows`.
    pub fn equivalence_class_risk(&self) -> f64 {
        if self.num_rows == 0 {
            return f64::NAN;
        }
        self.num_classes as f64 / self.num_rows as f64
    }

    /// The risk of the most exposed record, `1 / c_min`.
    pub fn highest_individual_risk(&self) -> f64 {
        let c_min = self.minimal_class_size();
        if c_min == 0 {
            return f64::NAN;
        }
        1.0 / c_min as f64
    }

    /// Number of records carrying the highest individual risk.
    pub fn highest_risk_affected(&self) -> f64 {
        let c_min = self.minimal_class_size();
        if c_min == 0 {
            return f64::NAN;
        }
        (self.frequency_of(c_min) as u64 * c_min as u64) as f64
    }

    /// Fraction of records that are unique in the sample.
    pub fn sample_uniques_risk(&self) -> f64 {
        if self.num_rows == 0 {
            return f64::NAN;
        }
        self.frequency_of(1) as f64 / self.num_rows as f64
    }

    /// Estimated fraction of records that are unique in the population.
    ///
    /// Model selection follows Dankar et al.: a sample whose uniques have
    /// no size-2 companions goes straight to Zayatz; otherwise Pitman is
    /// preferred for sampling fractions up to 0.1 and Zayatz above, each
    /// falling back to the other on NaN. With the SNB model included, the
    /// high-fraction branch compares Zayatz and SNB and keeps the smaller
    /// finite value, falling back to Pitman when both fail. A sample
    /// without uniques has no population uniques to estimate.
    pub fn population_uniques_risk(&self) -> Result<f64> {
        let u1 = self.frequency_of(1);
        let u2 = self.frequency_of(2);

        if u1 > 0 && u2 == 0 {
            return Ok(self.zayatz());
        }
        if u1 == 0 {
            return Err(Error::precondition(
                "the sample contains no uniques; population uniques cannot be estimated",
            ));
        }

        if self.exclude_snb {
            let risk = if self.sampling_fraction <= 0.1 {
                let pitman = self.pitman();
                if pitman.is_nan() {
                    self.zayatz()
                } else {
                    pitman
                }
            } else {
                let zayatz = self.zayatz();
                if zayatz.is_nan() {
                    self.pitman()
                } else {
                    zayatz
                }
            };
            return Ok(risk);
        }

        if self.sampling_fraction <= 0.1 {
            let pitman = self.pitman();
            if pitman.is_nan() {
                return Ok(self.zayatz());
            }
            return Ok(pitman);
        }

        let zayatz = self.zayatz();
        let snb = self.snb();
        match (zayatz.is_nan(), snb.is_nan()) {
            (true, true) => Ok(self.pitman()),
            (true, false) => Ok(snb),
            (false, true) => Ok(zayatz),
            (false, false) => Ok(zayatz.min(snb)),
        }
    }

    /// Pitman-style estimate via the Ewens partition approximation: solve
    /// `u = theta * ln(1 + n/theta)` for theta by Newton iteration, then
    /// extrapolate the singleton rate to the population. Diverges (NaN)
    /// when the class count approaches the row count.
    fn pitman(&self) -> f64 {
        let n = self.num_rows as f64;
        let u = self.num_classes as f64;
        if u <= 0.0 || u >= n {
            return f64::NAN;
        }
        let mut theta = u;
        for _ in 0..100 {
            let f = theta * (1.0 + n / theta).ln() - u;
            let df = (1.0 + n / theta).ln() - n / (theta + n);
            if df.abs() < f64::EPSILON {
                return f64::NAN;
            }
            let next = theta - f / df;
            if !next.is_finite() || next <= 0.0 {
                return f64::NAN;
            }
            if (next - theta).abs() < 1e-9 * theta.max(1.0) {
                theta = next;
                break;
            }
            theta = next;
        }
        if !theta.is_finite() {
            return f64::NAN;
        }
        let population = n / self.sampling_fraction;
        theta / (theta + population - 1.0)
    }

    /// Zayatz-style estimate: the probability that a sample unique is a
    /// population unique, via binomial sampling and the empirical
    /// class-size prior.
    fn zayatz(&self) -> f64 {
        let u = self.num_classes as f64;
        let u1 = self.frequency_of(1) as f64;
        let n = self.num_rows as f64;
        if u <= 0.0 || n <= 0.0 {
            return f64::NAN;
        }
        let pi = self.sampling_fraction;
        let mut denominator = 0.0;
        for &(size, frequency) in &self.histogram {
            let prior = frequency as f64 / u;
            let likelihood = size as f64 * pi * (1.0 - pi).powi(size as i32 - 1);
            denominator += prior * likelihood;
        }
        if denominator <= 0.0 {
            return f64::NAN;
        }
        let conditional = (pi * (u1 / u)) / denominator;
        u1 * conditional / n
    }

    /// SNB-style estimate: the sample-unique rate shrunk by the
    /// doubleton-to-singleton ratio. Undefined (NaN) without doubletons.
    fn snb(&self) -> f64 {
        let u1 = self.frequency_of(1) as f64;
        let u2 = self.frequency_of(2) as f64;
        let n = self.num_rows as f64;
        if u1 <= 0.0 || u2 <= 0.0 || n <= 0.0 {
            return f64::NAN;
        }
        let pi = self.sampling_fraction;
        (u1 / n) / (1.0 + ((1.0 - pi) / pi) * (2.0 * u2 / u1))
    }
}
