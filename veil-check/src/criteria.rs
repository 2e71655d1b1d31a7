//! Privacy-criterion evaluation.
//!
//! Criteria are configuration data ([`PrivacyCriterion`]); this module
//! evaluates them against a single equivalence class, given the global
//! context (overall sensitive distributions, sensitive hierarchies). A node
//! is anonymous when every class passes every criterion, up to the outlier
//! budget handled by the groupifier.

use veil_core::config::PrivacyCriterion;
use veil_core::hierarchy::GeneralizationHierarchy;

use crate::distribution::Distribution;
use crate::groupify::GroupEntry;

/// Global inputs shared by all criterion evaluations.
#[derive(Debug)]
pub struct CriteriaContext<'a> {
    /// Total number of rows.
    pub rows: u64,
    /// Overall distribution per sensitive attribute.
    pub global_distributions: &'a [Distribution],
    /// Hierarchies of sensitive attributes, where declared.
    pub sensitive_hierarchies: &'a [Option<GeneralizationHierarchy>],
}

/// Whether a class satisfies a criterion.
pub fn class_satisfies(
    criterion: &PrivacyCriterion,
    entry: &GroupEntry,
    ctx: &CriteriaContext<'_>,
) -> bool {
    match *criterion {
        PrivacyCriterion::KAnonymity { k } => entry.count >= k,
        PrivacyCriterion::DistinctLDiversity { attribute, l } => {
            entry.distributions[attribute].distinct() >= l as usize
        }
        PrivacyCriterion::RecursiveCLDiversity { attribute, c, l } => {
            recursive_cl(&entry.distributions[attribute], c, l)
        }
        PrivacyCriterion::EntropyLDiversity { attribute, l } => {
            entropy(&entry.distributions[attribute]) >= (l as f64).ln()
        }
        PrivacyCriterion::EqualTCloseness { attribute, t } => {
            equal_distance_emd(
                &entry.distributions[attribute],
                &ctx.global_distributions[attribute],
            ) <= t
        }
        PrivacyCriterion::HierarchicalTCloseness { attribute, t } => {
            let hierarchy = ctx.sensitive_hierarchies[attribute]
                .as_ref()
                .expect("validated: hierarchical t-closeness needs a sensitive hierarchy");
            hierarchical_emd(
                &entry.distributions[attribute],
                &ctx.global_distributions[attribute],
                hierarchy,
            ) <= t
        }
    }
}

/// Recursive (c, l)-diversity: the most frequent value must not dominate
/// the tail, `f_1 < c * (f_l + ... + f_m)` over descending frequencies.
fn recursive_cl(distribution: &Distribution, c: f64, l: u32) -> bool {
    let mut frequencies: Vec<u32> = distribution.iter().map(|(_, count)| count).collect();
    if frequencies.len() < l as usize {
        return false;
    }
    frequencies.sort_unstable_by(|a, b| b.cmp(a));
    let tail: u64 = frequencies[(l as usize - 1)..]
        .iter()
        .map(|&f| f as u64)
        .sum();
    (frequencies[0] as f64) < c * tail as f64
}

/// Shannon entropy of a distribution, in nats.
fn entropy(distribution: &Distribution) -> f64 {
    let total = distribution.total() as f64;
    if total == 0.0 {
        return 0.0;
    }
    let mut entropy = 0.0;
    for (_, count) in distribution.iter() {
        let p = count as f64 / total;
        entropy -= p * p.ln();
    }
    entropy
}

/// Equal-distance earth mover's distance, `0.5 * sum |p_v - q_v|`.
///
/// Class values are always a subset of the global values, so iterating the
/// global distribution covers the union.
fn equal_distance_emd(class: &Distribution, global: &Distribution) -> f64 {
    let class_total = class.total() as f64;
    let global_total = global.total() as f64;
    if class_total == 0.0 || global_total == 0.0 {
        return 0.0;
    }
    let mut sum = 0.0;
    for (code, global_count) in global.iter() {
        let p = class.count_of(code) as f64 / class_total;
        let q = global_count as f64 / global_total;
        sum += (p - q).abs();
    }
    sum / 2.0
}

/// Hierarchical earth mover's distance over the sensitive hierarchy.
///
/// Net probability surplus is grouped level by level; each level's absolute
/// net flows are weighted `1/(2*(height-1))`, so a height-2 hierarchy
/// reduces to the equal-distance EMD.
fn hierarchical_emd(
    class: &Distribution,
    global: &Distribution,
    hierarchy: &GeneralizationHierarchy,
) -> f64 {
    let height = hierarchy.height();
    if height < 2 {
        return 0.0;
    }
    let class_total = class.total() as f64;
    let global_total = global.total() as f64;
    if class_total == 0.0 || global_total == 0.0 {
        return 0.0;
    }
    // Per-leaf surplus, code-ordered (global covers all class values).
    let extras: Vec<(u32, f64)> = global
        .iter()
        .map(|(code, global_count)| {
            let p = class.count_of(code) as f64 / class_total;
            let q = global_count as f64 / global_total;
            (code, p - q)
        })
        .collect();

    let mut cost = 0.0;
    for level in 0..height - 1 {
        let mut grouped: Vec<(u32, f64)> = extras
            .iter()
            .map(|&(leaf, surplus)| (hierarchy.map(leaf, level), surplus))
            .collect();
        grouped.sort_by_key(|&(code, _)| code);
        let mut i = 0;
        while i < grouped.len() {
            let code = grouped[i].0;
            let mut net = 0.0;
            while i < grouped.len() && grouped[i].0 == code {
                net += grouped[i].1;
                i += 1;
            }
            cost += net.abs();
        }
    }
    cost / (2.0 * (height - 1) as f64)
}
