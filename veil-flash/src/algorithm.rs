//! The FLASH traversal.
//!
//! Phase 1 walks the lattice levels bottom to top; every node without a
//! verdict spawns a greedy path to the top which is binary-searched for the
//! anonymity frontier. Under a fully monotonic privacy model the aggregate
//! verdict steers the search; otherwise the always-monotonic k-anonymity
//! verdict does, and the aggregate verdict stays local to checked nodes.
//!
//! Phase 2 refines within the anonymous region for minimum loss. Cones
//! whose lower bound cannot beat the best known solution are cut with
//! `INSUFFICIENT_UTILITY` (an UP property, so one mark prunes the whole
//! cone).
//!
//! Everything is ordered by [`FlashStrategy`]; no hash-iteration order ever
//! reaches the traversal.

use veil_check::checker::{NodeCheckResult, NodeChecker};
use veil_core::lattice::{Property, SolutionSpace};
use veil_core::loss::InformationLoss;
use veil_core::progress::{CheckEvent, ProgressSink};

use crate::strategy::FlashStrategy;

/// Result of a traversal.
#[derive(Clone, Copy, Debug)]
pub struct SearchOutcome {
    /// The optimal anonymous node, if any exists.
    pub optimum: Option<u64>,
    /// Its realized loss.
    pub optimum_loss: Option<InformationLoss>,
    /// Total number of node checks performed.
    pub checks: usize,
}

/// Run the full two-phase traversal.
pub fn traverse(
    space: &mut SolutionSpace,
    checker: &mut NodeChecker<'_>,
    strategy: &FlashStrategy,
    progress: &mut dyn ProgressSink,
) -> SearchOutcome {
    let mut best: Option<(u64, InformationLoss)> = None;

    binary_phase(space, checker, strategy, &mut best, progress);
    tracing::debug!(checks = checker.checked(), "binary phase complete");

    if space.anonymity_predictable() {
        refine_predictable(space, checker, strategy, &mut best, progress);
    } else {
        refine_exhaustive(space, checker, strategy, &mut best, progress);
    }
    tracing::debug!(checks = checker.checked(), "refinement phase complete");

    let checks = checker.checked();
    progress.finished(checks);
    SearchOutcome {
        optimum: best.map(|(id, _)| id),
        optimum_loss: best.map(|(_, loss)| loss),
        checks,
    }
}

/// Check a node, track the optimum, and emit a progress event.
fn check_node(
    space: &mut SolutionSpace,
    checker: &mut NodeChecker<'_>,
    id: u64,
    best: &mut Option<(u64, InformationLoss)>,
    progress: &mut dyn ProgressSink,
) -> NodeCheckResult {
    let result = checker.check(space, id);
    if result.anonymous {
        let improves = best.map_or(true, |(_, loss)| result.loss.is_lower_than(loss));
        if improves {
            *best = Some((id, result.loss));
        }
    }
    progress.node_checked(&CheckEvent {
        id,
        level: space.level_of(id),
        anonymous: result.anonymous,
        loss: result.loss,
        checks: checker.checked(),
    });
    result
}

fn has_verdict(space: &SolutionSpace, id: u64) -> bool {
    space.has_property(id, Property::Anonymous)
        || space.has_property(id, Property::NotAnonymous)
        || space.has_property(id, Property::NotKAnonymous)
}

fn binary_phase(
    space: &mut SolutionSpace,
    checker: &mut NodeChecker<'_>,
    strategy: &FlashStrategy,
    best: &mut Option<(u64, InformationLoss)>,
    progress: &mut dyn ProgressSink,
) {
    let bottom_level = space.level_of(space.bottom());
    let top_level = space.level_of(space.top());
    for level in bottom_level..=top_level {
        let mut nodes = space.unsafe_level(level);
        strategy.sort(space, &mut nodes);
        for id in nodes {
            if space.has_property(id, Property::Visited) {
                continue;
            }
            if has_verdict(space, id) {
                space.put_property(id, Property::Visited);
                continue;
            }
            let path = find_path(space, strategy, id);
            check_path_binary(space, checker, &path, best, progress);
        }
    }
}

/// Greedily ascend from `start` to the top, always taking the successor
/// that sorts first.
fn find_path(space: &SolutionSpace, strategy: &FlashStrategy, start: u64) -> Vec<u64> {
    let mut path = vec![start];
    let mut current = start;
    loop {
        let successors = space.successors(current);
        match strategy.min_of(space, &successors) {
            Some(next) => {
                path.push(next);
                current = next;
            }
            None => break,
        }
    }
    path
}

/// Binary-search a bottom-to-top path for the anonymity frontier.
fn check_path_binary(
    space: &mut SolutionSpace,
    checker: &mut NodeChecker<'_>,
    path: &[u64],
    best: &mut Option<(u64, InformationLoss)>,
    progress: &mut dyn ProgressSink,
) {
    let mut low = 0usize;
    let mut high = path.len();
    while low < high {
        let mid = (low + high) / 2;
        let id = path[mid];
        space.put_property(id, Property::Visited);
        if navigate_anonymous(space, checker, id, best, progress) {
            high = mid;
        } else {
            low = mid + 1;
        }
    }
}

/// The navigation predicate of the binary search: the aggregate verdict
/// when it is predictive, the k-anonymity verdict otherwise.
fn navigate_anonymous(
    space: &mut SolutionSpace,
    checker: &mut NodeChecker<'_>,
    id: u64,
    best: &mut Option<(u64, InformationLoss)>,
    progress: &mut dyn ProgressSink,
) -> bool {
    if space.anonymity_predictable() {
        if space.has_property(id, Property::Anonymous) {
            return true;
        }
        if space.has_property(id, Property::NotAnonymous)
            || space.has_property(id, Property::NotKAnonymous)
        {
            return false;
        }
        check_node(space, checker, id, best, progress).anonymous
    } else {
        if space.has_property(id, Property::NotKAnonymous) {
            return false;
        }
        if space.has_property(id, Property::KAnonymous)
            && space.has_property(id, Property::Checked)
        {
            return true;
        }
        check_node(space, checker, id, best, progress).k_anonymous
    }
}

/// Refinement under a fully monotonic privacy model: expand the cones above
/// the checked anonymous frontier, pruning by utility bounds.
fn refine_predictable(
    space: &mut SolutionSpace,
    checker: &mut NodeChecker<'_>,
    strategy: &FlashStrategy,
    best: &mut Option<(u64, InformationLoss)>,
    progress: &mut dyn ProgressSink,
) {
    let mut queue: Vec<u64> = space
        .materialized()
        .iter()
        .copied()
        .filter(|&id| space.has_property(id, Property::Anonymous))
        .collect();

    while let Some(id) = pop_min(space, strategy, &mut queue) {
        if space.has_property(id, Property::Expanded) {
            continue;
        }
        space.put_property(id, Property::Expanded);
        if space.has_property(id, Property::InsufficientUtility) {
            continue;
        }
        if !space.has_property(id, Property::Checked) {
            check_node(space, checker, id, best, progress);
        }
        let bound = space.lower_bound(id).unwrap_or(InformationLoss::ZERO);
        if let Some((best_id, best_loss)) = *best {
            if id != best_id && !bound.is_lower_than(best_loss) {
                space.put_property(id, Property::InsufficientUtility);
                space.put_property(id, Property::SuccessorsPruned);
                continue;
            }
        }
        for successor in space.successors(id) {
            if !space.has_property(successor, Property::Expanded) {
                queue.push(successor);
            }
        }
    }
}

/// Refinement without full monotonicity: sweep every level, skipping the
/// cones excluded by the monotone k-anonymity verdict and by utility
/// bounds, checking everything else.
fn refine_exhaustive(
    space: &mut SolutionSpace,
    checker: &mut NodeChecker<'_>,
    strategy: &FlashStrategy,
    best: &mut Option<(u64, InformationLoss)>,
    progress: &mut dyn ProgressSink,
) {
    let bottom_level = space.level_of(space.bottom());
    let top_level = space.level_of(space.top());
    for level in bottom_level..=top_level {
        let mut nodes = space.unsafe_level(level);
        strategy.sort(space, &mut nodes);
        for id in nodes {
            if space.has_property(id, Property::Checked)
                || space.has_property(id, Property::NotKAnonymous)
                || space.has_property(id, Property::InsufficientUtility)
            {
                continue;
            }
            let result = check_node(space, checker, id, best, progress);
            if let Some((best_id, best_loss)) = *best {
                if id != best_id && !result.bound.is_lower_than(best_loss) {
                    space.put_property(id, Property::InsufficientUtility);
                    space.put_property(id, Property::SuccessorsPruned);
                }
            }
        }
    }
}

/// Remove and return the node that sorts first.
fn pop_min(space: &SolutionSpace, strategy: &FlashStrategy, queue: &mut Vec<u64>) -> Option<u64> {
    let min = strategy.min_of(space, queue)?;
    let position = queue
        .iter()
        .position(|&id| id == min)
        .expect("min_of returns a queue element");
    Some(queue.swap_remove(position))
}
