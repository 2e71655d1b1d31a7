//! Anonymization results and output rendering.

use std::time::Duration;

use veil_core::data::{AttributeRole, DataManager};
use veil_core::lattice::Transformation;
use veil_core::loss::InformationLoss;

/// The optimal transformation found by a search.
#[derive(Clone, Debug)]
pub struct OptimalTransformation {
    /// Node identifier in the solution space.
    pub id: u64,
    /// Per-QI generalization levels.
    pub levels: Vec<u32>,
    /// Realized information loss.
    pub loss: InformationLoss,
}

/// The outcome of one anonymization run.
#[derive(Clone, Debug)]
pub struct AnonymizationResult {
    /// The chosen transformation, or `None` when no node satisfies the
    /// privacy criteria.
    pub optimum: Option<OptimalTransformation>,
    /// Wall-clock time of the search.
    pub elapsed: Duration,
    /// Number of node checks performed.
    pub checks: usize,
    /// Transformed output rows; `None` without a solution.
    pub output: Option<Vec<Vec<String>>>,
}

impl AnonymizationResult {
    /// Whether a solution was found.
    pub fn has_solution(&self) -> bool {
        self.optimum.is_some()
    }
}

/// Render the transformed table.
///
/// Suppressed rows render entirely as the marker. Otherwise QI cells show
/// the generalized label, identifying columns the marker, and all other
/// columns their original value.
pub fn render_output(
    manager: &DataManager,
    transformation: &Transformation,
    suppressed: &[bool],
    marker: &str,
) -> Vec<Vec<String>> {
    let cols = manager.cols();
    let mut qi_position = vec![usize::MAX; cols];
    for (position, &col) in manager.qi_indices().iter().enumerate() {
        qi_position[col] = position;
    }

    let mut out = Vec::with_capacity(manager.rows());
    for row in 0..manager.rows() {
        if suppressed[row] {
            out.push(vec![marker.to_string(); cols]);
            continue;
        }
        let mut cells = Vec::with_capacity(cols);
        for col in 0..cols {
            let cell = match manager.role(col) {
                AttributeRole::Identifying => marker.to_string(),
                AttributeRole::QuasiIdentifying => {
                    let d = qi_position[col];
                    let level = transformation.levels()[d] as usize;
                    let code = manager.hierarchies()[d].map(manager.data_qi().value(row, d), level);
                    manager
                        .dictionary(col)
                        .value(code)
                        .unwrap_or(marker)
                        .to_string()
                }
                AttributeRole::Sensitive | AttributeRole::Insensitive => {
                    manager.value_str(row, col).to_string()
                }
            };
            cells.push(cell);
        }
        out.push(cells);
    }
    out
}
