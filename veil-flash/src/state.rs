//! Persisted lattice state.
//!
//! A previously computed lattice serializes as a sequence of
//! (transformation, verdict, loss) records. Importing replays them onto a
//! freshly built solution space: each matching node gets `CHECKED`, its
//! verdict, and its loss. The search then skips everything the records
//! already settle.

use serde::{Deserialize, Serialize};

use veil_core::error::{Error, Result};
use veil_core::lattice::{Property, SolutionSpace};
use veil_core::loss::InformationLoss;

/// Privacy verdict of a persisted node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Anonymous,
    NotAnonymous,
    Unknown,
}

/// One persisted node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckedNodeRecord {
    /// Per-QI generalization levels.
    pub transformation: Vec<u32>,
    /// Aggregate privacy verdict.
    pub verdict: Verdict,
    /// Realized information loss, when recorded.
    pub loss: Option<f64>,
}

/// Export the checked nodes of a solution space, in materialization order.
pub fn export_state(space: &SolutionSpace) -> Vec<CheckedNodeRecord> {
    space
        .materialized()
        .iter()
        .copied()
        .filter(|&id| space.has_property(id, Property::Checked))
        .map(|id| {
            let verdict = if space.has_property(id, Property::Anonymous) {
                Verdict::Anonymous
            } else if space.has_property(id, Property::NotAnonymous) {
                Verdict::NotAnonymous
            } else {
                Verdict::Unknown
            };
            CheckedNodeRecord {
                transformation: space.levels_of(id),
                verdict,
                loss: space.information_loss(id).map(InformationLoss::value),
            }
        })
        .collect()
}

/// Replay persisted records onto a solution space.
pub fn import_state(space: &mut SolutionSpace, records: &[CheckedNodeRecord]) -> Result<()> {
    for record in records {
        if record.transformation.len() != space.num_dimensions() {
            return Err(Error::data(format!(
                "record has {} dimensions, the solution space has {}",
                record.transformation.len(),
                space.num_dimensions()
            )));
        }
        for (d, &level) in record.transformation.iter().enumerate() {
            if level < space.min_levels()[d] || level > space.max_levels()[d] {
                return Err(Error::data(format!(
                    "record level {level} in dimension {d} is outside [{}, {}]",
                    space.min_levels()[d],
                    space.max_levels()[d]
                )));
            }
        }
        let id = space.id_of(&record.transformation);
        space.put_property(id, Property::Checked);
        match record.verdict {
            Verdict::Anonymous => space.put_property(id, Property::Anonymous),
            Verdict::NotAnonymous => space.put_property(id, Property::NotAnonymous),
            Verdict::Unknown => {}
        }
        if let Some(loss) = record.loss {
            space.set_information_loss(id, InformationLoss::new(loss));
        }
    }
    Ok(())
}

/// Serialize records to JSON.
pub fn to_json(records: &[CheckedNodeRecord]) -> Result<String> {
    serde_json::to_string_pretty(records).map_err(|e| Error::serialization(e.to_string()))
}

/// Deserialize records from JSON.
pub fn from_json(json: &str) -> Result<Vec<CheckedNodeRecord>> {
    serde_json::from_str(json).map_err(|e| Error::serialization(e.to_string()))
}
