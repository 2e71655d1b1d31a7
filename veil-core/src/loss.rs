//! Information-loss values.

use serde::{Deserialize, Serialize};

/// A single-dimensional information-loss value.
///
/// Losses are non-negative reals. Comparison uses the natural order on the
/// underlying value; metrics guarantee bounds never exceed realized losses.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct InformationLoss(f64);

impl InformationLoss {
    /// The zero loss.
    pub const ZERO: InformationLoss = InformationLoss(0.0);

    /// Wrap a raw loss value.
    pub fn new(value: f64) -> Self {
        Self(value)
    }

    /// The raw loss value.
    pub fn value(self) -> f64 {
        self.0
    }

    /// The smaller of two losses.
    pub fn min(self, other: Self) -> Self {
        if other.0 < self.0 {
            other
        } else {
            self
        }
    }

    /// Whether this loss is strictly lower than `other`.
    pub fn is_lower_than(self, other: Self) -> bool {
        self.0 < other.0
    }
}

impl std::ops::Add for InformationLoss {
    type Output = InformationLoss;

    fn add(self, rhs: Self) -> Self {
        InformationLoss(self.0 + rhs.0)
    }
}

impl std::fmt::Display for InformationLoss {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
