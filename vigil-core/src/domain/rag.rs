// vigil-core/src/domain/rag.rs

use serde::{Deserialize, Serialize};

/// Three-level severity status. Thresholds are inclusive lower bounds,
/// Red evaluated first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RagStatus {
    Green,
    Amber,
    Red,
}

impl RagStatus {
    /// Threshold classification. Callers guarantee `amber <= red` (checked
    /// when the rule definition is built); no re-validation here.
    pub fn classify(value: f64, amber_threshold: f64, red_threshold: f64) -> Self {
        if value >= red_threshold {
            RagStatus::Red
        } else if value >= amber_threshold {
            RagStatus::Amber
        } else {
            RagStatus::Green
        }
    }

    /// Count-based derivation shared by both rollup stages:
    /// any Red wins, then any Amber, else Green.
    pub fn from_counts(amber_rules: u32, red_rules: u32) -> Self {
        if red_rules >= 1 {
            RagStatus::Red
        } else if amber_rules >= 1 {
            RagStatus::Amber
        } else {
            RagStatus::Green
        }
    }

    /// Severity order: Red > Amber > Green.
    pub fn severity(self) -> u8 {
        match self {
            RagStatus::Green => 0,
            RagStatus::Amber => 1,
            RagStatus::Red => 2,
        }
    }

    pub fn worst(self, other: Self) -> Self {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }

    /// Asymmetric table-level merge. A single Red on either side forces Red;
    /// table Amber can be upgraded to Red by element Red but never downgraded;
    /// table Green (or no table rules at all) passes the element rollup
    /// through verbatim.
    pub fn merge_table(element_rollup: Self, table_rule: Option<Self>) -> Self {
        match table_rule {
            None => element_rollup,
            Some(RagStatus::Red) => RagStatus::Red,
            Some(RagStatus::Amber) => {
                if element_rollup == RagStatus::Red {
                    RagStatus::Red
                } else {
                    RagStatus::Amber
                }
            }
            Some(RagStatus::Green) => element_rollup,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RagStatus::Green => "Green",
            RagStatus::Amber => "Amber",
            RagStatus::Red => "Red",
        }
    }
}

impl std::fmt::Display for RagStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
