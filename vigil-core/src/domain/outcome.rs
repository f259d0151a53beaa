// vigil-core/src/domain/outcome.rs

// Discriminated result of a single rule check: either a measurement carrying
// the computed value and its classification, or a typed failure. Replaces the
// fixed-position tuple the checks would otherwise return, where a null slot
// means something different per behavior.

use crate::domain::rag::RagStatus;
use thiserror::Error;

/// Per-rule failure taxonomy. All three kinds are local and recoverable:
/// they become a failed execution-status row and never abort the batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckError {
    /// Malformed rule definition (missing required field, amber > red).
    #[error("{0}")]
    Validation(String),

    /// External query failed or returned an unusable NULL.
    #[error("{0}")]
    Query(String),

    /// Division guard tripped (zero denominator, zero P2P numerator,
    /// missing or zero N-day average).
    #[error("{0}")]
    Arithmetic(String),
}

/// Successful measurement. `rule_value` stays `None` for the Variance
/// bootstrap (insufficient history forced to Green); `denominator` carries
/// the N-day average for Variance checks.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub rule_value: Option<f64>,
    pub numerator: Option<f64>,
    pub denominator: Option<f64>,
    pub rag: RagStatus,
}

pub type RuleOutcome = Result<Measurement, CheckError>;
