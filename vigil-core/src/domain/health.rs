// vigil-core/src/domain/health.rs

// Persisted row shapes. These serialize straight to the JSON rows handed to
// the append sink; `chrono::NaiveDate` serializes as an ISO-8601 date string.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::rag::RagStatus;
use crate::domain::rule::{RuleLevel, ThresholdType};

/// One committed rule evaluation. Created once per rule per batch, never
/// mutated except the `is_latest_snapshot` flip when a newer batch retires it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleResultRow {
    pub execution_id: String,
    pub rule_id: String,
    pub rule_level: RuleLevel,
    pub snapshot_date: NaiveDate,
    pub cde_flag: bool,
    pub is_latest_snapshot: bool,
    pub execution_start: String,
    pub execution_end: String,
    pub execution_duration_seconds: f64,
    pub numerator_result: Option<f64>,
    pub denominator_result: Option<f64>,
    /// `None` only for the Variance bootstrap (forced Green).
    pub rule_result: Option<f64>,
    pub threshold_type: ThresholdType,
    pub amber_threshold: f64,
    pub red_threshold: f64,
    pub result_rag: RagStatus,
}

/// One row per rule per batch attempt, success or failure, independent of
/// whether a result row was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStatusRow {
    pub execution_id: String,
    pub rule_id: String,
    pub snapshot_date: NaiveDate,
    pub is_latest_snapshot: bool,
    pub is_successful: bool,
    pub error_message: Option<String>,
}

/// Column-level rollup: all Data Element results for one column in the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataElementHealthRow {
    pub snapshot_date: NaiveDate,
    pub element_id: Option<String>,
    pub data_source: String,
    pub data_schema: String,
    pub data_table: String,
    pub data_column: String,
    pub amber_rules: u32,
    pub red_rules: u32,
    pub total_rules: u32,
    pub is_latest_snapshot: bool,
    pub data_element_rag: RagStatus,
}

/// Table-level rollup: worst element health merged with the table's own
/// rule results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableHealthRow {
    pub snapshot_date: NaiveDate,
    pub element_id: Option<String>,
    pub data_source: String,
    pub data_schema: String,
    pub data_table: String,
    pub element_rollup_rag: RagStatus,
    /// `None` when the table has no table-level rules.
    pub table_rule_rag: Option<RagStatus>,
    pub green_rules: u32,
    pub amber_rules: u32,
    pub red_rules: u32,
    pub total_rules: u32,
    pub is_latest_snapshot: bool,
    pub overall_rag: RagStatus,
}
