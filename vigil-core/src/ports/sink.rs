// vigil-core/src/ports/sink.rs

use crate::error::VigilError;
use async_trait::async_trait;

/// Typed predicate for the update-by-predicate sink. The adapter translates
/// it into whatever its warehouse dialect needs; an empty table list matches
/// nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum RetirePredicate {
    /// Rows whose `rule_id` belongs to a rule defined on one of `tables`.
    RulesOwnedByTables {
        rule_definition_table: String,
        tables: Vec<String>,
    },
    /// Rows whose `data_table` column is one of `tables`.
    DataTables { tables: Vec<String> },
}

#[async_trait]
pub trait RetireSink: Send + Sync {
    /// Flips `is_latest_snapshot` to false for every row of `table` matching
    /// the predicate. Must not return before the update is acknowledged.
    async fn retire_latest(
        &self,
        table: &str,
        predicate: &RetirePredicate,
    ) -> Result<(), VigilError>;
}

#[async_trait]
pub trait AppendSink: Send + Sync {
    /// Appends rows (JSON objects, one per row) to `table`. Date/time values
    /// are already serialized as ISO-8601 strings by the caller.
    async fn append_rows(
        &self,
        table: &str,
        rows: &[serde_json::Value],
    ) -> Result<(), VigilError>;
}
