// vigil-core/src/application/coordinator.rs

// Runs every catalog entry through the evaluator on a bounded worker pool,
// isolating per-rule failures, and flushes the two row sets in two append
// operations once ALL workers have finished. Nothing is persisted until the
// whole batch result set is assembled, so a crashed batch leaves no partial
// snapshot marked latest.

use chrono::Utc;
use futures::StreamExt;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::evaluator::{self, EvalContext};
use crate::application::versioning::SnapshotVersioning;
use crate::domain::health::{ExecutionStatusRow, RuleResultRow};
use crate::domain::outcome::CheckError;
use crate::domain::rule::{CatalogEntry, RuleCatalog};
use crate::error::VigilError;
use crate::ports::sink::{AppendSink, RetireSink};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f UTC";

/// The two row sets of one batch, kept in memory for the rollup stages.
#[derive(Debug, Default)]
pub struct BatchRows {
    pub results: Vec<RuleResultRow>,
    pub statuses: Vec<ExecutionStatusRow>,
}

pub async fn execute_rules(
    catalog: &RuleCatalog,
    ctx: &EvalContext<'_>,
    retire: &dyn RetireSink,
    append: &dyn AppendSink,
    tables: &[String],
    max_workers: usize,
) -> Result<BatchRows, VigilError> {
    // 1. Retire the previous latest snapshots. Completed (acknowledged)
    //    before any evaluation starts: the Variance history count reads
    //    non-latest rows, and the at-most-one-latest invariant would break
    //    if retirement raced the inserts below.
    SnapshotVersioning::retire_rule_snapshots(retire, ctx.layout, tables).await?;

    info!(rules = catalog.len(), max_workers, "Evaluating batch rules");

    // 2. Concurrent evaluation, bounded pool, completion order irrelevant.
    let evaluations = catalog.entries().map(|entry| process_rule(entry, ctx));
    let outcomes: Vec<(Option<RuleResultRow>, ExecutionStatusRow)> =
        futures::stream::iter(evaluations)
            .buffer_unordered(max_workers.max(1))
            .collect()
            .await;

    let mut rows = BatchRows::default();
    for (result, status) in outcomes {
        if let Some(result) = result {
            rows.results.push(result);
        }
        rows.statuses.push(status);
    }

    // 3. Flush both row sets, results first. A failure here is a batch-level
    //    persistence error and propagates to the caller for a wholesale retry.
    append
        .append_rows(&ctx.layout.rule_results, &to_json_rows(&rows.results)?)
        .await?;
    append
        .append_rows(&ctx.layout.execution_status, &to_json_rows(&rows.statuses)?)
        .await?;

    let failed = rows.statuses.iter().filter(|s| !s.is_successful).count();
    info!(
        results = rows.results.len(),
        statuses = rows.statuses.len(),
        failed,
        "Batch evaluation flushed"
    );

    Ok(rows)
}

/// Evaluates one catalog entry in isolation. Always yields a status row;
/// yields a result row only when the check produced a measurement.
async fn process_rule(
    entry: &CatalogEntry,
    ctx: &EvalContext<'_>,
) -> (Option<RuleResultRow>, ExecutionStatusRow) {
    let execution_id = new_execution_id();

    let def = match entry {
        CatalogEntry::Valid(def) => def,
        CatalogEntry::Invalid { rule_id, error, .. } => {
            warn!(rule_id = %rule_id, error = %error, "Rule definition rejected");
            return (None, failed_status(execution_id, rule_id, ctx, error));
        }
    };

    let execution_start = Utc::now();
    let outcome = evaluator::evaluate(def, ctx).await;
    let execution_end = Utc::now();

    match outcome {
        Ok(measurement) => {
            let result = RuleResultRow {
                execution_id: execution_id.clone(),
                rule_id: def.id.clone(),
                rule_level: def.level(),
                snapshot_date: ctx.snapshot_date,
                cde_flag: def.cde_flag,
                is_latest_snapshot: true,
                execution_start: execution_start.format(TIMESTAMP_FORMAT).to_string(),
                execution_end: execution_end.format(TIMESTAMP_FORMAT).to_string(),
                execution_duration_seconds: (execution_end - execution_start)
                    .num_microseconds()
                    .unwrap_or_default() as f64
                    / 1_000_000.0,
                numerator_result: measurement.numerator,
                denominator_result: measurement.denominator,
                rule_result: measurement.rule_value,
                threshold_type: def.behavior.threshold_type(),
                amber_threshold: def.thresholds.amber,
                red_threshold: def.thresholds.red,
                result_rag: measurement.rag,
            };
            let status = ExecutionStatusRow {
                execution_id,
                rule_id: def.id.clone(),
                snapshot_date: ctx.snapshot_date,
                is_latest_snapshot: true,
                is_successful: true,
                error_message: None,
            };
            (Some(result), status)
        }
        Err(error) => {
            warn!(rule_id = %def.id, error = %error, "Rule check failed");
            (None, failed_status(execution_id, &def.id, ctx, &error))
        }
    }
}

fn failed_status(
    execution_id: String,
    rule_id: &str,
    ctx: &EvalContext<'_>,
    error: &CheckError,
) -> ExecutionStatusRow {
    ExecutionStatusRow {
        execution_id,
        rule_id: rule_id.to_string(),
        snapshot_date: ctx.snapshot_date,
        is_latest_snapshot: true,
        is_successful: false,
        error_message: Some(error.to_string()),
    }
}

/// Short execution id, unique per evaluation (first UUID segment).
fn new_execution_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

pub(crate) fn to_json_rows<T: serde::Serialize>(
    rows: &[T],
) -> Result<Vec<serde_json::Value>, VigilError> {
    rows.iter()
        .map(|r| {
            serde_json::to_value(r)
                .map_err(|e| VigilError::InternalError(format!("Row serialization: {e}")))
        })
        .collect()
}
