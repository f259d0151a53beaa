// vigil-core/src/application/batch.rs

// One full batch over a set of refreshed tables: load + trim the rule
// definitions, build the catalog, run the coordinator, refresh both health
// rollups, then hand the execution summary to the notifier. Deciding WHEN a
// batch runs stays with the external scheduler.

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::application::coordinator::{self, BatchRows};
use crate::application::evaluator::EvalContext;
use crate::application::health;
use crate::application::summary::ExecutionSummary;
use crate::domain::error::DomainError;
use crate::domain::rule::{RuleCatalog, RuleRecord};
use crate::error::VigilError;
use crate::infrastructure::config::{EngineConfig, WarehouseLayout};
use crate::ports::notifier::Notifier;
use crate::ports::query::{QueryService, RowValues};
use crate::ports::sink::{AppendSink, RetireSink};

/// Collaborator handles for one batch, injected by the caller.
pub struct BatchDeps<'a> {
    pub query: &'a dyn QueryService,
    pub retire: &'a dyn RetireSink,
    pub append: &'a dyn AppendSink,
    pub notifier: Option<&'a dyn Notifier>,
}

#[derive(Debug)]
pub struct BatchReport {
    pub tables: Vec<String>,
    pub rules_evaluated: usize,
    pub results_written: usize,
    pub failed_rules: usize,
    pub element_health_rows: usize,
    pub table_health_rows: usize,
    pub summary: ExecutionSummary,
}

pub async fn run_batch(
    deps: &BatchDeps<'_>,
    config: &EngineConfig,
    tables: &[String],
    snapshot_date: NaiveDate,
) -> Result<BatchReport, VigilError> {
    info!(?tables, %snapshot_date, "Processing rules for tables");

    // 1. Rule catalog for the batch (load, trim, filter, validate)
    let records = load_rule_records(deps.query, &config.warehouse).await?;
    let catalog = RuleCatalog::build(records, tables);

    if catalog.is_empty() {
        info!("No active rules to process for these tables");
        return Ok(BatchReport {
            tables: tables.to_vec(),
            rules_evaluated: 0,
            results_written: 0,
            failed_rules: 0,
            element_health_rows: 0,
            table_health_rows: 0,
            summary: ExecutionSummary::build(&catalog, &[], snapshot_date),
        });
    }

    let ctx = EvalContext {
        query: deps.query,
        layout: &config.warehouse,
        snapshot_date,
    };

    // 2. Evaluate + persist rule results and execution statuses
    let batch: BatchRows = coordinator::execute_rules(
        &catalog,
        &ctx,
        deps.retire,
        deps.append,
        tables,
        config.max_workers,
    )
    .await?;

    // 3. Health rollups, element stage feeding the table stage
    let elements =
        health::refresh_element_health(&batch, &catalog, &ctx, deps.retire, deps.append, tables)
            .await?;
    let table_rows = health::refresh_table_health(
        &elements,
        &batch,
        &catalog,
        &ctx,
        deps.retire,
        deps.append,
        tables,
    )
    .await?;

    // 4. Execution summary; a notification failure must not fail the batch
    let summary = ExecutionSummary::build(&catalog, &batch.statuses, snapshot_date);
    if let Some(notifier) = deps.notifier {
        let subject = config
            .notifications
            .as_ref()
            .map(|n| n.subject.clone())
            .unwrap_or_else(|| "Data Quality -- Processed Tables".to_string());
        if let Err(e) = notifier.send(&subject, &summary.to_html()).await {
            warn!(error = %e, "Error sending execution summary");
        }
    }

    let failed_rules = summary.total_failed() as usize;
    Ok(BatchReport {
        tables: tables.to_vec(),
        rules_evaluated: catalog.len(),
        results_written: batch.results.len(),
        failed_rules,
        element_health_rows: elements.len(),
        table_health_rows: table_rows.len(),
        summary,
    })
}

/// Loads every rule definition row from the warehouse. Trimming and
/// active/table filtering happen in `RuleCatalog::build`.
pub async fn load_rule_records(
    query: &dyn QueryService,
    layout: &WarehouseLayout,
) -> Result<Vec<RuleRecord>, VigilError> {
    let sql = format!(
        "SELECT rule_id, status, data_source, data_schema, data_table, data_column, \
         cde_flag, element_id, dq_dimension, rule_behavior, threshold_type, \
         amber_threshold, red_threshold, process_days, numerator_sql, denominator_sql \
         FROM {}",
        layout.rule_definitions
    );
    let rows = query.run_rows(&sql).await?;
    rows.into_iter().map(parse_rule_record).collect()
}

fn parse_rule_record(row: RowValues) -> Result<RuleRecord, VigilError> {
    if row.len() != 16 {
        return Err(VigilError::Domain(DomainError::RecordShape(format!(
            "expected 16 rule definition columns, got {}",
            row.len()
        ))));
    }
    let rule_id = text(&row[0]).ok_or_else(|| {
        VigilError::Domain(DomainError::RecordShape("NULL rule_id".to_string()))
    })?;
    Ok(RuleRecord {
        rule_id,
        status: text(&row[1]),
        data_source: text(&row[2]),
        data_schema: text(&row[3]),
        data_table: text(&row[4]),
        data_column: text(&row[5]),
        cde_flag: text(&row[6]),
        element_id: text(&row[7]),
        dq_dimension: text(&row[8]),
        rule_behavior: text(&row[9]),
        threshold_type: text(&row[10]),
        amber_threshold: text(&row[11]),
        red_threshold: text(&row[12]),
        process_days: text(&row[13]),
        numerator_sql: text(&row[14]),
        denominator_sql: text(&row[15]),
    })
}

/// Stewards sometimes store numerics in text columns and vice versa; accept
/// both and coerce to the string form the record parser expects.
fn text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}
