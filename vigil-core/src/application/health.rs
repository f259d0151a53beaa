// vigil-core/src/application/health.rs

// The two rollup refresh stages. Each stage repeats the snapshot pattern:
// retire the previous latest rows for the affected tables, compute the new
// snapshot from the batch's committed rows, then bulk-append it. An empty
// computed set still retires the old snapshot but appends nothing.

use tracing::info;

use crate::application::coordinator::{BatchRows, to_json_rows};
use crate::application::evaluator::EvalContext;
use crate::application::versioning::SnapshotVersioning;
use crate::domain::health::{DataElementHealthRow, TableHealthRow};
use crate::domain::rollup;
use crate::domain::rule::RuleCatalog;
use crate::error::VigilError;
use crate::ports::sink::{AppendSink, RetireSink};

pub async fn refresh_element_health(
    batch: &BatchRows,
    catalog: &RuleCatalog,
    ctx: &EvalContext<'_>,
    retire: &dyn RetireSink,
    append: &dyn AppendSink,
    tables: &[String],
) -> Result<Vec<DataElementHealthRow>, VigilError> {
    SnapshotVersioning::retire_health_snapshot(retire, &ctx.layout.data_element_health, tables)
        .await?;

    let rows = rollup::element_health(&batch.results, catalog, ctx.snapshot_date);
    if !rows.is_empty() {
        append
            .append_rows(&ctx.layout.data_element_health, &to_json_rows(&rows)?)
            .await?;
    }
    info!(rows = rows.len(), "Data element health refreshed");
    Ok(rows)
}

pub async fn refresh_table_health(
    elements: &[DataElementHealthRow],
    batch: &BatchRows,
    catalog: &RuleCatalog,
    ctx: &EvalContext<'_>,
    retire: &dyn RetireSink,
    append: &dyn AppendSink,
    tables: &[String],
) -> Result<Vec<TableHealthRow>, VigilError> {
    SnapshotVersioning::retire_health_snapshot(retire, &ctx.layout.table_health, tables).await?;

    let rows = rollup::table_health(elements, &batch.results, catalog, ctx.snapshot_date);
    if !rows.is_empty() {
        append
            .append_rows(&ctx.layout.table_health, &to_json_rows(&rows)?)
            .await?;
    }
    info!(rows = rows.len(), "Table health refreshed");
    Ok(rows)
}
