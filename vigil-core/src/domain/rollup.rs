// vigil-core/src/domain/rollup.rs

// The two health rollups, as pure aggregations over the batch's committed
// result rows. The locus fields (source/schema/table/column) are not stored
// on result rows, so both stages join against the batch catalog by rule id.
// Results whose rule id is missing from the catalog are skipped; the
// coordinator only ever produces rows for catalog entries.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::domain::health::{DataElementHealthRow, RuleResultRow, TableHealthRow};
use crate::domain::rag::RagStatus;
use crate::domain::rule::{RuleCatalog, RuleLevel};

/// Data-Element stage: group Data Element results by column, count Amber and
/// Red occurrences, derive the element RAG. One row per column.
pub fn element_health(
    results: &[RuleResultRow],
    catalog: &RuleCatalog,
    snapshot_date: NaiveDate,
) -> Vec<DataElementHealthRow> {
    // BTreeMap for deterministic output order
    let mut groups: BTreeMap<(String, String, String, String), ElementCounts> = BTreeMap::new();

    for result in results {
        if result.rule_level != RuleLevel::DataElement {
            continue;
        }
        let Some(def) = catalog.definition(&result.rule_id) else {
            continue;
        };
        let Some(column) = def.locus.column.clone() else {
            continue;
        };
        let key = (
            def.locus.source.clone(),
            def.locus.schema.clone(),
            def.locus.table.clone(),
            column,
        );
        let counts = groups.entry(key).or_default();
        counts.total += 1;
        match result.result_rag {
            RagStatus::Amber => counts.amber += 1,
            RagStatus::Red => counts.red += 1,
            RagStatus::Green => {}
        }
        if counts.element_id.is_none() {
            counts.element_id = def.element_id.clone();
        }
    }

    groups
        .into_iter()
        .map(|((source, schema, table, column), counts)| DataElementHealthRow {
            snapshot_date,
            element_id: counts.element_id,
            data_source: source,
            data_schema: schema,
            data_table: table,
            data_column: column,
            amber_rules: counts.amber,
            red_rules: counts.red,
            total_rules: counts.total,
            is_latest_snapshot: true,
            data_element_rag: RagStatus::from_counts(counts.amber, counts.red),
        })
        .collect()
}

/// Table stage: worst element RAG per table, merged with the count-derived
/// RAG of the table's own table-level results. Emits one row per table that
/// has element-level health; a table carrying only table-level rules produces
/// no row (the element side drives the join).
pub fn table_health(
    elements: &[DataElementHealthRow],
    results: &[RuleResultRow],
    catalog: &RuleCatalog,
    snapshot_date: NaiveDate,
) -> Vec<TableHealthRow> {
    // (a) Worst element RAG per table
    let mut element_side: BTreeMap<(String, String, String), RagStatus> = BTreeMap::new();
    for element in elements {
        let key = (
            element.data_source.clone(),
            element.data_schema.clone(),
            element.data_table.clone(),
        );
        element_side
            .entry(key)
            .and_modify(|rag| *rag = rag.worst(element.data_element_rag))
            .or_insert(element.data_element_rag);
    }

    // (b) Count-based derivation over table-level results
    let mut table_side: BTreeMap<(String, String, String), TableCounts> = BTreeMap::new();
    for result in results {
        if result.rule_level != RuleLevel::Table {
            continue;
        }
        let Some(def) = catalog.definition(&result.rule_id) else {
            continue;
        };
        let key = (
            def.locus.source.clone(),
            def.locus.schema.clone(),
            def.locus.table.clone(),
        );
        let counts = table_side.entry(key).or_default();
        counts.total += 1;
        match result.result_rag {
            RagStatus::Green => counts.green += 1,
            RagStatus::Amber => counts.amber += 1,
            RagStatus::Red => counts.red += 1,
        }
        if counts.element_id.is_none() {
            counts.element_id = def.element_id.clone();
        }
    }

    element_side
        .into_iter()
        .map(|((source, schema, table), element_rollup)| {
            let counts = table_side
                .remove(&(source.clone(), schema.clone(), table.clone()))
                .unwrap_or_default();
            let table_rule_rag = if counts.total > 0 {
                Some(RagStatus::from_counts(counts.amber, counts.red))
            } else {
                None
            };
            TableHealthRow {
                snapshot_date,
                element_id: counts.element_id,
                data_source: source,
                data_schema: schema,
                data_table: table,
                element_rollup_rag: element_rollup,
                table_rule_rag,
                green_rules: counts.green,
                amber_rules: counts.amber,
                red_rules: counts.red,
                total_rules: counts.total,
                is_latest_snapshot: true,
                overall_rag: RagStatus::merge_table(element_rollup, table_rule_rag),
            }
        })
        .collect()
}

#[derive(Default)]
struct ElementCounts {
    amber: u32,
    red: u32,
    total: u32,
    element_id: Option<String>,
}

#[derive(Default)]
struct TableCounts {
    green: u32,
    amber: u32,
    red: u32,
    total: u32,
    element_id: Option<String>,
}
