// vigil/src/commands/inspect.rs
//
// USE CASE: Show the latest committed health snapshot for one table.

use std::path::Path;

use anyhow::Context;
use comfy_table::Table;

use vigil_core::infrastructure::adapters::duckdb::DuckDbWarehouse;
use vigil_core::infrastructure::config::load_engine_config;
use vigil_core::ports::query::QueryService;

pub async fn execute(table: &str, config_dir: &Path) -> anyhow::Result<()> {
    let config = load_engine_config(config_dir).with_context(|| {
        format!("Failed to load engine configuration from {:?}", config_dir)
    })?;
    let warehouse = DuckDbWarehouse::new(&config.db_path)
        .with_context(|| format!("Failed to open warehouse at {}", config.db_path))?;

    let escaped = table.replace('\'', "''");

    // Table-level snapshot
    let table_rows = warehouse
        .run_rows(&format!(
            "SELECT snapshot_date, element_rollup_rag, table_rule_rag, overall_rag \
             FROM {} WHERE data_table = '{}' AND is_latest_snapshot = true",
            config.warehouse.table_health, escaped
        ))
        .await?;

    if table_rows.is_empty() {
        println!("No committed health snapshot found for '{table}'");
        return Ok(());
    }

    println!("🏥 Table health for '{table}':");
    let mut overview = Table::new();
    overview.set_header(vec![
        "Snapshot",
        "Element Rollup",
        "Table Rules",
        "Overall",
    ]);
    for row in &table_rows {
        overview.add_row(row.iter().map(render).collect::<Vec<_>>());
    }
    println!("{overview}");

    // Element-level detail
    let element_rows = warehouse
        .run_rows(&format!(
            "SELECT data_column, total_rules, amber_rules, red_rules, data_element_rag \
             FROM {} WHERE data_table = '{}' AND is_latest_snapshot = true \
             ORDER BY data_column",
            config.warehouse.data_element_health, escaped
        ))
        .await?;

    if !element_rows.is_empty() {
        println!("\n🔬 Data elements:");
        let mut detail = Table::new();
        detail.set_header(vec!["Column", "Rules", "Amber", "Red", "RAG"]);
        for row in &element_rows {
            detail.add_row(row.iter().map(render).collect::<Vec<_>>());
        }
        println!("{detail}");
    }

    Ok(())
}

fn render(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "NULL".to_string(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
