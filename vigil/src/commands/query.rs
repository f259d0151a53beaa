// vigil/src/commands/query.rs
//
// USE CASE: Ad-hoc read-only query against the warehouse.

use anyhow::Context;

use vigil_core::infrastructure::adapters::duckdb::DuckDbWarehouse;
use vigil_core::ports::query::QueryService;

pub async fn execute(query: &str, db_path: &str) -> anyhow::Result<()> {
    let warehouse = DuckDbWarehouse::new(db_path)
        .with_context(|| format!("Failed to open warehouse at {db_path}"))?;

    let rows = match warehouse.run_rows(query).await {
        Ok(rows) => rows,
        Err(e) => {
            eprintln!("❌ Query failed: {}", e);
            std::process::exit(1);
        }
    };

    for row in &rows {
        let rendered: Vec<String> = row
            .iter()
            .map(|v| match v {
                serde_json::Value::Null => "NULL".to_string(),
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        println!("{}", rendered.join(" | "));
    }
    println!("({} rows)", rows.len());
    Ok(())
}
