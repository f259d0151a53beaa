// vigil/src/commands/run.rs
//
// USE CASE: Run a data-quality batch for a set of refreshed tables.

use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use comfy_table::Table;

use vigil_core::application::{BatchDeps, BatchReport, run_batch};
use vigil_core::infrastructure::adapters::duckdb::DuckDbWarehouse;
use vigil_core::infrastructure::adapters::notifier::LogNotifier;
use vigil_core::infrastructure::config::load_engine_config;

pub async fn execute(
    tables: Vec<String>,
    config_dir: PathBuf,
    date: Option<NaiveDate>,
) -> anyhow::Result<()> {
    let start = std::time::Instant::now();

    // A. Load the Config (Infra)
    println!("⚙️  Loading configuration...");
    let config = load_engine_config(&config_dir).with_context(|| {
        format!("Failed to load engine configuration from {:?}", config_dir)
    })?;
    println!(
        "   Warehouse: {} ({} workers)",
        config.db_path, config.max_workers
    );

    // B. Instantiate the warehouse adapter (DuckDB)
    let warehouse = DuckDbWarehouse::new(&config.db_path)
        .with_context(|| format!("Failed to open warehouse at {}", config.db_path))?;
    let notifier = LogNotifier;

    // C. Run the batch (Application Layer). Dependency injection happens
    // here: the same adapter serves all three warehouse ports.
    let deps = BatchDeps {
        query: &warehouse,
        retire: &warehouse,
        append: &warehouse,
        notifier: Some(&notifier),
    };
    let snapshot_date = date.unwrap_or_else(|| chrono::Local::now().date_naive());

    match run_batch(&deps, &config, &tables, snapshot_date).await {
        Ok(report) => {
            print_report(&report);
            if report.failed_rules > 0 {
                println!(
                    "\n⚠️  Batch committed with {} failed rule(s) in {:.2?}",
                    report.failed_rules,
                    start.elapsed()
                );
            } else {
                println!("\n✨ SUCCESS! Batch finished in {:.2?}", start.elapsed());
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("\n💥 CRITICAL BATCH ERROR: {}", e);
            // Exit with error code for the scheduler: the batch must be
            // retried wholesale, nothing was partially committed as latest.
            std::process::exit(1);
        }
    }
}

fn print_report(report: &BatchReport) {
    let mut table = Table::new();
    table.set_header(vec!["Table", "Total Rules", "Passed", "Failed"]);
    for summary in &report.summary.tables {
        table.add_row(vec![
            summary.data_table.clone(),
            summary.total_rules.to_string(),
            summary.success_rules.to_string(),
            summary.failed_rules.to_string(),
        ]);
    }
    println!("{table}");
    println!(
        "   Results: {} | Element health rows: {} | Table health rows: {}",
        report.results_written, report.element_health_rows, report.table_health_rows
    );
}
