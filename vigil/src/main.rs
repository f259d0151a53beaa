// vigil/src/main.rs

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "vigil")]
#[command(about = "The Data Quality Health Engine", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 🚀 Runs a data-quality batch for a set of refreshed tables
    Run {
        /// Tables to process, as named in the rule definitions
        #[arg(required = true)]
        tables: Vec<String>,

        /// Directory containing vigil.yaml
        #[arg(long, default_value = ".")]
        config_dir: PathBuf,

        /// Snapshot date override (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<chrono::NaiveDate>,
    },

    /// ⚡ Executes a raw SQL query against the warehouse (Ad-hoc)
    Query {
        query: String,
        #[arg(long, default_value = "vigil_db.duckdb")]
        db_path: String,
    },

    /// 🔍 Shows the latest health snapshot for a table
    Inspect {
        /// Table name to inspect
        table: String,

        /// Directory containing vigil.yaml
        #[arg(long, default_value = ".")]
        config_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG=debug vigil run ... for the details
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            tables,
            config_dir,
            date,
        } => commands::run::execute(tables, config_dir, date).await,
        Commands::Query { query, db_path } => commands::query::execute(&query, &db_path).await,
        Commands::Inspect { table, config_dir } => {
            commands::inspect::execute(&table, &config_dir).await
        }
    }
}
