// vigil-core/src/application/mod.rs

pub mod batch;
pub mod coordinator;
pub mod evaluator;
pub mod health;
pub mod summary;
pub mod versioning;

// --- RE-EXPORTS (FACADE PATTERN) ---
// Lets the CLI import the use cases without knowing the file layout:
// `use vigil_core::application::{run_batch, BatchDeps, ExecutionSummary};`

pub use batch::{BatchDeps, BatchReport, load_rule_records, run_batch};
pub use coordinator::{BatchRows, execute_rules};
pub use evaluator::{EvalContext, evaluate};
pub use summary::{ExecutionSummary, TableSummary};
pub use versioning::SnapshotVersioning;
