// vigil-core/src/ports/query.rs

// This file defines what the engine needs from a warehouse, without knowing
// which warehouse sits behind it. Rule checks only ever read; all writes go
// through the sink ports.

use crate::error::VigilError;
use async_trait::async_trait;

/// One result row, column values in SELECT order.
pub type RowValues = Vec<serde_json::Value>;

#[async_trait]
pub trait QueryService: Send + Sync {
    /// Runs a query expected to return a single scalar.
    /// `Ok(None)` means the query returned SQL NULL (or no row at all);
    /// callers decide whether that is an error.
    async fn run_scalar(&self, query: &str) -> Result<Option<f64>, VigilError>;

    /// Runs a query returning an ordered set of rows.
    async fn run_rows(&self, query: &str) -> Result<Vec<RowValues>, VigilError>;
}
