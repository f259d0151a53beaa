// vigil-core/src/application/versioning.rs

// Retires the previous "latest" snapshot before a new one is committed,
// preserving exactly one latest row per key. Every retire must be
// acknowledged by the sink before the matching insert starts; the callers
// (coordinator and health refresh stages) await these calls up front.

use tracing::debug;

use crate::error::VigilError;
use crate::infrastructure::config::WarehouseLayout;
use crate::ports::sink::{RetirePredicate, RetireSink};

pub struct SnapshotVersioning;

impl SnapshotVersioning {
    /// Retires latest rule-result AND execution-status rows for every rule
    /// owned by the target tables.
    pub async fn retire_rule_snapshots(
        sink: &dyn RetireSink,
        layout: &WarehouseLayout,
        tables: &[String],
    ) -> Result<(), VigilError> {
        let predicate = RetirePredicate::RulesOwnedByTables {
            rule_definition_table: layout.rule_definitions.clone(),
            tables: tables.to_vec(),
        };
        debug!(?tables, "Retiring previous rule result snapshots");
        sink.retire_latest(&layout.rule_results, &predicate).await?;
        sink.retire_latest(&layout.execution_status, &predicate)
            .await?;
        Ok(())
    }

    /// Retires latest health rows (element or table stage) for the target
    /// tables. `health_table` is one of the two health table names.
    pub async fn retire_health_snapshot(
        sink: &dyn RetireSink,
        health_table: &str,
        tables: &[String],
    ) -> Result<(), VigilError> {
        let predicate = RetirePredicate::DataTables {
            tables: tables.to_vec(),
        };
        debug!(health_table, ?tables, "Retiring previous health snapshot");
        sink.retire_latest(health_table, &predicate).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct RecordingSink {
        pub calls: Arc<Mutex<Vec<(String, RetirePredicate)>>>,
    }

    #[async_trait]
    impl RetireSink for RecordingSink {
        async fn retire_latest(
            &self,
            table: &str,
            predicate: &RetirePredicate,
        ) -> Result<(), VigilError> {
            self.calls
                .lock()
                .unwrap()
                .push((table.to_string(), predicate.clone()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_rule_snapshots_retire_both_tables() {
        let sink = RecordingSink::default();
        let layout = WarehouseLayout::default();
        let tables = vec!["customers".to_string()];

        SnapshotVersioning::retire_rule_snapshots(&sink, &layout, &tables)
            .await
            .unwrap();

        let calls = sink.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "dq_rule_results");
        assert_eq!(calls[1].0, "dq_execution_status");
        // both target rules owned by the batch tables
        for (_, predicate) in calls.iter() {
            assert_eq!(
                *predicate,
                RetirePredicate::RulesOwnedByTables {
                    rule_definition_table: "dq_rule_definition".to_string(),
                    tables: tables.clone(),
                }
            );
        }
    }

    #[tokio::test]
    async fn test_health_snapshot_uses_data_table_predicate() {
        let sink = RecordingSink::default();
        let tables = vec!["orders".to_string()];

        SnapshotVersioning::retire_health_snapshot(&sink, "dq_table_health", &tables)
            .await
            .unwrap();

        let calls = sink.calls.lock().unwrap();
        assert_eq!(
            calls[0],
            (
                "dq_table_health".to_string(),
                RetirePredicate::DataTables {
                    tables: tables.clone()
                }
            )
        );
    }
}
