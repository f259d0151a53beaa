// vigil-core/src/domain/rule/catalog.rs

// In-memory view of the rule definitions relevant to one batch: active rules
// owned by the target tables, keyed by rule id. Records that fail validation
// stay in the catalog as Invalid entries so the coordinator can emit a failed
// execution-status row for them instead of dropping them silently.

use std::collections::HashMap;

use crate::domain::outcome::CheckError;
use crate::domain::rule::definition::{RuleDefinition, RuleRecord};

#[derive(Debug, Clone)]
pub enum CatalogEntry {
    Valid(RuleDefinition),
    Invalid {
        rule_id: String,
        data_table: Option<String>,
        error: CheckError,
    },
}

impl CatalogEntry {
    pub fn rule_id(&self) -> &str {
        match self {
            CatalogEntry::Valid(def) => &def.id,
            CatalogEntry::Invalid { rule_id, .. } => rule_id,
        }
    }

    pub fn data_table(&self) -> Option<&str> {
        match self {
            CatalogEntry::Valid(def) => Some(&def.locus.table),
            CatalogEntry::Invalid { data_table, .. } => data_table.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RuleCatalog {
    entries: HashMap<String, CatalogEntry>,
}

impl RuleCatalog {
    /// Builds the batch catalog: trims every record, keeps Active rules whose
    /// data table is in the target set, and validates them into typed
    /// definitions. Duplicate rule ids keep the last occurrence, matching the
    /// warehouse convention that later definition rows supersede earlier ones.
    pub fn build(records: Vec<RuleRecord>, tables: &[String]) -> Self {
        let mut entries = HashMap::new();
        for record in records {
            let record = record.trimmed();
            let in_scope = record
                .data_table
                .as_deref()
                .is_some_and(|t| tables.iter().any(|wanted| wanted == t));
            if !record.is_active() || !in_scope {
                continue;
            }
            let rule_id = record.rule_id.clone();
            let data_table = record.data_table.clone();
            let entry = match RuleDefinition::try_from(record) {
                Ok(def) => CatalogEntry::Valid(def),
                Err(error) => CatalogEntry::Invalid {
                    rule_id: rule_id.clone(),
                    data_table,
                    error,
                },
            };
            entries.insert(rule_id, entry);
        }
        Self { entries }
    }

    pub fn get(&self, rule_id: &str) -> Option<&CatalogEntry> {
        self.entries.get(rule_id)
    }

    /// O(1) lookup of a validated definition.
    pub fn definition(&self, rule_id: &str) -> Option<&RuleDefinition> {
        match self.entries.get(rule_id) {
            Some(CatalogEntry::Valid(def)) => Some(def),
            _ => None,
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn record(rule_id: &str, table: &str, status: &str) -> RuleRecord {
        RuleRecord {
            rule_id: rule_id.to_string(),
            status: Some(status.to_string()),
            data_source: Some("crm".to_string()),
            data_schema: Some("core".to_string()),
            data_table: Some(table.to_string()),
            data_column: Some("email".to_string()),
            rule_behavior: Some("Standard".to_string()),
            threshold_type: Some("Count".to_string()),
            amber_threshold: Some("5".to_string()),
            red_threshold: Some("10".to_string()),
            numerator_sql: Some("SELECT 1".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_build_filters_inactive_and_foreign_tables() {
        let records = vec![
            record("R-1", "customers", "Active"),
            record("R-2", "customers", "Inactive"),
            record("R-3", "orders", "Active"),
        ];
        let catalog = RuleCatalog::build(records, &["customers".to_string()]);
        assert_eq!(catalog.len(), 1);
        assert!(catalog.definition("R-1").is_some());
        assert!(catalog.get("R-2").is_none());
        assert!(catalog.get("R-3").is_none());
    }

    #[test]
    fn test_build_keeps_invalid_records_as_invalid_entries() {
        let mut bad = record("R-9", "customers", "Active");
        bad.amber_threshold = Some("50".to_string()); // above red
        let catalog = RuleCatalog::build(
            vec![record("R-1", "customers", "Active"), bad],
            &["customers".to_string()],
        );
        assert_eq!(catalog.len(), 2);
        assert!(catalog.definition("R-9").is_none());
        assert!(matches!(
            catalog.get("R-9"),
            Some(CatalogEntry::Invalid { .. })
        ));
        assert_eq!(
            catalog.get("R-9").and_then(|e| e.data_table()),
            Some("customers")
        );
    }

    #[test]
    fn test_build_trims_before_filtering() {
        let mut padded = record("R-1", "customers", "Active");
        padded.data_table = Some("  customers  ".to_string());
        padded.status = Some(" Active ".to_string());
        let catalog = RuleCatalog::build(vec![padded], &["customers".to_string()]);
        assert_eq!(catalog.len(), 1);
    }
}
