// vigil-core/src/application/summary.rs

// Per-table execution roll-call for the batch, built from the status rows
// and the catalog (which knows each rule's owning table). Rendered as HTML
// for the notifier; the CLI renders the same data as a terminal table.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::health::ExecutionStatusRow;
use crate::domain::rule::RuleCatalog;

#[derive(Debug, Clone, Serialize)]
pub struct TableSummary {
    pub data_table: String,
    pub total_rules: u32,
    pub success_rules: u32,
    pub failed_rules: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionSummary {
    pub snapshot_date: NaiveDate,
    pub tables: Vec<TableSummary>,
}

impl ExecutionSummary {
    pub fn build(
        catalog: &RuleCatalog,
        statuses: &[ExecutionStatusRow],
        snapshot_date: NaiveDate,
    ) -> Self {
        let mut per_table: BTreeMap<String, TableSummary> = BTreeMap::new();
        for status in statuses {
            let table = catalog
                .get(&status.rule_id)
                .and_then(|entry| entry.data_table())
                .unwrap_or("(unknown)")
                .to_string();
            let summary = per_table
                .entry(table.clone())
                .or_insert_with(|| TableSummary {
                    data_table: table,
                    total_rules: 0,
                    success_rules: 0,
                    failed_rules: 0,
                });
            summary.total_rules += 1;
            if status.is_successful {
                summary.success_rules += 1;
            } else {
                summary.failed_rules += 1;
            }
        }
        Self {
            snapshot_date,
            tables: per_table.into_values().collect(),
        }
    }

    pub fn total_rules(&self) -> u32 {
        self.tables.iter().map(|t| t.total_rules).sum()
    }

    pub fn total_passed(&self) -> u32 {
        self.tables.iter().map(|t| t.success_rules).sum()
    }

    pub fn total_failed(&self) -> u32 {
        self.tables.iter().map(|t| t.failed_rules).sum()
    }

    /// HTML rendering handed to the notifier.
    pub fn to_html(&self) -> String {
        if self.tables.is_empty() {
            return format!("<p>No Result found for {}</p>", self.snapshot_date);
        }

        let mut html = String::from(
            "<table border='1'>\n<tr><th>Table_Name</th><th>Total_Rules</th>\
             <th>Success_Rules</th><th>Failed_Rules</th></tr>\n",
        );
        for table in &self.tables {
            html.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                table.data_table, table.total_rules, table.success_rules, table.failed_rules
            ));
        }
        html.push_str("</table>");
        html.push_str("<br><h3>Overall Summary:</h3>");
        html.push_str(
            "<table border='1' cellpadding='5' cellspacing='0' \
             style='border-collapse: collapse;'>",
        );
        html.push_str("<tr><th>Metric</th><th>Value</th></tr>");
        html.push_str(&format!(
            "<tr><td>Total Tables Processed</td><td>{}</td></tr>",
            self.tables.len()
        ));
        html.push_str(&format!(
            "<tr><td>Total Rules Executed</td><td>{}</td></tr>",
            self.total_rules()
        ));
        html.push_str(&format!(
            "<tr><td>Total Rules Passed</td><td>{}</td></tr>",
            self.total_passed()
        ));
        html.push_str(&format!(
            "<tr><td>Total Rules Failed</td><td>{}</td></tr>",
            self.total_failed()
        ));
        html.push_str("</table>");
        html
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::rule::RuleRecord;

    fn rule(rule_id: &str, table: &str) -> RuleRecord {
        RuleRecord {
            rule_id: rule_id.to_string(),
            status: Some("Active".to_string()),
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

    fn status(rule_id: &str, ok: bool) -> ExecutionStatusRow {
        ExecutionStatusRow {
            execution_id: "e".to_string(),
            rule_id: rule_id.to_string(),
            snapshot_date: date(),
            is_latest_snapshot: true,
            is_successful: ok,
            error_message: (!ok).then(|| "boom".to_string()),
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 7).unwrap()
    }

    #[test]
    fn test_build_groups_by_table() {
        let catalog = RuleCatalog::build(
            vec![
                rule("R-1", "customers"),
                rule("R-2", "customers"),
                rule("R-3", "orders"),
            ],
            &["customers".to_string(), "orders".to_string()],
        );
        let statuses = vec![
            status("R-1", true),
            status("R-2", false),
            status("R-3", true),
        ];

        let summary = ExecutionSummary::build(&catalog, &statuses, date());
        assert_eq!(summary.tables.len(), 2);
        assert_eq!(summary.total_rules(), 3);
        assert_eq!(summary.total_passed(), 2);
        assert_eq!(summary.total_failed(), 1);

        let customers = summary
            .tables
            .iter()
            .find(|t| t.data_table == "customers")
            .unwrap();
        assert_eq!(customers.total_rules, 2);
        assert_eq!(customers.failed_rules, 1);
    }

    #[test]
    fn test_html_contains_totals() {
        let catalog = RuleCatalog::build(vec![rule("R-1", "customers")], &["customers".to_string()]);
        let summary = ExecutionSummary::build(&catalog, &[status("R-1", true)], date());
        let html = summary.to_html();
        assert!(html.contains("<td>customers</td>"));
        assert!(html.contains("Total Rules Executed</td><td>1"));
        assert!(html.contains("Total Rules Failed</td><td>0"));
    }

    #[test]
    fn test_html_empty_batch() {
        let catalog = RuleCatalog::build(vec![], &[]);
        let summary = ExecutionSummary::build(&catalog, &[], date());
        assert!(summary.to_html().contains("No Result found"));
    }
}
