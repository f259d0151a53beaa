// vigil-core/src/domain/rule/definition.rs

use serde::{Deserialize, Serialize};

use crate::domain::outcome::CheckError;

/// How a computed value relates to the thresholds: an absolute count or a
/// percentage ratio of two queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThresholdType {
    Count,
    Percent,
}

impl ThresholdType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "count" => Some(ThresholdType::Count),
            "percent" | "percentage" => Some(ThresholdType::Percent),
            _ => None,
        }
    }
}

/// Inclusive lower bounds; invariant `amber <= red` is enforced when the
/// definition is built from a raw record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub amber: f64,
    pub red: f64,
}

/// Scope of a rule: Table when no column is named, Data Element otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleLevel {
    Table,
    #[serde(rename = "Data Element")]
    DataElement,
}

impl RuleLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleLevel::Table => "Table",
            RuleLevel::DataElement => "Data Element",
        }
    }
}

/// The warehouse object a rule watches over.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataLocus {
    pub source: String,
    pub schema: String,
    pub table: String,
    /// `None` marks a table-level rule.
    pub column: Option<String>,
}

/// Evaluation strategy, each variant carrying only the fields it needs.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleBehavior {
    /// Single metric against thresholds, optionally as a percentage of a
    /// denominator query.
    Standard {
        threshold_type: ThresholdType,
        numerator_sql: String,
        denominator_sql: Option<String>,
    },
    /// Percent change of today's metric against the average of the most
    /// recent `process_days` historical snapshots.
    Variance {
        process_days: u32,
        numerator_sql: String,
    },
    /// Reconciliation between two systems. For Percent the ratio is
    /// denominator over numerator, inverted on purpose: the numerator is
    /// the reference side.
    PointToPoint {
        threshold_type: ThresholdType,
        numerator_sql: String,
        denominator_sql: Option<String>,
    },
}

impl RuleBehavior {
    pub fn name(&self) -> &'static str {
        match self {
            RuleBehavior::Standard { .. } => "Standard",
            RuleBehavior::Variance { .. } => "Variance",
            RuleBehavior::PointToPoint { .. } => "P2P",
        }
    }

    /// Threshold type recorded on result rows. Variance always measures a
    /// percent change.
    pub fn threshold_type(&self) -> ThresholdType {
        match self {
            RuleBehavior::Standard { threshold_type, .. }
            | RuleBehavior::PointToPoint { threshold_type, .. } => *threshold_type,
            RuleBehavior::Variance { .. } => ThresholdType::Percent,
        }
    }
}

/// Validated, fully-typed rule definition.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleDefinition {
    pub id: String,
    pub locus: DataLocus,
    pub behavior: RuleBehavior,
    pub thresholds: Thresholds,
    pub cde_flag: bool,
    /// External catalog reference, carried through to health rows untouched.
    pub element_id: Option<String>,
    pub dq_dimension: Option<String>,
}

impl RuleDefinition {
    pub fn level(&self) -> RuleLevel {
        if self.locus.column.is_some() {
            RuleLevel::DataElement
        } else {
            RuleLevel::Table
        }
    }
}

/// Raw rule row as loaded from the warehouse: everything optional, strings
/// untrimmed. Data stewards edit these by hand, so whitespace and partially
/// filled rows are expected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleRecord {
    pub rule_id: String,
    pub status: Option<String>,
    pub data_source: Option<String>,
    pub data_schema: Option<String>,
    pub data_table: Option<String>,
    pub data_column: Option<String>,
    pub cde_flag: Option<String>,
    pub element_id: Option<String>,
    pub dq_dimension: Option<String>,
    pub rule_behavior: Option<String>,
    pub threshold_type: Option<String>,
    pub amber_threshold: Option<String>,
    pub red_threshold: Option<String>,
    pub process_days: Option<String>,
    pub numerator_sql: Option<String>,
    pub denominator_sql: Option<String>,
}

impl RuleRecord {
    /// Field-trimming normalization pass. Blank-only fields collapse to None.
    pub fn trimmed(mut self) -> Self {
        fn clean(field: &mut Option<String>) {
            if let Some(v) = field.take() {
                let t = v.trim();
                if !t.is_empty() {
                    *field = Some(t.to_string());
                }
            }
        }
        self.rule_id = self.rule_id.trim().to_string();
        clean(&mut self.status);
        clean(&mut self.data_source);
        clean(&mut self.data_schema);
        clean(&mut self.data_table);
        clean(&mut self.data_column);
        clean(&mut self.cde_flag);
        clean(&mut self.element_id);
        clean(&mut self.dq_dimension);
        clean(&mut self.rule_behavior);
        clean(&mut self.threshold_type);
        clean(&mut self.amber_threshold);
        clean(&mut self.red_threshold);
        clean(&mut self.process_days);
        clean(&mut self.numerator_sql);
        clean(&mut self.denominator_sql);
        self
    }

    pub fn is_active(&self) -> bool {
        self.status.as_deref() == Some("Active")
    }
}

impl TryFrom<RuleRecord> for RuleDefinition {
    type Error = CheckError;

    /// Validation boundary for rule definitions. A failure here is local and
    /// recoverable: the coordinator turns it into a failed execution-status
    /// row for this rule and moves on.
    fn try_from(record: RuleRecord) -> Result<Self, Self::Error> {
        let rule_id = record.rule_id.clone();
        if rule_id.is_empty() {
            return Err(CheckError::Validation("empty RULE_ID".to_string()));
        }

        let locus = DataLocus {
            source: required(&record.data_source, "DATA_SOURCE", &rule_id)?,
            schema: required(&record.data_schema, "DATA_SCHEMA", &rule_id)?,
            table: required(&record.data_table, "DATA_TABLE", &rule_id)?,
            column: record.data_column.clone(),
        };

        let amber = threshold(&record.amber_threshold, "AMBER_THRESHOLD", &rule_id)?;
        let red = threshold(&record.red_threshold, "RED_THRESHOLD", &rule_id)?;
        if amber > red {
            return Err(CheckError::Validation(format!(
                "AMBER_THRESHOLD({amber}) cannot be greater than RED_THRESHOLD({red}) for rule ID {rule_id}"
            )));
        }

        let numerator_sql = required(&record.numerator_sql, "NUMERATOR_SQL", &rule_id)?;

        let behavior = match record.rule_behavior.as_deref() {
            Some("Standard") => RuleBehavior::Standard {
                threshold_type: threshold_type(&record.threshold_type, "Standard", &rule_id)?,
                numerator_sql,
                denominator_sql: record.denominator_sql.clone(),
            },
            Some("Variance") => {
                let raw = record.process_days.as_deref().ok_or_else(|| {
                    CheckError::Validation(format!(
                        "Variance check failed: NULL for PROCESS_DAYS for rule ID {rule_id}"
                    ))
                })?;
                let process_days = raw.parse::<u32>().map_err(|_| {
                    CheckError::Validation(format!(
                        "Variance check failed: invalid PROCESS_DAYS '{raw}' for rule ID {rule_id}"
                    ))
                })?;
                RuleBehavior::Variance {
                    process_days,
                    numerator_sql,
                }
            }
            Some("P2P") | Some("PointToPoint") | Some("Point to Point") => {
                let tt = threshold_type(&record.threshold_type, "P2P", &rule_id)?;
                if tt == ThresholdType::Percent && record.denominator_sql.is_none() {
                    return Err(CheckError::Validation(format!(
                        "P2P check failed: NULL for DENOMINATOR_SQL for rule ID {rule_id}"
                    )));
                }
                RuleBehavior::PointToPoint {
                    threshold_type: tt,
                    numerator_sql,
                    denominator_sql: record.denominator_sql.clone(),
                }
            }
            Some(other) => {
                return Err(CheckError::Validation(format!(
                    "unknown RULE_BEHAVIOR '{other}' for rule ID {rule_id}"
                )));
            }
            None => {
                return Err(CheckError::Validation(format!(
                    "NULL RULE_BEHAVIOR for rule ID {rule_id}"
                )));
            }
        };

        Ok(RuleDefinition {
            id: rule_id,
            locus,
            behavior,
            thresholds: Thresholds { amber, red },
            cde_flag: record.cde_flag.as_deref() == Some("Y"),
            element_id: record.element_id,
            dq_dimension: record.dq_dimension,
        })
    }
}

fn required(field: &Option<String>, name: &str, rule_id: &str) -> Result<String, CheckError> {
    field.clone().ok_or_else(|| {
        CheckError::Validation(format!("NULL {name} for rule ID {rule_id}"))
    })
}

fn threshold(field: &Option<String>, name: &str, rule_id: &str) -> Result<f64, CheckError> {
    let raw = field.as_deref().ok_or_else(|| {
        CheckError::Validation(format!(
            "check failed: NULL for {name} for rule ID {rule_id}"
        ))
    })?;
    raw.parse::<f64>().map_err(|_| {
        CheckError::Validation(format!(
            "check failed: invalid {name} '{raw}' for rule ID {rule_id}"
        ))
    })
}

fn threshold_type(
    field: &Option<String>,
    behavior: &str,
    rule_id: &str,
) -> Result<ThresholdType, CheckError> {
    let raw = field.as_deref().ok_or_else(|| {
        CheckError::Validation(format!(
            "{behavior} check failed: NULL for THRESHOLD_TYPE for rule ID {rule_id}"
        ))
    })?;
    ThresholdType::parse(raw).ok_or_else(|| {
        CheckError::Validation(format!(
            "{behavior} check failed: unknown THRESHOLD_TYPE '{raw}' for rule ID {rule_id}"
        ))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn base_record() -> RuleRecord {
        RuleRecord {
            rule_id: "R-001".to_string(),
            status: Some("Active".to_string()),
            data_source: Some("crm".to_string()),
            data_schema: Some("core".to_string()),
            data_table: Some("customers".to_string()),
            data_column: Some("email".to_string()),
            cde_flag: Some("Y".to_string()),
            rule_behavior: Some("Standard".to_string()),
            threshold_type: Some("Count".to_string()),
            amber_threshold: Some("5".to_string()),
            red_threshold: Some("10".to_string()),
            numerator_sql: Some("SELECT COUNT(*) FROM customers WHERE email IS NULL".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_standard_record_converts() {
        let def = RuleDefinition::try_from(base_record()).expect("valid record");
        assert_eq!(def.id, "R-001");
        assert_eq!(def.level(), RuleLevel::DataElement);
        assert!(def.cde_flag);
        assert_eq!(def.thresholds.amber, 5.0);
        assert!(matches!(
            def.behavior,
            RuleBehavior::Standard {
                threshold_type: ThresholdType::Count,
                ..
            }
        ));
    }

    #[test]
    fn test_table_level_when_column_missing() {
        let mut record = base_record();
        record.data_column = None;
        let def = RuleDefinition::try_from(record).expect("valid record");
        assert_eq!(def.level(), RuleLevel::Table);
    }

    #[test]
    fn test_amber_above_red_rejected() {
        let mut record = base_record();
        record.amber_threshold = Some("20".to_string());
        let err = RuleDefinition::try_from(record).expect_err("must fail");
        assert!(matches!(err, CheckError::Validation(_)));
        assert!(err.to_string().contains("cannot be greater than"));
    }

    #[test]
    fn test_variance_requires_process_days() {
        let mut record = base_record();
        record.rule_behavior = Some("Variance".to_string());
        record.process_days = None;
        let err = RuleDefinition::try_from(record).expect_err("must fail");
        assert!(err.to_string().contains("NULL for PROCESS_DAYS"));
    }

    #[test]
    fn test_p2p_percent_requires_denominator() {
        let mut record = base_record();
        record.rule_behavior = Some("P2P".to_string());
        record.threshold_type = Some("Percent".to_string());
        record.denominator_sql = None;
        let err = RuleDefinition::try_from(record).expect_err("must fail");
        assert!(err.to_string().contains("NULL for DENOMINATOR_SQL"));
    }

    #[test]
    fn test_p2p_count_does_not_require_denominator() {
        let mut record = base_record();
        record.rule_behavior = Some("P2P".to_string());
        record.threshold_type = Some("Count".to_string());
        record.denominator_sql = None;
        assert!(RuleDefinition::try_from(record).is_ok());
    }

    #[test]
    fn test_unknown_behavior_rejected() {
        let mut record = base_record();
        record.rule_behavior = Some("Fuzzy".to_string());
        let err = RuleDefinition::try_from(record).expect_err("must fail");
        assert!(err.to_string().contains("unknown RULE_BEHAVIOR"));
    }

    #[test]
    fn test_trimmed_normalizes_whitespace() {
        let record = RuleRecord {
            rule_id: "  R-002  ".to_string(),
            status: Some(" Active ".to_string()),
            data_table: Some("  orders".to_string()),
            cde_flag: Some("   ".to_string()),
            ..Default::default()
        }
        .trimmed();
        assert_eq!(record.rule_id, "R-002");
        assert!(record.is_active());
        assert_eq!(record.data_table.as_deref(), Some("orders"));
        // blank-only collapses to None
        assert_eq!(record.cde_flag, None);
    }
}
