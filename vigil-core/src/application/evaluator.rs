// vigil-core/src/application/evaluator.rs

// Dispatches one rule definition to its behavior-specific check. Every
// failure path returns a typed CheckError; the coordinator converts those
// into failed execution-status rows, so nothing here ever aborts a batch.

use chrono::NaiveDate;
use tracing::debug;

use crate::domain::outcome::{CheckError, Measurement, RuleOutcome};
use crate::domain::rag::RagStatus;
use crate::domain::rule::{RuleBehavior, RuleDefinition, ThresholdType, Thresholds};
use crate::infrastructure::config::WarehouseLayout;
use crate::ports::query::QueryService;

/// Per-batch execution context. Passed explicitly into every check so tests
/// can inject doubles and two batches never share hidden client state.
pub struct EvalContext<'a> {
    pub query: &'a dyn QueryService,
    pub layout: &'a WarehouseLayout,
    pub snapshot_date: NaiveDate,
}

pub async fn evaluate(def: &RuleDefinition, ctx: &EvalContext<'_>) -> RuleOutcome {
    debug!(rule_id = %def.id, behavior = def.behavior.name(), "Evaluating rule");
    match &def.behavior {
        RuleBehavior::Standard {
            threshold_type,
            numerator_sql,
            denominator_sql,
        } => {
            standard_check(
                def,
                *threshold_type,
                numerator_sql,
                denominator_sql.as_deref(),
                ctx,
            )
            .await
        }
        RuleBehavior::Variance {
            process_days,
            numerator_sql,
        } => variance_check(def, *process_days, numerator_sql, ctx).await,
        RuleBehavior::PointToPoint {
            threshold_type,
            numerator_sql,
            denominator_sql,
        } => {
            ptp_check(
                def,
                *threshold_type,
                numerator_sql,
                denominator_sql.as_deref(),
                ctx,
            )
            .await
        }
    }
}

// ----------------- Standard Check -----------------

async fn standard_check(
    def: &RuleDefinition,
    threshold_type: ThresholdType,
    numerator_sql: &str,
    denominator_sql: Option<&str>,
    ctx: &EvalContext<'_>,
) -> RuleOutcome {
    let numerator = run_numerator(numerator_sql, ctx).await?;

    match threshold_type {
        ThresholdType::Count => {
            let value = numerator.ok_or_else(|| CheckError::Query("NULL numerator".to_string()))?;
            Ok(measure(value, Some(value), None, def.thresholds))
        }
        ThresholdType::Percent => {
            // Denominator is only issued once the numerator is known usable
            let numerator =
                numerator.ok_or_else(|| CheckError::Query("NULL numerator".to_string()))?;
            let denominator_sql = denominator_sql.ok_or_else(|| {
                CheckError::Validation(format!(
                    "Standard check failed: NULL for DENOMINATOR_SQL for rule ID {}",
                    def.id
                ))
            })?;
            let denominator = ctx
                .query
                .run_scalar(denominator_sql)
                .await
                .map_err(|e| CheckError::Query(format!("DENOMINATOR_SQL error: {e}")))?;
            match denominator {
                None => Err(CheckError::Arithmetic("NULL denominator".to_string())),
                Some(d) if d == 0.0 => {
                    Err(CheckError::Arithmetic("NULL denominator".to_string()))
                }
                Some(d) => {
                    let value = round2(100.0 * numerator / d);
                    Ok(measure(value, Some(numerator), Some(d), def.thresholds))
                }
            }
        }
    }
}

// ----------------- Variance Check -----------------

async fn variance_check(
    def: &RuleDefinition,
    process_days: u32,
    numerator_sql: &str,
    ctx: &EvalContext<'_>,
) -> RuleOutcome {
    let numerator = run_numerator(numerator_sql, ctx)
        .await?
        .ok_or_else(|| CheckError::Query("NULL numerator".to_string()))?;

    let history_filter = format!(
        "rule_id = '{}' AND is_latest_snapshot = false",
        sql_literal(&def.id)
    );
    let count_sql = format!(
        "SELECT COUNT(*) FROM {} WHERE {}",
        ctx.layout.rule_results, history_filter
    );
    let prior_snapshots = ctx
        .query
        .run_scalar(&count_sql)
        .await
        .map_err(|e| CheckError::Query(format!("history count error: {e}")))?
        .unwrap_or(0.0) as u64;

    // Bootstrap policy: insufficient history is not a defect. The rule is not
    // yet comparable, so it is forced Green with no computed value.
    if prior_snapshots < u64::from(process_days) {
        debug!(
            rule_id = %def.id,
            prior_snapshots,
            process_days,
            "Variance bootstrap: insufficient history, forcing Green"
        );
        return Ok(Measurement {
            rule_value: None,
            numerator: Some(numerator),
            denominator: None,
            rag: RagStatus::Green,
        });
    }

    let avg_sql = format!(
        "WITH recent_n_records AS ( \
           SELECT snapshot_date, numerator_result \
           FROM {} WHERE {} \
           ORDER BY snapshot_date DESC LIMIT {}) \
         SELECT AVG(numerator_result) FROM recent_n_records",
        ctx.layout.rule_results, history_filter, process_days
    );
    let average = ctx
        .query
        .run_scalar(&avg_sql)
        .await
        .map_err(|e| CheckError::Query(format!("N-day AVG error: {e}")))?
        .ok_or_else(|| {
            // Count said we have enough rows, so a NULL average means the
            // history itself is unusable
            CheckError::Arithmetic(format!(
                "Variance check failed: N-day AVG result is NULL for rule ID {}",
                def.id
            ))
        })?;
    let average = round2(average);
    if average == 0.0 {
        return Err(CheckError::Arithmetic(format!(
            "Variance check failed: N-day AVG is ZERO for rule ID {} (division by zero risk)",
            def.id
        )));
    }

    let value = round2(100.0 * (numerator - average).abs() / average);
    Ok(measure(value, Some(numerator), Some(average), def.thresholds))
}

// ----------------- Point to Point Check -----------------

async fn ptp_check(
    def: &RuleDefinition,
    threshold_type: ThresholdType,
    numerator_sql: &str,
    denominator_sql: Option<&str>,
    ctx: &EvalContext<'_>,
) -> RuleOutcome {
    let numerator = run_numerator(numerator_sql, ctx)
        .await?
        .ok_or_else(|| CheckError::Query("NULL numerator".to_string()))?;

    if threshold_type == ThresholdType::Count {
        return Ok(measure(numerator, Some(numerator), None, def.thresholds));
    }

    if numerator == 0.0 {
        return Err(CheckError::Arithmetic(format!(
            "P2P check failed: numerator result is ZERO for rule ID {} (division by zero risk)",
            def.id
        )));
    }

    // Guaranteed by definition validation for Percent rules
    let denominator_sql = denominator_sql.ok_or_else(|| {
        CheckError::Validation(format!(
            "P2P check failed: NULL for DENOMINATOR_SQL for rule ID {}",
            def.id
        ))
    })?;
    let denominator = ctx
        .query
        .run_scalar(denominator_sql)
        .await
        .map_err(|e| CheckError::Query(format!("DENOMINATOR_SQL error: {e}")))?
        .ok_or_else(|| CheckError::Arithmetic("NULL denominator".to_string()))?;

    // Ratio is denominator over numerator, inverted relative to Standard:
    // the numerator side is the reference system being reconciled against.
    let value = round2(100.0 * denominator / numerator);
    Ok(measure(value, Some(numerator), Some(denominator), def.thresholds))
}

// ----------------- Helpers -----------------

async fn run_numerator(
    numerator_sql: &str,
    ctx: &EvalContext<'_>,
) -> Result<Option<f64>, CheckError> {
    ctx.query
        .run_scalar(numerator_sql)
        .await
        .map_err(|e| CheckError::Query(format!("NUMERATOR_SQL error: {e}")))
}

fn measure(
    value: f64,
    numerator: Option<f64>,
    denominator: Option<f64>,
    thresholds: Thresholds,
) -> Measurement {
    Measurement {
        rule_value: Some(value),
        numerator,
        denominator,
        rag: RagStatus::classify(value, thresholds.amber, thresholds.red),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn sql_literal(raw: &str) -> String {
    raw.replace('\'', "''")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::VigilError;
    use crate::domain::rule::{DataLocus, RuleBehavior};
    use crate::ports::query::RowValues;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    // --- MOCK QUERY SERVICE ---
    // Scripted responses matched by substring, issued queries recorded.
    #[derive(Clone, Default)]
    struct MockQuery {
        responses: Vec<(String, Result<Option<f64>, String>)>,
        pub issued: Arc<Mutex<Vec<String>>>,
    }

    impl MockQuery {
        fn on(mut self, needle: &str, response: Result<Option<f64>, &str>) -> Self {
            self.responses
                .push((needle.to_string(), response.map_err(str::to_string)));
            self
        }
    }

    #[async_trait]
    impl QueryService for MockQuery {
        async fn run_scalar(&self, query: &str) -> Result<Option<f64>, VigilError> {
            self.issued.lock().unwrap().push(query.to_string());
            for (needle, response) in &self.responses {
                if query.contains(needle.as_str()) {
                    return response
                        .clone()
                        .map_err(VigilError::InternalError);
                }
            }
            panic!("unexpected query: {query}");
        }

        async fn run_rows(&self, _query: &str) -> Result<Vec<RowValues>, VigilError> {
            Ok(vec![])
        }
    }

    fn def(behavior: RuleBehavior, amber: f64, red: f64) -> RuleDefinition {
        RuleDefinition {
            id: "R-1".to_string(),
            locus: DataLocus {
                source: "crm".to_string(),
                schema: "core".to_string(),
                table: "customers".to_string(),
                column: Some("email".to_string()),
            },
            behavior,
            thresholds: Thresholds { amber, red },
            cde_flag: false,
            element_id: None,
            dq_dimension: None,
        }
    }

    fn ctx<'a>(query: &'a MockQuery, layout: &'a WarehouseLayout) -> EvalContext<'a> {
        EvalContext {
            query,
            layout,
            snapshot_date: NaiveDate::from_ymd_opt(2026, 8, 7).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_standard_count_boundary_is_red() {
        let query = MockQuery::default().on("SELECT_NUM", Ok(Some(10.0)));
        let layout = WarehouseLayout::default();
        let rule = def(
            RuleBehavior::Standard {
                threshold_type: ThresholdType::Count,
                numerator_sql: "SELECT_NUM".to_string(),
                denominator_sql: None,
            },
            5.0,
            10.0,
        );

        let m = evaluate(&rule, &ctx(&query, &layout)).await.unwrap();
        assert_eq!(m.rule_value, Some(10.0));
        assert_eq!(m.rag, RagStatus::Red);
        assert_eq!(m.denominator, None);
        // a Count rule issues exactly one query
        assert_eq!(query.issued.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_standard_percent_rounds_to_two_decimals() {
        let query = MockQuery::default()
            .on("SELECT_NUM", Ok(Some(1.0)))
            .on("SELECT_DEN", Ok(Some(3.0)));
        let layout = WarehouseLayout::default();
        let rule = def(
            RuleBehavior::Standard {
                threshold_type: ThresholdType::Percent,
                numerator_sql: "SELECT_NUM".to_string(),
                denominator_sql: Some("SELECT_DEN".to_string()),
            },
            50.0,
            90.0,
        );

        let m = evaluate(&rule, &ctx(&query, &layout)).await.unwrap();
        assert_eq!(m.rule_value, Some(33.33));
        assert_eq!(m.rag, RagStatus::Green);
    }

    #[tokio::test]
    async fn test_standard_percent_zero_denominator_fails() {
        let query = MockQuery::default()
            .on("SELECT_NUM", Ok(Some(7.0)))
            .on("SELECT_DEN", Ok(Some(0.0)));
        let layout = WarehouseLayout::default();
        let rule = def(
            RuleBehavior::Standard {
                threshold_type: ThresholdType::Percent,
                numerator_sql: "SELECT_NUM".to_string(),
                denominator_sql: Some("SELECT_DEN".to_string()),
            },
            5.0,
            10.0,
        );

        let err = evaluate(&rule, &ctx(&query, &layout)).await.unwrap_err();
        assert_eq!(err, CheckError::Arithmetic("NULL denominator".to_string()));
        // denominator query was still issued (numerator was usable)
        assert_eq!(query.issued.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_standard_percent_null_numerator_skips_denominator() {
        let query = MockQuery::default().on("SELECT_NUM", Ok(None));
        let layout = WarehouseLayout::default();
        let rule = def(
            RuleBehavior::Standard {
                threshold_type: ThresholdType::Percent,
                numerator_sql: "SELECT_NUM".to_string(),
                denominator_sql: Some("SELECT_DEN".to_string()),
            },
            5.0,
            10.0,
        );

        let err = evaluate(&rule, &ctx(&query, &layout)).await.unwrap_err();
        assert!(matches!(err, CheckError::Query(_)));
        assert!(err.to_string().contains("NULL numerator"));
        let issued = query.issued.lock().unwrap();
        assert_eq!(issued.len(), 1, "denominator must not be issued");
    }

    #[tokio::test]
    async fn test_variance_bootstrap_forces_green() {
        let query = MockQuery::default()
            .on("SELECT_NUM", Ok(Some(900.0)))
            .on("SELECT COUNT(*)", Ok(Some(3.0)));
        let layout = WarehouseLayout::default();
        let rule = def(
            RuleBehavior::Variance {
                process_days: 7,
                numerator_sql: "SELECT_NUM".to_string(),
            },
            10.0,
            20.0,
        );

        // only 3 prior snapshots for a 7-day window: not yet comparable
        let m = evaluate(&rule, &ctx(&query, &layout)).await.unwrap();
        assert_eq!(m.rule_value, None);
        assert_eq!(m.rag, RagStatus::Green);
        assert_eq!(m.numerator, Some(900.0));
    }

    #[tokio::test]
    async fn test_variance_percent_change_against_history() {
        let query = MockQuery::default()
            .on("SELECT_NUM", Ok(Some(120.0)))
            .on("SELECT COUNT(*)", Ok(Some(9.0)))
            .on("AVG(numerator_result)", Ok(Some(100.0)));
        let layout = WarehouseLayout::default();
        let rule = def(
            RuleBehavior::Variance {
                process_days: 7,
                numerator_sql: "SELECT_NUM".to_string(),
            },
            10.0,
            30.0,
        );

        let m = evaluate(&rule, &ctx(&query, &layout)).await.unwrap();
        // |120 - 100| / 100 = 20%
        assert_eq!(m.rule_value, Some(20.0));
        assert_eq!(m.rag, RagStatus::Amber);
        assert_eq!(m.denominator, Some(100.0));

        // history queries target the results table and non-latest rows only
        let issued = query.issued.lock().unwrap();
        assert!(issued[1].contains("dq_rule_results"));
        assert!(issued[1].contains("is_latest_snapshot = false"));
        assert!(issued[2].contains("ORDER BY snapshot_date DESC LIMIT 7"));
    }

    #[tokio::test]
    async fn test_variance_zero_average_is_arithmetic_error() {
        let query = MockQuery::default()
            .on("SELECT_NUM", Ok(Some(50.0)))
            .on("SELECT COUNT(*)", Ok(Some(10.0)))
            .on("AVG(numerator_result)", Ok(Some(0.0)));
        let layout = WarehouseLayout::default();
        let rule = def(
            RuleBehavior::Variance {
                process_days: 7,
                numerator_sql: "SELECT_NUM".to_string(),
            },
            10.0,
            20.0,
        );

        let err = evaluate(&rule, &ctx(&query, &layout)).await.unwrap_err();
        assert!(matches!(err, CheckError::Arithmetic(_)));
        assert!(err.to_string().contains("ZERO"));
    }

    #[tokio::test]
    async fn test_variance_null_average_is_reported() {
        let query = MockQuery::default()
            .on("SELECT_NUM", Ok(Some(50.0)))
            .on("SELECT COUNT(*)", Ok(Some(10.0)))
            .on("AVG(numerator_result)", Ok(None));
        let layout = WarehouseLayout::default();
        let rule = def(
            RuleBehavior::Variance {
                process_days: 7,
                numerator_sql: "SELECT_NUM".to_string(),
            },
            10.0,
            20.0,
        );

        let err = evaluate(&rule, &ctx(&query, &layout)).await.unwrap_err();
        assert!(err.to_string().contains("N-day AVG result is NULL"));
    }

    #[tokio::test]
    async fn test_ptp_zero_numerator_never_divides() {
        let query = MockQuery::default().on("SELECT_NUM", Ok(Some(0.0)));
        let layout = WarehouseLayout::default();
        let rule = def(
            RuleBehavior::PointToPoint {
                threshold_type: ThresholdType::Percent,
                numerator_sql: "SELECT_NUM".to_string(),
                denominator_sql: Some("SELECT_DEN".to_string()),
            },
            90.0,
            110.0,
        );

        let err = evaluate(&rule, &ctx(&query, &layout)).await.unwrap_err();
        assert!(matches!(err, CheckError::Arithmetic(_)));
        assert!(err.to_string().contains("ZERO"));
        // the denominator query is never reached
        assert_eq!(query.issued.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ptp_percent_ratio_is_inverted() {
        let query = MockQuery::default()
            .on("SELECT_NUM", Ok(Some(200.0)))
            .on("SELECT_DEN", Ok(Some(190.0)));
        let layout = WarehouseLayout::default();
        let rule = def(
            RuleBehavior::PointToPoint {
                threshold_type: ThresholdType::Percent,
                numerator_sql: "SELECT_NUM".to_string(),
                denominator_sql: Some("SELECT_DEN".to_string()),
            },
            96.0,
            99.0,
        );

        let m = evaluate(&rule, &ctx(&query, &layout)).await.unwrap();
        // 100 * 190 / 200, not 200/190
        assert_eq!(m.rule_value, Some(95.0));
        assert_eq!(m.rag, RagStatus::Green);
    }

    #[tokio::test]
    async fn test_query_failure_becomes_query_error() {
        let query = MockQuery::default().on("SELECT_NUM", Err("relation not found"));
        let layout = WarehouseLayout::default();
        let rule = def(
            RuleBehavior::Standard {
                threshold_type: ThresholdType::Count,
                numerator_sql: "SELECT_NUM".to_string(),
                denominator_sql: None,
            },
            5.0,
            10.0,
        );

        let err = evaluate(&rule, &ctx(&query, &layout)).await.unwrap_err();
        assert!(matches!(err, CheckError::Query(_)));
        assert!(err.to_string().contains("NUMERATOR_SQL error"));
        assert!(err.to_string().contains("relation not found"));
    }
}
