// vigil-core/src/infrastructure/adapters/duckdb.rs

// Local warehouse adapter: one DuckDB file (or in-memory database) playing
// the roles of query service, append sink and update-by-predicate sink.
// Production deployments plug their own warehouse behind the same ports.

use async_trait::async_trait;
use duckdb::types::{TimeUnit, Value, ValueRef};
use duckdb::{Config, Connection, params_from_iter};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::VigilError;
use crate::infrastructure::error::{DatabaseError, InfrastructureError};
use crate::ports::query::{QueryService, RowValues};
use crate::ports::sink::{AppendSink, RetirePredicate, RetireSink};

pub struct DuckDbWarehouse {
    conn: Arc<Mutex<Connection>>,
}

impl DuckDbWarehouse {
    pub fn new(db_path: &str) -> Result<Self, InfrastructureError> {
        let config = Config::default();
        let conn = if db_path == ":memory:" {
            Connection::open_in_memory_with_flags(config)?
        } else {
            Connection::open_with_flags(db_path, config)?
        };
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Raw statement execution, for setup scripts and ad-hoc maintenance.
    /// Not part of the engine ports.
    pub fn execute_batch(&self, sql: &str) -> Result<(), VigilError> {
        let conn = self.lock()?;
        conn.execute_batch(sql).map_err(db_err)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, VigilError> {
        self.conn.lock().map_err(|_| {
            VigilError::Infrastructure(InfrastructureError::Io(std::io::Error::other(
                "DuckDB Mutex Poisoned",
            )))
        })
    }
}

fn db_err(e: duckdb::Error) -> VigilError {
    VigilError::Infrastructure(InfrastructureError::Database(DatabaseError::DuckDB(e)))
}

#[async_trait]
impl QueryService for DuckDbWarehouse {
    async fn run_scalar(&self, query: &str) -> Result<Option<f64>, VigilError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(query).map_err(db_err)?;
        let mut rows = stmt.query([]).map_err(db_err)?;
        match rows.next().map_err(db_err)? {
            None => Ok(None),
            Some(row) => {
                let value = row.get_ref(0).map_err(db_err)?;
                Ok(scalar_from_ref(value))
            }
        }
    }

    async fn run_rows(&self, query: &str) -> Result<Vec<RowValues>, VigilError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(query).map_err(db_err)?;
        let column_count = stmt.column_count();
        let mut rows = stmt.query([]).map_err(db_err)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(db_err)? {
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                let value = row.get_ref(i).map_err(db_err)?;
                values.push(json_from_ref(value));
            }
            out.push(values);
        }
        Ok(out)
    }
}

#[async_trait]
impl AppendSink for DuckDbWarehouse {
    async fn append_rows(
        &self,
        table: &str,
        rows: &[serde_json::Value],
    ) -> Result<(), VigilError> {
        if rows.is_empty() {
            return Ok(());
        }
        let columns: Vec<String> = match rows[0].as_object() {
            Some(obj) => obj.keys().cloned().collect(),
            None => {
                return Err(VigilError::InternalError(
                    "append_rows expects JSON objects".to_string(),
                ));
            }
        };
        let placeholders = vec!["?"; columns.len()].join(", ");
        let insert = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders
        );

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&insert).map_err(db_err)?;
        for row in rows {
            let obj = row.as_object().ok_or_else(|| {
                VigilError::InternalError("append_rows expects JSON objects".to_string())
            })?;
            let params: Vec<Value> = columns
                .iter()
                .map(|c| to_sql_value(obj.get(c).unwrap_or(&serde_json::Value::Null)))
                .collect();
            stmt.execute(params_from_iter(params)).map_err(db_err)?;
        }
        Ok(())
    }
}

#[async_trait]
impl RetireSink for DuckDbWarehouse {
    async fn retire_latest(
        &self,
        table: &str,
        predicate: &RetirePredicate,
    ) -> Result<(), VigilError> {
        let sql = match predicate {
            RetirePredicate::RulesOwnedByTables {
                rule_definition_table,
                tables,
            } => {
                if tables.is_empty() {
                    return Ok(());
                }
                format!(
                    "UPDATE {table} SET is_latest_snapshot = false \
                     WHERE rule_id IN (SELECT rule_id FROM {rule_definition_table} \
                     WHERE data_table IN ({}))",
                    quoted_list(tables)
                )
            }
            RetirePredicate::DataTables { tables } => {
                if tables.is_empty() {
                    return Ok(());
                }
                format!(
                    "UPDATE {table} SET is_latest_snapshot = false \
                     WHERE data_table IN ({})",
                    quoted_list(tables)
                )
            }
        };
        let conn = self.lock()?;
        conn.execute(&sql, []).map(|_rows| ()).map_err(db_err)
    }
}

fn quoted_list(values: &[String]) -> String {
    values
        .iter()
        .map(|v| format!("'{}'", v.replace('\'', "''")))
        .collect::<Vec<_>>()
        .join(", ")
}

fn scalar_from_ref(value: ValueRef<'_>) -> Option<f64> {
    match value {
        ValueRef::Null => None,
        ValueRef::Boolean(b) => Some(if b { 1.0 } else { 0.0 }),
        ValueRef::TinyInt(v) => Some(v as f64),
        ValueRef::SmallInt(v) => Some(v as f64),
        ValueRef::Int(v) => Some(v as f64),
        ValueRef::BigInt(v) => Some(v as f64),
        ValueRef::HugeInt(v) => Some(v as f64),
        ValueRef::UTinyInt(v) => Some(v as f64),
        ValueRef::USmallInt(v) => Some(v as f64),
        ValueRef::UInt(v) => Some(v as f64),
        ValueRef::UBigInt(v) => Some(v as f64),
        ValueRef::Float(v) => Some(v as f64),
        ValueRef::Double(v) => Some(v),
        ValueRef::Decimal(d) => d.to_string().parse::<f64>().ok(),
        ValueRef::Text(bytes) => String::from_utf8_lossy(bytes).trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn json_from_ref(value: ValueRef<'_>) -> serde_json::Value {
    use serde_json::Value as Json;
    match value {
        ValueRef::Null => Json::Null,
        ValueRef::Boolean(b) => Json::Bool(b),
        ValueRef::TinyInt(v) => Json::from(v),
        ValueRef::SmallInt(v) => Json::from(v),
        ValueRef::Int(v) => Json::from(v),
        ValueRef::BigInt(v) => Json::from(v),
        ValueRef::HugeInt(v) => Json::from(v as i64),
        ValueRef::UTinyInt(v) => Json::from(v),
        ValueRef::USmallInt(v) => Json::from(v),
        ValueRef::UInt(v) => Json::from(v),
        ValueRef::UBigInt(v) => Json::from(v),
        ValueRef::Float(v) => serde_json::Number::from_f64(v as f64)
            .map(Json::Number)
            .unwrap_or(Json::Null),
        ValueRef::Double(v) => serde_json::Number::from_f64(v)
            .map(Json::Number)
            .unwrap_or(Json::Null),
        ValueRef::Decimal(d) => d
            .to_string()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Json::Number)
            .unwrap_or(Json::Null),
        ValueRef::Text(bytes) => Json::String(String::from_utf8_lossy(bytes).to_string()),
        ValueRef::Date32(days) => {
            let date = chrono::NaiveDate::from_ymd_opt(1970, 1, 1)
                .map(|epoch| epoch + chrono::Duration::days(days as i64));
            match date {
                Some(d) => Json::String(d.format("%Y-%m-%d").to_string()),
                None => Json::Null,
            }
        }
        ValueRef::Timestamp(unit, raw) => {
            let dt = match unit {
                TimeUnit::Second => chrono::DateTime::from_timestamp(raw, 0),
                TimeUnit::Millisecond => chrono::DateTime::from_timestamp_millis(raw),
                TimeUnit::Microsecond => chrono::DateTime::from_timestamp_micros(raw),
                TimeUnit::Nanosecond => Some(chrono::DateTime::from_timestamp_nanos(raw)),
            };
            match dt {
                Some(d) => Json::String(d.to_rfc3339()),
                None => Json::Null,
            }
        }
        // Nested/exotic types (blobs, lists, structs) have no place in the
        // engine's row sets
        _ => Json::Null,
    }
}

fn to_sql_value(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::BigInt(i)
            } else {
                Value::Double(n.as_f64().unwrap_or_default())
            }
        }
        serde_json::Value::String(s) => Value::Text(s.clone()),
        other => Value::Text(other.to_string()),
    }
}
