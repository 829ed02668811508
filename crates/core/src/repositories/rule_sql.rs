//! Read-only executor for compiled rule SQL.
//!
//! Rule SQL comes out of the synthesizer with `:name` placeholders. Binding
//! expands each placeholder to a typed literal through the quoting layer
//! below, then the statement runs inside a READ ONLY transaction with a
//! statement timeout and a single-row shape assertion. Grammar validation
//! has already rejected anything that is not a single SELECT by the time a
//! statement reaches this module.

use cardwatch_primitives::error::ApiError;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::{Bool, Double, Jsonb, Nullable};
use std::collections::HashMap;
use uuid::Uuid;

/// Typed value bound into rule SQL.
#[derive(Debug, Clone)]
pub enum ParamValue {
    Uuid(Uuid),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl ParamValue {
    fn to_sql_literal(&self) -> String {
        match self {
            ParamValue::Uuid(v) => format!("'{}'::uuid", v),
            ParamValue::Int(v) => v.to_string(),
            ParamValue::Float(v) => {
                if v.is_finite() {
                    format!("{:?}", v)
                } else {
                    "0.0".to_string()
                }
            }
            ParamValue::Text(v) => format!("'{}'", v.replace('\'', "''")),
            ParamValue::Timestamp(v) => format!("'{}'::timestamptz", v.to_rfc3339()),
        }
    }
}

/// The one row every rule statement must produce.
#[derive(Debug, QueryableByName)]
pub struct RuleSqlRow {
    #[diesel(sql_type = Bool)]
    pub triggered: bool,
    #[diesel(sql_type = Double)]
    pub observed: f64,
    #[diesel(sql_type = Nullable<Double>)]
    pub baseline: Option<f64>,
    #[diesel(sql_type = Nullable<Jsonb>)]
    pub detail: Option<serde_json::Value>,
}

/// Expands `:name` placeholders into quoted literals. Unknown or unbound
/// placeholders are errors; a bound value with no placeholder is fine (the
/// evaluator always over-provides).
pub fn bind_params(
    sql: &str,
    params: &HashMap<String, ParamValue>,
) -> Result<String, ApiError> {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if c == ':' {
            // "::" is a Postgres cast, not a placeholder
            if matches!(chars.peek(), Some((_, ':'))) {
                out.push(':');
                let (_, next) = chars.next().unwrap();
                out.push(next);
                continue;
            }
            let mut name = String::new();
            while let Some((_, nc)) = chars.peek() {
                if nc.is_ascii_alphanumeric() || *nc == '_' {
                    name.push(*nc);
                    chars.next();
                } else {
                    break;
                }
            }
            if name.is_empty() {
                out.push(':');
                continue;
            }
            let value = params.get(&name).ok_or_else(|| {
                ApiError::RuleSql(format!("Unbound SQL parameter :{}", name))
            })?;
            out.push_str(&value.to_sql_literal());
        } else {
            out.push(c);
        }
    }
    Ok(out)
}

/// Executes bound rule SQL in a read-only transaction. Exactly one row of
/// the declared shape must come back; anything else is a rule defect, not a
/// trigger.
pub fn run_rule_sql(
    conn: &mut PgConnection,
    sql: &str,
    params: &HashMap<String, ParamValue>,
    timeout_ms: u64,
) -> Result<RuleSqlRow, ApiError> {
    let bound = bind_params(sql, params)?;

    conn.transaction::<_, ApiError, _>(|conn| {
        diesel::sql_query("SET TRANSACTION READ ONLY").execute(conn)?;
        diesel::sql_query(format!("SET LOCAL statement_timeout = {}", timeout_ms))
            .execute(conn)?;

        let mut rows: Vec<RuleSqlRow> = diesel::sql_query(&bound)
            .load(conn)
            .map_err(|e| ApiError::RuleSql(format!("Rule SQL failed: {}", e)))?;

        match rows.len() {
            1 => Ok(rows.remove(0)),
            n => Err(ApiError::RuleSql(format!(
                "Rule SQL returned {} rows, expected exactly 1",
                n
            ))),
        }
    })
}
