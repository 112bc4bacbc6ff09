//! Templated query execution: render, bind, run, and encode the result set.

use std::collections::HashMap;

use deadpool_postgres::Pool;
use postgres_types::{ToSql, Type};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{GatewayError, Result};
use crate::params::ParamSet;
use crate::query::registry::Registry;
use crate::query::template::BoundValue;

/// The gateway's sole output shape: ordered column names plus rows of
/// matching arity.
#[derive(Debug, Serialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// Run one endpoint end to end: coerce parameters, render its template,
/// execute the SQL with the same parameter set bound, and decode all rows.
pub async fn run_query(
    pool: &Pool,
    registry: &Registry,
    route: &str,
    query: &HashMap<String, String>,
) -> Result<ResultSet> {
    let endpoint = registry.endpoint(route)?;
    let params = ParamSet::from_query(endpoint.params, query)?;
    let rendered = registry.template(endpoint.template)?.render(&params)?;

    // Pre-execution trace of the SQL and its bound values, for prototyping
    // observability. Enable with RUST_LOG=pgmon_gateway=debug.
    debug!("rendered SQL for {}:\n{}", endpoint.template, rendered.sql);
    for (name, value) in &rendered.binds {
        debug!("  bind {} = {}", name, value);
    }

    // Scoped client: returned to the pool when it drops, on every exit path.
    let client = pool.get().await?;

    // All binds go over the wire as TEXT or INT8 and are cast SQL-side
    // (::timestamptz, ::jsonb), mirroring text-protocol parameter binding.
    let types: Vec<Type> = rendered
        .binds
        .iter()
        .map(|(_, value)| match value {
            BoundValue::Text(_) => Type::TEXT,
            BoundValue::Int(_) => Type::INT8,
        })
        .collect();

    let statement = client
        .prepare_typed(&rendered.sql, &types)
        .await
        .map_err(|e| GatewayError::QueryFailed {
            template: endpoint.template.to_string(),
            cause: e.to_string(),
        })?;

    // Column names come from the prepared statement, so an empty result still
    // reports its columns.
    let columns: Vec<String> = statement
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();

    let bind_refs: Vec<&(dyn ToSql + Sync)> = rendered
        .binds
        .iter()
        .map(|(_, value)| match value {
            BoundValue::Text(s) => s as &(dyn ToSql + Sync),
            BoundValue::Int(i) => i as &(dyn ToSql + Sync),
        })
        .collect();

    let rows = client
        .query(&statement, &bind_refs)
        .await
        .map_err(|e| GatewayError::QueryFailed {
            template: endpoint.template.to_string(),
            cause: e.to_string(),
        })?;

    let mut result_rows = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut values = Vec::with_capacity(row.columns().len());
        for i in 0..row.columns().len() {
            values.push(row_to_json_value(row, i));
        }
        result_rows.push(values);
    }

    debug!(
        "template {} returned {} rows, {} columns",
        endpoint.template,
        result_rows.len(),
        columns.len()
    );

    Ok(ResultSet {
        columns,
        rows: result_rows,
    })
}

fn row_to_json_value(row: &tokio_postgres::Row, idx: usize) -> Value {
    let column = &row.columns()[idx];
    let col_type = column.type_();

    match *col_type {
        Type::BOOL => row
            .try_get::<_, Option<bool>>(idx)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null),

        Type::INT2 => row
            .try_get::<_, Option<i16>>(idx)
            .ok()
            .flatten()
            .map(|v| Value::Number(v.into()))
            .unwrap_or(Value::Null),

        Type::INT4 => row
            .try_get::<_, Option<i32>>(idx)
            .ok()
            .flatten()
            .map(|v| Value::Number(v.into()))
            .unwrap_or(Value::Null),

        Type::INT8 => row
            .try_get::<_, Option<i64>>(idx)
            .ok()
            .flatten()
            .map(|v| Value::Number(v.into()))
            .unwrap_or(Value::Null),

        Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(idx)
            .ok()
            .flatten()
            .and_then(|v| serde_json::Number::from_f64(v as f64).map(Value::Number))
            .unwrap_or(Value::Null),

        Type::FLOAT8 => row
            .try_get::<_, Option<f64>>(idx)
            .ok()
            .flatten()
            .and_then(|v| serde_json::Number::from_f64(v).map(Value::Number))
            .unwrap_or(Value::Null),

        // Dimension data comes back as a nested JSON object.
        Type::JSON | Type::JSONB => row
            .try_get::<_, Option<Value>>(idx)
            .ok()
            .flatten()
            .unwrap_or(Value::Null),

        // Timestamps serialize as ISO-8601 strings.
        Type::TIMESTAMPTZ | Type::TIMESTAMP => row
            .try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(idx)
            .ok()
            .flatten()
            .map(|v| Value::String(v.to_rfc3339()))
            .or_else(|| {
                row.try_get::<_, Option<chrono::NaiveDateTime>>(idx)
                    .ok()
                    .flatten()
                    .map(|v| Value::String(v.to_string()))
            })
            .unwrap_or(Value::Null),

        Type::DATE => row
            .try_get::<_, Option<chrono::NaiveDate>>(idx)
            .ok()
            .flatten()
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null),

        _ => {
            // Default: try to get as string
            row.try_get::<_, Option<String>>(idx)
                .ok()
                .flatten()
                .map(Value::String)
                .unwrap_or(Value::Null)
        }
    }
}
