//! Query-string parameter extraction and coercion.
//!
//! Every endpoint declares an ordered list of (name, coercion) pairs. Each
//! declared parameter is read from the request query string and coerced into
//! a [`ParamValue`]; a parameter missing from the request becomes
//! [`ParamValue::Absent`], which is distinct from an empty string and lets
//! templates drop whole SQL clauses for omitted parameters.

use std::collections::{BTreeMap, HashMap};

use crate::error::{GatewayError, Result};

/// A coerced query parameter, or the marker for one that was not supplied.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Absent,
    Text(String),
    Int(i64),
    /// Ordered list of raw segments, used for identifier-list rendering.
    List(Vec<String>),
    /// A JSON object pre-serialized to text, bound as a text parameter and
    /// cast to jsonb in SQL.
    Json(String),
}

impl ParamValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, ParamValue::Absent)
    }
}

/// How a raw query-string value is turned into a [`ParamValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    /// Pass the raw string through unchanged.
    Identity,
    /// Base-10 integer.
    Integer,
    /// Split on `,`; no trimming, no dedup, empty segments preserved.
    List,
    /// Split on `,` into `key:value` pairs; pairs whose value is `*` are
    /// dropped (wildcard means "no filter on this dimension"); the rest are
    /// serialized to a JSON object string.
    Dict,
}

impl Coercion {
    pub fn apply(&self, name: &str, raw: &str) -> Result<ParamValue> {
        match self {
            Coercion::Identity => Ok(ParamValue::Text(raw.to_string())),
            Coercion::Integer => raw
                .parse::<i64>()
                .map(ParamValue::Int)
                .map_err(|_| GatewayError::InvalidParameter {
                    parameter: name.to_string(),
                    cause: format!("'{}' is not a valid integer", raw),
                }),
            Coercion::List => Ok(ParamValue::List(
                raw.split(',').map(str::to_string).collect(),
            )),
            Coercion::Dict => {
                let mut map = serde_json::Map::new();
                for segment in raw.split(',') {
                    let parts: Vec<&str> = segment.split(':').collect();
                    if parts.len() != 2 {
                        return Err(GatewayError::InvalidParameter {
                            parameter: name.to_string(),
                            cause: format!("'{}' is not a 'key:value' pair", segment),
                        });
                    }
                    // '*' means "any value" - no filter on this dimension.
                    if parts[1] == "*" {
                        continue;
                    }
                    map.insert(
                        parts[0].to_string(),
                        serde_json::Value::String(parts[1].to_string()),
                    );
                }
                let encoded = serde_json::to_string(&serde_json::Value::Object(map))
                    .map_err(|e| GatewayError::Internal(e.to_string()))?;
                Ok(ParamValue::Json(encoded))
            }
        }
    }
}

/// One endpoint's declared parameter: query-string name plus coercion rule.
pub type ParamSpec = (&'static str, Coercion);

/// The per-request mapping from parameter name to coerced value.
///
/// Built once per request and consumed both by template rendering and by SQL
/// parameter binding, so the two always see the same values.
#[derive(Debug, Clone, Default)]
pub struct ParamSet {
    values: BTreeMap<&'static str, ParamValue>,
}

impl ParamSet {
    /// Coerce the declared parameters out of a decoded query-string map.
    pub fn from_query(specs: &[ParamSpec], query: &HashMap<String, String>) -> Result<Self> {
        let mut values = BTreeMap::new();
        for (name, coercion) in specs {
            let value = match query.get(*name) {
                Some(raw) => coercion.apply(name, raw)?,
                None => ParamValue::Absent,
            };
            values.insert(*name, value);
        }
        Ok(ParamSet { values })
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn is_present(&self, name: &str) -> bool {
        matches!(self.values.get(name), Some(v) if !v.is_absent())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&&'static str, &ParamValue)> {
        self.values.iter()
    }

    #[cfg(test)]
    pub fn insert(&mut self, name: &'static str, value: ParamValue) {
        self.values.insert(name, value);
    }
}
