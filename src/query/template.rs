//! Fragment-based SQL templates.
//!
//! A [`QueryTemplate`] is a tree of fragments rendered against a [`ParamSet`].
//! Parameter values never enter the rendered SQL text: a [`Frag::Bind`] emits
//! a positional `$n` placeholder and records the value for the driver's
//! parameter substitution, with a repeated name reusing the same placeholder.
//! The only request-derived text that is spliced into the SQL is identifier
//! lists, and every element must pass PostgreSQL identifier validation first.

use std::collections::HashMap;
use std::fmt;

use crate::error::{GatewayError, Result};
use crate::params::{ParamSet, ParamValue};

#[derive(Debug, Clone)]
pub enum Frag {
    /// Literal SQL text, trusted (defined at startup, never request-derived).
    Lit(&'static str),
    /// Named bind slot; renders as `$n` and binds the parameter's value.
    Bind(&'static str),
    /// Emit the body only when the named parameter was supplied.
    IfPresent(&'static str, Vec<Frag>),
    /// Emit the body only when the named parameter was omitted.
    IfAbsent(&'static str, Vec<Frag>),
    /// Iterate over a list-valued parameter: each element is validated as a
    /// PostgreSQL identifier, substituted for every `{}` in `pattern`, and the
    /// results are joined with `separator`. Renders nothing when the
    /// parameter is absent.
    IdentList {
        param: &'static str,
        pattern: &'static str,
        separator: &'static str,
    },
}

/// A value recorded for driver-side parameter substitution.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundValue {
    Text(String),
    Int(i64),
}

impl fmt::Display for BoundValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundValue::Text(s) => write!(f, "'{}'", s),
            BoundValue::Int(i) => write!(f, "{}", i),
        }
    }
}

/// Rendered SQL text plus the ordered bind values it references.
#[derive(Debug, Clone)]
pub struct RenderedQuery {
    pub sql: String,
    /// One entry per distinct `$n` placeholder, in placeholder order.
    pub binds: Vec<(&'static str, BoundValue)>,
}

#[derive(Debug, Clone)]
pub struct QueryTemplate {
    frags: Vec<Frag>,
}

impl QueryTemplate {
    pub fn new(frags: Vec<Frag>) -> Self {
        QueryTemplate { frags }
    }

    pub fn render(&self, params: &ParamSet) -> Result<RenderedQuery> {
        let mut out = RenderedQuery {
            sql: String::new(),
            binds: Vec::new(),
        };
        let mut slots: HashMap<&'static str, usize> = HashMap::new();
        render_frags(&self.frags, params, &mut out, &mut slots)?;
        Ok(out)
    }
}

fn render_frags(
    frags: &[Frag],
    params: &ParamSet,
    out: &mut RenderedQuery,
    slots: &mut HashMap<&'static str, usize>,
) -> Result<()> {
    for frag in frags {
        match frag {
            Frag::Lit(text) => out.sql.push_str(text),
            Frag::Bind(name) => {
                let value = match params.get(name) {
                    Some(ParamValue::Text(s)) => BoundValue::Text(s.clone()),
                    Some(ParamValue::Json(s)) => BoundValue::Text(s.clone()),
                    Some(ParamValue::Int(i)) => BoundValue::Int(*i),
                    Some(ParamValue::List(_)) => {
                        return Err(GatewayError::Internal(format!(
                            "template binds list parameter '{}' as a scalar",
                            name
                        )))
                    }
                    Some(ParamValue::Absent) | None => {
                        return Err(GatewayError::Internal(format!(
                            "template binds absent parameter '{}'",
                            name
                        )))
                    }
                };
                let index = match slots.get(name) {
                    Some(index) => *index,
                    None => {
                        out.binds.push((name, value));
                        let index = out.binds.len();
                        slots.insert(name, index);
                        index
                    }
                };
                out.sql.push('$');
                out.sql.push_str(&index.to_string());
            }
            Frag::IfPresent(name, body) => {
                if params.is_present(name) {
                    render_frags(body, params, out, slots)?;
                }
            }
            Frag::IfAbsent(name, body) => {
                if !params.is_present(name) {
                    render_frags(body, params, out, slots)?;
                }
            }
            Frag::IdentList {
                param,
                pattern,
                separator,
            } => match params.get(param) {
                Some(ParamValue::List(items)) => {
                    let mut rendered = Vec::with_capacity(items.len());
                    for item in items {
                        if !is_valid_identifier(item) {
                            return Err(GatewayError::InvalidParameter {
                                parameter: param.to_string(),
                                cause: format!("'{}' is not a valid identifier", item),
                            });
                        }
                        rendered.push(pattern.replace("{}", item));
                    }
                    out.sql.push_str(&rendered.join(separator));
                }
                Some(ParamValue::Absent) | None => {}
                Some(other) => {
                    return Err(GatewayError::Internal(format!(
                        "template iterates non-list parameter '{}' ({:?})",
                        param, other
                    )))
                }
            },
        }
    }
    Ok(())
}

/// Validate a name for safe splicing into SQL text (lowercase, alphanumeric,
/// underscore, not starting with a digit, PostgreSQL length limit).
pub fn is_valid_identifier(name: &str) -> bool {
    if name.is_empty() || name.len() > 63 {
        return false;
    }

    let first_char = name.chars().next().unwrap();
    if !first_char.is_ascii_lowercase() && first_char != '_' {
        return false;
    }

    name.chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamValue;

    fn params(entries: &[(&'static str, ParamValue)]) -> ParamSet {
        let mut set = ParamSet::default();
        for (name, value) in entries {
            set.insert(*name, value.clone());
        }
        set
    }

    #[test]
    fn test_bind_allocates_positional_slots() {
        let template = QueryTemplate::new(vec![
            Frag::Lit("SELECT * FROM t WHERE a = "),
            Frag::Bind("a"),
            Frag::Lit(" AND b = "),
            Frag::Bind("b"),
        ]);
        let rendered = template
            .render(&params(&[
                ("a", ParamValue::Text("x".to_string())),
                ("b", ParamValue::Int(3)),
            ]))
            .unwrap();

        assert_eq!(rendered.sql, "SELECT * FROM t WHERE a = $1 AND b = $2");
        assert_eq!(
            rendered.binds,
            vec![
                ("a", BoundValue::Text("x".to_string())),
                ("b", BoundValue::Int(3)),
            ]
        );
    }

    #[test]
    fn test_repeated_name_reuses_slot() {
        let template = QueryTemplate::new(vec![
            Frag::Lit("SELECT "),
            Frag::Bind("period"),
            Frag::Lit(" * ("),
            Frag::Bind("period"),
            Frag::Lit(" + 1)"),
        ]);
        let rendered = template
            .render(&params(&[("period", ParamValue::Int(300))]))
            .unwrap();

        assert_eq!(rendered.sql, "SELECT $1 * ($1 + 1)");
        assert_eq!(rendered.binds, vec![("period", BoundValue::Int(300))]);
    }

    #[test]
    fn test_conditional_blocks() {
        let template = QueryTemplate::new(vec![
            Frag::Lit("SELECT 1"),
            Frag::IfPresent(
                "name",
                vec![Frag::Lit(" WHERE name = "), Frag::Bind("name")],
            ),
            Frag::IfAbsent("name", vec![Frag::Lit(" -- unfiltered")]),
        ]);

        let rendered = template
            .render(&params(&[("name", ParamValue::Text("cpu".to_string()))]))
            .unwrap();
        assert_eq!(rendered.sql, "SELECT 1 WHERE name = $1");

        let rendered = template
            .render(&params(&[("name", ParamValue::Absent)]))
            .unwrap();
        assert_eq!(rendered.sql, "SELECT 1 -- unfiltered");
        assert!(rendered.binds.is_empty());
    }

    #[test]
    fn test_ident_list_pattern_and_separator() {
        let template = QueryTemplate::new(vec![
            Frag::Lit("GROUP BY "),
            Frag::IdentList {
                param: "group_by",
                pattern: "dimensions ->> '{}'",
                separator: ", ",
            },
        ]);
        let rendered = template
            .render(&params(&[(
                "group_by",
                ParamValue::List(vec!["host".to_string(), "env".to_string()]),
            )]))
            .unwrap();
        assert_eq!(
            rendered.sql,
            "GROUP BY dimensions ->> 'host', dimensions ->> 'env'"
        );
    }

    #[test]
    fn test_ident_list_rejects_unsafe_identifier() {
        let template = QueryTemplate::new(vec![Frag::IdentList {
            param: "group_by",
            pattern: "{}",
            separator: ", ",
        }]);
        let err = template
            .render(&params(&[(
                "group_by",
                ParamValue::List(vec!["host; DROP TABLE x".to_string()]),
            )]))
            .unwrap_err();
        match err {
            GatewayError::InvalidParameter { parameter, .. } => assert_eq!(parameter, "group_by"),
            other => panic!("expected InvalidParameter, got {:?}", other),
        }
    }

    #[test]
    fn test_bind_of_absent_parameter_is_internal_error() {
        let template = QueryTemplate::new(vec![Frag::Bind("missing")]);
        let err = template.render(&params(&[])).unwrap_err();
        assert!(matches!(err, GatewayError::Internal(_)));
    }

    #[test]
    fn test_valid_identifier() {
        assert!(is_valid_identifier("host"));
        assert!(is_valid_identifier("cpu_usage_0"));
        assert!(is_valid_identifier("_hidden"));

        assert!(!is_valid_identifier("")); // Empty
        assert!(!is_valid_identifier("DROP TABLE x; --")); // SQL injection
        assert!(!is_valid_identifier("Host")); // Contains uppercase
        assert!(!is_valid_identifier("0host")); // Starts with number
        assert!(!is_valid_identifier("avg(value)")); // Expression, not identifier
    }
}
