//! The endpoint registry: routes, their parameter lists, and the SQL
//! templates they execute. Built once at startup and shared read-only across
//! requests.

use std::collections::HashMap;

use crate::error::{GatewayError, Result};
use crate::params::{Coercion, ParamSpec};
use crate::query::template::{Frag, QueryTemplate};

use crate::query::template::Frag::{Bind, IdentList, IfAbsent, IfPresent, Lit};

/// One route's descriptor: the template it runs and the ordered parameters it
/// reads from the query string.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub route: &'static str,
    pub template: &'static str,
    pub params: &'static [ParamSpec],
}

pub struct Registry {
    endpoints: HashMap<&'static str, Endpoint>,
    templates: HashMap<&'static str, QueryTemplate>,
}

impl Registry {
    pub fn new() -> Self {
        let mut endpoints = HashMap::new();
        for endpoint in ENDPOINTS {
            endpoints.insert(endpoint.route, endpoint.clone());
        }

        let mut templates = HashMap::new();
        templates.insert("metrics_statistics", metrics_statistics());
        templates.insert("metrics_names", metrics_names());
        templates.insert("metrics_dimension_names", metrics_dimension_names());
        templates.insert("metrics_dimension_values", metrics_dimension_values());
        templates.insert("logs_list", logs_list());
        templates.insert("logs_dimension_names", logs_dimension_names());
        templates.insert("logs_dimension_values", logs_dimension_values());

        Registry {
            endpoints,
            templates,
        }
    }

    pub fn endpoint(&self, route: &str) -> Result<&Endpoint> {
        self.endpoints
            .get(route)
            .ok_or_else(|| GatewayError::Internal(format!("unknown route: {}", route)))
    }

    pub fn template(&self, name: &str) -> Result<&QueryTemplate> {
        self.templates
            .get(name)
            .ok_or_else(|| GatewayError::TemplateNotFound {
                template: name.to_string(),
            })
    }

    pub fn routes(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.endpoints.keys().copied()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

const ENDPOINTS: &[Endpoint] = &[
    Endpoint {
        route: "metrics/statistics",
        template: "metrics_statistics",
        params: &[
            ("start_time", Coercion::Identity),
            ("end_time", Coercion::Identity),
            ("period", Coercion::Integer),
            ("metric_name", Coercion::Identity),
            ("dimensions", Coercion::Dict),
            ("group_by", Coercion::List),
            ("statistics", Coercion::List),
        ],
    },
    Endpoint {
        route: "metrics/names",
        template: "metrics_names",
        params: &[("dimensions", Coercion::Dict)],
    },
    Endpoint {
        route: "metrics/dimension_names",
        template: "metrics_dimension_names",
        params: &[("metric_name", Coercion::Identity)],
    },
    Endpoint {
        route: "metrics/dimension_values",
        template: "metrics_dimension_values",
        params: &[
            ("metric_name", Coercion::Identity),
            ("dimension_name", Coercion::Identity),
        ],
    },
    Endpoint {
        route: "logs/list",
        template: "logs_list",
        params: &[
            ("start_time", Coercion::Identity),
            ("end_time", Coercion::Identity),
            ("dimensions", Coercion::Dict),
            ("limit", Coercion::Integer),
        ],
    },
    Endpoint {
        route: "logs/dimension_names",
        template: "logs_dimension_names",
        params: &[],
    },
    Endpoint {
        route: "logs/dimension_values",
        template: "logs_dimension_values",
        params: &[("dimension_name", Coercion::Identity)],
    },
];

// Time bucketing for statistics. The same expression appears in SELECT and
// GROUP BY; bind-slot reuse keeps both on the same $n.
fn time_bucket(body: &mut Vec<Frag>) {
    body.push(IfPresent(
        "period",
        vec![
            Lit("to_timestamp(floor(extract(epoch FROM m.timestamp) / "),
            Bind("period"),
            Lit(") * "),
            Bind("period"),
            Lit(")"),
        ],
    ));
    body.push(IfAbsent("period", vec![Lit("m.timestamp")]));
}

fn metrics_statistics() -> QueryTemplate {
    let mut frags = vec![Lit("SELECT\n  ")];
    time_bucket(&mut frags);
    frags.extend(vec![
        Lit(" AS timestamp,\n  m.name AS metric_name"),
        IfPresent(
            "group_by",
            vec![
                Lit(",\n  "),
                IdentList {
                    param: "group_by",
                    pattern: "m.dimensions ->> '{}' AS \"{}\"",
                    separator: ",\n  ",
                },
            ],
        ),
        Lit(",\n  "),
        IfPresent(
            "statistics",
            vec![IdentList {
                param: "statistics",
                pattern: "{}(m.value) AS \"{}\"",
                separator: ",\n  ",
            }],
        ),
        IfAbsent(
            "statistics",
            vec![Lit("avg(m.value) AS avg,\n  count(m.value) AS count")],
        ),
        Lit("\nFROM metrics.measurements m\nWHERE true"),
        IfPresent(
            "metric_name",
            vec![Lit("\n  AND m.name = "), Bind("metric_name")],
        ),
        IfPresent(
            "start_time",
            vec![
                Lit("\n  AND m.timestamp >= "),
                Bind("start_time"),
                Lit("::timestamptz"),
            ],
        ),
        IfPresent(
            "end_time",
            vec![
                Lit("\n  AND m.timestamp < "),
                Bind("end_time"),
                Lit("::timestamptz"),
            ],
        ),
        IfPresent(
            "dimensions",
            vec![
                Lit("\n  AND m.dimensions @> "),
                Bind("dimensions"),
                Lit("::jsonb"),
            ],
        ),
        Lit("\nGROUP BY "),
    ]);
    time_bucket(&mut frags);
    frags.extend(vec![
        Lit(", m.name"),
        IfPresent(
            "group_by",
            vec![
                Lit(", "),
                IdentList {
                    param: "group_by",
                    pattern: "m.dimensions ->> '{}'",
                    separator: ", ",
                },
            ],
        ),
        Lit("\nORDER BY 1"),
    ]);
    QueryTemplate::new(frags)
}

fn metrics_names() -> QueryTemplate {
    QueryTemplate::new(vec![
        Lit("SELECT DISTINCT m.name AS metric_name\nFROM metrics.measurements m\nWHERE true"),
        IfPresent(
            "dimensions",
            vec![
                Lit("\n  AND m.dimensions @> "),
                Bind("dimensions"),
                Lit("::jsonb"),
            ],
        ),
        Lit("\nORDER BY 1"),
    ])
}

fn metrics_dimension_names() -> QueryTemplate {
    QueryTemplate::new(vec![
        Lit(concat!(
            "SELECT DISTINCT k.dimension_name\n",
            "FROM metrics.measurements m,\n",
            "     jsonb_object_keys(m.dimensions) AS k(dimension_name)\n",
            "WHERE true",
        )),
        IfPresent(
            "metric_name",
            vec![Lit("\n  AND m.name = "), Bind("metric_name")],
        ),
        Lit("\nORDER BY 1"),
    ])
}

fn metrics_dimension_values() -> QueryTemplate {
    QueryTemplate::new(vec![
        Lit("SELECT DISTINCT "),
        IfPresent(
            "dimension_name",
            vec![Lit("m.dimensions ->> "), Bind("dimension_name")],
        ),
        IfAbsent("dimension_name", vec![Lit("NULL::text")]),
        Lit(" AS dimension_value\nFROM metrics.measurements m\nWHERE true"),
        IfPresent(
            "dimension_name",
            vec![Lit("\n  AND m.dimensions ? "), Bind("dimension_name")],
        ),
        IfPresent(
            "metric_name",
            vec![Lit("\n  AND m.name = "), Bind("metric_name")],
        ),
        Lit("\nORDER BY 1"),
    ])
}

fn logs_list() -> QueryTemplate {
    QueryTemplate::new(vec![
        Lit("SELECT l.timestamp, l.message, l.dimensions\nFROM logs.entries l\nWHERE true"),
        IfPresent(
            "start_time",
            vec![
                Lit("\n  AND l.timestamp >= "),
                Bind("start_time"),
                Lit("::timestamptz"),
            ],
        ),
        IfPresent(
            "end_time",
            vec![
                Lit("\n  AND l.timestamp < "),
                Bind("end_time"),
                Lit("::timestamptz"),
            ],
        ),
        IfPresent(
            "dimensions",
            vec![
                Lit("\n  AND l.dimensions @> "),
                Bind("dimensions"),
                Lit("::jsonb"),
            ],
        ),
        Lit("\nORDER BY l.timestamp DESC"),
        IfPresent("limit", vec![Lit("\nLIMIT "), Bind("limit")]),
    ])
}

fn logs_dimension_names() -> QueryTemplate {
    QueryTemplate::new(vec![Lit(concat!(
        "SELECT DISTINCT k.dimension_name\n",
        "FROM logs.entries l,\n",
        "     jsonb_object_keys(l.dimensions) AS k(dimension_name)\n",
        "ORDER BY 1",
    ))])
}

fn logs_dimension_values() -> QueryTemplate {
    QueryTemplate::new(vec![
        Lit("SELECT DISTINCT "),
        IfPresent(
            "dimension_name",
            vec![Lit("l.dimensions ->> "), Bind("dimension_name")],
        ),
        IfAbsent("dimension_name", vec![Lit("NULL::text")]),
        Lit(" AS dimension_value\nFROM logs.entries l\nWHERE true"),
        IfPresent(
            "dimension_name",
            vec![Lit("\n  AND l.dimensions ? "), Bind("dimension_name")],
        ),
        Lit("\nORDER BY 1"),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamSet;
    use crate::query::template::BoundValue;
    use std::collections::HashMap;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn render(route: &str, pairs: &[(&str, &str)]) -> crate::query::template::RenderedQuery {
        let registry = Registry::new();
        let endpoint = registry.endpoint(route).unwrap();
        let params = ParamSet::from_query(endpoint.params, &query(pairs)).unwrap();
        registry
            .template(endpoint.template)
            .unwrap()
            .render(&params)
            .unwrap()
    }

    #[test]
    fn test_all_seven_routes_registered() {
        let registry = Registry::new();
        let mut routes: Vec<_> = registry.routes().collect();
        routes.sort();
        assert_eq!(
            routes,
            vec![
                "logs/dimension_names",
                "logs/dimension_values",
                "logs/list",
                "metrics/dimension_names",
                "metrics/dimension_values",
                "metrics/names",
                "metrics/statistics",
            ]
        );
    }

    #[test]
    fn test_every_route_template_resolves() {
        let registry = Registry::new();
        for route in ENDPOINTS {
            assert!(registry.template(route.template).is_ok(), "{}", route.template);
        }
    }

    #[test]
    fn test_unknown_template_is_not_found() {
        let registry = Registry::new();
        let err = registry.template("metrics_bogus").unwrap_err();
        assert!(matches!(
            err,
            GatewayError::TemplateNotFound { template } if template == "metrics_bogus"
        ));
    }

    #[test]
    fn test_statistics_render_example() {
        // GET /metrics/statistics?period=300&metric_name=cpu
        //     &dimensions=host:web1,env:*&group_by=host
        let rendered = render(
            "metrics/statistics",
            &[
                ("period", "300"),
                ("metric_name", "cpu"),
                ("dimensions", "host:web1,env:*"),
                ("group_by", "host"),
            ],
        );

        // Time bucketing and dynamic grouping are present.
        assert!(rendered.sql.contains("to_timestamp(floor(extract(epoch FROM m.timestamp)"));
        assert!(rendered.sql.contains("m.dimensions ->> 'host' AS \"host\""));
        assert!(rendered.sql.contains("GROUP BY"));
        // Wildcard-stripped jsonb containment filter.
        assert!(rendered.sql.contains("m.dimensions @> "));
        // No time-range filter for absent start_time/end_time.
        assert!(!rendered.sql.contains("m.timestamp >= "));
        assert!(!rendered.sql.contains("m.timestamp < "));

        let binds: HashMap<&str, &BoundValue> =
            rendered.binds.iter().map(|(n, v)| (*n, v)).collect();
        assert_eq!(binds["period"], &BoundValue::Int(300));
        assert_eq!(binds["metric_name"], &BoundValue::Text("cpu".to_string()));
        assert_eq!(
            binds["dimensions"],
            &BoundValue::Text("{\"host\":\"web1\"}".to_string())
        );
        // group_by is spliced as validated identifiers, never bound.
        assert!(!binds.contains_key("group_by"));
    }

    #[test]
    fn test_statistics_defaults_when_everything_absent() {
        let rendered = render("metrics/statistics", &[]);
        assert!(rendered.sql.contains("m.timestamp AS timestamp"));
        assert!(rendered.sql.contains("avg(m.value) AS avg"));
        assert!(rendered.sql.contains("count(m.value) AS count"));
        assert!(rendered.binds.is_empty());
    }

    #[test]
    fn test_statistics_explicit_statistics_list() {
        let rendered = render("metrics/statistics", &[("statistics", "min,max")]);
        assert!(rendered.sql.contains("min(m.value) AS \"min\""));
        assert!(rendered.sql.contains("max(m.value) AS \"max\""));
        assert!(!rendered.sql.contains("avg(m.value) AS avg"));
    }

    #[test]
    fn test_dimension_names_absent_metric_omits_filter() {
        let rendered = render("metrics/dimension_names", &[]);
        assert!(!rendered.sql.contains("m.name = "));
        assert!(rendered.binds.is_empty());

        let rendered = render("metrics/dimension_names", &[("metric_name", "cpu")]);
        assert!(rendered.sql.contains("m.name = $1"));
    }

    #[test]
    fn test_dimension_values_reuses_bind_slot() {
        let rendered = render(
            "metrics/dimension_values",
            &[("dimension_name", "host"), ("metric_name", "cpu")],
        );
        // dimension_name appears in SELECT and in the exists filter, same $1.
        assert!(rendered.sql.contains("m.dimensions ->> $1"));
        assert!(rendered.sql.contains("m.dimensions ? $1"));
        assert_eq!(rendered.binds.len(), 2);
        assert_eq!(rendered.binds[0].0, "dimension_name");
    }

    #[test]
    fn test_logs_list_with_limit() {
        let rendered = render(
            "logs/list",
            &[("limit", "50"), ("dimensions", "hostname:host-01")],
        );
        assert!(rendered.sql.contains("ORDER BY l.timestamp DESC"));
        assert!(rendered.sql.ends_with("LIMIT $2"));
        assert_eq!(rendered.binds[1], ("limit", BoundValue::Int(50)));
    }

    #[test]
    fn test_logs_dimension_names_takes_no_parameters() {
        let registry = Registry::new();
        let endpoint = registry.endpoint("logs/dimension_names").unwrap();
        assert!(endpoint.params.is_empty());
        let rendered = render("logs/dimension_names", &[]);
        assert!(rendered.binds.is_empty());
    }
}
