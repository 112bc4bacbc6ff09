//! DDL for the pgmon schemas, built from each schema's static arguments.
//! Optional sections (syslog parsing helpers, rsyslog/collectd landing
//! tables, summary rollups) are emitted only when the corresponding argument
//! enables them.

/// One unit of provisioning work: a schema name and the DDL that populates it.
#[derive(Debug, Clone)]
pub struct SchemaJob {
    pub schema: &'static str,
    pub ddl: String,
}

#[derive(Debug, Clone)]
pub struct LogsArgs {
    pub with_parsing: bool,
    pub with_rsyslog: bool,
}

#[derive(Debug, Clone)]
pub struct MetricsArgs {
    pub with_summary: bool,
    pub summary_periods: Vec<i64>,
    pub with_collectd: bool,
}

/// The fixed job list, in execution order.
pub fn jobs() -> Vec<SchemaJob> {
    vec![
        SchemaJob {
            schema: "logs",
            ddl: logs_schema(&LogsArgs {
                with_parsing: true,
                with_rsyslog: true,
            }),
        },
        SchemaJob {
            schema: "metrics",
            ddl: metrics_schema(&MetricsArgs {
                with_summary: true,
                summary_periods: vec![300],
                with_collectd: true,
            }),
        },
    ]
}

pub fn logs_schema(args: &LogsArgs) -> String {
    let mut ddl = String::from(
        r#"
CREATE TABLE logs.entries (
    timestamp TIMESTAMPTZ NOT NULL,
    message TEXT NOT NULL,
    dimensions JSONB NOT NULL DEFAULT '{}'::jsonb
);

CREATE INDEX entries_timestamp_idx ON logs.entries (timestamp);
CREATE INDEX entries_dimensions_idx ON logs.entries USING gin (dimensions);
"#,
    );

    if args.with_parsing {
        ddl.push_str(
            r#"
CREATE FUNCTION logs.severity_name(priority INTEGER) RETURNS TEXT AS $$
    SELECT (ARRAY[
        'emerg', 'alert', 'crit', 'err',
        'warning', 'notice', 'info', 'debug'
    ])[(priority % 8) + 1]
$$ LANGUAGE sql IMMUTABLE;

CREATE FUNCTION logs.facility_name(priority INTEGER) RETURNS TEXT AS $$
    SELECT (ARRAY[
        'kern', 'user', 'mail', 'daemon', 'auth', 'syslog', 'lpr', 'news',
        'uucp', 'cron', 'authpriv', 'ftp', 'ntp', 'audit', 'alert', 'clock',
        'local0', 'local1', 'local2', 'local3',
        'local4', 'local5', 'local6', 'local7'
    ])[(priority / 8) + 1]
$$ LANGUAGE sql IMMUTABLE;
"#,
        );
    }

    if args.with_rsyslog {
        // Landing table matching rsyslog's ompgsql column set; the trigger
        // normalizes each event into logs.entries.
        ddl.push_str(
            r#"
CREATE TABLE logs.systemevents (
    id SERIAL PRIMARY KEY,
    receivedat TIMESTAMPTZ,
    devicereportedtime TIMESTAMPTZ,
    facility SMALLINT,
    priority SMALLINT,
    fromhost TEXT,
    syslogtag TEXT,
    message TEXT
);
"#,
        );

        let severity = if args.with_parsing {
            "logs.severity_name(NEW.priority)"
        } else {
            "NEW.priority::text"
        };
        let facility = if args.with_parsing {
            "logs.facility_name(NEW.priority)"
        } else {
            "NEW.facility::text"
        };

        ddl.push_str(&format!(
            r#"
CREATE FUNCTION logs.systemevents_ingest() RETURNS trigger AS $$
BEGIN
    INSERT INTO logs.entries (timestamp, message, dimensions)
    VALUES (
        coalesce(NEW.devicereportedtime, NEW.receivedat, now()),
        coalesce(NEW.message, ''),
        jsonb_strip_nulls(jsonb_build_object(
            'hostname', NEW.fromhost,
            'syslogtag', NEW.syslogtag,
            'severity', {severity},
            'facility', {facility}
        ))
    );
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER systemevents_ingest
    AFTER INSERT ON logs.systemevents
    FOR EACH ROW EXECUTE FUNCTION logs.systemevents_ingest();
"#,
        ));
    }

    ddl
}

pub fn metrics_schema(args: &MetricsArgs) -> String {
    let mut ddl = String::from(
        r#"
CREATE TABLE metrics.measurements (
    timestamp TIMESTAMPTZ NOT NULL,
    name TEXT NOT NULL,
    value DOUBLE PRECISION NOT NULL,
    dimensions JSONB NOT NULL DEFAULT '{}'::jsonb
);

CREATE INDEX measurements_name_timestamp_idx ON metrics.measurements (name, timestamp);
CREATE INDEX measurements_dimensions_idx ON metrics.measurements USING gin (dimensions);
"#,
    );

    if args.with_summary {
        for period in &args.summary_periods {
            ddl.push_str(&format!(
                r#"
CREATE TABLE metrics.summary_{period} (
    timestamp TIMESTAMPTZ NOT NULL,
    name TEXT NOT NULL,
    dimensions JSONB NOT NULL,
    avg DOUBLE PRECISION NOT NULL,
    min DOUBLE PRECISION NOT NULL,
    max DOUBLE PRECISION NOT NULL,
    sum DOUBLE PRECISION NOT NULL,
    count BIGINT NOT NULL,
    PRIMARY KEY (timestamp, name, dimensions)
);

CREATE FUNCTION metrics.rollup_{period}(from_time TIMESTAMPTZ, to_time TIMESTAMPTZ)
RETURNS BIGINT AS $$
    WITH inserted AS (
        INSERT INTO metrics.summary_{period}
        SELECT to_timestamp(floor(extract(epoch FROM timestamp) / {period}) * {period}),
               name,
               dimensions,
               avg(value),
               min(value),
               max(value),
               sum(value),
               count(*)
        FROM metrics.measurements
        WHERE timestamp >= from_time AND timestamp < to_time
        GROUP BY 1, 2, 3
        RETURNING 1
    )
    SELECT count(*) FROM inserted
$$ LANGUAGE sql;
"#,
            ));
        }
    }

    if args.with_collectd {
        ddl.push_str(
            r#"
CREATE TABLE metrics.collectd (
    time TIMESTAMPTZ NOT NULL,
    host TEXT NOT NULL,
    plugin TEXT NOT NULL,
    plugin_instance TEXT,
    type TEXT NOT NULL,
    type_instance TEXT,
    value DOUBLE PRECISION NOT NULL
);

CREATE FUNCTION metrics.collectd_ingest() RETURNS trigger AS $$
BEGIN
    INSERT INTO metrics.measurements (timestamp, name, value, dimensions)
    VALUES (
        NEW.time,
        concat_ws('.', NEW.plugin, NEW.type),
        NEW.value,
        jsonb_strip_nulls(jsonb_build_object(
            'hostname', NEW.host,
            'plugin_instance', NEW.plugin_instance,
            'type_instance', NEW.type_instance
        ))
    );
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER collectd_ingest
    AFTER INSERT ON metrics.collectd
    FOR EACH ROW EXECUTE FUNCTION metrics.collectd_ingest();
"#,
        );
    }

    ddl
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_list_order_and_names() {
        let jobs = jobs();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].schema, "logs");
        assert_eq!(jobs[1].schema, "metrics");
    }

    #[test]
    fn test_logs_schema_optional_sections() {
        let full = logs_schema(&LogsArgs {
            with_parsing: true,
            with_rsyslog: true,
        });
        assert!(full.contains("CREATE TABLE logs.entries"));
        assert!(full.contains("logs.severity_name"));
        assert!(full.contains("CREATE TABLE logs.systemevents"));
        assert!(full.contains("logs.severity_name(NEW.priority)"));

        let bare = logs_schema(&LogsArgs {
            with_parsing: false,
            with_rsyslog: false,
        });
        assert!(bare.contains("CREATE TABLE logs.entries"));
        assert!(!bare.contains("severity_name"));
        assert!(!bare.contains("systemevents"));
    }

    #[test]
    fn test_rsyslog_without_parsing_keeps_raw_priority() {
        let ddl = logs_schema(&LogsArgs {
            with_parsing: false,
            with_rsyslog: true,
        });
        assert!(ddl.contains("NEW.priority::text"));
        assert!(!ddl.contains("logs.severity_name"));
    }

    #[test]
    fn test_metrics_schema_summary_periods() {
        let ddl = metrics_schema(&MetricsArgs {
            with_summary: true,
            summary_periods: vec![300, 3600],
            with_collectd: false,
        });
        assert!(ddl.contains("CREATE TABLE metrics.summary_300"));
        assert!(ddl.contains("metrics.rollup_300"));
        assert!(ddl.contains("CREATE TABLE metrics.summary_3600"));
        assert!(ddl.contains("metrics.rollup_3600"));
        assert!(!ddl.contains("collectd"));
    }

    #[test]
    fn test_metrics_schema_without_summary() {
        let ddl = metrics_schema(&MetricsArgs {
            with_summary: false,
            summary_periods: vec![300],
            with_collectd: true,
        });
        assert!(!ddl.contains("summary_300"));
        assert!(ddl.contains("CREATE TABLE metrics.collectd"));
        assert!(ddl.contains("metrics.collectd_ingest"));
    }
}
