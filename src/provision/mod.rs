//! Idempotent schema provisioning.
//!
//! Each job runs in one transaction: advisory lock on the schema name,
//! existence check, then create-and-populate or skip. A failure after schema
//! creation rolls the whole transaction back, so reruns always start from a
//! clean state. The first failed job aborts the run.

mod schemas;

use tokio_postgres::{Client, NoTls};
use tracing::{debug, error, info};

use crate::error::{GatewayError, Result};
use crate::query::is_valid_identifier;

pub use schemas::{jobs, logs_schema, metrics_schema, LogsArgs, MetricsArgs, SchemaJob};

const SCHEMA_EXISTS_SQL: &str =
    "SELECT EXISTS(SELECT 1 FROM pg_catalog.pg_namespace WHERE nspname = $1)";

/// What a provisioning pass does with a job, given the existence check.
#[derive(Debug, PartialEq)]
pub enum JobAction<'a> {
    /// Schema already present; nothing to execute. Reruns always land here,
    /// which is what keeps provisioning idempotent.
    Skip,
    /// Schema absent; create it and run the job's DDL.
    Create { schema: &'a str, ddl: &'a str },
}

/// Decide what to do with a job from the existence bit alone.
pub fn plan_job<'a>(job: &'a SchemaJob, exists: bool) -> JobAction<'a> {
    if exists {
        JobAction::Skip
    } else {
        JobAction::Create {
            schema: job.schema,
            ddl: &job.ddl,
        }
    }
}

/// Run every schema job against the given database, in order, stopping at
/// the first failure.
pub async fn provision(database_url: &str) -> Result<()> {
    let (mut client, connection) =
        tokio_postgres::connect(database_url, NoTls)
            .await
            .map_err(|e| GatewayError::ConnectionFailed {
                cause: e.to_string(),
            })?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!("Connection error: {}", e);
        }
    });

    for job in jobs() {
        provision_schema(&mut client, &job).await?;
    }

    Ok(())
}

/// One pass of the per-job state machine: lock, check, then create or skip.
pub async fn provision_schema(client: &mut Client, job: &SchemaJob) -> Result<()> {
    // Schema names are fixed at compile time, but they are spliced into DDL
    // text, so hold them to the same identifier rules as everything else.
    if !is_valid_identifier(job.schema) {
        return Err(GatewayError::ProvisioningFailed {
            schema: job.schema.to_string(),
            cause: "schema name is not a valid identifier".to_string(),
        });
    }

    let failed = |cause: String| GatewayError::ProvisioningFailed {
        schema: job.schema.to_string(),
        cause,
    };

    // Rolls back on drop unless committed.
    let tx = client
        .transaction()
        .await
        .map_err(|e| failed(e.to_string()))?;

    // Serialize concurrent provisioner runs per schema; the lock is released
    // at transaction end, so the loser re-reads after the winner commits.
    tx.query(
        "SELECT pg_advisory_xact_lock(hashtext($1)::bigint)",
        &[&job.schema],
    )
    .await
    .map_err(|e| failed(e.to_string()))?;

    let row = tx
        .query_one(SCHEMA_EXISTS_SQL, &[&job.schema])
        .await
        .map_err(|e| failed(e.to_string()))?;

    match plan_job(job, row.get::<_, bool>(0)) {
        JobAction::Skip => {
            info!("{}: schema already exists - skipping", job.schema);
            Ok(())
        }
        JobAction::Create { schema, ddl } => {
            tx.batch_execute(&format!("CREATE SCHEMA {}", schema))
                .await
                .map_err(|e| failed(e.to_string()))?;

            debug!("{}: applying DDL:\n{}", schema, ddl);

            tx.batch_execute(ddl)
                .await
                .map_err(|e| failed(e.to_string()))?;

            tx.commit().await.map_err(|e| failed(e.to_string()))?;

            info!("{}: schema created", schema);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_schema_names_are_valid_identifiers() {
        for job in jobs() {
            assert!(is_valid_identifier(job.schema), "{}", job.schema);
        }
    }

    #[test]
    fn test_exists_sql_targets_pg_namespace() {
        assert!(SCHEMA_EXISTS_SQL.contains("pg_catalog.pg_namespace"));
        assert!(SCHEMA_EXISTS_SQL.contains("nspname = $1"));
    }

    #[test]
    fn test_absent_schema_plans_create_with_job_ddl() {
        for job in jobs() {
            match plan_job(&job, false) {
                JobAction::Create { schema, ddl } => {
                    assert_eq!(schema, job.schema);
                    assert_eq!(ddl, job.ddl);
                }
                JobAction::Skip => panic!("{}: expected Create for absent schema", job.schema),
            }
        }
    }

    #[test]
    fn test_existing_schema_plans_skip() {
        for job in jobs() {
            assert_eq!(plan_job(&job, true), JobAction::Skip, "{}", job.schema);
        }
    }

    #[test]
    fn test_rerun_after_create_is_a_no_op() {
        // First pass sees no schemas and creates both; once they exist,
        // every later pass skips every job and nothing is executed.
        let all = jobs();

        let first_pass: Vec<_> = all.iter().map(|j| plan_job(j, false)).collect();
        assert!(first_pass
            .iter()
            .all(|a| matches!(a, JobAction::Create { .. })));

        let rerun: Vec<_> = all.iter().map(|j| plan_job(j, true)).collect();
        assert!(rerun.iter().all(|a| *a == JobAction::Skip));
    }
}
