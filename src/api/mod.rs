mod health;
mod logs;
mod metrics;

use std::sync::Arc;
use std::time::Instant;

use deadpool_postgres::Pool;

use crate::query::Registry;

pub use health::health_check;
pub use logs::{logs_dimension_names, logs_dimension_values, logs_list};
pub use metrics::{
    metrics_dimension_names, metrics_dimension_values, metrics_names, metrics_statistics,
};

/// Shared per-process state: the pool, the immutable endpoint registry, and
/// the process start time for uptime reporting.
#[derive(Clone)]
pub struct AppState {
    pub pool: Pool,
    pub registry: Arc<Registry>,
    pub start_time: Instant,
}
