//! Query and pool metrics for the Postgres stores.

use std::time::Instant;

use metrics::{counter, gauge, histogram};
use sqlx::PgPool;

/// Times one named query and records its duration and outcome.
///
/// ```ignore
/// let timer = QueryTimer::new("find_entitlement_by_user_id");
/// let result = sqlx::query_as::<_, UserEntitlementEntity>(...).fetch_optional(&pool).await;
/// timer.finish(&result);
/// ```
pub struct QueryTimer {
    query: &'static str,
    started: Instant,
}

impl QueryTimer {
    pub fn new(query: &'static str) -> Self {
        Self {
            query,
            started: Instant::now(),
        }
    }

    /// Records the elapsed time; failed queries are also counted.
    pub fn finish<T>(self, result: &Result<T, sqlx::Error>) {
        let elapsed = self.started.elapsed().as_secs_f64();
        histogram!("database_query_duration_seconds", "query" => self.query).record(elapsed);

        if let Err(e) = result {
            tracing::warn!(query = self.query, error = %e, "Query failed");
            counter!("database_query_errors_total", "query" => self.query).increment(1);
        }
    }
}

/// Publishes the pool's size and idle count as gauges.
pub fn record_pool_metrics(pool: &PgPool) {
    let size = pool.size() as f64;
    let idle = pool.num_idle() as f64;

    gauge!("database_connections_total").set(size);
    gauge!("database_connections_idle").set(idle);
    gauge!("database_connections_active").set((size - idle).max(0.0));
}
