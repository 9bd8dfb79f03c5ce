//! The execution boundary: submit SQL text, get a [`ResultTable`] back.
//!
//! [`Warehouse`] is the seam the cache and the web layer depend on, so tests
//! can run the whole pipeline against an in-memory stub.

pub mod snowflake;

use crate::error::ExecutionError;
use crate::table::ResultTable;
use async_trait::async_trait;

pub use snowflake::SnowflakeClient;

#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Run one statement. Implementations do not retry.
    async fn execute(&self, sql: &str) -> Result<ResultTable, ExecutionError>;
}

/// Execute `sql` and record latency and error metrics labelled with `report`.
pub async fn execute_named(
    warehouse: &dyn Warehouse,
    report: &'static str,
    sql: &str,
) -> Result<ResultTable, ExecutionError> {
    let start = std::time::Instant::now();
    let res = warehouse.execute(sql).await;
    let ms = start.elapsed().as_secs_f64() * 1000.0;

    match &res {
        Ok(table) => {
            metrics::histogram!(
                "dashboard_warehouse_query_latency_ms",
                "report" => report,
                "status" => "ok"
            )
            .record(ms);
            tracing::debug!(report, rows = table.len(), elapsed_ms = ms, "warehouse query ok");
        }
        Err(e) => {
            metrics::histogram!(
                "dashboard_warehouse_query_latency_ms",
                "report" => report,
                "status" => "err"
            )
            .record(ms);
            metrics::counter!(
                "dashboard_warehouse_query_errors_total",
                "report" => report,
                "kind" => e.kind()
            )
            .increment(1);
            tracing::error!(report, kind = e.kind(), error = %e, elapsed_ms = ms, "warehouse query failed");
        }
    }

    res
}
