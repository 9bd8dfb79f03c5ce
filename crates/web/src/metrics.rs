use anyhow::Result;
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub fn describe() {
    describe_gauge!(
        "dashboard_web_build_info",
        "Build info for the bridge dashboard (value is always 1)."
    );
    describe_histogram!(
        "dashboard_warehouse_query_latency_ms",
        "Warehouse round-trip latency per report, in milliseconds."
    );
    describe_counter!(
        "dashboard_warehouse_query_errors_total",
        "Failed warehouse queries by report and error kind."
    );
    describe_counter!(
        "dashboard_cache_requests_total",
        "Result cache lookups by report and outcome (hit or miss)."
    );
}

/// Install a global Prometheus recorder and return a handle for rendering `/metrics`.
///
/// Note: `PrometheusBuilder::install_recorder` requires the caller to run upkeep periodically.
/// We run upkeep opportunistically on each `/metrics` request.
pub fn init_global() -> Result<PrometheusHandle> {
    let handle = match PROM_HANDLE.get() {
        Some(handle) => handle.clone(),
        None => {
            let installed = PrometheusBuilder::new().install_recorder()?;
            describe();
            PROM_HANDLE.get_or_init(|| installed).clone()
        }
    };

    let git_sha = std::env::var("GIT_SHA").unwrap_or_else(|_| "unknown".to_string());
    ::metrics::gauge!(
        "dashboard_web_build_info",
        "version" => env!("CARGO_PKG_VERSION"),
        "git_sha" => git_sha,
    )
    .set(1.0);

    Ok(handle)
}
