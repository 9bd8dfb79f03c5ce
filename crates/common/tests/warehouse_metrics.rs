use async_trait::async_trait;
use common::cache::ResultCache;
use common::config;
use common::error::ExecutionError;
use common::query::{build, Report};
use common::table::{Column, ResultTable};
use common::types::{parse_date, Granularity, QueryParameters};
use common::warehouse::Warehouse;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;

struct SometimesFails;

#[async_trait]
impl Warehouse for SometimesFails {
    async fn execute(&self, sql: &str) -> Result<ResultTable, ExecutionError> {
        if sql.contains("\"Route\"") {
            return Err(ExecutionError::Query {
                code: "002003".to_string(),
                message: "Object does not exist".to_string(),
            });
        }
        Ok(ResultTable::new(
            vec![Column::number("Number of Transfers")],
            vec![vec![3.0.into()]],
        ))
    }
}

#[test]
fn cache_and_warehouse_record_latency_errors_and_outcomes() {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();

    let rt = tokio::runtime::Runtime::new().unwrap();
    metrics::with_local_recorder(&recorder, || {
        rt.block_on(async {
            let cache = ResultCache::new(Arc::new(SometimesFails), &config::Cache::default());
            let params = QueryParameters::new(
                parse_date("2024-01-01").unwrap(),
                parse_date("2024-03-31").unwrap(),
                Granularity::Week,
            )
            .unwrap();

            let kpis = build(Report::Kpis, &params);
            cache.get_or_fetch(&kpis).await.unwrap();
            cache.get_or_fetch(&kpis).await.unwrap();

            let err = cache
                .get_or_fetch(&build(Report::Routes, &params))
                .await
                .unwrap_err();
            assert_eq!(err.kind(), "query");
        });
    });

    let rendered = handle.render();
    for name in [
        "dashboard_warehouse_query_latency_ms",
        "dashboard_warehouse_query_errors_total",
        "dashboard_cache_requests_total",
    ] {
        assert!(
            rendered.contains(name),
            "expected {name} in rendered metrics, got:\n{rendered}"
        );
    }
    assert!(rendered.contains("outcome=\"hit\""));
    assert!(rendered.contains("outcome=\"miss\""));
    assert!(rendered.contains("kind=\"query\""));
}
