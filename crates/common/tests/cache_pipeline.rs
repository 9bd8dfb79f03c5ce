use async_trait::async_trait;
use common::cache::ResultCache;
use common::config::{Cache, CacheTtl};
use common::error::{DashboardError, ExecutionError, ShapeError};
use common::query::{build, col, Report};
use common::shaper;
use common::table::{Column, ResultTable};
use common::types::{parse_date, ChainSide, Granularity, QueryParameters};
use common::warehouse::Warehouse;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct Recording {
    calls: AtomicUsize,
    table: ResultTable,
}

#[async_trait]
impl Warehouse for Recording {
    async fn execute(&self, _sql: &str) -> Result<ResultTable, ExecutionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.table.clone())
    }
}

struct Unreachable {
    calls: AtomicUsize,
}

#[async_trait]
impl Warehouse for Unreachable {
    async fn execute(&self, _sql: &str) -> Result<ResultTable, ExecutionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ExecutionError::Connection("connection refused".to_string()))
    }
}

fn january(granularity: Granularity) -> QueryParameters {
    QueryParameters::new(
        parse_date("2023-01-01").unwrap(),
        parse_date("2023-01-31").unwrap(),
        granularity,
    )
    .unwrap()
}

#[tokio::test]
async fn entries_expire_after_page_ttl() {
    let warehouse = Arc::new(Recording::default());
    let settings = Cache {
        max_entries: None,
        ttl_secs: CacheTtl {
            chain: Some(1),
            ..CacheTtl::default()
        },
    };
    let cache = ResultCache::new(warehouse.clone(), &settings);
    let chain = build(Report::ChainTotals(ChainSide::Source), &january(Granularity::Day));
    let overall = build(Report::Kpis, &january(Granularity::Day));

    cache.get_or_fetch(&chain).await.unwrap();
    cache.get_or_fetch(&overall).await.unwrap();
    assert_eq!(warehouse.calls.load(Ordering::SeqCst), 2);

    tokio::time::sleep(Duration::from_millis(1_500)).await;

    cache.get_or_fetch(&chain).await.unwrap();
    cache.get_or_fetch(&overall).await.unwrap();
    assert_eq!(warehouse.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn failures_are_not_cached() {
    let warehouse = Arc::new(Unreachable {
        calls: AtomicUsize::new(0),
    });
    let cache = ResultCache::new(warehouse.clone(), &Cache::default());
    let q = build(Report::Routes, &january(Granularity::Month));

    for _ in 0..2 {
        let err = cache.get_or_fetch(&q).await.unwrap_err();
        assert_eq!(err.kind(), "connection");
    }
    assert_eq!(warehouse.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn empty_range_is_no_data_not_an_error() {
    let warehouse = Arc::new(Recording {
        calls: AtomicUsize::new(0),
        table: ResultTable::new(
            vec![Column::timestamp(col::DATE), Column::number(col::BRIDGES)],
            vec![],
        ),
    });
    let cache = ResultCache::new(warehouse, &Cache::default());
    let entry = cache
        .get_or_fetch(&build(Report::Activity, &january(Granularity::Day)))
        .await
        .unwrap();

    let shaped: Result<_, DashboardError> =
        shaper::cumulative_sum(&entry.table, col::BRIDGES, col::CUMULATIVE_BRIDGES)
            .map_err(DashboardError::from);
    let err = shaped.unwrap_err();
    assert!(err.is_no_data());
    assert_eq!(err, DashboardError::Shape(ShapeError::NoData));
}

#[tokio::test]
async fn daily_activity_through_the_cache() {
    let rows = (1..=31)
        .map(|day| {
            let (count, volume) = if day == 15 {
                (10.0, 5000.0)
            } else {
                (2.0, 50.0)
            };
            vec![format!("2023-01-{day:02}").into(), count.into(), volume.into()]
        })
        .collect();
    let warehouse = Arc::new(Recording {
        calls: AtomicUsize::new(0),
        table: ResultTable::new(
            vec![
                Column::text(col::DATE),
                Column::number(col::BRIDGES),
                Column::number(col::VOLUME),
            ],
            rows,
        ),
    });
    let cache = ResultCache::new(warehouse.clone(), &Cache::default());
    let q = build(Report::Activity, &january(Granularity::Day));

    let entry = cache.get_or_fetch(&q).await.unwrap();
    let again = cache.get_or_fetch(&q).await.unwrap();
    assert_eq!(warehouse.calls.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&entry.table, &again.table));

    let t = shaper::cumulative_sum(&entry.table, col::BRIDGES, col::CUMULATIVE_BRIDGES).unwrap();
    let t = shaper::ratio(&t, col::VOLUME, col::BRIDGES, col::AVG_VOLUME_PER_TXN).unwrap();

    assert_eq!(t.numbers(col::CUMULATIVE_BRIDGES).unwrap()[14], Some(14.0 * 2.0 + 10.0));
    assert_eq!(t.numbers(col::AVG_VOLUME_PER_TXN).unwrap()[14], Some(500.0));
}
