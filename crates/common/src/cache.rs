//! In-process result cache keyed by rendered query text.
//!
//! Entries are immutable and expire after their page's TTL (never, for pages
//! without one). Without `max_entries` the cache holds one entry per distinct
//! query ever seen for the life of the process.

use crate::config;
use crate::error::ExecutionError;
use crate::query::BuiltQuery;
use crate::table::ResultTable;
use crate::warehouse::{execute_named, Warehouse};
use chrono::{DateTime, Utc};
use moka::future::Cache;
use moka::Expiry;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub table: Arc<ResultTable>,
    pub fetched_at: DateTime<Utc>,
    ttl: Option<Duration>,
}

struct PageExpiry;

impl Expiry<String, CacheEntry> for PageExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.ttl
    }
}

#[derive(Clone)]
pub struct ResultCache {
    warehouse: Arc<dyn Warehouse>,
    entries: Cache<String, CacheEntry>,
    ttl: config::CacheTtl,
}

impl ResultCache {
    pub fn new(warehouse: Arc<dyn Warehouse>, settings: &config::Cache) -> Self {
        let mut builder = Cache::builder().expire_after(PageExpiry);
        if let Some(max) = settings.max_entries {
            builder = builder.max_capacity(max);
        }
        Self {
            warehouse,
            entries: builder.build(),
            ttl: settings.ttl_secs,
        }
    }

    /// Return the cached table for `query`, executing it on a miss.
    ///
    /// Concurrent misses for the same query share one execution. Failures are
    /// returned to every waiter and never cached.
    pub async fn get_or_fetch(&self, query: &BuiltQuery) -> Result<CacheEntry, ExecutionError> {
        let report = query.report.name();
        let ttl = self.ttl.for_page(query.report.page());
        let warehouse = Arc::clone(&self.warehouse);
        let sql = query.sql.clone();

        let entry = self
            .entries
            .entry(query.sql.clone())
            .or_try_insert_with(async move {
                let table = execute_named(warehouse.as_ref(), report, &sql).await?;
                Ok::<_, ExecutionError>(CacheEntry {
                    table: Arc::new(table),
                    fetched_at: Utc::now(),
                    ttl,
                })
            })
            .await
            .map_err(|e| (*e).clone())?;

        let outcome = if entry.is_fresh() { "miss" } else { "hit" };
        metrics::counter!("dashboard_cache_requests_total", "report" => report, "outcome" => outcome)
            .increment(1);
        tracing::debug!(report, outcome, "result cache lookup");
        Ok(entry.into_value())
    }

    /// Number of live entries. Approximate until pending maintenance runs.
    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }

    pub async fn clear(&self) {
        self.entries.invalidate_all();
        self.entries.run_pending_tasks().await;
    }
}
