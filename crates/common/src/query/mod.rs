//! Query Builder: one aggregation query per dashboard report.
//!
//! Every report reads the shared service union from [`fragments::service_ctes`]
//! and applies the inclusive date range from the [`QueryParameters`]. The
//! builder never talks to the warehouse; validation happened when the
//! parameters were constructed.

pub mod fragments;

use crate::buckets::{BucketSet, ROUTE_COUNT, ROUTE_VOLUME, TRANSFER_SIZE};
use crate::types::{ChainSide, Page, QueryParameters};
use fragments::{date_range, quote_literal, service_ctes, time_bucket};

/// Display names of result columns.
pub mod col {
    pub const DATE: &str = "Date";
    pub const ROUTE: &str = "Route";
    pub const SYMBOL: &str = "Symbol";
    pub const CHAIN: &str = "Chain";

    pub const TRANSFERS: &str = "Number of Transfers";
    pub const USERS: &str = "Number of Users";
    pub const TOTAL_VOLUME: &str = "Volume of Transfers";
    pub const AVG_BRIDGE_VOLUME: &str = "Avg Bridges Volume";

    pub const BRIDGES: &str = "Bridges";
    pub const CUMULATIVE_BRIDGES: &str = "Cumulative Bridges Count";
    pub const VOLUME: &str = "Volume";
    pub const CUMULATIVE_VOLUME: &str = "Cumulative Bridges Volume";
    pub const AVG_VOLUME_PER_USER: &str = "Avg Bridges Volume per User";
    pub const AVG_VOLUME_PER_TXN: &str = "Avg Bridges Volume per Txn";

    pub const TOTAL_BRIDGORS: &str = "Total Bridgors";
    pub const NEW_BRIDGORS: &str = "New Bridgors";
    pub const ACTIVE_BRIDGORS: &str = "Active Bridgors";
    pub const BRIDGORS_GROWTH: &str = "Bridgors Growth";

    pub const ROUTE_AVG_PER_TXN: &str = "Avg Volume per Txn";
    pub const BRIDGORS: &str = "Bridgors";
    pub const ROUTE_AVG_PER_BRIDGOR: &str = "Avg Volume per Bridgor";
    pub const AVG_COUNT_PER_USER: &str = "Avg Bridge Count per User";
    pub const NUMBER_OF_ROUTES: &str = "Number of Routes";

    pub const VOLUME_USD: &str = "Volume (USD)";
    pub const ASSET_AVG_PER_TXN: &str = "Avg Volume per Txn (USD)";
    pub const ASSET_AVG_PER_BRIDGOR: &str = "Avg Volume per Bridgor (USD)";
    pub const NUMBER_OF_BRIDGES: &str = "Number of Bridges";
    pub const VOLUME_OF_BRIDGES: &str = "Volume of Bridges (USD)";

    pub const CHAIN_AVG_PER_BRIDGE: &str = "Avg Volume per Bridge (USD)";
}

/// Every aggregation the dashboard can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Report {
    Kpis,
    Activity,
    Bridgors,
    Routes,
    RouteVolumeDistribution,
    RouteCountDistribution,
    Assets,
    AssetSizeDistribution,
    AssetActivity,
    ChainTotals(ChainSide),
    ChainActivity(ChainSide),
    ChainAssets(ChainSide),
}

impl Report {
    /// Stable name for logs and metric labels.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Kpis => "kpis",
            Self::Activity => "activity",
            Self::Bridgors => "bridgors",
            Self::Routes => "routes",
            Self::RouteVolumeDistribution => "route_volume_distribution",
            Self::RouteCountDistribution => "route_count_distribution",
            Self::Assets => "assets",
            Self::AssetSizeDistribution => "asset_size_distribution",
            Self::AssetActivity => "asset_activity",
            Self::ChainTotals(ChainSide::Source) => "chain_totals_source",
            Self::ChainTotals(ChainSide::Destination) => "chain_totals_destination",
            Self::ChainActivity(ChainSide::Source) => "chain_activity_source",
            Self::ChainActivity(ChainSide::Destination) => "chain_activity_destination",
            Self::ChainAssets(ChainSide::Source) => "chain_assets_source",
            Self::ChainAssets(ChainSide::Destination) => "chain_assets_destination",
        }
    }

    pub fn page(&self) -> Page {
        match self {
            Self::Kpis | Self::Activity | Self::Bridgors => Page::Overall,
            Self::Routes | Self::RouteVolumeDistribution | Self::RouteCountDistribution => {
                Page::Routes
            }
            Self::Assets | Self::AssetSizeDistribution | Self::AssetActivity => Page::Assets,
            Self::ChainTotals(_) | Self::ChainActivity(_) | Self::ChainAssets(_) => Page::Chain,
        }
    }

    /// Whether the report groups by time bucket (and so depends on granularity).
    pub fn is_time_series(&self) -> bool {
        matches!(
            self,
            Self::Activity | Self::Bridgors | Self::AssetActivity | Self::ChainActivity(_)
        )
    }
}

/// A rendered query, ready for the cache or the warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuiltQuery {
    pub report: Report,
    pub sql: String,
}

/// Render `report` for `params`.
pub fn build(report: Report, params: &QueryParameters) -> BuiltQuery {
    let body = match report {
        Report::Kpis => kpis(params),
        Report::Activity => activity(params),
        Report::Bridgors => bridgors(params),
        Report::Routes => routes(params),
        Report::RouteVolumeDistribution => route_distribution(
            params,
            &ROUTE_VOLUME,
            "SUM(amount_usd)",
            "AND amount_usd IS NOT NULL",
        ),
        Report::RouteCountDistribution => {
            route_distribution(params, &ROUTE_COUNT, "COUNT(DISTINCT id)", "")
        }
        Report::Assets => assets(params),
        Report::AssetSizeDistribution => asset_size_distribution(params),
        Report::AssetActivity => asset_activity(params),
        Report::ChainTotals(side) => chain_totals(params, side),
        Report::ChainActivity(side) => chain_activity(params, side),
        Report::ChainAssets(side) => chain_assets(params, side),
    };
    BuiltQuery {
        report,
        sql: format!("{}{body}", service_ctes()),
    }
}

fn dates(params: &QueryParameters) -> String {
    date_range("created_at::date", params)
}

fn ident(name: &str) -> String {
    format!("\"{name}\"")
}

/// Ratio of two aggregates; a zero denominator yields NULL instead of an error.
fn per(numerator: &str, denominator: &str) -> String {
    format!("{numerator} / NULLIF({denominator}, 0)")
}

fn chain_filter(params: &QueryParameters, side: ChainSide) -> String {
    params.chain().map_or_else(String::new, |chain| {
        format!(
            "\n  AND LOWER({}) = LOWER({})",
            side.column(),
            quote_literal(chain)
        )
    })
}

fn kpis(params: &QueryParameters) -> String {
    format!(
        "
SELECT
  COUNT(DISTINCT id) AS {transfers},
  COUNT(DISTINCT user_address) AS {users},
  ROUND(SUM(amount_usd)) AS {volume},
  ROUND(AVG(amount_usd)) AS {avg}
FROM overview
WHERE {dates}",
        transfers = ident(col::TRANSFERS),
        users = ident(col::USERS),
        volume = ident(col::TOTAL_VOLUME),
        avg = ident(col::AVG_BRIDGE_VOLUME),
        dates = dates(params),
    )
}

fn activity(params: &QueryParameters) -> String {
    let bucket = time_bucket("created_at", params);
    format!(
        "
SELECT
  {bucket} AS {date},
  COUNT(DISTINCT id) AS {bridges},
  SUM(COUNT(DISTINCT id)) OVER (ORDER BY {bucket}) AS {cum_bridges},
  ROUND(SUM(amount_usd)) AS {volume},
  SUM(ROUND(SUM(amount_usd))) OVER (ORDER BY {bucket}) AS {cum_volume},
  ROUND({per_user}) AS {avg_user},
  ROUND(AVG(amount_usd)) AS {avg_txn}
FROM overview
WHERE {dates}
GROUP BY 1
ORDER BY 1",
        date = ident(col::DATE),
        bridges = ident(col::BRIDGES),
        cum_bridges = ident(col::CUMULATIVE_BRIDGES),
        volume = ident(col::VOLUME),
        cum_volume = ident(col::CUMULATIVE_VOLUME),
        per_user = per("SUM(amount_usd)", "COUNT(DISTINCT user_address)"),
        avg_user = ident(col::AVG_VOLUME_PER_USER),
        avg_txn = ident(col::AVG_VOLUME_PER_TXN),
        dates = dates(params),
    )
}

/// New bridgors are addresses whose first-ever transfer falls in the bucket,
/// so first-seen dates are computed over all history, not just the range.
fn bridgors(params: &QueryParameters) -> String {
    format!(
        ",
first_seen AS (
  SELECT user_address, MIN(created_at::date) AS first_date
  FROM overview
  GROUP BY 1
),
totals AS (
  SELECT {bucket} AS bucket, COUNT(DISTINCT user_address) AS total_users
  FROM overview
  WHERE {dates}
  GROUP BY 1
),
newcomers AS (
  SELECT {first_bucket} AS bucket, COUNT(DISTINCT user_address) AS new_users
  FROM first_seen
  WHERE {first_dates}
  GROUP BY 1
)
SELECT
  t.bucket AS {date},
  t.total_users AS {total},
  COALESCE(n.new_users, 0) AS {new},
  t.total_users - COALESCE(n.new_users, 0) AS {active},
  SUM(COALESCE(n.new_users, 0)) OVER (ORDER BY t.bucket) AS {growth}
FROM totals t
LEFT JOIN newcomers n ON t.bucket = n.bucket
ORDER BY 1",
        bucket = time_bucket("created_at::date", params),
        first_bucket = time_bucket("first_date", params),
        dates = dates(params),
        first_dates = date_range("first_date", params),
        date = ident(col::DATE),
        total = ident(col::TOTAL_BRIDGORS),
        new = ident(col::NEW_BRIDGORS),
        active = ident(col::ACTIVE_BRIDGORS),
        growth = ident(col::BRIDGORS_GROWTH),
    )
}

fn routes(params: &QueryParameters) -> String {
    format!(
        "
SELECT
  route AS {route},
  ROUND(SUM(amount_usd)) AS {volume},
  ROUND(AVG(amount_usd), 1) AS {avg_txn},
  COUNT(DISTINCT id) AS {bridges},
  COUNT(DISTINCT user_address) AS {bridgors},
  ROUND({per_user}, 1) AS {avg_bridgor},
  ROUND({count_per_user}) AS {avg_count}
FROM overview
WHERE {dates}
GROUP BY 1
ORDER BY 4 DESC",
        route = ident(col::ROUTE),
        volume = ident(col::VOLUME),
        avg_txn = ident(col::ROUTE_AVG_PER_TXN),
        bridges = ident(col::BRIDGES),
        bridgors = ident(col::BRIDGORS),
        per_user = per("SUM(amount_usd)", "COUNT(DISTINCT user_address)"),
        avg_bridgor = ident(col::ROUTE_AVG_PER_BRIDGOR),
        count_per_user = per("COUNT(DISTINCT id)", "COUNT(DISTINCT user_address)"),
        avg_count = ident(col::AVG_COUNT_PER_USER),
        dates = dates(params),
    )
}

fn route_distribution(
    params: &QueryParameters,
    set: &BucketSet,
    aggregate: &str,
    extra_filter: &str,
) -> String {
    let label = ident(set.name);
    format!(
        ",
per_route AS (
  SELECT route, {aggregate} AS route_total
  FROM overview
  WHERE {dates} {extra_filter}
  GROUP BY 1
),
binned AS (
  SELECT route, {case} AS {label}
  FROM per_route
)
SELECT {label}, COUNT(DISTINCT route) AS {routes}
FROM binned
WHERE {label} IS NOT NULL
GROUP BY 1
ORDER BY {order}",
        dates = dates(params),
        case = set.case_sql("route_total"),
        routes = ident(col::NUMBER_OF_ROUTES),
        order = set.order_sql(&label),
    )
}

fn assets(params: &QueryParameters) -> String {
    format!(
        "
SELECT
  symbol AS {symbol},
  ROUND(SUM(amount_usd)) AS {volume},
  ROUND(AVG(amount_usd)) AS {avg_txn},
  COUNT(DISTINCT id) AS {bridges},
  COUNT(DISTINCT user_address) AS {bridgors},
  ROUND({per_user}, 1) AS {avg_bridgor},
  ROUND({count_per_user}) AS {avg_count}
FROM overview
WHERE {dates}
  AND symbol IS NOT NULL
GROUP BY 1
ORDER BY 4 DESC",
        symbol = ident(col::SYMBOL),
        volume = ident(col::VOLUME_USD),
        avg_txn = ident(col::ASSET_AVG_PER_TXN),
        bridges = ident(col::BRIDGES),
        bridgors = ident(col::BRIDGORS),
        per_user = per("SUM(amount_usd)", "COUNT(DISTINCT user_address)"),
        avg_bridgor = ident(col::ASSET_AVG_PER_BRIDGOR),
        count_per_user = per("COUNT(DISTINCT id)", "COUNT(DISTINCT user_address)"),
        avg_count = ident(col::AVG_COUNT_PER_USER),
        dates = dates(params),
    )
}

fn asset_size_distribution(params: &QueryParameters) -> String {
    format!(
        "
SELECT
  symbol AS {symbol},
  {case} AS {size},
  COUNT(DISTINCT id) AS {bridges}
FROM overview
WHERE {dates}
  AND symbol IS NOT NULL
  AND amount_usd IS NOT NULL
GROUP BY 1, 2
ORDER BY 1, 3 DESC",
        symbol = ident(col::SYMBOL),
        case = TRANSFER_SIZE.case_sql("amount_usd"),
        size = ident(TRANSFER_SIZE.name),
        bridges = ident(col::BRIDGES),
        dates = dates(params),
    )
}

fn asset_activity(params: &QueryParameters) -> String {
    let asset = params.asset().map_or_else(String::new, |a| {
        format!("\n  AND symbol = {}", quote_literal(a))
    });
    format!(
        "
SELECT
  {bucket} AS {date},
  symbol AS {symbol},
  COUNT(DISTINCT id) AS {count},
  ROUND(SUM(amount_usd)) AS {volume}
FROM overview
WHERE {dates}
  AND symbol IS NOT NULL{asset}
GROUP BY 1, 2
ORDER BY 1",
        bucket = time_bucket("created_at", params),
        date = ident(col::DATE),
        symbol = ident(col::SYMBOL),
        count = ident(col::NUMBER_OF_BRIDGES),
        volume = ident(col::VOLUME_OF_BRIDGES),
        dates = dates(params),
    )
}

fn chain_totals(params: &QueryParameters, side: ChainSide) -> String {
    format!(
        "
SELECT
  {column} AS {chain},
  ROUND(SUM(amount_usd)) AS {volume},
  ROUND(AVG(amount_usd), 1) AS {avg},
  COUNT(DISTINCT id) AS {bridges},
  COUNT(DISTINCT user_address) AS {bridgors}
FROM overview
WHERE {dates}{filter}
GROUP BY 1
ORDER BY 4 DESC",
        column = side.column(),
        chain = ident(col::CHAIN),
        volume = ident(col::VOLUME_USD),
        avg = ident(col::CHAIN_AVG_PER_BRIDGE),
        bridges = ident(col::BRIDGES),
        bridgors = ident(col::BRIDGORS),
        dates = dates(params),
        filter = chain_filter(params, side),
    )
}

fn chain_activity(params: &QueryParameters, side: ChainSide) -> String {
    format!(
        "
SELECT
  {bucket} AS {date},
  {column} AS {chain},
  ROUND(SUM(amount_usd)) AS {volume},
  COUNT(DISTINCT id) AS {bridges}
FROM overview
WHERE {dates}{filter}
GROUP BY 1, 2
ORDER BY 1",
        bucket = time_bucket("created_at", params),
        date = ident(col::DATE),
        column = side.column(),
        chain = ident(col::CHAIN),
        volume = ident(col::VOLUME_USD),
        bridges = ident(col::BRIDGES),
        dates = dates(params),
        filter = chain_filter(params, side),
    )
}

fn chain_assets(params: &QueryParameters, side: ChainSide) -> String {
    format!(
        "
SELECT
  {column} AS {chain},
  symbol AS {symbol},
  ROUND(SUM(amount_usd)) AS {volume},
  COUNT(DISTINCT id) AS {bridges}
FROM overview
WHERE {dates}
  AND symbol IS NOT NULL{filter}
GROUP BY 1, 2
ORDER BY 1",
        column = side.column(),
        chain = ident(col::CHAIN),
        symbol = ident(col::SYMBOL),
        volume = ident(col::VOLUME_USD),
        bridges = ident(col::BRIDGES),
        dates = dates(params),
        filter = chain_filter(params, side),
    )
}
