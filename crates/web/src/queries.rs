//! Section loaders: build the report query, fetch it through the cache, and
//! shape the result into view models. One function per dashboard section.

use crate::models::{
    addresses_thousands, grouped_or_missing, txns_millions, usd_billions, usd_thousands,
    ChartSpec, Kpi, Series, SeriesKind, TableView,
};
use common::buckets::{ROUTE_COUNT, ROUTE_VOLUME, TRANSFER_SIZE};
use common::cache::ResultCache;
use common::error::{DashboardError, ShapeError};
use common::query::{build, col, Report};
use common::shaper;
use common::table::ResultTable;
use common::types::{ChainSide, QueryParameters};
use std::sync::Arc;

async fn fetch(
    cache: &ResultCache,
    report: Report,
    params: &QueryParameters,
) -> Result<Arc<ResultTable>, DashboardError> {
    let entry = cache.get_or_fetch(&build(report, params)).await?;
    if entry.table.is_empty() {
        return Err(ShapeError::NoData.into());
    }
    Ok(entry.table)
}

// --- Overall ---

pub async fn overall_kpis(
    cache: &ResultCache,
    params: &QueryParameters,
) -> Result<Vec<Kpi>, DashboardError> {
    let t = fetch(cache, Report::Kpis, params).await?;
    let transfers = t.numbers(col::TRANSFERS)?[0];
    // A global aggregate always returns one row; zero transfers means nothing matched.
    if transfers.is_none_or(|n| n == 0.0) {
        return Err(ShapeError::NoData.into());
    }
    Ok(vec![
        Kpi::new("Bridged Volume", usd_billions(t.numbers(col::TOTAL_VOLUME)?[0])),
        Kpi::new("Bridges", txns_millions(transfers)),
        Kpi::new("Bridgors", addresses_thousands(t.numbers(col::USERS)?[0])),
        Kpi::new(
            "Avg Bridge Volume",
            usd_thousands(t.numbers(col::AVG_BRIDGE_VOLUME)?[0]),
        ),
    ])
}

pub async fn overall_activity(
    cache: &ResultCache,
    params: &QueryParameters,
) -> Result<Vec<ChartSpec>, DashboardError> {
    let t = fetch(cache, Report::Activity, params).await?;
    let bar = |y: &str| Series::from_columns(&t, SeriesKind::Bar, col::DATE, y);
    let line = |y: &str| Series::from_columns(&t, SeriesKind::Line, col::DATE, y);
    let scatter = |y: &str| Series::from_columns(&t, SeriesKind::Scatter, col::DATE, y);

    Ok(vec![
        ChartSpec::new("bridges-over-time", "Number of Bridges Over Time")
            .axes("Date", "Bridges")
            .secondary_axis("Cumulative Bridges Count")
            .with(bar(col::BRIDGES)?)
            .with(line(col::CUMULATIVE_BRIDGES)?.on_secondary_axis()),
        ChartSpec::new("volume-over-time", "Bridges Volume Over Time")
            .axes("Date", "Volume (USD)")
            .secondary_axis("Cumulative Volume (USD)")
            .with(bar(col::VOLUME)?)
            .with(line(col::CUMULATIVE_VOLUME)?.on_secondary_axis()),
        ChartSpec::new(
            "avg-volume-per-user",
            "Avg Bridges Volume Per User Over Time",
        )
        .axes("Date", "Volume (USD)")
        .with(scatter(col::AVG_VOLUME_PER_USER)?),
        ChartSpec::new("avg-volume-per-txn", "Avg Volume of Bridges Over Time")
            .axes("Date", "Volume (USD)")
            .with(scatter(col::AVG_VOLUME_PER_TXN)?),
    ])
}

pub async fn overall_bridgors(
    cache: &ResultCache,
    params: &QueryParameters,
) -> Result<Vec<ChartSpec>, DashboardError> {
    let t = fetch(cache, Report::Bridgors, params).await?;
    Ok(vec![
        ChartSpec::new("bridgors-over-time", "Number of Bridgors Over Time")
            .axes("Date", "Number of Bridgors")
            .stacked()
            .with(Series::from_columns(
                &t,
                SeriesKind::Bar,
                col::DATE,
                col::NEW_BRIDGORS,
            )?)
            .with(Series::from_columns(
                &t,
                SeriesKind::Bar,
                col::DATE,
                col::ACTIVE_BRIDGORS,
            )?),
        ChartSpec::new("bridgors-growth", "Total New Bridgors Over Time")
            .axes("Date", "Bridgors Growth")
            .with(Series::from_columns(
                &t,
                SeriesKind::Line,
                col::DATE,
                col::BRIDGORS_GROWTH,
            )?),
    ])
}

// --- Routes ---

pub struct RankedSection {
    pub table: TableView,
    pub charts: Vec<ChartSpec>,
}

pub async fn routes(
    cache: &ResultCache,
    params: &QueryParameters,
    top_n: usize,
) -> Result<RankedSection, DashboardError> {
    let t = fetch(cache, Report::Routes, params).await?;
    let by_volume = shaper::top_n(&t, col::VOLUME, top_n)?;
    let by_bridges = shaper::top_n(&t, col::BRIDGES, top_n)?;
    Ok(RankedSection {
        table: TableView::from_table(&shaper::with_display_index(&t)?),
        charts: vec![
            ChartSpec::new("top-routes-volume", &format!("Top {top_n} Routes by Volume"))
                .axes("Route", "Volume (USD)")
                .with(Series::from_columns(
                    &by_volume,
                    SeriesKind::Bar,
                    col::ROUTE,
                    col::VOLUME,
                )?),
            ChartSpec::new("top-routes-bridges", &format!("Top {top_n} Routes by Bridges"))
                .axes("Route", "Bridges")
                .with(Series::from_columns(
                    &by_bridges,
                    SeriesKind::Bar,
                    col::ROUTE,
                    col::BRIDGES,
                )?),
        ],
    })
}

pub async fn route_distribution(
    cache: &ResultCache,
    params: &QueryParameters,
) -> Result<Vec<ChartSpec>, DashboardError> {
    let by_volume = fetch(cache, Report::RouteVolumeDistribution, params).await?;
    let by_volume = shaper::order_by_labels(&by_volume, ROUTE_VOLUME.name, &ROUTE_VOLUME.labels())?;
    let by_count = fetch(cache, Report::RouteCountDistribution, params).await?;
    let by_count = shaper::order_by_labels(&by_count, ROUTE_COUNT.name, &ROUTE_COUNT.labels())?;
    Ok(vec![
        ChartSpec::new(
            "routes-by-volume",
            "Distribution of Routes By Total Bridges Volume",
        )
        .with(Series::from_columns(
            &by_volume,
            SeriesKind::Pie,
            ROUTE_VOLUME.name,
            col::NUMBER_OF_ROUTES,
        )?),
        ChartSpec::new(
            "routes-by-count",
            "Distribution of Routes By Total Bridges Count",
        )
        .with(Series::from_columns(
            &by_count,
            SeriesKind::Pie,
            ROUTE_COUNT.name,
            col::NUMBER_OF_ROUTES,
        )?),
    ])
}

// --- Assets ---

pub async fn assets(
    cache: &ResultCache,
    params: &QueryParameters,
    top_n: usize,
) -> Result<RankedSection, DashboardError> {
    let t = fetch(cache, Report::Assets, params).await?;
    let by_volume = shaper::top_n(&t, col::VOLUME_USD, top_n)?;
    let by_bridges = shaper::top_n(&t, col::BRIDGES, top_n)?;
    Ok(RankedSection {
        table: TableView::from_table(&shaper::with_display_index(&t)?),
        charts: vec![
            ChartSpec::new(
                "top-tokens-volume",
                &format!("Top {top_n} Tokens by Volume (USD)"),
            )
            .axes("Symbol", "Volume (USD)")
            .with(Series::from_columns(
                &by_volume,
                SeriesKind::Bar,
                col::SYMBOL,
                col::VOLUME_USD,
            )?),
            ChartSpec::new("top-tokens-bridges", &format!("Top {top_n} Tokens by Bridges"))
                .axes("Symbol", "Bridges")
                .with(Series::from_columns(
                    &by_bridges,
                    SeriesKind::Bar,
                    col::SYMBOL,
                    col::BRIDGES,
                )?),
        ],
    })
}

pub const PERCENTAGE: &str = "Percentage";

pub async fn asset_sizes(
    cache: &ResultCache,
    params: &QueryParameters,
) -> Result<ChartSpec, DashboardError> {
    let t = fetch(cache, Report::AssetSizeDistribution, params).await?;
    let t = shaper::group_shares(&t, col::SYMBOL, col::BRIDGES, PERCENTAGE)?;
    let t = shaper::order_by_labels(&t, TRANSFER_SIZE.name, &TRANSFER_SIZE.labels())?;
    let series = Series::grouped_by(&t, SeriesKind::Bar, TRANSFER_SIZE.name, col::SYMBOL, PERCENTAGE)?;
    Ok(ChartSpec::new(
        "asset-size-distribution",
        "Distribution of Squid's Bridged Assets By Volume",
    )
    .axes("Percentage of Bridges", "Symbol")
    .stacked()
    .horizontal()
    .with_all(series))
}

pub struct AssetActivitySection {
    pub symbols: Vec<String>,
    pub selected: String,
    pub chart: ChartSpec,
}

/// Activity of one asset. The selector lists every symbol seen in the range;
/// the requested asset wins, then the configured default, then the first symbol.
pub async fn asset_activity(
    cache: &ResultCache,
    params: &QueryParameters,
    default_asset: &str,
) -> Result<AssetActivitySection, DashboardError> {
    let listing = fetch(cache, Report::Assets, params).await?;
    let symbols = shaper::distinct_text(&listing, col::SYMBOL)?;
    let selected = params
        .asset()
        .filter(|a| symbols.iter().any(|s| s.as_str() == *a))
        .or_else(|| symbols.iter().find(|s| s.as_str() == default_asset).map(String::as_str))
        .or_else(|| symbols.first().map(String::as_str))
        .ok_or(ShapeError::NoData)?
        .to_string();

    let scoped = params.clone().with_asset(&selected)?;
    let t = fetch(cache, Report::AssetActivity, &scoped).await?;
    let t = shaper::filter_eq(&t, col::SYMBOL, &selected)?;
    let chart = ChartSpec::new("asset-activity", "Bridges By Asset Over Time")
        .axes("Date", "Volume of Bridges (USD)")
        .secondary_axis("Number of Bridges")
        .with(Series::from_columns(
            &t,
            SeriesKind::Bar,
            col::DATE,
            col::VOLUME_OF_BRIDGES,
        )?)
        .with(
            Series::from_columns(&t, SeriesKind::Line, col::DATE, col::NUMBER_OF_BRIDGES)?
                .on_secondary_axis(),
        );
    Ok(AssetActivitySection {
        symbols,
        selected,
        chart,
    })
}

// --- Chain ---

pub struct ChainSection {
    pub side: ChainSide,
    pub kpis: Vec<Kpi>,
    pub table: TableView,
    pub charts: Vec<ChartSpec>,
}

pub async fn chain(
    cache: &ResultCache,
    params: &QueryParameters,
    side: ChainSide,
) -> Result<ChainSection, DashboardError> {
    let totals = fetch(cache, Report::ChainTotals(side), params).await?;
    let kpis = vec![
        Kpi::new(
            "Volume (USD)",
            grouped_or_missing(shaper::sum_column(&totals, col::VOLUME_USD)?, 0, "$", ""),
        ),
        Kpi::new(
            "Avg Volume per Bridge (USD)",
            grouped_or_missing(
                shaper::mean_column(&totals, col::CHAIN_AVG_PER_BRIDGE)?,
                1,
                "$",
                "",
            ),
        ),
        Kpi::new(
            "Bridges",
            grouped_or_missing(shaper::sum_column(&totals, col::BRIDGES)?, 0, "", " Txns"),
        ),
        Kpi::new(
            "Bridgors",
            grouped_or_missing(shaper::sum_column(&totals, col::BRIDGORS)?, 0, "", " Wallets"),
        ),
    ];
    let table = TableView::from_table(&shaper::with_display_index(&shaper::rename_columns(
        &totals,
        &[(col::CHAIN, side.label())],
    )?)?);

    let activity = fetch(cache, Report::ChainActivity(side), params).await?;
    let assets = fetch(cache, Report::ChainAssets(side), params).await?;
    let id = |name: &str| format!("{}-{name}", side.as_str());

    let charts = vec![
        ChartSpec::new(&id("volume"), "Volume Over Time")
            .axes(" ", "$USD")
            .stacked()
            .with_all(Series::grouped_by(
                &activity,
                SeriesKind::Bar,
                col::CHAIN,
                col::DATE,
                col::VOLUME_USD,
            )?),
        ChartSpec::new(&id("bridges"), "Bridges Over Time")
            .axes(" ", "Txns count")
            .with_all(Series::grouped_by(
                &activity,
                SeriesKind::Line,
                col::CHAIN,
                col::DATE,
                col::BRIDGES,
            )?),
        ChartSpec::new(&id("token-volume"), "Bridge Volume By Token ($USD)").with(
            Series::from_columns(&assets, SeriesKind::Pie, col::SYMBOL, col::VOLUME_USD)?,
        ),
        ChartSpec::new(&id("token-count"), "Bridge Count By Token").with(Series::from_columns(
            &assets,
            SeriesKind::Pie,
            col::SYMBOL,
            col::BRIDGES,
        )?),
    ];

    Ok(ChainSection {
        side,
        kpis,
        table,
        charts,
    })
}
