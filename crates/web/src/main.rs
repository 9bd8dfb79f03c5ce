mod metrics;
mod models;
mod queries;

use anyhow::Result;
use askama::Template;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use common::cache::ResultCache;
use common::chains::{ALL_CHAINS, CHAIN_OPTIONS};
use common::config::{Config, Credentials, Dashboard};
use common::error::{DashboardError, ValidationError};
use common::types::{parse_date, ChainSide, Granularity, QueryParameters};
use common::warehouse::SnowflakeClient;
use metrics_exporter_prometheus::PrometheusHandle;
use models::{ChartSpec, Kpi};
use queries::{AssetActivitySection, ChainSection, RankedSection};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub struct AppState {
    pub cache: ResultCache,
    pub dashboard: Dashboard,
    pub metrics: Option<PrometheusHandle>,
}

// --- Filters ---

/// Raw query string of every page and partial. Empty values mean "use the default".
#[derive(Debug, Default, Deserialize)]
pub struct Filters {
    pub start: Option<String>,
    pub end: Option<String>,
    pub timeframe: Option<String>,
    pub chain: Option<String>,
    pub asset: Option<String>,
}

fn present(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

impl Filters {
    /// Validate into query parameters. `chain_page` applies the default chain
    /// when none was requested.
    pub fn params(
        &self,
        defaults: &Dashboard,
        chain_page: bool,
    ) -> Result<QueryParameters, ValidationError> {
        let start = present(self.start.as_ref())
            .map(parse_date)
            .transpose()?
            .unwrap_or(defaults.default_start);
        let end = present(self.end.as_ref())
            .map(parse_date)
            .transpose()?
            .unwrap_or(defaults.default_end);
        let granularity = present(self.timeframe.as_ref())
            .map(str::parse::<Granularity>)
            .transpose()?
            .unwrap_or(defaults.default_granularity);

        let mut params = QueryParameters::new(start, end, granularity)?;
        let chain = present(self.chain.as_ref())
            .or_else(|| chain_page.then_some(defaults.default_chain.as_str()));
        if let Some(chain) = chain {
            params = params.with_chain(chain)?;
        }
        if let Some(asset) = present(self.asset.as_ref()) {
            params = params.with_asset(asset)?;
        }
        Ok(params)
    }
}

/// What the filter form shows, plus the query string partials are loaded with.
pub struct Selection {
    pub start: String,
    pub end: String,
    pub timeframe: &'static str,
    pub chain: String,
    pub asset: String,
    pub query: String,
}

impl Selection {
    fn new(params: &QueryParameters, chain_page: bool) -> Self {
        let start = params.start().format("%Y-%m-%d").to_string();
        let end = params.end().format("%Y-%m-%d").to_string();
        let timeframe = params.granularity().as_str();
        let chain = params.chain().unwrap_or(ALL_CHAINS).to_string();
        let mut query = format!("start={start}&end={end}&timeframe={timeframe}");
        if chain_page {
            query.push_str(&format!("&chain={}", urlencoding::encode(&chain)));
        }
        Self {
            start,
            end,
            timeframe,
            chain,
            asset: params.asset().unwrap_or_default().to_string(),
            query,
        }
    }

    /// Raw filter values echoed back when validation failed.
    fn unvalidated(filters: &Filters, defaults: &Dashboard) -> Self {
        let text = |v: Option<&String>, fallback: String| {
            present(v).map_or(fallback, str::to_string)
        };
        Self {
            start: text(filters.start.as_ref(), defaults.default_start.to_string()),
            end: text(filters.end.as_ref(), defaults.default_end.to_string()),
            timeframe: present(filters.timeframe.as_ref())
                .and_then(|t| t.parse::<Granularity>().ok())
                .unwrap_or(defaults.default_granularity)
                .as_str(),
            chain: text(filters.chain.as_ref(), defaults.default_chain.clone()),
            asset: text(filters.asset.as_ref(), String::new()),
            query: String::new(),
        }
    }
}

// --- Templates ---

#[derive(Template)]
#[template(path = "home.html")]
struct HomeTemplate {
    active: &'static str,
}

#[derive(Template)]
#[template(path = "page.html")]
struct PageTemplate {
    active: &'static str,
    title: &'static str,
    selection: Selection,
    error: Option<String>,
    timeframes: [Granularity; 3],
    chains: Vec<&'static str>,
    show_chain: bool,
    sections: Vec<SectionSlot>,
}

/// A placeholder the page loads over HTMX.
pub struct SectionSlot {
    pub id: String,
    pub heading: &'static str,
    pub url: String,
}

#[derive(Template)]
#[template(path = "partials/kpis.html")]
struct KpisTemplate {
    kpis: Vec<Kpi>,
}

#[derive(Template)]
#[template(path = "partials/charts.html")]
struct ChartsTemplate {
    charts: Vec<ChartSpec>,
}

#[derive(Template)]
#[template(path = "partials/ranked.html")]
struct RankedTemplate {
    section: RankedSection,
}

#[derive(Template)]
#[template(path = "partials/asset_activity.html")]
struct AssetActivityTemplate {
    section: AssetActivitySection,
    query: String,
}

#[derive(Template)]
#[template(path = "partials/chain.html")]
struct ChainTemplate {
    section: ChainSection,
}

#[derive(Template)]
#[template(path = "partials/section_error.html")]
struct SectionErrorTemplate {
    no_data: bool,
    message: String,
}

fn render(template: &impl Template) -> Response {
    match template.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "template render failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Render a section, degrading any failure to an inline message so the rest
/// of the page keeps working.
fn section<T: Template>(name: &'static str, result: Result<T, DashboardError>) -> Response {
    match result {
        Ok(template) => render(&template),
        Err(e) => {
            if e.is_no_data() {
                tracing::debug!(section = name, "no data for selection");
            } else {
                tracing::warn!(section = name, error = %e, "section failed");
            }
            render(&SectionErrorTemplate {
                no_data: e.is_no_data(),
                message: e.to_string(),
            })
        }
    }
}

fn invalid(e: &ValidationError) -> Response {
    let body = render(&SectionErrorTemplate {
        no_data: false,
        message: e.to_string(),
    });
    (StatusCode::BAD_REQUEST, body).into_response()
}

// --- Pages ---

#[derive(Clone, Copy)]
struct PageSpec {
    path: &'static str,
    title: &'static str,
    chain_page: bool,
    sections: &'static [(&'static str, &'static str)],
}

const OVERALL: PageSpec = PageSpec {
    path: "overall",
    title: "Overall Stats",
    chain_page: false,
    sections: &[
        ("kpis", "Key Figures"),
        ("activity", "Bridging Activity"),
        ("bridgors", "Bridgors"),
    ],
};

const ROUTES: PageSpec = PageSpec {
    path: "routes",
    title: "By Routes",
    chain_page: false,
    sections: &[
        ("top", "Routes"),
        ("distribution", "Route Distribution"),
    ],
};

const ASSETS: PageSpec = PageSpec {
    path: "assets",
    title: "By Assets",
    chain_page: false,
    sections: &[
        ("top", "Assets"),
        ("sizes", "Bridge Size by Asset"),
        ("activity", "Asset Activity"),
    ],
};

const CHAIN: PageSpec = PageSpec {
    path: "chain",
    title: "Specific Chain",
    chain_page: true,
    sections: &[
        ("source", "As Source Chain"),
        ("destination", "As Destination Chain"),
    ],
};

fn page(state: &AppState, spec: PageSpec, filters: &Filters) -> Response {
    let chains = std::iter::once(ALL_CHAINS)
        .chain(CHAIN_OPTIONS.iter().copied())
        .collect();
    let (selection, error, status) = match filters.params(&state.dashboard, spec.chain_page) {
        Ok(params) => (Selection::new(&params, spec.chain_page), None, StatusCode::OK),
        Err(e) => (
            Selection::unvalidated(filters, &state.dashboard),
            Some(e.to_string()),
            StatusCode::BAD_REQUEST,
        ),
    };
    let sections = if error.is_some() {
        Vec::new()
    } else {
        spec.sections
            .iter()
            .map(|&(id, heading)| {
                let mut url = format!("/partials/{}/{id}?{}", spec.path, selection.query);
                if id == "activity" && spec.path == "assets" && !selection.asset.is_empty() {
                    url.push_str(&format!("&asset={}", urlencoding::encode(&selection.asset)));
                }
                SectionSlot {
                    id: format!("{}-{id}", spec.path),
                    heading,
                    url,
                }
            })
            .collect()
    };
    let body = render(&PageTemplate {
        active: spec.path,
        title: spec.title,
        selection,
        error,
        timeframes: Granularity::ALL,
        chains,
        show_chain: spec.chain_page,
        sections,
    });
    (status, body).into_response()
}

async fn index() -> Response {
    render(&HomeTemplate { active: "home" })
}

async fn overall_page(State(state): State<Arc<AppState>>, Query(f): Query<Filters>) -> Response {
    page(&state, OVERALL, &f)
}

async fn routes_page(State(state): State<Arc<AppState>>, Query(f): Query<Filters>) -> Response {
    page(&state, ROUTES, &f)
}

async fn assets_page(State(state): State<Arc<AppState>>, Query(f): Query<Filters>) -> Response {
    page(&state, ASSETS, &f)
}

async fn chain_page(State(state): State<Arc<AppState>>, Query(f): Query<Filters>) -> Response {
    page(&state, CHAIN, &f)
}

// --- Partials ---

macro_rules! params_or_400 {
    ($state:expr, $filters:expr, $chain_page:expr) => {
        match $filters.params(&$state.dashboard, $chain_page) {
            Ok(p) => p,
            Err(e) => return invalid(&e),
        }
    };
}

async fn overall_kpis_partial(
    State(state): State<Arc<AppState>>,
    Query(f): Query<Filters>,
) -> Response {
    let params = params_or_400!(state, f, false);
    let result = queries::overall_kpis(&state.cache, &params).await;
    section("overall_kpis", result.map(|kpis| KpisTemplate { kpis }))
}

async fn overall_activity_partial(
    State(state): State<Arc<AppState>>,
    Query(f): Query<Filters>,
) -> Response {
    let params = params_or_400!(state, f, false);
    let result = queries::overall_activity(&state.cache, &params).await;
    section("overall_activity", result.map(|charts| ChartsTemplate { charts }))
}

async fn overall_bridgors_partial(
    State(state): State<Arc<AppState>>,
    Query(f): Query<Filters>,
) -> Response {
    let params = params_or_400!(state, f, false);
    let result = queries::overall_bridgors(&state.cache, &params).await;
    section("overall_bridgors", result.map(|charts| ChartsTemplate { charts }))
}

async fn routes_top_partial(
    State(state): State<Arc<AppState>>,
    Query(f): Query<Filters>,
) -> Response {
    let params = params_or_400!(state, f, false);
    let result = queries::routes(&state.cache, &params, state.dashboard.top_n).await;
    section("routes_top", result.map(|section| RankedTemplate { section }))
}

async fn routes_distribution_partial(
    State(state): State<Arc<AppState>>,
    Query(f): Query<Filters>,
) -> Response {
    let params = params_or_400!(state, f, false);
    let result = queries::route_distribution(&state.cache, &params).await;
    section("routes_distribution", result.map(|charts| ChartsTemplate { charts }))
}

async fn assets_top_partial(
    State(state): State<Arc<AppState>>,
    Query(f): Query<Filters>,
) -> Response {
    let params = params_or_400!(state, f, false);
    let result = queries::assets(&state.cache, &params, state.dashboard.top_n).await;
    section("assets_top", result.map(|section| RankedTemplate { section }))
}

async fn assets_sizes_partial(
    State(state): State<Arc<AppState>>,
    Query(f): Query<Filters>,
) -> Response {
    let params = params_or_400!(state, f, false);
    let result = queries::asset_sizes(&state.cache, &params).await;
    section(
        "assets_sizes",
        result.map(|chart| ChartsTemplate {
            charts: vec![chart],
        }),
    )
}

async fn assets_activity_partial(
    State(state): State<Arc<AppState>>,
    Query(f): Query<Filters>,
) -> Response {
    let params = params_or_400!(state, f, false);
    let query = Selection::new(&params, false).query;
    let result =
        queries::asset_activity(&state.cache, &params, &state.dashboard.default_asset).await;
    section(
        "assets_activity",
        result.map(|section| AssetActivityTemplate { section, query }),
    )
}

async fn chain_partial(
    State(state): State<Arc<AppState>>,
    Path(side): Path<String>,
    Query(f): Query<Filters>,
) -> Response {
    let side = match side.as_str() {
        "source" => ChainSide::Source,
        "destination" => ChainSide::Destination,
        _ => return StatusCode::NOT_FOUND.into_response(),
    };
    let params = params_or_400!(state, f, true);
    let result = queries::chain(&state.cache, &params, side).await;
    section(side.as_str(), result.map(|section| ChainTemplate { section }))
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    match &state.metrics {
        Some(handle) => {
            handle.run_upkeep();
            handle.render().into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

// --- Router ---

pub fn create_router_with_state(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/overall", get(overall_page))
        .route("/routes", get(routes_page))
        .route("/assets", get(assets_page))
        .route("/chain", get(chain_page))
        .route("/partials/overall/kpis", get(overall_kpis_partial))
        .route("/partials/overall/activity", get(overall_activity_partial))
        .route("/partials/overall/bridgors", get(overall_bridgors_partial))
        .route("/partials/routes/top", get(routes_top_partial))
        .route(
            "/partials/routes/distribution",
            get(routes_distribution_partial),
        )
        .route("/partials/assets/top", get(assets_top_partial))
        .route("/partials/assets/sizes", get(assets_sizes_partial))
        .route("/partials/assets/activity", get(assets_activity_partial))
        .route("/partials/chain/{side}", get(chain_partial))
        .route("/metrics", get(metrics_handler))
        .nest_service(
            "/static",
            ServeDir::new(concat!(env!("CARGO_MANIFEST_DIR"), "/static")),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    let (dispatch, _otel_guard) = common::observability::build_dispatch(
        "squid-dashboard-web",
        &config.general.log_level,
        config.general.log_format,
    );
    tracing::dispatcher::set_global_default(dispatch)?;

    let prometheus = metrics::init_global()?;

    // Missing credentials stop startup here rather than failing every query later.
    let credentials = Credentials::load(&config.warehouse.secrets_path)?;
    let client = SnowflakeClient::new(&config.warehouse, credentials)?;
    let cache = ResultCache::new(Arc::new(client), &config.cache);
    if config.cache.max_entries.is_none() {
        tracing::info!("result cache is unbounded; set cache.max_entries to cap it");
    }

    let web_port = config.web.as_ref().map_or(8080, |w| w.port);
    let web_host = config
        .web
        .as_ref()
        .map_or("0.0.0.0".to_string(), |w| w.host.clone());

    let state = Arc::new(AppState {
        cache,
        dashboard: config.dashboard,
        metrics: Some(prometheus),
    });

    let app = create_router_with_state(state);
    let addr: SocketAddr = format!("{web_host}:{web_port}").parse()?;
    tracing::info!("dashboard listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
