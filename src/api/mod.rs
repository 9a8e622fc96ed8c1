use axum::{Router, http::HeaderValue, middleware, routing::get};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::clients::{AdLibraryApi, AdLibraryClient};
use crate::config::Config;
use crate::db::Store;
use crate::services::{FreshnessPolicy, PageAdsService, SearchService};

mod error;
mod health;
mod observability;
mod page_ads;
mod search;

pub use error::{ApiError, ErrorBody};

pub struct AppState {
    pub config: Arc<Config>,

    /// `None` when persistence is disabled.
    pub store: Option<Store>,

    pub search_service: Arc<SearchService>,

    pub page_ads_service: Arc<PageAdsService>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub const fn store(&self) -> Option<&Store> {
        self.store.as_ref()
    }
}

/// Wires services around an already opened store and upstream client.
#[must_use]
pub fn create_app_state(
    config: Config,
    store: Option<Store>,
    api: Arc<dyn AdLibraryApi>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    let policy = FreshnessPolicy::new(config.page_ads_ttl());

    let search_service = Arc::new(SearchService::new(api.clone(), store.clone()));
    let page_ads_service = Arc::new(PageAdsService::new(api, store.clone(), policy));

    Arc::new(AppState {
        config: Arc::new(config),
        store,
        search_service,
        page_ads_service,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    })
}

/// Opens the store (when configured) and builds the upstream client from `config`.
pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let store = if config.persistence_enabled() {
        Some(Store::new(&config.general.database_url).await?)
    } else {
        tracing::info!("Persistence disabled, proxying every request upstream");
        None
    };

    let api: Arc<dyn AdLibraryApi> = Arc::new(AdLibraryClient::new(&config.upstream)?);

    Ok(create_app_state(config, store, api, prometheus_handle))
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors_origins = &state.config.server.cors_allowed_origins;

    let cors_layer = if cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .route("/", get(health::liveness))
        .route("/api/health/ready", get(health::readiness))
        .route("/api/search-advertisers", get(search::search_advertisers))
        .route("/api/page-ads/{page_id}", get(page_ads::get_page_ads))
        .route("/metrics", get(observability::get_metrics))
        .route_layer(middleware::from_fn(observability::logging_middleware))
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
