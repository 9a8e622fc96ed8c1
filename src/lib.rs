pub mod api;
pub mod cli;
pub mod clients;
pub mod config;
pub mod db;
pub mod entities;
pub mod models;
pub mod services;

use anyhow::Context;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

pub use cli::{Cli, Commands};
pub use config::Config;
use services::PageAdsOutcome;

pub async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    init_tracing(&config);
    config.validate()?;

    if config.upstream.api_key.is_empty() {
        warn!("RAPIDAPI_KEY is not set; upstream requests will be rejected");
    }

    match cli.command.clone().unwrap_or(Commands::Serve) {
        Commands::Serve => run_server(config).await,
        Commands::Search {
            query,
            country_code,
        } => cmd_search(config, &query.join(" "), country_code.as_deref()).await,
        Commands::PageAds {
            page_id,
            country_code,
        } => cmd_page_ads(config, &page_id, country_code.as_deref()).await,
        Commands::Init => {
            if Config::create_default_if_missing()? {
                println!("✓ Config file created. Edit config.toml and run again.");
            } else {
                println!("config.toml already exists");
            }
            Ok(())
        }
    }
}

fn init_tracing(config: &Config) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    if config.general.log_format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    info!(
        "adlib-proxy v{} starting on port {}",
        env!("CARGO_PKG_VERSION"),
        config.server.port
    );

    let prometheus_handle = if config.observability.metrics_enabled {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        info!("Prometheus metrics recorder initialized");
        Some(handle)
    } else {
        None
    };

    let port = config.server.port;
    let state = api::create_app_state_from_config(config, prometheus_handle).await?;
    let store = state.store.clone();

    let app = api::router(state);
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("Server running on port {}", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(store) = store {
        if let Err(e) = store.close().await {
            error!("Error closing database: {}", e);
        }
    }

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Error listening for shutdown: {}", e),
    }
}

async fn cmd_search(config: Config, query: &str, country_code: Option<&str>) -> anyhow::Result<()> {
    let state = api::create_app_state_from_config(config, None).await?;

    let raw = state
        .search_service
        .search_advertisers(query, country_code)
        .await?;

    println!("{}", serde_json::to_string_pretty(&raw)?);

    if let Some(store) = state.store.clone() {
        store.close().await?;
    }
    Ok(())
}

async fn cmd_page_ads(
    config: Config,
    page_id: &str,
    country_code: Option<&str>,
) -> anyhow::Result<()> {
    let state = api::create_app_state_from_config(config, None).await?;

    let outcome = state
        .page_ads_service
        .get_page_ads(page_id, country_code)
        .await?;

    let output = match outcome {
        PageAdsOutcome::Cached(ads) => {
            info!("Served {} ads from cache", ads.len());
            serde_json::json!({ "results": ads })
        }
        PageAdsOutcome::Fetched(raw) => raw,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    if let Some(store) = state.store.clone() {
        store.close().await?;
    }
    Ok(())
}
