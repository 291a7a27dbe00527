//! FinGraph API Gateway
//!
//! The main entry point for all external API requests.
//! Handles:
//! - Grounded chat over the knowledge graph
//! - Market data lookups with provider fallback
//! - Concept lookup
//! - Rate limiting
//! - Observability (logging, metrics, tracing)

mod handlers;
mod middleware;

use anyhow::Context as _;
use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use fingraph_common::{
    clock::SystemClock,
    config::AppConfig,
    context::{create_language_model, ContextAssemblerConfig},
    knowledge::build_query_engine,
    metrics, MarketDataService, ResponsePipeline,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pipeline: Arc<ResponsePipeline>,
    pub market: Arc<MarketDataService>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("failed to load configuration")?;
    init_tracing(&config);

    info!("Starting FinGraph API Gateway v{}", fingraph_common::VERSION);

    metrics::register_metrics();
    let metrics_port = config.observability.metrics_port;
    if metrics_port != 0 {
        prometheus_builder(metrics_port)?
            .install()
            .context("failed to install Prometheus exporter")?;
        info!(port = metrics_port, "Prometheus exporter listening");
    }

    let graph = Arc::new(build_query_engine(&config.knowledge)?);
    info!(
        concepts = graph.store().len(),
        rules = graph.rules().len(),
        "Knowledge graph loaded"
    );

    let market = Arc::new(MarketDataService::from_config(&config, Arc::new(SystemClock)).await?);
    let model = create_language_model(&config.llm)?;
    info!(model = model.model_name(), "Language model selected");

    let pipeline = ResponsePipeline::new(
        graph,
        ContextAssemblerConfig {
            max_facts: config.knowledge.max_context_facts,
        },
        Some(Arc::clone(&market)),
        model,
    )?;

    let config = Arc::new(config);
    let state = AppState {
        config: Arc::clone(&config),
        pipeline: Arc::new(pipeline),
        market,
    };

    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Exporter with our latency buckets instead of summaries
fn prometheus_builder(port: u16) -> anyhow::Result<PrometheusBuilder> {
    let mut builder = PrometheusBuilder::new().with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)));
    for (name, buckets) in metrics::histogram_buckets() {
        builder = builder
            .set_buckets_for_metric(Matcher::Full(name.clone()), buckets)
            .with_context(|| format!("invalid buckets for {}", name))?;
    }
    Ok(builder)
}

/// `RUST_LOG` wins over the configured level when set
fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if config.observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let mut api_routes = Router::new()
        .route("/chat", post(handlers::chat::chat))
        .route("/market/{kind}/{symbol}", get(handlers::market::get_market_data))
        .route("/concepts", get(handlers::concepts::list_concepts))
        .route("/concepts/{id}", get(handlers::concepts::get_concept));

    if state.config.rate_limit.enabled {
        let limiter = middleware::rate_limit::create_rate_limiter(&state.config.rate_limit);
        api_routes = api_routes.layer(from_fn_with_state(
            limiter,
            middleware::rate_limit::rate_limit_middleware,
        ));
    }

    Router::new()
        // Health endpoints (never rate limited)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/v1", api_routes)
        .route_layer(from_fn(middleware::metrics::track_metrics))
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
