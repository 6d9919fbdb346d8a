use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use coves_appview::{community, config::Config, feed::hydrate::Hydrator, firehose, handlers, health, jobs, metrics, middleware, state::AppState, store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        #[cfg(debug_assertions)]
        {
            "debug".to_string()
        }
        #[cfg(not(debug_assertions))]
        {
            "warn".to_string()
        }
    });

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&log_level))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    tracing::info!("Starting Coves AppView");

    let config = Config::from_env().expect("invalid configuration");

    let metrics_recorder = metrics::MetricsRecorder::new();
    let metrics_handle = metrics_recorder.handle().clone();
    tracing::info!("Metrics initialized");

    let db_pool = store::init_db(store::DbConfig {
        database_url: config.database_url.clone(),
        max_connections: config.db_max_connections,
        min_connections: config.db_min_connections,
        acquire_timeout: config.db_acquire_timeout,
        idle_timeout: config.db_idle_timeout,
    })
    .await?;
    tracing::info!("Database initialized");

    let hydrator = Hydrator::new(db_pool.clone());

    let shard_count = std::env::var("FIREHOSE_SHARD_COUNT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8usize);
    let dispatcher = firehose::dispatcher::spawn(db_pool.clone(), shard_count);
    tracing::info!(shard_count, "firehose dispatcher started");

    let ingest_handle = firehose::ingest::spawn(db_pool.clone(), dispatcher.clone(), config.relay_url.clone());
    // Keep the handle alive for the process lifetime; dropping it would cancel the reader.
    std::mem::forget(ingest_handle);
    tracing::info!(relay_url = %config.relay_url, "firehose relay ingestion started");

    let pds_client: Arc<dyn community::PdsClient> = Arc::new(community::ReqwestPdsClient::new(config.pds_write_timeout));

    let config = Arc::new(config);

    let app_state = AppState {
        db_pool: db_pool.clone(),
        hydrator,
        dispatcher,
        config: config.clone(),
        pds_client: pds_client.clone(),
    };

    {
        let pool = db_pool.clone();
        tokio::spawn(jobs::run_identity_cache_cleanup_worker(pool));
    }
    {
        let pool = db_pool.clone();
        tokio::spawn(jobs::run_unfurl_cache_cleanup_worker(pool));
    }
    {
        let pool = db_pool.clone();
        let pds = pds_client.clone();
        let seal_key = config.seal_key.clone();
        tokio::spawn(jobs::run_credential_refresh_worker(pool, pds, seal_key));
    }
    tracing::info!("background workers started");

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(300));
        loop {
            ticker.tick().await;
            let max_age = Duration::from_secs(600);
            middleware::rate_limit::DID_RATE_LIMITER.cleanup_old_buckets(max_age).await;
            middleware::rate_limit::IP_LIMITER.cleanup_old_buckets(max_age).await;
        }
    });

    let metrics_router = if config.enable_metrics {
        Router::new().route("/metrics", get(metrics::metrics_handler)).with_state(metrics_handle)
    } else {
        Router::new()
    };

    let app = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route(
            "/xrpc/social.coves.actor.getPosts",
            get(handlers::get_posts::get_posts),
        )
        .route(
            "/xrpc/social.coves.actor.getProfile",
            get(handlers::get_profile::get_profile),
        )
        .route(
            "/xrpc/social.coves.feed.getTimeline",
            get(handlers::get_timeline::get_timeline),
        )
        .route(
            "/xrpc/social.coves.community.getFeed/{community}",
            get(handlers::get_community_feed::get_community_feed),
        )
        .route(
            "/xrpc/social.coves.community.create",
            post(handlers::create_community::create_community),
        )
        .route(
            "/xrpc/social.coves.community.post.create",
            post(handlers::create_community_post::create_community_post),
        )
        .route(
            "/xrpc/social.coves.aggregator.authorize",
            post(handlers::grant_aggregator_authorization::grant_aggregator_authorization),
        )
        .merge(metrics_router)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(middleware::logging::log_headers_middleware))
        .layer(axum::middleware::from_fn(middleware::rate_limit::rate_limit_middleware))
        .with_state(app_state);

    let port = config.server_port;
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
