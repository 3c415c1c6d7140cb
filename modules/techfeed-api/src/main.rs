use std::sync::Arc;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use techfeed_catalog::PgCatalog;
use techfeed_collector::{
    CollectMonitor, CollectPostsJob, Http, Job, JobRunner, PersistPostsJob, PersistStage,
    RedisListStore, SourceRegistry, StagingQueue,
};
use techfeed_common::Config;

mod auth;
mod rest;
mod scheduler;

pub struct AppState {
    pub runner: Arc<JobRunner>,
    pub monitor: CollectMonitor,
    pub collect_secret: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("techfeed=info".parse()?))
        .init();

    let config = Config::from_env();

    let catalog = Arc::new(PgCatalog::connect(&config.database_url).await?);
    catalog.migrate().await?;

    let store = RedisListStore::connect(&config.redis_url).await?;
    let queue = StagingQueue::new(Arc::new(store));
    let registry = Arc::new(SourceRegistry::new(&Http::new()));
    let monitor = CollectMonitor::new();

    let collect_job = CollectPostsJob::new(
        registry,
        catalog.clone(),
        queue.clone(),
        monitor.clone(),
        config.source_post_limit,
    );
    let persist_job = PersistPostsJob::new(PersistStage::new(
        queue,
        catalog,
        monitor.clone(),
        config.persist_chunk_size,
    ));

    let runner = Arc::new(JobRunner::start(vec![
        Arc::new(collect_job) as Arc<dyn Job>,
        Arc::new(persist_job) as Arc<dyn Job>,
    ]));

    scheduler::start(runner.clone(), config.collect_interval_hours);

    let state = Arc::new(AppState {
        runner,
        monitor,
        collect_secret: config.collect_secret.clone(),
    });

    let app = Router::new()
        // Health check
        .route("/", get(|| async { "ok" }))
        // Manual trigger + monitoring
        .route("/api/jobs/trigger", post(rest::trigger_job))
        .route("/api/monitor/latest", get(rest::monitor_latest))
        .with_state(state)
        // Logging layer: method + path only
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        );

    let addr = format!("{}:{}", config.web_host, config.web_port);
    info!("techfeed API starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
