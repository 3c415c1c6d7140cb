//! One-shot collection CLI: run the fetch and persist jobs once against the
//! real catalog and staging store, then print the monitor snapshot. Useful
//! for backfills and for exercising a new adapter from a shell.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use techfeed_catalog::PgCatalog;
use techfeed_collector::jobs::RUN_ID_PARAM;
use techfeed_collector::{
    CollectMonitor, CollectPostsJob, Http, Job, JobParams, PersistPostsJob, PersistStage,
    RedisListStore, SourceRegistry, StagingQueue,
};
use techfeed_common::{Config, RunId};

#[derive(Parser)]
#[command(name = "techfeed-collector", about = "Run one collection cycle")]
struct Cli {
    /// Cap on posts fetched per source (overrides SOURCE_POST_LIMIT).
    #[arg(long)]
    limit: Option<usize>,

    /// Skip the persist stage; only fetch and stage.
    #[arg(long)]
    fetch_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("techfeed=info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = Config::collector_from_env();
    let limit = cli.limit.or(config.source_post_limit);

    let catalog = Arc::new(PgCatalog::connect(&config.database_url).await?);
    catalog.migrate().await?;

    let store = RedisListStore::connect(&config.redis_url).await?;
    let queue = StagingQueue::new(Arc::new(store));
    let registry = Arc::new(SourceRegistry::new(&Http::new()));
    let monitor = CollectMonitor::new();

    let run_id = RunId::allocate();
    let params = JobParams::new().with(RUN_ID_PARAM, run_id.to_string());
    info!(run_id = %run_id, "starting one-shot collection");

    let collect = CollectPostsJob::new(
        registry,
        catalog.clone(),
        queue.clone(),
        monitor.clone(),
        limit,
    );
    collect.run(params.clone()).await?;

    if !cli.fetch_only {
        let persist = PersistPostsJob::new(PersistStage::new(
            queue,
            catalog,
            monitor.clone(),
            config.persist_chunk_size,
        ));
        persist.run(params).await?;
    }

    if let Some(snapshot) = monitor.latest() {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    }
    Ok(())
}
