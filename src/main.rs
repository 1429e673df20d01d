use anyhow::Result;
use rate_graph_arb::{
    arbitrage::{ArbitrageDetector, DetectorConfig},
    config::AppConfig,
    dex::{self, AccountFeed, spawn_pool_monitor},
    graph::ExchangeRateGraph,
    report::TracingReporter,
    scheduler::{DetectionScheduler, spawn_detection_scheduler},
    utils,
};
use std::sync::Arc;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    utils::init_logging();

    let config = AppConfig::load()?;
    tracing::info!(
        ws_url = %config.ws_url,
        pools = config.pools.len(),
        default_fee_rate = config.default_fee_rate,
        "[INIT] rate-graph-arb starting"
    );

    // Without the shared connection nothing can be monitored, so this is fatal.
    let feed = AccountFeed::connect(&config.ws_url).await?;

    let graph = Arc::new(ExchangeRateGraph::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // One task per pool, each with its own copy of the pool metadata.
    let mut pool_tasks = Vec::with_capacity(config.pools.len());
    for pool in &config.pools {
        pool_tasks.push(spawn_pool_monitor(
            feed.clone(),
            pool.clone(),
            Arc::clone(&graph),
            shutdown_rx.clone(),
        ));
    }
    drop(feed);

    let scheduler = DetectionScheduler::new(
        Arc::clone(&graph),
        ArbitrageDetector::new(DetectorConfig {
            min_profit_epsilon: config.min_profit_epsilon,
        }),
        Arc::new(TracingReporter),
        config.detection_interval,
        config.heartbeat_every,
    );
    let scheduler_task = spawn_detection_scheduler(scheduler, shutdown_rx);

    utils::spawn_shutdown_listener(shutdown_tx).await?;

    let failed = dex::join_pool_monitors(pool_tasks).await;
    if failed > 0 {
        tracing::warn!(failed, "[SHUTDOWN] some pool tasks did not stop cleanly");
    }
    scheduler_task.await?;
    tracing::info!("[SHUTDOWN] all tasks stopped");
    Ok(())
}
