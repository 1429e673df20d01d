//! AMM pool ingestion: account feed, state decoding, rate math and the
//! per-pool update task that writes into the shared graph.

use crate::errors::{AppError, Result};
use crate::graph::ExchangeRateGraph;
use crate::models::PoolMetadata;
use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

pub mod calc;
pub mod client;
pub mod state;

pub use calc::{DEFAULT_FEE_RATE, pool_rates};
pub use client::AccountFeed;
pub use state::{POOL_STATE_MIN_LEN, PoolSnapshot};

/// Decode one raw account update and write the pool's rates into the graph.
///
/// Snapshots with an empty reserve are returned without touching the graph.
pub async fn apply_pool_update(
    graph: &ExchangeRateGraph,
    pool: &PoolMetadata,
    data: &[u8],
) -> Result<PoolSnapshot> {
    let snapshot = PoolSnapshot::decode(data)?;
    if !snapshot.has_liquidity() {
        debug!(pool = %pool.name(), "[POOL] empty reserve, skipping");
        return Ok(snapshot);
    }
    graph
        .upsert_pool_rates(
            &pool.base_token,
            &pool.quote_token,
            snapshot.base_reserve,
            snapshot.quote_reserve,
            pool.fee_rate,
        )
        .await?;
    Ok(snapshot)
}

/// Consume a stream of raw pool-state bytes until it ends or shutdown is
/// signalled. Malformed data and invalid rates skip the update only.
///
/// # Errors
/// `Subscription` when the update stream ends on its own.
pub async fn run_pool_monitor<S>(
    pool: PoolMetadata,
    mut updates: S,
    graph: Arc<ExchangeRateGraph>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()>
where
    S: Stream<Item = Vec<u8>> + Unpin,
{
    let name = pool.name();
    if *shutdown.borrow() {
        return Ok(());
    }

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return Ok(());
                }
            }
            update = updates.next() => {
                let Some(data) = update else {
                    return Err(AppError::Subscription(format!("{name}: update stream ended")));
                };
                match apply_pool_update(&graph, &pool, &data).await {
                    Ok(snapshot) => {
                        info!(
                            pool = %name,
                            base_reserve = snapshot.base_reserve,
                            quote_reserve = snapshot.quote_reserve,
                            "[POOL] update"
                        );
                    }
                    Err(e) if e.is_recoverable() => {
                        warn!(pool = %name, error = %e, "[POOL] discarding update");
                    }
                    Err(e) => return Err(e),
                }
            }
        }
    }
}

/// Subscribe to one pool account and spawn its monitor.
///
/// The task owns its own copy of `pool`. A failed subscription or a dropped
/// feed ends this task only.
pub fn spawn_pool_monitor(
    feed: AccountFeed,
    pool: PoolMetadata,
    graph: Arc<ExchangeRateGraph>,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let name = pool.name();
        let subscribed = tokio::select! {
            res = feed.subscribe(&pool.address) => res,
            _ = shutdown.changed() => {
                info!(pool = %name, "[SHUTDOWN] stopped before subscribing");
                return;
            }
        };
        // The handle is only needed to subscribe.
        drop(feed);
        let rx = match subscribed {
            Ok(rx) => rx,
            Err(e) => {
                error!(pool = %name, error = %e, "[POOL] subscription failed");
                return;
            }
        };
        info!(pool = %name, address = %pool.address, "[POOL] subscribed");

        match run_pool_monitor(pool, receiver_stream(rx), graph, shutdown).await {
            Ok(()) => info!(pool = %name, "[SHUTDOWN] pool monitor stopped"),
            Err(e) => error!(pool = %name, error = %e, "[POOL] monitor terminated"),
        }
    })
}

/// Wait for every pool task and log the ones that panicked or were
/// cancelled. Returns how many failed.
pub async fn join_pool_monitors(tasks: Vec<tokio::task::JoinHandle<()>>) -> usize {
    let mut failed = 0;
    for res in futures::future::join_all(tasks).await {
        if let Err(e) = res {
            error!(error = %e, "[SHUTDOWN] pool task failed");
            failed += 1;
        }
    }
    failed
}

fn receiver_stream(mut rx: mpsc::Receiver<Vec<u8>>) -> impl Stream<Item = Vec<u8>> + Unpin {
    futures::stream::poll_fn(move |cx| rx.poll_recv(cx))
}
