//! Guarded Cache - demo workload
//!
//! Starts a cache from environment configuration, drives a burst of
//! concurrent lookups through `get_or_compute` against a simulated slow
//! data source, then prints the stats snapshot as JSON.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use guarded_cache::{Cache, CacheConfig, CacheStrategy};

/// Concurrent callers in the workload
const WORKERS: usize = 16;
/// Lookups per caller
const REQUESTS_PER_WORKER: usize = 200;
/// Distinct user ids requested
const KEY_SPACE: usize = 50;
/// Simulated latency of the data source
const SOURCE_LATENCY: Duration = Duration::from_millis(20);

/// Main entry point for the demo workload.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Start the cache and its sweepers
/// 4. Run the workload until done or interrupted
/// 5. Print stats and shut the cache down
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "guarded_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CacheConfig::from_env();
    info!(
        "Configuration loaded: enabled={}, max_entries={}, default_ttl={}s, null_ttl={}s",
        config.enabled,
        config.max_entries,
        config.default_ttl.as_secs(),
        config.null_ttl.as_secs()
    );

    let switch = Arc::new(AtomicBool::new(config.enabled));
    let cache: Arc<Cache<String>> =
        Cache::start(config, switch).context("failed to start cache")?;

    let source_calls = Arc::new(AtomicUsize::new(0));

    tokio::select! {
        result = run_workload(Arc::clone(&cache), Arc::clone(&source_calls)) => result?,
        _ = shutdown_signal() => warn!("Workload interrupted"),
    }

    info!(
        source_calls = source_calls.load(Ordering::Relaxed),
        "Workload finished"
    );
    let stats = cache.stats();
    println!("{}", serde_json::to_string_pretty(&stats)?);

    cache.shutdown();
    Ok(())
}

/// Fans out lookups over a small key space, then exercises invalidation.
async fn run_workload(
    cache: Arc<Cache<String>>,
    source_calls: Arc<AtomicUsize>,
) -> anyhow::Result<()> {
    cache
        .warm_up("config:site", CacheStrategy::Persistent, || async {
            Ok::<_, anyhow::Error>(Some("guarded-cache demo".to_string()))
        })
        .await;

    let mut workers = Vec::with_capacity(WORKERS);
    for worker in 0..WORKERS {
        let cache = Arc::clone(&cache);
        let source_calls = Arc::clone(&source_calls);
        workers.push(tokio::spawn(async move {
            let mut failures = 0usize;
            for i in 0..REQUESTS_PER_WORKER {
                let id = (worker * 31 + i * 17) % KEY_SPACE;
                let key = format!("user:{}", id);
                let calls = Arc::clone(&source_calls);
                let result = cache
                    .get_or_load(&key, CacheStrategy::Medium, || load_user(id, calls))
                    .await;
                if result.is_err() {
                    failures += 1;
                }
                cache.increment("workload:requests", 1)?;
            }
            Ok::<_, anyhow::Error>(failures)
        }));
    }

    let mut failures = 0;
    for worker in workers {
        failures += worker.await.context("worker panicked")??;
    }

    let removed = cache.remove_by_pattern("user:1*");
    info!(
        failures,
        removed,
        requests = %cache.get("workload:requests").unwrap_or_default(),
        "Workload complete"
    );
    Ok(())
}

/// Simulated repository lookup: some ids have no row, some fail.
async fn load_user(id: usize, calls: Arc<AtomicUsize>) -> anyhow::Result<Option<String>> {
    calls.fetch_add(1, Ordering::Relaxed);
    tokio::time::sleep(SOURCE_LATENCY).await;
    match id {
        id if id % 13 == 12 => Err(anyhow!("data source timeout for user {}", id)),
        id if id % 7 == 0 => Ok(None),
        id => Ok(Some(format!("{{\"id\":{},\"name\":\"user-{}\"}}", id, id))),
    }
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
