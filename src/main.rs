//! imgserve - image-to-pixel-array HTTP service.
//!
//! This binary wires the cache, worker pool, and listener together and runs
//! the accept loop until the process is killed.

use std::net::TcpListener;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use imgserve::{Config, Dispatcher, ImageLoader, ResponseCache, WorkerPool};

fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let workers = config.worker_count();

    info!("Configuration:");
    info!("  Workers: {}", workers);
    info!(
        "  Cache: {} entries, TTL {}s",
        config.cache_capacity, config.cache_ttl_secs
    );
    match config.fetch_timeout() {
        Some(timeout) => info!("  Fetch timeout: {}s", timeout.as_secs()),
        None => info!("  Fetch timeout: none (a stalled download holds its worker)"),
    }

    let loader = match ImageLoader::with_timeout(config.fetch_timeout()) {
        Ok(loader) => loader,
        Err(e) => {
            error!("Failed to build HTTP client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let cache = Arc::new(ResponseCache::with_config(
        config.cache_capacity,
        config.cache_ttl(),
    ));
    let dispatcher = Arc::new(Dispatcher::new(cache, loader));

    let pool = match WorkerPool::new(workers) {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to start worker pool: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let addr = config.bind_address();
    let listener = match TcpListener::bind(&addr) {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    info!("Server listening on http://{}", addr);
    info!(
        "Try: curl 'http://{}/?url=<percent-encoded reference>&resize=256'",
        addr
    );

    imgserve::server::serve(listener, dispatcher, &pool);

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "imgserve=debug"
    } else {
        "imgserve=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
