//! # imgserve
//!
//! A small HTTP service that decodes images into JSON pixel arrays.
//!
//! Given an image reference (local path or remote URL) and an optional
//! resize target, the service returns
//! `{"width": W, "height": H, "pixels": [[[r,g,b], ...], ...]}` and caches
//! the serialized response so repeated requests skip the download/decode
//! pipeline.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`pool`] - Fixed-size OS-thread worker pool over a shared task queue
//! - [`cache`] - TTL-expiring, capacity-bounded response cache with
//!   compressed payloads
//! - [`fetch`] - Image download, decode, and resize behind the
//!   [`ImageFetcher`] trait
//! - [`server`] - Accept loop, per-request dispatcher, response encoding
//! - [`config`] - CLI and environment configuration
//! - [`error`] - Error taxonomy
//!
//! A single-threaded accept loop reads one request's bytes per connection
//! and submits a task; workers run the dispatcher, which consults the cache
//! and falls back to the fetcher on a miss. Every per-request failure is
//! converted to a JSON error response at the dispatcher boundary.
//!
//! ## Example
//!
//! ```no_run
//! use std::net::TcpListener;
//! use std::sync::Arc;
//! use imgserve::{Dispatcher, ImageLoader, ResponseCache, WorkerPool};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cache = Arc::new(ResponseCache::new());
//!     let loader = ImageLoader::new()?;
//!     let dispatcher = Arc::new(Dispatcher::new(cache, loader));
//!     let pool = WorkerPool::new(4)?;
//!
//!     let listener = TcpListener::bind("127.0.0.1:8787")?;
//!     imgserve::server::serve(listener, dispatcher, &pool);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod pool;
pub mod server;

// Re-export commonly used types
pub use cache::{CacheKey, ResponseCache, DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL_SECS};
pub use config::Config;
pub use error::{DispatchError, FetchError, PoolError, RequestError};
pub use fetch::{is_remote, ImageData, ImageFetcher, ImageLoader};
pub use pool::{default_worker_count, WorkerPool, FALLBACK_WORKER_COUNT};
pub use server::{
    parse_request, percent_decode, serve, CacheStatus, Dispatcher, HttpResponse, ParsedRequest,
    CACHE_HEADER, MAX_REQUEST_BYTES, USAGE_MESSAGE,
};
