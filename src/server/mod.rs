//! Network-facing layer: listener, per-request dispatch, response encoding.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Listener                             │
//! │      accept → read request bytes → WorkerPool.submit        │
//! └───────────────────────────┬─────────────────────────────────┘
//!                             │ (worker thread)
//!                             ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Dispatcher                            │
//! │   parse → ResponseCache.get ──hit──► HttpResponse (HIT)     │
//! │                 │miss                                       │
//! │                 ▼                                           │
//! │   ImageFetcher.load → serialize → ResponseCache.put         │
//! │                 └──────────────► HttpResponse (MISS)        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! One request line in, one response out, connection closed after each
//! response.

pub mod dispatch;
pub mod listener;
pub mod response;

pub use dispatch::{parse_request, percent_decode, Dispatcher, ParsedRequest, USAGE_MESSAGE};
pub use listener::{serve, MAX_REQUEST_BYTES};
pub use response::{CacheStatus, HttpResponse, CACHE_HEADER};
