//! Per-request dispatch: parse, consult the cache, fetch on a miss, respond.
//!
//! The dispatcher runs entirely on worker threads, never on the accept path.
//! It is the error boundary for a request: every failure in parsing,
//! fetching, or serialization becomes a JSON error response, so a bad
//! request can never take down a worker or disturb other in-flight requests.
//!
//! # Request grammar
//!
//! ```text
//! GET /?url=<percent-encoded-reference>[&resize=<n>] HTTP/1.1
//! ```
//!
//! The reference is everything between `url=` and the ` HTTP/` terminator,
//! with an optional trailing `&resize=<n>` split off before percent-decoding.
//! A missing terminator, a non-hex or truncated escape, and a non-numeric
//! resize value are all hard failures for that request only. Any request
//! line without `GET /?url=` gets the welcome payload instead.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, ResponseCache};
use crate::error::{DispatchError, RequestError};
use crate::fetch::ImageFetcher;

use super::response::{CacheStatus, HttpResponse};

/// Marker that selects the image pipeline; anything else is a welcome.
const QUERY_MARKER: &str = "GET /?url=";

/// Terminator after the query in the request line.
const LINE_TERMINATOR: &str = " HTTP/";

/// Resize parameter separator inside the query value.
const RESIZE_MARKER: &str = "&resize=";

/// Usage string returned in the welcome payload.
pub const USAGE_MESSAGE: &str =
    "Image pixel service. Request /?url=<percent-encoded path or URL>&resize=<max dimension>";

// =============================================================================
// Request Parsing
// =============================================================================

/// A successfully parsed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRequest {
    /// Percent-decoded image reference (local path or URL)
    pub reference: String,

    /// Resize target; 0 means full original dimensions
    pub resize: u32,
}

/// Parse the image reference and optional resize target out of a raw
/// request.
///
/// # Errors
///
/// Fails if the `url=` marker or ` HTTP/` terminator is missing, if the
/// resize value does not parse as an integer, or if the reference carries a
/// malformed percent-escape.
pub fn parse_request(request: &str) -> Result<ParsedRequest, RequestError> {
    let start = request
        .find(QUERY_MARKER)
        .map(|index| index + QUERY_MARKER.len())
        .ok_or(RequestError::MissingQuery)?;

    let end = request[start..]
        .find(LINE_TERMINATOR)
        .map(|index| start + index)
        .ok_or(RequestError::MissingTerminator)?;

    let mut target = &request[start..end];
    let mut resize = 0u32;

    if let Some(position) = target.find(RESIZE_MARKER) {
        let value = &target[position + RESIZE_MARKER.len()..];
        resize = value
            .parse()
            .map_err(|_| RequestError::InvalidResize(value.to_owned()))?;
        target = &target[..position];
    }

    let reference = percent_decode(target)?;
    Ok(ParsedRequest { reference, resize })
}

/// Strictly percent-decode `input`.
///
/// Unlike lenient decoders, a `%` followed by anything other than two hex
/// digits is an error rather than a passthrough; silently mangling a
/// reference would poison the cache key.
pub fn percent_decode(input: &str) -> Result<String, RequestError> {
    let bytes = input.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' {
            if i + 3 > bytes.len() {
                return Err(RequestError::TruncatedEscape);
            }
            let escape = &bytes[i + 1..i + 3];
            let high = hex_value(escape[0]);
            let low = hex_value(escape[1]);
            match (high, low) {
                (Some(high), Some(low)) => decoded.push(high << 4 | low),
                _ => {
                    return Err(RequestError::InvalidEscape(
                        String::from_utf8_lossy(escape).into_owned(),
                    ))
                }
            }
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }

    String::from_utf8(decoded).map_err(|_| RequestError::InvalidUtf8)
}

fn hex_value(byte: u8) -> Option<u8> {
    (byte as char).to_digit(16).map(|value| value as u8)
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Turns one raw request into one response payload.
///
/// Holds the process-wide [`ResponseCache`] and an [`ImageFetcher`]
/// implementation; both are injected so the dispatch pipeline can be tested
/// without a live listener or real image files.
pub struct Dispatcher<F: ImageFetcher> {
    cache: Arc<ResponseCache>,
    fetcher: F,
}

impl<F: ImageFetcher> Dispatcher<F> {
    /// Create a dispatcher over a shared cache and a fetcher.
    pub fn new(cache: Arc<ResponseCache>, fetcher: F) -> Self {
        Self { cache, fetcher }
    }

    /// Handle one raw request, infallibly.
    ///
    /// This is the per-request error boundary: any parse or fetch failure
    /// is converted to a 500 JSON response here.
    pub fn handle(&self, raw: &[u8]) -> HttpResponse {
        let request = String::from_utf8_lossy(raw);

        if !request.contains(QUERY_MARKER) {
            debug!("request without url query; sending welcome");
            return HttpResponse::welcome(USAGE_MESSAGE);
        }

        match self.process(&request) {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "request failed");
                HttpResponse::error(&e.to_string())
            }
        }
    }

    /// The fallible request pipeline: parse, cache lookup, fetch, store.
    fn process(&self, request: &str) -> Result<HttpResponse, DispatchError> {
        let parsed = parse_request(request)?;
        let key = CacheKey::new(&parsed.reference, parsed.resize);

        if let Some(body) = self.cache.get(&key) {
            debug!(reference = %parsed.reference, resize = parsed.resize, "cache hit");
            return Ok(HttpResponse::success(body, CacheStatus::Hit));
        }

        info!(reference = %parsed.reference, resize = parsed.resize, "cache miss; loading image");
        let image = self.fetcher.load(&parsed.reference, parsed.resize)?;
        let body = serde_json::to_vec(&image)?;

        // Failures never reach this point, so only good payloads are cached.
        self.cache.put(key, &body);

        Ok(HttpResponse::success(Bytes::from(body), CacheStatus::Miss))
    }
}

// =============================================================================
// Tests
// =============================================================================
