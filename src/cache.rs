//! Time-bounded response cache.
//!
//! This module stores serialized JSON responses keyed by the decoded image
//! reference and resize target, so repeated requests for the same image skip
//! the download/decode pipeline entirely.
//!
//! # Cache Key
//!
//! Responses are cached by a composite key including:
//! - The percent-decoded image reference (path or URL), trimmed
//! - The resize target (0 = native dimensions)
//!
//! Two requests with the same reference and resize value always collide to
//! the same key; differing resize values never collide.
//!
//! # Expiry and Eviction
//!
//! Entries expire `ttl` after insertion; an expired entry behaves exactly
//! like a miss and is purged during the failed lookup. Access does not
//! refresh the insertion timestamp, so when the table is full the entry with
//! the oldest `created_at` is evicted by a linear scan. At the default
//! capacity of 100 entries a scan is cheaper than maintaining a priority
//! structure.
//!
//! # Compression
//!
//! Pixel-array JSON is highly repetitive, so payloads are zstd-compressed
//! before storage and decompressed on retrieval. A payload that fails to
//! decompress (or decompresses to the wrong size) is discarded and reported
//! as a miss, never surfaced to the caller.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{debug, warn};

/// Default maximum number of cached responses.
pub const DEFAULT_CACHE_CAPACITY: usize = 100;

/// Default entry time-to-live in seconds (1 hour).
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

/// zstd compression level (0 = library default).
const COMPRESSION_LEVEL: i32 = 0;

// =============================================================================
// Cache Key
// =============================================================================

/// Cache key for serialized responses.
///
/// Derived deterministically from the decoded reference and resize target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    reference: String,
    resize: u32,
}

impl CacheKey {
    /// Create a new cache key from a decoded reference and resize target.
    ///
    /// The reference is trimmed so that stray whitespace from the request
    /// line cannot split the cache.
    pub fn new(reference: &str, resize: u32) -> Self {
        Self {
            reference: reference.trim().to_owned(),
            resize,
        }
    }

    /// The normalized image reference.
    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// The resize target (0 = no resizing).
    pub fn resize(&self) -> u32 {
        self.resize
    }
}

// =============================================================================
// Cache Entry
// =============================================================================

/// A single cached response.
///
/// Invariant: `payload` decompresses to exactly `original_size` bytes.
#[derive(Debug, Clone)]
struct CacheEntry {
    /// zstd-compressed response body
    payload: Vec<u8>,

    /// Size of the uncompressed body in bytes
    original_size: usize,

    /// Insertion time; never refreshed by reads
    created_at: Instant,
}

// =============================================================================
// Response Cache
// =============================================================================

/// Bounded, TTL-expiring store for serialized responses.
///
/// The whole table sits behind one coarse [`Mutex`]; every `get` or `put`
/// holds the lock for its full duration. Per-key operations are therefore
/// linearizable. Two workers that miss on the same key concurrently will
/// both fetch and both write; the payloads are identical, so last writer
/// wins without a correctness problem.
///
/// The cache is process-scoped state: created once at startup, passed into
/// the dispatcher, and dropped (without persistence) at exit.
pub struct ResponseCache {
    /// The guarded table
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,

    /// Maximum number of entries
    capacity: usize,

    /// Entry time-to-live
    ttl: Duration,
}

impl ResponseCache {
    /// Create a cache with default capacity (100) and TTL (1 hour).
    pub fn new() -> Self {
        Self::with_config(
            DEFAULT_CACHE_CAPACITY,
            Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
        )
    }

    /// Create a cache with the given capacity and TTL.
    ///
    /// A capacity of 0 is clamped to 1 so that `put` always succeeds.
    pub fn with_config(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
            ttl,
        }
    }

    /// Look up a response, honoring the TTL.
    ///
    /// Returns the stored body if the key is present and younger than the
    /// TTL. An expired entry is purged and reported as a miss. An entry
    /// whose payload fails to decompress to its recorded size is likewise
    /// discarded and reported as a miss.
    pub fn get(&self, key: &CacheKey) -> Option<Bytes> {
        let mut entries = self.lock();

        let (payload, original_size, created_at) = match entries.get(key) {
            Some(entry) => (entry.payload.clone(), entry.original_size, entry.created_at),
            None => return None,
        };

        if created_at.elapsed() >= self.ttl {
            debug!(reference = key.reference(), "cache entry expired");
            entries.remove(key);
            return None;
        }

        match zstd::decode_all(payload.as_slice()) {
            Ok(body) if body.len() == original_size => Some(Bytes::from(body)),
            Ok(body) => {
                warn!(
                    reference = key.reference(),
                    expected = original_size,
                    actual = body.len(),
                    "cache entry decompressed to unexpected size; discarding"
                );
                entries.remove(key);
                None
            }
            Err(e) => {
                warn!(
                    reference = key.reference(),
                    error = %e,
                    "failed to decompress cache entry; discarding"
                );
                entries.remove(key);
                None
            }
        }
    }

    /// Store a response body under `key` with a fresh timestamp.
    ///
    /// The body is zstd-compressed before storage. If the table is full and
    /// `key` is not already present, the entry with the oldest `created_at`
    /// is evicted first, so the table never exceeds its capacity.
    pub fn put(&self, key: CacheKey, body: &[u8]) {
        let payload = match zstd::encode_all(body, COMPRESSION_LEVEL) {
            Ok(payload) => payload,
            Err(e) => {
                // Skipping the insert only costs a redundant fetch later.
                warn!(reference = key.reference(), error = %e, "failed to compress response; not caching");
                return;
            }
        };

        let mut entries = self.lock();

        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            Self::evict_oldest(&mut entries);
        }

        debug!(
            reference = key.reference(),
            resize = key.resize(),
            original_size = body.len(),
            compressed_size = payload.len(),
            "caching response"
        );

        entries.insert(
            key,
            CacheEntry {
                payload,
                original_size: body.len(),
                created_at: Instant::now(),
            },
        );
    }

    /// Current number of cached entries (including not-yet-purged expired ones).
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove all entries.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entry time-to-live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Evict the entry with the smallest `created_at`.
    ///
    /// Linear scan over the table; acceptable at the small capacities this
    /// cache is configured with.
    fn evict_oldest(entries: &mut HashMap<CacheKey, CacheEntry>) {
        let oldest = entries
            .iter()
            .min_by_key(|(_, entry)| entry.created_at)
            .map(|(key, _)| key.clone());

        if let Some(key) = oldest {
            debug!(reference = key.reference(), "evicting oldest cache entry");
            entries.remove(&key);
        }
    }

    /// Lock the table, recovering from a poisoned mutex.
    ///
    /// A worker that panics while holding the lock leaves the table in a
    /// consistent state (every operation completes or never starts), so the
    /// poison flag can be safely ignored.
    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn small_cache(capacity: usize) -> ResponseCache {
        ResponseCache::with_config(capacity, Duration::from_secs(60))
    }

    #[test]
    fn test_basic_get_put() {
        let cache = small_cache(10);
        let key = CacheKey::new("photo.png", 0);

        assert!(cache.get(&key).is_none());

        cache.put(key.clone(), b"{\"width\":1}");
        assert_eq!(cache.get(&key), Some(Bytes::from_static(b"{\"width\":1}")));
    }

    #[test]
    fn test_roundtrip_preserves_bytes() {
        let cache = small_cache(10);
        let key = CacheKey::new("photo.png", 32);
        let body: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();

        cache.put(key.clone(), &body);
        assert_eq!(cache.get(&key).as_deref(), Some(body.as_slice()));
    }

    #[test]
    fn test_different_resize_different_key() {
        let cache = small_cache(10);

        cache.put(CacheKey::new("photo.png", 0), b"full");
        cache.put(CacheKey::new("photo.png", 64), b"small");

        assert_eq!(
            cache.get(&CacheKey::new("photo.png", 0)),
            Some(Bytes::from_static(b"full"))
        );
        assert_eq!(
            cache.get(&CacheKey::new("photo.png", 64)),
            Some(Bytes::from_static(b"small"))
        );
    }

    #[test]
    fn test_key_normalizes_whitespace() {
        assert_eq!(CacheKey::new(" photo.png ", 0), CacheKey::new("photo.png", 0));
        assert_ne!(CacheKey::new("photo.png", 0), CacheKey::new("photo.png", 1));
    }

    #[test]
    fn test_ttl_expiry_behaves_as_miss() {
        let cache = ResponseCache::with_config(10, Duration::from_millis(40));
        let key = CacheKey::new("photo.png", 0);

        cache.put(key.clone(), b"body");
        assert!(cache.get(&key).is_some());

        thread::sleep(Duration::from_millis(60));
        assert!(cache.get(&key).is_none());

        // The expired entry is purged as a side effect of the lookup.
        assert!(cache.is_empty());
    }

    #[test]
    fn test_reinsert_after_expiry() {
        let cache = ResponseCache::with_config(10, Duration::from_millis(40));
        let key = CacheKey::new("photo.png", 0);

        cache.put(key.clone(), b"first");
        thread::sleep(Duration::from_millis(60));
        assert!(cache.get(&key).is_none());

        cache.put(key.clone(), b"second");
        assert_eq!(cache.get(&key), Some(Bytes::from_static(b"second")));
    }

    #[test]
    fn test_capacity_never_exceeded() {
        let cache = small_cache(3);

        for i in 0..10 {
            cache.put(CacheKey::new(&format!("img-{i}"), 0), b"body");
            assert!(cache.len() <= 3);
        }
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_evicts_oldest_entry() {
        let cache = small_cache(3);

        // Space the inserts out so created_at ordering is unambiguous.
        cache.put(CacheKey::new("a", 0), b"a");
        thread::sleep(Duration::from_millis(10));
        cache.put(CacheKey::new("b", 0), b"b");
        thread::sleep(Duration::from_millis(10));
        cache.put(CacheKey::new("c", 0), b"c");
        thread::sleep(Duration::from_millis(10));

        // Reading "a" must not protect it: access does not refresh created_at.
        assert!(cache.get(&CacheKey::new("a", 0)).is_some());

        cache.put(CacheKey::new("d", 0), b"d");

        assert!(cache.get(&CacheKey::new("a", 0)).is_none());
        assert!(cache.get(&CacheKey::new("b", 0)).is_some());
        assert!(cache.get(&CacheKey::new("c", 0)).is_some());
        assert!(cache.get(&CacheKey::new("d", 0)).is_some());
    }

    #[test]
    fn test_update_existing_key_does_not_evict() {
        let cache = small_cache(2);

        cache.put(CacheKey::new("a", 0), b"a1");
        cache.put(CacheKey::new("b", 0), b"b1");
        cache.put(CacheKey::new("a", 0), b"a2");

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&CacheKey::new("a", 0)), Some(Bytes::from_static(b"a2")));
        assert!(cache.get(&CacheKey::new("b", 0)).is_some());
    }

    #[test]
    fn test_corrupt_payload_is_a_miss() {
        let cache = small_cache(10);
        let key = CacheKey::new("photo.png", 0);

        cache.put(key.clone(), b"body");

        // Corrupt the stored payload behind the cache's back.
        {
            let mut entries = cache.entries.lock().unwrap();
            entries.get_mut(&key).unwrap().payload = vec![0xDE, 0xAD, 0xBE, 0xEF];
        }

        assert!(cache.get(&key).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_wrong_original_size_is_a_miss() {
        let cache = small_cache(10);
        let key = CacheKey::new("photo.png", 0);

        cache.put(key.clone(), b"body");

        {
            let mut entries = cache.entries.lock().unwrap();
            entries.get_mut(&key).unwrap().original_size += 1;
        }

        assert!(cache.get(&key).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear() {
        let cache = small_cache(10);
        cache.put(CacheKey::new("a", 0), b"a");
        cache.put(CacheKey::new("b", 0), b"b");
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let cache = ResponseCache::with_config(0, Duration::from_secs(60));
        assert_eq!(cache.capacity(), 1);

        cache.put(CacheKey::new("a", 0), b"a");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_concurrent_access() {
        use std::sync::Arc;

        let cache = Arc::new(small_cache(50));
        let mut handles = Vec::new();

        for t in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(thread::spawn(move || {
                for i in 0..100 {
                    let key = CacheKey::new(&format!("img-{}", i % 20), t);
                    cache.put(key.clone(), format!("body-{i}").as_bytes());
                    cache.get(&key);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(cache.len() <= 50);
    }
}
