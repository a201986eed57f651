//! Single-shot HTTP/1.1 response formatting.
//!
//! The service speaks a deliberately small slice of HTTP: one request line
//! in, one response out, connection closed. Responses are built here as
//! status line + headers + JSON body and serialized to raw bytes for the
//! socket.

use bytes::Bytes;

/// Header carrying the cache indicator, kept so cache behavior stays
/// observable from the outside.
pub const CACHE_HEADER: &str = "X-Cache";

/// Whether a response was served from the cache or freshly computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    /// Wire representation used in the [`CACHE_HEADER`] header.
    pub fn as_str(self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

// =============================================================================
// HTTP Response
// =============================================================================

/// A fully-formed response ready to be written to a connection.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    status: u16,
    reason: &'static str,
    headers: Vec<(&'static str, String)>,
    body: Bytes,
}

impl HttpResponse {
    /// A 200 response carrying a pixel-array JSON body.
    pub fn success(body: Bytes, cache_status: CacheStatus) -> Self {
        Self {
            status: 200,
            reason: "OK",
            headers: vec![
                ("Content-Type", "application/json".to_owned()),
                ("Access-Control-Allow-Origin", "*".to_owned()),
                (CACHE_HEADER, cache_status.as_str().to_owned()),
            ],
            body,
        }
    }

    /// The 200 welcome/usage response for request lines without a url query.
    pub fn welcome(message: &str) -> Self {
        let body = serde_json::json!({ "message": message });
        Self {
            status: 200,
            reason: "OK",
            headers: vec![("Content-Type", "application/json".to_owned())],
            body: Bytes::from(body.to_string()),
        }
    }

    /// A 500 response carrying `{"error": message}`.
    pub fn error(message: &str) -> Self {
        let body = serde_json::json!({ "error": message });
        Self {
            status: 500,
            reason: "Internal Server Error",
            headers: vec![("Content-Type", "application/json".to_owned())],
            body: Bytes::from(body.to_string()),
        }
    }

    /// Numeric status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Response body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Look up a header by name (case-sensitive; the service emits a fixed set).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(header, _)| *header == name)
            .map(|(_, value)| value.as_str())
    }

    /// Serialize to raw bytes for the socket.
    ///
    /// `Content-Length` is computed here so it always matches the body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut head = format!("HTTP/1.1 {} {}\r\n", self.status, self.reason);
        for (name, value) in &self.headers {
            head.push_str(name);
            head.push_str(": ");
            head.push_str(value);
            head.push_str("\r\n");
        }
        head.push_str(&format!("Content-Length: {}\r\n\r\n", self.body.len()));

        let mut bytes = head.into_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_response_headers() {
        let response = HttpResponse::success(Bytes::from_static(b"{}"), CacheStatus::Hit);

        assert_eq!(response.status(), 200);
        assert_eq!(response.header("Content-Type"), Some("application/json"));
        assert_eq!(response.header(CACHE_HEADER), Some("HIT"));
        assert_eq!(response.header("Access-Control-Allow-Origin"), Some("*"));
    }

    #[test]
    fn test_miss_indicator() {
        let response = HttpResponse::success(Bytes::from_static(b"{}"), CacheStatus::Miss);
        assert_eq!(response.header(CACHE_HEADER), Some("MISS"));
    }

    #[test]
    fn test_error_response() {
        let response = HttpResponse::error("something broke");

        assert_eq!(response.status(), 500);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["error"], "something broke");
    }

    #[test]
    fn test_welcome_response() {
        let response = HttpResponse::welcome("usage goes here");

        assert_eq!(response.status(), 200);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["message"], "usage goes here");
    }

    #[test]
    fn test_to_bytes_layout() {
        let response = HttpResponse::success(Bytes::from_static(b"abcd"), CacheStatus::Miss);
        let bytes = response.to_bytes();
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Length: 4\r\n"));
        assert!(text.contains("X-Cache: MISS\r\n"));
        assert!(text.ends_with("\r\n\r\nabcd"));
    }

    #[test]
    fn test_error_message_is_json_escaped() {
        let response = HttpResponse::error("quote \" and backslash \\");
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["error"], "quote \" and backslash \\");
    }
}
