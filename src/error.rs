use thiserror::Error;

/// Errors produced while parsing an incoming request line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// The request line does not carry a `url=` query parameter.
    #[error("request line does not contain a url parameter")]
    MissingQuery,

    /// The request line has no ` HTTP/` terminator after the query.
    #[error("request line is missing the HTTP version terminator")]
    MissingTerminator,

    /// A percent-escape uses non-hex characters (e.g. `%zz`).
    #[error("invalid percent-escape `%{0}`")]
    InvalidEscape(String),

    /// A percent-escape is cut off at the end of the reference.
    #[error("truncated percent-escape at end of reference")]
    TruncatedEscape,

    /// The decoded reference is not valid UTF-8.
    #[error("decoded reference is not valid UTF-8")]
    InvalidUtf8,

    /// The resize parameter is present but not a non-negative integer.
    #[error("invalid resize value `{0}`: expected a non-negative integer")]
    InvalidResize(String),
}

/// Errors produced while fetching and decoding an image.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Remote download failed (connection, status, timeout).
    #[error("download failed: {0}")]
    Download(#[from] reqwest::Error),

    /// The remote server returned an empty body.
    #[error("downloaded image is empty: {0}")]
    EmptyDownload(String),

    /// The image codec rejected the file.
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    /// Local file I/O error (missing file, unreadable temp file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors produced while handling one request end to end.
///
/// Every variant is converted to a JSON error response at the dispatcher
/// boundary; none of them propagate to the worker thread.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The request line could not be parsed.
    #[error("failed to parse request: {0}")]
    Request(#[from] RequestError),

    /// The image could not be fetched or decoded.
    #[error("failed to load image: {0}")]
    Fetch(#[from] FetchError),

    /// The pixel buffer could not be serialized to JSON.
    #[error("failed to serialize response: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors produced by the worker pool.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// The submission channel is closed; no worker will run the task.
    #[error("worker pool is shut down; task rejected")]
    Shutdown,
}
