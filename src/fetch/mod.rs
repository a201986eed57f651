//! Image fetching layer.
//!
//! This module turns an image reference (local path or remote URL) into a
//! decoded pixel buffer, optionally downsampled to a maximum dimension.
//!
//! # Components
//!
//! - [`ImageFetcher`]: the narrow contract consumed by the dispatcher
//! - [`ImageLoader`]: the production implementation (download + decode + resize)
//! - [`ImageData`]: the decoded pixel buffer, serializable to the wire JSON
//!
//! Remote references are downloaded to a transient temp file before decoding;
//! the file is removed when it goes out of scope, regardless of whether the
//! decode succeeded.

mod download;
mod loader;

pub use loader::{is_remote, ImageData, ImageFetcher, ImageLoader};
