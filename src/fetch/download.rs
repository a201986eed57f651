//! Remote image download.

use std::io::Write;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::FetchError;

/// Download `url` into a transient local file.
///
/// The returned [`NamedTempFile`] deletes itself on drop, so the download is
/// cleaned up whether or not the subsequent decode succeeds. Non-2xx status
/// codes and empty bodies are errors.
pub fn download_to_temp(
    client: &reqwest::blocking::Client,
    url: &str,
) -> Result<NamedTempFile, FetchError> {
    debug!(url, "downloading remote image");

    let response = client.get(url).send()?.error_for_status()?;
    let body = response.bytes()?;

    if body.is_empty() {
        return Err(FetchError::EmptyDownload(url.to_owned()));
    }

    let mut file = NamedTempFile::new()?;
    file.write_all(&body)?;
    file.flush()?;

    debug!(url, bytes = body.len(), path = %file.path().display(), "download complete");
    Ok(file)
}
