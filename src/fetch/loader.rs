//! Image loading, decoding, and resizing.

use std::path::Path;
use std::time::Duration;

use image::imageops::FilterType;
use image::DynamicImage;
use serde::Serialize;
use tracing::debug;

use crate::error::FetchError;

use super::download::download_to_temp;

/// A decoded image as rows of RGB triples.
///
/// Serializes directly to the wire format: `height` rows, each holding
/// `width` `[r, g, b]` triples with channels 0-255.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageData {
    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    /// Row-major pixel grid: `pixels[y][x] = [r, g, b]`
    pub pixels: Vec<Vec<[u8; 3]>>,
}

/// Contract between the dispatcher and the image pipeline.
///
/// `max_dimension == 0` means no resizing; otherwise the larger of
/// width/height is scaled to `max_dimension` with the aspect ratio
/// preserved. Implementations may block for the duration of a download or
/// decode; that blocking is confined to the calling worker thread.
pub trait ImageFetcher: Send + Sync {
    /// Produce a pixel buffer for `reference`, optionally downsampled.
    fn load(&self, reference: &str, max_dimension: u32) -> Result<ImageData, FetchError>;
}

/// Whether a reference is a remote URL rather than a local path.
pub fn is_remote(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://")
}

// =============================================================================
// Image Loader
// =============================================================================

/// Production [`ImageFetcher`]: downloads remote references to a temp file,
/// decodes via the `image` crate, and resizes to fit the requested bound.
pub struct ImageLoader {
    client: reqwest::blocking::Client,
}

impl ImageLoader {
    /// Create a loader with no download timeout.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(None)
    }

    /// Create a loader whose downloads abort after `timeout`.
    ///
    /// `None` means unlimited patience; a slow remote fetch then occupies
    /// its worker for the full duration.
    pub fn with_timeout(timeout: Option<Duration>) -> Result<Self, FetchError> {
        // The blocking client defaults to a 30s timeout, so "no timeout"
        // has to be disabled explicitly.
        let client = match timeout {
            Some(timeout) => reqwest::blocking::Client::builder().timeout(timeout),
            None => reqwest::blocking::Client::builder().timeout(None::<Duration>),
        }
        .build()?;
        Ok(Self { client })
    }
}

impl ImageFetcher for ImageLoader {
    fn load(&self, reference: &str, max_dimension: u32) -> Result<ImageData, FetchError> {
        debug!(reference, max_dimension, "loading image");

        let decoded = if is_remote(reference) {
            let file = download_to_temp(&self.client, reference)?;
            // `file` is dropped (and the temp file removed) after the decode,
            // whether or not it succeeded.
            image::open(file.path())?
        } else {
            image::open(Path::new(reference))?
        };

        let resized = resize_to_fit(decoded, max_dimension);
        Ok(to_pixels(resized))
    }
}

/// Scale `image` so its larger dimension equals `max_dimension`, keeping the
/// aspect ratio. A bound of 0 leaves the image untouched.
fn resize_to_fit(image: DynamicImage, max_dimension: u32) -> DynamicImage {
    if max_dimension == 0 {
        return image;
    }
    let resized = image.resize(max_dimension, max_dimension, FilterType::Triangle);
    debug!(
        width = resized.width(),
        height = resized.height(),
        "resized image"
    );
    resized
}

/// Flatten a decoded image into row-major RGB triples.
fn to_pixels(image: DynamicImage) -> ImageData {
    let rgb = image.into_rgb8();
    let (width, height) = rgb.dimensions();

    let mut pixels = Vec::with_capacity(height as usize);
    for y in 0..height {
        let mut row = Vec::with_capacity(width as usize);
        for x in 0..width {
            let pixel = rgb.get_pixel(x, y);
            row.push([pixel[0], pixel[1], pixel[2]]);
        }
        pixels.push(row);
    }

    ImageData {
        width,
        height,
        pixels,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Write a PNG with a deterministic gradient and return its path.
    fn fixture_image(dir: &TempDir, name: &str, width: u32, height: u32) -> PathBuf {
        let mut img = RgbImage::new(width, height);
        for y in 0..height {
            for x in 0..width {
                img.put_pixel(x, y, Rgb([(x * 7 % 256) as u8, (y * 11 % 256) as u8, 42]));
            }
        }
        let path = dir.path().join(name);
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn test_is_remote() {
        assert!(is_remote("http://example.com/a.png"));
        assert!(is_remote("https://example.com/a.png"));
        assert!(!is_remote("/tmp/a.png"));
        assert!(!is_remote("relative/a.png"));
        assert!(!is_remote("ftp://example.com/a.png"));
    }

    #[test]
    fn test_load_native_dimensions() {
        let dir = TempDir::new().unwrap();
        let path = fixture_image(&dir, "native.png", 8, 4);

        let loader = ImageLoader::new().unwrap();
        let data = loader.load(path.to_str().unwrap(), 0).unwrap();

        assert_eq!(data.width, 8);
        assert_eq!(data.height, 4);
        assert_eq!(data.pixels.len(), 4);
        assert!(data.pixels.iter().all(|row| row.len() == 8));

        // Spot-check the gradient.
        assert_eq!(data.pixels[0][0], [0, 0, 42]);
        assert_eq!(data.pixels[3][5], [35, 33, 42]);
    }

    #[test]
    fn test_resize_preserves_aspect_ratio() {
        let dir = TempDir::new().unwrap();
        let path = fixture_image(&dir, "wide.png", 64, 32);

        let loader = ImageLoader::new().unwrap();
        let data = loader.load(path.to_str().unwrap(), 16).unwrap();

        assert_eq!(data.width, 16);
        assert_eq!(data.height, 8);
    }

    #[test]
    fn test_resize_tall_image() {
        let dir = TempDir::new().unwrap();
        let path = fixture_image(&dir, "tall.png", 10, 40);

        let loader = ImageLoader::new().unwrap();
        let data = loader.load(path.to_str().unwrap(), 20).unwrap();

        assert_eq!(data.height, 20);
        assert_eq!(data.width, 5);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let loader = ImageLoader::new().unwrap();
        let result = loader.load("/nonexistent/nowhere.png", 0);
        assert!(result.is_err());
    }

    #[test]
    fn test_non_image_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("not-an-image.png");
        std::fs::write(&path, b"plain text").unwrap();

        let loader = ImageLoader::new().unwrap();
        let result = loader.load(path.to_str().unwrap(), 0);
        assert!(matches!(result, Err(FetchError::Decode(_))));
    }

    #[test]
    fn test_resize_to_fit_zero_is_identity() {
        let img = DynamicImage::new_rgb8(6, 3);
        let out = resize_to_fit(img, 0);
        assert_eq!((out.width(), out.height()), (6, 3));
    }

    #[test]
    fn test_image_data_serializes_to_wire_format() {
        let data = ImageData {
            width: 2,
            height: 1,
            pixels: vec![vec![[1, 2, 3], [4, 5, 6]]],
        };
        let json = serde_json::to_string(&data).unwrap();
        assert_eq!(json, r#"{"width":2,"height":1,"pixels":[[[1,2,3],[4,5,6]]]}"#);
    }
}
