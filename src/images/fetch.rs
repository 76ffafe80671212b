/// Image fetching and decoding
///
/// This module handles:
/// - The `Fetcher` seam between the pipeline and the network
/// - HTTP GET with per-request timeouts (ureq)
/// - Content-type checks and format sniffing
/// - Decoding, alpha flattening and downscaling

use super::{ImageOrigin, ResolvedImage};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use log::debug;
use std::io::Read;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = "cspace-report/0.3.0";

/// Responses larger than this are rejected.
pub const MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

/// Why a single attempt in the fallback chain failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError {
    #[error("HTTP status {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected content type {0:?}")]
    ContentType(String),

    #[error("response larger than {0} bytes")]
    TooLarge(usize),

    #[error("could not decode image: {0}")]
    Decode(String),

    #[error("timed out")]
    TimedOut,

    #[error("cancelled")]
    Cancelled,

    #[error("unsupported image reference")]
    Unsupported,
}

impl From<ureq::Error> for AttemptError {
    fn from(e: ureq::Error) -> Self {
        match e {
            ureq::Error::Status(code, _) => AttemptError::Status(code),
            ureq::Error::Transport(t) => {
                let message = t.to_string();
                if message.contains("timed out") {
                    AttemptError::TimedOut
                } else {
                    AttemptError::Transport(message)
                }
            }
        }
    }
}

/// One GET request issued by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
    /// Sent as `Authorization: Bearer <token>` when present
    pub bearer: Option<String>,
    /// Upper bound for the whole request
    pub timeout: Duration,
}

/// Raw response body with its declared content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedBody {
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Performs the network side of an attempt.
///
/// Implementations must return within `request.timeout`.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, request: &FetchRequest) -> Result<FetchedBody, AttemptError>;
}

/// [`Fetcher`] over HTTP(S).
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self { agent: ureq::AgentBuilder::new().user_agent(USER_AGENT).build() }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, request: &FetchRequest) -> Result<FetchedBody, AttemptError> {
        let mut req = self.agent.get(&request.url).timeout(request.timeout);
        for (key, value) in &request.query {
            req = req.query(key, value);
        }
        if let Some(ref token) = request.bearer {
            req = req.set("Authorization", &format!("Bearer {}", token));
        }

        let resp = req.call()?;
        let content_type = resp.header("Content-Type").map(|s| s.to_string());
        let len = resp.header("Content-Length").and_then(|s| s.parse::<usize>().ok()).unwrap_or(0);
        if len > MAX_IMAGE_BYTES {
            return Err(AttemptError::TooLarge(MAX_IMAGE_BYTES));
        }

        let mut bytes: Vec<u8> = Vec::with_capacity(len);
        resp.into_reader()
            .take(MAX_IMAGE_BYTES as u64 + 1)
            .read_to_end(&mut bytes)
            .map_err(|e| AttemptError::Transport(e.to_string()))?;
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(AttemptError::TooLarge(MAX_IMAGE_BYTES));
        }

        debug!("fetched {} bytes from {}", bytes.len(), request.url);
        Ok(FetchedBody { content_type, bytes })
    }
}

/// Media type without parameters, lowercased.
fn media_type(content_type: &str) -> String {
    content_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase()
}

/// Decode a fetched body into embeddable RGB pixels.
///
/// With `strict` the declared content type must be `image/*` and selects
/// the decoder. Otherwise the content type is ignored and the format is
/// sniffed from the bytes.
pub fn decode(body: &FetchedBody, strict: bool, max_dimension: u32) -> Result<ResolvedImage, AttemptError> {
    if body.bytes.is_empty() {
        return Err(AttemptError::Decode("empty body".to_string()));
    }

    let img = if strict {
        let declared = body.content_type.as_deref().map(media_type).unwrap_or_default();
        if !declared.starts_with("image/") {
            return Err(AttemptError::ContentType(declared));
        }
        match ImageFormat::from_mime_type(&declared) {
            Some(format) => image::load_from_memory_with_format(&body.bytes, format),
            None => image::load_from_memory(&body.bytes),
        }
    } else {
        image::load_from_memory(&body.bytes)
    }
    .map_err(|e| AttemptError::Decode(e.to_string()))?;

    Ok(to_resolved(img, max_dimension))
}

/// Downscale to fit `max_dimension` and flatten any alpha onto white.
fn to_resolved(img: DynamicImage, max_dimension: u32) -> ResolvedImage {
    let img = if img.width() > max_dimension || img.height() > max_dimension {
        img.resize(max_dimension, max_dimension, FilterType::Triangle)
    } else {
        img
    };

    let (width, height) = (img.width(), img.height());
    let rgb = if img.color().has_alpha() {
        let rgba = img.to_rgba8();
        let mut out = Vec::with_capacity((width * height * 3) as usize);
        for px in rgba.pixels() {
            let alpha = px[3] as u32;
            for channel in &px.0[..3] {
                out.push(((*channel as u32 * alpha + 255 * (255 - alpha)) / 255) as u8);
            }
        }
        out
    } else {
        img.to_rgb8().into_raw()
    };

    ResolvedImage { width, height, rgb, origin: ImageOrigin::Direct, caption: None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([10, 20, 30]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn body(content_type: Option<&str>, bytes: Vec<u8>) -> FetchedBody {
        FetchedBody { content_type: content_type.map(|s| s.to_string()), bytes }
    }

    #[test]
    fn test_strict_requires_image_content_type() {
        let result = decode(&body(Some("text/html; charset=utf-8"), png(4, 4)), true, 1600);
        assert_eq!(result, Err(AttemptError::ContentType("text/html".to_string())));
    }

    #[test]
    fn test_strict_accepts_declared_image() {
        let image = decode(&body(Some("image/png"), png(4, 3)), true, 1600).unwrap();
        assert_eq!((image.width, image.height), (4, 3));
        assert_eq!(image.rgb.len(), 4 * 3 * 3);
        assert_eq!(&image.rgb[..3], &[10, 20, 30]);
    }

    #[test]
    fn test_passive_sniffs_format() {
        let image = decode(&body(Some("application/octet-stream"), png(2, 2)), false, 1600).unwrap();
        assert_eq!(image.width, 2);
    }

    #[test]
    fn test_garbage_fails_to_decode() {
        let result = decode(&body(Some("image/jpeg"), b"<html>".to_vec()), false, 1600);
        assert!(matches!(result, Err(AttemptError::Decode(_))));
        let result = decode(&body(None, Vec::new()), false, 1600);
        assert!(matches!(result, Err(AttemptError::Decode(_))));
    }

    #[test]
    fn test_large_images_are_downscaled() {
        let image = decode(&body(None, png(400, 200)), false, 100).unwrap();
        assert_eq!((image.width, image.height), (100, 50));
    }

    #[test]
    fn test_alpha_is_flattened_onto_white() {
        let img = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 0]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        let image = decode(&body(Some("image/png"), out.into_inner()), true, 1600).unwrap();
        assert_eq!(image.rgb, vec![255, 255, 255]);
    }

    #[test]
    fn test_media_type_strips_parameters() {
        assert_eq!(media_type("Image/PNG; q=1"), "image/png");
    }
}
