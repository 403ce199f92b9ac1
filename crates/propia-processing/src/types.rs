//! Pipeline data model.

use bytes::Bytes;

/// Media types the pipeline accepts as input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Jpeg,
    Png,
    WebP,
    Avif,
    Svg,
}

impl MediaType {
    /// Parse a declared MIME type, ignoring parameters ("image/jpeg; charset=x").
    pub fn from_mime(mime: &str) -> Option<Self> {
        let normalized = mime
            .split(';')
            .next()
            .map(|s| s.trim())
            .unwrap_or(mime)
            .to_lowercase();
        match normalized.as_str() {
            "image/jpeg" | "image/jpg" => Some(MediaType::Jpeg),
            "image/png" => Some(MediaType::Png),
            "image/webp" => Some(MediaType::WebP),
            "image/avif" => Some(MediaType::Avif),
            "image/svg+xml" | "image/svg" => Some(MediaType::Svg),
            _ => None,
        }
    }

    /// Flat-graphic origins are encoded with the transparency-preserving codec
    /// even when the decoded pixels are opaque.
    pub fn is_flat_graphic(self) -> bool {
        matches!(self, MediaType::Png | MediaType::Svg)
    }

    /// Codec tag for passthrough output (original bytes, original codec).
    pub fn passthrough_codec(self) -> ImageCodec {
        match self {
            MediaType::Jpeg => ImageCodec::Jpeg,
            MediaType::Png => ImageCodec::Png,
            MediaType::WebP => ImageCodec::WebP,
            MediaType::Avif => ImageCodec::Avif,
            MediaType::Svg => ImageCodec::Svg,
        }
    }
}

/// Output codec of a normalized image.
///
/// Re-encoded output is always WebP or AVIF; the other variants occur only
/// when an already-small input passes through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageCodec {
    Jpeg,
    Png,
    WebP,
    Avif,
    Svg,
}

impl ImageCodec {
    pub fn extension(self) -> &'static str {
        match self {
            ImageCodec::Jpeg => "jpg",
            ImageCodec::Png => "png",
            ImageCodec::WebP => "webp",
            ImageCodec::Avif => "avif",
            ImageCodec::Svg => "svg",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageCodec::Jpeg => "image/jpeg",
            ImageCodec::Png => "image/png",
            ImageCodec::WebP => "image/webp",
            ImageCodec::Avif => "image/avif",
            ImageCodec::Svg => "image/svg+xml",
        }
    }
}

/// One raw uploaded file, handed in by the acceptance layer.
/// Transient: created per request, discarded after processing.
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub data: Bytes,
    pub media_type: String,
    pub original_filename: String,
}

/// A normalized image: canonical bytes plus the chosen codec.
/// Derived deterministically from an [`UploadItem`]; immutable once computed.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub data: Bytes,
    pub codec: ImageCodec,
}

/// Reference to a stored object: content-hash key plus its retrieval URL.
/// Never mutated or deleted by this pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObjectRef {
    pub key: String,
    pub url: String,
    /// True when the object already existed and no upload transfer occurred.
    pub deduplicated: bool,
}
