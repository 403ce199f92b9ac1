//! Image normalization: orientation, size cap, codec selection.

use super::codec;
use super::orientation::Orientation;
use crate::error::PipelineError;
use crate::types::{ImageCodec, MediaType, ProcessedImage, UploadItem};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageReader};
use std::io::Cursor;

#[derive(Debug, Clone)]
pub struct NormalizerConfig {
    /// Maximum length of the longer edge; larger images are downscaled.
    pub max_dimension: u32,
    /// Inputs at or under this size that also fit the dimension cap pass
    /// through without re-encoding.
    pub small_file_bytes: usize,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            max_dimension: 1920,
            small_file_bytes: 200 * 1024,
        }
    }
}

/// Outcome of the cheap pre-decode checks.
enum Preflight {
    /// Original bytes are stored as-is.
    Passthrough(ProcessedImage),
    /// A full decode and re-encode is required.
    Process(MediaType),
}

/// Turns one uploaded file into its canonical stored form.
///
/// Pure CPU work; callers run it on a blocking thread.
#[derive(Clone)]
pub struct Normalizer {
    config: NormalizerConfig,
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn normalize(&self, item: &UploadItem) -> Result<ProcessedImage, PipelineError> {
        let media_type = match self.preflight(item)? {
            Preflight::Passthrough(done) => return Ok(done),
            Preflight::Process(media_type) => media_type,
        };

        let (img, keep_alpha) = self.prepare(&item.data, media_type)?;

        let processed = if keep_alpha {
            ProcessedImage {
                data: codec::encode_webp(&img, codec::WEBP_ALPHA_QUALITY)?,
                codec: ImageCodec::WebP,
            }
        } else {
            let avif = codec::encode_avif(&img)?;
            let webp = codec::encode_webp(&img, codec::WEBP_OPAQUE_QUALITY)?;
            pick_smaller(avif, webp)
        };

        tracing::debug!(
            filename = %item.original_filename,
            input_bytes = item.data.len(),
            output_bytes = processed.data.len(),
            codec = ?processed.codec,
            "Normalized image"
        );

        Ok(processed)
    }

    /// Media-type gate, size/dimension skip checks, and the passthrough paths
    /// that need no decode. Shared by the sync and async entry points.
    fn preflight(&self, item: &UploadItem) -> Result<Preflight, PipelineError> {
        let media_type = MediaType::from_mime(&item.media_type)
            .ok_or_else(|| PipelineError::UnsupportedMediaType(item.media_type.clone()))?;

        // Vector input has no raster dimensions to cap; store as received,
        // bounded by the small-file threshold since nothing downstream can
        // shrink it.
        if media_type == MediaType::Svg {
            if item.data.len() > self.config.small_file_bytes {
                return Err(PipelineError::UnsupportedMediaType(format!(
                    "image/svg+xml larger than {} bytes",
                    self.config.small_file_bytes
                )));
            }
            return Ok(Preflight::Passthrough(ProcessedImage {
                data: item.data.clone(),
                codec: ImageCodec::Svg,
            }));
        }

        let (width, height) = match self.read_dimensions(&item.data) {
            Ok(dims) => dims,
            // No AVIF decoder is linked; small AVIF uploads are accepted
            // as-is rather than rejected.
            Err(_)
                if media_type == MediaType::Avif
                    && item.data.len() <= self.config.small_file_bytes =>
            {
                return Ok(Preflight::Passthrough(ProcessedImage {
                    data: item.data.clone(),
                    codec: ImageCodec::Avif,
                }));
            }
            Err(e) => return Err(e),
        };

        let needs_resize = width.max(height) > self.config.max_dimension;

        if !needs_resize && item.data.len() <= self.config.small_file_bytes {
            tracing::debug!(
                filename = %item.original_filename,
                width = width,
                height = height,
                size_bytes = item.data.len(),
                "Input already within limits, passing through"
            );
            return Ok(Preflight::Passthrough(ProcessedImage {
                data: item.data.clone(),
                codec: media_type.passthrough_codec(),
            }));
        }

        Ok(Preflight::Process(media_type))
    }

    /// Decode, fix the codec routing, orient, and downscale.
    ///
    /// Returns the prepared pixels and whether the transparency-preserving
    /// codec must be used. The routing is decided on the freshly decoded
    /// image: orientation transforms re-buffer into RGBA, which would make
    /// every rotated photo look alpha-carrying afterwards.
    fn prepare(
        &self,
        data: &[u8],
        media_type: MediaType,
    ) -> Result<(DynamicImage, bool), PipelineError> {
        let img = self.decode(data)?;
        let keep_alpha = media_type.is_flat_graphic() || codec::has_alpha(&img);

        let img = Orientation::apply(img, data);
        let img = if img.width().max(img.height()) > self.config.max_dimension {
            self.resize(img)
        } else {
            img
        };

        Ok((img, keep_alpha))
    }

    /// Header-only dimension read; avoids a full decode for the skip check.
    fn read_dimensions(&self, data: &[u8]) -> Result<(u32, u32), PipelineError> {
        ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| PipelineError::Decode(e.to_string()))?
            .into_dimensions()
            .map_err(|e| PipelineError::Decode(e.to_string()))
    }

    fn decode(&self, data: &[u8]) -> Result<DynamicImage, PipelineError> {
        ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| PipelineError::Decode(e.to_string()))?
            .decode()
            .map_err(|e| PipelineError::Decode(e.to_string()))
    }

    /// Downscale so the longer edge equals the cap, preserving aspect ratio.
    fn resize(&self, img: DynamicImage) -> DynamicImage {
        let (width, height) = img.dimensions();
        let ratio = width.max(height) as f32 / self.config.max_dimension as f32;

        // Heavier downscales tolerate cheaper filters
        let filter = if ratio > 2.0 {
            FilterType::Triangle
        } else if ratio > 1.5 {
            FilterType::CatmullRom
        } else {
            FilterType::Lanczos3
        };

        img.resize(self.config.max_dimension, self.config.max_dimension, filter)
    }
}

fn pick_smaller(avif: bytes::Bytes, webp: bytes::Bytes) -> ProcessedImage {
    match codec::select_codec(avif.len(), webp.len()) {
        ImageCodec::Avif => ProcessedImage {
            data: avif,
            codec: ImageCodec::Avif,
        },
        _ => ProcessedImage {
            data: webp,
            codec: ImageCodec::WebP,
        },
    }
}

/// Both opaque-path candidate encodes, run in parallel on blocking threads.
pub async fn encode_opaque_parallel(img: DynamicImage) -> Result<ProcessedImage, PipelineError> {
    let img_avif = img.clone();
    let avif_task = tokio::task::spawn_blocking(move || codec::encode_avif(&img_avif));
    let webp_task =
        tokio::task::spawn_blocking(move || codec::encode_webp(&img, codec::WEBP_OPAQUE_QUALITY));

    let (avif_res, webp_res) = tokio::join!(avif_task, webp_task);
    let avif = avif_res.map_err(|e| PipelineError::Internal(format!("encode task: {}", e)))??;
    let webp = webp_res.map_err(|e| PipelineError::Internal(format!("encode task: {}", e)))??;

    Ok(pick_smaller(avif, webp))
}

/// Normalize with the CPU-bound stages on blocking threads and the
/// opaque-path encodes running in parallel. Same contract as
/// [`Normalizer::normalize`].
pub async fn normalize_async(
    normalizer: &Normalizer,
    item: &UploadItem,
) -> Result<ProcessedImage, PipelineError> {
    let media_type = match normalizer.preflight(item)? {
        Preflight::Passthrough(done) => return Ok(done),
        Preflight::Process(media_type) => media_type,
    };

    let worker = normalizer.clone();
    let data = item.data.clone();
    let (img, keep_alpha) =
        tokio::task::spawn_blocking(move || worker.prepare(&data, media_type))
            .await
            .map_err(|e| PipelineError::Internal(format!("decode task: {}", e)))??;

    if keep_alpha {
        let encoded = tokio::task::spawn_blocking(move || {
            codec::encode_webp(&img, codec::WEBP_ALPHA_QUALITY)
        })
        .await
        .map_err(|e| PipelineError::Internal(format!("encode task: {}", e)))??;
        return Ok(ProcessedImage {
            data: encoded,
            codec: ImageCodec::WebP,
        });
    }

    encode_opaque_parallel(img).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use image::{ImageFormat, Rgba, RgbaImage};

    fn png_bytes(width: u32, height: u32, pixel: Rgba<u8>) -> Bytes {
        let img = RgbaImage::from_pixel(width, height, pixel);
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        Bytes::from(buffer)
    }

    fn item(data: Bytes, media_type: &str, name: &str) -> UploadItem {
        UploadItem {
            data,
            media_type: media_type.to_string(),
            original_filename: name.to_string(),
        }
    }

    #[test]
    fn test_small_input_passes_through() {
        // 1920x1080 solid color PNG compresses far below the size threshold
        let data = png_bytes(1920, 1080, Rgba([40, 40, 40, 255]));
        assert!(data.len() <= 200 * 1024);

        let normalizer = Normalizer::new(NormalizerConfig::default());
        let out = normalizer
            .normalize(&item(data.clone(), "image/png", "living-room.png"))
            .unwrap();

        assert_eq!(out.codec, ImageCodec::Png);
        assert_eq!(out.data, data); // byte-identical, no re-encode
    }

    #[test]
    fn test_oversized_input_is_resized() {
        let data = png_bytes(4000, 3000, Rgba([200, 10, 10, 128]));

        let normalizer = Normalizer::new(NormalizerConfig::default());
        let out = normalizer
            .normalize(&item(data, "image/png", "facade.png"))
            .unwrap();

        assert_eq!(out.codec, ImageCodec::WebP);
        let decoded = image::load_from_memory(&out.data).unwrap();
        assert_eq!(decoded.dimensions(), (1920, 1440));
    }

    #[test]
    fn test_resize_preserves_aspect_ratio_portrait() {
        let data = png_bytes(1080, 3840, Rgba([10, 200, 10, 100]));

        let normalizer = Normalizer::new(NormalizerConfig::default());
        let out = normalizer
            .normalize(&item(data, "image/png", "tower.png"))
            .unwrap();

        let decoded = image::load_from_memory(&out.data).unwrap();
        assert_eq!(decoded.dimensions(), (540, 1920));
    }

    #[test]
    fn test_large_file_within_dimensions_is_reencoded() {
        // Fits the dimension cap but exceeds the byte threshold: re-encode
        let normalizer = Normalizer::new(NormalizerConfig {
            max_dimension: 1920,
            small_file_bytes: 16,
        });
        let data = png_bytes(64, 64, Rgba([5, 5, 250, 255]));
        let out = normalizer
            .normalize(&item(data.clone(), "image/png", "stamp.png"))
            .unwrap();

        // PNG origin keeps the transparency-preserving codec
        assert_eq!(out.codec, ImageCodec::WebP);
        assert_ne!(out.data, data);
    }

    #[test]
    fn test_sparse_transparency_keeps_alpha_codec() {
        // A mostly opaque image with one transparent pixel must never reach
        // the alpha-dropping candidate encode, however sparse the
        // transparency is
        let mut buf = RgbaImage::from_pixel(2400, 2400, Rgba([180, 160, 40, 255]));
        buf.put_pixel(5, 5, Rgba([0, 0, 0, 0]));
        let mut buffer = Vec::new();
        buf.write_to(&mut Cursor::new(&mut buffer), ImageFormat::WebP)
            .unwrap();

        let normalizer = Normalizer::new(NormalizerConfig::default());
        let out = normalizer
            .normalize(&item(Bytes::from(buffer), "image/webp", "watermark.webp"))
            .unwrap();

        assert_eq!(out.codec, ImageCodec::WebP);
        let decoded = image::load_from_memory(&out.data).unwrap();
        assert!(decoded.color().has_alpha());
    }

    #[test]
    fn test_svg_passes_through() {
        let svg = Bytes::from_static(b"<svg xmlns=\"http://www.w3.org/2000/svg\"/>");
        let normalizer = Normalizer::new(NormalizerConfig::default());
        let out = normalizer
            .normalize(&item(svg.clone(), "image/svg+xml", "logo.svg"))
            .unwrap();
        assert_eq!(out.codec, ImageCodec::Svg);
        assert_eq!(out.data, svg);
    }

    #[test]
    fn test_oversized_svg_rejected() {
        // Vector input cannot be downscaled, so the byte threshold is a hard cap
        let normalizer = Normalizer::new(NormalizerConfig {
            max_dimension: 1920,
            small_file_bytes: 64,
        });
        let svg = format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\"><!--{}--></svg>",
            "x".repeat(128)
        );
        let err = normalizer
            .normalize(&item(Bytes::from(svg), "image/svg+xml", "plano.svg"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedMediaType(_)));
    }

    #[test]
    fn test_unsupported_media_type() {
        let normalizer = Normalizer::new(NormalizerConfig::default());
        let err = normalizer
            .normalize(&item(Bytes::from_static(b"%PDF-1.4"), "application/pdf", "doc.pdf"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedMediaType(_)));
    }

    #[test]
    fn test_corrupt_image_fails_decode() {
        let normalizer = Normalizer::new(NormalizerConfig::default());
        let err = normalizer
            .normalize(&item(
                Bytes::from_static(b"definitely not pixels"),
                "image/jpeg",
                "broken.jpg",
            ))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Decode(_)));
    }
}
