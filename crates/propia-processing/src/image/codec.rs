//! Codec encoding and output-format selection.

use crate::error::PipelineError;
use crate::types::ImageCodec;
use bytes::Bytes;
use image::DynamicImage;

/// WebP quality for transparency-preserving encode (alpha or flat-graphic origin).
pub const WEBP_ALPHA_QUALITY: f32 = 80.0;
/// WebP quality for the opaque-photographic candidate encode.
pub const WEBP_OPAQUE_QUALITY: f32 = 78.0;
/// AVIF quality for the opaque-photographic candidate encode.
pub const AVIF_QUALITY: f32 = 50.0;
/// AVIF encoder speed (1 = slowest/best, 10 = fastest).
pub const AVIF_SPEED: u8 = 6;

/// AVIF must be at least 2% smaller than WebP to win; its narrower decoder
/// support is not worth a negligible size advantage.
const AVIF_WIN_PERCENT: u64 = 98;

/// Encode to WebP at the given quality.
pub fn encode_webp(img: &DynamicImage, quality: f32) -> Result<Bytes, PipelineError> {
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let encoder = webp::Encoder::from_rgba(&rgba, width, height);
    let encoded = encoder.encode(quality);
    Ok(Bytes::copy_from_slice(&encoded))
}

/// Encode to AVIF. Alpha is dropped; callers route transparent content to WebP.
pub fn encode_avif(img: &DynamicImage) -> Result<Bytes, PipelineError> {
    let rgb_img = img.to_rgb8();
    let (width, height) = rgb_img.dimensions();
    let raw_pixels = rgb_img.as_raw();

    let rgb_data: Vec<rgb::RGB8> = raw_pixels
        .chunks_exact(3)
        .map(|chunk| rgb::RGB8::new(chunk[0], chunk[1], chunk[2]))
        .collect();

    let img_buf = ravif::Img::new(rgb_data.as_slice(), width as usize, height as usize);

    let encoder = ravif::Encoder::new()
        .with_quality(AVIF_QUALITY)
        .with_speed(AVIF_SPEED);

    let avif_data = encoder
        .encode_rgb(img_buf)
        .map_err(|e| PipelineError::Internal(format!("AVIF encode failed: {}", e)))?;

    Ok(Bytes::copy_from_slice(&avif_data.avif_file))
}

/// Pick between the two candidate encodes for opaque photographic content.
///
/// AVIF wins only when `avif_len <= 0.98 * webp_len`; integer arithmetic so
/// the boundary is exact.
pub fn select_codec(avif_len: usize, webp_len: usize) -> ImageCodec {
    if (avif_len as u64) * 100 <= (webp_len as u64) * AVIF_WIN_PERCENT {
        ImageCodec::Avif
    } else {
        ImageCodec::WebP
    }
}

/// Whether the decoded image carries an alpha channel.
///
/// Routing is by channel presence, not pixel content: the AVIF branch drops
/// alpha, so any image that could hold transparency must stay on the
/// transparency-preserving codec even when its pixels happen to be opaque.
pub fn has_alpha(img: &DynamicImage) -> bool {
    img.color().has_alpha()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_select_codec_tie_break() {
        // Exactly 98% of WebP size: AVIF wins
        assert_eq!(select_codec(980, 1000), ImageCodec::Avif);
        // 98.5%: not enough of a win, WebP keeps its wider support
        assert_eq!(select_codec(985, 1000), ImageCodec::WebP);
        // Clearly smaller
        assert_eq!(select_codec(500, 1000), ImageCodec::Avif);
        // AVIF larger
        assert_eq!(select_codec(1100, 1000), ImageCodec::WebP);
    }

    #[test]
    fn test_has_alpha_transparent() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            64,
            64,
            Rgba([255, 0, 0, 128]), // semi-transparent
        ));
        assert!(has_alpha(&img));
    }

    #[test]
    fn test_has_alpha_single_transparent_pixel() {
        // One transparent pixel anywhere must keep the alpha routing
        let mut buf = RgbaImage::from_pixel(64, 64, Rgba([255, 0, 0, 255]));
        buf.put_pixel(5, 5, Rgba([255, 0, 0, 0]));
        assert!(has_alpha(&DynamicImage::ImageRgba8(buf)));
    }

    #[test]
    fn test_has_alpha_follows_channel_presence() {
        // Fully opaque pixels in an alpha-carrying format still route to the
        // codec that can hold transparency
        let img =
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(64, 64, Rgba([255, 0, 0, 255])));
        assert!(has_alpha(&img));

        let rgb = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            64,
            64,
            image::Rgb([10, 20, 30]),
        ));
        assert!(!has_alpha(&rgb));
    }

    #[test]
    fn test_encode_webp_produces_webp() {
        let img =
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(32, 32, Rgba([0, 128, 255, 255])));
        let bytes = encode_webp(&img, WEBP_ALPHA_QUALITY).unwrap();
        assert!(!bytes.is_empty());
        // RIFF....WEBP container header
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WEBP");
    }

    #[test]
    fn test_encode_avif_produces_avif() {
        let img =
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(32, 32, Rgba([0, 128, 255, 255])));
        let bytes = encode_avif(&img).unwrap();
        assert!(!bytes.is_empty());
        // ISO-BMFF ftyp box with avif brand
        assert_eq!(&bytes[4..8], b"ftyp");
    }
}
