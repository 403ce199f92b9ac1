use image::{imageops, DynamicImage};
use std::io::Cursor;

/// EXIF orientation handling (rotation and flipping)
pub struct Orientation;

impl Orientation {
    /// Apply EXIF orientation correction so pixels match display orientation.
    ///
    /// The original bytes are consulted for the Orientation tag; anything
    /// without readable EXIF is treated as already upright.
    pub fn apply(mut img: DynamicImage, original: &[u8]) -> DynamicImage {
        let orientation = Self::read_exif_orientation(original);
        if orientation == 1 {
            return img;
        }

        let (rotate, flip_h, flip_v) = Self::transforms_for(orientation);

        tracing::debug!(
            orientation = orientation,
            rotate = ?rotate,
            flip_horizontal = flip_h,
            flip_vertical = flip_v,
            "Applying EXIF orientation"
        );

        // Rotation first, then flips
        if let Some(angle) = rotate {
            img = Self::rotate(img, angle);
        }
        if flip_h {
            img = DynamicImage::ImageRgba8(imageops::flip_horizontal(&img.to_rgba8()));
        }
        if flip_v {
            img = DynamicImage::ImageRgba8(imageops::flip_vertical(&img.to_rgba8()));
        }

        img
    }

    /// Read the EXIF Orientation tag, defaulting to 1 (normal) when absent
    /// or unreadable.
    pub fn read_exif_orientation(data: &[u8]) -> u8 {
        let mut cursor = Cursor::new(data);
        let Ok(exif) = exif::Reader::new().read_from_container(&mut cursor) else {
            return 1;
        };

        exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .map(|v| v as u8)
            .unwrap_or(1)
    }

    /// Transforms for a given EXIF orientation value.
    /// Returns (rotate_angle, flip_horizontal, flip_vertical).
    pub fn transforms_for(orientation: u8) -> (Option<u16>, bool, bool) {
        match orientation {
            1 => (None, false, false),      // Normal
            2 => (None, true, false),       // Mirror horizontal
            3 => (Some(180), false, false), // Rotate 180
            4 => (None, false, true),       // Mirror vertical
            5 => (Some(270), true, false),  // Mirror horizontal + Rotate 270 CW
            6 => (Some(90), false, false),  // Rotate 90 CW
            7 => (Some(90), true, false),   // Mirror horizontal + Rotate 90 CW
            8 => (Some(270), false, false), // Rotate 270 CW
            _ => (None, false, false),      // Invalid, treat as normal
        }
    }

    fn rotate(img: DynamicImage, angle: u16) -> DynamicImage {
        match angle {
            90 => DynamicImage::ImageRgba8(imageops::rotate90(&img.to_rgba8())),
            180 => DynamicImage::ImageRgba8(imageops::rotate180(&img.to_rgba8())),
            270 => DynamicImage::ImageRgba8(imageops::rotate270(&img.to_rgba8())),
            _ => img,
        }
    }
}
