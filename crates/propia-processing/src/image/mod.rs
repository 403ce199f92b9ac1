//! Image normalization module
//!
//! - Codec encoding and selection (codec)
//! - EXIF orientation correction (orientation)
//! - The normalizer itself (normalizer)

pub mod codec;
pub mod normalizer;
pub mod orientation;

pub use normalizer::{Normalizer, NormalizerConfig};
