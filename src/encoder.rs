use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage};

use crate::error::{CompressError, Result};

/// Decoded pixels ready to be re-encoded.
pub type Surface = DynamicImage;

/// One encoded attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeResult {
    pub quality: f64,
    pub blob: Vec<u8>,
}

impl EncodeResult {
    pub fn new(quality: f64, blob: Vec<u8>) -> Self {
        Self { quality, blob }
    }

    pub fn byte_len(&self) -> u64 {
        self.blob.len() as u64
    }
}

/// Encodes a surface at a quality in `[0, 1]`.
///
/// Implementations are expected to be pure: the same surface and quality
/// give the same bytes. Encoded size is assumed to grow with quality; the
/// binary search warns when an encoder breaks that assumption.
pub trait Encoder {
    fn encode(&self, surface: &Surface, quality: f64) -> Result<EncodeResult>;
}

impl<E: Encoder + ?Sized> Encoder for &E {
    fn encode(&self, surface: &Surface, quality: f64) -> Result<EncodeResult> {
        (**self).encode(surface, quality)
    }
}

/// Baseline JPEG through the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegSurfaceEncoder;

/// Maps `[0, 1]` onto libjpeg style 1..=100.
pub fn jpeg_quality(quality: f64) -> u8 {
    (quality.clamp(0.0, 1.0) * 100.0).round().clamp(1.0, 100.0) as u8
}

impl Encoder for JpegSurfaceEncoder {
    fn encode(&self, surface: &Surface, quality: f64) -> Result<EncodeResult> {
        let mut buffer = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buffer, jpeg_quality(quality));

        // JPEG has no alpha channel, flatten anything that is not gray or RGB
        let flattened;
        let (pixels, color) = match surface {
            DynamicImage::ImageLuma8(gray) => (gray.as_raw(), ColorType::L8),
            DynamicImage::ImageRgb8(rgb) => (rgb.as_raw(), ColorType::Rgb8),
            other => {
                flattened = other.to_rgb8();
                (flattened.as_raw(), ColorType::Rgb8)
            }
        };
        encoder
            .encode(pixels, surface.width(), surface.height(), color.into())
            .map_err(|source| CompressError::Encode { quality, source })?;

        if buffer.is_empty() {
            return Err(CompressError::EmptyEncode(quality));
        }
        Ok(EncodeResult::new(quality, buffer))
    }
}
