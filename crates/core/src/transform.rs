//! Image decoding, resizing and re-encoding

use crate::format::ImageFormat;
use crate::{Error, Result};
use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, Frame};
use serde::{Deserialize, Serialize};

/// JPEG quality used when re-encoding
pub const DEFAULT_JPEG_QUALITY: u8 = 75;

/// Largest output width or height produced unless configured otherwise
pub const DEFAULT_MAX_DIMENSION: u32 = 8192;

/// Requested output dimensions
///
/// A zero dimension means "derive from the aspect ratio of the source".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResizeParams {
    /// Target width in pixels
    pub width: u32,
    /// Target height in pixels
    pub height: u32,
}

impl ResizeParams {
    /// Create resize parameters
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Output of a transform
#[derive(Debug, Clone)]
pub struct Transformed {
    /// Encoded image bytes
    pub bytes: Vec<u8>,
    /// Format the bytes are encoded in
    pub format: ImageFormat,
}

/// Turns source image bytes into resized image bytes.
///
/// Implementations run on a blocking thread and must be CPU-bound only.
pub trait Transformer: Send + Sync {
    /// Resize `source` to `params`, keeping the source format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFormat`] for formats without an encoder,
    /// [`Error::InvalidRequest`] if the output would exceed the size limit and
    /// [`Error::Transform`] if decoding or encoding fails.
    fn transform(&self, source: &[u8], params: ResizeParams) -> Result<Transformed>;
}

/// [`Transformer`] backed by the `image` crate
#[derive(Debug, Clone)]
pub struct ImageTransformer {
    filter: FilterType,
    jpeg_quality: u8,
    max_dimension: u32,
}

impl Default for ImageTransformer {
    fn default() -> Self {
        Self {
            filter: FilterType::Lanczos3,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }
}

impl ImageTransformer {
    /// Create a transformer with Lanczos resampling and default JPEG quality
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the JPEG quality (clamped to 1..=100)
    #[must_use]
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// Cap the output width and height, including dimensions derived from
    /// the aspect ratio
    #[must_use]
    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension.max(1);
        self
    }

    fn encode(&self, image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        match format {
            ImageFormat::Jpeg => {
                // JPEG has no alpha channel
                let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
                let encoder = JpegEncoder::new_with_quality(&mut buffer, self.jpeg_quality);
                rgb.write_with_encoder(encoder)
                    .map_err(|e| Error::transform(format!("jpeg encode: {e}")))?;
            }
            ImageFormat::Png => {
                let encoder = PngEncoder::new(&mut buffer);
                image
                    .write_with_encoder(encoder)
                    .map_err(|e| Error::transform(format!("png encode: {e}")))?;
            }
            ImageFormat::Gif => {
                GifEncoder::new(&mut buffer)
                    .encode_frame(Frame::new(image.to_rgba8()))
                    .map_err(|e| Error::transform(format!("gif encode: {e}")))?;
            }
        }
        Ok(buffer)
    }
}

impl Transformer for ImageTransformer {
    fn transform(&self, source: &[u8], params: ResizeParams) -> Result<Transformed> {
        let detected = image::guess_format(source)
            .map_err(|e| Error::transform(format!("unrecognised image data: {e}")))?;
        let format = ImageFormat::from_image_format(detected)
            .ok_or_else(|| Error::unsupported_format(format!("{detected:?}").to_lowercase()))?;

        let decoded = image::load_from_memory_with_format(source, format.to_image_format())
            .map_err(|e| Error::transform(format!("decode {format}: {e}")))?;

        let (width, height) = target_dimensions(
            decoded.width(),
            decoded.height(),
            params,
            self.max_dimension,
        )?;
        let resized = decoded.resize_exact(width, height, self.filter);

        let bytes = self.encode(&resized, format)?;
        tracing::debug!(
            format = %format,
            source_width = decoded.width(),
            source_height = decoded.height(),
            width,
            height,
            bytes = bytes.len(),
            "Transformed image"
        );
        Ok(Transformed { bytes, format })
    }
}

/// Resolve the output size, deriving a zero dimension from the aspect ratio.
///
/// # Errors
///
/// Returns [`Error::Transform`] if both requested dimensions are zero or the
/// source image is empty, and [`Error::InvalidRequest`] if either output
/// dimension exceeds `max_dimension`.
pub fn target_dimensions(
    source_width: u32,
    source_height: u32,
    params: ResizeParams,
    max_dimension: u32,
) -> Result<(u32, u32)> {
    if source_width == 0 || source_height == 0 {
        return Err(Error::transform("source image has no pixels"));
    }
    let (width, height) = match (params.width, params.height) {
        (0, 0) => {
            return Err(Error::transform(
                "at least one of width and height must be non-zero",
            ));
        }
        (0, h) => (scale(source_width, h, source_height), h),
        (w, 0) => (w, scale(source_height, w, source_width)),
        (w, h) => (w, h),
    };
    if width > max_dimension || height > max_dimension {
        return Err(Error::invalid_request(format!(
            "output of {width}x{height} for a {source_width}x{source_height} source \
             exceeds the maximum dimension of {max_dimension}"
        )));
    }
    Ok((width, height))
}

/// `value * numerator / denominator`, rounded and at least 1
fn scale(value: u32, numerator: u32, denominator: u32) -> u32 {
    let scaled = (u64::from(value) * u64::from(numerator) + u64::from(denominator) / 2)
        / u64::from(denominator);
    u32::try_from(scaled).unwrap_or(u32::MAX).max(1)
}
