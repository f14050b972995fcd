//! Image decoding, resizing and encoding
//!
//! Still images go through [`render_still`]; GIFs are decoded into a
//! [`animated::FrameSequence`] and resampled frame by frame.

pub mod animated;
pub mod encode;
pub mod geometry;
pub mod palette;
pub mod policy;

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageError, ImageFormat, RgbaImage};
use thiserror::Error;

use animated::FrameSequence;
use geometry::{center_composite, derive_dimensions, fit_dimensions, upscale_dimensions};
use policy::Recipe;

const RESIZE_FILTER: FilterType = FilterType::Lanczos3;

#[derive(Debug, Error)]
pub enum ImagingError {
    #[error("Unsupported image format")]
    Unsupported,

    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("Encode failed: {0}")]
    Encode(String),

    #[error("Frame {index} failed: {reason}")]
    Frame { index: usize, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ImageError> for ImagingError {
    fn from(e: ImageError) -> Self {
        match e {
            ImageError::Unsupported(_) => ImagingError::Unsupported,
            ImageError::IoError(e) => ImagingError::Io(e),
            ImageError::Encoding(e) => ImagingError::Encode(e.to_string()),
            ImageError::Parameter(e) => ImagingError::Encode(e.to_string()),
            other => ImagingError::Decode(other.to_string()),
        }
    }
}

/// Any failure while reading pixels is a decode failure, whatever its kind
fn decode_error(e: ImageError) -> ImagingError {
    match ImagingError::from(e) {
        e @ (ImagingError::Unsupported | ImagingError::Decode(_)) => e,
        other => ImagingError::Decode(other.to_string()),
    }
}

/// Format tag detected from the source bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Jpeg,
    Png,
    Gif,
    Bmp,
    /// Decodable, but without a dedicated recipe
    Other(ImageFormat),
}

impl SourceFormat {
    /// Sniffs the container format from magic bytes
    pub fn detect(bytes: &[u8]) -> Result<Self, ImagingError> {
        let format = image::guess_format(bytes).map_err(|_| ImagingError::Unsupported)?;
        Ok(match format {
            ImageFormat::Jpeg => SourceFormat::Jpeg,
            ImageFormat::Png => SourceFormat::Png,
            ImageFormat::Gif => SourceFormat::Gif,
            ImageFormat::Bmp => SourceFormat::Bmp,
            other => SourceFormat::Other(other),
        })
    }

    pub fn image_format(&self) -> ImageFormat {
        match self {
            SourceFormat::Jpeg => ImageFormat::Jpeg,
            SourceFormat::Png => ImageFormat::Png,
            SourceFormat::Gif => ImageFormat::Gif,
            SourceFormat::Bmp => ImageFormat::Bmp,
            SourceFormat::Other(format) => *format,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        self.image_format().to_mime_type()
    }
}

#[derive(Debug)]
pub enum SourcePixels {
    Still(DynamicImage),
    Animated(FrameSequence),
}

/// Decoded source image, owned by a single request
#[derive(Debug)]
pub struct SourceImage {
    pub format: SourceFormat,
    pub pixels: SourcePixels,
}

impl SourceImage {
    /// Detects the format and decodes the whole image.
    ///
    /// Returns [`ImagingError::Unsupported`] when no decoder recognises the bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, ImagingError> {
        let format = SourceFormat::detect(bytes)?;
        let pixels = match format {
            SourceFormat::Gif => SourcePixels::Animated(FrameSequence::decode(bytes)?),
            other => SourcePixels::Still(
                image::load_from_memory_with_format(bytes, other.image_format())
                    .map_err(decode_error)?,
            ),
        };
        Ok(Self { format, pixels })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match &self.pixels {
            SourcePixels::Still(image) => (image.width(), image.height()),
            SourcePixels::Animated(sequence) => (sequence.width, sequence.height),
        }
    }
}

/// Resizes a still image into exactly `target_width` x `target_height`.
///
/// Sources smaller than the target on both axes are first enlarged along
/// their dominant axis, then fitted into the box, optionally sharpened, and
/// centered on the recipe's matte.
pub fn render_still(
    image: &DynamicImage,
    recipe: &Recipe,
    target_width: u32,
    target_height: u32,
) -> Result<RgbaImage, ImagingError> {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(ImagingError::Decode("image has no pixels".to_string()));
    }

    let upscaled;
    let working = match upscale_dimensions(width, height, target_width, target_height) {
        Some((box_width, box_height)) => {
            let (up_width, up_height) = derive_dimensions(width, height, box_width, box_height);
            upscaled = image.resize_exact(up_width, up_height, RESIZE_FILTER);
            &upscaled
        }
        None => image,
    };

    let (fit_width, fit_height) = fit_dimensions(
        working.width(),
        working.height(),
        target_width,
        target_height,
    );
    let mut fitted = working
        .resize_exact(fit_width, fit_height, RESIZE_FILTER)
        .into_rgba8();

    if recipe.sharpen > 0.0 {
        fitted = imageops::unsharpen(&fitted, recipe.sharpen, 0);
    }

    Ok(center_composite(
        target_width,
        target_height,
        recipe.matte.color(),
        &fitted,
    ))
}
