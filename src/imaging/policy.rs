//! Per-format resize and encode recipes

use image::Rgba;

use super::SourceFormat;

const JPEG_QUALITY: u8 = 80;
const DEFAULT_JPEG_QUALITY: u8 = 95;
const JPEG_SHARPEN: f32 = 0.7;
const FALLBACK_SHARPEN: f32 = 3.5;

/// Background fill behind the fitted image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matte {
    OpaqueWhite,
    Transparent,
}

impl Matte {
    pub fn color(&self) -> Rgba<u8> {
        match self {
            Matte::OpaqueWhite => Rgba([255, 255, 255, 255]),
            Matte::Transparent => Rgba([0, 0, 0, 0]),
        }
    }
}

/// Output codec for a derivative
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Jpeg { quality: u8 },
    /// Best compression
    Png,
    /// Frame-by-frame resampled GIF
    Gif,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Recipe {
    pub matte: Matte,
    /// Unsharp-mask sigma; `0.0` disables sharpening
    pub sharpen: f32,
    pub encoding: Encoding,
    /// Forced response content type; `None` reuses the source's
    pub content_type: Option<&'static str>,
}

impl Recipe {
    /// Content type for the derivative, given what the store recorded for the source
    pub fn resolve_content_type(
        &self,
        source_content_type: Option<&str>,
        format: SourceFormat,
    ) -> String {
        match (self.content_type, source_content_type) {
            (Some(forced), _) => forced.to_string(),
            (None, Some(source)) => source.to_string(),
            (None, None) => format.mime_type().to_string(),
        }
    }
}

/// Selects the recipe for a detected source format
pub fn recipe_for(format: SourceFormat) -> Recipe {
    match format {
        SourceFormat::Jpeg => Recipe {
            matte: Matte::OpaqueWhite,
            sharpen: JPEG_SHARPEN,
            encoding: Encoding::Jpeg {
                quality: JPEG_QUALITY,
            },
            content_type: None,
        },
        SourceFormat::Png => Recipe {
            matte: Matte::Transparent,
            sharpen: 0.0,
            encoding: Encoding::Png,
            content_type: None,
        },
        SourceFormat::Gif => Recipe {
            matte: Matte::Transparent,
            sharpen: 0.0,
            encoding: Encoding::Gif,
            content_type: None,
        },
        SourceFormat::Bmp => Recipe {
            matte: Matte::OpaqueWhite,
            sharpen: 0.0,
            encoding: Encoding::Jpeg {
                quality: DEFAULT_JPEG_QUALITY,
            },
            content_type: None,
        },
        SourceFormat::Other(_) => Recipe {
            matte: Matte::OpaqueWhite,
            sharpen: FALLBACK_SHARPEN,
            encoding: Encoding::Jpeg {
                quality: DEFAULT_JPEG_QUALITY,
            },
            content_type: Some("image/jpeg"),
        },
    }
}
