//! Final encode step for derivatives

use std::io::Write;

use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::{DynamicImage, ExtendedColorType, ImageEncoder, RgbaImage};

use super::animated::encode_resampled;
use super::policy::{Encoding, Recipe};
use super::{ImagingError, SourceImage, SourcePixels, render_still};

/// Encodes a rendered still frame
pub fn encode_still<W: Write>(
    image: RgbaImage,
    encoding: Encoding,
    writer: W,
) -> Result<(), ImagingError> {
    let (width, height) = image.dimensions();
    match encoding {
        Encoding::Jpeg { quality } => {
            // The matte is opaque for every JPEG recipe, so dropping alpha is lossless
            let rgb = DynamicImage::ImageRgba8(image).into_rgb8();
            JpegEncoder::new_with_quality(writer, quality).write_image(
                rgb.as_raw(),
                width,
                height,
                ExtendedColorType::Rgb8,
            )?;
        }
        Encoding::Png => {
            PngEncoder::new_with_quality(writer, CompressionType::Best, PngFilter::Adaptive)
                .write_image(image.as_raw(), width, height, ExtendedColorType::Rgba8)?;
        }
        Encoding::Gif => {
            GifEncoder::new(writer).encode(image.as_raw(), width, height, ExtendedColorType::Rgba8)?;
        }
    }
    Ok(())
}

/// Renders and encodes a derivative of `source` into `writer`.
///
/// `frame_queue_depth` bounds the channels between animated resampling stages.
pub fn encode_derivative<W: Write>(
    source: &SourceImage,
    recipe: &Recipe,
    target_width: u32,
    target_height: u32,
    frame_queue_depth: usize,
    writer: W,
) -> Result<(), ImagingError> {
    match &source.pixels {
        SourcePixels::Still(image) => {
            let rendered = render_still(image, recipe, target_width, target_height)?;
            encode_still(rendered, recipe.encoding, writer)
        }
        SourcePixels::Animated(sequence) => encode_resampled(
            sequence,
            target_width,
            target_height,
            frame_queue_depth,
            writer,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::policy::recipe_for;
    use crate::imaging::{SourceFormat, animated};
    use image::{ImageFormat, Rgba};

    fn decode(bytes: &[u8]) -> DynamicImage {
        image::load_from_memory(bytes).unwrap()
    }

    #[test]
    fn test_encode_still_jpeg() {
        let image = RgbaImage::from_pixel(30, 20, Rgba([10, 200, 30, 255]));
        let mut out = Vec::new();
        encode_still(image, Encoding::Jpeg { quality: 80 }, &mut out).unwrap();

        assert_eq!(image::guess_format(&out).unwrap(), ImageFormat::Jpeg);
        assert_eq!(decode(&out).to_rgba8().dimensions(), (30, 20));
    }

    #[test]
    fn test_encode_still_png_keeps_alpha() {
        let image = RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 0]));
        let mut out = Vec::new();
        encode_still(image, Encoding::Png, &mut out).unwrap();

        let decoded = decode(&out).to_rgba8();
        assert_eq!(decoded.get_pixel(3, 3)[3], 0);
    }

    #[test]
    fn test_encode_derivative_still_exact_dimensions() {
        let source = SourceImage {
            format: SourceFormat::Bmp,
            pixels: SourcePixels::Still(DynamicImage::new_rgb8(64, 48)),
        };
        let recipe = recipe_for(SourceFormat::Bmp);
        let mut out = Vec::new();
        encode_derivative(&source, &recipe, 50, 50, 2, &mut out).unwrap();

        assert_eq!(image::guess_format(&out).unwrap(), ImageFormat::Jpeg);
        assert_eq!(decode(&out).to_rgba8().dimensions(), (50, 50));
    }

    #[test]
    fn test_encode_derivative_animated_keeps_frames() {
        let source = SourceImage::decode(&animated::tests::sample_gif()).unwrap();
        let recipe = recipe_for(source.format);
        let mut out = Vec::new();
        encode_derivative(&source, &recipe, 100, 100, 1, &mut out).unwrap();

        let decoded = animated::FrameSequence::decode(&out).unwrap();
        assert_eq!((decoded.width, decoded.height), (100, 100));
        assert_eq!(decoded.frames.len(), 3);
    }
}
