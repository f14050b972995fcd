//! Indexed-color palettes for GIF frames

use image::imageops::{self, ColorMap};
use image::{Rgba, RgbaImage};

/// Alpha below this is treated as fully transparent when re-indexing
const ALPHA_CUTOFF: u8 = 128;

/// A GIF color table plus its optional transparent index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<[u8; 3]>,
    transparent: Option<u8>,
}

impl Palette {
    /// Builds a palette from packed RGB triplets as stored in a GIF color table
    pub fn from_rgb(raw: &[u8], transparent: Option<u8>) -> Self {
        let colors = raw
            .chunks_exact(3)
            .map(|rgb| [rgb[0], rgb[1], rgb[2]])
            .collect();
        Self { colors, transparent }
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// RGBA value of a palette index; out-of-range indices are transparent black
    pub fn rgba(&self, index: u8) -> Rgba<u8> {
        match self.colors.get(usize::from(index)) {
            Some(&[r, g, b]) if Some(index) == self.transparent => Rgba([r, g, b, 0]),
            Some(&[r, g, b]) => Rgba([r, g, b, 255]),
            None => Rgba([0, 0, 0, 0]),
        }
    }

    /// Expands a buffer of palette indices into an RGBA image
    pub fn expand(&self, indices: &[u8], width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            let offset = (y as usize) * (width as usize) + x as usize;
            indices
                .get(offset)
                .map_or(Rgba([0, 0, 0, 0]), |&index| self.rgba(index))
        })
    }

    /// Re-indexes `image` against this palette with Floyd-Steinberg error diffusion.
    ///
    /// `image` is left holding the dithered colors; the returned buffer holds
    /// one palette index per pixel in row-major order.
    /// Images narrower than two pixels are mapped pixel by pixel instead.
    pub fn quantize(&self, image: &mut RgbaImage) -> Vec<u8> {
        if image.width() < 2 || image.height() == 0 {
            // dither always diffuses into the right-hand neighbour
            image.pixels_mut().for_each(|pixel| self.map_color(pixel));
        } else {
            imageops::dither(image, self);
        }
        imageops::index_colors(image, self).into_raw()
    }

    fn nearest(&self, color: &Rgba<u8>) -> usize {
        let mut best = (0usize, u32::MAX);
        for (index, rgb) in self.colors.iter().enumerate() {
            if self.transparent.map(usize::from) == Some(index) {
                continue;
            }
            let distance: u32 = rgb
                .iter()
                .zip(color.0.iter())
                .map(|(&a, &b)| {
                    let delta = i32::from(a) - i32::from(b);
                    (delta * delta) as u32
                })
                .sum();
            if distance < best.1 {
                best = (index, distance);
                if distance == 0 {
                    break;
                }
            }
        }
        best.0
    }

    fn transparent_for(&self, color: &Rgba<u8>) -> Option<u8> {
        self.transparent.filter(|_| color[3] < ALPHA_CUTOFF)
    }
}

impl ColorMap for Palette {
    type Color = Rgba<u8>;

    fn index_of(&self, color: &Rgba<u8>) -> usize {
        match self.transparent_for(color) {
            Some(index) => usize::from(index),
            None => self.nearest(color),
        }
    }

    fn lookup(&self, index: usize) -> Option<Rgba<u8>> {
        u8::try_from(index).ok().map(|index| self.rgba(index))
    }

    fn has_lookup(&self) -> bool {
        true
    }

    fn map_color(&self, color: &mut Rgba<u8>) {
        if self.transparent_for(color).is_some() {
            // Keep the RGB so no error diffuses out of transparent pixels
            color[3] = 0;
            return;
        }
        if let Some(&[r, g, b]) = self.colors.get(self.nearest(color)) {
            *color = Rgba([r, g, b, 255]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_tone() -> Palette {
        Palette::from_rgb(&[0, 0, 0, 255, 255, 255, 9, 9, 9], Some(2))
    }

    #[test]
    fn test_from_rgb_and_lookup() {
        let palette = two_tone();
        assert!(!palette.is_empty());
        assert_eq!(palette.rgba(1), Rgba([255, 255, 255, 255]));
        assert_eq!(palette.rgba(2), Rgba([9, 9, 9, 0]));
        assert_eq!(palette.rgba(200), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_nearest_skips_transparent_entry() {
        let palette = two_tone();
        assert_eq!(palette.index_of(&Rgba([10, 10, 10, 255])), 0);
        assert_eq!(palette.index_of(&Rgba([240, 230, 250, 255])), 1);
    }

    #[test]
    fn test_transparent_pixels_map_to_transparent_index() {
        let palette = two_tone();
        assert_eq!(palette.index_of(&Rgba([255, 255, 255, 0])), 2);
    }

    #[test]
    fn test_quantize_solid_colors_exactly() {
        let palette = two_tone();
        let mut image = RgbaImage::from_fn(4, 1, |x, _| match x {
            0 => Rgba([0, 0, 0, 255]),
            1 => Rgba([255, 255, 255, 255]),
            _ => Rgba([0, 0, 0, 0]),
        });
        let indices = palette.quantize(&mut image);
        assert_eq!(indices, vec![0, 1, 2, 2]);
    }

    #[test]
    fn test_quantize_single_pixel_and_single_column() {
        let palette = two_tone();

        let mut pixel = RgbaImage::from_pixel(1, 1, Rgba([250, 250, 250, 255]));
        assert_eq!(palette.quantize(&mut pixel), vec![1]);
        assert_eq!(pixel.get_pixel(0, 0), &Rgba([255, 255, 255, 255]));

        let mut column = RgbaImage::from_fn(1, 3, |_, y| match y {
            0 => Rgba([5, 5, 5, 255]),
            1 => Rgba([0, 0, 0, 0]),
            _ => Rgba([240, 240, 240, 255]),
        });
        assert_eq!(palette.quantize(&mut column), vec![0, 2, 1]);
    }

    #[test]
    fn test_quantize_single_row() {
        let palette = two_tone();
        let mut row = RgbaImage::from_fn(3, 1, |x, _| {
            if x == 1 { Rgba([255, 255, 255, 255]) } else { Rgba([0, 0, 0, 255]) }
        });
        assert_eq!(palette.quantize(&mut row), vec![0, 1, 0]);
    }

    #[test]
    fn test_expand_round_trips_indices() {
        let palette = two_tone();
        let image = palette.expand(&[0, 1, 2, 1], 2, 2);
        assert_eq!(image.get_pixel(1, 0), &Rgba([255, 255, 255, 255]));
        assert_eq!(image.get_pixel(0, 1)[3], 0);
    }
}
