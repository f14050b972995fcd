//! Aspect-fit geometry shared by the still and animated pipelines

use image::{Rgba, RgbaImage, imageops};

/// Axis-aligned rectangle in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// A `width` x `height` rectangle centered inside an `outer_width` x `outer_height` box
    pub fn centered(outer_width: u32, outer_height: u32, width: u32, height: u32) -> Self {
        Self {
            x: outer_width.saturating_sub(width) / 2,
            y: outer_height.saturating_sub(height) / 2,
            width,
            height,
        }
    }

    /// Maps this rectangle from the `before` coordinate space into `after`.
    ///
    /// Each axis is scaled linearly by `after / before`; the result is at
    /// least one pixel wide and tall and never leaves `after`.
    pub fn rescale(&self, before: Rect, after: Rect) -> Rect {
        let (x, width) = rescale_axis(
            self.x.saturating_sub(before.x),
            self.width,
            before.width,
            after.x,
            after.width,
        );
        let (y, height) = rescale_axis(
            self.y.saturating_sub(before.y),
            self.height,
            before.height,
            after.y,
            after.height,
        );
        Rect { x, y, width, height }
    }
}

fn rescale_axis(offset: u32, length: u32, before: u32, origin: u32, after: u32) -> (u32, u32) {
    if before == 0 || after == 0 {
        return (origin, 1);
    }
    let ratio = f64::from(after) / f64::from(before);
    let start = ((f64::from(offset) * ratio).round() as u32).min(after - 1);
    let span = ((f64::from(length) * ratio).round() as u32).clamp(1, after - start);
    (origin + start, span)
}

/// Scales `src` proportionally so it fits entirely inside `max`.
///
/// The scale factor is `min(max_w / src_w, max_h / src_h)`, so sources smaller
/// than the box are enlarged. A zero source dimension yields `(0, 0)`.
pub fn fit_dimensions(src_width: u32, src_height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if src_width == 0 || src_height == 0 {
        return (0, 0);
    }

    let scale = (f64::from(max_width) / f64::from(src_width))
        .min(f64::from(max_height) / f64::from(src_height));

    let width = (f64::from(src_width) * scale).round() as u32;
    let height = (f64::from(src_height) * scale).round() as u32;

    (width.clamp(1, max_width.max(1)), height.clamp(1, max_height.max(1)))
}

/// Upscale step for sources strictly smaller than the target on both axes.
///
/// Returns the box to enlarge into: the target size on the dominant axis and
/// `0` ("derive from aspect ratio") on the other. `None` when no upscale is needed.
pub fn upscale_dimensions(
    src_width: u32,
    src_height: u32,
    target_width: u32,
    target_height: u32,
) -> Option<(u32, u32)> {
    if src_width >= target_width || src_height >= target_height {
        return None;
    }

    if src_width >= src_height {
        Some((target_width, 0))
    } else {
        Some((0, target_height))
    }
}

/// Resolves a resize box in which `0` on one axis means "keep the aspect ratio"
pub fn derive_dimensions(src_width: u32, src_height: u32, width: u32, height: u32) -> (u32, u32) {
    if src_width == 0 || src_height == 0 {
        return (width, height);
    }

    match (width, height) {
        (0, 0) => (src_width, src_height),
        (width, 0) => {
            let derived = f64::from(src_height) * f64::from(width) / f64::from(src_width);
            (width, (derived.round() as u32).max(1))
        }
        (0, height) => {
            let derived = f64::from(src_width) * f64::from(height) / f64::from(src_height);
            ((derived.round() as u32).max(1), height)
        }
        box_size => box_size,
    }
}

/// Produces a `canvas_width` x `canvas_height` canvas filled with `matte` and
/// alpha-composites `fitted` (source-over) at its center.
pub fn center_composite(
    canvas_width: u32,
    canvas_height: u32,
    matte: Rgba<u8>,
    fitted: &RgbaImage,
) -> RgbaImage {
    let mut canvas = RgbaImage::from_pixel(canvas_width, canvas_height, matte);
    let x = (i64::from(canvas_width) - i64::from(fitted.width())) / 2;
    let y = (i64::from(canvas_height) - i64::from(fitted.height())) / 2;
    imageops::overlay(&mut canvas, fitted, x, y);
    canvas
}
