//! Multi-frame GIF resampling.
//!
//! Frames are decoded with their original palettes and sub-rectangles, then
//! pushed through three chained stages connected by bounded channels:
//!
//! 1. resize: scales each frame's pixels into its target rectangle
//! 2. finalize: composites onto a blank canvas and re-indexes with the frame's own palette
//! 3. sink: the caller (usually the GIF encoder) consumes frames in index order
//!
//! Every stage has a single consumer, so frame order is preserved end to end.
//! A failing frame stops the producer and fails the whole sequence.

use std::borrow::Cow;
use std::io::{Cursor, Write};
use std::sync::mpsc;
use std::thread;

use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbaImage};
use tracing::{debug, error};

use super::ImagingError;
use super::geometry::{Rect, fit_dimensions};
use super::palette::Palette;

/// Filter for frame 0, which only establishes geometry
const FIRST_FRAME_FILTER: FilterType = FilterType::Triangle;
/// Filter for later frames, typically small deltas
const DELTA_FRAME_FILTER: FilterType = FilterType::Lanczos3;

/// One indexed GIF frame positioned inside the logical canvas
#[derive(Debug, Clone, PartialEq)]
pub struct AnimatedFrame {
    pub indices: Vec<u8>,
    /// Local color table as packed RGB triplets; `None` uses the global palette
    pub palette: Option<Vec<u8>>,
    pub transparent: Option<u8>,
    pub rect: Rect,
    pub delay: u16,
    pub dispose: gif::DisposalMethod,
}

impl AnimatedFrame {
    fn to_gif_frame(&self) -> gif::Frame<'_> {
        let mut frame = gif::Frame::default();
        frame.left = dim16(self.rect.x);
        frame.top = dim16(self.rect.y);
        frame.width = dim16(self.rect.width);
        frame.height = dim16(self.rect.height);
        frame.buffer = Cow::Borrowed(&self.indices);
        frame.palette = self.palette.clone();
        frame.transparent = self.transparent;
        frame.delay = self.delay;
        frame.dispose = self.dispose;
        frame
    }
}

/// Ordered frames sharing one logical canvas
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSequence {
    pub width: u32,
    pub height: u32,
    pub global_palette: Option<Vec<u8>>,
    pub repeat: gif::Repeat,
    pub frames: Vec<AnimatedFrame>,
}

impl FrameSequence {
    /// Decodes every frame of a GIF without compositing or palette expansion
    pub fn decode(bytes: &[u8]) -> Result<Self, ImagingError> {
        let mut options = gif::DecodeOptions::new();
        options.set_color_output(gif::ColorOutput::Indexed);
        let mut decoder = options.read_info(Cursor::new(bytes)).map_err(decode_error)?;

        let width = u32::from(decoder.width());
        let height = u32::from(decoder.height());
        let global_palette = decoder.global_palette().map(<[u8]>::to_vec);

        let mut frames = Vec::new();
        while let Some(frame) = decoder.read_next_frame().map_err(decode_error)? {
            frames.push(AnimatedFrame {
                indices: frame.buffer.to_vec(),
                palette: frame.palette.clone(),
                transparent: frame.transparent,
                rect: Rect::new(
                    u32::from(frame.left),
                    u32::from(frame.top),
                    u32::from(frame.width),
                    u32::from(frame.height),
                ),
                delay: frame.delay,
                dispose: frame.dispose,
            });
        }

        if frames.is_empty() {
            return Err(ImagingError::Decode("gif contains no frames".to_string()));
        }

        Ok(Self {
            width,
            height,
            global_palette,
            repeat: decoder.repeat(),
            frames,
        })
    }

    fn encoder<W: Write>(
        &self,
        writer: W,
        width: u32,
        height: u32,
    ) -> Result<gif::Encoder<W>, ImagingError> {
        let global = self.global_palette.as_deref().unwrap_or(&[]);
        let mut encoder =
            gif::Encoder::new(writer, dim16(width), dim16(height), global).map_err(encode_error)?;
        encoder.set_repeat(self.repeat).map_err(encode_error)?;
        Ok(encoder)
    }

    fn palette_for(&self, frame: &AnimatedFrame) -> Palette {
        let raw = frame
            .palette
            .as_deref()
            .or(self.global_palette.as_deref())
            .unwrap_or(&[]);
        Palette::from_rgb(raw, frame.transparent)
    }
}

/// Output of the resize stage, waiting to be composited and re-indexed
struct ResizedFrame {
    index: usize,
    pixels: RgbaImage,
    /// Blank canvas the pixels are composited onto
    canvas: (u32, u32),
    /// Where the pixels land on that canvas
    offset: (i64, i64),
    rect: Rect,
}

/// Frame-sequence rescaler for one target box
#[derive(Debug, Clone, Copy)]
pub struct Resampler {
    /// Full source canvas before resizing
    before: Rect,
    /// Area frame 0 occupies after resizing, centered in the target
    after: Rect,
    target_width: u32,
    target_height: u32,
}

impl Resampler {
    pub fn new(sequence: &FrameSequence, target_width: u32, target_height: u32) -> Self {
        let (width, height) =
            fit_dimensions(sequence.width, sequence.height, target_width, target_height);
        Self {
            before: Rect::new(0, 0, sequence.width, sequence.height),
            after: Rect::centered(target_width, target_height, width, height),
            target_width,
            target_height,
        }
    }

    /// Target rectangle of a later frame's sub-rectangle
    pub fn target_rect(&self, source: Rect) -> Rect {
        source.rescale(self.before, self.after)
    }

    fn resize(
        &self,
        sequence: &FrameSequence,
        index: usize,
        frame: &AnimatedFrame,
    ) -> Result<ResizedFrame, ImagingError> {
        let palette = sequence.palette_for(frame);
        let pixels = palette.expand(&frame.indices, frame.rect.width, frame.rect.height);

        if index == 0 {
            if self.before.width == 0 || self.before.height == 0 {
                return Err(ImagingError::Frame {
                    index,
                    reason: "gif canvas is empty".to_string(),
                });
            }
            // Frame 0 may itself be partial: place it on the full source canvas first
            let mut full = RgbaImage::new(self.before.width, self.before.height);
            imageops::overlay(
                &mut full,
                &pixels,
                i64::from(frame.rect.x),
                i64::from(frame.rect.y),
            );
            let resized = imageops::resize(
                &full,
                self.after.width.max(1),
                self.after.height.max(1),
                FIRST_FRAME_FILTER,
            );
            return Ok(ResizedFrame {
                index,
                pixels: resized,
                canvas: (self.target_width, self.target_height),
                offset: (i64::from(self.after.x), i64::from(self.after.y)),
                rect: Rect::new(0, 0, self.target_width, self.target_height),
            });
        }

        let rect = self.target_rect(frame.rect);
        if pixels.width() == 0 || pixels.height() == 0 {
            return Err(ImagingError::Frame {
                index,
                reason: "frame has an empty sub-rectangle".to_string(),
            });
        }
        let resized = DynamicImage::ImageRgba8(pixels)
            .resize_exact(rect.width, rect.height, DELTA_FRAME_FILTER)
            .into_rgba8();

        Ok(ResizedFrame {
            index,
            pixels: resized,
            canvas: (rect.width, rect.height),
            offset: (0, 0),
            rect,
        })
    }

    fn finalize(
        &self,
        sequence: &FrameSequence,
        resized: ResizedFrame,
    ) -> Result<AnimatedFrame, ImagingError> {
        let source = sequence
            .frames
            .get(resized.index)
            .ok_or_else(|| ImagingError::Frame {
                index: resized.index,
                reason: "frame index out of range".to_string(),
            })?;

        let (width, height) = resized.canvas;
        let mut canvas = RgbaImage::new(width, height);
        imageops::overlay(&mut canvas, &resized.pixels, resized.offset.0, resized.offset.1);

        let palette = sequence.palette_for(source);
        if palette.is_empty() {
            return Err(ImagingError::Frame {
                index: resized.index,
                reason: "frame has no color table".to_string(),
            });
        }
        let indices = palette.quantize(&mut canvas);

        Ok(AnimatedFrame {
            indices,
            palette: source.palette.clone(),
            transparent: source.transparent,
            rect: resized.rect,
            delay: source.delay,
            dispose: source.dispose,
        })
    }
}

/// Runs the resize and finalize stages on scoped threads and hands each
/// finished frame to `sink` in original order.
///
/// `depth` bounds both inter-stage channels; a full channel suspends the
/// producing stage until the next one catches up.
pub fn resample_with<F>(
    sequence: &FrameSequence,
    target_width: u32,
    target_height: u32,
    depth: usize,
    mut sink: F,
) -> Result<(), ImagingError>
where
    F: FnMut(AnimatedFrame) -> Result<(), ImagingError>,
{
    let resampler = Resampler::new(sequence, target_width, target_height);
    let resampler = &resampler;

    thread::scope(|scope| {
        let (resized_tx, resized_rx) = mpsc::sync_channel::<Result<ResizedFrame, ImagingError>>(depth);
        let (frame_tx, frame_rx) = mpsc::sync_channel::<Result<AnimatedFrame, ImagingError>>(depth);

        scope.spawn(move || {
            for (index, frame) in sequence.frames.iter().enumerate() {
                let resized = resampler.resize(sequence, index, frame);
                if let Err(e) = &resized {
                    error!(index, error = %e, "Frame resize failed");
                }
                let failed = resized.is_err();
                if resized_tx.send(resized).is_err() || failed {
                    break;
                }
            }
        });

        scope.spawn(move || {
            for resized in resized_rx {
                let frame = resized.and_then(|resized| resampler.finalize(sequence, resized));
                if let Err(e) = &frame {
                    error!(error = %e, "Frame finalize failed");
                }
                let failed = frame.is_err();
                if frame_tx.send(frame).is_err() || failed {
                    break;
                }
            }
        });

        let mut produced = 0usize;
        for frame in frame_rx {
            sink(frame?)?;
            produced += 1;
        }

        debug!(frames = produced, "Animated resampling complete");
        if produced != sequence.frames.len() {
            return Err(ImagingError::Frame {
                index: produced,
                reason: "resampling pipeline stopped early".to_string(),
            });
        }
        Ok(())
    })
}

/// Resamples and encodes frame by frame, without holding the output sequence
pub fn encode_resampled<W: Write>(
    sequence: &FrameSequence,
    target_width: u32,
    target_height: u32,
    depth: usize,
    writer: W,
) -> Result<(), ImagingError> {
    let mut encoder = sequence.encoder(writer, target_width, target_height)?;
    resample_with(sequence, target_width, target_height, depth, |frame| {
        encoder
            .write_frame(&frame.to_gif_frame())
            .map_err(encode_error)
    })?;
    encoder.into_inner()?;
    Ok(())
}

fn dim16(value: u32) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}

fn decode_error(e: gif::DecodingError) -> ImagingError {
    ImagingError::Decode(e.to_string())
}

fn encode_error(e: gif::EncodingError) -> ImagingError {
    ImagingError::Encode(e.to_string())
}
