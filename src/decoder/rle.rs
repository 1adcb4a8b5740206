//! Run-length decoding for the `RATTA_RLE` protocol.
//!
//! The stream is a sequence of `(color_code, length_code)` byte pairs. A
//! length byte with bit 7 set does not stand on its own: the pair is held
//! and combined with the next pair, which extends the run when the color
//! repeats. The marker `0xff` encodes a fixed long run. Decoding is
//! modeled as an explicit state machine — a held pair plus a FIFO of
//! resolved runs — because the combination rules at buffer boundaries are
//! the subtle part of this format.

use super::{Bitmap, Decode, PixelFormat};
use crate::color::{ColorMode, ColorPalette};
use crate::{Error, Result};
use log::warn;
use std::collections::VecDeque;

const COLORCODE_BLACK: u8 = 0x61;
const COLORCODE_BACKGROUND: u8 = 0x62;
const COLORCODE_DARK_GRAY: u8 = 0x63;
const COLORCODE_GRAY: u8 = 0x64;
const COLORCODE_WHITE: u8 = 0x65;
const COLORCODE_MARKER_BLACK: u8 = 0x66;
const COLORCODE_MARKER_DARK_GRAY: u8 = 0x67;
const COLORCODE_MARKER_GRAY: u8 = 0x68;

// Refined tones of the high-resolution (X2) variant. 0x63/0x64 turn into
// compatibility grays there, and unmapped codes pass through as literal
// intensities.
const COLORCODE_DARK_GRAY_HI: u8 = 0x9d;
const COLORCODE_MARKER_DARK_GRAY_HI: u8 = 0x9e;
const COLORCODE_GRAY_HI: u8 = 0xc9;
const COLORCODE_MARKER_GRAY_HI: u8 = 0xca;

const SPECIAL_LENGTH_MARKER: u8 = 0xff;
const SPECIAL_LENGTH: usize = 0x4000;
const SPECIAL_LENGTH_FOR_BLANK: usize = 0x400;

/// Decoder for the `RATTA_RLE` protocol.
///
/// # Examples
///
/// ```
/// use supernote::ColorPalette;
/// use supernote::decoder::{Decode, RattaRleDecoder};
///
/// // 128 black pixels followed by one background pixel.
/// let decoder = RattaRleDecoder::new(ColorPalette::default(), 129, 1);
/// let bitmap = decoder.decode(&[0x61, 0x80, 0x62, 0x00]).unwrap();
/// assert_eq!(0x00, bitmap.pixels[0]);
/// assert_eq!(0xff, bitmap.pixels[128]);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct RattaRleDecoder {
    palette: ColorPalette,
    width: u32,
    height: u32,
    highres: bool,
    all_blank: bool,
}

impl RattaRleDecoder {
    /// Creates a decoder producing a `width` by `height` plane.
    pub fn new(palette: ColorPalette, width: u32, height: u32) -> RattaRleDecoder {
        RattaRleDecoder {
            palette,
            width,
            height,
            highres: false,
            all_blank: false,
        }
    }

    /// Selects the high-resolution grayscale color map of the X2 family.
    pub fn highres(mut self, highres: bool) -> RattaRleDecoder {
        self.highres = highres;
        self
    }

    /// Marks the stream as an all-blank background.
    ///
    /// On such streams the `0xff` length marker encodes `0x400` pixels
    /// instead of `0x4000`.
    pub fn all_blank(mut self, all_blank: bool) -> RattaRleDecoder {
        self.all_blank = all_blank;
        self
    }

    fn color(&self, code: u8) -> Result<u32> {
        let palette = &self.palette;
        let mapped = match code {
            COLORCODE_BLACK | COLORCODE_MARKER_BLACK => Some(palette.black()),
            COLORCODE_BACKGROUND => Some(palette.transparent()),
            COLORCODE_WHITE => Some(palette.white()),
            COLORCODE_DARK_GRAY if self.highres => Some(palette.dark_gray_compat()),
            COLORCODE_DARK_GRAY => Some(palette.dark_gray()),
            COLORCODE_GRAY if self.highres => Some(palette.gray_compat()),
            COLORCODE_GRAY => Some(palette.gray()),
            COLORCODE_MARKER_DARK_GRAY if !self.highres => Some(palette.dark_gray()),
            COLORCODE_MARKER_GRAY if !self.highres => Some(palette.gray()),
            COLORCODE_DARK_GRAY_HI | COLORCODE_MARKER_DARK_GRAY_HI if self.highres => {
                Some(palette.dark_gray())
            }
            COLORCODE_GRAY_HI | COLORCODE_MARKER_GRAY_HI if self.highres => Some(palette.gray()),
            _ => None,
        };
        match mapped {
            Some(color) => Ok(color),
            // The high-resolution variant treats unmapped codes as literal
            // intensities.
            None if self.highres => Ok(match palette.mode() {
                ColorMode::Grayscale => u32::from(code),
                ColorMode::Rgb => u32::from_le_bytes([code, code, code, 0]),
            }),
            None => Err(Error::InvalidColorCode(code)),
        }
    }

    fn emit(&self, pixels: &mut Vec<u8>, code: u8, run: usize) -> Result<()> {
        let color = self.color(code)?;
        match self.palette.mode() {
            ColorMode::Grayscale => {
                pixels.resize(pixels.len() + run, (color & 0xff) as u8);
            }
            ColorMode::Rgb => {
                let rgb = self.palette.rgb_bytes(color);
                for _ in 0..run {
                    pixels.extend_from_slice(&rgb);
                }
            }
        }
        Ok(())
    }
}

impl Decode for RattaRleDecoder {
    fn decode(&self, data: &[u8]) -> Result<Bitmap> {
        let expected = self.width as usize * self.height as usize;
        let format = match self.palette.mode() {
            ColorMode::Grayscale => PixelFormat::Gray8,
            ColorMode::Rgb => PixelFormat::Rgb8,
        };
        let mut pixels = Vec::with_capacity(expected * format.bytes_per_pixel());
        let mut emitted = 0;
        let mut runs = Runs::new(self.all_blank);
        for pair in data.chunks_exact(2) {
            runs.push_pair(pair[0], pair[1]);
            while let Some((code, run)) = runs.pop() {
                self.emit(&mut pixels, code, run)?;
                emitted += run;
            }
        }
        runs.finish(expected.saturating_sub(emitted));
        while let Some((code, run)) = runs.pop() {
            self.emit(&mut pixels, code, run)?;
            emitted += run;
        }
        if emitted != expected {
            return Err(Error::InvalidBitmapLength {
                expected,
                actual: emitted,
            });
        }
        Ok(Bitmap {
            width: self.width,
            height: self.height,
            format,
            pixels,
        })
    }
}

/// The decoding state machine: either idle or holding one unresolved pair,
/// with a FIFO of resolved `(color_code, run_length)` runs.
struct Runs {
    held: Option<(u8, u8)>,
    queue: VecDeque<(u8, usize)>,
    all_blank: bool,
}

impl Runs {
    fn new(all_blank: bool) -> Runs {
        Runs {
            held: None,
            queue: VecDeque::new(),
            all_blank,
        }
    }

    fn push_pair(&mut self, code: u8, length: u8) {
        if let Some((held_code, held_length)) = self.held.take() {
            if code == held_code {
                let run = 1 + usize::from(length) + ((usize::from(held_length & 0x7f) + 1) << 7);
                self.queue.push_back((code, run));
                return;
            }
            // Different color: the held pair resolves on its own and the
            // fresh pair is processed from scratch.
            self.queue
                .push_back((held_code, (usize::from(held_length & 0x7f) + 1) << 7));
        }
        if length == SPECIAL_LENGTH_MARKER {
            let run = if self.all_blank {
                SPECIAL_LENGTH_FOR_BLANK
            } else {
                SPECIAL_LENGTH
            };
            self.queue.push_back((code, run));
        } else if length & 0x80 != 0 {
            self.held = Some((code, length));
        } else {
            self.queue.push_back((code, usize::from(length) + 1));
        }
    }

    /// Resolves a pair still held at end of stream.
    ///
    /// The run shrinks by powers of two until it fits the remaining
    /// shortfall; if even a shift of zero overshoots, the pair is dropped.
    fn finish(&mut self, gap: usize) {
        let Some((code, length)) = self.held.take() else {
            return;
        };
        let base = usize::from(length & 0x7f) + 1;
        for shift in (0..8).rev() {
            let run = base << shift;
            if run <= gap {
                warn!("adjusted trailing rle pair to {run} pixels");
                self.queue.push_back((code, run));
                return;
            }
        }
        warn!("dropped trailing rle pair: no run fits the remaining {gap} pixels");
    }

    fn pop(&mut self) -> Option<(u8, usize)> {
        self.queue.pop_front()
    }
}
