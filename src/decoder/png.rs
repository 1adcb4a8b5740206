//! Embedded PNG decoding for user-supplied background templates.
//!
//! Pages whose `PAGESTYLE` begins with `user_` store their background as a
//! plain PNG instead of a device bitmap. The template must cover the page
//! canvas exactly.

use super::{Bitmap, Decode, PixelFormat};
use crate::{Error, Result};
use image::ImageReader;
use std::io::Cursor;

/// Decoder for user-supplied PNG background templates.
#[derive(Clone, Copy, Debug)]
pub struct PngDecoder {
    width: u32,
    height: u32,
}

impl PngDecoder {
    /// Creates a decoder expecting a `width` by `height` template.
    pub fn new(width: u32, height: u32) -> PngDecoder {
        PngDecoder { width, height }
    }
}

impl Decode for PngDecoder {
    fn decode(&self, data: &[u8]) -> Result<Bitmap> {
        let image = ImageReader::new(Cursor::new(data))
            .with_guessed_format()?
            .decode()?;
        if image.width() != self.width || image.height() != self.height {
            return Err(Error::BackgroundSize {
                width: image.width(),
                height: image.height(),
                expected_width: self.width,
                expected_height: self.height,
            });
        }
        Ok(Bitmap {
            width: self.width,
            height: self.height,
            format: PixelFormat::Rgba8,
            pixels: image.into_rgba8().into_raw(),
        })
    }
}
