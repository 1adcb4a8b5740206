//! Zlib-compressed bitmap decoding for the `SN_ASA_COMPRESS` protocol.
//!
//! The device stores these bitmaps as 16-bit pixels on an internal grid of
//! 1404 rows by 1888 columns. Rotating the grid 90 degrees clockwise and
//! trimming the bottom 16 rows yields the logical 1404 by 1872 page.

use super::{Bitmap, Decode, PixelFormat};
use crate::color::{ColorMode, ColorPalette};
use crate::{Error, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use flate2::read::ZlibDecoder;
use std::io::Read;

const INTERNAL_PAGE_WIDTH: usize = 1404;
const INTERNAL_PAGE_HEIGHT: usize = 1888;
const TRIMMED_ROWS: usize = 16;

const COLORCODE_BLACK: u16 = 0x0000;
const COLORCODE_BACKGROUND: u16 = 0xffff;
const COLORCODE_DARK_GRAY: u16 = 0x2104;
const COLORCODE_GRAY: u16 = 0xe1e2;

/// Decoder for the `SN_ASA_COMPRESS` protocol.
#[derive(Clone, Copy, Debug)]
pub struct FlateDecoder {
    palette: ColorPalette,
}

impl FlateDecoder {
    /// Creates a decoder applying `palette`.
    pub fn new(palette: ColorPalette) -> FlateDecoder {
        FlateDecoder { palette }
    }

    fn gray16(&self, code: u16) -> u16 {
        let tone = match code {
            COLORCODE_BLACK => self.palette.black(),
            COLORCODE_BACKGROUND => self.palette.transparent(),
            COLORCODE_DARK_GRAY => self.palette.dark_gray(),
            COLORCODE_GRAY => self.palette.gray(),
            // No other codes have been observed; keep them verbatim.
            _ => return code,
        };
        let byte = (tone & 0xff) as u16;
        (byte << 8) | byte
    }

    fn rgba(&self, code: u16) -> u32 {
        let tone = match code {
            COLORCODE_BLACK => self.palette.black(),
            COLORCODE_BACKGROUND => self.palette.transparent(),
            COLORCODE_DARK_GRAY => self.palette.dark_gray(),
            COLORCODE_GRAY => self.palette.gray(),
            _ => {
                let v = u32::from(code >> 8);
                (v << 16) | (v << 8) | v
            }
        };
        (tone << 8) | 0xff
    }
}

impl Decode for FlateDecoder {
    fn decode(&self, data: &[u8]) -> Result<Bitmap> {
        let mut uncompressed = Vec::new();
        ZlibDecoder::new(data).read_to_end(&mut uncompressed)?;
        let expected = INTERNAL_PAGE_WIDTH * INTERNAL_PAGE_HEIGHT;
        if uncompressed.len() != expected * 2 {
            return Err(Error::InvalidBitmapLength {
                expected,
                actual: uncompressed.len() / 2,
            });
        }
        let mut grid = vec![0u16; expected];
        LittleEndian::read_u16_into(&uncompressed, &mut grid);

        let width = INTERNAL_PAGE_WIDTH;
        let height = INTERNAL_PAGE_HEIGHT - TRIMMED_ROWS;
        let (format, bytes_per_pixel) = match self.palette.mode() {
            ColorMode::Grayscale => (PixelFormat::Gray16, 2),
            ColorMode::Rgb => (PixelFormat::Rgba8, 4),
        };
        let mut pixels = vec![0u8; width * height * bytes_per_pixel];
        for row in 0..height {
            for col in 0..width {
                // Rotate the internal grid 90 degrees clockwise: output
                // (row, col) comes from internal row (width - 1 - col),
                // column `row`.
                let code = grid[(width - 1 - col) * INTERNAL_PAGE_HEIGHT + row];
                let offset = (row * width + col) * bytes_per_pixel;
                match format {
                    PixelFormat::Gray16 => {
                        LittleEndian::write_u16(&mut pixels[offset..], self.gray16(code));
                    }
                    _ => {
                        BigEndian::write_u32(&mut pixels[offset..], self.rgba(code));
                    }
                }
            }
        }
        Ok(Bitmap {
            width: width as u32,
            height: height as u32,
            format,
            pixels,
        })
    }
}
