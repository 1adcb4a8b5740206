//! Decoders for the per-layer bitmap protocols.
//!
//! Each layer names its compression scheme with a protocol tag
//! (`LAYERPROTOCOL`). Decoders are selected by tag, configured for one
//! page's geometry and palette, and used for a single [Decode::decode]
//! call. The renderer never needs to know which scheme it is driving.

mod flate;
mod png;
mod rle;

pub use flate::FlateDecoder;
pub use png::PngDecoder;
pub use rle::RattaRleDecoder;

use crate::color::ColorPalette;
use crate::{Error, Result};

/// Protocol tag of the run-length scheme.
pub const PROTOCOL_RATTA_RLE: &str = "RATTA_RLE";

/// Protocol tag of the zlib-compressed 16-bit scheme.
pub const PROTOCOL_FLATE: &str = "SN_ASA_COMPRESS";

/// Pixel format of a decoded plane.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// One byte per pixel, grayscale.
    Gray8,
    /// Two little-endian bytes per pixel, grayscale.
    Gray16,
    /// Three bytes per pixel, RGB.
    Rgb8,
    /// Four bytes per pixel, RGB plus alpha.
    Rgba8,
}

impl PixelFormat {
    /// Returns the number of bytes one pixel occupies.
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Gray16 => 2,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }
}

/// A decoded pixel plane.
///
/// This is deliberately not an image-library type: it is the raw row-major
/// pixel buffer plus enough information to interpret it.
#[derive(Clone, Debug, PartialEq)]
pub struct Bitmap {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// How [Bitmap::pixels] is laid out.
    pub format: PixelFormat,
    /// Row-major pixel bytes.
    pub pixels: Vec<u8>,
}

impl Bitmap {
    /// Returns the number of pixels.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Decodes one layer's content into a pixel plane.
pub trait Decode: std::fmt::Debug {
    /// Decodes `data`, returning the pixel plane.
    fn decode(&self, data: &[u8]) -> Result<Bitmap>;
}

/// Everything a protocol decoder needs besides the content bytes.
#[derive(Clone, Copy, Debug)]
pub(crate) struct DecodeContext {
    pub width: u32,
    pub height: u32,
    pub palette: ColorPalette,
    pub highres: bool,
    pub all_blank: bool,
}

/// Returns the decoder registered for `protocol`, configured from `ctx`.
///
/// Adding a protocol means adding an arm here; the renderer dispatches
/// through this function only.
pub(crate) fn find_decoder(protocol: &str, ctx: &DecodeContext) -> Result<Box<dyn Decode>> {
    match protocol {
        PROTOCOL_RATTA_RLE => Ok(Box::new(
            RattaRleDecoder::new(ctx.palette, ctx.width, ctx.height)
                .highres(ctx.highres)
                .all_blank(ctx.all_blank),
        )),
        PROTOCOL_FLATE => Ok(Box::new(FlateDecoder::new(ctx.palette))),
        _ => Err(Error::UnknownDecodeProtocol(protocol.to_string())),
    }
}
