//! Our errors.

use thiserror::Error;

/// Crate-specific errors.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A page background template doesn't cover the page canvas.
    #[error("background template is {width}x{height}, expected {expected_width}x{expected_height}")]
    BackgroundSize {
        /// Width of the decoded template.
        width: u32,
        /// Height of the decoded template.
        height: u32,
        /// Required canvas width.
        expected_width: u32,
        /// Required canvas height.
        expected_height: u32,
    },

    /// A length-prefixed block runs past the end of the byte source.
    #[error("block at {address:#x} with length {length} runs past the end of the source ({source_len} bytes)")]
    BlockOutOfBounds {
        /// Offset of the offending read.
        address: u64,
        /// Number of bytes the read asked for.
        length: u64,
        /// Total length of the byte source.
        source_len: u64,
    },

    /// A decoder produced a bitmap that doesn't match the page geometry.
    #[error("decoded bitmap has {actual} pixels, expected {expected}")]
    InvalidBitmapLength {
        /// Pixel count the page geometry requires.
        expected: usize,
        /// Pixel count the decoder produced.
        actual: usize,
    },

    /// An RLE stream used a color code outside the active color map.
    #[error("invalid color code: {0:#04x}")]
    InvalidColorCode(u8),

    /// Wraps `std::io::Error`.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Wraps `serde_json::Error`.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// A metadata block could not be tokenized.
    #[error("malformed metadata: {0}")]
    MalformedMetadata(String),

    /// A metadata block lacks a required key.
    #[error("missing metadata key: {0}")]
    MissingKey(&'static str),

    /// A page number was out of range.
    #[error("page number out of range: {page} (total pages: {total})")]
    PageOutOfRange {
        /// The requested page number.
        page: usize,
        /// Total number of pages in the notebook.
        total: usize,
    },

    /// Wraps `image::ImageError` from background template decoding.
    #[error(transparent)]
    Png(#[from] image::ImageError),

    /// A layer carries a protocol tag with no registered decoder.
    #[error("unknown decode protocol: {0}")]
    UnknownDecodeProtocol(String),

    /// No known signature family matches the file.
    #[error("unsupported file format: {0}")]
    UnsupportedFileFormat(String),
}
