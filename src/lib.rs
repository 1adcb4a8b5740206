//! Native library for reading the notebook file format produced by
//! [Supernote](https://supernote.com) e-ink devices and rendering its pages
//! into raster images.
//!
//! A note file is a block-indexed binary container: a trailing pointer names
//! a footer block, the footer indexes every other block by absolute address,
//! and metadata blocks are repetitions of ASCII `<KEY:VALUE>` tokens. Page
//! bitmaps are stored per layer, compressed with either a run-length scheme
//! (`RATTA_RLE`) or zlib (`SN_ASA_COMPRESS`).
//!
//! # Reading a notebook
//!
//! Use a [Notebook] to open a file and inspect its structure:
//!
//! ```no_run
//! use supernote::Notebook;
//!
//! let notebook = Notebook::from_path("meeting-notes.note").unwrap();
//! println!("The file has {} pages.", notebook.total_pages());
//! for keyword in notebook.keywords() {
//!     println!("page {}: {:?}", keyword.page_number(), keyword.keyword());
//! }
//! ```
//!
//! # Rendering pages
//!
//! A [Renderer] flattens the up-to-five layers of a page into one image:
//!
//! ```no_run
//! use supernote::{Notebook, Renderer};
//!
//! let notebook = Notebook::from_path("meeting-notes.note").unwrap();
//! let renderer = Renderer::new(&notebook);
//! let image = renderer.render(0).unwrap();
//! assert_eq!(supernote::PAGE_WIDTH, image.width);
//! ```
//!
//! Colors are configurable through a [ColorPalette], and individual layers
//! can be forced on or off with a [VisibilityOverlay]:
//!
//! ```no_run
//! use supernote::{ColorMode, ColorPalette, LayerVisibility, Notebook, Renderer, VisibilityOverlay};
//!
//! let notebook = Notebook::from_path("meeting-notes.note").unwrap();
//! let palette = ColorPalette::new(ColorMode::Rgb, [0x202020, 0x707070, 0xb0b0b0, 0xfefefe]);
//! let renderer = Renderer::with_palette(&notebook, palette);
//! let overlay = VisibilityOverlay {
//!     background: LayerVisibility::Invisible,
//!     ..Default::default()
//! };
//! let image = renderer.render_with_overlay(0, &overlay).unwrap();
//! ```
//!
//! # Metadata export
//!
//! The parsed metadata tree serializes to JSON with key order preserved:
//!
//! ```no_run
//! use supernote::{Policy, parse_metadata};
//! use std::fs::File;
//!
//! let file = File::open("meeting-notes.note").unwrap();
//! let metadata = parse_metadata(file, Policy::Strict).unwrap();
//! println!("{}", metadata.to_json_pretty().unwrap());
//! ```

#![deny(
    missing_docs,
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_import_braces,
    unused_qualifications
)]

pub mod color;
pub mod decoder;

mod block;
mod error;
mod metadata;
mod notebook;
mod parser;
mod render;

pub use crate::color::{ColorMode, ColorPalette, LayerVisibility, VisibilityOverlay};
pub use crate::decoder::{Bitmap, PixelFormat};
pub use crate::error::Error;
pub use crate::metadata::{Footer, Metadata, PageParams, Params, Value};
pub use crate::notebook::{
    Cover, Keyword, Layer, Link, LinkDirection, LinkType, Notebook, Orientation, Page, Title,
};
pub use crate::parser::{Policy, parse_metadata};
pub use crate::render::{ColorMasks, Renderer, ToneMask};

/// Logical page width in pixels, portrait orientation.
pub const PAGE_WIDTH: u32 = 1404;

/// Logical page height in pixels, portrait orientation.
pub const PAGE_HEIGHT: u32 = 1872;

/// Crate-specific result type.
pub type Result<T> = std::result::Result<T, Error>;
