//! Flatten page layers into raster images.
//!
//! A page carries up to five named layers. Rendering decodes each layer by
//! its protocol tag, works out per-layer visibility from the file plus the
//! caller's [VisibilityOverlay], and composites the visible layers bottom-up
//! over a white canvas. A layer's transparent pixels are holes that show the
//! composite below.

use crate::color::{ColorPalette, LayerVisibility, VisibilityOverlay};
use crate::decoder::{self, Bitmap, Decode, DecodeContext, PixelFormat, PngDecoder};
use crate::metadata::LAYER_NAMES;
use crate::notebook::{Layer, Notebook, Orientation, Page};
use crate::{Error, PAGE_HEIGHT, PAGE_WIDTH, Result};
use serde::Deserialize;
use std::collections::HashMap;

/// Compressed size of the stock all-blank background bitmap.
///
/// A `style_white` background layer of exactly this size encodes its runs
/// with the short variant of the `0xff` length marker.
const BLANK_BACKGROUND_SIZE: usize = 0x140e;

const STYLE_WHITE: &str = "style_white";
const USER_STYLE_PREFIX: &str = "user_";
const BACKGROUND_LAYER: &str = "BGLAYER";
const MAIN_LAYER: &str = "MAINLAYER";

#[derive(Debug, Deserialize)]
struct LayerInfoEntry {
    #[serde(rename = "layerId")]
    layer_id: Option<u32>,
    #[serde(rename = "isBackgroundLayer", default)]
    is_background_layer: bool,
    #[serde(rename = "isVisible", default)]
    is_visible: bool,
}

/// Renders notebook pages into raster images.
///
/// # Examples
///
/// ```no_run
/// use supernote::{Notebook, PixelFormat, Renderer};
///
/// let notebook = Notebook::from_path("meeting-notes.note").unwrap();
/// let renderer = Renderer::new(&notebook);
/// let image = renderer.render(0).unwrap();
/// assert_eq!(PixelFormat::Rgb8, image.format);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Renderer<'a> {
    notebook: &'a Notebook,
    palette: ColorPalette,
    highres: Option<bool>,
}

impl<'a> Renderer<'a> {
    /// Creates a renderer with the default grayscale palette.
    pub fn new(notebook: &Notebook) -> Renderer<'_> {
        Renderer::with_palette(notebook, ColorPalette::default())
    }

    /// Creates a renderer applying `palette` to every non-background layer.
    pub fn with_palette(notebook: &'a Notebook, palette: ColorPalette) -> Renderer<'a> {
        Renderer {
            notebook,
            palette,
            highres: None,
        }
    }

    /// Overrides the high-resolution grayscale capability derived from the
    /// file.
    pub fn highres_grayscale(mut self, highres: bool) -> Renderer<'a> {
        self.highres = Some(highres);
        self
    }

    /// Renders one page.
    pub fn render(&self, page_number: usize) -> Result<Bitmap> {
        self.render_with_overlay(page_number, &VisibilityOverlay::default())
    }

    /// Renders one page with per-layer visibility overrides.
    ///
    /// When the overlay forces the background layer invisible, the result is
    /// RGBA and the palette's transparent sentinel becomes alpha zero.
    pub fn render_with_overlay(
        &self,
        page_number: usize,
        overlay: &VisibilityOverlay,
    ) -> Result<Bitmap> {
        let page = self.notebook.page(page_number)?;
        let (width, height) = canvas_size(page);
        if !page.has_layers() {
            return self.render_flat(page, width, height);
        }

        let mut decoded: HashMap<&str, Bitmap> = HashMap::new();
        for layer in page.layers() {
            let Some(name) = layer.name() else {
                continue;
            };
            let Some(content) = layer.content() else {
                continue;
            };
            decoded.insert(name, self.decode_layer(page, layer, name, content, width, height)?);
        }

        let mut visibility = layer_visibility(page.layer_info())?;
        for name in LAYER_NAMES {
            match overlay.for_layer(name) {
                LayerVisibility::Default => {}
                LayerVisibility::Visible => {
                    visibility.insert(name.to_string(), true);
                }
                LayerVisibility::Invisible => {
                    visibility.insert(name.to_string(), false);
                }
            }
        }

        let mut canvas = vec![0xff; width as usize * height as usize * 3];
        let order = page.layer_order();
        for name in order.iter().rev() {
            if !visibility.get(*name).copied().unwrap_or(false) {
                continue;
            }
            let Some(bitmap) = decoded.get(*name) else {
                continue;
            };
            let layer_palette = if *name == BACKGROUND_LAYER {
                ColorPalette::default()
            } else {
                self.palette
            };
            composite(&mut canvas, width, height, bitmap, &layer_palette)?;
        }

        if overlay.for_layer(BACKGROUND_LAYER) == LayerVisibility::Invisible {
            return Ok(knock_out_background(&canvas, width, height, &self.palette));
        }
        Ok(Bitmap {
            width,
            height,
            format: PixelFormat::Rgb8,
            pixels: canvas,
        })
    }

    /// Renders the background layer alone.
    ///
    /// Together with a background-suppressed [Renderer::render_with_overlay]
    /// this provides the two passes a vectorizing consumer traces.
    pub fn render_background(&self, page_number: usize) -> Result<Bitmap> {
        let overlay = VisibilityOverlay {
            main: LayerVisibility::Invisible,
            layer1: LayerVisibility::Invisible,
            layer2: LayerVisibility::Invisible,
            layer3: LayerVisibility::Invisible,
            background: LayerVisibility::Default,
        };
        self.render_with_overlay(page_number, &overlay)
    }

    /// Renders one page into per-tone foreground masks.
    ///
    /// The page is rendered with the default palette and the background
    /// suppressed, then separated into one mask per tone class. Each mask
    /// carries the fill color this renderer's palette assigns to the tone,
    /// ready for contour tracing into vector output.
    pub fn color_masks(&self, page_number: usize) -> Result<ColorMasks> {
        let default_renderer = Renderer {
            notebook: self.notebook,
            palette: ColorPalette::default(),
            highres: self.highres,
        };
        let overlay = VisibilityOverlay {
            background: LayerVisibility::Invisible,
            ..Default::default()
        };
        let image = default_renderer.render_with_overlay(page_number, &overlay)?;

        let default_palette = ColorPalette::default();
        let tones = [
            (default_palette.black(), self.palette.black()),
            (default_palette.dark_gray(), self.palette.dark_gray()),
            (default_palette.gray(), self.palette.gray()),
            (default_palette.white(), self.palette.white()),
        ];
        let pixel_count = image.pixel_count();
        let bytes_per_pixel = image.format.bytes_per_pixel();
        let mut masks = Vec::with_capacity(tones.len());
        for (tone, fill) in tones {
            let tone = (tone & 0xff) as u8;
            let mut mask = vec![0u8; pixel_count];
            for (index, pixel) in image.pixels.chunks_exact(bytes_per_pixel).enumerate() {
                let tone_present = match image.format {
                    PixelFormat::Gray8 => pixel[0] == tone,
                    PixelFormat::Gray16 => {
                        let wide = (u16::from(tone) << 8) | u16::from(tone);
                        u16::from_le_bytes([pixel[0], pixel[1]]) == wide
                    }
                    PixelFormat::Rgb8 => pixel == [tone, tone, tone],
                    PixelFormat::Rgba8 => pixel[3] != 0 && pixel[..3] == [tone, tone, tone],
                };
                if tone_present {
                    mask[index] = 1;
                }
            }
            masks.push(ToneMask { color: fill, mask });
        }
        Ok(ColorMasks {
            width: image.width,
            height: image.height,
            masks,
        })
    }

    fn render_flat(&self, page: &Page, width: u32, height: u32) -> Result<Bitmap> {
        let Some(content) = page.content() else {
            // a page with no content renders as a fully transparent canvas
            return Ok(Bitmap {
                width,
                height,
                format: PixelFormat::Rgba8,
                pixels: vec![0; width as usize * height as usize * 4],
            });
        };
        let protocol = page.protocol().ok_or(Error::MissingKey("PROTOCOL"))?;
        let ctx = DecodeContext {
            width,
            height,
            palette: self.palette,
            highres: self.highres(),
            all_blank: false,
        };
        decoder::find_decoder(protocol, &ctx)?.decode(content)
    }

    fn decode_layer(
        &self,
        page: &Page,
        layer: &Layer,
        name: &str,
        content: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Bitmap> {
        let style = page.style();
        let is_background = name == BACKGROUND_LAYER;
        if is_background && style.is_some_and(|style| style.starts_with(USER_STYLE_PREFIX)) {
            return PngDecoder::new(width, height).decode(content);
        }
        let all_blank = is_background
            && style == Some(STYLE_WHITE)
            && content.len() == BLANK_BACKGROUND_SIZE;
        // the background keeps the stock colors; every other layer gets the
        // caller's palette
        let palette = if is_background {
            ColorPalette::default()
        } else {
            self.palette
        };
        let protocol = layer.protocol().ok_or(Error::MissingKey("LAYERPROTOCOL"))?;
        let ctx = DecodeContext {
            width,
            height,
            palette,
            highres: self.highres(),
            all_blank,
        };
        decoder::find_decoder(protocol, &ctx)?.decode(content)
    }

    fn highres(&self) -> bool {
        self.highres
            .unwrap_or_else(|| self.notebook.supports_highres_grayscale())
    }
}

/// Per-tone foreground masks of one page, the input to vectorization.
#[derive(Clone, Debug, PartialEq)]
pub struct ColorMasks {
    /// Canvas width in pixels.
    pub width: u32,
    /// Canvas height in pixels.
    pub height: u32,
    /// One mask per tone class: black, dark gray, gray, white.
    pub masks: Vec<ToneMask>,
}

/// The mask of one tone class.
#[derive(Clone, Debug, PartialEq)]
pub struct ToneMask {
    /// The fill color the renderer's palette assigns to this tone.
    pub color: u32,
    /// One byte per pixel, 1 where the tone is present.
    pub mask: Vec<u8>,
}

/// Returns the page canvas size, swapped for horizontal pages.
fn canvas_size(page: &Page) -> (u32, u32) {
    match page.orientation() {
        Orientation::Portrait => (PAGE_WIDTH, PAGE_HEIGHT),
        Orientation::Horizontal => (PAGE_HEIGHT, PAGE_WIDTH),
    }
}

/// Works out per-layer visibility from the `LAYERINFO` descriptor.
///
/// Entries name layers by id, with the background flag taking precedence.
/// A missing descriptor shows the main and background layers only;
/// `MAINLAYER` is visible whenever the descriptor doesn't say otherwise.
fn layer_visibility(layer_info: Option<String>) -> Result<HashMap<String, bool>> {
    let mut visibility = HashMap::new();
    match layer_info {
        None => {
            visibility.insert(MAIN_LAYER.to_string(), true);
            visibility.insert(BACKGROUND_LAYER.to_string(), true);
        }
        Some(info) => {
            let entries: Vec<LayerInfoEntry> = serde_json::from_str(&info)?;
            for entry in entries {
                let name = if entry.is_background_layer {
                    BACKGROUND_LAYER.to_string()
                } else {
                    match entry.layer_id {
                        None | Some(0) => MAIN_LAYER.to_string(),
                        Some(id) => format!("LAYER{id}"),
                    }
                };
                visibility.insert(name, entry.is_visible);
            }
            visibility.entry(MAIN_LAYER.to_string()).or_insert(true);
            visibility.entry(BACKGROUND_LAYER.to_string()).or_insert(true);
        }
    }
    Ok(visibility)
}

/// Draws `layer` over `canvas`, treating the palette's transparent sentinel
/// as holes.
fn composite(
    canvas: &mut [u8],
    width: u32,
    height: u32,
    layer: &Bitmap,
    palette: &ColorPalette,
) -> Result<()> {
    if layer.width != width || layer.height != height {
        return Err(Error::InvalidBitmapLength {
            expected: width as usize * height as usize,
            actual: layer.pixel_count(),
        });
    }
    let sentinel_rgb = palette.rgb_bytes(palette.transparent());
    match layer.format {
        PixelFormat::Gray8 => {
            let sentinel = (palette.transparent() & 0xff) as u8;
            for (index, &gray) in layer.pixels.iter().enumerate() {
                if gray != sentinel {
                    canvas[index * 3..index * 3 + 3].copy_from_slice(&[gray, gray, gray]);
                }
            }
        }
        PixelFormat::Gray16 => {
            let tone = (palette.transparent() & 0xff) as u16;
            let sentinel = (tone << 8) | tone;
            for (index, pixel) in layer.pixels.chunks_exact(2).enumerate() {
                let value = u16::from_le_bytes([pixel[0], pixel[1]]);
                if value != sentinel {
                    let gray = (value >> 8) as u8;
                    canvas[index * 3..index * 3 + 3].copy_from_slice(&[gray, gray, gray]);
                }
            }
        }
        PixelFormat::Rgb8 => {
            for (index, pixel) in layer.pixels.chunks_exact(3).enumerate() {
                if pixel != sentinel_rgb {
                    canvas[index * 3..index * 3 + 3].copy_from_slice(pixel);
                }
            }
        }
        PixelFormat::Rgba8 => {
            for (index, pixel) in layer.pixels.chunks_exact(4).enumerate() {
                if pixel[3] != 0 && pixel[..3] != sentinel_rgb {
                    canvas[index * 3..index * 3 + 3].copy_from_slice(&pixel[..3]);
                }
            }
        }
    }
    Ok(())
}

/// Converts a flattened canvas to RGBA, turning the transparent sentinel
/// into alpha zero.
fn knock_out_background(
    canvas: &[u8],
    width: u32,
    height: u32,
    palette: &ColorPalette,
) -> Bitmap {
    let sentinel = palette.rgb_bytes(palette.transparent());
    let mut pixels = Vec::with_capacity(canvas.len() / 3 * 4);
    for pixel in canvas.chunks_exact(3) {
        pixels.extend_from_slice(pixel);
        pixels.push(if pixel == sentinel { 0 } else { 0xff });
    }
    Bitmap {
        width,
        height,
        format: PixelFormat::Rgba8,
        pixels,
    }
}
