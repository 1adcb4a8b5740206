//! A strongly typed view over the parsed metadata tree.
//!
//! [Notebook] construction parses the metadata and then eagerly copies every
//! content block it references into owned buffers, so rendering never goes
//! back to the byte source. The tree itself stays available through
//! [Notebook::metadata] for JSON export and for keys this view doesn't
//! surface.

use crate::block::BlockReader;
use crate::metadata::{Metadata, PageParams, Params};
use crate::parser::{self, Policy, optional_address, parse_address};
use crate::{Error, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use log::warn;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

/// A parsed note file with all content blocks loaded.
///
/// # Examples
///
/// ```no_run
/// use supernote::Notebook;
///
/// let notebook = Notebook::from_path("meeting-notes.note").unwrap();
/// let page = notebook.page(0).unwrap();
/// println!("{:?}", page.protocol());
/// ```
#[derive(Clone, Debug)]
pub struct Notebook {
    metadata: Metadata,
    cover: Cover,
    keywords: Vec<Keyword>,
    titles: Vec<Title>,
    links: Vec<Link>,
    pages: Vec<Page>,
}

impl Notebook {
    /// Creates a notebook from a seekable byte source with the strict
    /// signature policy.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::fs::File;
    /// use std::io::BufReader;
    /// use supernote::Notebook;
    ///
    /// let file = File::open("meeting-notes.note").unwrap();
    /// let notebook = Notebook::new(BufReader::new(file)).unwrap();
    /// ```
    pub fn new<R: Read + Seek>(read: R) -> Result<Notebook> {
        Notebook::with_policy(read, Policy::default())
    }

    /// Creates a notebook with an explicit signature policy.
    pub fn with_policy<R: Read + Seek>(read: R, policy: Policy) -> Result<Notebook> {
        let mut reader = BlockReader::new(read)?;
        let metadata = parser::parse_with_reader(&mut reader, policy)?;
        Notebook::load(&mut reader, metadata)
    }

    /// Creates a notebook from a path.
    ///
    /// The underlying `File` is wrapped in a `BufReader` for performance
    /// reasons.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Notebook> {
        File::open(path)
            .map_err(Error::from)
            .and_then(|file| Notebook::new(BufReader::new(file)))
    }

    fn load<R: Read + Seek>(reader: &mut BlockReader<R>, metadata: Metadata) -> Result<Notebook> {
        let cover_address = ["COVER_2", "COVER_1"]
            .iter()
            .find_map(|key| metadata.footer.params.get(key))
            .map(|value| parse_address("COVER", value))
            .transpose()?
            .unwrap_or(0);
        let cover = Cover {
            content: read_content(reader, cover_address)?,
        };

        let mut keywords = Vec::new();
        for params in &metadata.footer.keywords {
            keywords.push(Keyword::new(reader, params.clone())?);
        }

        let title_pages = page_numbers_from_footer_keys(&metadata.footer.params, "TITLE_")?;
        let mut titles = Vec::new();
        for (params, page_number) in metadata.footer.titles.iter().zip(title_pages) {
            titles.push(Title::new(reader, params.clone(), page_number)?);
        }

        let link_pages = page_numbers_from_footer_keys(&metadata.footer.params, "LINK")?;
        let mut links = Vec::new();
        for (params, page_number) in metadata.footer.links.iter().zip(link_pages) {
            links.push(Link::new(reader, params.clone(), page_number)?);
        }

        let mut pages = Vec::new();
        for page_params in &metadata.pages {
            pages.push(Page::new(reader, page_params)?);
        }

        Ok(Notebook {
            metadata,
            cover,
            keywords,
            titles,
            links,
            pages,
        })
    }

    /// Returns the parsed metadata tree.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Returns the matched signature string.
    pub fn signature(&self) -> &str {
        &self.metadata.signature
    }

    /// Returns the four-byte file-type tag.
    pub fn file_type(&self) -> &str {
        &self.metadata.file_type
    }

    /// Returns the header block parameters.
    pub fn header(&self) -> &Params {
        &self.metadata.header
    }

    /// Returns the total page count.
    pub fn total_pages(&self) -> usize {
        self.pages.len()
    }

    /// Returns the page with the given zero-based number.
    pub fn page(&self, page_number: usize) -> Result<&Page> {
        self.pages.get(page_number).ok_or(Error::PageOutOfRange {
            page: page_number,
            total: self.pages.len(),
        })
    }

    /// Returns every page in order.
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Returns the cover.
    pub fn cover(&self) -> &Cover {
        &self.cover
    }

    /// Returns the keywords in footer order.
    pub fn keywords(&self) -> &[Keyword] {
        &self.keywords
    }

    /// Returns the titles in footer order.
    pub fn titles(&self) -> &[Title] {
        &self.titles
    }

    /// Returns the links in footer order.
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Returns true if this file's firmware generation uses the
    /// high-resolution grayscale RLE color map.
    pub fn supports_highres_grayscale(&self) -> bool {
        self.metadata
            .signature
            .strip_prefix("SN_FILE_VER_")
            .and_then(|digits| digits.parse::<u32>().ok())
            .is_some_and(|date| date >= 20230015)
    }
}

/// The notebook cover image.
#[derive(Clone, Debug, Default)]
pub struct Cover {
    content: Option<Vec<u8>>,
}

impl Cover {
    /// Returns the cover content bytes, if the file has a cover.
    pub fn content(&self) -> Option<&[u8]> {
        self.content.as_deref()
    }
}

/// A keyword pinned to a position on a page.
#[derive(Clone, Debug)]
pub struct Keyword {
    params: Params,
    content: Option<Vec<u8>>,
    page_number: usize,
    position: u32,
}

impl Keyword {
    fn new<R: Read + Seek>(reader: &mut BlockReader<R>, params: Params) -> Result<Keyword> {
        let page = params
            .get("KEYWORDPAGE")
            .ok_or(Error::MissingKey("KEYWORDPAGE"))?;
        let page_number: usize = page.parse().map_err(|_| {
            Error::MalformedMetadata(format!("invalid keyword page number: {page:?}"))
        })?;
        let rect = params
            .get("KEYWORDRECT")
            .ok_or(Error::MissingKey("KEYWORDRECT"))?;
        let position = rect_top(rect)?;
        let address = optional_address(&params, "KEYWORDSITE")?;
        let content = read_content(reader, address)?;
        Ok(Keyword {
            params,
            content,
            page_number: page_number.saturating_sub(1),
            position,
        })
    }

    /// Returns the keyword text.
    pub fn keyword(&self) -> Option<&str> {
        self.params.get("KEYWORD")
    }

    /// Returns the zero-based page number this keyword belongs to.
    pub fn page_number(&self) -> usize {
        self.page_number
    }

    /// Returns the vertical position on the page.
    pub fn position(&self) -> u32 {
        self.position
    }

    /// Returns the keyword content bytes.
    pub fn content(&self) -> Option<&[u8]> {
        self.content.as_deref()
    }

    /// Returns the raw keyword parameters.
    pub fn params(&self) -> &Params {
        &self.params
    }
}

/// A title region on a page.
#[derive(Clone, Debug)]
pub struct Title {
    params: Params,
    content: Option<Vec<u8>>,
    page_number: usize,
    position: u32,
}

impl Title {
    fn new<R: Read + Seek>(
        reader: &mut BlockReader<R>,
        params: Params,
        page_number: usize,
    ) -> Result<Title> {
        let rect = params
            .get("TITLERECTORI")
            .ok_or(Error::MissingKey("TITLERECTORI"))?;
        let position = rect_top(rect)?;
        let address = optional_address(&params, "TITLEBITMAP")?;
        let content = read_content(reader, address)?;
        Ok(Title {
            params,
            content,
            page_number,
            position,
        })
    }

    /// Returns the zero-based page number this title belongs to.
    pub fn page_number(&self) -> usize {
        self.page_number
    }

    /// Returns the vertical position on the page.
    pub fn position(&self) -> u32 {
        self.position
    }

    /// Returns the title bitmap content bytes.
    pub fn content(&self) -> Option<&[u8]> {
        self.content.as_deref()
    }

    /// Returns the raw title parameters.
    pub fn params(&self) -> &Params {
        &self.params
    }
}

/// Direction of a link relative to the page it is stored on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkDirection {
    /// The link leads away from this page.
    Out,
    /// The link leads into this page.
    In,
}

/// What a link points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkType {
    /// Another page, possibly in another file.
    Page,
    /// A file.
    File,
    /// A web address.
    Web,
}

/// An inter-page or web link.
#[derive(Clone, Debug)]
pub struct Link {
    params: Params,
    content: Option<Vec<u8>>,
    page_number: usize,
    direction: LinkDirection,
    link_type: LinkType,
}

impl Link {
    fn new<R: Read + Seek>(
        reader: &mut BlockReader<R>,
        params: Params,
        page_number: usize,
    ) -> Result<Link> {
        let direction = match params.get("LINKINOUT") {
            Some("0") => LinkDirection::Out,
            Some("1") => LinkDirection::In,
            Some(other) => {
                return Err(Error::MalformedMetadata(format!(
                    "invalid link direction: {other:?}"
                )));
            }
            None => return Err(Error::MissingKey("LINKINOUT")),
        };
        let link_type = match params.get("LINKTYPE") {
            Some("0") => LinkType::Page,
            Some("1") => LinkType::File,
            Some("4") => LinkType::Web,
            Some(other) => {
                return Err(Error::MalformedMetadata(format!(
                    "invalid link type: {other:?}"
                )));
            }
            None => return Err(Error::MissingKey("LINKTYPE")),
        };
        let address = optional_address(&params, "LINKBITMAP")?;
        let content = read_content(reader, address)?;
        Ok(Link {
            params,
            content,
            page_number,
            direction,
            link_type,
        })
    }

    /// Returns the zero-based page number this link is anchored on.
    pub fn page_number(&self) -> usize {
        self.page_number
    }

    /// Returns the link direction.
    pub fn direction(&self) -> LinkDirection {
        self.direction
    }

    /// Returns the link type.
    pub fn link_type(&self) -> LinkType {
        self.link_type
    }

    /// Returns the id of the file this link originates from.
    pub fn file_id(&self) -> Option<&str> {
        self.params.get("FILEID")
    }

    /// Returns the id of the target page.
    pub fn target_page_id(&self) -> Option<&str> {
        self.params.get("PAGEID")
    }

    /// Returns the rectangle of the link on its page as
    /// `[left, top, width, height]`.
    pub fn rect(&self) -> Result<[u32; 4]> {
        let rect = self
            .params
            .get("LINKRECT")
            .ok_or(Error::MissingKey("LINKRECT"))?;
        parse_rect(rect)
    }

    /// Returns the decoded `FILEPATH` value.
    ///
    /// For web links this is the URL; for file and page links it is the
    /// target file path. The raw value is base64 encoded.
    pub fn filepath(&self) -> Result<Option<String>> {
        let Some(encoded) = self.params.get("FILEPATH") else {
            return Ok(None);
        };
        let decoded = BASE64.decode(encoded).map_err(|e| {
            Error::MalformedMetadata(format!("link filepath is not valid base64: {e}"))
        })?;
        let path = String::from_utf8(decoded).map_err(|e| {
            Error::MalformedMetadata(format!("link filepath is not valid UTF-8: {e}"))
        })?;
        Ok(Some(path))
    }

    /// Returns the link bitmap content bytes.
    pub fn content(&self) -> Option<&[u8]> {
        self.content.as_deref()
    }

    /// Returns the raw link parameters.
    pub fn params(&self) -> &Params {
        &self.params
    }
}

/// Page orientation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Orientation {
    /// The default upright orientation.
    #[default]
    Portrait,
    /// Rotated; the logical page dimensions are swapped.
    Horizontal,
}

/// One page of a notebook.
#[derive(Clone, Debug)]
pub struct Page {
    params: Params,
    layers: Vec<Layer>,
    layer_backed: bool,
    content: Option<Vec<u8>>,
    totalpath: Option<Vec<u8>>,
    recogn_file: Option<Vec<u8>>,
    recogn_text: Option<Vec<u8>>,
}

impl Page {
    fn new<R: Read + Seek>(reader: &mut BlockReader<R>, page: &PageParams) -> Result<Page> {
        let (layers, content, layer_backed) = match &page.layers {
            Some(layer_params) => {
                let mut layers = Vec::new();
                for params in layer_params {
                    layers.push(Layer::new(reader, params.clone())?);
                }
                rename_duplicate_mainlayer(&mut layers);
                (layers, None, true)
            }
            None => {
                let address = optional_address(&page.params, "DATA")?;
                (Vec::new(), read_content(reader, address)?, false)
            }
        };
        let totalpath = read_content(reader, optional_address(&page.params, "TOTALPATH")?)?;
        let recogn_file = read_content(reader, optional_address(&page.params, "RECOGNFILE")?)?;
        let recogn_text = read_content(reader, optional_address(&page.params, "RECOGNTEXT")?)?;
        Ok(Page {
            params: page.params.clone(),
            layers,
            layer_backed,
            content,
            totalpath,
            recogn_file,
            recogn_text,
        })
    }

    /// Returns true if this page addresses its bitmaps through layers.
    pub fn has_layers(&self) -> bool {
        self.layer_backed
    }

    /// Returns the layers in page-block order.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Returns the layer with the given name, if present.
    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.name() == Some(name))
    }

    /// Returns the page content bytes of a layerless (legacy) page.
    pub fn content(&self) -> Option<&[u8]> {
        self.content.as_deref()
    }

    /// Returns the protocol tag selecting this page's decoder.
    ///
    /// Layered pages answer with the main layer's protocol; legacy pages
    /// carry the tag directly.
    pub fn protocol(&self) -> Option<&str> {
        if self.layer_backed {
            self.layer("MAINLAYER")
                .or_else(|| self.layers.first())
                .and_then(Layer::protocol)
        } else {
            self.params.get("PROTOCOL")
        }
    }

    /// Returns the page background style, e.g. `style_white` or a
    /// `user_` template name.
    pub fn style(&self) -> Option<&str> {
        self.params.get("PAGESTYLE")
    }

    /// Returns the background style hash, empty when the file stores none.
    pub fn style_hash(&self) -> &str {
        match self.params.get("PAGESTYLEMD5") {
            None | Some("0") => "",
            Some(hash) => hash,
        }
    }

    /// Returns the layer visibility descriptor as JSON text.
    ///
    /// The file stores `:` as `#`; the substitution is undone here.
    pub fn layer_info(&self) -> Option<String> {
        match self.params.get("LAYERINFO") {
            None | Some("none") => None,
            Some(info) => Some(info.replace('#', ":")),
        }
    }

    /// Returns the rendering order from `LAYERSEQ`, top layer first.
    pub fn layer_order(&self) -> Vec<&str> {
        match self.params.get("LAYERSEQ") {
            Some(seq) => seq.split(',').collect(),
            None => Vec::new(),
        }
    }

    /// Returns the page orientation.
    pub fn orientation(&self) -> Orientation {
        match self.params.get("ORIENTATION") {
            Some("1090") | Some("90") => Orientation::Horizontal,
            _ => Orientation::Portrait,
        }
    }

    /// Returns the page id, if the file stores one.
    pub fn page_id(&self) -> Option<&str> {
        self.params.get("PAGEID")
    }

    /// Returns the stroke path data.
    pub fn totalpath(&self) -> Option<&[u8]> {
        self.totalpath.as_deref()
    }

    /// Returns the handwriting recognition payload.
    pub fn recogn_file(&self) -> Option<&[u8]> {
        self.recogn_file.as_deref()
    }

    /// Returns the recognized-text payload.
    pub fn recogn_text(&self) -> Option<&[u8]> {
        self.recogn_text.as_deref()
    }

    /// Returns the recognized text of this page, one element per line.
    ///
    /// The payload is base64-encoded JSON produced by the device's
    /// recognition engine; only `Text` elements contribute.
    pub fn recognized_text(&self) -> Result<Option<String>> {
        let Some(payload) = self.recogn_text.as_deref() else {
            return Ok(None);
        };
        let decoded = BASE64.decode(payload).map_err(|e| {
            Error::MalformedMetadata(format!("recognized text is not valid base64: {e}"))
        })?;
        let value: serde_json::Value = serde_json::from_slice(&decoded)?;
        let mut lines = Vec::new();
        if let Some(elements) = value.get("elements").and_then(|e| e.as_array()) {
            for element in elements {
                if element.get("type").and_then(|t| t.as_str()) != Some("Text") {
                    continue;
                }
                if let Some(label) = element.get("label").and_then(|l| l.as_str()) {
                    lines.push(label);
                }
            }
        }
        if lines.is_empty() {
            Ok(None)
        } else {
            Ok(Some(lines.join("\n")))
        }
    }

    /// Returns the raw page parameters.
    pub fn params(&self) -> &Params {
        &self.params
    }
}

/// One of up to five named image planes composing a page.
#[derive(Clone, Debug)]
pub struct Layer {
    params: Params,
    content: Option<Vec<u8>>,
}

impl Layer {
    fn new<R: Read + Seek>(reader: &mut BlockReader<R>, params: Params) -> Result<Layer> {
        let address = optional_address(&params, "LAYERBITMAP")?;
        let content = read_content(reader, address)?;
        Ok(Layer { params, content })
    }

    /// Returns the layer name, one of `MAINLAYER`, `LAYER1`..`LAYER3`,
    /// `BGLAYER`.
    pub fn name(&self) -> Option<&str> {
        self.params.get("LAYERNAME")
    }

    /// Returns the protocol tag selecting this layer's decoder.
    pub fn protocol(&self) -> Option<&str> {
        self.params.get("LAYERPROTOCOL")
    }

    /// Returns the compressed bitmap content bytes.
    pub fn content(&self) -> Option<&[u8]> {
        self.content.as_deref()
    }

    /// Returns the raw layer parameters.
    pub fn params(&self) -> &Params {
        &self.params
    }

    fn set_name(&mut self, name: &str) {
        self.params.set("LAYERNAME", name.to_string());
    }
}

/// Renames a second `MAINLAYER` to `BGLAYER`.
///
/// Some firmware revisions write two layers named `MAINLAYER`; the second
/// one is in fact the background layer.
fn rename_duplicate_mainlayer(layers: &mut [Layer]) {
    let mut mainlayer_visited = false;
    for layer in layers.iter_mut() {
        let is_mainlayer = layer.name() == Some("MAINLAYER");
        if is_mainlayer && mainlayer_visited {
            warn!("duplicated MAINLAYER, treating it as BGLAYER");
            layer.set_name("BGLAYER");
        } else if is_mainlayer {
            mainlayer_visited = true;
        }
    }
}

/// Reads the content block at `address`; zero means absent.
fn read_content<R: Read + Seek>(
    reader: &mut BlockReader<R>,
    address: u32,
) -> Result<Option<Vec<u8>>> {
    if address == 0 {
        return Ok(None);
    }
    reader.read_block(address).map(Some)
}

/// Derives zero-based page numbers from footer keys like `TITLE_01230000`,
/// whose characters 6..10 carry the one-based page number.
fn page_numbers_from_footer_keys(footer: &Params, prefix: &str) -> Result<Vec<usize>> {
    let mut page_numbers = Vec::new();
    for (key, value) in footer.iter() {
        if !key.starts_with(prefix) {
            continue;
        }
        let digits = key.get(6..10).ok_or_else(|| {
            Error::MalformedMetadata(format!("footer key too short for a page number: {key:?}"))
        })?;
        let page: usize = digits.parse().map_err(|_| {
            Error::MalformedMetadata(format!("invalid page number in footer key: {key:?}"))
        })?;
        for _ in value.all() {
            page_numbers.push(page.saturating_sub(1));
        }
    }
    Ok(page_numbers)
}

fn rect_top(rect: &str) -> Result<u32> {
    Ok(parse_rect(rect)?[1])
}

/// Parses a `left,top,width,height` rectangle.
fn parse_rect(rect: &str) -> Result<[u32; 4]> {
    let mut fields = rect.split(',');
    let mut parsed = [0u32; 4];
    for slot in parsed.iter_mut() {
        let field = fields.next().ok_or_else(|| {
            Error::MalformedMetadata(format!("invalid rectangle: {rect:?}"))
        })?;
        *slot = field.trim().parse().map_err(|_| {
            Error::MalformedMetadata(format!("invalid rectangle: {rect:?}"))
        })?;
    }
    Ok(parsed)
}
