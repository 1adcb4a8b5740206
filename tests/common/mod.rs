//! Builds synthetic note files in memory for the integration tests.

/// Assembles a note file block by block.
///
/// Blocks are appended in call order; every append returns the absolute
/// address the block landed at, ready to be referenced from later metadata.
/// The trailing footer pointer is written by [NoteBuilder::finish].
pub struct NoteBuilder {
    bytes: Vec<u8>,
}

impl NoteBuilder {
    /// Starts an X-series file: a four-byte type tag, then the signature.
    pub fn xseries(signature: &str) -> NoteBuilder {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"note");
        bytes.extend_from_slice(signature.as_bytes());
        NoteBuilder { bytes }
    }

    /// Starts a legacy file: the signature at offset zero.
    pub fn legacy(signature: &str) -> NoteBuilder {
        NoteBuilder {
            bytes: signature.as_bytes().to_vec(),
        }
    }

    /// Appends a length-prefixed block and returns its address.
    pub fn block(&mut self, payload: &[u8]) -> u32 {
        let address = self.bytes.len() as u32;
        self.bytes
            .extend_from_slice(&(payload.len() as u32).to_le_bytes());
        self.bytes.extend_from_slice(payload);
        address
    }

    /// Appends a metadata block of preformatted `<KEY:VALUE>` tokens.
    pub fn metadata(&mut self, tokens: &str) -> u32 {
        self.block(tokens.as_bytes())
    }

    /// Appends the footer pointer and returns the finished file.
    pub fn finish(mut self, footer_address: u32) -> Vec<u8> {
        self.bytes.extend_from_slice(&footer_address.to_le_bytes());
        self.bytes
    }
}

/// Total pixels of a portrait page.
pub const PAGE_PIXELS: usize = 1404 * 1872;

/// Encodes `pixels` pixels of a single color as a RATTA_RLE stream.
pub fn rle_solid(color_code: u8, pixels: usize) -> Vec<u8> {
    let mut data = Vec::new();
    let mut remaining = pixels;
    while remaining >= 0x4000 {
        data.extend_from_slice(&[color_code, 0xff]);
        remaining -= 0x4000;
    }
    while remaining >= 128 {
        data.extend_from_slice(&[color_code, 0x7f]);
        remaining -= 128;
    }
    if remaining > 0 {
        data.extend_from_slice(&[color_code, (remaining - 1) as u8]);
    }
    data
}

/// Encodes a full portrait page: `lead` pixels of `color_code`, background
/// for the rest.
pub fn rle_page(color_code: u8, lead: usize) -> Vec<u8> {
    let mut data = rle_solid(color_code, lead);
    data.extend_from_slice(&rle_solid(0x62, PAGE_PIXELS - lead));
    data
}
