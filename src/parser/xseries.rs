//! The X-series file family.
//!
//! X-series footers index pages under ordinal keys (`PAGE1`, `PAGE2`, …)
//! and every page addresses up to five layer metadata blocks. The footer
//! additionally indexes keyword, title, and link metadata, which this
//! parser resolves and attaches to the footer.

use super::{
    Policy, SignatureFamily, addresses_with_prefix, optional_address, parse_address,
    parse_metadata_block, read_file_type,
};
use crate::block::BlockReader;
use crate::metadata::{Footer, LAYER_NAMES, Metadata, PageParams, Params};
use crate::{Error, Result};
use log::{debug, warn};
use std::io::{Read, Seek};

const SIGNATURES: &[&str] = &[
    "SN_FILE_VER_20200001", // firmware C.053
    "SN_FILE_VER_20200005", // firmware C.077
    "SN_FILE_VER_20200006", // firmware C.130
    "SN_FILE_VER_20200007", // firmware C.159
    "SN_FILE_VER_20200008", // firmware C.237
    "SN_FILE_VER_20210009", // firmware C.291
    "SN_FILE_VER_20210010", // firmware Chauvet 2.1.6
    "SN_FILE_VER_20220011", // firmware Chauvet 2.5.17
    "SN_FILE_VER_20220013", // firmware Chauvet 2.6.19
    "SN_FILE_VER_20230014", // firmware Chauvet 2.10.25
    "SN_FILE_VER_20230015", // firmware Chauvet 3.14.27
];

const FAMILY: SignatureFamily = SignatureFamily {
    offset: 4,
    prefix: "SN_FILE_VER_",
    known: SIGNATURES,
};

pub(super) fn parse<R: Read + Seek>(
    reader: &mut BlockReader<R>,
    policy: Policy,
) -> Result<Metadata> {
    let signature = FAMILY.detect(reader, policy)?;
    let file_type = read_file_type(reader)?;

    let footer_address = reader.footer_address()?;
    let footer_params = parse_metadata_block(reader, footer_address)?;
    let footer = parse_footer(reader, footer_params)?;

    let header_address = optional_address(&footer.params, "FILE_FEATURE")?;
    let header = parse_metadata_block(reader, header_address)?;

    let mut pages = Vec::new();
    for address in addresses_with_prefix(&footer.params, "PAGE")? {
        pages.push(parse_page(reader, address)?);
    }
    debug!("parsed x-series note file with {} pages", pages.len());

    Ok(Metadata {
        signature,
        file_type,
        header,
        footer,
        pages,
    })
}

fn parse_footer<R: Read + Seek>(
    reader: &mut BlockReader<R>,
    params: Params,
) -> Result<Footer> {
    let mut keywords = Vec::new();
    for address in addresses_with_prefix(&params, "KEYWORD_")? {
        keywords.push(parse_keyword(reader, address)?);
    }
    let mut titles = Vec::new();
    for address in addresses_with_prefix(&params, "TITLE_")? {
        titles.push(parse_metadata_block(reader, address)?);
    }
    let mut links = Vec::new();
    for address in addresses_with_prefix(&params, "LINK")? {
        links.push(parse_metadata_block(reader, address)?);
    }
    Ok(Footer {
        params,
        keywords,
        titles,
        links,
    })
}

/// Parses one keyword block, restoring its text from the content block.
///
/// The raw `KEYWORD` token has been observed truncated, so the decoded
/// string at the `KEYWORDSITE` address is authoritative.
fn parse_keyword<R: Read + Seek>(
    reader: &mut BlockReader<R>,
    address: u32,
) -> Result<Params> {
    let mut keyword = parse_metadata_block(reader, address)?;
    if let Some(site) = keyword.get("KEYWORDSITE") {
        let content_address = parse_address("KEYWORDSITE", site)?;
        let content = reader.read_block(content_address)?;
        let text = String::from_utf8(content).map_err(|e| {
            Error::MalformedMetadata(format!("keyword content is not valid UTF-8: {e}"))
        })?;
        if keyword.get("KEYWORD") != Some(text.as_str()) {
            warn!("keyword token differs from its content block, using the content");
        }
        keyword.set("KEYWORD", text);
    }
    Ok(keyword)
}

fn parse_page<R: Read + Seek>(reader: &mut BlockReader<R>, address: u32) -> Result<PageParams> {
    let params = parse_metadata_block(reader, address)?;
    let mut layer_addresses = Vec::new();
    for (key, value) in params.iter() {
        if LAYER_NAMES.contains(&key) {
            layer_addresses.push(parse_address(key, value.first())?);
        }
    }
    let mut layers = Vec::new();
    for address in layer_addresses {
        layers.push(parse_metadata_block(reader, address)?);
    }
    Ok(PageParams {
        params,
        layers: Some(layers),
    })
}
