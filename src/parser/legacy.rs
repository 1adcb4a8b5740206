//! The legacy (original Supernote) file family.
//!
//! Legacy footers index pages under a repeated `PAGE` key and pages carry
//! their bitmap address (`DATA`) and protocol directly, with no layer
//! indirection.

use super::{
    Policy, SignatureFamily, addresses_with_prefix, optional_address, parse_metadata_block,
    read_file_type,
};
use crate::block::BlockReader;
use crate::metadata::{Footer, Metadata, PageParams};
use crate::Result;
use log::debug;
use std::io::{Read, Seek};

const SIGNATURES: &[&str] = &["SN_FILE_ASA_20190529"];

const FAMILY: SignatureFamily = SignatureFamily {
    offset: 0,
    prefix: "SN_FILE_ASA_",
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

    let header_address = optional_address(&footer_params, "FILE_FEATURE")?;
    let header = parse_metadata_block(reader, header_address)?;

    let mut pages = Vec::new();
    for address in addresses_with_prefix(&footer_params, "PAGE")? {
        pages.push(PageParams {
            params: parse_metadata_block(reader, address)?,
            layers: None,
        });
    }
    debug!("parsed legacy note file with {} pages", pages.len());

    Ok(Metadata {
        signature,
        file_type,
        header,
        footer: Footer {
            params: footer_params,
            ..Default::default()
        },
        pages,
    })
}
