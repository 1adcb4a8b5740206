//! Parse note files into a metadata tree.
//!
//! Two file families share the metadata grammar but differ in address
//! layout: the legacy family (signature `SN_FILE_ASA_*` at offset 0, pages
//! under a repeated `PAGE` key, no layers) and the X-series family
//! (signature `SN_FILE_VER_*` at offset 4, ordinal page keys, five-layer
//! indirection per page). [parse_metadata] tries the X-series parser first
//! and falls back to legacy.

mod legacy;
mod xseries;

use crate::block::BlockReader;
use crate::metadata::{Metadata, Params};
use crate::{Error, Result};
use log::warn;
use std::io::{Read, Seek};

/// Signature acceptance policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Policy {
    /// Accept only signatures from the known allow-list.
    #[default]
    Strict,
    /// Accept any signature matching the family pattern, treating the file
    /// as the latest known version of that family.
    Loose,
}

/// Parses a note byte source into its metadata tree.
///
/// # Examples
///
/// ```no_run
/// use supernote::{Policy, parse_metadata};
/// use std::fs::File;
///
/// let file = File::open("meeting-notes.note").unwrap();
/// let metadata = parse_metadata(file, Policy::Strict).unwrap();
/// println!("{} pages", metadata.total_pages());
/// ```
pub fn parse_metadata<R: Read + Seek>(read: R, policy: Policy) -> Result<Metadata> {
    let mut reader = BlockReader::new(read)?;
    parse_with_reader(&mut reader, policy)
}

pub(crate) fn parse_with_reader<R: Read + Seek>(
    reader: &mut BlockReader<R>,
    policy: Policy,
) -> Result<Metadata> {
    match xseries::parse(reader, policy) {
        Err(Error::UnsupportedFileFormat(_)) => {}
        other => return other,
    }
    match legacy::parse(reader, policy) {
        Err(Error::UnsupportedFileFormat(_)) => Err(Error::UnsupportedFileFormat(
            "no known signature family matches".to_string(),
        )),
        other => other,
    }
}

/// One signature family: where the signature lives and which strings are
/// known to belong to it.
pub(crate) struct SignatureFamily {
    pub offset: u64,
    pub prefix: &'static str,
    pub known: &'static [&'static str],
}

impl SignatureFamily {
    /// Reads the signature region and resolves it against this family.
    pub(crate) fn detect<R: Read + Seek>(
        &self,
        reader: &mut BlockReader<R>,
        policy: Policy,
    ) -> Result<String> {
        let latest = self.known[self.known.len() - 1];
        let bytes = reader.read_at(self.offset, latest.len() as u64)?;
        let Ok(candidate) = std::str::from_utf8(&bytes) else {
            return Err(Error::UnsupportedFileFormat(
                "signature is not ASCII".to_string(),
            ));
        };
        if let Some(signature) = self.known.iter().find(|known| **known == candidate) {
            return Ok((*signature).to_string());
        }
        if policy == Policy::Loose && self.matches_pattern(candidate) {
            warn!("unknown signature {candidate:?}, treating the file as {latest}");
            return Ok(latest.to_string());
        }
        Err(Error::UnsupportedFileFormat(format!(
            "unknown signature: {candidate:?}"
        )))
    }

    /// True when `candidate` is the family prefix followed by eight digits.
    fn matches_pattern(&self, candidate: &str) -> bool {
        candidate
            .strip_prefix(self.prefix)
            .is_some_and(|digits| digits.len() == 8 && digits.bytes().all(|b| b.is_ascii_digit()))
    }
}

/// Reads the four-byte file-type tag at the start of the file.
pub(crate) fn read_file_type<R: Read + Seek>(reader: &mut BlockReader<R>) -> Result<String> {
    let bytes = reader.read_at(0, 4)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Parses the metadata block at `address`, empty when the address is zero.
pub(crate) fn parse_metadata_block<R: Read + Seek>(
    reader: &mut BlockReader<R>,
    address: u32,
) -> Result<Params> {
    if address == 0 {
        return Ok(Params::default());
    }
    let payload = reader.read_block(address)?;
    Params::parse(&payload)
}

/// Parses a decimal block address stored as a metadata value.
pub(crate) fn parse_address(key: &str, value: &str) -> Result<u32> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::MalformedMetadata(format!("invalid address for {key}: {value:?}")))
}

/// Returns the address under `key`, or zero when the key is absent.
pub(crate) fn optional_address(params: &Params, key: &str) -> Result<u32> {
    params.get(key).map_or(Ok(0), |value| parse_address(key, value))
}

/// Collects every address stored under keys starting with `prefix`, in key
/// encounter order, expanding duplicated keys in place.
pub(crate) fn addresses_with_prefix(params: &Params, prefix: &str) -> Result<Vec<u32>> {
    let mut addresses = Vec::new();
    for (key, value) in params.iter() {
        if !key.starts_with(prefix) {
            continue;
        }
        for value in value.all() {
            addresses.push(parse_address(key, value)?);
        }
    }
    Ok(addresses)
}
