//! Positional reads of length-prefixed blocks.
//!
//! Every region a note file references is laid out as a four-byte
//! little-endian length followed by that many payload bytes. Addresses
//! stored in metadata point at the length field, and an address of zero
//! means "absent". All reads here are positional, so the parser can hop
//! around the address graph without tracking stream state.

use crate::{Error, Result};
use byteorder::{ByteOrder, LittleEndian};
use std::io::{Read, Seek, SeekFrom};

/// Size in bytes of a block address.
pub(crate) const ADDRESS_SIZE: u64 = 4;

/// Size in bytes of the length field that precedes a block payload.
pub(crate) const LENGTH_FIELD_SIZE: u64 = 4;

/// The smallest viable file: a 24-byte signature region plus the footer pointer.
const MIN_SOURCE_LEN: u64 = 28;

#[derive(Debug)]
pub(crate) struct BlockReader<R> {
    source: R,
    source_len: u64,
}

impl<R: Read + Seek> BlockReader<R> {
    /// Wraps a seekable byte source, caching its total length.
    pub(crate) fn new(mut source: R) -> Result<BlockReader<R>> {
        let source_len = source.seek(SeekFrom::End(0))?;
        if source_len < MIN_SOURCE_LEN {
            return Err(Error::UnsupportedFileFormat(format!(
                "source is only {source_len} bytes"
            )));
        }
        Ok(BlockReader { source, source_len })
    }

    /// Reads `length` bytes starting at `address`.
    pub(crate) fn read_at(&mut self, address: u64, length: u64) -> Result<Vec<u8>> {
        self.check_bounds(address, length)?;
        self.source.seek(SeekFrom::Start(address))?;
        let mut buf = vec![0; length as usize];
        self.source.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Reads a little-endian u32 at `address`.
    pub(crate) fn read_u32_le(&mut self, address: u64) -> Result<u32> {
        let buf = self.read_at(address, ADDRESS_SIZE)?;
        Ok(LittleEndian::read_u32(&buf))
    }

    /// Returns the footer block address, stored in the last four bytes.
    pub(crate) fn footer_address(&mut self) -> Result<u32> {
        self.read_u32_le(self.source_len - ADDRESS_SIZE)
    }

    /// Reads the length-prefixed block at `address`.
    ///
    /// An address of zero stands for an absent block and yields no bytes.
    pub(crate) fn read_block(&mut self, address: u32) -> Result<Vec<u8>> {
        if address == 0 {
            return Ok(Vec::new());
        }
        let length = self.read_u32_le(u64::from(address))?;
        self.read_at(
            u64::from(address) + LENGTH_FIELD_SIZE,
            u64::from(length),
        )
    }

    fn check_bounds(&self, address: u64, length: u64) -> Result<()> {
        match address.checked_add(length) {
            Some(end) if end <= self.source_len => Ok(()),
            _ => Err(Error::BlockOutOfBounds {
                address,
                length,
                source_len: self.source_len,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn source(bytes: Vec<u8>) -> BlockReader<Cursor<Vec<u8>>> {
        BlockReader::new(Cursor::new(bytes)).unwrap()
    }

    #[test]
    fn read_block() {
        let mut bytes = vec![0; 32];
        bytes.extend_from_slice(&5u32.to_le_bytes());
        bytes.extend_from_slice(b"hello");
        let mut reader = source(bytes);
        assert_eq!(b"hello".to_vec(), reader.read_block(32).unwrap());
    }

    #[test]
    fn zero_address_is_absent() {
        let mut reader = source(vec![0; 32]);
        assert!(reader.read_block(0).unwrap().is_empty());
    }

    #[test]
    fn length_past_end_of_source() {
        let mut bytes = vec![0; 32];
        bytes.extend_from_slice(&100u32.to_le_bytes());
        let mut reader = source(bytes);
        assert!(matches!(
            reader.read_block(32).unwrap_err(),
            Error::BlockOutOfBounds { .. }
        ));
    }

    #[test]
    fn footer_address_is_trailing_pointer() {
        let mut bytes = vec![0; 28];
        bytes[24..28].copy_from_slice(&0x1234u32.to_le_bytes());
        let mut reader = source(bytes);
        assert_eq!(0x1234, reader.footer_address().unwrap());
    }

    #[test]
    fn source_too_short() {
        assert!(matches!(
            BlockReader::new(Cursor::new(vec![0; 27])).unwrap_err(),
            Error::UnsupportedFileFormat(_)
        ));
    }
}
