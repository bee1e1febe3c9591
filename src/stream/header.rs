//! Record stream header.
//!
//! The header is a fixed-size (8 bytes) structure at the start of every
//! record stream. It is never compressed.

use crate::config::CompressionType;
use crate::error::{Error, Result};
use std::io::{self, Read, Write};

/// Magic bytes identifying a record stream.
pub const MAGIC: [u8; 6] = [0xFF, 0xFF, b'B', b'S', b'O', b'N'];

/// The only format version this crate reads and writes.
pub const FORMAT_VERSION: u8 = 1;

/// Size of the encoded header in bytes.
pub const HEADER_SIZE: usize = 8;

/// Flag bit: everything after the header is gzip compressed.
pub const FLAG_COMPRESSED: u8 = 0x01;

/// Header is the first 8 bytes of a record stream.
///
/// Format:
/// ```text
/// [magic: 6 bytes = FF FF 'B' 'S' 'O' 'N']
/// [version: 1 byte]
/// [flags: 1 byte]
/// ```
///
/// Flag bits other than [`FLAG_COMPRESSED`] are reserved. Readers keep them
/// but do not act on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Format version
    pub version: u8,
    /// Flag bits
    pub flags: u8,
}

impl Header {
    /// Create a header for the current version.
    pub fn new(compression: CompressionType) -> Self {
        let flags = if compression.is_compressed() { FLAG_COMPRESSED } else { 0 };
        Self { version: FORMAT_VERSION, flags }
    }

    /// Check if the payload is compressed.
    pub fn is_compressed(&self) -> bool {
        self.flags & FLAG_COMPRESSED != 0
    }

    /// The payload compression named by the flags.
    pub fn compression(&self) -> CompressionType {
        if self.is_compressed() {
            CompressionType::Gzip
        } else {
            CompressionType::None
        }
    }

    /// Encode the header to bytes (8 bytes)
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[..MAGIC.len()].copy_from_slice(&MAGIC);
        buf[6] = self.version;
        buf[7] = self.flags;
        buf
    }

    /// Decode a header from bytes
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() != HEADER_SIZE {
            return Err(Error::malformed_header(format!(
                "Header size mismatch: expected {}, got {}",
                HEADER_SIZE,
                data.len()
            )));
        }

        if data[..MAGIC.len()] != MAGIC {
            return Err(Error::malformed_header("not a keystream record stream"));
        }

        let version = data[6];
        if version != FORMAT_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }

        Ok(Self { version, flags: data[7] })
    }

    /// Write the header to a writer
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.encode())?;
        Ok(())
    }

    /// Read the header from a reader
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; HEADER_SIZE];
        reader.read_exact(&mut buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => {
                Error::malformed_header("stream ended before the header was complete")
            }
            _ => Error::Io(e),
        })?;
        Self::decode(&buf)
    }
}
