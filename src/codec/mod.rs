//! Tagged binary value encoding.
//!
//! Every encoded value starts with a one-byte tag followed by a fixed or
//! length-prefixed payload. All multi-byte numbers are big-endian.
//!
//! ## Tag table
//!
//! ```text
//! 0x00 null            0x07 timestamp (i64 millis)   0x0C int32 as u8
//! 0x01 text  (u16 len) 0x08 float32                  0x0D int32 as u16
//! 0x02 map             0x09 int16                    'T'  true
//! 0x03 list  (i32 len) 0x0A int8                     'F'  false
//! 0x04 int32           0x0B long text (i32 len)      0xFF stream end
//! 0x05 int64
//! 0x06 float64
//! ```
//!
//! A map is written as `[0x02][count: u16][key ids: u16 * count][values]`.
//! Key ids are resolved through a [`KeyDictionary`](crate::dictionary::KeyDictionary),
//! which may interleave control operations (`0xF1`-`0xF3`) ahead of the tag.

pub mod decoder;
pub mod encoder;

pub use decoder::Decoder;
pub use encoder::Encoder;

use crate::error::{Error, Result};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Null
pub const TAG_NULL: u8 = 0x00;
/// Text with a 16-bit length prefix
pub const TAG_TEXT: u8 = 0x01;
/// Keyed map
pub const TAG_MAP: u8 = 0x02;
/// List with a 32-bit signed length prefix
pub const TAG_LIST: u8 = 0x03;
/// 32-bit signed integer
pub const TAG_INT32: u8 = 0x04;
/// 64-bit signed integer
pub const TAG_INT64: u8 = 0x05;
/// 64-bit float
pub const TAG_FLOAT64: u8 = 0x06;
/// Timestamp as i64 milliseconds since the epoch
pub const TAG_TIMESTAMP: u8 = 0x07;
/// 32-bit float
pub const TAG_FLOAT32: u8 = 0x08;
/// 16-bit signed integer
pub const TAG_INT16: u8 = 0x09;
/// 8-bit signed integer
pub const TAG_INT8: u8 = 0x0A;
/// Text with a 32-bit signed length prefix
pub const TAG_LONG_TEXT: u8 = 0x0B;
/// 32-bit integer in 0..=255, one payload byte
pub const TAG_INT32_U8: u8 = 0x0C;
/// 32-bit integer in 0..=65535, two payload bytes
pub const TAG_INT32_U16: u8 = 0x0D;
/// Boolean true
pub const TAG_TRUE: u8 = b'T';
/// Boolean false
pub const TAG_FALSE: u8 = b'F';
/// End of a framed value sequence
pub const TAG_STREAM_END: u8 = 0xFF;

/// Longest text, in encoded bytes, written with [`TAG_TEXT`].
pub const MAX_SHORT_TEXT_LEN: usize = i16::MAX as usize;

/// Writes the u16 byte length and the UTF-8 bytes of `text`, without a tag.
///
/// This is the payload format shared by short text values and by every
/// registration control operation.
pub fn write_short_text<W: Write + ?Sized>(out: &mut W, text: &str) -> Result<()> {
    check_short_text(text)?;
    out.write_u16::<BigEndian>(text.len() as u16)?;
    out.write_all(text.as_bytes())?;
    Ok(())
}

/// Fails with `CapacityExceeded` if `text` does not fit the short form.
pub fn check_short_text(text: &str) -> Result<()> {
    if text.len() > MAX_SHORT_TEXT_LEN {
        return Err(Error::capacity(format!(
            "short text of {} bytes exceeds {} bytes",
            text.len(),
            MAX_SHORT_TEXT_LEN
        )));
    }
    Ok(())
}

/// Reads a u16 length-prefixed UTF-8 payload written by [`write_short_text`].
pub fn read_short_text<R: Read + ?Sized>(input: &mut R) -> Result<String> {
    let len = input.read_u16::<BigEndian>()? as usize;
    let mut buf = vec![0u8; len];
    input.read_exact(&mut buf)?;
    into_utf8(buf)
}

/// Reads an i32 length-prefixed UTF-8 payload.
pub(crate) fn read_long_text<R: Read + ?Sized>(input: &mut R) -> Result<String> {
    let len = input.read_i32::<BigEndian>()?;
    if len < 0 {
        return Err(Error::corruption(format!("negative text length {}", len)));
    }

    // Grow with the data actually present instead of trusting the prefix
    let mut buf = Vec::new();
    let read = (&mut *input).take(len as u64).read_to_end(&mut buf)?;
    if read != len as usize {
        return Err(Error::TruncatedInput);
    }
    into_utf8(buf)
}

fn into_utf8(buf: Vec<u8>) -> Result<String> {
    String::from_utf8(buf).map_err(|e| Error::corruption(format!("invalid UTF-8 in text: {}", e)))
}
