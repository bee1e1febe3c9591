//! Record stream framing.
//!
//! A record stream is one self-describing byte sequence:
//!
//! ```text
//! +--------------------+
//! | Header (8 bytes)   |  magic, version, flags; never compressed
//! +--------------------+
//! | Payload            |  gzip compressed if flags bit 0 is set
//! |   record 1         |  each record: control ops, then one map value
//! |   record 2         |
//! |   ...              |
//! |   0xFF             |  end sentinel
//! +--------------------+
//! ```
//!
//! Key registrations and resets travel inside the payload, so a reader
//! needs nothing but the bytes to rebuild every record.

pub mod header;
mod reader;
mod writer;

pub use header::{Header, FLAG_COMPRESSED, FORMAT_VERSION, HEADER_SIZE, MAGIC};
pub use reader::RecordReader;
pub use writer::RecordWriter;

use crate::config::StreamOptions;
use crate::error::Result;
use crate::value::Record;
use std::io::{Read, Write};

/// Write `records` as one complete stream and return the sink.
pub fn write_records<'a, W, I>(sink: W, records: I, options: StreamOptions) -> Result<W>
where
    W: Write,
    I: IntoIterator<Item = &'a Record>,
{
    let mut writer = RecordWriter::with_options(sink, options)?;
    writer.write_all(records)?;
    writer.finish()
}

/// Read every record of a complete stream.
pub fn read_records<R: Read>(source: R) -> Result<Vec<Record>> {
    RecordReader::open(source)?.read_all()
}
