//! # keystream - Compact Binary Record Streams
//!
//! keystream serializes tree-shaped values (maps, lists, text, numbers,
//! booleans, timestamps) into a compact tagged binary format. Map field
//! names are never repeated on the wire: each distinct name is registered
//! once in a key dictionary and referenced by a 16-bit id afterwards.
//!
//! ## Architecture
//!
//! - **Codec**: tagged encoding and decoding of single [`Value`] trees
//! - **Dictionary**: field name <-> id mapping, either synchronized inline
//!   through the stream or stored as a separate table block
//! - **String cache**: optional 256-slot cache of one-byte string ids
//! - **Stream**: header, optional gzip payload, sequence of records and an
//!   end sentinel
//!
//! ## Example Usage
//!
//! ```rust
//! use keystream::{Record, RecordReader, RecordWriter, StreamOptions, Value};
//!
//! # fn main() -> Result<(), keystream::Error> {
//! let mut record = Record::new();
//! record.insert("id".to_string(), Value::Int64(1));
//! record.insert("name".to_string(), Value::from("alice"));
//!
//! // Write a stream
//! let mut writer = RecordWriter::with_options(Vec::new(), StreamOptions::default())?;
//! writer.write(&record)?;
//! let bytes = writer.finish()?;
//!
//! // Read it back
//! let mut reader = RecordReader::open(bytes.as_slice())?;
//! while let Some(decoded) = reader.next_record()? {
//!     assert_eq!(decoded, record);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Module declarations
pub mod cache;
pub mod codec;
pub mod config;
pub mod dictionary;
pub mod error;
pub mod stream;
pub mod value;

// Re-exports
pub use codec::{Decoder, Encoder};
pub use config::{CompressionType, StreamOptions};
pub use dictionary::{KeyDictionary, StreamingKeyDictionary, TableKeyDictionary};
pub use error::{Error, Result};
pub use stream::{read_records, write_records, Header, RecordReader, RecordWriter};
pub use value::{Map, Record, Value, ValueKind};
