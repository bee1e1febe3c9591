//! Error types for keystream.

use std::io;
use thiserror::Error;

/// The result type used throughout keystream.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for keystream operations.
///
/// Every decoding error is fatal for the stream it was raised on: once the
/// byte alignment or the dictionary state is in doubt, nothing read past
/// that point can be trusted.
#[derive(Debug, Error)]
pub enum Error {
    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(io::Error),

    /// The stream header is not in the expected format.
    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    /// The stream was written with a format version this reader cannot handle.
    #[error("Unsupported format version: {0}")]
    UnsupportedVersion(u8),

    /// A tag byte did not match any value kind or control operation.
    #[error("Unknown tag 0x{0:02X}")]
    UnknownTag(u8),

    /// A dictionary is full, or a value is too large for its length field.
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// A key id was referenced before it was registered in the current epoch.
    #[error("Unknown key id {0}")]
    UnknownKey(u16),

    /// A string cache slot was referenced before it was registered.
    #[error("Unknown string id {0}")]
    UnknownStringId(u8),

    /// The input ended in the middle of a header or value.
    #[error("Truncated input")]
    TruncatedInput,

    /// The payload is structurally invalid.
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// An invalid argument was provided.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The stream is in a state that does not allow the operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The stream requires a feature that was not compiled in.
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl Error {
    /// Creates a new corruption error.
    pub fn corruption(msg: impl Into<String>) -> Self {
        Error::Corruption(msg.into())
    }

    /// Creates a new capacity error.
    pub fn capacity(msg: impl Into<String>) -> Self {
        Error::CapacityExceeded(msg.into())
    }

    /// Creates a new malformed header error.
    pub fn malformed_header(msg: impl Into<String>) -> Self {
        Error::MalformedHeader(msg.into())
    }

    /// Creates a new invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Creates a new invalid state error.
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => Error::TruncatedInput,
            _ => Error::Io(err),
        }
    }
}
