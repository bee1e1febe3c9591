//! Configuration options for keystream record streams.

use serde::{Deserialize, Serialize};

/// Default read-ahead / write-behind block size.
pub const DEFAULT_BUFFER_SIZE: usize = 16 * 1024;

/// Default deflate level used when compression is enabled.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Configuration options for opening a record stream for writing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamOptions {
    /// Compression applied to the payload after the header.
    /// Default: CompressionType::Gzip (CompressionType::None without the `gzip` feature)
    pub compression: CompressionType,

    /// Deflate level (0-9). Ignored for uncompressed streams.
    /// Default: 6
    pub compression_level: u32,

    /// Size of the buffer placed between the codec and the sink or source.
    /// Default: 16KB
    pub buffer_size: usize,

    /// Emit a key reset instead of failing when a record would overflow the
    /// key dictionary.
    /// Default: false
    pub auto_reset_keys: bool,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            compression: CompressionType::default(),
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            buffer_size: DEFAULT_BUFFER_SIZE,
            auto_reset_keys: false,
        }
    }
}

/// Compression algorithms supported for the stream payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum CompressionType {
    /// No compression.
    None = 0,

    /// Gzip (deflate) compression of everything after the header.
    Gzip = 1,
}

impl CompressionType {
    /// Returns true if the payload is compressed.
    pub fn is_compressed(self) -> bool {
        self != CompressionType::None
    }
}

impl Default for CompressionType {
    fn default() -> Self {
        #[cfg(feature = "gzip")]
        return CompressionType::Gzip;

        #[cfg(not(feature = "gzip"))]
        CompressionType::None
    }
}

impl StreamOptions {
    /// Creates a new StreamOptions with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for options producing an uncompressed stream.
    pub fn uncompressed() -> Self {
        Self::default().compression(CompressionType::None)
    }

    /// Sets the compression algorithm.
    pub fn compression(mut self, compression: CompressionType) -> Self {
        self.compression = compression;
        self
    }

    /// Sets the deflate level.
    pub fn compression_level(mut self, level: u32) -> Self {
        self.compression_level = level;
        self
    }

    /// Sets the I/O buffer size.
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Enables or disables automatic key dictionary resets.
    pub fn auto_reset_keys(mut self, value: bool) -> Self {
        self.auto_reset_keys = value;
        self
    }

    /// Validates the options and returns an error if any are invalid.
    pub fn validate(&self) -> crate::Result<()> {
        if self.buffer_size == 0 {
            return Err(crate::Error::invalid_argument("buffer_size must be > 0"));
        }
        if self.compression_level > 9 {
            return Err(crate::Error::invalid_argument("compression_level must be between 0 and 9"));
        }
        if !cfg!(feature = "gzip") && self.compression.is_compressed() {
            return Err(crate::Error::Unsupported(
                "compression requires the `gzip` feature".to_string(),
            ));
        }
        Ok(())
    }
}
