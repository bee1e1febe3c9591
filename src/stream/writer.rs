//! Record stream writer.

use super::header::Header;
use crate::codec::{Encoder, TAG_STREAM_END};
use crate::config::{CompressionType, StreamOptions};
use crate::dictionary::{KeyDictionary, StreamingKeyDictionary};
use crate::error::{Error, Result};
use crate::value::{Map, Record, Value};
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

#[cfg(feature = "gzip")]
use flate2::{write::GzEncoder, Compression};

/// Byte sink behind the header: either the buffered output itself or a
/// gzip encoder wrapping it.
enum Sink<W: Write> {
    Plain(BufWriter<W>),
    #[cfg(feature = "gzip")]
    Gzip(GzEncoder<BufWriter<W>>),
}

impl<W: Write> Sink<W> {
    fn open(inner: BufWriter<W>, options: &StreamOptions) -> Result<Self> {
        match options.compression {
            CompressionType::None => Ok(Sink::Plain(inner)),
            #[cfg(feature = "gzip")]
            CompressionType::Gzip => {
                let level = Compression::new(options.compression_level);
                Ok(Sink::Gzip(GzEncoder::new(inner, level)))
            }
            #[cfg(not(feature = "gzip"))]
            CompressionType::Gzip => Err(Error::Unsupported(
                "compression requires the `gzip` feature".to_string(),
            )),
        }
    }

    /// Finish compression, flush and hand back the underlying writer.
    fn finish(self) -> io::Result<W> {
        let buffered = match self {
            Sink::Plain(buffered) => buffered,
            #[cfg(feature = "gzip")]
            Sink::Gzip(encoder) => encoder.finish()?,
        };
        buffered.into_inner().map_err(io::IntoInnerError::into_error)
    }
}

impl<W: Write> Write for Sink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Plain(w) => w.write(buf),
            #[cfg(feature = "gzip")]
            Sink::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Plain(w) => w.flush(),
            #[cfg(feature = "gzip")]
            Sink::Gzip(w) => w.flush(),
        }
    }
}

/// Writes records to a byte sink as one self-describing stream.
///
/// The header is written when the writer is created. Each record is
/// encoded into a scratch buffer first, so a record that fails to encode
/// leaves no bytes and no key registrations behind; the stream stays
/// usable. A failure of the sink itself may leave part of a record behind,
/// so the writer is then marked failed and refuses further writes.
/// [`close`](Self::close) writes the end sentinel and finishes
/// compression; a writer dropped without closing tries to do the same.
pub struct RecordWriter<W: Write> {
    /// Open sink. `None` once the stream is closed.
    sink: Option<Sink<W>>,
    /// Encoder owning the stream's key dictionary
    encoder: Encoder<StreamingKeyDictionary>,
    /// Reused per-record buffer
    scratch: Vec<u8>,
    options: StreamOptions,
    /// Number of records written
    records: u64,
    /// Set when the sink failed mid-stream
    failed: bool,
}

impl<W: Write> RecordWriter<W> {
    /// Start a stream on `inner` with default options.
    pub fn new(inner: W) -> Result<Self> {
        Self::with_options(inner, StreamOptions::default())
    }

    /// Start a stream on `inner`, writing the header immediately.
    pub fn with_options(inner: W, options: StreamOptions) -> Result<Self> {
        options.validate()?;

        let header = Header::new(options.compression);
        let mut buffered = BufWriter::with_capacity(options.buffer_size, inner);
        header.write_to(&mut buffered)?;
        let sink = Sink::open(buffered, &options)?;

        log::debug!(
            "Started record stream (version {}, compression {:?})",
            header.version,
            options.compression
        );

        Ok(Self {
            sink: Some(sink),
            encoder: Encoder::default(),
            scratch: Vec::new(),
            options,
            records: 0,
            failed: false,
        })
    }

    /// Append one record.
    ///
    /// With `auto_reset_keys` enabled, a record whose new keys would not fit
    /// the dictionary is preceded by a key reset instead of failing.
    pub fn write(&mut self, record: &Record) -> Result<()> {
        self.check_open()?;

        if self.options.auto_reset_keys && self.would_overflow(record) {
            self.reset_keys()?;
        }

        self.scratch.clear();
        let mark = self.encoder.key_count();
        if let Err(e) = self.encoder.encode_map(record, &mut self.scratch) {
            self.encoder.dictionary_mut().rollback(mark);
            return Err(e);
        }

        let sink = self.sink.as_mut().ok_or_else(closed)?;
        if let Err(e) = sink.write_all(&self.scratch) {
            // The registrations in the scratch buffer may not have reached the stream
            self.encoder.dictionary_mut().rollback(mark);
            return Err(self.fail(e.into()));
        }
        self.records += 1;
        Ok(())
    }

    /// Append every record from an iterator.
    pub fn write_all<'a, I>(&mut self, records: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Record>,
    {
        for record in records {
            self.write(record)?;
        }
        Ok(())
    }

    /// Write a key reset to the stream and clear the dictionary.
    pub fn reset_keys(&mut self) -> Result<()> {
        self.check_open()?;
        let sink = self.sink.as_mut().ok_or_else(closed)?;
        if let Err(e) = self.encoder.reset_keys(sink) {
            return Err(self.fail(e));
        }
        Ok(())
    }

    /// Flush buffered bytes to the underlying writer.
    ///
    /// For compressed streams this performs a sync flush of the deflate
    /// state, so everything written so far becomes decodable.
    pub fn flush(&mut self) -> Result<()> {
        let sink = self.sink.as_mut().ok_or_else(closed)?;
        sink.flush()?;
        Ok(())
    }

    /// Number of records written so far.
    pub fn records_written(&self) -> u64 {
        self.records
    }

    /// Number of keys in the current dictionary epoch.
    pub fn key_count(&self) -> usize {
        self.encoder.key_count()
    }

    /// The options the stream was opened with.
    pub fn options(&self) -> &StreamOptions {
        &self.options
    }

    /// Returns true once the stream has been closed.
    pub fn is_closed(&self) -> bool {
        self.sink.is_none()
    }

    /// Returns true if the sink failed and the stream was abandoned.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Write the end sentinel and finish the stream.
    ///
    /// Closing an already closed writer is a no-op. A failed writer only
    /// releases its sink; no sentinel is written after a partial record.
    pub fn close(&mut self) -> Result<()> {
        self.finish_sink().map(|_| ())
    }

    /// Close the stream and return the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.finish_sink()?
            .ok_or_else(|| Error::invalid_state("record stream already closed or failed"))
    }

    fn check_open(&self) -> Result<()> {
        if self.failed {
            return Err(Error::invalid_state("write to a failed record stream"));
        }
        if self.sink.is_none() {
            return Err(Error::invalid_state("write to a closed record stream"));
        }
        Ok(())
    }

    fn fail(&mut self, error: Error) -> Error {
        log::warn!("Record stream failed after {} records: {}", self.records, error);
        self.failed = true;
        error
    }

    fn finish_sink(&mut self) -> Result<Option<W>> {
        let Some(mut sink) = self.sink.take() else {
            return Ok(None);
        };
        if self.failed {
            return Ok(None);
        }

        sink.write_all(&[TAG_STREAM_END])?;
        let inner = sink.finish()?;

        log::info!(
            "Closed record stream after {} records ({} keys in last epoch)",
            self.records,
            self.encoder.key_count()
        );
        Ok(Some(inner))
    }

    /// Check whether the keys `record` would register exceed the space left
    /// in the dictionary.
    fn would_overflow(&self, record: &Record) -> bool {
        let dictionary = self.encoder.dictionary();
        let mut fresh = HashSet::new();
        collect_new_keys(record, dictionary, &mut fresh);
        fresh.len() > dictionary.remaining()
    }
}

impl RecordWriter<File> {
    /// Create (or truncate) a file and start a stream in it.
    pub fn create<P: AsRef<Path>>(path: P, options: StreamOptions) -> Result<Self> {
        let file = File::create(path)?;
        Self::with_options(file, options)
    }
}

impl<W: Write> Drop for RecordWriter<W> {
    fn drop(&mut self) {
        // Best effort close on drop
        if let Err(e) = self.close() {
            log::warn!("Failed to close record stream on drop: {}", e);
        }
    }
}

fn closed() -> Error {
    Error::invalid_state("record stream is closed")
}

fn collect_new_keys<'a>(
    map: &'a Map,
    dictionary: &StreamingKeyDictionary,
    fresh: &mut HashSet<&'a str>,
) {
    for (key, value) in map {
        if dictionary.id_of(key).is_none() {
            fresh.insert(key.as_str());
        }
        collect_nested_keys(value, dictionary, fresh);
    }
}

fn collect_nested_keys<'a>(
    value: &'a Value,
    dictionary: &StreamingKeyDictionary,
    fresh: &mut HashSet<&'a str>,
) {
    match value {
        Value::Map(map) => collect_new_keys(map, dictionary, fresh),
        Value::List(items) => {
            for item in items {
                collect_nested_keys(item, dictionary, fresh);
            }
        }
        _ => {}
    }
}
