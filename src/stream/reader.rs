//! Record stream reader.

use super::header::Header;
use crate::codec::Decoder;
use crate::config::DEFAULT_BUFFER_SIZE;
use crate::dictionary::StreamingKeyDictionary;
use crate::error::{Error, Result};
use crate::value::{Record, Value};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

#[cfg(feature = "gzip")]
use flate2::bufread::GzDecoder;

/// Byte source behind the header.
enum Source<R: Read> {
    Plain(BufReader<R>),
    #[cfg(feature = "gzip")]
    Gzip(GzDecoder<BufReader<R>>),
}

impl<R: Read> Source<R> {
    fn open(inner: BufReader<R>, header: &Header) -> Result<Self> {
        if !header.is_compressed() {
            return Ok(Source::Plain(inner));
        }

        #[cfg(feature = "gzip")]
        return Ok(Source::Gzip(GzDecoder::new(inner)));

        #[cfg(not(feature = "gzip"))]
        Err(Error::Unsupported(
            "stream is compressed but the `gzip` feature is disabled".to_string(),
        ))
    }
}

impl<R: Read> Read for Source<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Source::Plain(r) => r.read(buf),
            #[cfg(feature = "gzip")]
            Source::Gzip(r) => r.read(buf),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    /// End sentinel reached or closed by the caller
    Ended,
    /// A read failed; nothing past it can be trusted
    Failed,
}

/// Reads records back from a stream written by
/// [`RecordWriter`](super::RecordWriter).
///
/// The header is verified when the reader is opened, before any payload
/// byte is touched. Records are then decoded lazily, one per call. The
/// reader is also an [`Iterator`] over `Result<Record>`; after the first
/// error it yields nothing more.
pub struct RecordReader<R: Read> {
    /// Open source. `None` once the stream has ended, failed or been closed.
    source: Option<Source<R>>,
    decoder: Decoder<StreamingKeyDictionary>,
    header: Header,
    /// Record fetched by `has_next` and not yet handed out
    peeked: Option<Record>,
    state: State,
    /// Number of records decoded
    records: u64,
}

impl<R: Read> RecordReader<R> {
    /// Open a stream on `inner`, reading and verifying its header.
    pub fn open(inner: R) -> Result<Self> {
        Self::with_buffer_size(inner, DEFAULT_BUFFER_SIZE)
    }

    /// Like [`open`](Self::open), with an explicit read buffer size.
    pub fn with_buffer_size(inner: R, buffer_size: usize) -> Result<Self> {
        if buffer_size == 0 {
            return Err(Error::invalid_argument("buffer_size must be > 0"));
        }

        let mut buffered = BufReader::with_capacity(buffer_size, inner);
        let header = Header::read_from(&mut buffered)?;
        let source = Source::open(buffered, &header)?;

        log::debug!(
            "Opened record stream (version {}, compressed: {})",
            header.version,
            header.is_compressed()
        );

        Ok(Self {
            source: Some(source),
            decoder: Decoder::default(),
            header,
            peeked: None,
            state: State::Open,
            records: 0,
        })
    }

    /// The verified stream header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Returns true if another record is available.
    ///
    /// This may decode the next record ahead of time; it is handed out by
    /// the following [`next_record`](Self::next_record).
    pub fn has_next(&mut self) -> Result<bool> {
        if self.peeked.is_some() {
            return Ok(true);
        }

        match self.fetch()? {
            Some(record) => {
                self.peeked = Some(record);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Read the next record.
    ///
    /// Returns `Ok(None)` once the end sentinel has been read, and on every
    /// call after that.
    pub fn next_record(&mut self) -> Result<Option<Record>> {
        if let Some(record) = self.peeked.take() {
            return Ok(Some(record));
        }
        self.fetch()
    }

    /// Read every remaining record.
    pub fn read_all(&mut self) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        while let Some(record) = self.next_record()? {
            records.push(record);
        }
        Ok(records)
    }

    /// Number of records decoded so far.
    pub fn records_read(&self) -> u64 {
        self.records
    }

    /// Number of keys in the current dictionary epoch.
    pub fn key_count(&self) -> usize {
        self.decoder.key_count()
    }

    /// Returns true once the source has been released: the end sentinel
    /// was read, a read failed, or the reader was closed.
    pub fn is_closed(&self) -> bool {
        self.source.is_none()
    }

    /// Release the source. Later reads return `Ok(None)`.
    ///
    /// Closing an already closed reader is a no-op.
    pub fn close(&mut self) {
        if self.source.take().is_some() {
            log::debug!("Closed record stream after {} records", self.records);
        }
        self.peeked = None;
        if self.state == State::Open {
            self.state = State::Ended;
        }
    }

    fn fetch(&mut self) -> Result<Option<Record>> {
        if self.state != State::Open {
            return Ok(None);
        }
        let source = match self.source.as_mut() {
            Some(source) => source,
            None => return Ok(None),
        };

        match self.decoder.decode(source) {
            Ok(Some(Value::Map(record))) => {
                self.records += 1;
                Ok(Some(record))
            }
            Ok(Some(other)) => self.fail(Error::corruption(format!(
                "top-level value of kind {:?} is not a record",
                other.kind()
            ))),
            Ok(None) => {
                self.close();
                Ok(None)
            }
            Err(e) => self.fail(e),
        }
    }

    fn fail(&mut self, error: Error) -> Result<Option<Record>> {
        log::debug!("Record stream failed after {} records: {}", self.records, error);
        self.state = State::Failed;
        self.source = None;
        Err(error)
    }
}

impl RecordReader<File> {
    /// Open a file and read its header.
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::open(file)
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

impl<R: Read> std::iter::FusedIterator for RecordReader<R> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{TAG_INT32_U8, TAG_MAP, TAG_STREAM_END};
    use crate::config::{CompressionType, StreamOptions};
    use crate::dictionary::OP_KEY_REGISTER;
    use crate::stream::RecordWriter;
    use std::io::Cursor;

    fn plain_stream(payload: &[u8]) -> Vec<u8> {
        let mut buf = Header::new(CompressionType::None).encode().to_vec();
        buf.extend_from_slice(payload);
        buf
    }

    #[test]
    fn test_read_empty_stream() {
        let mut reader = RecordReader::open(Cursor::new(plain_stream(&[TAG_STREAM_END]))).unwrap();
        assert!(!reader.has_next().unwrap());
        assert!(reader.next_record().unwrap().is_none());
        assert!(reader.is_closed());
    }

    #[test]
    fn test_read_handwritten_record() {
        let payload = [
            OP_KEY_REGISTER, 0, 1, b'n',
            TAG_MAP, 0, 1, 0, 0, TAG_INT32_U8, 42,
            TAG_STREAM_END,
        ];
        let mut reader = RecordReader::open(Cursor::new(plain_stream(&payload))).unwrap();

        let record = reader.next_record().unwrap().unwrap();
        assert_eq!(record.get("n"), Some(&Value::Int32(42)));
        assert_eq!(reader.key_count(), 1);
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn test_has_next_does_not_skip() {
        let mut writer =
            RecordWriter::with_options(Vec::new(), StreamOptions::uncompressed()).unwrap();
        for i in 0..3 {
            let record: Record = [("i".to_string(), Value::Int32(i))].into_iter().collect();
            writer.write(&record).unwrap();
        }
        let buf = writer.finish().unwrap();

        let mut reader = RecordReader::open(Cursor::new(buf)).unwrap();
        assert!(reader.has_next().unwrap());
        assert!(reader.has_next().unwrap());

        let ids: Vec<_> = reader.map(|r| r.unwrap()["i"].clone()).collect();
        assert_eq!(ids, vec![Value::Int32(0), Value::Int32(1), Value::Int32(2)]);
    }

    #[test]
    fn test_missing_sentinel_is_truncation() {
        let payload = [TAG_MAP, 0, 0];
        let mut reader = RecordReader::open(Cursor::new(plain_stream(&payload))).unwrap();

        assert!(reader.next_record().unwrap().is_some());
        assert!(matches!(reader.next_record(), Err(Error::TruncatedInput)));
        // Fused after the error
        assert!(reader.next_record().unwrap().is_none());
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_top_level_scalar_is_corruption() {
        let payload = [TAG_INT32_U8, 1, TAG_STREAM_END];
        let mut reader = RecordReader::open(Cursor::new(plain_stream(&payload))).unwrap();
        assert!(matches!(reader.next_record(), Err(Error::Corruption(_))));

        // The failed reader has released its source
        assert!(reader.is_closed());
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn test_bad_header() {
        let mut buf = plain_stream(&[TAG_STREAM_END]);
        buf[6] = 2;
        assert!(matches!(
            RecordReader::open(Cursor::new(buf)),
            Err(Error::UnsupportedVersion(2))
        ));

        assert!(matches!(
            RecordReader::open(Cursor::new(b"{\"json\": true}".to_vec())),
            Err(Error::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut reader = RecordReader::open(Cursor::new(plain_stream(&[TAG_MAP, 0, 0]))).unwrap();
        reader.close();
        reader.close();
        assert!(reader.is_closed());
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn test_zero_buffer_size() {
        let buf = plain_stream(&[TAG_STREAM_END]);
        assert!(RecordReader::with_buffer_size(Cursor::new(buf), 0).is_err());
    }
}
