// Integration tests for keystream record streams
// Write full streams through RecordWriter and read them back through RecordReader

use keystream::codec::{TAG_INT32_U8, TAG_MAP, TAG_STREAM_END};
use keystream::dictionary::{OP_KEY_REGISTER, OP_KEY_RESET};
use keystream::{
    read_records, write_records, CompressionType, Error, Map, Record, RecordReader, RecordWriter,
    StreamOptions, Value,
};
use std::io::Cursor;
use tempfile::TempDir;

fn record(pairs: &[(&str, Value)]) -> Record {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

fn sample_records(count: usize) -> Vec<Record> {
    (0..count)
        .map(|i| {
            let mut address = Map::new();
            address.insert("city".to_string(), Value::from(format!("city-{}", i % 7)));
            address.insert("zip".to_string(), Value::Int32(10_000 + i as i32));

            record(&[
                ("id", Value::Int64(i as i64)),
                ("name", Value::from(format!("user{:05}", i))),
                ("active", Value::Bool(i % 3 != 0)),
                ("score", Value::Float64(i as f64 * 0.5)),
                ("created", Value::Timestamp(1_700_000_000_000 + i as i64)),
                ("tags", Value::List(vec![Value::from("a"), Value::Int8(i as i8)])),
                ("address", Value::Map(address)),
                ("note", Value::Null),
            ])
        })
        .collect()
}

/// Test that a stream with no records is exactly header plus sentinel
#[test]
fn test_empty_stream_is_nine_bytes() {
    let none: Vec<Record> = Vec::new();
    let buf = write_records(Vec::new(), &none, StreamOptions::uncompressed()).unwrap();
    assert_eq!(buf.len(), 9);
    assert_eq!(buf[8], TAG_STREAM_END);

    assert!(read_records(Cursor::new(buf)).unwrap().is_empty());
}

/// Test three records with disjoint keys get ids 0, 1 and 2 in order
#[test]
fn test_three_record_stream() {
    let records = vec![
        record(&[("x", Value::Int32(1))]),
        record(&[("y", Value::Int32(2))]),
        record(&[("z", Value::Int32(3))]),
    ];

    let buf = write_records(Vec::new(), &records, StreamOptions::uncompressed()).unwrap();

    let mut expected = Vec::new();
    for (id, (name, v)) in [(b'x', 1u8), (b'y', 2), (b'z', 3)].into_iter().enumerate() {
        expected.extend_from_slice(&[OP_KEY_REGISTER, 0, 1, name]);
        expected.extend_from_slice(&[TAG_MAP, 0, 1, 0, id as u8, TAG_INT32_U8, v]);
    }
    expected.push(TAG_STREAM_END);
    assert_eq!(&buf[8..], &expected[..]);

    let decoded = read_records(Cursor::new(buf)).unwrap();
    assert_eq!(decoded, records);
}

/// Test repeated field names are registered exactly once per stream
#[test]
fn test_repeated_keys_registered_once() {
    let records = vec![
        record(&[("id", Value::Int32(1)), ("name", Value::from("a"))]),
        record(&[("id", Value::Int32(2)), ("name", Value::from("b"))]),
    ];

    let buf = write_records(Vec::new(), &records, StreamOptions::uncompressed()).unwrap();
    let registrations = buf.windows(4).filter(|w| w[0] == OP_KEY_REGISTER && w[1] == 0).count();
    assert_eq!(registrations, 2);

    assert_eq!(read_records(Cursor::new(buf)).unwrap(), records);
}

/// Test compressed and uncompressed streams carry the same records
#[cfg(feature = "gzip")]
#[test]
fn test_compression_transparency() {
    let records = sample_records(500);

    let plain = write_records(Vec::new(), &records, StreamOptions::uncompressed()).unwrap();
    let packed = write_records(Vec::new(), &records, StreamOptions::default()).unwrap();

    assert_eq!(plain[7], 0x00);
    assert_eq!(packed[7], 0x01);
    assert!(packed.len() < plain.len());

    assert_eq!(read_records(Cursor::new(plain)).unwrap(), records);
    assert_eq!(read_records(Cursor::new(packed)).unwrap(), records);
}

/// Test every compression level produces a readable stream
#[cfg(feature = "gzip")]
#[test]
fn test_compression_levels() {
    let records = sample_records(20);
    for level in [0, 1, 6, 9] {
        let options = StreamOptions::default().compression_level(level);
        let buf = write_records(Vec::new(), &records, options).unwrap();
        assert_eq!(read_records(Cursor::new(buf)).unwrap(), records, "level {}", level);
    }
}

/// Test file-backed streams
#[test]
fn test_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("records.ks");
    let records = sample_records(1000);

    let mut writer = RecordWriter::create(&path, StreamOptions::default()).unwrap();
    for r in &records {
        writer.write(r).unwrap();
    }
    assert_eq!(writer.records_written(), 1000);
    writer.close().unwrap();

    let reader = RecordReader::open_path(&path).unwrap();
    assert_eq!(reader.header().version, 1);
    let decoded: Vec<Record> = reader.collect::<Result<_, _>>().unwrap();
    assert_eq!(decoded, records);
}

/// Test a writer dropped without close still produces a complete stream
#[test]
fn test_drop_closes_stream() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dropped.ks");

    {
        let mut writer = RecordWriter::create(&path, StreamOptions::default()).unwrap();
        writer.write(&record(&[("k", Value::from("v"))])).unwrap();
    }

    let decoded = read_records(std::fs::File::open(&path).unwrap()).unwrap();
    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded[0]["k"], Value::from("v"));
}

/// Test a key reset in the middle of a stream is replayed by the reader
#[test]
fn test_reset_keys_mid_stream() {
    let mut writer = RecordWriter::with_options(Vec::new(), StreamOptions::uncompressed()).unwrap();
    writer.write(&record(&[("a", Value::Int32(1)), ("b", Value::Int32(2))])).unwrap();
    writer.reset_keys().unwrap();
    writer.write(&record(&[("b", Value::Int32(3))])).unwrap();
    let buf = writer.finish().unwrap();

    assert!(buf.contains(&OP_KEY_RESET));

    let mut reader = RecordReader::open(Cursor::new(buf)).unwrap();
    reader.next_record().unwrap().unwrap();
    assert_eq!(reader.key_count(), 2);

    // "b" now has id 0 in the new epoch
    let second = reader.next_record().unwrap().unwrap();
    assert_eq!(second, record(&[("b", Value::Int32(3))]));
    assert_eq!(reader.key_count(), 1);
    assert!(reader.next_record().unwrap().is_none());
}

/// Test a stream cut off before its sentinel keeps the complete records
#[test]
fn test_stream_without_sentinel() {
    let mut writer = RecordWriter::with_options(Vec::new(), StreamOptions::uncompressed()).unwrap();
    writer.write(&record(&[("n", Value::Int32(1))])).unwrap();
    writer.flush().unwrap();

    let buf = writer.finish().unwrap();
    let mut partial = buf.clone();
    partial.pop();

    // Without the sentinel the first record is intact, then input ends
    let mut reader = RecordReader::open(Cursor::new(partial)).unwrap();
    assert!(reader.next_record().unwrap().is_some());
    assert!(matches!(reader.next_record(), Err(Error::TruncatedInput)));
}

/// Test a truncated compressed stream fails instead of ending quietly
#[cfg(feature = "gzip")]
#[test]
fn test_truncated_compressed_stream() {
    let buf = write_records(Vec::new(), &sample_records(200), StreamOptions::default()).unwrap();
    let cut = &buf[..buf.len() / 2];

    let result: Result<Vec<Record>, Error> = RecordReader::open(cut).unwrap().collect();
    assert!(result.is_err());
}

/// Test the header is rejected before the payload is looked at
#[test]
fn test_header_errors() {
    let mut buf = write_records(Vec::new(), &sample_records(1), StreamOptions::uncompressed()).unwrap();

    buf[6] = 7;
    assert!(matches!(RecordReader::open(Cursor::new(&buf)), Err(Error::UnsupportedVersion(7))));

    buf[0] = 0x00;
    assert!(matches!(RecordReader::open(Cursor::new(&buf)), Err(Error::MalformedHeader(_))));

    assert!(matches!(RecordReader::open(Cursor::new(Vec::new())), Err(Error::MalformedHeader(_))));
}

/// Test an unknown tag aborts the stream and the reader stays fused
#[test]
fn test_unknown_tag_is_fatal() {
    let mut buf = write_records(
        Vec::new(),
        &[record(&[("a", Value::Null)]), record(&[("a", Value::Null)])],
        StreamOptions::uncompressed(),
    )
    .unwrap();

    // Corrupt the tag of the second map
    let second_map = buf.iter().rposition(|&b| b == TAG_MAP).unwrap();
    buf[second_map] = 0x42;

    let mut reader = RecordReader::open(Cursor::new(buf)).unwrap();
    assert!(reader.next().unwrap().is_ok());
    assert!(matches!(reader.next(), Some(Err(Error::UnknownTag(0x42)))));
    assert!(reader.next().is_none());
}

/// Test stream options survive a serde round trip
#[test]
fn test_options_from_json() {
    let options: StreamOptions =
        serde_json::from_str(r#"{"compression": "None", "buffer_size": 4096}"#).unwrap();
    assert_eq!(options.compression, CompressionType::None);
    assert_eq!(options.buffer_size, 4096);
    assert!(!options.auto_reset_keys);

    let buf = write_records(Vec::new(), &sample_records(3), options).unwrap();
    assert_eq!(read_records(Cursor::new(buf)).unwrap().len(), 3);
}

/// Test streams can be handed to other threads, one owner at a time
#[test]
fn test_streams_move_across_threads() {
    let records = sample_records(100);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let records = records.clone();
            std::thread::spawn(move || {
                let mut writer = RecordWriter::new(Vec::new()).unwrap();
                writer.write_all(&records).unwrap();
                writer.finish().unwrap()
            })
        })
        .collect();

    for handle in handles {
        let buf = handle.join().unwrap();
        let reader = RecordReader::open(Cursor::new(buf)).unwrap();
        let decoded = std::thread::spawn(move || reader.collect::<Result<Vec<_>, _>>().unwrap())
            .join()
            .unwrap();
        assert_eq!(decoded, records);
    }
}
