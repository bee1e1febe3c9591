// Key dictionary and string cache tests through the public codec API

use keystream::cache::OP_STRING_REGISTER;
use keystream::dictionary::{MAX_KEYS, OP_KEY_REGISTER};
use keystream::{
    Decoder, Encoder, Error, KeyDictionary, Map, StreamingKeyDictionary, TableKeyDictionary, Value,
};
use std::io::Cursor;

fn object(pairs: &[(&str, Value)]) -> Value {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

/// Test the batch workflow: encode values, then store the key table apart
#[test]
fn test_table_dictionary_batch() {
    let values: Vec<Value> = (0..50)
        .map(|i| {
            object(&[
                ("sku", Value::from(format!("SKU-{:04}", i))),
                ("qty", Value::Int32(i)),
                ("meta", object(&[("warehouse", Value::Int16(3))])),
            ])
        })
        .collect();

    let mut encoder = Encoder::new(TableKeyDictionary::new());
    let mut body = Vec::new();
    for value in &values {
        encoder.encode(value, &mut body).unwrap();
    }
    assert!(!body.contains(&OP_KEY_REGISTER));

    let mut table = Vec::new();
    encoder.dictionary().serialize(&mut table).unwrap();
    assert_eq!(encoder.dictionary().keys(), &["sku", "qty", "meta", "warehouse"]);

    let dictionary = TableKeyDictionary::from_reader(&mut Cursor::new(table)).unwrap();
    let mut decoder = Decoder::new(dictionary);
    let mut cursor = Cursor::new(body);
    for expected in &values {
        assert_eq!(decoder.decode(&mut cursor).unwrap().as_ref(), Some(expected));
    }
}

/// Test that a table-encoded body cannot be read without its table
#[test]
fn test_table_body_without_table() {
    let mut encoder = Encoder::new(TableKeyDictionary::new());
    let body = encoder.encode_to_bytes(&object(&[("k", Value::Null)])).unwrap();

    let mut decoder = Decoder::new(TableKeyDictionary::new());
    assert!(matches!(decoder.decode_bytes(&body), Err(Error::UnknownKey(0))));
}

/// Test that a streaming decoder must see the registration of every key it reads
#[test]
fn test_streaming_decoder_joining_late() {
    let mut encoder = Encoder::default();
    let mut first = Vec::new();
    encoder.encode(&object(&[("a", Value::Int8(1))]), &mut first).unwrap();
    let mut second = Vec::new();
    encoder.encode(&object(&[("a", Value::Int8(2))]), &mut second).unwrap();

    // The second value alone carries no registration for "a"
    let mut late = Decoder::default();
    assert!(matches!(late.decode_bytes(&second), Err(Error::UnknownKey(0))));

    let mut decoder = Decoder::default();
    decoder.decode_bytes(&first).unwrap();
    assert_eq!(decoder.decode_bytes(&second).unwrap(), Some(object(&[("a", Value::Int8(2))])));
}

/// Test encoder and decoder dictionaries agree after a long mixed workload
#[test]
fn test_dictionaries_stay_in_sync() {
    let mut encoder = Encoder::default();
    let mut buf = Vec::new();

    for i in 0..2000 {
        let mut map = Map::new();
        map.insert(format!("field{}", i % 300), Value::Int32(i));
        map.insert("common".to_string(), Value::Bool(true));
        encoder.encode(&Value::Map(map), &mut buf).unwrap();
        if i == 1000 {
            encoder.reset_keys(&mut buf).unwrap();
        }
    }

    let mut decoder = Decoder::default();
    let mut cursor = Cursor::new(buf);
    for _ in 0..2000 {
        decoder.decode(&mut cursor).unwrap().unwrap();
    }

    assert_eq!(encoder.key_count(), decoder.key_count());
    assert_eq!(encoder.dictionary().keys(), decoder.dictionary().keys());
}

/// Test the 65537th key fails and a reset makes room again
#[test]
fn test_key_capacity_limit() {
    let mut dictionary = StreamingKeyDictionary::new();
    let mut sink = std::io::sink();

    for i in 0..MAX_KEYS {
        assert_eq!(dictionary.key_id(&format!("key{}", i), &mut sink).unwrap() as usize, i);
    }
    assert!(matches!(
        dictionary.key_id("overflow", &mut sink),
        Err(Error::CapacityExceeded(_))
    ));

    // Existing keys still resolve while full
    assert_eq!(dictionary.key_id("key65535", &mut sink).unwrap(), 65535);

    dictionary.reset(Some(&mut sink)).unwrap();
    assert_eq!(dictionary.key_id("overflow", &mut sink).unwrap(), 0);
}

/// Test string registrations are replayed by the decoder, including eviction
#[test]
fn test_string_cache_mirrored_by_decoder() {
    let mut encoder = Encoder::default();
    let mut buf = Vec::new();

    for i in 0..257 {
        encoder.register_string(&format!("s{}", i), &mut buf).unwrap();
    }
    encoder.encode(&Value::from("payload"), &mut buf).unwrap();
    assert_eq!(buf.iter().filter(|&&b| b == OP_STRING_REGISTER).count(), 257);

    let mut decoder = Decoder::default();
    assert_eq!(decoder.decode_bytes(&buf).unwrap(), Some(Value::from("payload")));

    // The 257th registration took slot 0 from "s0"
    let cache = decoder.strings();
    assert_eq!(cache.lookup(0).unwrap(), "s256");
    assert_eq!(cache.id_of("s0"), None);
    assert_eq!(cache.lookup(255).unwrap(), "s255");
    assert_eq!(encoder.strings().id_of("s256"), Some(0));
}

/// Test a cache slot that was never registered cannot be looked up
#[test]
fn test_unknown_string_id() {
    let decoder = Decoder::default();
    assert!(matches!(decoder.strings().lookup(0), Err(Error::UnknownStringId(0))));
}
