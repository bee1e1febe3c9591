//! Key table example for keystream
//!
//! Encodes a batch of values with a key dictionary kept apart from the
//! value bytes, then stores the dictionary as a single table block and
//! decodes the batch with it.

use keystream::{Decoder, Encoder, Map, TableKeyDictionary, Value};
use std::io::Cursor;

fn main() -> anyhow::Result<()> {
    // Initialize logger
    env_logger::init();

    let mut encoder = Encoder::new(TableKeyDictionary::new());
    let mut body = Vec::new();

    for i in 0..3 {
        let mut point = Map::new();
        point.insert("x".to_string(), Value::Int32(i));
        point.insert("y".to_string(), Value::Int32(i * i));
        point.insert("label".to_string(), Value::from(format!("p{}", i)));
        encoder.encode(&Value::Map(point), &mut body)?;
    }

    let mut table = Vec::new();
    encoder.dictionary().serialize(&mut table)?;
    println!(
        "Encoded 3 values in {} bytes; key table {:?} takes {} bytes",
        body.len(),
        encoder.dictionary().keys(),
        table.len()
    );

    let dictionary = TableKeyDictionary::from_reader(&mut Cursor::new(table))?;
    let mut decoder = Decoder::new(dictionary);
    let mut cursor = Cursor::new(body);
    while (cursor.position() as usize) < cursor.get_ref().len() {
        if let Some(value) = decoder.decode(&mut cursor)? {
            println!("{}", value.to_json());
        }
    }

    Ok(())
}
