//! Basic usage example for keystream
//!
//! This example demonstrates the fundamental operations:
//! - Writing records to a compressed stream file
//! - Reading them back one at a time
//! - Converting records to and from JSON

use anyhow::Context;
use keystream::{Record, RecordReader, RecordWriter, StreamOptions, Value};

fn main() -> anyhow::Result<()> {
    // Initialize logger
    env_logger::init();

    let path = std::env::temp_dir().join("keystream_basic.ks");

    // Configure stream options
    let options = StreamOptions::default()
        .compression_level(9)
        .buffer_size(64 * 1024); // 64KB

    println!("Writing records to {}...", path.display());
    let mut writer = RecordWriter::create(&path, options)?;
    for i in 0..5i32 {
        let json = serde_json::json!({
            "id": i,
            "user": format!("user{}", i),
            "roles": ["reader", "writer"],
            "profile": { "verified": i % 2 == 0, "karma": f64::from(i) * 1.5 },
        });
        let record = Value::from(json);
        let record = record.as_map().context("JSON object expected")?;
        writer.write(record)?;
    }

    // A record built directly, with a timestamp the JSON model cannot carry
    let mut audit = Record::new();
    audit.insert("event".to_string(), Value::from("export"));
    audit.insert("at".to_string(), Value::Timestamp(1_700_000_000_000));
    writer.write(&audit)?;

    println!("Wrote {} records using {} keys", writer.records_written(), writer.key_count());
    writer.close()?;

    println!("Reading records...");
    let mut reader = RecordReader::open_path(&path)?;
    println!("Stream header: {:?}", reader.header());
    while let Some(record) = reader.next_record()? {
        println!("{}", Value::Map(record).to_json());
    }

    std::fs::remove_file(&path)?;
    Ok(())
}
