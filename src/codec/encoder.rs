//! Value encoder.

use super::decoder::MAX_NESTING_DEPTH;
use super::*;
use crate::cache::StringCache;
use crate::dictionary::{KeyDictionary, StreamingKeyDictionary};
use crate::value::{Map, Value};
use bytes::{BufMut, Bytes, BytesMut};

/// Encodes [`Value`] trees into the tagged binary format.
///
/// The encoder owns its key dictionary. Every map encoded through the same
/// encoder shares that dictionary, which is what makes repeated field names
/// cost two bytes after their first occurrence.
#[derive(Debug)]
pub struct Encoder<D: KeyDictionary = StreamingKeyDictionary> {
    dictionary: D,
    strings: StringCache,
}

impl Default for Encoder<StreamingKeyDictionary> {
    fn default() -> Self {
        Self::new(StreamingKeyDictionary::new())
    }
}

impl<D: KeyDictionary> Encoder<D> {
    /// Create an encoder resolving keys through `dictionary`.
    pub fn new(dictionary: D) -> Self {
        Self { dictionary, strings: StringCache::new() }
    }

    /// Write one value to `out`.
    ///
    /// Registrations for keys first seen inside `value` are written to `out`
    /// ahead of the map that uses them. A tree nested deeper than
    /// [`MAX_NESTING_DEPTH`] is rejected before anything is written.
    pub fn encode<W: Write>(&mut self, value: &Value, out: &mut W) -> Result<()> {
        check_nesting(std::iter::once(value), 0)?;
        self.write_value(value, out)
    }

    /// Write one map to `out`. Equivalent to encoding `Value::Map`.
    pub fn encode_map<W: Write>(&mut self, map: &Map, out: &mut W) -> Result<()> {
        check_nesting(map.values(), 1)?;
        self.write_map(map, out)
    }

    fn write_value<W: Write>(&mut self, value: &Value, out: &mut W) -> Result<()> {
        match value {
            Value::Null => out.write_u8(TAG_NULL)?,
            Value::Bool(true) => out.write_u8(TAG_TRUE)?,
            Value::Bool(false) => out.write_u8(TAG_FALSE)?,
            Value::Int8(v) => {
                out.write_u8(TAG_INT8)?;
                out.write_i8(*v)?;
            }
            Value::Int16(v) => {
                out.write_u8(TAG_INT16)?;
                out.write_i16::<BigEndian>(*v)?;
            }
            Value::Int32(v) => write_int32(out, *v)?,
            Value::Int64(v) => {
                out.write_u8(TAG_INT64)?;
                out.write_i64::<BigEndian>(*v)?;
            }
            Value::Float32(v) => {
                out.write_u8(TAG_FLOAT32)?;
                out.write_f32::<BigEndian>(*v)?;
            }
            Value::Float64(v) => {
                out.write_u8(TAG_FLOAT64)?;
                out.write_f64::<BigEndian>(*v)?;
            }
            Value::Timestamp(millis) => {
                out.write_u8(TAG_TIMESTAMP)?;
                out.write_i64::<BigEndian>(*millis)?;
            }
            Value::Text(s) => write_text(out, s)?,
            Value::List(items) => {
                let count = i32::try_from(items.len()).map_err(|_| {
                    Error::capacity(format!("list of {} elements is too long", items.len()))
                })?;

                out.write_u8(TAG_LIST)?;
                out.write_i32::<BigEndian>(count)?;
                for item in items {
                    self.write_value(item, out)?;
                }
            }
            Value::Map(map) => self.write_map(map, out)?,
        }
        Ok(())
    }

    fn write_map<W: Write>(&mut self, map: &Map, out: &mut W) -> Result<()> {
        let count = u16::try_from(map.len())
            .map_err(|_| Error::capacity(format!("map of {} fields is too large", map.len())))?;

        // All ids are resolved, and any registrations written, before the tag
        let mut ids = Vec::with_capacity(map.len());
        for key in map.keys() {
            ids.push(self.dictionary.key_id(key, out)?);
        }

        out.write_u8(TAG_MAP)?;
        out.write_u16::<BigEndian>(count)?;
        for id in ids {
            out.write_u16::<BigEndian>(id)?;
        }
        for value in map.values() {
            self.write_value(value, out)?;
        }
        Ok(())
    }

    /// Encode one value into a standalone buffer.
    pub fn encode_to_bytes(&mut self, value: &Value) -> Result<Bytes> {
        let mut writer = BytesMut::new().writer();
        self.encode(value, &mut writer)?;
        Ok(writer.into_inner().freeze())
    }

    /// Register `value` in the string cache, writing the registration to
    /// `out` if it is new.
    ///
    /// Text values are always written inline by [`encode`](Self::encode);
    /// the cache is only populated through this call.
    pub fn register_string<W: Write>(&mut self, value: &str, out: &mut W) -> Result<u8> {
        self.strings.register(value, out)
    }

    /// Clear the key dictionary, writing a reset operation to `out` if the
    /// dictionary synchronizes through the stream.
    pub fn reset_keys<W: Write>(&mut self, out: &mut W) -> Result<()> {
        let out: &mut dyn Write = out;
        self.dictionary.reset(Some(out))
    }

    /// Look up the id of a registered key.
    pub fn id_of(&self, name: &str) -> Option<u16> {
        self.dictionary.id_of(name)
    }

    /// Look up the key registered under `id`.
    pub fn key_of(&self, id: u16) -> Result<&str> {
        self.dictionary.key(id)
    }

    /// Number of keys in the dictionary.
    pub fn key_count(&self) -> usize {
        self.dictionary.len()
    }

    /// The key dictionary.
    pub fn dictionary(&self) -> &D {
        &self.dictionary
    }

    /// Mutable access to the key dictionary.
    pub fn dictionary_mut(&mut self) -> &mut D {
        &mut self.dictionary
    }

    /// Consume the encoder and return its dictionary.
    pub fn into_dictionary(self) -> D {
        self.dictionary
    }

    /// The string cache.
    pub fn strings(&self) -> &StringCache {
        &self.strings
    }
}

/// Walk `values`, found at `depth`, without recursing and fail if a non-empty
/// container sits where the decoder would refuse to read its elements.
fn check_nesting<'a, I>(values: I, depth: usize) -> Result<()>
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut pending: Vec<(&'a Value, usize)> = values.into_iter().map(|v| (v, depth)).collect();
    while let Some((value, depth)) = pending.pop() {
        match value {
            Value::List(items) if !items.is_empty() => {
                guard_depth(depth)?;
                pending.extend(items.iter().map(|v| (v, depth + 1)));
            }
            Value::Map(map) if !map.is_empty() => {
                guard_depth(depth)?;
                pending.extend(map.values().map(|v| (v, depth + 1)));
            }
            _ => {}
        }
    }
    Ok(())
}

fn guard_depth(depth: usize) -> Result<()> {
    if depth >= MAX_NESTING_DEPTH {
        return Err(Error::capacity(format!(
            "values nested deeper than {} levels",
            MAX_NESTING_DEPTH
        )));
    }
    Ok(())
}

fn write_int32<W: Write>(out: &mut W, v: i32) -> Result<()> {
    match v {
        0..=0xFF => {
            out.write_u8(TAG_INT32_U8)?;
            out.write_u8(v as u8)?;
        }
        0x100..=0xFFFF => {
            out.write_u8(TAG_INT32_U16)?;
            out.write_u16::<BigEndian>(v as u16)?;
        }
        _ => {
            out.write_u8(TAG_INT32)?;
            out.write_i32::<BigEndian>(v)?;
        }
    }
    Ok(())
}

fn write_text<W: Write>(out: &mut W, text: &str) -> Result<()> {
    if text.len() <= MAX_SHORT_TEXT_LEN {
        out.write_u8(TAG_TEXT)?;
        return write_short_text(out, text);
    }

    let len = i32::try_from(text.len())
        .map_err(|_| Error::capacity(format!("text of {} bytes is too long", text.len())))?;
    out.write_u8(TAG_LONG_TEXT)?;
    out.write_i32::<BigEndian>(len)?;
    out.write_all(text.as_bytes())?;
    Ok(())
}
