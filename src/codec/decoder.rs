//! Value decoder.

use super::*;
use crate::cache::{StringCache, OP_STRING_REGISTER};
use crate::dictionary::{KeyDictionary, StreamingKeyDictionary, OP_KEY_REGISTER, OP_KEY_RESET};
use crate::value::{Map, Value};

/// Deepest nesting of maps and lists accepted before the input is treated
/// as corrupt.
pub const MAX_NESTING_DEPTH: usize = 512;

/// Decodes [`Value`] trees from the tagged binary format.
///
/// Control operations interleaved with the values (key registrations, key
/// resets, string registrations) are applied to the decoder's own
/// dictionary and cache as they are met, so the decoder has to see the
/// stream from its first byte.
#[derive(Debug)]
pub struct Decoder<D: KeyDictionary = StreamingKeyDictionary> {
    dictionary: D,
    strings: StringCache,
}

impl Default for Decoder<StreamingKeyDictionary> {
    fn default() -> Self {
        Self::new(StreamingKeyDictionary::new())
    }
}

impl<D: KeyDictionary> Decoder<D> {
    /// Create a decoder resolving key ids through `dictionary`.
    pub fn new(dictionary: D) -> Self {
        Self { dictionary, strings: StringCache::new() }
    }

    /// Read the next value from `input`.
    ///
    /// Returns `Ok(None)` on the stream-end tag. Any number of control
    /// operations may be consumed before the value itself.
    pub fn decode<R: Read>(&mut self, input: &mut R) -> Result<Option<Value>> {
        self.read_value(input, 0)
    }

    /// Read the next value from a byte slice.
    pub fn decode_bytes(&mut self, mut data: &[u8]) -> Result<Option<Value>> {
        self.decode(&mut data)
    }

    fn read_value<R: Read>(&mut self, input: &mut R, depth: usize) -> Result<Option<Value>> {
        loop {
            let tag = input.read_u8()?;

            let value = match tag {
                OP_KEY_REGISTER => {
                    let name = read_short_text(input)?;
                    self.dictionary.apply_registration(name)?;
                    continue;
                }
                OP_KEY_RESET => {
                    self.dictionary.apply_reset()?;
                    continue;
                }
                OP_STRING_REGISTER => {
                    self.strings.read_registration(input)?;
                    continue;
                }
                TAG_STREAM_END => return Ok(None),

                TAG_NULL => Value::Null,
                TAG_TRUE => Value::Bool(true),
                TAG_FALSE => Value::Bool(false),
                TAG_INT8 => Value::Int8(input.read_i8()?),
                TAG_INT16 => Value::Int16(input.read_i16::<BigEndian>()?),
                TAG_INT32 => Value::Int32(input.read_i32::<BigEndian>()?),
                TAG_INT32_U8 => Value::Int32(input.read_u8()? as i32),
                TAG_INT32_U16 => Value::Int32(input.read_u16::<BigEndian>()? as i32),
                TAG_INT64 => Value::Int64(input.read_i64::<BigEndian>()?),
                TAG_FLOAT32 => Value::Float32(input.read_f32::<BigEndian>()?),
                TAG_FLOAT64 => Value::Float64(input.read_f64::<BigEndian>()?),
                TAG_TIMESTAMP => Value::Timestamp(input.read_i64::<BigEndian>()?),
                TAG_TEXT => Value::Text(read_short_text(input)?),
                TAG_LONG_TEXT => Value::Text(read_long_text(input)?),
                TAG_LIST => self.read_list(input, depth)?,
                TAG_MAP => self.read_map(input, depth)?,

                other => return Err(Error::UnknownTag(other)),
            };

            return Ok(Some(value));
        }
    }

    /// Read a value that sits inside a map or list, where the stream may
    /// not end.
    fn read_nested<R: Read>(&mut self, input: &mut R, depth: usize) -> Result<Value> {
        if depth >= MAX_NESTING_DEPTH {
            return Err(Error::corruption(format!(
                "values nested deeper than {} levels",
                MAX_NESTING_DEPTH
            )));
        }

        self.read_value(input, depth + 1)?
            .ok_or_else(|| Error::corruption("stream end inside a map or list"))
    }

    fn read_map<R: Read>(&mut self, input: &mut R, depth: usize) -> Result<Value> {
        let count = input.read_u16::<BigEndian>()? as usize;

        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            ids.push(input.read_u16::<BigEndian>()?);
        }

        // Names are resolved before any value so that a registration nested
        // in a value cannot be mistaken for one of this map's keys
        let mut names = Vec::with_capacity(count);
        for id in ids {
            names.push(self.dictionary.key(id)?.to_string());
        }

        let mut map = Map::with_capacity(count);
        for name in names {
            let value = self.read_nested(input, depth)?;
            if let Some(previous) = map.insert(name, value) {
                return Err(Error::corruption(format!(
                    "duplicate key in map (previous value of kind {:?})",
                    previous.kind()
                )));
            }
        }

        Ok(Value::Map(map))
    }

    fn read_list<R: Read>(&mut self, input: &mut R, depth: usize) -> Result<Value> {
        let count = input.read_i32::<BigEndian>()?;
        if count < 0 {
            return Err(Error::corruption(format!("negative list length {}", count)));
        }

        // Cap the up-front allocation; a corrupt count must not reserve gigabytes
        let mut items = Vec::with_capacity((count as usize).min(1024));
        for _ in 0..count {
            items.push(self.read_nested(input, depth)?);
        }

        Ok(Value::List(items))
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

    /// Consume the decoder and return its dictionary.
    pub fn into_dictionary(self) -> D {
        self.dictionary
    }

    /// The string cache, as rebuilt from the stream.
    pub fn strings(&self) -> &StringCache {
        &self.strings
    }
}
