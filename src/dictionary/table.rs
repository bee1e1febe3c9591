//! Key dictionary that is serialized as one block, apart from the values.

use super::{KeyDictionary, KeyTable};
use crate::codec::{check_short_text, read_short_text, write_short_text};
use crate::error::{Error, Result};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Dictionary that collects keys in memory and never writes to the value
/// stream.
///
/// Suited to batch work where every value is encoded before the key
/// vocabulary is stored: encode the values, then [`serialize`] the table;
/// on the reading side [`deserialize`] the table before decoding.
///
/// Block format:
///
/// ```text
/// [count: u16][len: u16][utf-8 key] * count   (keys in id order)
/// ```
///
/// [`serialize`]: TableKeyDictionary::serialize
/// [`deserialize`]: TableKeyDictionary::deserialize
#[derive(Debug, Default, Clone)]
pub struct TableKeyDictionary {
    table: KeyTable,
}

impl TableKeyDictionary {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered names in id order.
    pub fn keys(&self) -> &[String] {
        self.table.names()
    }

    /// Write the whole table as one block.
    pub fn serialize<W: Write>(&self, out: &mut W) -> Result<()> {
        let count = u16::try_from(self.table.len()).map_err(|_| {
            Error::capacity(format!("{} keys do not fit a table block", self.table.len()))
        })?;

        out.write_u16::<BigEndian>(count)?;
        for name in self.table.names() {
            write_short_text(out, name)?;
        }
        Ok(())
    }

    /// Replace the current contents with a block written by [`serialize`].
    ///
    /// [`serialize`]: TableKeyDictionary::serialize
    pub fn deserialize<R: Read>(&mut self, input: &mut R) -> Result<()> {
        self.table.clear();

        let count = input.read_u16::<BigEndian>()?;
        for _ in 0..count {
            let name = read_short_text(input)?;
            self.table.push(name)?;
        }
        Ok(())
    }

    /// Build a dictionary from a serialized block.
    pub fn from_reader<R: Read>(input: &mut R) -> Result<Self> {
        let mut dict = Self::new();
        dict.deserialize(input)?;
        Ok(dict)
    }
}

impl KeyDictionary for TableKeyDictionary {
    fn key_id(&mut self, name: &str, _out: &mut dyn Write) -> Result<u16> {
        if let Some(id) = self.table.get(name) {
            return Ok(id);
        }

        // Keys must stay serializable as a block
        check_short_text(name)?;
        self.table.push(name.to_string())
    }

    fn id_of(&self, name: &str) -> Option<u16> {
        self.table.get(name)
    }

    fn key(&self, id: u16) -> Result<&str> {
        self.table.name(id)
    }

    fn len(&self) -> usize {
        self.table.len()
    }

    fn reset(&mut self, _out: Option<&mut dyn Write>) -> Result<()> {
        self.table.clear();
        Ok(())
    }

    fn apply_registration(&mut self, name: String) -> Result<u16> {
        Err(Error::corruption(format!(
            "inline registration of key [{}] in a stream encoded with a key table",
            name
        )))
    }

    fn apply_reset(&mut self) -> Result<()> {
        Err(Error::corruption("inline key reset in a stream encoded with a key table"))
    }
}
