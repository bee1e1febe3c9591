//! Key dictionary that registers new keys inline in the value stream.

use super::{KeyDictionary, KeyTable, OP_KEY_REGISTER, OP_KEY_RESET};
use crate::codec::{check_short_text, write_short_text};
use crate::error::Result;
use std::io::Write;

/// Dictionary whose registrations travel inside the stream it encodes.
///
/// On the writing side, the first use of a name writes
/// `[0xF1][len: u16][utf-8 name]` to the output. On the reading side the
/// decoder feeds each such operation to [`KeyDictionary::apply_registration`],
/// so after any byte offset both sides hold the same table.
#[derive(Debug, Default, Clone)]
pub struct StreamingKeyDictionary {
    table: KeyTable,
}

impl StreamingKeyDictionary {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered names in id order.
    pub fn keys(&self) -> &[String] {
        self.table.names()
    }

    /// Drop registrations made after the dictionary held `len` keys.
    ///
    /// Only valid when the registration ops for those keys never reached
    /// the stream, e.g. a record that failed to encode into a scratch buffer.
    pub(crate) fn rollback(&mut self, len: usize) {
        if len < self.table.len() {
            log::trace!("Rolling back {} key registrations", self.table.len() - len);
            self.table.truncate(len);
        }
    }
}

impl KeyDictionary for StreamingKeyDictionary {
    fn key_id(&mut self, name: &str, out: &mut dyn Write) -> Result<u16> {
        if let Some(id) = self.table.get(name) {
            return Ok(id);
        }

        self.table.check_capacity(name)?;
        check_short_text(name)?;

        // The registration must reach the stream before the id is used
        out.write_all(&[OP_KEY_REGISTER])?;
        write_short_text(out, name)?;

        let id = self.table.push(name.to_string())?;
        log::trace!("Registered key [{}] as {}", name, id);
        Ok(id)
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

    fn reset(&mut self, out: Option<&mut dyn Write>) -> Result<()> {
        if let Some(out) = out {
            out.write_all(&[OP_KEY_RESET])?;
        }

        log::debug!("Resetting key dictionary after {} keys", self.table.len());
        self.table.clear();
        Ok(())
    }

    fn apply_registration(&mut self, name: String) -> Result<u16> {
        self.table.push(name)
    }

    fn apply_reset(&mut self) -> Result<()> {
        self.reset(None)
    }
}
