//! Key dictionaries mapping map field names to 16-bit ids.
//!
//! The encoder never writes a field name inside a map. It resolves every
//! name to an id through a [`KeyDictionary`] and writes the id instead.
//! Two strategies exist:
//!
//! - [`StreamingKeyDictionary`]: a new name is registered inline, as a
//!   control operation written to the same output right before the value
//!   that first uses it. A decoder replaying the stream from the start
//!   rebuilds the identical table at the identical byte offset.
//! - [`TableKeyDictionary`]: ids are assigned in memory only, and the whole
//!   table is written or read as one block, separately from the values.
//!
//! Ids are assigned sequentially from 0 within an epoch. A reset starts a
//! new epoch: every id is forgotten and assignment restarts at 0.

mod streaming;
mod table;

pub use streaming::StreamingKeyDictionary;
pub use table::TableKeyDictionary;

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::io::Write;

/// Control operation registering the next key id. Payload: short text.
pub const OP_KEY_REGISTER: u8 = 0xF1;

/// Control operation clearing the key dictionary. No payload.
pub const OP_KEY_RESET: u8 = 0xF2;

/// Number of distinct keys one epoch can hold (the whole u16 id space).
pub const MAX_KEYS: usize = u16::MAX as usize + 1;

/// Bidirectional field name <-> id mapping.
pub trait KeyDictionary {
    /// Returns the id for `name`, assigning the next one if it is new.
    ///
    /// Implementations may write a registration to `out`; that write always
    /// happens before the caller writes the value using the id.
    fn key_id(&mut self, name: &str, out: &mut dyn Write) -> Result<u16>;

    /// Returns the id of a registered name without registering it.
    fn id_of(&self, name: &str) -> Option<u16>;

    /// Returns the name registered under `id` in the current epoch.
    fn key(&self, id: u16) -> Result<&str>;

    /// Number of keys registered in the current epoch.
    fn len(&self) -> usize;

    /// Returns true if no key is registered.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of keys that can still be registered before a reset.
    fn remaining(&self) -> usize {
        MAX_KEYS - self.len()
    }

    /// Clears all keys. If `out` is given, implementations that synchronize
    /// through the stream write a reset operation to it.
    fn reset(&mut self, out: Option<&mut dyn Write>) -> Result<()>;

    /// Applies a key registration read back from a stream.
    fn apply_registration(&mut self, name: String) -> Result<u16>;

    /// Applies a key reset read back from a stream.
    fn apply_reset(&mut self) -> Result<()>;
}

/// Storage shared by both dictionary strategies.
#[derive(Debug, Default, Clone)]
pub(crate) struct KeyTable {
    ids: HashMap<String, u16>,
    names: Vec<String>,
}

impl KeyTable {
    pub(crate) fn get(&self, name: &str) -> Option<u16> {
        self.ids.get(name).copied()
    }

    pub(crate) fn name(&self, id: u16) -> Result<&str> {
        self.names.get(id as usize).map(String::as_str).ok_or(Error::UnknownKey(id))
    }

    pub(crate) fn len(&self) -> usize {
        self.names.len()
    }

    pub(crate) fn is_full(&self) -> bool {
        self.names.len() >= MAX_KEYS
    }

    /// Fails if the table is full. Called before anything is written so a
    /// failed registration leaves both the table and the stream untouched.
    pub(crate) fn check_capacity(&self, name: &str) -> Result<()> {
        if self.is_full() {
            return Err(Error::capacity(format!(
                "maximum number of keys ({}) exceeded by key [{}]",
                MAX_KEYS, name
            )));
        }
        Ok(())
    }

    /// Appends a name that is known not to be present.
    pub(crate) fn push(&mut self, name: String) -> Result<u16> {
        self.check_capacity(&name)?;
        if self.ids.contains_key(&name) {
            return Err(Error::corruption(format!("key [{}] registered twice", name)));
        }

        let id = self.names.len() as u16;
        self.ids.insert(name.clone(), id);
        self.names.push(name);
        Ok(id)
    }

    pub(crate) fn names(&self) -> &[String] {
        &self.names
    }

    /// Forgets every name with an id of `len` or above.
    pub(crate) fn truncate(&mut self, len: usize) {
        for name in self.names.drain(len.min(self.names.len())..) {
            self.ids.remove(&name);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.ids.clear();
        self.names.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_table_sequential_ids() {
        let mut table = KeyTable::default();
        assert_eq!(table.push("x".to_string()).unwrap(), 0);
        assert_eq!(table.push("y".to_string()).unwrap(), 1);
        assert_eq!(table.get("y"), Some(1));
        assert_eq!(table.name(0).unwrap(), "x");
        assert!(matches!(table.name(2), Err(Error::UnknownKey(2))));
    }

    #[test]
    fn test_key_table_rejects_duplicates() {
        let mut table = KeyTable::default();
        table.push("x".to_string()).unwrap();
        assert!(matches!(table.push("x".to_string()), Err(Error::Corruption(_))));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_key_table_truncate() {
        let mut table = KeyTable::default();
        for name in ["a", "b", "c"] {
            table.push(name.to_string()).unwrap();
        }

        table.truncate(1);
        assert_eq!(table.names(), &["a".to_string()]);
        assert_eq!(table.get("b"), None);
        assert_eq!(table.push("c".to_string()).unwrap(), 1);

        table.truncate(10);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_key_table_clear() {
        let mut table = KeyTable::default();
        table.push("a".to_string()).unwrap();
        table.clear();
        assert_eq!(table.len(), 0);
        assert_eq!(table.get("a"), None);
        assert_eq!(table.push("b".to_string()).unwrap(), 0);
    }
}
