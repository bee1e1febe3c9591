//! Round-robin string cache shared by an encoder/decoder pair.
//!
//! This module provides the id bookkeeping for text values registered with
//! a `0xF3` control operation. Slots are reused in registration order, so
//! a writer and a reader that see the same registrations in the same order
//! always agree on which value occupies which slot.

use crate::codec::{check_short_text, read_short_text, write_short_text};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::io::{Read, Write};

/// Control operation registering a string in the next cache slot.
/// Payload: short text.
pub const OP_STRING_REGISTER: u8 = 0xF3;

/// Number of slots, one per possible u8 id.
pub const CACHE_SLOTS: usize = 256;

/// Statistics for cache usage monitoring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of register calls that found the value already cached
    pub hits: u64,
    /// Number of values installed in a slot
    pub insertions: u64,
    /// Number of values displaced by a newer registration
    pub evictions: u64,
}

impl CacheStats {
    /// Fraction of register calls served from the cache (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.insertions;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Bidirectional value <-> u8 id cache with 256 slots.
///
/// Registration of a new value takes the slot after the one used last,
/// wrapping from 255 to 0, and evicts whatever that slot held. Lookups do
/// not affect which value is evicted next.
#[derive(Debug, Clone)]
pub struct StringCache {
    /// Slot contents by id
    slots: Vec<Option<String>>,
    /// Reverse mapping for values currently in a slot
    ids: HashMap<String, u8>,
    /// Slot the next registration will occupy
    next: u8,
    stats: CacheStats,
}

impl Default for StringCache {
    fn default() -> Self {
        Self::new()
    }
}

impl StringCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            slots: vec![None; CACHE_SLOTS],
            ids: HashMap::new(),
            next: 0,
            stats: CacheStats::default(),
        }
    }

    /// Return the id of `value`, registering it if it is not cached.
    ///
    /// A new registration writes `[0xF3][len: u16][utf-8 value]` to `out`
    /// before returning.
    pub fn register<W: Write + ?Sized>(&mut self, value: &str, out: &mut W) -> Result<u8> {
        if let Some(&id) = self.ids.get(value) {
            self.stats.hits += 1;
            return Ok(id);
        }

        check_short_text(value)?;
        out.write_all(&[OP_STRING_REGISTER])?;
        write_short_text(out, value)?;

        Ok(self.install(value.to_string()))
    }

    /// Read the payload of a `0xF3` operation and apply it.
    pub fn read_registration<R: Read + ?Sized>(&mut self, input: &mut R) -> Result<u8> {
        let value = read_short_text(input)?;
        Ok(self.install(value))
    }

    /// Return the value held in slot `id`.
    pub fn lookup(&self, id: u8) -> Result<&str> {
        self.slots[id as usize]
            .as_deref()
            .ok_or(Error::UnknownStringId(id))
    }

    /// Return the id of a cached value without registering it.
    pub fn id_of(&self, value: &str) -> Option<u8> {
        self.ids.get(value).copied()
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Check if no slot is occupied.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.clone()
    }

    /// Empty every slot and restart assignment at id 0.
    pub fn reset(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.ids.clear();
        self.next = 0;
    }

    fn install(&mut self, value: String) -> u8 {
        let id = self.next;

        if let Some(old) = self.slots[id as usize].take() {
            // Only drop the reverse entry if it still points at this slot
            if self.ids.get(&old) == Some(&id) {
                self.ids.remove(&old);
            }
            self.stats.evictions += 1;
        }

        self.ids.insert(value.clone(), id);
        self.slots[id as usize] = Some(value);
        self.next = id.wrapping_add(1);
        self.stats.insertions += 1;

        id
    }
}
