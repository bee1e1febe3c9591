//! Small-value string cache.
//!
//! Provides a fixed 256-slot cache that maps recently registered text values
//! to one-byte ids, with round-robin (FIFO) replacement.

mod string_cache;

pub use string_cache::{CacheStats, StringCache, CACHE_SLOTS, OP_STRING_REGISTER};
