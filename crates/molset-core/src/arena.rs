//! Read-only shared containers for large string arrays.
//!
//! A [`StringArena`] packs every string into one contiguous UTF-8 buffer with
//! prefix-sum offsets, both behind `Arc`. Cloning the arena, or handing it to
//! worker threads, shares the backing allocation instead of duplicating it.
//! There is no writer after [`StringArenaBuilder::finish`] consumes the
//! builder, so concurrent reads need no locking.
//!
//! Serialization carries the offsets and the buffer; deserialization rebuilds
//! exactly one backing allocation per array, which every clone in the
//! receiving process then shares by reference.

use std::sync::Arc;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArenaError {
    #[error("offsets must start at 0 and be non-decreasing")]
    MalformedOffsets,
    #[error("offsets must end at buffer length {buffer_len}, got {last}")]
    OffsetOverrun { last: u64, buffer_len: usize },
    #[error("buffer is not valid UTF-8 or an offset splits a character")]
    InvalidUtf8,
}

/// Append-only accumulator; consumed by [`StringArenaBuilder::finish`] so the
/// published arena can never be written again.
#[derive(Debug)]
pub struct StringArenaBuilder {
    offsets: Vec<u64>,
    bytes: Vec<u8>,
}

impl StringArenaBuilder {
    pub fn new() -> Self {
        Self {
            offsets: vec![0],
            bytes: Vec::new(),
        }
    }

    pub fn with_capacity(strings: usize, bytes: usize) -> Self {
        let mut offsets = Vec::with_capacity(strings.saturating_add(1));
        offsets.push(0);
        Self {
            offsets,
            bytes: Vec::with_capacity(bytes),
        }
    }

    pub fn push(&mut self, s: &str) {
        self.bytes.extend_from_slice(s.as_bytes());
        self.offsets.push(self.bytes.len() as u64);
    }

    pub fn finish(self) -> StringArena {
        StringArena {
            offsets: Arc::from(self.offsets),
            bytes: Arc::from(self.bytes),
        }
    }
}

impl Default for StringArenaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable, concurrency-safe string array with a shared backing buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringArena {
    /// Prefix-sum offsets into `bytes` (length = string count + 1).
    ///
    /// Invariants:
    /// - offsets[0] == 0
    /// - offsets is non-decreasing
    /// - offsets.last() == bytes.len()
    /// - every offset lands on a UTF-8 character boundary
    offsets: Arc<[u64]>,
    bytes: Arc<[u8]>,
}

impl StringArena {
    pub fn len(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        let start = usize::try_from(*self.offsets.get(index)?).ok()?;
        let end = usize::try_from(*self.offsets.get(index + 1)?).ok()?;
        std::str::from_utf8(self.bytes.get(start..end)?).ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        (0..self.len()).filter_map(|i| self.get(i))
    }

    /// Total bytes of string payload, shared across all clones.
    pub fn payload_len(&self) -> usize {
        self.bytes.len()
    }

    fn from_parts(offsets: Vec<u64>, bytes: Vec<u8>) -> Result<Self, ArenaError> {
        if offsets.first() != Some(&0) {
            return Err(ArenaError::MalformedOffsets);
        }
        if offsets.windows(2).any(|w| w[0] > w[1]) {
            return Err(ArenaError::MalformedOffsets);
        }
        let last = offsets.last().copied().unwrap_or(0);
        if last != bytes.len() as u64 {
            return Err(ArenaError::OffsetOverrun {
                last,
                buffer_len: bytes.len(),
            });
        }
        let text = std::str::from_utf8(&bytes).map_err(|_| ArenaError::InvalidUtf8)?;
        for &off in offsets.iter() {
            let off = usize::try_from(off).map_err(|_| ArenaError::MalformedOffsets)?;
            if !text.is_char_boundary(off) {
                return Err(ArenaError::InvalidUtf8);
            }
        }
        Ok(Self {
            offsets: Arc::from(offsets),
            bytes: Arc::from(bytes),
        })
    }
}

impl<'a> FromIterator<&'a str> for StringArena {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut builder = StringArenaBuilder::new();
        for s in iter {
            builder.push(s);
        }
        builder.finish()
    }
}

#[derive(Serialize)]
struct ArenaRepr<'a> {
    offsets: &'a [u64],
    bytes: &'a [u8],
}

#[derive(Deserialize)]
struct ArenaReprOwned {
    offsets: Vec<u64>,
    bytes: Vec<u8>,
}

impl Serialize for StringArena {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ArenaRepr {
            offsets: &self.offsets,
            bytes: &self.bytes,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StringArena {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = ArenaReprOwned::deserialize(deserializer)?;
        StringArena::from_parts(repr.offsets, repr.bytes).map_err(D::Error::custom)
    }
}

/// A [`StringArena`] with a second prefix-sum layer grouping consecutive
/// strings, used for per-molecule raw-input variant lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupedStringArena {
    /// Prefix-sum group boundaries into the flat arena (length = groups + 1).
    group_offsets: Arc<[u64]>,
    strings: StringArena,
}

impl GroupedStringArena {
    /// Number of groups.
    pub fn len(&self) -> usize {
        self.group_offsets.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn group(&self, index: usize) -> Option<impl Iterator<Item = &str>> {
        let start = usize::try_from(*self.group_offsets.get(index)?).ok()?;
        let end = usize::try_from(*self.group_offsets.get(index + 1)?).ok()?;
        Some((start..end).filter_map(|i| self.strings.get(i)))
    }

    pub fn group_len(&self, index: usize) -> Option<usize> {
        let start = usize::try_from(*self.group_offsets.get(index)?).ok()?;
        let end = usize::try_from(*self.group_offsets.get(index + 1)?).ok()?;
        Some(end.saturating_sub(start))
    }

    fn from_parts(group_offsets: Vec<u64>, strings: StringArena) -> Result<Self, ArenaError> {
        if group_offsets.first() != Some(&0) {
            return Err(ArenaError::MalformedOffsets);
        }
        if group_offsets.windows(2).any(|w| w[0] > w[1]) {
            return Err(ArenaError::MalformedOffsets);
        }
        let last = group_offsets.last().copied().unwrap_or(0);
        if last != strings.len() as u64 {
            return Err(ArenaError::OffsetOverrun {
                last,
                buffer_len: strings.len(),
            });
        }
        Ok(Self {
            group_offsets: Arc::from(group_offsets),
            strings,
        })
    }
}

/// Accumulates groups of strings; consumed by `finish`, like the flat builder.
#[derive(Debug)]
pub struct GroupedStringArenaBuilder {
    group_offsets: Vec<u64>,
    strings: StringArenaBuilder,
    count: u64,
}

impl GroupedStringArenaBuilder {
    pub fn new() -> Self {
        Self {
            group_offsets: vec![0],
            strings: StringArenaBuilder::new(),
            count: 0,
        }
    }

    pub fn push_group<'a, I: IntoIterator<Item = &'a str>>(&mut self, group: I) {
        for s in group {
            self.strings.push(s);
            self.count += 1;
        }
        self.group_offsets.push(self.count);
    }

    pub fn finish(self) -> GroupedStringArena {
        GroupedStringArena {
            group_offsets: Arc::from(self.group_offsets),
            strings: self.strings.finish(),
        }
    }
}

impl Default for GroupedStringArenaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct GroupedRepr<'a> {
    group_offsets: &'a [u64],
    strings: &'a StringArena,
}

#[derive(Deserialize)]
struct GroupedReprOwned {
    group_offsets: Vec<u64>,
    strings: StringArena,
}

impl Serialize for GroupedStringArena {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        GroupedRepr {
            group_offsets: &self.group_offsets,
            strings: &self.strings,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for GroupedStringArena {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = GroupedReprOwned::deserialize(deserializer)?;
        GroupedStringArena::from_parts(repr.group_offsets, repr.strings).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena_roundtrips_contents() {
        let arena: StringArena = ["CCO", "", "c1ccccc1"].into_iter().collect();
        assert_eq!(arena.len(), 3);
        assert_eq!(arena.get(0), Some("CCO"));
        assert_eq!(arena.get(1), Some(""));
        assert_eq!(arena.get(2), Some("c1ccccc1"));
        assert_eq!(arena.get(3), None);
        assert_eq!(arena.iter().collect::<Vec<_>>(), vec!["CCO", "", "c1ccccc1"]);
    }

    #[test]
    fn clones_share_the_backing_buffer() {
        let arena: StringArena = ["CCO", "OCC"].into_iter().collect();
        let clone = arena.clone();
        assert!(Arc::ptr_eq(&arena.bytes, &clone.bytes));
        assert!(Arc::ptr_eq(&arena.offsets, &clone.offsets));
    }

    #[test]
    fn concurrent_readers_need_no_locking() {
        let arena: StringArena = ["CCO", "OCC", "CCN"].into_iter().collect();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let arena = arena.clone();
                std::thread::spawn(move || arena.iter().map(str::len).sum::<usize>())
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), 9);
        }
    }

    #[test]
    fn grouped_arena_preserves_group_boundaries() {
        let mut builder = GroupedStringArenaBuilder::new();
        builder.push_group(["CCO", "OCC"]);
        builder.push_group(std::iter::empty());
        builder.push_group(["CCN"]);
        let grouped = builder.finish();

        assert_eq!(grouped.len(), 3);
        assert_eq!(grouped.group(0).unwrap().collect::<Vec<_>>(), ["CCO", "OCC"]);
        assert_eq!(grouped.group_len(1), Some(0));
        assert_eq!(grouped.group(2).unwrap().collect::<Vec<_>>(), ["CCN"]);
        assert!(grouped.group(3).is_none());
    }

    #[test]
    fn serde_rebuilds_one_shared_backing() {
        let arena: StringArena = ["CCO", "c1ccccc1"].into_iter().collect();
        let json = serde_json::to_string(&arena).unwrap();
        let back: StringArena = serde_json::from_str(&json).unwrap();
        assert_eq!(back, arena);

        let reader_a = back.clone();
        let reader_b = back.clone();
        assert!(Arc::ptr_eq(&reader_a.bytes, &reader_b.bytes));
    }

    #[test]
    fn deserialize_rejects_malformed_offsets() {
        let json = r#"{"offsets":[0,5,3],"bytes":[67,67,79]}"#;
        assert!(serde_json::from_str::<StringArena>(json).is_err());

        let json = r#"{"offsets":[0,2],"bytes":[67,67,79]}"#;
        assert!(serde_json::from_str::<StringArena>(json).is_err());

        let json = r#"{"offsets":[1,3],"bytes":[67,67,79]}"#;
        assert!(serde_json::from_str::<StringArena>(json).is_err());
    }

    #[test]
    fn deserialize_rejects_offsets_splitting_utf8() {
        // "é" is two bytes; an offset of 1 lands inside it.
        let json = r#"{"offsets":[0,1,2],"bytes":[195,169]}"#;
        assert!(serde_json::from_str::<StringArena>(json).is_err());
    }

    #[test]
    fn grouped_serde_roundtrip() {
        let mut builder = GroupedStringArenaBuilder::new();
        builder.push_group(["CCO"]);
        builder.push_group(["OCC", "CCN"]);
        let grouped = builder.finish();

        let json = serde_json::to_string(&grouped).unwrap();
        let back: GroupedStringArena = serde_json::from_str(&json).unwrap();
        assert_eq!(back, grouped);
    }

    #[test]
    fn grouped_deserialize_rejects_overrun() {
        let json = r#"{"group_offsets":[0,9],"strings":{"offsets":[0,3],"bytes":[67,67,79]}}"#;
        assert!(serde_json::from_str::<GroupedStringArena>(json).is_err());
    }
}
