// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Fixed little-endian codecs for entries.
//!
//! An entry on disk is `u64(key) ++ u64(len(value)) ++ value`. Decoding never
//! throws on truncated input: a short read reports `consumed == 0`, which
//! callers use as the loop termination condition during table recovery.

use crate::slice::Slice;

/// Size in bytes of an encoded `u64`.
pub const U64_SIZE: usize = 8;

/// Appends the little-endian encoding of `value` to `out`.
pub fn encode_u64(value: u64, out: &mut Vec<u8>) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Decodes a little-endian `u64` from the front of `input`.
///
/// Returns `(0, 0)` if `input` holds fewer than 8 bytes.
#[must_use]
pub fn decode_u64(input: &[u8]) -> (u64, usize) {
    match input.get(..U64_SIZE) {
        Some(bytes) => {
            #[allow(clippy::unwrap_used)]
            let array: [u8; U64_SIZE] = bytes.try_into().unwrap();
            (u64::from_le_bytes(array), U64_SIZE)
        }
        None => (0, 0),
    }
}

/// Appends a length-prefixed byte slice: `u64(len(value)) ++ value`.
pub fn encode_slice(value: &[u8], out: &mut Vec<u8>) {
    #[allow(clippy::cast_possible_truncation)]
    encode_u64(value.len() as u64, out);
    out.extend_from_slice(value);
}

/// A decoded `(key, value)` entry, as found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// The entry's key.
    pub key: u64,

    /// The entry's value.
    pub value: Slice,
}

impl Entry {
    fn empty() -> Self {
        Self {
            key: 0,
            value: Slice::new(&[]),
        }
    }
}

/// Decodes one entry (`key`, then `value_len`, then `value_len` bytes) from
/// the front of `input`.
///
/// Returns `(Entry::empty(), 0)` if any of the three steps lacks enough
/// bytes. This is a signal, not an error: truncated input is expected at the
/// tail of a table file that was not flushed past that point, or while a
/// recovery scan is still accumulating a chunk.
#[must_use]
pub fn decode_entry(input: &[u8]) -> (Entry, usize) {
    let (key, key_len) = decode_u64(input);
    if key_len == 0 {
        return (Entry::empty(), 0);
    }

    #[allow(clippy::indexing_slicing)]
    let rest = &input[key_len..];

    let (value_len, len_len) = decode_u64(rest);
    if len_len == 0 {
        return (Entry::empty(), 0);
    }

    #[allow(clippy::cast_possible_truncation)]
    let value_len = value_len as usize;

    #[allow(clippy::indexing_slicing)]
    let rest = &rest[len_len..];

    let Some(value_bytes) = rest.get(..value_len) else {
        return (Entry::empty(), 0);
    };

    let consumed = key_len + len_len + value_len;
    (
        Entry {
            key,
            value: Slice::new(value_bytes),
        },
        consumed,
    )
}
