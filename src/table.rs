// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The immutable on-disk table: an append-only file plus an in-memory
//! key→offset index, and the recovery path that rebuilds the index by
//! scanning a file written by some earlier process.

use crate::{
    coding::{decode_entry, decode_u64, U64_SIZE},
    fs::{FileHandle, FileSystem},
    slice::Slice,
    Error,
};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

/// Chunk size used by [`recover`] when scanning a table file.
const SCAN_CHUNK_SIZE: usize = 4096;

/// An immutable table: a file of encoded entries plus an index mapping each
/// key to the file offset where that key's value bytes begin.
///
/// The file is never written to through this type; [`Table`] only ever
/// issues positional reads. Multiple tables (and hence multiple readers) can
/// share one underlying file by opening independent handles onto it.
#[derive(Debug)]
pub struct Table<H: FileHandle> {
    path: PathBuf,
    file: H,
    index: HashMap<u64, u64>,
}

impl<H: FileHandle> Table<H> {
    pub(crate) fn new(path: PathBuf, file: H, index: HashMap<u64, u64>) -> Self {
        Self { path, file, index }
    }

    /// The path this table's file lives at.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Iterates over every key currently indexed by this table.
    pub(crate) fn keys(&self) -> impl Iterator<Item = u64> + '_ {
        self.index.keys().copied()
    }

    /// Looks up `key`.
    ///
    /// Returns `(empty, false)` if the key is absent; this is not an error.
    pub fn read(&self, key: u64) -> crate::Result<(Slice, bool)> {
        let Some(&value_offset) = self.index.get(&key) else {
            return Ok((Slice::new(&[]), false));
        };

        let len_offset = value_offset
            .checked_sub(U64_SIZE as u64)
            .ok_or(Error::Corrupt("index offset underflows the length prefix"))?;

        let len_bytes = self.file.read_at(len_offset, U64_SIZE)?;
        let (value_len, consumed) = decode_u64(&len_bytes);
        if consumed == 0 {
            return Err(Error::Corrupt("table file is shorter than its index promises"));
        }

        #[allow(clippy::cast_possible_truncation)]
        let value_len = value_len as usize;

        let value = self.file.read_at(value_offset, value_len)?;
        if value.len() != value_len {
            return Err(Error::Corrupt("table file is shorter than its index promises"));
        }

        Ok((Slice::from(value), true))
    }
}

/// Rebuilds a table's index by scanning its file from the start.
///
/// Reads in fixed-size chunks, carrying over any undecoded tail bytes to be
/// prepended to the next chunk. A chunk read that returns fewer bytes than
/// requested marks end of file; if the leftover carry still doesn't decode
/// at that point, it's a partially written trailing entry and is dropped
/// (the table is truncated there, not treated as corrupt).
pub fn recover<F: FileSystem>(fs: &F, path: &Path) -> crate::Result<Table<F::File>> {
    let file = fs.open(path)?;

    let mut index = HashMap::new();
    let mut offset = 0u64;
    let mut carry: Vec<u8> = Vec::new();

    loop {
        loop {
            let (entry, consumed) = decode_entry(&carry);
            if consumed == 0 {
                break;
            }

            let value_offset = offset + (2 * U64_SIZE) as u64;
            index.insert(entry.key, value_offset);

            offset += consumed as u64;
            carry.drain(..consumed);
        }

        let read_offset = offset + carry.len() as u64;
        let chunk = file.read_at(read_offset, SCAN_CHUNK_SIZE)?;
        if chunk.is_empty() {
            if !carry.is_empty() {
                log::warn!(
                    "table {} has a truncated trailing entry at offset {}, ignoring it",
                    path.display(),
                    offset
                );
            }
            break;
        }
        carry.extend_from_slice(&chunk);
    }

    Ok(Table::new(path.to_path_buf(), file, index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        coding::{encode_slice, encode_u64},
        fs::StdFileSystem,
    };
    use test_log::test;

    fn encode_entry(key: u64, value: &[u8], out: &mut Vec<u8>) {
        encode_u64(key, out);
        encode_slice(value, out);
    }

    #[test]
    fn recover_rebuilds_index_from_scratch() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("table.0");

        let fs = StdFileSystem;
        let mut buf = Vec::new();
        encode_entry(1, b"v1", &mut buf);
        encode_entry(10, b"value ten", &mut buf);
        encode_entry(2, b"v two", &mut buf);
        fs.create(&path)?.append(&buf)?;

        let table = recover(&fs, &path)?;
        assert_eq!((Slice::new(b"v1"), true), table.read(1)?);
        assert_eq!((Slice::new(b"v two"), true), table.read(2)?);
        assert_eq!((Slice::new(b"value ten"), true), table.read(10)?);
        assert_eq!((Slice::new(&[]), false), table.read(99)?);

        Ok(())
    }

    #[test]
    fn recover_keeps_last_occurrence_of_a_repeated_key() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("table.0");

        let fs = StdFileSystem;
        let mut buf = Vec::new();
        encode_entry(1, b"old", &mut buf);
        encode_entry(1, b"new", &mut buf);
        fs.create(&path)?.append(&buf)?;

        let table = recover(&fs, &path)?;
        assert_eq!((Slice::new(b"new"), true), table.read(1)?);

        Ok(())
    }

    #[test]
    fn recover_scans_across_chunk_boundaries() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("table.0");

        let fs = StdFileSystem;
        let mut buf = Vec::new();
        // A value large enough that entries straddle the 4096-byte scan chunk.
        let big = vec![7u8; 5000];
        encode_entry(1, &big, &mut buf);
        encode_entry(2, b"after the big one", &mut buf);
        fs.create(&path)?.append(&buf)?;

        let table = recover(&fs, &path)?;
        assert_eq!((Slice::from(big), true), table.read(1)?);
        assert_eq!((Slice::new(b"after the big one"), true), table.read(2)?);

        Ok(())
    }

    #[test]
    fn recover_drops_a_truncated_trailing_entry() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("table.0");

        let fs = StdFileSystem;
        let mut buf = Vec::new();
        encode_entry(1, b"v1", &mut buf);
        let good_len = buf.len();
        encode_entry(2, b"this entry gets cut off", &mut buf);
        buf.truncate(good_len + 5);
        fs.create(&path)?.append(&buf)?;

        let table = recover(&fs, &path)?;
        assert_eq!((Slice::new(b"v1"), true), table.read(1)?);
        assert_eq!((Slice::new(&[]), false), table.read(2)?);

        Ok(())
    }

    #[test]
    fn recover_on_empty_file_yields_empty_table() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("table.0");

        let fs = StdFileSystem;
        fs.create(&path)?;

        let table = recover(&fs, &path)?;
        assert_eq!((Slice::new(&[]), false), table.read(1)?);

        Ok(())
    }
}
