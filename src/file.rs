// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Well-known file names and the atomic-rewrite helper used by the manifest.

use crate::fs::{FileHandle, FileSystem};
use std::path::Path;

/// Reserved table file names. At most two tables ever exist in a directory;
/// the manifest says which one is authoritative.
pub const TABLE_FILE_NAMES: [&str; 2] = ["table.0", "table.1"];

/// Name of the tiny manifest file (one byte: ASCII `'0'` or `'1'`).
pub const MANIFEST_FILE: &str = "manifest";

/// Suffix used for the temporary file an atomic rewrite stages through.
const TEMP_SUFFIX: &str = ".tmp";

/// Atomically rewrites `path` to hold exactly `content`.
///
/// Writes to a sibling temporary file and renames it into place, so a reader
/// opening `path` concurrently never observes a partially written manifest.
/// No fsync is issued here: a crash between the write and the rename can
/// still lose the rename itself at the OS level, so this guards against
/// partial writes, not against power loss.
pub fn rewrite_atomic<F: FileSystem>(fs: &F, path: &Path, content: &[u8]) -> crate::Result<()> {
    let mut temp_path = path.as_os_str().to_owned();
    temp_path.push(TEMP_SUFFIX);
    let temp_path = Path::new(&temp_path);

    let temp_file = fs.create(temp_path)?;
    temp_file.append(content)?;
    drop(temp_file);

    fs.rename(temp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::StdFileSystem;
    use test_log::test;

    #[test]
    fn atomic_rewrite_replaces_contents() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("test.txt");

        let fs = StdFileSystem;
        fs.create(&path)?.append(b"old content")?;

        rewrite_atomic(&fs, &path, b"new content")?;

        let file = fs.open(&path)?;
        assert_eq!(b"new content".to_vec(), file.read_at(0, 32)?);

        Ok(())
    }
}
