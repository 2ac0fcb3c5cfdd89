// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The manifest: a one-byte file naming which of the two reserved table
//! files is currently authoritative.

use crate::{
    file::{rewrite_atomic, MANIFEST_FILE, TABLE_FILE_NAMES},
    fs::{FileHandle, FileSystem},
    Error,
};
use std::path::{Path, PathBuf};

/// Identifies one of the two reserved table file slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableSlot {
    /// `table.0`
    Zero,
    /// `table.1`
    One,
}

impl TableSlot {
    /// The slot not currently referenced by `self`.
    #[must_use]
    pub fn other(self) -> Self {
        match self {
            Self::Zero => Self::One,
            Self::One => Self::Zero,
        }
    }

    /// The reserved file name for this slot.
    #[must_use]
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Zero => TABLE_FILE_NAMES[0],
            Self::One => TABLE_FILE_NAMES[1],
        }
    }

    /// The full path of this slot's table file inside `dir`.
    #[must_use]
    pub fn path_in(self, dir: &Path) -> PathBuf {
        dir.join(self.file_name())
    }

    fn to_byte(self) -> u8 {
        match self {
            Self::Zero => b'0',
            Self::One => b'1',
        }
    }

    fn from_byte(byte: u8) -> crate::Result<Self> {
        match byte {
            b'0' => Ok(Self::Zero),
            b'1' => Ok(Self::One),
            _ => Err(Error::Corrupt("manifest byte is neither '0' nor '1'")),
        }
    }
}

/// Rewrites the manifest to point at `slot`, atomically.
pub fn write<F: FileSystem>(fs: &F, dir: &Path, slot: TableSlot) -> crate::Result<()> {
    rewrite_atomic(fs, &dir.join(MANIFEST_FILE), &[slot.to_byte()])
}

/// Reads the manifest and returns the slot it currently references.
pub fn read<F: FileSystem>(fs: &F, dir: &Path) -> crate::Result<TableSlot> {
    let file = fs.open(&dir.join(MANIFEST_FILE))?;
    let bytes = file.read_at(0, 1)?;
    let &byte = bytes
        .first()
        .ok_or(Error::Corrupt("manifest file is empty"))?;
    TableSlot::from_byte(byte)
}
