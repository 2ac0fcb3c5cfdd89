// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

/// Represents errors that can occur in the store.
#[derive(Debug)]
pub enum Error {
    /// I/O error.
    ///
    /// Fatal for the operation that raised it. A database that observes one
    /// poisons itself: all further operations on the same handle fail with
    /// [`Error::Poisoned`].
    Io(std::io::Error),

    /// The manifest or a table file held a byte sequence that could not be
    /// parsed, even accounting for the truncated-tail tolerance recovery
    /// extends to table files.
    Corrupt(&'static str),

    /// A previous I/O error has poisoned the database; it can no longer be
    /// used and must be dropped and recovered fresh.
    Poisoned,

    /// The caller violated a precondition, such as writing to a database
    /// that has already been shut down.
    InvalidState(&'static str),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Corrupt(msg) => write!(f, "corrupt data: {msg}"),
            Self::Poisoned => write!(f, "database is poisoned by a previous I/O error"),
            Self::InvalidState(msg) => write!(f, "invalid database state: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Corrupt(_) | Self::Poisoned | Self::InvalidState(_) => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Store result.
pub type Result<T> = std::result::Result<T, Error>;
