// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The database: a mutable write buffer layered over an immutable table,
//! with a compaction step that merges the two into a fresh table.

use crate::{
    fs::{FileHandle, FileSystem, StdFileSystem},
    manifest::{self, TableSlot},
    slice::Slice,
    table::{self, Table},
    table_writer::TableWriter,
    write_buffer::WriteBuffer,
    Error,
};
use std::{
    collections::{HashMap, HashSet},
    mem,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, RwLock,
    },
};

/// The table and the read-only buffer frozen alongside it, installed
/// together so a reader never observes one without the other.
struct Installed<F: FileSystem> {
    table: Arc<Table<F::File>>,
    rbuf: Arc<WriteBuffer>,
}

struct DatabaseInner<F: FileSystem> {
    fs: F,
    dir: PathBuf,
    wbuf: RwLock<Arc<WriteBuffer>>,
    install: RwLock<Installed<F>>,
    compaction_lock: Mutex<()>,
    closed: AtomicBool,
    poisoned: AtomicBool,
}

/// A persistent ordered key-value store for `u64` keys and byte-string
/// values.
///
/// Cheap to clone: every clone shares the same underlying state, mirroring
/// how multiple reader threads are expected to hold their own handle onto
/// one open database.
pub struct Database<F: FileSystem = StdFileSystem> {
    inner: Arc<DatabaseInner<F>>,
}

impl<F: FileSystem> Clone for Database<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: FileSystem> std::ops::Deref for Database<F> {
    type Target = DatabaseInner<F>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

fn lock_err<T>(_: std::sync::PoisonError<T>) -> Error {
    Error::Poisoned
}

impl<F: FileSystem> DatabaseInner<F> {
    fn check_open(&self) -> crate::Result<()> {
        if self.poisoned.load(Ordering::SeqCst) {
            return Err(Error::Poisoned);
        }
        if self.closed.load(Ordering::SeqCst) {
            Err(Error::InvalidState("database has already been shut down"))
        } else {
            Ok(())
        }
    }

    /// Marks the database poisoned after an I/O failure partway through a
    /// mutating operation. Per §7, an I/O failure is fatal for the database,
    /// not just the call that raised it: every operation after this point
    /// fails with [`Error::Poisoned`] until the handle is dropped and the
    /// database recovered fresh.
    fn poison(&self, err: &Error) {
        log::error!("database at {} poisoned by an I/O failure: {err}", self.dir.display());
        self.poisoned.store(true, Ordering::SeqCst);
    }
}

impl<F: FileSystem> Database<F> {
    /// Creates a new, empty database in `dir`, which must not already
    /// contain a database.
    pub fn create(fs: F, dir: PathBuf) -> crate::Result<Self> {
        fs.create_dir_all(&dir)?;

        let table_path = TableSlot::Zero.path_in(&dir);
        let table = TableWriter::new(&fs, table_path)?.close(&fs)?;
        manifest::write(&fs, &dir, TableSlot::Zero)?;

        log::info!("created new database at {}", dir.display());

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                fs,
                dir,
                wbuf: RwLock::new(Arc::new(WriteBuffer::new())),
                install: RwLock::new(Installed {
                    table: Arc::new(table),
                    rbuf: Arc::new(WriteBuffer::new()),
                }),
                compaction_lock: Mutex::new(()),
                closed: AtomicBool::new(false),
                poisoned: AtomicBool::new(false),
            }),
        })
    }

    /// Reopens a database previously created in `dir`.
    ///
    /// Rebuilds the installed table's index by scanning its file, and
    /// removes the other reserved table file if a prior compaction left one
    /// behind without completing.
    pub fn recover(fs: F, dir: PathBuf) -> crate::Result<Self> {
        let slot = manifest::read(&fs, &dir)?;
        let table = table::recover(&fs, &slot.path_in(&dir))?;

        let stale_path = slot.other().path_in(&dir);
        if fs.exists(&stale_path)? {
            log::debug!("removing stale table file {}", stale_path.display());
            fs.delete(&stale_path)?;
        }

        log::info!("recovered database at {}", dir.display());

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                fs,
                dir,
                wbuf: RwLock::new(Arc::new(WriteBuffer::new())),
                install: RwLock::new(Installed {
                    table: Arc::new(table),
                    rbuf: Arc::new(WriteBuffer::new()),
                }),
                compaction_lock: Mutex::new(()),
                closed: AtomicBool::new(false),
                poisoned: AtomicBool::new(false),
            }),
        })
    }

    /// Records a write. Visible to a subsequent `read` for the same key as
    /// soon as this call returns.
    pub fn write(&self, key: u64, value: impl Into<Slice>) -> crate::Result<()> {
        self.check_open()?;

        // Hold the read guard across the insert, not just the clone: `compact`
        // takes the write side of this lock only for its step-2 swap, so
        // dropping the guard early would let a write land in a `wbuf` that's
        // already been frozen into `rbuf` (or discarded after install),
        // silently losing it.
        self.wbuf.read().map_err(lock_err)?.insert(key, value.into());
        Ok(())
    }

    /// Looks up `key`, checking the write buffer, then the frozen buffer of
    /// an in-progress compaction (if any), then the installed table.
    ///
    /// Returns `(empty, false)` if the key has never been written.
    pub fn read(&self, key: u64) -> crate::Result<(Slice, bool)> {
        self.check_open()?;

        let wbuf = self.wbuf.read().map_err(lock_err)?.clone();
        if let Some(value) = wbuf.get(key) {
            return Ok((value, true));
        }

        let (rbuf, table) = {
            let installed = self.install.read().map_err(lock_err)?;
            (installed.rbuf.clone(), installed.table.clone())
        };

        if let Some(value) = rbuf.get(key) {
            return Ok((value, true));
        }

        table.read(key)
    }

    /// Merges the write buffer and the installed table into a new table,
    /// then installs it.
    ///
    /// Writers are not blocked while the merge runs: new writes land in a
    /// fresh write buffer and are layered back on top once compaction
    /// installs its result. A concurrent `compact` call waits for this one
    /// to finish, then runs its own full pass even if there is nothing new
    /// to merge.
    ///
    /// Any I/O failure partway through poisons the database (§7): the
    /// `rbuf` frozen by this call's step 2 may otherwise be the only
    /// remaining reference to writes still owed to a future compaction, and
    /// leaving the database open would let a later `compact` silently
    /// overwrite that reference and lose them.
    pub fn compact(&self) -> crate::Result<()> {
        self.check_open()?;
        let _compaction_guard = self.compaction_lock.lock().map_err(lock_err)?;

        self.compact_locked().inspect_err(|err| self.poison(err))
    }

    /// The body of `compact`, run under `compaction_lock`. Returning `Err`
    /// from here always poisons the database; see `compact`.
    fn compact_locked(&self) -> crate::Result<()> {
        // A previous compaction must have installed its result (clearing
        // `rbuf`) before releasing `compaction_lock`. If it instead failed
        // partway through, `check_open` above already refused to run this
        // compaction at all, since that failure poisons the database. A
        // non-empty `rbuf` here is therefore a bug, not a race.
        let rbuf_already_frozen = self.install.read().map_err(lock_err)?.rbuf.clone();
        if !rbuf_already_frozen.is_empty() {
            return Err(Error::InvalidState(
                "compact invoked while a previous compaction's rbuf is still non-empty",
            ));
        }

        let rbuf = {
            let mut wbuf_guard = self.wbuf.write().map_err(lock_err)?;
            let mut install_guard = self.install.write().map_err(lock_err)?;

            let frozen = mem::replace(&mut *wbuf_guard, Arc::new(WriteBuffer::new()));
            install_guard.rbuf = Arc::clone(&frozen);
            frozen
        };

        let old_slot = manifest::read(&self.fs, &self.dir)?;
        let new_slot = old_slot.other();
        let new_path = new_slot.path_in(&self.dir);

        let old_table = { self.install.read().map_err(lock_err)?.table.clone() };

        let overlay: HashMap<u64, Slice> = rbuf.iter().collect();
        let mut seen: HashSet<u64> = HashSet::new();

        let mut writer = TableWriter::new(&self.fs, new_path)?;

        for key in old_table.keys() {
            let value = if let Some(value) = overlay.get(&key) {
                value.clone()
            } else {
                let (value, present) = old_table.read(key)?;
                if !present {
                    continue;
                }
                value
            };
            writer.put(key, &value);
            seen.insert(key);
        }

        for (key, value) in &overlay {
            if !seen.contains(key) {
                writer.put(*key, value);
            }
        }

        let new_table = writer.close(&self.fs)?;

        {
            let mut install_guard = self.install.write().map_err(lock_err)?;
            install_guard.table = Arc::new(new_table);
            install_guard.rbuf = Arc::new(WriteBuffer::new());
        }

        manifest::write(&self.fs, &self.dir, new_slot)?;
        self.fs.delete(old_table.path())?;

        log::debug!("compaction installed table {}", new_slot.file_name());

        Ok(())
    }

    /// Discards the write buffer and drops in-memory state, keeping the
    /// installed table's files on disk. Writes that were never compacted
    /// are lost; call [`Database::close`] instead to flush them first.
    pub fn shutdown(&self) -> crate::Result<()> {
        let _compaction_guard = self.compaction_lock.lock().map_err(lock_err)?;

        if self.poisoned.load(Ordering::SeqCst) {
            return Err(Error::Poisoned);
        }

        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(Error::InvalidState("database has already been shut down"));
        }

        log::debug!("shutting down database at {}", self.dir.display());
        Ok(())
    }

    /// Flushes the write buffer into the installed table via a compaction,
    /// then shuts down. After `close`, every write ever issued survives a
    /// subsequent [`Database::recover`].
    pub fn close(&self) -> crate::Result<()> {
        self.compact()?;
        self.shutdown()
    }
}
