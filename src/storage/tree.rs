//! # Public API
//!
//! `Tree` is the single entry point consumers of this crate use: it owns both
//! on-disk files and dispatches each operation to the engine module that
//! implements it. The tree itself never suspends or retries; every method
//! here may block on file I/O and is not reentrant (see `DESIGN.md` and
//! spec's concurrency section — this crate is single-threaded by design).
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::data_file::DataFile;
use super::delete;
use super::index_file::IndexFile;
use super::insert;
use super::navigator::locate_leaf_offset;
use super::node::SENTINEL;
use super::range;
use crate::errors::Error;

fn with_appended_extension(path: &Path, ext: &str) -> PathBuf {
    let mut os: OsString = path.as_os_str().to_os_string();
    os.push(".");
    os.push(ext);
    PathBuf::from(os)
}

/// A persistent B+ tree keyed by `u64`, with arbitrary byte-string values,
/// backed by a `<path>.idx` index file and a `<path>.dat` data file.
pub struct Tree {
    index: IndexFile,
    data: DataFile,
}

impl Tree {
    /// Opens (creating if absent) `<path>.idx` and `<path>.dat`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let index = IndexFile::open(&with_appended_extension(path, "idx"))?;
        let data = DataFile::open(&with_appended_extension(path, "dat"))?;
        info!(path = %path.display(), "Opened tree");
        Ok(Tree { index, data })
    }

    /// Inserts `(key, value)`. Returns `false` iff `key` is already present.
    pub fn insert(&mut self, key: u64, value: &[u8]) -> Result<bool, Error> {
        insert::insert(&mut self.index, &mut self.data, key, value)
    }

    /// Looks up `key`. `None` if absent or the tree is empty.
    pub fn find(&mut self, key: u64) -> Result<Option<Vec<u8>>, Error> {
        let offset = locate_leaf_offset(&mut self.index, key)?;
        if offset == SENTINEL {
            return Ok(None);
        }
        Ok(Some(self.data.read(offset)?))
    }

    /// Returns every value with `left <= key < right`, in ascending key order.
    pub fn find_range(&mut self, left: u64, right: u64) -> Result<Vec<Vec<u8>>, Error> {
        range::find_range(&mut self.index, &mut self.data, left, right)
    }

    /// Replaces the value at `key`. Returns `false` iff the tree is empty or
    /// `key` is absent.
    ///
    /// Tries an in-place update first; if the existing record's capacity is
    /// too small, falls back to erase-then-reinsert. That fallback's own
    /// outcome isn't re-checked — matching the source this engine is modeled
    /// on, `update` reports `true` once it has committed to the fallback path.
    pub fn update(&mut self, key: u64, value: &[u8]) -> Result<bool, Error> {
        if self.index.header.tree_height == 0 {
            return Ok(false);
        }
        let offset = locate_leaf_offset(&mut self.index, key)?;
        if offset == SENTINEL {
            return Ok(false);
        }
        if !self.data.update_in_place(offset, value)? {
            warn!(key, "In-place update exceeded capacity, reinserting");
            delete::erase(&mut self.index, &mut self.data, key)?;
            insert::insert(&mut self.index, &mut self.data, key, value)?;
        }
        Ok(true)
    }

    /// Erases `key`. Returns `false` iff the tree is empty or `key` is absent.
    pub fn erase(&mut self, key: u64) -> Result<bool, Error> {
        delete::erase(&mut self.index, &mut self.data, key)
    }

    /// Flushes the index header and releases both files.
    pub fn close(mut self) -> Result<(), Error> {
        self.index.flush_header()
    }
}

impl Drop for Tree {
    fn drop(&mut self) {
        if let Err(e) = self.index.flush_header() {
            warn!(error = %e, "Failed to flush index header on drop");
        }
    }
}
