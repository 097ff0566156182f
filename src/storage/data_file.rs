//! # Data File Manager
//!
//! Owns `<filename>.dat`: a sequence of length-prefixed value records, each
//! `size (u64 LE) || payload[size] || 0x00`, referenced by the byte offset of
//! `size`. Records are append-only; `erase` and a capacity-losing `update` both
//! leave their old record in place, orphaned, until an external compaction.
//!
//! The leading 8 bytes do double duty: on the initial write they hold the
//! record's capacity, and an in-place update overwrites them with the new
//! length. Because the two share storage, an update that shrinks a value also
//! shrinks the ceiling future updates are checked against — the record never
//! regains the capacity it started with. `storage::tree::Tree::update` papers
//! over this by falling back to erase-then-reinsert when `update_in_place`
//! reports no room (see `DESIGN.md`).
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::trace;

use crate::errors::Error;

pub struct DataFile {
    file: File,
}

impl DataFile {
    pub fn open(path: &Path) -> Result<Self, Error> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        Ok(DataFile { file })
    }

    /// Appends `bytes` as a new record and returns the offset of its length
    /// prefix.
    pub fn append(&mut self, bytes: &[u8]) -> Result<u64, Error> {
        let offset = self.file.seek(SeekFrom::End(0))?;
        self.file.write_all(&(bytes.len() as u64).to_le_bytes())?;
        self.file.write_all(bytes)?;
        self.file.write_all(&[0u8])?;
        self.file.flush()?;
        trace!(offset, size = bytes.len(), "Appended value record");
        Ok(offset)
    }

    /// Reads the record at `offset`. The trailing NUL is consumed but not
    /// returned.
    pub fn read(&mut self, offset: u64) -> Result<Vec<u8>, Error> {
        self.file.seek(SeekFrom::Start(offset))?;
        let mut len_buf = [0u8; 8];
        self.file.read_exact(&mut len_buf)?;
        let len = u64::from_le_bytes(len_buf) as usize;
        let mut payload = vec![0u8; len];
        self.file.read_exact(&mut payload)?;
        Ok(payload)
    }

    /// Overwrites the record at `offset` with `bytes` if it still fits within
    /// the capacity recorded there. Returns `false` with no writes otherwise.
    pub fn update_in_place(&mut self, offset: u64, bytes: &[u8]) -> Result<bool, Error> {
        self.file.seek(SeekFrom::Start(offset))?;
        let mut cap_buf = [0u8; 8];
        self.file.read_exact(&mut cap_buf)?;
        let cap = u64::from_le_bytes(cap_buf);
        if cap < bytes.len() as u64 {
            return Ok(false);
        }
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&(bytes.len() as u64).to_le_bytes())?;
        self.file.write_all(bytes)?;
        self.file.write_all(&[0u8])?;
        self.file.flush()?;
        trace!(offset, size = bytes.len(), "Updated value record in place");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn append_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let mut data = DataFile::open(&dir.path().join("t.dat")).unwrap();
        let offset = data.append(b"hello").unwrap();
        assert_eq!(data.read(offset).unwrap(), b"hello");
    }

    #[test]
    fn update_in_place_fits_within_capacity() {
        let dir = tempdir().unwrap();
        let mut data = DataFile::open(&dir.path().join("t.dat")).unwrap();
        let offset = data.append(b"abcd").unwrap();
        assert!(data.update_in_place(offset, b"xy").unwrap());
        assert_eq!(data.read(offset).unwrap(), b"xy");
    }

    #[test]
    fn update_in_place_rejects_when_capacity_exceeded() {
        let dir = tempdir().unwrap();
        let mut data = DataFile::open(&dir.path().join("t.dat")).unwrap();
        let offset = data.append(b"a").unwrap();
        assert!(!data.update_in_place(offset, b"ab").unwrap());
        // no write happened: record is untouched
        assert_eq!(data.read(offset).unwrap(), b"a");
    }

    #[test]
    fn shrinking_update_permanently_lowers_the_capacity_ceiling() {
        let dir = tempdir().unwrap();
        let mut data = DataFile::open(&dir.path().join("t.dat")).unwrap();
        let offset = data.append(b"abcd").unwrap();
        assert!(data.update_in_place(offset, b"xy").unwrap());
        // capacity is now 2 (== the shrunk size), so a 3-byte value no longer fits
        // even though the original record held 4 bytes.
        assert!(!data.update_in_place(offset, b"abc").unwrap());
    }
}
