//! # Index File Manager
//!
//! Owns `<filename>.idx`: the 24-byte header at offset 0, followed by a sequence of
//! `NODE_SIZE`-byte node slots. Slot `i` lives at `HEADER_SIZE + NODE_SIZE * i`.
//! Allocation only ever appends; a freed slot (see `storage::delete`) is never
//! reused — reclaiming that space is left to an external offline rebuild.
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use bincode::{Decode, Encode};
use tracing::{debug, trace};

use super::node::{Node, NODE_SIZE};
use crate::errors::{err, Error};

pub const HEADER_SIZE: usize = 24;

#[derive(Encode, Decode, Debug, Clone, Copy)]
pub struct Header {
    /// Offset of the root node; meaningful only when `tree_height > 0`.
    pub root_offset: u64,
    /// 0 when the tree is empty, >= 1 otherwise.
    pub tree_height: u64,
    /// Number of physical node slots ever allocated. Defines the append frontier.
    pub node_cnt: u64,
}

impl Header {
    fn empty() -> Self {
        Header {
            root_offset: HEADER_SIZE as u64,
            tree_height: 0,
            node_cnt: 0,
        }
    }

    /// Three raw little-endian `u64`s, fixed at `HEADER_SIZE` bytes — spec.md §3/§6
    /// require this exact layout, so integer encoding must be pinned to fixed-width;
    /// `bincode::config::standard()`'s default varint encoding would make the header's
    /// size vary with the values it holds.
    fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        let written = bincode::encode_into_slice(
            self,
            &mut buf,
            bincode::config::standard().with_fixed_int_encoding(),
        )
        .expect("fixed-width header always fits HEADER_SIZE bytes");
        debug_assert_eq!(written, HEADER_SIZE);
        buf
    }

    fn decode(buf: &[u8]) -> Result<Self, Error> {
        let (header, _): (Header, usize) = bincode::decode_from_slice(
            buf,
            bincode::config::standard().with_fixed_int_encoding(),
        )
        .map_err(|e| err!(Corruption, "failed to decode index header: {}", e))?;
        Ok(header)
    }
}

pub struct IndexFile {
    file: File,
    pub header: Header,
}

impl IndexFile {
    /// Opens `path` (exactly as given, caller appends `.idx`), creating it with a
    /// zeroed header if it doesn't exist yet.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let existed = path.exists();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        let header = if existed && file.metadata()?.len() >= HEADER_SIZE as u64 {
            let mut buf = [0u8; HEADER_SIZE];
            file.read_exact(&mut buf)?;
            Header::decode(&buf)?
        } else {
            let header = Header::empty();
            file.seek(SeekFrom::Start(0))?;
            file.write_all(&header.encode())?;
            file.flush()?;
            header
        };

        debug!(
            path = %path.display(),
            tree_height = header.tree_height,
            node_cnt = header.node_cnt,
            "Opened index file"
        );
        Ok(IndexFile { file, header })
    }

    fn slot_offset(node_cnt: u64) -> u64 {
        HEADER_SIZE as u64 + NODE_SIZE as u64 * node_cnt
    }

    pub fn read_node(&mut self, offset: u64) -> Result<Node, Error> {
        trace!(offset, "Reading index node");
        self.file.seek(SeekFrom::Start(offset))?;
        let mut buf = [0u8; NODE_SIZE];
        self.file.read_exact(&mut buf)?;
        Node::decode(&buf)
    }

    /// Writes `node` at `offset` and flushes.
    pub fn write_node(&mut self, offset: u64, node: &Node) -> Result<(), Error> {
        trace!(offset, "Writing index node");
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(node.encode().as_slice())?;
        self.file.flush()?;
        Ok(())
    }

    /// Appends `node` as a brand new slot and returns its offset. Slots are never
    /// reused: `free_node` (see `storage::delete`) is a deliberate no-op.
    pub fn alloc_node(&mut self, node: &Node) -> Result<u64, Error> {
        let offset = Self::slot_offset(self.header.node_cnt);
        self.write_node(offset, node)?;
        self.header.node_cnt += 1;
        Ok(offset)
    }

    /// Persists the in-memory header back to offset 0.
    pub fn flush_header(&mut self) -> Result<(), Error> {
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&self.header.encode())?;
        self.file.flush()?;
        Ok(())
    }

    /// Resets the header to the empty-tree state (used when `erase` drains the
    /// last entry from the root). Allocated slots are left in place, leaked.
    pub fn reset_to_empty(&mut self) {
        self.header = Header::empty();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_a_zeroed_header_when_absent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.idx");
        let idx = IndexFile::open(&path).unwrap();
        assert_eq!(idx.header.tree_height, 0);
        assert_eq!(idx.header.node_cnt, 0);
        assert_eq!(idx.header.root_offset, HEADER_SIZE as u64);
    }

    #[test]
    fn alloc_then_reopen_preserves_nodes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.idx");

        let offset = {
            let mut idx = IndexFile::open(&path).unwrap();
            let mut node = Node::new_leaf();
            node.key_cnt = 1;
            node.keys[0] = 7;
            node.children[0] = 123;
            let offset = idx.alloc_node(&node).unwrap();
            idx.header.tree_height = 1;
            idx.header.root_offset = offset;
            idx.flush_header().unwrap();
            offset
        };

        let mut idx = IndexFile::open(&path).unwrap();
        assert_eq!(idx.header.node_cnt, 1);
        assert_eq!(idx.header.root_offset, offset);
        let node = idx.read_node(offset).unwrap();
        assert_eq!(node.keys[0], 7);
        assert_eq!(node.children[0], 123);
    }
}
