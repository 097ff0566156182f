//! # Range Engine
//!
//! A half-open range scan descends once to the entry leaf, then walks the
//! leaf chain via `next_leaf` until the current leaf's maximum key reaches
//! `right` or the chain ends.
use super::data_file::DataFile;
use super::index_file::IndexFile;
use super::navigator::locate_range_leaf;
use super::node::SENTINEL;
use crate::errors::Error;

/// Returns every value whose key satisfies `left <= key < right`, in
/// ascending key order.
pub fn find_range(
    index: &mut IndexFile,
    data: &mut DataFile,
    left: u64,
    right: u64,
) -> Result<Vec<Vec<u8>>, Error> {
    let mut results = Vec::new();
    if index.header.tree_height == 0 {
        return Ok(results);
    }

    let mut leaf_offset = locate_range_leaf(index, left)?;
    if leaf_offset == SENTINEL {
        return Ok(results);
    }

    loop {
        let leaf = index.read_node(leaf_offset)?;
        for i in 0..leaf.key_cnt {
            if leaf.keys[i] >= left && leaf.keys[i] < right {
                results.push(data.read(leaf.children[i])?);
            }
        }
        let exhausted = leaf.keys[leaf.key_cnt - 1] >= right || leaf.next_leaf == 0;
        if exhausted {
            break;
        }
        leaf_offset = leaf.next_leaf;
    }

    Ok(results)
}
