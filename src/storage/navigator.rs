//! # Tree Navigator
//!
//! Pure descent: no mutation, no allocation. Both procedures walk internal
//! nodes by the maximum-key routing discipline — at each internal node, take
//! the smallest `i` with `key <= keys[i]`, since `keys[i]` is the max key of
//! the subtree at `children[i]`.
use super::index_file::IndexFile;
use super::node::{NodeType, SENTINEL};
use crate::errors::Error;

/// Smallest `i < key_cnt` with `key <= keys[i]`, or `None` if `key` exceeds
/// every key in the node (i.e. it's past the node's maximum).
fn smallest_index_at_least(keys: &[u64], key_cnt: usize, key: u64) -> Option<usize> {
    (0..key_cnt).find(|&i| key <= keys[i])
}

/// Descends to the leaf entry for `key` and returns its data-file offset, or
/// `SENTINEL` if the tree is empty or `key` is absent.
pub fn locate_leaf_offset(index: &mut IndexFile, key: u64) -> Result<u64, Error> {
    if index.header.tree_height == 0 {
        return Ok(SENTINEL);
    }

    let mut offset = index.header.root_offset;
    loop {
        let node = index.read_node(offset)?;
        match node.node_type {
            NodeType::Internal => match smallest_index_at_least(&node.keys[..], node.key_cnt, key)
            {
                Some(i) => offset = node.children[i],
                None => return Ok(SENTINEL),
            },
            NodeType::Leaf => {
                for i in 0..node.key_cnt {
                    if node.keys[i] == key {
                        return Ok(node.children[i]);
                    }
                }
                return Ok(SENTINEL);
            }
        }
    }
}

/// Descends to the leaf that would contain `left` (the entry point for a
/// range scan starting at `left`) and returns that leaf's *node* offset, or
/// `SENTINEL` if `left` is past every key in the tree.
pub fn locate_range_leaf(index: &mut IndexFile, left: u64) -> Result<u64, Error> {
    if index.header.tree_height == 0 {
        return Ok(SENTINEL);
    }

    let mut offset = index.header.root_offset;
    loop {
        let node = index.read_node(offset)?;
        if left > node.keys[node.key_cnt - 1] {
            return Ok(SENTINEL);
        }
        match node.node_type {
            NodeType::Internal => {
                let i = smallest_index_at_least(&node.keys[..], node.key_cnt, left)
                    .expect("left <= max key was just checked above");
                offset = node.children[i];
            }
            NodeType::Leaf => return Ok(offset),
        }
    }
}
