//! # Insert Engine
//!
//! Top-down, preemptive split: before descending into a child, the engine makes
//! sure that child has room, so the recursive call below never needs to ascend
//! back up to fix an overflow. `split_ith_child` is the one place a node is
//! actually divided; `insert_nonfull` is the recursive descent that calls it
//! just before stepping into a full child.
use tracing::{debug, trace, warn};

use super::data_file::DataFile;
use super::index_file::IndexFile;
use super::node::{Node, NodeType, HALF, ORDER};
use crate::errors::Error;

/// Splits the full child at `parent.children[i]` into itself (kept as the left
/// half) and a freshly allocated right sibling, then threads the new sibling
/// into `parent`. Leaves get their `next_leaf` chain relinked so a range scan
/// still walks every entry in order.
fn split_ith_child(index: &mut IndexFile, parent_offset: u64, i: usize) -> Result<(), Error> {
    let mut parent = index.read_node(parent_offset)?;
    let left_offset = parent.children[i];
    let mut left = index.read_node(left_offset)?;
    debug_assert_eq!(left.key_cnt, ORDER, "split_ith_child requires a full child");

    let mut right = match left.node_type {
        NodeType::Internal => Node::new_internal(),
        NodeType::Leaf => Node::new_leaf(),
    };
    right.key_cnt = HALF;
    right.keys[..HALF].copy_from_slice(&left.keys[HALF..ORDER]);
    right.children[..HALF].copy_from_slice(&left.children[HALF..ORDER]);
    if left.is_leaf() {
        right.next_leaf = left.next_leaf;
    }

    let right_offset = index.alloc_node(&right)?;
    if left.is_leaf() {
        left.next_leaf = right_offset;
    }
    left.key_cnt = HALF;

    for j in (i..parent.key_cnt).rev() {
        parent.keys[j + 1] = parent.keys[j];
    }
    for j in (i + 1..parent.key_cnt).rev() {
        parent.children[j + 1] = parent.children[j];
    }
    parent.keys[i] = left.keys[HALF - 1];
    parent.children[i + 1] = right_offset;
    parent.key_cnt += 1;

    debug!(
        parent_offset,
        left_offset, right_offset, "Split node during insert"
    );
    index.write_node(parent_offset, &parent)?;
    index.write_node(left_offset, &left)?;
    index.write_node(right_offset, &right)?;
    Ok(())
}

/// Recursive descent into a node guaranteed to have `key_cnt < ORDER`.
fn insert_nonfull(
    index: &mut IndexFile,
    data: &mut DataFile,
    offset: u64,
    key: u64,
    value: &[u8],
) -> Result<bool, Error> {
    let mut node = index.read_node(offset)?;

    if node.is_leaf() {
        for j in 0..node.key_cnt {
            if node.keys[j] == key {
                return Ok(false);
            }
        }
        let mut i = node.key_cnt;
        while i > 0 && key < node.keys[i - 1] {
            node.keys[i] = node.keys[i - 1];
            node.children[i] = node.children[i - 1];
            i -= 1;
        }
        node.keys[i] = key;
        node.children[i] = data.append(value)?;
        node.key_cnt += 1;
        index.write_node(offset, &node)?;
        return Ok(true);
    }

    let mut i = (0..node.key_cnt).find(|&j| key <= node.keys[j]);
    if i.is_none() {
        // `key` extends the subtree's maximum: fix the routing key before descending.
        node.keys[node.key_cnt - 1] = key;
        index.write_node(offset, &node)?;
        i = Some(node.key_cnt - 1);
    }
    let mut i = i.unwrap();

    let child_full = index.read_node(node.children[i])?.key_cnt == ORDER;
    if child_full {
        trace!(offset, i, "Child full, splitting before descent");
        split_ith_child(index, offset, i)?;
        node = index.read_node(offset)?;
        if key > node.keys[i] {
            i += 1;
        }
    }

    insert_nonfull(index, data, node.children[i], key, value)
}

/// Inserts `(key, value)`. Returns `false` iff `key` is already present — no
/// mutation happens in that case.
pub fn insert(index: &mut IndexFile, data: &mut DataFile, key: u64, value: &[u8]) -> Result<bool, Error> {
    if index.header.tree_height == 0 {
        let mut leaf = Node::new_leaf();
        leaf.key_cnt = 1;
        leaf.keys[0] = key;
        leaf.children[0] = data.append(value)?;
        leaf.next_leaf = 0;
        let offset = index.alloc_node(&leaf)?;
        index.header.root_offset = offset;
        index.header.tree_height = 1;
        return Ok(true);
    }

    let root = index.read_node(index.header.root_offset)?;
    if root.key_cnt == ORDER {
        let mut new_root = Node::new_internal();
        new_root.key_cnt = 1;
        new_root.keys[0] = root.keys[ORDER - 1];
        new_root.children[0] = index.header.root_offset;
        let new_root_offset = index.alloc_node(&new_root)?;
        index.header.root_offset = new_root_offset;
        warn!(new_root_offset, "Root full, growing tree height");
        split_ith_child(index, new_root_offset, 0)?;
        index.header.tree_height += 1;
    }

    insert_nonfull(index, data, index.header.root_offset, key, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open(dir: &std::path::Path) -> (IndexFile, DataFile) {
        (
            IndexFile::open(&dir.join("t.idx")).unwrap(),
            DataFile::open(&dir.join("t.dat")).unwrap(),
        )
    }

    #[test]
    fn first_insert_creates_a_single_leaf_root() {
        let dir = tempdir().unwrap();
        let (mut idx, mut data) = open(dir.path());
        assert!(insert(&mut idx, &mut data, 1, b"a").unwrap());
        assert_eq!(idx.header.tree_height, 1);
        let root = idx.read_node(idx.header.root_offset).unwrap();
        assert_eq!(root.key_cnt, 1);
        assert_eq!(root.keys[0], 1);
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let dir = tempdir().unwrap();
        let (mut idx, mut data) = open(dir.path());
        assert!(insert(&mut idx, &mut data, 1, b"a").unwrap());
        assert!(!insert(&mut idx, &mut data, 1, b"b").unwrap());
    }

    #[test]
    fn inserting_order_plus_one_keys_splits_the_root() {
        let dir = tempdir().unwrap();
        let (mut idx, mut data) = open(dir.path());
        for k in 1..=(ORDER as u64 + 1) {
            assert!(insert(&mut idx, &mut data, k, format!("v{}", k).as_bytes()).unwrap());
        }
        assert!(idx.header.tree_height >= 2);
        let root = idx.read_node(idx.header.root_offset).unwrap();
        assert!(!root.is_leaf());
        assert!(root.key_cnt >= 2);
    }
}
