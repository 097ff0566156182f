//! # Delete Engine
//!
//! Top-down, preemptive rebalance: before descending into a child that would
//! underflow, the engine borrows from a sibling or merges, so the recursive
//! call below never has to ascend to fix an underflow. Every visited node
//! (other than the root) is guaranteed `key_cnt >= HALF` on entry and stays
//! that way on exit.
use tracing::{debug, trace};

use super::data_file::DataFile;
use super::index_file::IndexFile;
use super::node::{Node, HALF, ORDER};
use crate::errors::Error;

/// Smallest `i < key_cnt` with `keys[i] >= key`, or `key_cnt` if `key` exceeds
/// every key in the node.
fn find_idx(keys: &[u64], key_cnt: usize, key: u64) -> usize {
    (0..key_cnt).find(|&i| keys[i] >= key).unwrap_or(key_cnt)
}

/// Merges `children[i + 1]` into `children[i]` (both assumed `key_cnt == HALF`)
/// and removes the now-redundant key/child slot from `parent`. The right
/// sibling's slot is leaked, never reclaimed (see `storage::index_file`).
fn merge_child(index: &mut IndexFile, parent_offset: u64, i: usize) -> Result<(), Error> {
    let mut parent = index.read_node(parent_offset)?;
    let left_offset = parent.children[i];
    let right_offset = parent.children[i + 1];
    let mut left = index.read_node(left_offset)?;
    let right = index.read_node(right_offset)?;
    debug_assert_eq!(left.key_cnt, HALF);
    debug_assert_eq!(right.key_cnt, HALF);

    left.keys[HALF..ORDER].copy_from_slice(&right.keys[..HALF]);
    left.children[HALF..ORDER].copy_from_slice(&right.children[..HALF]);
    if left.is_leaf() {
        // The source's merge_child leaves this unset, breaking range scans
        // across a merged boundary; this engine relinks the chain.
        left.next_leaf = right.next_leaf;
    }
    left.key_cnt = ORDER;

    parent.key_cnt -= 1;
    for j in i..parent.key_cnt {
        parent.keys[j] = parent.keys[j + 1];
    }
    for j in (i + 1)..parent.key_cnt {
        parent.children[j] = parent.children[j + 1];
    }

    debug!(parent_offset, left_offset, right_offset, "Merged sibling nodes");
    index.write_node(left_offset, &left)?;
    index.write_node(parent_offset, &parent)?;
    Ok(())
}

/// Shifts `node`'s entries left by one, starting one past `child`, to make
/// `node.keys[0]`/`children[0]` room for `child`'s last entry.
fn shift_right_by_one(node: &mut Node) {
    for j in (0..node.key_cnt).rev() {
        node.keys[j + 1] = node.keys[j];
        node.children[j + 1] = node.children[j];
    }
}

fn shift_left_by_one(node: &mut Node) {
    for j in 0..node.key_cnt - 1 {
        node.keys[j] = node.keys[j + 1];
        node.children[j] = node.children[j + 1];
    }
    node.key_cnt -= 1;
}

/// Rebalances the child at `parent.children[i]` (known to have `key_cnt ==
/// HALF`) by borrowing from a sibling with slack, or, failing that, merging.
/// Returns the (possibly shifted) index of the child to descend into next.
fn rebalance_child(index: &mut IndexFile, parent_offset: u64, i: usize) -> Result<usize, Error> {
    let parent = index.read_node(parent_offset)?;

    if i > 0 {
        let left_sibling_offset = parent.children[i - 1];
        let mut left_sibling = index.read_node(left_sibling_offset)?;
        if left_sibling.key_cnt > HALF {
            let mut child = index.read_node(parent.children[i])?;
            shift_right_by_one(&mut child);
            child.keys[0] = left_sibling.keys[left_sibling.key_cnt - 1];
            child.children[0] = left_sibling.children[left_sibling.key_cnt - 1];
            child.key_cnt += 1;
            left_sibling.key_cnt -= 1;

            let mut parent = parent;
            parent.keys[i - 1] = left_sibling.keys[left_sibling.key_cnt - 1];

            trace!(parent_offset, i, "Borrowed from left sibling");
            index.write_node(parent.children[i], &child)?;
            index.write_node(left_sibling_offset, &left_sibling)?;
            index.write_node(parent_offset, &parent)?;
            return Ok(i);
        }
    }

    if i < parent.key_cnt - 1 {
        let right_sibling_offset = parent.children[i + 1];
        let mut right_sibling = index.read_node(right_sibling_offset)?;
        if right_sibling.key_cnt > HALF {
            let mut child = index.read_node(parent.children[i])?;
            child.keys[child.key_cnt] = right_sibling.keys[0];
            child.children[child.key_cnt] = right_sibling.children[0];
            child.key_cnt += 1;
            shift_left_by_one(&mut right_sibling);

            let mut parent = parent;
            parent.keys[i] = child.keys[child.key_cnt - 1];

            trace!(parent_offset, i, "Borrowed from right sibling");
            index.write_node(parent.children[i], &child)?;
            index.write_node(right_sibling_offset, &right_sibling)?;
            index.write_node(parent_offset, &parent)?;
            return Ok(i);
        }
    }

    if i < parent.key_cnt - 1 {
        merge_child(index, parent_offset, i)?;
        Ok(i)
    } else {
        merge_child(index, parent_offset, i - 1)?;
        Ok(i - 1)
    }
}

/// Erases `key` from the subtree at `offset`, which is guaranteed to be
/// either the root or to already satisfy `key_cnt >= HALF + 1`.
fn erase_nonunderflow(
    index: &mut IndexFile,
    key: u64,
    offset: u64,
) -> Result<bool, Error> {
    let node = index.read_node(offset)?;
    let i = find_idx(&node.keys[..], node.key_cnt, key);
    if i >= node.key_cnt {
        return Ok(false);
    }

    if node.is_leaf() {
        if node.keys[i] != key {
            return Ok(false);
        }
        let mut node = node;
        for j in i..node.key_cnt - 1 {
            node.keys[j] = node.keys[j + 1];
            node.children[j] = node.children[j + 1];
        }
        node.key_cnt -= 1;
        // The value record at the removed entry's offset is leaked.
        index.write_node(offset, &node)?;
        return Ok(true);
    }

    let mut i = i;
    let child = index.read_node(node.children[i])?;
    if child.key_cnt == HALF {
        i = rebalance_child(index, offset, i)?;
    }

    let node_after_rebalance = index.read_node(offset)?;
    let res = erase_nonunderflow(index, key, node_after_rebalance.children[i])?;

    let parent = index.read_node(offset)?;
    let child = index.read_node(parent.children[i])?;
    if parent.keys[i] != child.keys[child.key_cnt - 1] {
        let mut parent = parent;
        parent.keys[i] = child.keys[child.key_cnt - 1];
        index.write_node(offset, &parent)?;
    }
    Ok(res)
}

/// Erases `key`. Returns `false` iff the tree is empty or `key` is absent.
pub fn erase(index: &mut IndexFile, _data: &mut DataFile, key: u64) -> Result<bool, Error> {
    if index.header.tree_height == 0 {
        return Ok(false);
    }

    let res = erase_nonunderflow(index, key, index.header.root_offset)?;

    let mut root = index.read_node(index.header.root_offset)?;
    if root.key_cnt == 0 {
        index.reset_to_empty();
        return Ok(res);
    }
    while !root.is_leaf() && root.key_cnt == 1 {
        index.header.root_offset = root.children[0];
        index.header.tree_height -= 1;
        debug!(
            new_root_offset = index.header.root_offset,
            tree_height = index.header.tree_height,
            "Root collapsed, shrinking tree height"
        );
        root = index.read_node(index.header.root_offset)?;
    }
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::insert::insert;
    use tempfile::tempdir;

    fn open(dir: &std::path::Path) -> (IndexFile, DataFile) {
        (
            IndexFile::open(&dir.join("t.idx")).unwrap(),
            DataFile::open(&dir.join("t.dat")).unwrap(),
        )
    }

    #[test]
    fn erase_on_empty_tree_is_false() {
        let dir = tempdir().unwrap();
        let (mut idx, mut data) = open(dir.path());
        assert!(!erase(&mut idx, &mut data, 1).unwrap());
    }

    #[test]
    fn erase_last_key_empties_the_tree() {
        let dir = tempdir().unwrap();
        let (mut idx, mut data) = open(dir.path());
        insert(&mut idx, &mut data, 1, b"a").unwrap();
        assert!(erase(&mut idx, &mut data, 1).unwrap());
        assert_eq!(idx.header.tree_height, 0);
    }

    #[test]
    fn erase_missing_key_is_false() {
        let dir = tempdir().unwrap();
        let (mut idx, mut data) = open(dir.path());
        insert(&mut idx, &mut data, 1, b"a").unwrap();
        assert!(!erase(&mut idx, &mut data, 2).unwrap());
    }

    #[test]
    fn deleting_past_root_split_collapses_height() {
        let dir = tempdir().unwrap();
        let (mut idx, mut data) = open(dir.path());
        for k in 1..=(ORDER as u64 + 1) {
            insert(&mut idx, &mut data, k, b"v").unwrap();
        }
        assert!(idx.header.tree_height >= 2);
        for k in 128..=(ORDER as u64 + 1) {
            assert!(erase(&mut idx, &mut data, k).unwrap());
        }
        assert_eq!(idx.header.tree_height, 1);
        let root = idx.read_node(idx.header.root_offset).unwrap();
        assert_eq!(root.key_cnt, 127);
    }
}
