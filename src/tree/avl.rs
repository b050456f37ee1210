use std::cmp::{max, Ordering};
use std::collections::HashSet;
use log::debug;

use crate::error::{DbError, DbResult};
use crate::storage::layout::NULL_ADDR;
use crate::storage::record::{Node, Record};
use super::{AvlTree, MAX_DEPTH};

pub(super) fn check_depth(address: u64, depth: usize) -> DbResult<()> {
    if depth > MAX_DEPTH {
        return Err(DbError::corrupt_record(
            address,
            format!("path deeper than {} nodes; child links form a cycle", MAX_DEPTH),
        ));
    }
    Ok(())
}

// Every recursive step takes a subtree address and returns the address of
// whatever node roots that subtree afterwards. The caller stores it back
// into its own child field (or into `root`).
impl AvlTree {
    /// Height of the subtree at `address`; an empty subtree has height -1.
    fn height_of(&mut self, address: u64) -> DbResult<i32> {
        if address == NULL_ADDR {
            return Ok(-1);
        }
        Ok(self.file.read_node(address)?.height)
    }

    fn fix_height(&mut self, node: &mut Node) -> DbResult<()> {
        node.height = 1 + max(self.height_of(node.left)?, self.height_of(node.right)?);
        Ok(())
    }

    /// Returns the new subtree root and whether a node was added.
    pub(super) fn insert_at(
        &mut self,
        address: u64,
        key: i32,
        record: &Record,
        depth: usize,
    ) -> DbResult<(u64, bool)> {
        if address == NULL_ADDR {
            let slot = self.free.allocate(&mut self.file)?;
            self.file.write_node(slot, &Node::leaf(key, record.clone()))?;
            debug!("  → new leaf key={} at {}", key, slot);
            return Ok((slot, true));
        }
        check_depth(address, depth)?;

        let mut node = self.file.read_node(address)?;
        match key.cmp(&node.key) {
            Ordering::Less => {
                let (child, inserted) = self.insert_at(node.left, key, record, depth + 1)?;
                if !inserted {
                    return Ok((address, false));
                }
                node.left = child;
            }
            Ordering::Greater => {
                let (child, inserted) = self.insert_at(node.right, key, record, depth + 1)?;
                if !inserted {
                    return Ok((address, false));
                }
                node.right = child;
            }
            Ordering::Equal => return Ok((address, false)),
        }

        self.fix_height(&mut node)?;
        self.file.write_node(address, &node)?;
        Ok((self.balance(address, &node)?, true))
    }

    /// Returns the new subtree root and whether a node was removed.
    pub(super) fn remove_at(&mut self, address: u64, key: i32, depth: usize) -> DbResult<(u64, bool)> {
        if address == NULL_ADDR {
            return Ok((NULL_ADDR, false));
        }
        check_depth(address, depth)?;

        let mut node = self.file.read_node(address)?;
        match key.cmp(&node.key) {
            Ordering::Less => {
                let (child, removed) = self.remove_at(node.left, key, depth + 1)?;
                if !removed {
                    return Ok((address, false));
                }
                node.left = child;
            }
            Ordering::Greater => {
                let (child, removed) = self.remove_at(node.right, key, depth + 1)?;
                if !removed {
                    return Ok((address, false));
                }
                node.right = child;
            }
            Ordering::Equal if node.left == NULL_ADDR || node.right == NULL_ADDR => {
                // zero or one child: splice the node out and free its slot
                let survivor = if node.left == NULL_ADDR { node.right } else { node.left };
                debug!("  → unlinking key={} at {}, {} takes its place", key, address, survivor);
                self.free.release(&mut self.file, address, node)?;
                return Ok((survivor, true));
            }
            Ordering::Equal => {
                // two children: take over the in-order successor's content,
                // then delete the successor from the right subtree
                let successor = self.leftmost(node.right, depth + 1)?;
                debug!(
                    "  → key={} at {} replaced by successor key={}",
                    key, address, successor.key
                );
                node.key = successor.key;
                node.record = successor.record;
                let (child, _) = self.remove_at(node.right, node.key, depth + 1)?;
                node.right = child;
            }
        }

        self.fix_height(&mut node)?;
        self.file.write_node(address, &node)?;
        Ok((self.balance(address, &node)?, true))
    }

    fn leftmost(&mut self, mut address: u64, mut depth: usize) -> DbResult<Node> {
        let mut node = self.file.read_node(address)?;
        while node.left != NULL_ADDR {
            depth += 1;
            check_depth(address, depth)?;
            address = node.left;
            node = self.file.read_node(address)?;
        }
        Ok(node)
    }

    /// Restore the balance of the subtree at `address` (whose current content
    /// is `node`) and return the address now at its top.
    fn balance(&mut self, address: u64, node: &Node) -> DbResult<u64> {
        let left_height = self.height_of(node.left)?;
        let right_height = self.height_of(node.right)?;

        if left_height - right_height > 1 {
            let left = self.file.read_node(node.left)?;
            if self.height_of(left.left)? >= self.height_of(left.right)? {
                self.rotate_with_left_child(address)
            } else {
                self.double_with_left_child(address)
            }
        } else if right_height - left_height > 1 {
            let right = self.file.read_node(node.right)?;
            if self.height_of(right.right)? >= self.height_of(right.left)? {
                self.rotate_with_right_child(address)
            } else {
                self.double_with_right_child(address)
            }
        } else {
            Ok(address)
        }
    }

    /// Single right rotation: the left child of `top` moves up.
    fn rotate_with_left_child(&mut self, top: u64) -> DbResult<u64> {
        let mut old_top = self.file.read_node(top)?;
        let pivot = old_top.left;
        let mut new_top = self.file.read_node(pivot)?;

        old_top.left = new_top.right;
        new_top.right = top;

        self.fix_height(&mut old_top)?;
        self.file.write_node(top, &old_top)?;
        new_top.height = 1 + max(self.height_of(new_top.left)?, old_top.height);
        self.file.write_node(pivot, &new_top)?;

        debug!("  → rotate right at {}: {} (key {}) moves up", top, pivot, new_top.key);
        Ok(pivot)
    }

    /// Single left rotation: the right child of `top` moves up.
    fn rotate_with_right_child(&mut self, top: u64) -> DbResult<u64> {
        let mut old_top = self.file.read_node(top)?;
        let pivot = old_top.right;
        let mut new_top = self.file.read_node(pivot)?;

        old_top.right = new_top.left;
        new_top.left = top;

        self.fix_height(&mut old_top)?;
        self.file.write_node(top, &old_top)?;
        new_top.height = 1 + max(old_top.height, self.height_of(new_top.right)?);
        self.file.write_node(pivot, &new_top)?;

        debug!("  → rotate left at {}: {} (key {}) moves up", top, pivot, new_top.key);
        Ok(pivot)
    }

    /// Left-right case: rotate the left child left, then `top` right.
    fn double_with_left_child(&mut self, top: u64) -> DbResult<u64> {
        let mut node = self.file.read_node(top)?;
        node.left = self.rotate_with_right_child(node.left)?;
        self.file.write_node(top, &node)?;
        self.rotate_with_left_child(top)
    }

    /// Right-left case: rotate the right child right, then `top` left.
    fn double_with_right_child(&mut self, top: u64) -> DbResult<u64> {
        let mut node = self.file.read_node(top)?;
        node.right = self.rotate_with_left_child(node.right)?;
        self.file.write_node(top, &node)?;
        self.rotate_with_right_child(top)
    }

    /// Returns (height, node count) of the subtree, checking every node on
    /// the way. Keys must lie strictly between `lower` and `upper`.
    pub(super) fn verify_subtree(
        &mut self,
        address: u64,
        lower: Option<i32>,
        upper: Option<i32>,
        depth: usize,
        live: &mut HashSet<u64>,
    ) -> DbResult<(i32, u64)> {
        if address == NULL_ADDR {
            return Ok((-1, 0));
        }
        check_depth(address, depth)?;
        if !live.insert(address) {
            return Err(DbError::corrupt_record(address, "node reachable from two parents"));
        }

        let node = self.file.read_node(address)?;
        if lower.is_some_and(|lo| node.key <= lo) || upper.is_some_and(|hi| node.key >= hi) {
            return Err(DbError::corrupt_record(
                address,
                format!("key {} out of order (bounds {:?}..{:?})", node.key, lower, upper),
            ));
        }
        let (left_height, left_count) =
            self.verify_subtree(node.left, lower, Some(node.key), depth + 1, live)?;
        let (right_height, right_count) =
            self.verify_subtree(node.right, Some(node.key), upper, depth + 1, live)?;

        let height = 1 + max(left_height, right_height);
        if node.height != height {
            return Err(DbError::corrupt_record(
                address,
                format!("cached height {} but subtree height is {}", node.height, height),
            ));
        }
        if (left_height - right_height).abs() > 1 {
            return Err(DbError::corrupt_record(
                address,
                format!("unbalanced: left height {}, right height {}", left_height, right_height),
            ));
        }
        Ok((height, left_count + right_count + 1))
    }
}
