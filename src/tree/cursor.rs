use crate::error::{DbError, DbResult};
use crate::storage::layout::NULL_ADDR;
use crate::storage::node_file::NodeFile;
use crate::storage::record::{Node, Record};
use super::MAX_DEPTH;

/// One node as seen by an in-order walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeEntry {
    pub address: u64,
    pub key: i32,
    pub record: Record,
    pub height: i32,
    pub left_key: Option<i32>,
    pub right_key: Option<i32>,
}

/// In-order cursor over the tree. Nothing is read until `next` is called,
/// and each call reads only the nodes it needs: the left spine below the
/// previous node's right child, plus the two children of the yielded node.
pub struct InOrderCursor<'a> {
    file: &'a mut NodeFile,
    /// Ancestors still to be yielded, deepest last.
    stack: Vec<(u64, Node)>,
    /// Subtree whose left spine has not been pushed yet.
    descend_from: u64,
    /// Slots in the file; more yields than this means the links loop.
    remaining: u64,
    failed: bool,
}

impl<'a> InOrderCursor<'a> {
    pub(crate) fn new(file: &'a mut NodeFile, root: u64) -> Self {
        let remaining = file.schema().slot_count(file.len());
        InOrderCursor { file, stack: Vec::new(), descend_from: root, remaining, failed: false }
    }

    fn push_left_spine(&mut self) -> DbResult<()> {
        let mut address = self.descend_from;
        self.descend_from = NULL_ADDR;
        while address != NULL_ADDR {
            if self.stack.len() > MAX_DEPTH {
                return Err(DbError::corrupt_record(
                    address,
                    format!("path deeper than {} nodes; child links form a cycle", MAX_DEPTH),
                ));
            }
            let node = self.file.read_node(address)?;
            let next = node.left;
            self.stack.push((address, node));
            address = next;
        }
        Ok(())
    }

    fn child_key(&mut self, address: u64) -> DbResult<Option<i32>> {
        if address == NULL_ADDR {
            return Ok(None);
        }
        Ok(Some(self.file.read_node(address)?.key))
    }

    fn step(&mut self) -> DbResult<Option<NodeEntry>> {
        self.push_left_spine()?;
        let Some((address, node)) = self.stack.pop() else {
            return Ok(None);
        };
        if self.remaining == 0 {
            return Err(DbError::corrupt_record(address, "more nodes than slots; child links form a cycle"));
        }
        self.remaining -= 1;
        self.descend_from = node.right;
        let left_key = self.child_key(node.left)?;
        let right_key = self.child_key(node.right)?;
        Ok(Some(NodeEntry {
            address,
            key: node.key,
            record: node.record,
            height: node.height,
            left_key,
            right_key,
        }))
    }
}

impl<'a> Iterator for InOrderCursor<'a> {
    type Item = DbResult<NodeEntry>;

    fn next(&mut self) -> Option<DbResult<NodeEntry>> {
        if self.failed {
            return None;
        }
        match self.step() {
            Ok(entry) => entry.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
