use log::debug;

use crate::error::{DbError, DbResult};
use crate::storage::layout::NULL_ADDR;
use crate::storage::node_file::NodeFile;
use crate::storage::record::Node;

/// Free-list allocator. Released slots form a singly linked chain threaded
/// through the `left` field of the released nodes, so only the head lives
/// outside the file. The file never shrinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeList {
    head: u64,
}

impl FreeList {
    pub fn new(head: u64) -> Self {
        FreeList { head }
    }

    pub fn head(&self) -> u64 {
        self.head
    }

    /// Hand out a slot for a new node. With an empty list this is the current
    /// end of file; the caller's write grows the file.
    pub fn allocate(&mut self, file: &mut NodeFile) -> DbResult<u64> {
        if self.head == NULL_ADDR {
            let address = file.len();
            debug!("allocate → free list empty, appending at {}", address);
            return Ok(address);
        }
        let address = self.head;
        let freed = file.read_node(address)?;
        self.head = freed.left;
        debug!("allocate → reusing slot {}, free head now {}", address, self.head);
        Ok(address)
    }

    /// Push `address` onto the list. The link is written to disk before the
    /// head moves.
    pub fn release(&mut self, file: &mut NodeFile, address: u64, mut node: Node) -> DbResult<()> {
        node.left = self.head;
        node.right = NULL_ADDR;
        file.write_node(address, &node)?;
        debug!("release → slot {} (key {}) linked to {}", address, node.key, self.head);
        self.head = address;
        Ok(())
    }

    /// Walk the chain from the head. The walk stops with an error instead of
    /// looping forever when the chain is longer than the file has slots.
    pub fn iter<'a>(&self, file: &'a mut NodeFile) -> FreeListIter<'a> {
        let limit = file.schema().slot_count(file.len());
        FreeListIter { file, next: self.head, seen: 0, limit, failed: false }
    }
}

pub struct FreeListIter<'a> {
    file: &'a mut NodeFile,
    next: u64,
    seen: u64,
    limit: u64,
    failed: bool,
}

impl<'a> Iterator for FreeListIter<'a> {
    type Item = DbResult<u64>;

    fn next(&mut self) -> Option<DbResult<u64>> {
        if self.failed || self.next == NULL_ADDR {
            return None;
        }
        let address = self.next;
        if self.seen >= self.limit {
            self.failed = true;
            return Some(Err(DbError::corrupt_record(
                address,
                format!("free list has more than {} entries; chain is cyclic", self.limit),
            )));
        }
        match self.file.read_node(address) {
            Ok(node) => {
                self.seen += 1;
                self.next = node.left;
                Some(Ok(address))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::layout::Schema;
    use crate::storage::record::Record;
    use std::fs::OpenOptions;

    fn node_file(dir: &tempfile::TempDir) -> NodeFile {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(dir.path().join("free.avl"))
            .unwrap();
        NodeFile::create(file, Schema::new(vec![2], 0).unwrap()).unwrap()
    }

    fn leaf(key: i32) -> Node {
        Node::leaf(key, Record::new(vec!["x".into()], vec![]))
    }

    #[test]
    fn released_slots_come_back_last_in_first_out() {
        let dir = tempfile::tempdir().unwrap();
        let mut nf = node_file(&dir);
        let mut free = FreeList::new(NULL_ADDR);

        let mut slots = Vec::new();
        for key in 0..3 {
            let at = free.allocate(&mut nf).unwrap();
            nf.write_node(at, &leaf(key)).unwrap();
            slots.push(at);
        }
        let size = nf.len();

        free.release(&mut nf, slots[0], leaf(0)).unwrap();
        free.release(&mut nf, slots[2], leaf(2)).unwrap();
        assert_eq!(free.head(), slots[2]);
        // the link is on disk, not only in memory
        assert_eq!(nf.read_node(slots[2]).unwrap().left, slots[0]);

        let chain: Vec<u64> = free.iter(&mut nf).collect::<DbResult<_>>().unwrap();
        assert_eq!(chain, vec![slots[2], slots[0]]);

        assert_eq!(free.allocate(&mut nf).unwrap(), slots[2]);
        assert_eq!(free.allocate(&mut nf).unwrap(), slots[0]);
        assert_eq!(free.head(), NULL_ADDR);
        assert_eq!(free.allocate(&mut nf).unwrap(), size);
    }

    #[test]
    fn cyclic_chain_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut nf = node_file(&dir);
        let at = nf.len();
        let mut looped = leaf(1);
        looped.left = at;
        nf.write_node(at, &looped).unwrap();

        let free = FreeList::new(at);
        let result: DbResult<Vec<u64>> = free.iter(&mut nf).collect();
        assert!(matches!(result, Err(DbError::CorruptRecord { .. })));
    }
}
