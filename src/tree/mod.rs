//! The AVL tree proper. Nodes are identified by their byte address in the
//! tree file; the engine never holds in-memory links between nodes, only
//! addresses that it reads and rewrites.

mod avl;
pub mod cursor;

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use log::{debug, error, info, warn};

use crate::error::{DbError, DbResult};
use crate::storage::freelist::{FreeList, FreeListIter};
use crate::storage::layout::{Schema, NULL_ADDR};
use crate::storage::node_file::NodeFile;
use crate::storage::record::Record;
use cursor::InOrderCursor;

/// Deepest path any walk will follow before declaring the links cyclic.
/// A balanced tree addressable by u64 is far shallower.
pub(crate) const MAX_DEPTH: usize = 128;

/// Result of an insert. Inserting an existing key changes nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Duplicate,
}

/// Summary produced by `AvlTree::verify`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TreeStats {
    pub nodes: u64,
    /// Height of the root, -1 for an empty tree.
    pub height: i32,
    pub free_slots: u64,
}

/// A disk-resident AVL tree of `i32` keys with fixed-shape records.
///
/// The header (root, free-list head, schema) is rewritten on `close`, or from
/// `Drop` if the tree goes out of scope without being closed.
pub struct AvlTree {
    path: PathBuf,
    file: NodeFile,
    root: u64,
    free: FreeList,
    closed: bool,
}

impl AvlTree {
    /// Create a new, empty tree file at `path`. Never overwrites: an existing
    /// file is reported as `AlreadyExists`.
    pub fn create(
        path: impl AsRef<Path>,
        field_lengths: &[u32],
        num_int_fields: u32,
    ) -> DbResult<AvlTree> {
        let path = path.as_ref();
        let schema = Schema::new(field_lengths.to_vec(), num_int_fields)?;
        let file = match OpenOptions::new().read(true).write(true).create_new(true).open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(DbError::AlreadyExists(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        let file = NodeFile::create(file, schema)?;
        info!("Created tree file {}", path.display());
        Ok(AvlTree {
            path: path.to_path_buf(),
            file,
            root: NULL_ADDR,
            free: FreeList::new(NULL_ADDR),
            closed: false,
        })
    }

    /// Reopen a tree file written by `create`/`close`.
    pub fn open(path: impl AsRef<Path>) -> DbResult<AvlTree> {
        let path = path.as_ref();
        let file = match OpenOptions::new().read(true).write(true).open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(DbError::NotFound(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        let (file, header) = NodeFile::open(file)?;
        info!("Opened tree file {}", path.display());
        Ok(AvlTree {
            path: path.to_path_buf(),
            file,
            root: header.root,
            free: FreeList::new(header.free),
            closed: false,
        })
    }

    pub fn schema(&self) -> &Schema {
        self.file.schema()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Address of the root node, 0 when empty.
    pub fn root(&self) -> u64 {
        self.root
    }

    /// Size of the backing file in bytes.
    pub fn file_len(&self) -> u64 {
        self.file.len()
    }

    /// Insert `key` with `record`. The record must match the schema exactly;
    /// strings longer than their field are rejected, never truncated.
    pub fn insert(&mut self, key: i32, record: Record) -> DbResult<InsertOutcome> {
        record.check(self.file.schema())?;
        debug!("insert() → key={} starting at root {}", key, self.root);
        let (root, inserted) = self.insert_at(self.root, key, &record, 0)?;
        self.root = root;
        if inserted {
            Ok(InsertOutcome::Inserted)
        } else {
            debug!("insert() → key={} already present, nothing written", key);
            Ok(InsertOutcome::Duplicate)
        }
    }

    /// Remove `key`. Returns false when the key was not in the tree.
    pub fn remove(&mut self, key: i32) -> DbResult<bool> {
        debug!("remove() → key={} starting at root {}", key, self.root);
        let (root, removed) = self.remove_at(self.root, key, 0)?;
        self.root = root;
        Ok(removed)
    }

    /// Look up `key` without modifying anything.
    pub fn find(&mut self, key: i32) -> DbResult<Option<Record>> {
        let mut address = self.root;
        let mut depth = 0;
        while address != NULL_ADDR {
            avl::check_depth(address, depth)?;
            let node = self.file.read_node(address)?;
            address = match key.cmp(&node.key) {
                std::cmp::Ordering::Less => node.left,
                std::cmp::Ordering::Greater => node.right,
                std::cmp::Ordering::Equal => return Ok(Some(node.record)),
            };
            depth += 1;
        }
        Ok(None)
    }

    /// Lazy in-order walk from the current root.
    pub fn traverse(&mut self) -> InOrderCursor<'_> {
        InOrderCursor::new(&mut self.file, self.root)
    }

    /// Addresses on the free list, head first.
    pub fn free_list(&mut self) -> FreeListIter<'_> {
        self.free.iter(&mut self.file)
    }

    /// Check ordering, cached heights and balance of every node, and that
    /// no slot is both live and free.
    pub fn verify(&mut self) -> DbResult<TreeStats> {
        let mut live = HashSet::new();
        let (height, nodes) = self.verify_subtree(self.root, None, None, 0, &mut live)?;
        let mut free_slots = 0;
        for address in self.free.iter(&mut self.file) {
            let address = address?;
            if live.contains(&address) {
                return Err(DbError::corrupt_record(address, "slot is both in the tree and free"));
            }
            free_slots += 1;
        }
        Ok(TreeStats { nodes, height, free_slots })
    }

    fn flush_header(&mut self) -> DbResult<()> {
        self.file.write_header(self.root, self.free.head())?;
        self.file.sync()
    }

    /// Write the header and release the file.
    pub fn close(mut self) -> DbResult<()> {
        self.closed = true;
        self.flush_header()?;
        info!("Closed tree file {}", self.path.display());
        Ok(())
    }
}

impl Drop for AvlTree {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        warn!("{} dropped without close(); flushing header", self.path.display());
        if let Err(e) = self.flush_header() {
            error!("failed to flush header of {}: {}", self.path.display(), e);
        }
    }
}
