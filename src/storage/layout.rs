// ┌─────────────────────────────────────────────────────────────────────────┐
// │ HEADER (file offset 0)                                                  │
// │─────────┬────────┬──────────────────────────────────────────────────────│
// │ Offset  │ Length │ Description                                          │
// │─────────┼────────┼──────────────────────────────────────────────────────│
// │   0     │   8    │ ROOT (u64): address of the root node, 0 = empty      │
// │   8     │   8    │ FREE (u64): head of the free list, 0 = empty         │
// │  16     │   4    │ NUM_STRING_FIELDS (u32) = n                          │
// │  20     │  4·n   │ FIELD_LENGTHS (u32 each), in UTF-16 code units       │
// │ 20+4n   │   4    │ NUM_INT_FIELDS (u32) = m                             │
// └─────────┴────────┴──────────────────────────────────────────────────────┘
//
// ┌─────────────────────────────────────────────────────────────────────────┐
// │ NODE (at header_size + k·node_size)                                     │
// │─────────┬────────┬──────────────────────────────────────────────────────│
// │   0     │   4    │ KEY (i32)                                            │
// │   4     │   8    │ LEFT (u64): left child address, 0 = none             │
// │  12     │   8    │ RIGHT (u64): right child address, 0 = none           │
// │  20     │   4    │ HEIGHT (i32): leaf = 0                               │
// │  24     │ 2·Σlen │ STRING FIELDS, each len code units, NUL padded       │
// │   ..    │  4·m   │ INT FIELDS (i32 each)                                │
// └─────────┴────────┴──────────────────────────────────────────────────────┘
//
// All integers are big-endian. A released node keeps its slot; its LEFT
// field links to the next free slot.

use crate::error::{DbError, DbResult};

/// Address 0 always falls inside the header, so it doubles as "no node".
pub const NULL_ADDR: u64 = 0;

pub const ROOT_OFFSET: usize = 0;
pub const FREE_OFFSET: usize = 8;
pub const NUM_STRING_FIELDS_OFFSET: usize = 16;
pub const FIELD_LENGTHS_OFFSET: usize = 20;

pub const KEY_OFFSET: usize = 0;
pub const LEFT_OFFSET: usize = 4;
pub const RIGHT_OFFSET: usize = 12;
pub const HEIGHT_OFFSET: usize = 20;
pub const NODE_FIXED_SIZE: usize = 24;

/// Bytes per character in a string field.
pub const CODE_UNIT_SIZE: usize = 2;
pub const INT_SIZE: usize = 4;

/// The fixed shape of every record in a tree file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    field_lengths: Vec<u32>,
    num_int_fields: u32,
}

impl Schema {
    /// Build a schema, rejecting shapes a tree file cannot hold.
    pub fn new(field_lengths: Vec<u32>, num_int_fields: u32) -> DbResult<Self> {
        let schema = Schema { field_lengths, num_int_fields };
        schema.check().map_err(DbError::SchemaMismatch)?;
        Ok(schema)
    }

    /// Same rules as `new`, but reported as a header problem. Used when the
    /// schema comes off disk.
    pub(crate) fn from_disk(field_lengths: Vec<u32>, num_int_fields: u32) -> DbResult<Self> {
        let schema = Schema { field_lengths, num_int_fields };
        schema.check().map_err(DbError::CorruptHeader)?;
        Ok(schema)
    }

    fn check(&self) -> Result<(), String> {
        if self.field_lengths.is_empty() {
            return Err("at least one string field is required".into());
        }
        if let Some(i) = self.field_lengths.iter().position(|&len| len == 0) {
            return Err(format!("string field {} has length 0", i));
        }
        // keep every offset representable on 32-bit targets
        let node = NODE_FIXED_SIZE as u64
            + self.field_lengths.iter().map(|&l| l as u64).sum::<u64>() * CODE_UNIT_SIZE as u64
            + self.num_int_fields as u64 * INT_SIZE as u64;
        if node > u32::MAX as u64 {
            return Err(format!("node size {} is too large", node));
        }
        Ok(())
    }

    pub fn field_lengths(&self) -> &[u32] {
        &self.field_lengths
    }

    pub fn num_string_fields(&self) -> usize {
        self.field_lengths.len()
    }

    pub fn num_int_fields(&self) -> usize {
        self.num_int_fields as usize
    }

    pub fn header_size(&self) -> usize {
        FIELD_LENGTHS_OFFSET + INT_SIZE * self.field_lengths.len() + INT_SIZE
    }

    pub fn node_size(&self) -> usize {
        NODE_FIXED_SIZE + self.strings_size() + INT_SIZE * self.num_int_fields()
    }

    pub(crate) fn strings_size(&self) -> usize {
        self.field_lengths.iter().map(|&l| l as usize * CODE_UNIT_SIZE).sum()
    }

    /// Number of whole node slots in a file of `file_len` bytes.
    pub fn slot_count(&self, file_len: u64) -> u64 {
        file_len.saturating_sub(self.header_size() as u64) / self.node_size() as u64
    }

    /// True when `address` is the start of a node slot.
    pub fn is_slot_start(&self, address: u64) -> bool {
        let header = self.header_size() as u64;
        address >= header && (address - header) % self.node_size() as u64 == 0
    }
}
