use crate::error::{DbError, DbResult};
use crate::storage::layout::{
    Schema, CODE_UNIT_SIZE, FIELD_LENGTHS_OFFSET, FREE_OFFSET, HEIGHT_OFFSET, INT_SIZE,
    KEY_OFFSET, LEFT_OFFSET, NODE_FIXED_SIZE, NULL_ADDR, NUM_STRING_FIELDS_OFFSET, RIGHT_OFFSET,
    ROOT_OFFSET,
};

/// The payload stored next to a key: the string fields (without padding)
/// and the int fields, in schema order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    pub strings: Vec<String>,
    pub ints: Vec<i32>,
}

impl Record {
    pub fn new(strings: Vec<String>, ints: Vec<i32>) -> Self {
        Record { strings, ints }
    }

    /// Reject anything that would not survive a write/read cycle under `schema`.
    pub fn check(&self, schema: &Schema) -> DbResult<()> {
        if self.strings.len() != schema.num_string_fields() {
            return Err(DbError::SchemaMismatch(format!(
                "expected {} string fields, got {}",
                schema.num_string_fields(),
                self.strings.len()
            )));
        }
        if self.ints.len() != schema.num_int_fields() {
            return Err(DbError::SchemaMismatch(format!(
                "expected {} int fields, got {}",
                schema.num_int_fields(),
                self.ints.len()
            )));
        }
        for (i, (s, &max)) in self.strings.iter().zip(schema.field_lengths()).enumerate() {
            if s.contains('\0') {
                return Err(DbError::SchemaMismatch(format!(
                    "string field {} contains a NUL character",
                    i
                )));
            }
            let units = s.encode_utf16().count();
            if units > max as usize {
                return Err(DbError::SchemaMismatch(format!(
                    "string field {} ('{}') is {} characters long, limit is {}",
                    i, s, units, max
                )));
            }
        }
        Ok(())
    }
}

/// One tree node as stored in its slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub key: i32,
    pub left: u64,
    pub right: u64,
    pub height: i32,
    pub record: Record,
}

impl Node {
    pub fn leaf(key: i32, record: Record) -> Self {
        Node { key, left: NULL_ADDR, right: NULL_ADDR, height: 0, record }
    }

    /// Serialize into exactly `schema.node_size()` bytes. Fields beyond the
    /// schema are ignored; `NodeFile::write_node` rejects such records first.
    pub fn encode(&self, schema: &Schema) -> Vec<u8> {
        let mut buf = vec![0u8; schema.node_size()];
        buf[KEY_OFFSET..KEY_OFFSET + 4].copy_from_slice(&self.key.to_be_bytes());
        buf[LEFT_OFFSET..LEFT_OFFSET + 8].copy_from_slice(&self.left.to_be_bytes());
        buf[RIGHT_OFFSET..RIGHT_OFFSET + 8].copy_from_slice(&self.right.to_be_bytes());
        buf[HEIGHT_OFFSET..HEIGHT_OFFSET + 4].copy_from_slice(&self.height.to_be_bytes());

        let mut offset = NODE_FIXED_SIZE;
        for (s, &len) in self.record.strings.iter().zip(schema.field_lengths()) {
            let field_end = offset + len as usize * CODE_UNIT_SIZE;
            for unit in s.encode_utf16() {
                if offset >= field_end {
                    break;
                }
                buf[offset..offset + CODE_UNIT_SIZE].copy_from_slice(&unit.to_be_bytes());
                offset += CODE_UNIT_SIZE;
            }
            // the rest of the field stays zeroed
            offset = field_end;
        }
        for value in self.record.ints.iter().take(schema.num_int_fields()) {
            buf[offset..offset + INT_SIZE].copy_from_slice(&value.to_be_bytes());
            offset += INT_SIZE;
        }
        buf
    }

    /// Parse the slot at `address`. `buf` must hold the whole slot.
    pub fn decode(address: u64, buf: &[u8], schema: &Schema) -> DbResult<Node> {
        if buf.len() != schema.node_size() {
            return Err(DbError::corrupt_record(
                address,
                format!("expected {} bytes, got {}", schema.node_size(), buf.len()),
            ));
        }
        let key = be_i32(buf, KEY_OFFSET);
        let left = be_u64(buf, LEFT_OFFSET);
        let right = be_u64(buf, RIGHT_OFFSET);
        let height = be_i32(buf, HEIGHT_OFFSET);
        if height < 0 {
            return Err(DbError::corrupt_record(address, format!("negative height {}", height)));
        }

        let mut offset = NODE_FIXED_SIZE;
        let mut strings = Vec::with_capacity(schema.num_string_fields());
        for (i, &len) in schema.field_lengths().iter().enumerate() {
            let field_end = offset + len as usize * CODE_UNIT_SIZE;
            let units: Vec<u16> = buf[offset..field_end]
                .chunks_exact(CODE_UNIT_SIZE)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect();
            let used = units.iter().rposition(|&u| u != 0).map_or(0, |p| p + 1);
            let s = String::from_utf16(&units[..used]).map_err(|_| {
                DbError::corrupt_record(address, format!("string field {} is not valid UTF-16", i))
            })?;
            strings.push(s);
            offset = field_end;
        }
        let mut ints = Vec::with_capacity(schema.num_int_fields());
        for _ in 0..schema.num_int_fields() {
            ints.push(be_i32(buf, offset));
            offset += INT_SIZE;
        }

        Ok(Node { key, left, right, height, record: Record { strings, ints } })
    }
}

/// The header at offset 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub root: u64,
    pub free: u64,
    pub schema: Schema,
}

impl Header {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.schema.header_size());
        buf.extend(&self.root.to_be_bytes());
        buf.extend(&self.free.to_be_bytes());
        buf.extend(&(self.schema.num_string_fields() as u32).to_be_bytes());
        for len in self.schema.field_lengths() {
            buf.extend(&len.to_be_bytes());
        }
        buf.extend(&(self.schema.num_int_fields() as u32).to_be_bytes());
        buf
    }

    /// Number of string fields declared by a header prefix, used to learn
    /// how many bytes the full header occupies.
    pub fn declared_string_fields(prefix: &[u8]) -> DbResult<u32> {
        if prefix.len() < FIELD_LENGTHS_OFFSET {
            return Err(DbError::CorruptHeader(format!(
                "header needs at least {} bytes, file has {}",
                FIELD_LENGTHS_OFFSET,
                prefix.len()
            )));
        }
        Ok(be_u32(prefix, NUM_STRING_FIELDS_OFFSET))
    }

    pub fn decode(buf: &[u8]) -> DbResult<Header> {
        let n = Self::declared_string_fields(buf)? as usize;
        let expected = FIELD_LENGTHS_OFFSET + INT_SIZE * n + INT_SIZE;
        if buf.len() < expected {
            return Err(DbError::CorruptHeader(format!(
                "header declares {} string fields but is only {} bytes",
                n,
                buf.len()
            )));
        }
        let root = be_u64(buf, ROOT_OFFSET);
        let free = be_u64(buf, FREE_OFFSET);
        let field_lengths = (0..n)
            .map(|i| be_u32(buf, FIELD_LENGTHS_OFFSET + INT_SIZE * i))
            .collect();
        let num_int_fields = be_u32(buf, FIELD_LENGTHS_OFFSET + INT_SIZE * n);
        let schema = Schema::from_disk(field_lengths, num_int_fields)?;
        Ok(Header { root, free, schema })
    }
}

fn be_u64(buf: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[at..at + 8]);
    u64::from_be_bytes(bytes)
}

fn be_u32(buf: &[u8], at: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[at..at + 4]);
    u32::from_be_bytes(bytes)
}

fn be_i32(buf: &[u8], at: usize) -> i32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[at..at + 4]);
    i32::from_be_bytes(bytes)
}
