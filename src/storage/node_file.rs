use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use log::debug;

use crate::error::{DbError, DbResult};
use crate::storage::layout::{Schema, FIELD_LENGTHS_OFFSET, INT_SIZE};
use crate::storage::record::{Header, Node};

/// NodeFile: the single random-access file behind a tree. Knows the schema,
/// so it can turn an address into a fully parsed `Node` and back. Every
/// access is a seek followed by one read or write of a whole record.
pub struct NodeFile {
    file: File,
    schema: Schema,
    /// Current file length; kept in step with writes so bounds checks do not
    /// need a metadata call.
    len: u64,
}

impl NodeFile {
    /// Wrap a freshly created, empty file and write its first header.
    pub fn create(mut file: File, schema: Schema) -> DbResult<Self> {
        let header = Header { root: 0, free: 0, schema };
        let bytes = header.encode();
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&bytes)?;
        let len = bytes.len() as u64;
        debug!("NodeFile::create → wrote {}-byte header", len);
        Ok(NodeFile { file, schema: header.schema, len })
    }

    /// Read and decode the header at offset 0, sizing the read from the
    /// declared number of string fields.
    pub fn read_header(file: &mut File) -> DbResult<Header> {
        let len = file.metadata()?.len();

        let mut prefix = vec![0u8; len.min(FIELD_LENGTHS_OFFSET as u64) as usize];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut prefix)?;
        let n = Header::declared_string_fields(&prefix)? as u64;

        let header_len = (FIELD_LENGTHS_OFFSET + INT_SIZE) as u64 + INT_SIZE as u64 * n;
        if header_len > len {
            return Err(DbError::CorruptHeader(format!(
                "header declares {} string fields but file is only {} bytes",
                n, len
            )));
        }
        let mut raw = vec![0u8; header_len as usize];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut raw)?;
        Header::decode(&raw)
    }

    /// Wrap an existing file, returning it together with its decoded header.
    pub fn open(mut file: File) -> DbResult<(Self, Header)> {
        let header = Self::read_header(&mut file)?;
        let len = file.metadata()?.len();

        let node_file = NodeFile { file, schema: header.schema.clone(), len };
        for (name, address) in [("root", header.root), ("free", header.free)] {
            if address != 0 && !node_file.in_bounds(address) {
                return Err(DbError::CorruptHeader(format!(
                    "{} address {} is not a node slot in a {}-byte file",
                    name, address, len
                )));
            }
        }
        debug!(
            "NodeFile::open → {} bytes, root={}, free={}, {} string / {} int fields",
            len,
            header.root,
            header.free,
            header.schema.num_string_fields(),
            header.schema.num_int_fields()
        );
        Ok((node_file, header))
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Current length in bytes. A new slot is always handed out here.
    pub fn len(&self) -> u64 {
        self.len
    }

    fn in_bounds(&self, address: u64) -> bool {
        self.schema.is_slot_start(address)
            && address
                .checked_add(self.schema.node_size() as u64)
                .is_some_and(|end| end <= self.len)
    }

    pub fn read_node(&mut self, address: u64) -> DbResult<Node> {
        if !self.in_bounds(address) {
            return Err(DbError::corrupt_record(
                address,
                format!("not a node slot in a {}-byte file", self.len),
            ));
        }
        let mut buf = vec![0u8; self.schema.node_size()];
        self.file.seek(SeekFrom::Start(address))?;
        self.file.read_exact(&mut buf)?;
        Node::decode(address, &buf, &self.schema)
    }

    /// Overwrite the slot at `address`. Writing at exactly `len()` grows the
    /// file by one slot. The record must fit the schema.
    pub fn write_node(&mut self, address: u64, node: &Node) -> DbResult<()> {
        node.record.check(&self.schema)?;
        if !self.schema.is_slot_start(address) || address > self.len {
            return Err(DbError::corrupt_record(
                address,
                format!("cannot write a node here in a {}-byte file", self.len),
            ));
        }
        let end = address + self.schema.node_size() as u64;
        let bytes = node.encode(&self.schema);
        self.file.seek(SeekFrom::Start(address))?;
        self.file.write_all(&bytes)?;
        if end > self.len {
            self.len = end;
        }
        Ok(())
    }

    pub fn write_header(&mut self, root: u64, free: u64) -> DbResult<()> {
        let header = Header { root, free, schema: self.schema.clone() };
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&header.encode())?;
        debug!("write_header → root={}, free={}", root, free);
        Ok(())
    }

    pub fn sync(&mut self) -> DbResult<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }
}
