use crate::constants::storage::BLOCK_SZ;
use crate::error::RelationError;
use crate::storage::heap_file::HeapFile;
use crate::storage::slotted_page::{PageError, RecordId};
use crate::value::{ColumnAttribute, DataType, Row, Value};
use std::io::ErrorKind;
use std::path::Path;

/// Physical location of one row inside a heap file. Not stable across
/// deletes that compact within a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    pub block_id: u32,
    pub record_id: RecordId,
}

/// A relation stored as typed rows marshalled onto the slotted pages of one
/// heap file.
pub struct HeapTable {
    name: String,
    column_names: Vec<String>,
    column_attributes: Vec<ColumnAttribute>,
    file: HeapFile,
}

impl HeapTable {
    pub fn new(
        env: &Path,
        name: &str,
        column_names: Vec<String>,
        column_attributes: Vec<ColumnAttribute>,
    ) -> Self {
        Self {
            name: name.to_string(),
            column_names,
            column_attributes,
            file: HeapFile::new(env, name),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn column_attributes(&self) -> &[ColumnAttribute] {
        &self.column_attributes
    }

    /// Attributes for a subset of columns, in the order given.
    pub fn column_attributes_for(
        &self,
        columns: &[String],
    ) -> Result<Vec<ColumnAttribute>, RelationError> {
        columns
            .iter()
            .map(|name| {
                self.column_names
                    .iter()
                    .position(|c| c == name)
                    .map(|i| self.column_attributes[i])
                    .ok_or_else(|| RelationError::UnknownColumn(name.clone()))
            })
            .collect()
    }

    pub fn create(&mut self) -> Result<(), RelationError> {
        self.file.create()
    }

    /// Opens the backing file, creating it first if it was never created.
    pub fn create_if_not_exists(&mut self) -> Result<(), RelationError> {
        match self.open() {
            Ok(()) => Ok(()),
            Err(RelationError::Io(e)) if e.kind() == ErrorKind::NotFound => self.create(),
            Err(e) => Err(e),
        }
    }

    pub fn open(&mut self) -> Result<(), RelationError> {
        self.file.open()
    }

    pub fn close(&mut self) {
        self.file.close();
    }

    /// Removes the relation's backing file.
    pub fn destroy(&mut self) -> Result<(), RelationError> {
        self.file.destroy()
    }

    /// Validates and appends one row, returning its handle. The last block
    /// is tried first; when it has no room, exactly one new block is
    /// allocated and the insert retried there.
    pub fn insert(&mut self, row: &Row) -> Result<Handle, RelationError> {
        self.ensure_open()?;
        self.validate(row)?;
        let bytes = self.marshal(row)?;

        let mut page = self.file.get(self.file.get_last_block_id())?;
        let record_id = match page.add(&bytes) {
            Ok(id) => id,
            Err(PageError::NoRoom) => {
                page = self.file.get_new()?;
                page.add(&bytes)?
            }
            Err(e) => return Err(e.into()),
        };
        let block_id = page.block_id();
        self.file.put(&page)?;
        Ok(Handle {
            block_id,
            record_id,
        })
    }

    /// Handles of all rows, optionally restricted to those matching a
    /// conjunction of column = value equalities.
    pub fn select(&mut self, where_clause: Option<&Row>) -> Result<Vec<Handle>, RelationError> {
        self.ensure_open()?;
        let mut handles = Vec::new();
        for block_id in self.file.block_ids().collect::<Vec<_>>() {
            let page = self.file.get(block_id)?;
            for record_id in page.ids() {
                handles.push(Handle {
                    block_id,
                    record_id,
                });
            }
        }
        match where_clause {
            Some(clause) => self.select_where(&handles, clause),
            None => Ok(handles),
        }
    }

    /// Refines an existing handle list with a conjunction of equalities.
    pub fn select_where(
        &mut self,
        current: &[Handle],
        where_clause: &Row,
    ) -> Result<Vec<Handle>, RelationError> {
        let mut selected = Vec::new();
        for &handle in current {
            let row = self.project(handle, None)?;
            let matches = where_clause
                .iter()
                .all(|(column, value)| row.get(column) == Some(value));
            if matches {
                selected.push(handle);
            }
        }
        Ok(selected)
    }

    /// Reads the row at `handle` and restricts it to the requested columns
    /// (all declared columns when None). Requesting an undeclared column
    /// fails.
    pub fn project(
        &mut self,
        handle: Handle,
        columns: Option<&[String]>,
    ) -> Result<Row, RelationError> {
        self.ensure_open()?;
        let page = self.file.get(handle.block_id)?;
        let bytes = page
            .get(handle.record_id)
            .ok_or(PageError::UnknownRecord(handle.record_id))?;
        let row = self.unmarshal(bytes)?;
        match columns {
            None => Ok(row),
            Some(names) => {
                let mut projected = Row::new();
                for name in names {
                    let value = row
                        .get(name)
                        .ok_or_else(|| RelationError::UnknownColumn(name.clone()))?;
                    projected.insert(name.clone(), value.clone());
                }
                Ok(projected)
            }
        }
    }

    /// Deletes one row. Used by the catalog when relations and indexes are
    /// dropped; there is no SQL-level DELETE.
    pub fn del(&mut self, handle: Handle) -> Result<(), RelationError> {
        self.ensure_open()?;
        let mut page = self.file.get(handle.block_id)?;
        page.del(handle.record_id)?;
        self.file.put(&page)
    }

    fn ensure_open(&mut self) -> Result<(), RelationError> {
        if !self.file.is_open() {
            self.file.open()?;
        }
        Ok(())
    }

    /// Every declared column must be present; NULLs and defaults are
    /// unsupported.
    fn validate(&self, row: &Row) -> Result<(), RelationError> {
        for column in &self.column_names {
            if !row.contains_key(column) {
                return Err(RelationError::MissingColumn(column.clone()));
            }
        }
        Ok(())
    }

    /// Serializes a row in declared column order: INT as 4 bytes
    /// little-endian, TEXT as a u16 little-endian length followed by the
    /// bytes, BOOLEAN as one byte.
    pub fn marshal(&self, row: &Row) -> Result<Vec<u8>, RelationError> {
        let mut bytes = Vec::new();
        for (name, attr) in self.column_names.iter().zip(&self.column_attributes) {
            let value = row
                .get(name)
                .ok_or_else(|| RelationError::MissingColumn(name.clone()))?;
            match (attr.data_type, value) {
                (DataType::Int, Value::Int(n)) => bytes.extend_from_slice(&n.to_le_bytes()),
                (DataType::Text, Value::Text(s)) => {
                    if s.len() > u16::MAX as usize {
                        return Err(RelationError::TextTooLong(s.len()));
                    }
                    bytes.extend_from_slice(&(s.len() as u16).to_le_bytes());
                    bytes.extend_from_slice(s.as_bytes());
                }
                (DataType::Boolean, Value::Boolean(b)) => bytes.push(*b as u8),
                _ => return Err(RelationError::TypeMismatch(name.clone())),
            }
        }
        if bytes.len() > BLOCK_SZ {
            return Err(RelationError::RowTooBig(bytes.len()));
        }
        Ok(bytes)
    }

    /// Inverts `marshal`, driven by the declared schema.
    pub fn unmarshal(&self, bytes: &[u8]) -> Result<Row, RelationError> {
        let mut row = Row::new();
        let mut offset = 0usize;
        for (name, attr) in self.column_names.iter().zip(&self.column_attributes) {
            let value = match attr.data_type {
                DataType::Int => {
                    let raw: [u8; 4] = bytes
                        .get(offset..offset + 4)
                        .and_then(|s| s.try_into().ok())
                        .ok_or(RelationError::Corrupt("truncated INT"))?;
                    offset += 4;
                    Value::Int(i32::from_le_bytes(raw))
                }
                DataType::Text => {
                    let raw: [u8; 2] = bytes
                        .get(offset..offset + 2)
                        .and_then(|s| s.try_into().ok())
                        .ok_or(RelationError::Corrupt("truncated TEXT length"))?;
                    offset += 2;
                    let len = u16::from_le_bytes(raw) as usize;
                    let text = bytes
                        .get(offset..offset + len)
                        .ok_or(RelationError::Corrupt("truncated TEXT"))?;
                    offset += len;
                    Value::Text(
                        String::from_utf8(text.to_vec())
                            .map_err(|_| RelationError::Corrupt("TEXT is not valid UTF-8"))?,
                    )
                }
                DataType::Boolean => {
                    let raw = *bytes
                        .get(offset)
                        .ok_or(RelationError::Corrupt("truncated BOOLEAN"))?;
                    offset += 1;
                    Value::Boolean(raw != 0)
                }
            };
            row.insert(name.clone(), value);
        }
        Ok(row)
    }
}
