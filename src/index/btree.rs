use crate::error::RelationError;
use crate::index::node::{BTreeInterior, BTreeLeaf, BTreeStat, KeyValue};
use crate::storage::heap_file::HeapFile;
use crate::storage::heap_table::{Handle, HeapTable};
use crate::storage::slotted_page::PageError;
use crate::value::{DataType, Row};
use std::path::Path;

/// A unique B+Tree over one or more key columns of a relation. Nodes are
/// blocks of a dedicated heap file named `<table>-<index>`; block 1 holds
/// the persistent stats, the root starts at block 2 as a leaf
/// (`height == 1`) and the tree only grows taller by root split.
pub struct BTreeIndex {
    name: String,
    key_columns: Vec<String>,
    key_profile: Vec<DataType>,
    file: HeapFile,
    stat: Option<BTreeStat>,
}

impl BTreeIndex {
    pub fn new(
        env: &Path,
        relation: &HeapTable,
        name: &str,
        key_columns: Vec<String>,
        unique: bool,
    ) -> Result<Self, RelationError> {
        if !unique {
            return Err(RelationError::NotUnique);
        }
        let key_profile = relation
            .column_attributes_for(&key_columns)?
            .iter()
            .map(|attr| attr.data_type)
            .collect();
        let file_name = format!("{}-{}", relation.name(), name);
        Ok(Self {
            name: name.to_string(),
            key_columns,
            key_profile,
            file: HeapFile::new(env, &file_name),
            stat: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_columns(&self) -> &[String] {
        &self.key_columns
    }

    /// Materialises the index: file, stat block and empty leaf root, then
    /// one insertion per existing row of the relation. A failure drops the
    /// index file so no partial index survives.
    pub fn create(&mut self, relation: &mut HeapTable) -> Result<(), RelationError> {
        self.file.create()?;
        let root = self.file.get_new()?;
        self.file.put(&root)?;
        let stat = BTreeStat {
            root_id: root.block_id(),
            height: 1,
            key_profile: self.key_profile.clone(),
        };
        stat.save(&mut self.file)?;
        self.stat = Some(stat);

        let handles = relation.select(None)?;
        for handle in handles {
            if let Err(e) = self.insert(relation, handle) {
                self.stat = None;
                let _ = self.file.destroy();
                return Err(e);
            }
        }
        Ok(())
    }

    /// Opens an existing index; a no-op when already open.
    pub fn open(&mut self) -> Result<(), RelationError> {
        if self.stat.is_none() {
            self.file.open()?;
            let stat = BTreeStat::load(&mut self.file)?;
            self.key_profile = stat.key_profile.clone();
            self.stat = Some(stat);
        }
        Ok(())
    }

    pub fn close(&mut self) {
        self.file.close();
        self.stat = None;
    }

    /// Removes the index file.
    pub fn destroy(&mut self) -> Result<(), RelationError> {
        self.stat = None;
        self.file.destroy()
    }

    /// Inserts the row at `handle`, which must already exist in the
    /// relation. Child nodes are written before their parents; a root split
    /// persists the new stats last.
    pub fn insert(&mut self, relation: &mut HeapTable, handle: Handle) -> Result<(), RelationError> {
        self.open()?;
        let key_row = relation.project(handle, Some(&self.key_columns))?;
        let key = self.tkey(&key_row)?;

        let stat = self.stat.as_ref().unwrap();
        let (root_id, height) = (stat.root_id, stat.height);
        if let Some((boundary, right_id)) = self.insert_into(root_id, height, &key, handle)? {
            let page = self.file.get_new()?;
            let mut new_root = BTreeInterior::empty(page.block_id());
            new_root.first = root_id;
            new_root.insert(boundary, right_id);
            self.file.put(&new_root.serialize(&self.key_profile)?)?;

            let stat = self.stat.as_mut().unwrap();
            stat.root_id = new_root.block_id;
            stat.height += 1;
            self.stat.as_ref().unwrap().save(&mut self.file)?;
        }
        Ok(())
    }

    /// Point lookup: one handle on a hit, an empty list on a miss.
    pub fn lookup(&mut self, key_row: &Row) -> Result<Vec<Handle>, RelationError> {
        self.open()?;
        let key = self.tkey(key_row)?;
        let stat = self.stat.as_ref().unwrap();
        let mut block_id = stat.root_id;
        let mut height = stat.height;
        while height > 1 {
            let page = self.file.get(block_id)?;
            let node = BTreeInterior::read(&page, &self.key_profile)?;
            block_id = node.find_child(&key);
            height -= 1;
        }
        let page = self.file.get(block_id)?;
        let leaf = BTreeLeaf::read(&page, &self.key_profile)?;
        Ok(leaf.find_eq(&key).into_iter().collect())
    }

    pub fn del(&mut self, _handle: Handle) -> Result<(), RelationError> {
        Err(RelationError::NotImplemented("delete from a BTree index"))
    }

    pub fn range(&mut self, _min: &Row, _max: &Row) -> Result<Vec<Handle>, RelationError> {
        Err(RelationError::NotImplemented(
            "do a range query on a BTree index",
        ))
    }

    /// Extracts the key tuple for a row, in key-column order.
    fn tkey(&self, row: &Row) -> Result<KeyValue, RelationError> {
        self.key_columns
            .iter()
            .map(|column| {
                row.get(column)
                    .cloned()
                    .ok_or_else(|| RelationError::UnknownColumn(column.clone()))
            })
            .collect()
    }

    /// Recursive descent. Returns the boundary key and right sibling block
    /// when the visited node split, for the caller to install in its parent.
    fn insert_into(
        &mut self,
        block_id: u32,
        height: u16,
        key: &KeyValue,
        handle: Handle,
    ) -> Result<Option<(KeyValue, u32)>, RelationError> {
        if height == 1 {
            let page = self.file.get(block_id)?;
            let mut leaf = BTreeLeaf::read(&page, &self.key_profile)?;
            leaf.insert(key.clone(), handle)?;
            match leaf.serialize(&self.key_profile) {
                Ok(page) => {
                    self.file.put(&page)?;
                    Ok(None)
                }
                Err(RelationError::Page(PageError::NoRoom)) => {
                    let right_page = self.file.get_new()?;
                    let (right, boundary) = leaf.split(right_page.block_id());
                    self.file.put(&leaf.serialize(&self.key_profile)?)?;
                    self.file.put(&right.serialize(&self.key_profile)?)?;
                    Ok(Some((boundary, right.block_id)))
                }
                Err(e) => Err(e),
            }
        } else {
            let page = self.file.get(block_id)?;
            let mut node = BTreeInterior::read(&page, &self.key_profile)?;
            let child = node.find_child(key);
            match self.insert_into(child, height - 1, key, handle)? {
                None => Ok(None),
                Some((boundary, right_id)) => {
                    node.insert(boundary, right_id);
                    match node.serialize(&self.key_profile) {
                        Ok(page) => {
                            self.file.put(&page)?;
                            Ok(None)
                        }
                        Err(RelationError::Page(PageError::NoRoom)) => {
                            let right_page = self.file.get_new()?;
                            let (right, push_up) = node.split(right_page.block_id());
                            self.file.put(&node.serialize(&self.key_profile)?)?;
                            self.file.put(&right.serialize(&self.key_profile)?)?;
                            Ok(Some((push_up, right.block_id)))
                        }
                        Err(e) => Err(e),
                    }
                }
            }
        }
    }
}
