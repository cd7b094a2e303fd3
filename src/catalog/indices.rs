use crate::catalog::schema::{self, INDICES_NAME};
use crate::error::RelationError;
use crate::index::btree::BTreeIndex;
use crate::storage::heap_table::{Handle, HeapTable};
use crate::value::{Row, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The `_indices` meta-table plus the cache of materialised indexes.
pub struct Indices {
    env: PathBuf,
    table: HeapTable,
    cache: HashMap<(String, String), BTreeIndex>,
}

impl Indices {
    pub const TABLE_NAME: &'static str = INDICES_NAME;

    pub fn new(env: &Path) -> Result<Self, RelationError> {
        let (names, attrs) = schema::indices_schema();
        let mut table = HeapTable::new(env, INDICES_NAME, names, attrs);
        table.create_if_not_exists()?;
        Ok(Self {
            env: env.to_path_buf(),
            table,
            cache: HashMap::new(),
        })
    }

    pub fn insert(&mut self, row: &Row) -> Result<Handle, RelationError> {
        self.table.insert(row)
    }

    pub fn del(&mut self, handle: Handle) -> Result<(), RelationError> {
        self.table.del(handle)
    }

    pub fn select(&mut self, where_clause: Option<&Row>) -> Result<Vec<Handle>, RelationError> {
        self.table.select(where_clause)
    }

    pub fn project(
        &mut self,
        handle: Handle,
        columns: Option<&[String]>,
    ) -> Result<Row, RelationError> {
        self.table.project(handle, columns)
    }

    /// The materialised index described by the `_indices` rows for
    /// `(table_name, index_name)`, built with its key columns in
    /// `seq_in_index` order and cached.
    pub fn get_index(
        &mut self,
        relation: &HeapTable,
        table_name: &str,
        index_name: &str,
    ) -> Result<&mut BTreeIndex, RelationError> {
        let cache_key = (table_name.to_string(), index_name.to_string());
        if !self.cache.contains_key(&cache_key) {
            let mut where_clause = Row::new();
            where_clause.insert("table_name".to_string(), Value::from(table_name));
            where_clause.insert("index_name".to_string(), Value::from(index_name));
            let handles = self.table.select(Some(&where_clause))?;
            if handles.is_empty() {
                return Err(RelationError::UnknownIndex(
                    table_name.to_string(),
                    index_name.to_string(),
                ));
            }

            let mut keyed: Vec<(i32, String)> = Vec::new();
            let mut unique = false;
            for handle in handles {
                let row = self.table.project(handle, None)?;
                let seq = match row.get("seq_in_index") {
                    Some(Value::Int(n)) => *n,
                    _ => return Err(RelationError::Corrupt("bad seq_in_index in _indices")),
                };
                let column = match row.get("column_name") {
                    Some(Value::Text(s)) => s.clone(),
                    _ => return Err(RelationError::Corrupt("bad column_name in _indices")),
                };
                unique = match row.get("is_unique") {
                    Some(Value::Boolean(b)) => *b,
                    _ => return Err(RelationError::Corrupt("bad is_unique in _indices")),
                };
                keyed.push((seq, column));
            }
            keyed.sort_by_key(|(seq, _)| *seq);
            let key_columns = keyed.into_iter().map(|(_, column)| column).collect();

            let index = BTreeIndex::new(&self.env, relation, index_name, key_columns, unique)?;
            self.cache.insert(cache_key.clone(), index);
        }
        Ok(self.cache.get_mut(&cache_key).unwrap())
    }

    /// Distinct index names declared on a table, in catalog order.
    pub fn get_index_names(&mut self, table_name: &str) -> Result<Vec<String>, RelationError> {
        let mut where_clause = Row::new();
        where_clause.insert("table_name".to_string(), Value::from(table_name));
        let handles = self.table.select(Some(&where_clause))?;

        let wanted = ["index_name".to_string()];
        let mut names: Vec<String> = Vec::new();
        for handle in handles {
            let row = self.table.project(handle, Some(&wanted))?;
            if let Some(Value::Text(name)) = row.get("index_name") {
                if !names.iter().any(|n| n == name) {
                    names.push(name.clone());
                }
            }
        }
        Ok(names)
    }

    /// Forgets one cached index.
    pub fn evict(&mut self, table_name: &str, index_name: &str) {
        self.cache
            .remove(&(table_name.to_string(), index_name.to_string()));
    }

    /// Forgets every cached index of a table (used by DROP TABLE).
    pub fn evict_table(&mut self, table_name: &str) {
        self.cache.retain(|(table, _), _| table != table_name);
    }
}
