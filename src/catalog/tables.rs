use crate::catalog::schema::{self, COLUMNS_NAME, INDICES_NAME, TABLES_NAME};
use crate::error::RelationError;
use crate::storage::heap_table::{Handle, HeapTable};
use crate::value::{ColumnAttribute, DataType, Row, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The `_tables` meta-table plus the cache of every relation the engine has
/// built. Constructing it bootstraps `_tables` and `_columns`: the files are
/// created on first use and seeded with the rows describing the three
/// meta-tables themselves.
pub struct Tables {
    env: PathBuf,
    table: HeapTable,
    cache: HashMap<String, HeapTable>,
}

impl Tables {
    pub const TABLE_NAME: &'static str = TABLES_NAME;

    pub fn new(env: &Path) -> Result<Self, RelationError> {
        let (names, attrs) = schema::tables_schema();
        let mut table = HeapTable::new(env, TABLES_NAME, names, attrs);
        table.create_if_not_exists()?;
        if table.select(None)?.is_empty() {
            for name in [TABLES_NAME, COLUMNS_NAME, INDICES_NAME] {
                let mut row = Row::new();
                row.insert("table_name".to_string(), Value::from(name));
                table.insert(&row)?;
            }
        }

        let (names, attrs) = schema::columns_schema();
        let mut columns = HeapTable::new(env, COLUMNS_NAME, names, attrs);
        columns.create_if_not_exists()?;
        if columns.select(None)?.is_empty() {
            for meta in [TABLES_NAME, COLUMNS_NAME, INDICES_NAME] {
                let (column_names, column_attributes) = schema::schema_for(meta).unwrap();
                for (column, attr) in column_names.iter().zip(&column_attributes) {
                    let mut row = Row::new();
                    row.insert("table_name".to_string(), Value::from(meta));
                    row.insert("column_name".to_string(), Value::from(column.as_str()));
                    row.insert("data_type".to_string(), Value::from(attr.data_type.as_str()));
                    columns.insert(&row)?;
                }
            }
        }

        let mut cache = HashMap::new();
        cache.insert(COLUMNS_NAME.to_string(), columns);
        Ok(Self {
            env: env.to_path_buf(),
            table,
            cache,
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

    /// The relation for `name`: the meta-tables come from their hard-coded
    /// schemas, user tables from a `_columns` lookup. Instances are cached.
    pub fn get_table(&mut self, name: &str) -> Result<&mut HeapTable, RelationError> {
        if name == TABLES_NAME {
            return Ok(&mut self.table);
        }
        if !self.cache.contains_key(name) {
            let (column_names, column_attributes) = match schema::schema_for(name) {
                Some(meta) => meta,
                None => self.get_columns(name)?,
            };
            let table = HeapTable::new(&self.env, name, column_names, column_attributes);
            self.cache.insert(name.to_string(), table);
        }
        Ok(self.cache.get_mut(name).unwrap())
    }

    /// Column names and attributes of a user table, in declared order, read
    /// from `_columns`.
    pub fn get_columns(
        &mut self,
        table_name: &str,
    ) -> Result<(Vec<String>, Vec<ColumnAttribute>), RelationError> {
        let columns_table = self.get_table(COLUMNS_NAME)?;
        let mut where_clause = Row::new();
        where_clause.insert("table_name".to_string(), Value::from(table_name));
        let handles = columns_table.select(Some(&where_clause))?;
        if handles.is_empty() {
            return Err(RelationError::UnknownTable(table_name.to_string()));
        }

        let wanted = ["column_name".to_string(), "data_type".to_string()];
        let mut names = Vec::new();
        let mut attributes = Vec::new();
        for handle in handles {
            let row = columns_table.project(handle, Some(&wanted))?;
            let name = match row.get("column_name") {
                Some(Value::Text(s)) => s.clone(),
                _ => return Err(RelationError::Corrupt("bad column_name in _columns")),
            };
            let data_type = match row.get("data_type") {
                Some(Value::Text(s)) => DataType::from_str(s)?,
                _ => return Err(RelationError::Corrupt("bad data_type in _columns")),
            };
            names.push(name);
            attributes.push(ColumnAttribute::new(data_type));
        }
        Ok((names, attributes))
    }

    /// Forgets the cached relation after it is dropped or its schema rows
    /// change.
    pub fn evict(&mut self, name: &str) {
        self.cache.remove(name);
    }
}
