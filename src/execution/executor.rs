use crate::catalog::indices::Indices;
use crate::catalog::schema;
use crate::catalog::tables::Tables;
use crate::error::{ExecError, RelationError};
use crate::execution::plan::SelectPlan;
use crate::execution::query::QueryResult;
use crate::parser::{AstColumnType, Projection, SqlStatement};
use crate::storage::heap_table::Handle;
use crate::value::{ColumnAttribute, DataType, Row, Value};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Statement dispatcher. Owns the catalog; every DDL statement that fails
/// midway compensates its earlier catalog mutations before returning.
pub struct Executor {
    env: PathBuf,
    tables: Tables,
    indices: Indices,
}

impl Executor {
    /// Opens (and on first use bootstraps) the catalog under `env`.
    pub fn new(env: &Path) -> Result<Self, ExecError> {
        Ok(Self {
            env: env.to_path_buf(),
            tables: Tables::new(env)?,
            indices: Indices::new(env)?,
        })
    }

    pub fn env(&self) -> &Path {
        &self.env
    }

    pub fn execute(&mut self, statement: &SqlStatement) -> Result<QueryResult, ExecError> {
        match statement {
            SqlStatement::CreateTable {
                table_name,
                columns,
                if_not_exists,
            } => self.create_table(table_name, columns, *if_not_exists),
            SqlStatement::CreateIndex {
                index_name,
                table_name,
                index_type,
                columns,
            } => self.create_index(index_name, table_name, index_type, columns),
            SqlStatement::DropTable { table_name } => self.drop_table(table_name),
            SqlStatement::DropIndex {
                index_name,
                table_name,
            } => self.drop_index(index_name, table_name),
            SqlStatement::ShowTables => self.show_tables(),
            SqlStatement::ShowColumns { table_name } => self.show_columns(table_name),
            SqlStatement::ShowIndex { table_name } => self.show_index(table_name),
            SqlStatement::Insert {
                table_name,
                columns,
                values,
            } => self.insert(table_name, columns.as_deref(), values),
            SqlStatement::Select {
                table_name,
                projection,
                filter,
            } => self.select(table_name, projection, filter.as_deref()),
        }
    }

    fn create_table(
        &mut self,
        table_name: &str,
        columns: &[(String, AstColumnType)],
        if_not_exists: bool,
    ) -> Result<QueryResult, ExecError> {
        let mut seen = HashSet::new();
        let mut column_names = Vec::new();
        let mut column_attributes = Vec::new();
        for (name, ast_type) in columns {
            if !seen.insert(name.as_str()) {
                return Err(ExecError::DuplicateColumn(format!(
                    "{}.{}",
                    table_name, name
                )));
            }
            let data_type = match ast_type {
                AstColumnType::Int => DataType::Int,
                AstColumnType::Text => DataType::Text,
                AstColumnType::Unrecognized(other) => {
                    return Err(ExecError::UnrecognizedType(other.clone()));
                }
            };
            column_names.push(name.clone());
            column_attributes.push(ColumnAttribute::new(data_type));
        }

        let mut row = Row::new();
        row.insert("table_name".to_string(), Value::from(table_name));
        let table_handle = self.tables.insert(&row)?;

        let mut column_handles = Vec::new();
        match self.create_table_body(
            table_name,
            &column_names,
            &column_attributes,
            if_not_exists,
            &mut column_handles,
        ) {
            Ok(()) => Ok(QueryResult::with_message(format!("created {}", table_name))),
            Err(e) => {
                // Compensate in reverse: column rows, then the _tables row.
                for handle in column_handles.into_iter().rev() {
                    if let Ok(columns_table) = self.tables.get_table(schema::COLUMNS_NAME) {
                        let _ = columns_table.del(handle);
                    }
                }
                let _ = self.tables.del(table_handle);
                self.tables.evict(table_name);
                Err(e)
            }
        }
    }

    fn create_table_body(
        &mut self,
        table_name: &str,
        column_names: &[String],
        column_attributes: &[ColumnAttribute],
        if_not_exists: bool,
        column_handles: &mut Vec<Handle>,
    ) -> Result<(), ExecError> {
        for (name, attr) in column_names.iter().zip(column_attributes) {
            let mut row = Row::new();
            row.insert("table_name".to_string(), Value::from(table_name));
            row.insert("column_name".to_string(), Value::from(name.as_str()));
            row.insert(
                "data_type".to_string(),
                Value::from(attr.data_type.as_str()),
            );
            let columns_table = self.tables.get_table(schema::COLUMNS_NAME)?;
            column_handles.push(columns_table.insert(&row)?);
        }

        let table = self.tables.get_table(table_name)?;
        if if_not_exists {
            table.create_if_not_exists()?;
        } else {
            table.create()?;
        }
        Ok(())
    }

    fn create_index(
        &mut self,
        index_name: &str,
        table_name: &str,
        index_type: &str,
        columns: &[String],
    ) -> Result<QueryResult, ExecError> {
        let existing = self.indices.get_index_names(table_name)?;
        if existing.iter().any(|name| name == index_name) {
            return Err(ExecError::DuplicateIndex(
                table_name.to_string(),
                index_name.to_string(),
            ));
        }

        let (relation_columns, _) = self.tables.get_columns(table_name)?;
        let mut seen = HashSet::new();
        for column in columns {
            if !relation_columns.contains(column) {
                return Err(ExecError::ColumnNotFound(column.clone()));
            }
            if !seen.insert(column.as_str()) {
                return Err(ExecError::DuplicateColumn(column.clone()));
            }
        }

        let mut index_handles = Vec::new();
        match self.create_index_body(index_name, table_name, index_type, columns, &mut index_handles)
        {
            Ok(()) => Ok(QueryResult::with_message(format!(
                "created index {}",
                index_name
            ))),
            Err(e) => {
                for handle in index_handles.into_iter().rev() {
                    let _ = self.indices.del(handle);
                }
                self.indices.evict(table_name, index_name);
                Err(e)
            }
        }
    }

    fn create_index_body(
        &mut self,
        index_name: &str,
        table_name: &str,
        index_type: &str,
        columns: &[String],
        index_handles: &mut Vec<Handle>,
    ) -> Result<(), ExecError> {
        let is_unique = index_type == "BTREE";
        let mut row = Row::new();
        row.insert("table_name".to_string(), Value::from(table_name));
        row.insert("index_name".to_string(), Value::from(index_name));
        row.insert("index_type".to_string(), Value::from(index_type));
        row.insert("is_unique".to_string(), Value::Boolean(is_unique));
        for (seq, column) in columns.iter().enumerate() {
            row.insert("seq_in_index".to_string(), Value::Int(seq as i32 + 1));
            row.insert("column_name".to_string(), Value::from(column.as_str()));
            index_handles.push(self.indices.insert(&row)?);
        }

        let relation = self.tables.get_table(table_name)?;
        let index = self.indices.get_index(relation, table_name, index_name)?;
        index.create(relation)?;
        Ok(())
    }

    fn drop_table(&mut self, table_name: &str) -> Result<QueryResult, ExecError> {
        if schema::is_schema_table(table_name) {
            return Err(RelationError::SchemaTable.into());
        }
        // Resolve the relation before its schema rows disappear.
        self.tables.get_table(table_name)?;

        let mut where_clause = Row::new();
        where_clause.insert("table_name".to_string(), Value::from(table_name));

        // Indexes first: materialised files, then their catalog rows.
        let index_names = self.indices.get_index_names(table_name)?;
        for index_name in &index_names {
            let relation = self.tables.get_table(table_name)?;
            let index = self.indices.get_index(relation, table_name, index_name)?;
            index.destroy()?;
            self.indices.evict(table_name, index_name);
        }
        for handle in self.indices.select(Some(&where_clause))? {
            self.indices.del(handle)?;
        }
        self.indices.evict_table(table_name);

        // Schema rows describing the columns.
        let columns_table = self.tables.get_table(schema::COLUMNS_NAME)?;
        for handle in columns_table.select(Some(&where_clause))? {
            columns_table.del(handle)?;
        }

        // The backing file, then the _tables row.
        let table = self.tables.get_table(table_name)?;
        table.destroy()?;
        self.tables.evict(table_name);

        for handle in self.tables.select(Some(&where_clause))? {
            self.tables.del(handle)?;
        }
        Ok(QueryResult::with_message(format!("dropped {}", table_name)))
    }

    fn drop_index(&mut self, index_name: &str, table_name: &str) -> Result<QueryResult, ExecError> {
        let relation = self.tables.get_table(table_name)?;
        let index = self.indices.get_index(relation, table_name, index_name)?;
        index.destroy()?;
        self.indices.evict(table_name, index_name);

        let mut where_clause = Row::new();
        where_clause.insert("table_name".to_string(), Value::from(table_name));
        where_clause.insert("index_name".to_string(), Value::from(index_name));
        for handle in self.indices.select(Some(&where_clause))? {
            self.indices.del(handle)?;
        }
        Ok(QueryResult::with_message(format!(
            "dropped index {}",
            index_name
        )))
    }

    fn show_tables(&mut self) -> Result<QueryResult, ExecError> {
        let column_names = vec!["table_name".to_string()];
        let column_attributes = vec![ColumnAttribute::new(DataType::Text)];

        let mut rows = Vec::new();
        for handle in self.tables.select(None)? {
            let row = self.tables.project(handle, Some(&column_names))?;
            let user_table = match row.get("table_name") {
                Some(Value::Text(name)) => !schema::is_schema_table(name),
                _ => false,
            };
            if user_table {
                rows.push(row);
            }
        }
        let message = format!("successfully returned {} rows", rows.len());
        Ok(QueryResult::with_rows(
            column_names,
            column_attributes,
            rows,
            message,
        ))
    }

    fn show_columns(&mut self, table_name: &str) -> Result<QueryResult, ExecError> {
        let column_names = vec![
            "table_name".to_string(),
            "column_name".to_string(),
            "data_type".to_string(),
        ];
        let column_attributes = vec![ColumnAttribute::new(DataType::Text); 3];

        let mut where_clause = Row::new();
        where_clause.insert("table_name".to_string(), Value::from(table_name));

        let columns_table = self.tables.get_table(schema::COLUMNS_NAME)?;
        let mut rows = Vec::new();
        for handle in columns_table.select(Some(&where_clause))? {
            rows.push(columns_table.project(handle, Some(&column_names))?);
        }
        let message = format!("successfully returned {} rows", rows.len());
        Ok(QueryResult::with_rows(
            column_names,
            column_attributes,
            rows,
            message,
        ))
    }

    fn show_index(&mut self, table_name: &str) -> Result<QueryResult, ExecError> {
        let (column_names, column_attributes) = schema::indices_schema();

        let mut where_clause = Row::new();
        where_clause.insert("table_name".to_string(), Value::from(table_name));

        let mut rows = Vec::new();
        for handle in self.indices.select(Some(&where_clause))? {
            rows.push(self.indices.project(handle, Some(&column_names))?);
        }
        let message = format!("successfully returned {} rows", rows.len());
        Ok(QueryResult::with_rows(
            column_names,
            column_attributes,
            rows,
            message,
        ))
    }

    fn insert(
        &mut self,
        table_name: &str,
        columns: Option<&[String]>,
        values: &[Value],
    ) -> Result<QueryResult, ExecError> {
        let table = self.tables.get_table(table_name)?;
        let bound: Vec<String> = match columns {
            Some(columns) => columns.to_vec(),
            None => table.column_names().to_vec(),
        };
        if bound.len() != values.len() {
            return Err(ExecError::WrongValueCount);
        }
        for column in &bound {
            if !table.column_names().contains(column) {
                return Err(ExecError::ColumnNotFound(column.clone()));
            }
        }

        let mut row = Row::new();
        for (column, value) in bound.iter().zip(values) {
            row.insert(column.clone(), value.clone());
        }
        let handle = table.insert(&row)?;

        // Every index of the relation gets the new row as well.
        let index_names = self.indices.get_index_names(table_name)?;
        for index_name in &index_names {
            let index = self.indices.get_index(table, table_name, index_name)?;
            index.insert(table, handle)?;
        }

        let message = if index_names.is_empty() {
            format!("successfully inserted 1 row into {}", table_name)
        } else {
            format!(
                "successfully inserted 1 row into {} and {} indices",
                table_name,
                index_names.len()
            )
        };
        Ok(QueryResult::with_message(message))
    }

    fn select(
        &mut self,
        table_name: &str,
        projection: &Projection,
        filter: Option<&[(String, Value)]>,
    ) -> Result<QueryResult, ExecError> {
        let plan = SelectPlan::new(projection.clone(), filter.map(|f| f.to_vec()));
        let table = self.tables.get_table(table_name)?;
        let column_names = plan.output_columns(table);
        let column_attributes = table.column_attributes_for(&column_names)?;
        let rows = plan.execute(table)?;
        let message = format!("successfully returned {} rows", rows.len());
        Ok(QueryResult::with_rows(
            column_names,
            column_attributes,
            rows,
            message,
        ))
    }
}
