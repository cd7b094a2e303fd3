use crate::value::{ColumnAttribute, DataType};

pub const TABLES_NAME: &str = "_tables";
pub const COLUMNS_NAME: &str = "_columns";
pub const INDICES_NAME: &str = "_indices";

pub fn is_schema_table(name: &str) -> bool {
    name == TABLES_NAME || name == COLUMNS_NAME || name == INDICES_NAME
}

/// `_tables` schema: one row per relation.
pub fn tables_schema() -> (Vec<String>, Vec<ColumnAttribute>) {
    (
        vec!["table_name".to_string()],
        vec![ColumnAttribute::new(DataType::Text)],
    )
}

/// `_columns` schema: one row per column of every relation.
pub fn columns_schema() -> (Vec<String>, Vec<ColumnAttribute>) {
    (
        vec![
            "table_name".to_string(),
            "column_name".to_string(),
            "data_type".to_string(),
        ],
        vec![
            ColumnAttribute::new(DataType::Text),
            ColumnAttribute::new(DataType::Text),
            ColumnAttribute::new(DataType::Text),
        ],
    )
}

/// `_indices` schema: one row per indexed column of every index.
pub fn indices_schema() -> (Vec<String>, Vec<ColumnAttribute>) {
    (
        vec![
            "table_name".to_string(),
            "index_name".to_string(),
            "seq_in_index".to_string(),
            "column_name".to_string(),
            "index_type".to_string(),
            "is_unique".to_string(),
        ],
        vec![
            ColumnAttribute::new(DataType::Text),
            ColumnAttribute::new(DataType::Text),
            ColumnAttribute::new(DataType::Int),
            ColumnAttribute::new(DataType::Text),
            ColumnAttribute::new(DataType::Text),
            ColumnAttribute::new(DataType::Boolean),
        ],
    )
}

/// Hard-coded schema for a meta-table, breaking the cycle where `_columns`
/// would otherwise have to describe itself.
pub fn schema_for(name: &str) -> Option<(Vec<String>, Vec<ColumnAttribute>)> {
    match name {
        TABLES_NAME => Some(tables_schema()),
        COLUMNS_NAME => Some(columns_schema()),
        INDICES_NAME => Some(indices_schema()),
        _ => None,
    }
}
