use crate::storage::slotted_page::PageError;
use thiserror::Error;

/// Domain-layer failures raised by relations, the catalog and indexes.
#[derive(Debug, Error)]
pub enum RelationError {
    #[error(transparent)]
    Page(#[from] PageError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("unknown table {0}")]
    UnknownTable(String),

    #[error("unknown column {0}")]
    UnknownColumn(String),

    #[error("don't know how to handle NULLs or defaults yet: missing column {0}")]
    MissingColumn(String),

    #[error("type mismatch for column {0}")]
    TypeMismatch(String),

    #[error("unsupported data type {0}")]
    UnsupportedType(String),

    #[error("text of {0} bytes is too long to marshal")]
    TextTooLong(usize),

    #[error("row of {0} bytes is too big for one block")]
    RowTooBig(usize),

    #[error("cannot drop a schema table")]
    SchemaTable,

    #[error("BTree index must have unique key")]
    NotUnique,

    #[error("duplicate keys are not allowed in unique index")]
    DuplicateKey,

    #[error("unknown index {1} on table {0}")]
    UnknownIndex(String, String),

    #[error("don't know how to {0} yet")]
    NotImplemented(&'static str),

    #[error("corrupted record: {0}")]
    Corrupt(&'static str),
}

/// Executor-layer failures. Domain errors are wrapped so the caller sees
/// which layer refused the statement.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("DbRelationError: {0}")]
    Relation(#[from] RelationError),

    #[error("duplicate column {0}")]
    DuplicateColumn(String),

    #[error("duplicate index {0} {1}")]
    DuplicateIndex(String, String),

    #[error("column name {0} not found")]
    ColumnNotFound(String),

    #[error("unrecognized data type {0}")]
    UnrecognizedType(String),

    #[error("number of values does not match number of columns")]
    WrongValueCount,
}
