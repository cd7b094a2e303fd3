use crate::error::RelationError;
use crate::parser::Projection;
use crate::storage::heap_table::HeapTable;
use crate::value::{Row, Value};

/// Evaluation plan for a SELECT: an optional conjunctive filter feeding a
/// projection, executed as a scan of one relation.
pub struct SelectPlan {
    pub filter: Option<Row>,
    pub projection: Projection,
}

impl SelectPlan {
    pub fn new(projection: Projection, comparisons: Option<Vec<(String, Value)>>) -> Self {
        let filter = comparisons.map(|pairs| {
            let mut clause = Row::new();
            for (column, value) in pairs {
                clause.insert(column, value);
            }
            clause
        });
        Self { filter, projection }
    }

    /// The output column list for a relation: the declared columns for `*`,
    /// the requested names otherwise.
    pub fn output_columns(&self, table: &HeapTable) -> Vec<String> {
        match &self.projection {
            Projection::All => table.column_names().to_vec(),
            Projection::Columns(columns) => columns.clone(),
        }
    }

    /// Scans the table, keeps the rows matching the filter, and projects
    /// each one onto the output columns.
    pub fn execute(&self, table: &mut HeapTable) -> Result<Vec<Row>, RelationError> {
        let handles = table.select(self.filter.as_ref())?;
        let columns = self.output_columns(table);
        let mut rows = Vec::with_capacity(handles.len());
        for handle in handles {
            rows.push(table.project(handle, Some(&columns))?);
        }
        Ok(rows)
    }
}
