use crate::value::{ColumnAttribute, Row, Value};
use std::fmt;
use tabled::builder::Builder;
use tabled::settings::Style;

/// The result of one statement. Tabular results own their column list,
/// attributes and rows; everything else is just a message.
pub struct QueryResult {
    column_names: Option<Vec<String>>,
    column_attributes: Option<Vec<ColumnAttribute>>,
    rows: Option<Vec<Row>>,
    message: String,
}

impl QueryResult {
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            column_names: None,
            column_attributes: None,
            rows: None,
            message: message.into(),
        }
    }

    pub fn with_rows(
        column_names: Vec<String>,
        column_attributes: Vec<ColumnAttribute>,
        rows: Vec<Row>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            column_names: Some(column_names),
            column_attributes: Some(column_attributes),
            rows: Some(rows),
            message: message.into(),
        }
    }

    pub fn column_names(&self) -> Option<&[String]> {
        self.column_names.as_deref()
    }

    pub fn column_attributes(&self) -> Option<&[ColumnAttribute]> {
        self.column_attributes.as_deref()
    }

    pub fn rows(&self) -> Option<&[Row]> {
        self.rows.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

fn cell(row: &Row, column: &str) -> String {
    match row.get(column) {
        Some(Value::Int(n)) => n.to_string(),
        Some(Value::Text(s)) => format!("\"{}\"", s),
        Some(Value::Boolean(b)) => if *b { "true" } else { "false" }.to_string(),
        None => "???".to_string(),
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let (Some(column_names), Some(rows)) = (&self.column_names, &self.rows) {
            let mut builder = Builder::default();
            builder.push_record(column_names.iter().cloned());
            for row in rows {
                builder.push_record(column_names.iter().map(|column| cell(row, column)));
            }
            let mut table = builder.build();
            table.with(Style::ascii());
            writeln!(f, "{}", table)?;
        }
        f.write_str(&self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::DataType;

    #[test]
    fn test_message_only_display() {
        let result = QueryResult::with_message("created foo");
        assert_eq!(result.to_string(), "created foo");
        assert!(result.rows().is_none());
    }

    #[test]
    fn test_tabular_display() {
        let mut row = Row::new();
        row.insert("a".to_string(), Value::Int(12));
        row.insert("b".to_string(), Value::Text("abc".to_string()));
        row.insert("c".to_string(), Value::Boolean(true));

        let result = QueryResult::with_rows(
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
            vec![
                ColumnAttribute::new(DataType::Int),
                ColumnAttribute::new(DataType::Text),
                ColumnAttribute::new(DataType::Boolean),
            ],
            vec![row],
            "successfully returned 1 rows",
        );
        let shown = result.to_string();
        assert!(shown.contains("+-"));
        assert!(shown.contains("12"));
        assert!(shown.contains("\"abc\""));
        assert!(shown.contains("true"));
        assert!(shown.ends_with("successfully returned 1 rows"));
    }
}
