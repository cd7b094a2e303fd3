use crate::value::Value;
use sqlparser::ast::{
    BinaryOperator, DataType as SqlDataType, Expr, ObjectName, ObjectType, SelectItem, SetExpr,
    Statement, TableFactor, UnaryOperator, Value as SqlValue,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use std::fmt;
use thiserror::Error;

/// A column type as written in CREATE TABLE. Anything the engine cannot
/// store is carried through for the executor to reject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AstColumnType {
    Int,
    Text,
    Unrecognized(String),
}

/// Projection part of a SELECT: everything, or named columns.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    All,
    Columns(Vec<String>),
}

/// One parsed SQL statement, lowered to exactly what the executor handles.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlStatement {
    CreateTable {
        table_name: String,
        columns: Vec<(String, AstColumnType)>,
        if_not_exists: bool,
    },
    CreateIndex {
        index_name: String,
        table_name: String,
        index_type: String,
        columns: Vec<String>,
    },
    DropTable {
        table_name: String,
    },
    DropIndex {
        index_name: String,
        table_name: String,
    },
    ShowTables,
    ShowColumns {
        table_name: String,
    },
    ShowIndex {
        table_name: String,
    },
    Insert {
        table_name: String,
        columns: Option<Vec<String>>,
        values: Vec<Value>,
    },
    Select {
        table_name: String,
        projection: Projection,
        filter: Option<Vec<(String, Value)>>,
    },
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{0}")]
    Sql(#[from] sqlparser::parser::ParserError),

    #[error("{0} statement not yet implemented")]
    NotImplemented(&'static str),

    #[error("{0}")]
    Unsupported(String),
}

fn unsupported<T>(message: impl Into<String>) -> Result<T, ParseError> {
    Err(ParseError::Unsupported(message.into()))
}

/// Parses one input line into statements.
///
/// Two MySQL-style forms fall outside the sqlparser grammar and are matched
/// by keyword before delegating: `SHOW INDEX FROM t` and
/// `DROP INDEX i FROM t`.
pub fn parse(sql: &str) -> Result<Vec<SqlStatement>, ParseError> {
    if let Some(statement) = keyword_form(sql) {
        return Ok(vec![statement]);
    }
    let dialect = GenericDialect {};
    let statements = Parser::parse_sql(&dialect, sql)?;
    statements.into_iter().map(lower).collect()
}

fn keyword_form(sql: &str) -> Option<SqlStatement> {
    let cleaned = sql.trim().trim_end_matches(';').trim();
    let tokens: Vec<&str> = cleaned.split_whitespace().collect();
    let kw = |token: &str, keyword: &str| token.eq_ignore_ascii_case(keyword);
    match tokens.as_slice() {
        [show, index, from, table]
            if kw(show, "SHOW") && kw(index, "INDEX") && kw(from, "FROM") =>
        {
            Some(SqlStatement::ShowIndex {
                table_name: (*table).to_string(),
            })
        }
        [drop, index, name, from, table]
            if kw(drop, "DROP") && kw(index, "INDEX") && kw(from, "FROM") =>
        {
            Some(SqlStatement::DropIndex {
                index_name: (*name).to_string(),
                table_name: (*table).to_string(),
            })
        }
        _ => None,
    }
}

fn lower(statement: Statement) -> Result<SqlStatement, ParseError> {
    match statement {
        Statement::CreateTable {
            if_not_exists,
            name,
            columns,
            ..
        } => {
            let table_name = object_name(&name)?;
            let columns = columns
                .into_iter()
                .map(|col| (col.name.value, lower_column_type(col.data_type)))
                .collect();
            Ok(SqlStatement::CreateTable {
                table_name,
                columns,
                if_not_exists,
            })
        }
        Statement::CreateIndex {
            name,
            table_name,
            using,
            columns,
            ..
        } => {
            let index_name = match name {
                Some(name) => object_name(&name)?,
                None => return unsupported("an index name is required"),
            };
            let table_name = object_name(&table_name)?;
            let index_type = using
                .map(|ident| ident.value.to_uppercase())
                .unwrap_or_else(|| "BTREE".to_string());
            let columns = columns
                .into_iter()
                .map(|ordered| match ordered.expr {
                    Expr::Identifier(ident) => Ok(ident.value),
                    other => unsupported(format!("cannot index expression {}", other)),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(SqlStatement::CreateIndex {
                index_name,
                table_name,
                index_type,
                columns,
            })
        }
        Statement::Drop {
            object_type, names, ..
        } => match object_type {
            ObjectType::Table => {
                let name = names
                    .first()
                    .ok_or_else(|| ParseError::Unsupported("DROP TABLE needs a name".into()))?;
                Ok(SqlStatement::DropTable {
                    table_name: object_name(name)?,
                })
            }
            ObjectType::Index => {
                unsupported("DROP INDEX must name its table: DROP INDEX i FROM t")
            }
            other => unsupported(format!("cannot drop {}", other)),
        },
        Statement::ShowTables { .. } => Ok(SqlStatement::ShowTables),
        Statement::ShowColumns { table_name, .. } => Ok(SqlStatement::ShowColumns {
            table_name: object_name(&table_name)?,
        }),
        Statement::Insert {
            table_name,
            columns,
            source,
            ..
        } => {
            let table_name = object_name(&table_name)?;
            let columns = if columns.is_empty() {
                None
            } else {
                Some(columns.into_iter().map(|ident| ident.value).collect())
            };
            let query = match source {
                Some(query) => query,
                None => return unsupported("INSERT must have a VALUES clause"),
            };
            let rows = match *query.body {
                SetExpr::Values(values) => values.rows,
                _ => return unsupported("INSERT source must be VALUES"),
            };
            if rows.len() != 1 {
                return unsupported("only single-row INSERT is supported");
            }
            let values = rows
                .into_iter()
                .next()
                .unwrap()
                .into_iter()
                .map(|expr| lower_literal(&expr))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(SqlStatement::Insert {
                table_name,
                columns,
                values,
            })
        }
        Statement::Query(query) => {
            let select = match *query.body {
                SetExpr::Select(select) => *select,
                _ => return unsupported("only plain SELECT queries are supported"),
            };
            let table_name = match select.from.first() {
                Some(table) => match &table.relation {
                    TableFactor::Table { name, .. } => object_name(name)?,
                    _ => return unsupported("SELECT supports plain table names only"),
                },
                None => return unsupported("SELECT must have a FROM clause"),
            };
            if select.from.len() > 1 || !select.from[0].joins.is_empty() {
                return unsupported("joins are not supported");
            }

            let projection = if select.projection.len() == 1
                && matches!(select.projection[0], SelectItem::Wildcard(_))
            {
                Projection::All
            } else {
                let columns = select
                    .projection
                    .into_iter()
                    .map(|item| match item {
                        SelectItem::UnnamedExpr(Expr::Identifier(ident)) => Ok(ident.value),
                        other => unsupported(format!("cannot select {}", other)),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Projection::Columns(columns)
            };

            let filter = match select.selection {
                Some(expr) => {
                    let mut comparisons = Vec::new();
                    lower_where(&expr, &mut comparisons)?;
                    Some(comparisons)
                }
                None => None,
            };
            Ok(SqlStatement::Select {
                table_name,
                projection,
                filter,
            })
        }
        Statement::Update { .. } => Err(ParseError::NotImplemented("UPDATE")),
        Statement::Delete { .. } => Err(ParseError::NotImplemented("DELETE")),
        other => unsupported(format!("unsupported statement: {}", other)),
    }
}

fn lower_column_type(data_type: SqlDataType) -> AstColumnType {
    match data_type {
        SqlDataType::Int(_) | SqlDataType::Integer(_) => AstColumnType::Int,
        SqlDataType::Text => AstColumnType::Text,
        other => AstColumnType::Unrecognized(other.to_string()),
    }
}

/// Recognises a conjunction of `column = literal` comparisons.
fn lower_where(expr: &Expr, out: &mut Vec<(String, Value)>) -> Result<(), ParseError> {
    match expr {
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        } => {
            lower_where(left, out)?;
            lower_where(right, out)
        }
        Expr::BinaryOp {
            left,
            op: BinaryOperator::Eq,
            right,
        } => {
            let column = match &**left {
                Expr::Identifier(ident) => ident.value.clone(),
                other => return unsupported(format!("cannot filter on {}", other)),
            };
            let value = lower_literal(right)?;
            out.push((column, value));
            Ok(())
        }
        Expr::Nested(inner) => lower_where(inner, out),
        other => unsupported(format!(
            "WHERE supports conjunctions of column = literal only, not {}",
            other
        )),
    }
}

fn lower_literal(expr: &Expr) -> Result<Value, ParseError> {
    match expr {
        Expr::Value(SqlValue::Number(text, _)) => text
            .parse::<i32>()
            .map(Value::Int)
            .map_err(|_| ParseError::Unsupported(format!("bad integer literal {}", text))),
        Expr::Value(SqlValue::SingleQuotedString(text)) => Ok(Value::Text(text.clone())),
        Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr,
        } => match lower_literal(expr)? {
            Value::Int(n) => Ok(Value::Int(-n)),
            _ => unsupported("cannot negate a non-integer literal"),
        },
        other => unsupported(format!("unsupported literal {}", other)),
    }
}

fn object_name(name: &ObjectName) -> Result<String, ParseError> {
    match name.0.last() {
        Some(ident) => Ok(ident.value.clone()),
        None => unsupported("empty object name"),
    }
}

impl fmt::Display for AstColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AstColumnType::Int => f.write_str("INT"),
            AstColumnType::Text => f.write_str("TEXT"),
            AstColumnType::Unrecognized(name) => f.write_str(name),
        }
    }
}

/// Canonical SQL rendering, used by the shell to echo what it understood.
impl fmt::Display for SqlStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlStatement::CreateTable {
                table_name,
                columns,
                if_not_exists,
            } => {
                write!(f, "CREATE TABLE ")?;
                if *if_not_exists {
                    write!(f, "IF NOT EXISTS ")?;
                }
                write!(f, "{} (", table_name)?;
                for (i, (name, data_type)) in columns.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} {}", name, data_type)?;
                }
                write!(f, ")")
            }
            SqlStatement::CreateIndex {
                index_name,
                table_name,
                index_type,
                columns,
            } => {
                write!(
                    f,
                    "CREATE INDEX {} ON {} USING {} ({})",
                    index_name,
                    table_name,
                    index_type,
                    columns.join(", ")
                )
            }
            SqlStatement::DropTable { table_name } => write!(f, "DROP TABLE {}", table_name),
            SqlStatement::DropIndex {
                index_name,
                table_name,
            } => write!(f, "DROP INDEX {} FROM {}", index_name, table_name),
            SqlStatement::ShowTables => write!(f, "SHOW TABLES"),
            SqlStatement::ShowColumns { table_name } => {
                write!(f, "SHOW COLUMNS FROM {}", table_name)
            }
            SqlStatement::ShowIndex { table_name } => write!(f, "SHOW INDEX FROM {}", table_name),
            SqlStatement::Insert {
                table_name,
                columns,
                values,
            } => {
                write!(f, "INSERT INTO {}", table_name)?;
                if let Some(columns) = columns {
                    write!(f, " ({})", columns.join(", "))?;
                }
                write!(f, " VALUES (")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                write!(f, ")")
            }
            SqlStatement::Select {
                table_name,
                projection,
                filter,
            } => {
                match projection {
                    Projection::All => write!(f, "SELECT *")?,
                    Projection::Columns(columns) => write!(f, "SELECT {}", columns.join(", "))?,
                }
                write!(f, " FROM {}", table_name)?;
                if let Some(comparisons) = filter {
                    write!(f, " WHERE ")?;
                    for (i, (column, value)) in comparisons.iter().enumerate() {
                        if i > 0 {
                            write!(f, " AND ")?;
                        }
                        write!(f, "{} = {}", column, value)?;
                    }
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(sql: &str) -> SqlStatement {
        let mut statements = parse(sql).unwrap();
        assert_eq!(statements.len(), 1);
        statements.remove(0)
    }

    #[test]
    fn test_create_table() {
        let statement = parse_one("CREATE TABLE foo (a INT, b TEXT)");
        assert_eq!(
            statement,
            SqlStatement::CreateTable {
                table_name: "foo".to_string(),
                columns: vec![
                    ("a".to_string(), AstColumnType::Int),
                    ("b".to_string(), AstColumnType::Text),
                ],
                if_not_exists: false,
            }
        );
        assert_eq!(statement.to_string(), "CREATE TABLE foo (a INT, b TEXT)");
    }

    #[test]
    fn test_create_table_keeps_unrecognized_types() {
        let statement = parse_one("CREATE TABLE foo (x DOUBLE)");
        match statement {
            SqlStatement::CreateTable { columns, .. } => {
                assert!(matches!(columns[0].1, AstColumnType::Unrecognized(_)));
            }
            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[test]
    fn test_create_index_with_using() {
        let statement = parse_one("CREATE INDEX ix ON foo USING BTREE (a, b)");
        assert_eq!(
            statement,
            SqlStatement::CreateIndex {
                index_name: "ix".to_string(),
                table_name: "foo".to_string(),
                index_type: "BTREE".to_string(),
                columns: vec!["a".to_string(), "b".to_string()],
            }
        );
    }

    #[test]
    fn test_create_index_defaults_to_btree() {
        match parse_one("CREATE INDEX ix ON foo (a)") {
            SqlStatement::CreateIndex { index_type, .. } => assert_eq!(index_type, "BTREE"),
            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[test]
    fn test_show_and_drop_index_forms() {
        assert_eq!(
            parse_one("SHOW INDEX FROM foo"),
            SqlStatement::ShowIndex {
                table_name: "foo".to_string()
            }
        );
        assert_eq!(
            parse_one("drop index ix from foo;"),
            SqlStatement::DropIndex {
                index_name: "ix".to_string(),
                table_name: "foo".to_string(),
            }
        );
        assert_eq!(parse_one("SHOW TABLES"), SqlStatement::ShowTables);
        assert_eq!(
            parse_one("SHOW COLUMNS FROM foo"),
            SqlStatement::ShowColumns {
                table_name: "foo".to_string()
            }
        );
    }

    #[test]
    fn test_insert_with_negative_number() {
        let statement = parse_one("INSERT INTO foo (a, b) VALUES (-1, 'abc')");
        assert_eq!(
            statement,
            SqlStatement::Insert {
                table_name: "foo".to_string(),
                columns: Some(vec!["a".to_string(), "b".to_string()]),
                values: vec![Value::Int(-1), Value::Text("abc".to_string())],
            }
        );
    }

    #[test]
    fn test_insert_without_column_list() {
        let statement = parse_one("INSERT INTO foo VALUES (1, 'x')");
        match statement {
            SqlStatement::Insert { columns, .. } => assert!(columns.is_none()),
            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[test]
    fn test_select_star_with_where_conjunction() {
        let statement = parse_one("SELECT * FROM foo WHERE a = 12 AND b = 'abc'");
        assert_eq!(
            statement,
            SqlStatement::Select {
                table_name: "foo".to_string(),
                projection: Projection::All,
                filter: Some(vec![
                    ("a".to_string(), Value::Int(12)),
                    ("b".to_string(), Value::Text("abc".to_string())),
                ]),
            }
        );
        assert_eq!(
            statement.to_string(),
            "SELECT * FROM foo WHERE a = 12 AND b = \"abc\""
        );
    }

    #[test]
    fn test_select_column_list() {
        let statement = parse_one("SELECT a, b FROM foo");
        assert_eq!(
            statement,
            SqlStatement::Select {
                table_name: "foo".to_string(),
                projection: Projection::Columns(vec!["a".to_string(), "b".to_string()]),
                filter: None,
            }
        );
    }

    #[test]
    fn test_where_disjunction_is_rejected() {
        assert!(parse("SELECT * FROM foo WHERE a = 1 OR b = 2").is_err());
    }

    #[test]
    fn test_update_and_delete_not_implemented() {
        assert!(matches!(
            parse("UPDATE foo SET a = 1"),
            Err(ParseError::NotImplemented("UPDATE"))
        ));
        assert!(matches!(
            parse("DELETE FROM foo WHERE a = 1"),
            Err(ParseError::NotImplemented("DELETE"))
        ));
    }

    #[test]
    fn test_garbage_is_a_parse_error() {
        assert!(matches!(
            parse("this is not sql"),
            Err(ParseError::Sql(_))
        ));
    }
}
