use std::collections::HashSet;
use stratus::catalog::indices::Indices;
use stratus::catalog::tables::Tables;
use stratus::error::ExecError;
use stratus::execution::executor::Executor;
use stratus::execution::query::QueryResult;
use stratus::parser;
use stratus::value::{Row, Value};
use tempfile::TempDir;

fn run(executor: &mut Executor, sql: &str) -> QueryResult {
    let mut statements = parser::parse(sql).unwrap_or_else(|e| panic!("{}: {}", sql, e));
    assert_eq!(statements.len(), 1, "expected one statement in {:?}", sql);
    let statement = statements.remove(0);
    executor
        .execute(&statement)
        .unwrap_or_else(|e| panic!("{} failed: {}", sql, e))
}

fn run_err(executor: &mut Executor, sql: &str) -> ExecError {
    let mut statements = parser::parse(sql).unwrap_or_else(|e| panic!("{}: {}", sql, e));
    let statement = statements.remove(0);
    executor
        .execute(&statement)
        .err()
        .unwrap_or_else(|| panic!("{} unexpectedly succeeded", sql))
}

fn text(row: &Row, column: &str) -> String {
    match row.get(column) {
        Some(Value::Text(s)) => s.clone(),
        other => panic!("expected text in {}, got {:?}", column, other),
    }
}

fn int(row: &Row, column: &str) -> i32 {
    match row.get(column) {
        Some(Value::Int(n)) => *n,
        other => panic!("expected int in {}, got {:?}", column, other),
    }
}

#[test]
fn test_create_and_show() {
    let dir = TempDir::new().unwrap();
    let mut executor = Executor::new(dir.path()).unwrap();

    let result = run(&mut executor, "CREATE TABLE foo (a INT, b TEXT)");
    assert_eq!(result.message(), "created foo");

    let result = run(&mut executor, "SHOW TABLES");
    let rows = result.rows().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(text(&rows[0], "table_name"), "foo");

    let result = run(&mut executor, "SHOW COLUMNS FROM foo");
    let rows = result.rows().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(text(&rows[0], "table_name"), "foo");
    assert_eq!(text(&rows[0], "column_name"), "a");
    assert_eq!(text(&rows[0], "data_type"), "INT");
    assert_eq!(text(&rows[1], "column_name"), "b");
    assert_eq!(text(&rows[1], "data_type"), "TEXT");
}

#[test]
fn test_thousand_row_scenario() {
    let dir = TempDir::new().unwrap();
    let mut executor = Executor::new(dir.path()).unwrap();
    run(&mut executor, "CREATE TABLE foo (a INT, b TEXT)");

    for i in -1..=999 {
        let result = run(
            &mut executor,
            &format!("INSERT INTO foo (a, b) VALUES ({}, 'abc')", i),
        );
        assert!(result.message().starts_with("successfully inserted 1 row"));
    }

    let result = run(&mut executor, "SELECT * FROM foo");
    let rows = result.rows().unwrap();
    assert_eq!(rows.len(), 1001);
    assert_eq!(result.message(), "successfully returned 1001 rows");

    let values: HashSet<i32> = rows.iter().map(|row| int(row, "a")).collect();
    let expected: HashSet<i32> = (-1..=999).collect();
    assert_eq!(values, expected);
    assert!(rows.iter().all(|row| text(row, "b") == "abc"));

    // Index the populated table and look a row up through it.
    run(&mut executor, "CREATE INDEX ix ON foo USING BTREE (a)");

    let result = run(&mut executor, "SHOW INDEX FROM foo");
    let rows = result.rows().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(text(&rows[0], "table_name"), "foo");
    assert_eq!(text(&rows[0], "index_name"), "ix");
    assert_eq!(int(&rows[0], "seq_in_index"), 1);
    assert_eq!(text(&rows[0], "column_name"), "a");
    assert_eq!(text(&rows[0], "index_type"), "BTREE");
    assert_eq!(rows[0].get("is_unique"), Some(&Value::Boolean(true)));

    drop(executor);
    let mut tables = Tables::new(dir.path()).unwrap();
    let mut indices = Indices::new(dir.path()).unwrap();
    let relation = tables.get_table("foo").unwrap();
    let index = indices.get_index(relation, "foo", "ix").unwrap();

    let mut key = Row::new();
    key.insert("a".to_string(), Value::Int(12));
    let handles = index.lookup(&key).unwrap();
    assert_eq!(handles.len(), 1);
    let row = relation.project(handles[0], None).unwrap();
    assert_eq!(int(&row, "a"), 12);
    assert_eq!(text(&row, "b"), "abc");

    key.insert("a".to_string(), Value::Int(5000));
    assert!(index.lookup(&key).unwrap().is_empty());
}

#[test]
fn test_insert_maintains_existing_index() {
    let dir = TempDir::new().unwrap();
    let mut executor = Executor::new(dir.path()).unwrap();
    run(&mut executor, "CREATE TABLE foo (a INT, b TEXT)");
    run(&mut executor, "CREATE INDEX ix ON foo USING BTREE (a)");

    let result = run(&mut executor, "INSERT INTO foo (a, b) VALUES (41, 'later')");
    assert_eq!(
        result.message(),
        "successfully inserted 1 row into foo and 1 indices"
    );

    drop(executor);
    let mut tables = Tables::new(dir.path()).unwrap();
    let mut indices = Indices::new(dir.path()).unwrap();
    let relation = tables.get_table("foo").unwrap();
    let index = indices.get_index(relation, "foo", "ix").unwrap();

    let mut key = Row::new();
    key.insert("a".to_string(), Value::Int(41));
    let handles = index.lookup(&key).unwrap();
    assert_eq!(handles.len(), 1);
    let row = relation.project(handles[0], None).unwrap();
    assert_eq!(text(&row, "b"), "later");
}

#[test]
fn test_drop_index_then_table() {
    let dir = TempDir::new().unwrap();
    let mut executor = Executor::new(dir.path()).unwrap();
    run(&mut executor, "CREATE TABLE foo (a INT, b TEXT)");
    run(&mut executor, "INSERT INTO foo VALUES (1, 'x')");
    run(&mut executor, "CREATE INDEX ix ON foo USING BTREE (a)");
    assert!(dir.path().join("foo-ix").exists());

    let result = run(&mut executor, "DROP INDEX ix FROM foo");
    assert_eq!(result.message(), "dropped index ix");
    assert!(!dir.path().join("foo-ix").exists());
    let result = run(&mut executor, "SHOW INDEX FROM foo");
    assert_eq!(result.rows().unwrap().len(), 0);

    let result = run(&mut executor, "DROP TABLE foo");
    assert_eq!(result.message(), "dropped foo");
    assert!(!dir.path().join("foo").exists());
    let result = run(&mut executor, "SHOW TABLES");
    assert_eq!(result.rows().unwrap().len(), 0);
    let result = run(&mut executor, "SHOW COLUMNS FROM foo");
    assert_eq!(result.rows().unwrap().len(), 0);
}

#[test]
fn test_drop_table_drops_its_indexes_first() {
    let dir = TempDir::new().unwrap();
    let mut executor = Executor::new(dir.path()).unwrap();
    run(&mut executor, "CREATE TABLE foo (a INT, b TEXT)");
    run(&mut executor, "CREATE INDEX ix ON foo USING BTREE (a)");

    run(&mut executor, "DROP TABLE foo");
    assert!(!dir.path().join("foo-ix").exists());
    let result = run(&mut executor, "SHOW INDEX FROM foo");
    assert_eq!(result.rows().unwrap().len(), 0);
}

#[test]
fn test_schema_tables_cannot_be_dropped() {
    let dir = TempDir::new().unwrap();
    let mut executor = Executor::new(dir.path()).unwrap();

    for meta in ["_tables", "_columns", "_indices"] {
        let error = run_err(&mut executor, &format!("DROP TABLE {}", meta));
        let message = error.to_string();
        assert!(
            message.contains("cannot drop a schema table"),
            "unexpected message: {}",
            message
        );
        assert!(message.starts_with("DbRelationError: "));
    }

    // The catalog still works afterwards.
    run(&mut executor, "CREATE TABLE foo (a INT)");
    let result = run(&mut executor, "SHOW TABLES");
    assert_eq!(result.rows().unwrap().len(), 1);
}

#[test]
fn test_duplicate_column_rolls_back() {
    let dir = TempDir::new().unwrap();
    let mut executor = Executor::new(dir.path()).unwrap();

    let error = run_err(&mut executor, "CREATE TABLE bad (a INT, a TEXT)");
    assert!(matches!(error, ExecError::DuplicateColumn(_)));

    let result = run(&mut executor, "SHOW TABLES");
    assert_eq!(result.rows().unwrap().len(), 0);
    let result = run(&mut executor, "SHOW COLUMNS FROM bad");
    assert_eq!(result.rows().unwrap().len(), 0);
}

#[test]
fn test_duplicate_table_rolls_back_catalog_rows() {
    let dir = TempDir::new().unwrap();
    let mut executor = Executor::new(dir.path()).unwrap();
    run(&mut executor, "CREATE TABLE foo (a INT)");

    let error = run_err(&mut executor, "CREATE TABLE foo (a INT)");
    assert!(matches!(error, ExecError::Relation(_)));

    // One table row and one column row survive, from the first create.
    let result = run(&mut executor, "SHOW TABLES");
    assert_eq!(result.rows().unwrap().len(), 1);
    let result = run(&mut executor, "SHOW COLUMNS FROM foo");
    assert_eq!(result.rows().unwrap().len(), 1);
}

#[test]
fn test_create_table_if_not_exists_is_idempotent_about_the_file() {
    let dir = TempDir::new().unwrap();
    let mut executor = Executor::new(dir.path()).unwrap();
    run(&mut executor, "CREATE TABLE foo (a INT)");
    run(&mut executor, "INSERT INTO foo VALUES (7)");

    run(&mut executor, "CREATE TABLE IF NOT EXISTS foo (a INT)");
    let result = run(&mut executor, "SELECT * FROM foo");
    assert_eq!(result.rows().unwrap().len(), 1);
}

#[test]
fn test_create_index_with_missing_column_rolls_back() {
    let dir = TempDir::new().unwrap();
    let mut executor = Executor::new(dir.path()).unwrap();
    run(&mut executor, "CREATE TABLE foo (a INT, b TEXT)");

    let error = run_err(&mut executor, "CREATE INDEX ix ON foo USING BTREE (nope)");
    assert!(matches!(error, ExecError::ColumnNotFound(_)));

    let result = run(&mut executor, "SHOW INDEX FROM foo");
    assert_eq!(result.rows().unwrap().len(), 0);
    assert!(!dir.path().join("foo-ix").exists());
}

#[test]
fn test_duplicate_index_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut executor = Executor::new(dir.path()).unwrap();
    run(&mut executor, "CREATE TABLE foo (a INT)");
    run(&mut executor, "CREATE INDEX ix ON foo USING BTREE (a)");

    let error = run_err(&mut executor, "CREATE INDEX ix ON foo USING BTREE (a)");
    assert!(matches!(error, ExecError::DuplicateIndex(_, _)));
    let result = run(&mut executor, "SHOW INDEX FROM foo");
    assert_eq!(result.rows().unwrap().len(), 1);
}

#[test]
fn test_non_btree_index_fails_and_rolls_back() {
    let dir = TempDir::new().unwrap();
    let mut executor = Executor::new(dir.path()).unwrap();
    run(&mut executor, "CREATE TABLE foo (a INT)");

    // A HASH index is catalogued as non-unique, which the BTree refuses.
    let error = run_err(&mut executor, "CREATE INDEX hx ON foo USING HASH (a)");
    assert!(error.to_string().contains("unique"));
    let result = run(&mut executor, "SHOW INDEX FROM foo");
    assert_eq!(result.rows().unwrap().len(), 0);
}

#[test]
fn test_unrecognized_column_type_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut executor = Executor::new(dir.path()).unwrap();

    let error = run_err(&mut executor, "CREATE TABLE foo (x DOUBLE)");
    assert!(matches!(error, ExecError::UnrecognizedType(_)));
    let result = run(&mut executor, "SHOW TABLES");
    assert_eq!(result.rows().unwrap().len(), 0);
}

#[test]
fn test_insert_value_count_must_match() {
    let dir = TempDir::new().unwrap();
    let mut executor = Executor::new(dir.path()).unwrap();
    run(&mut executor, "CREATE TABLE foo (a INT, b TEXT)");

    let error = run_err(&mut executor, "INSERT INTO foo (a, b) VALUES (1)");
    assert!(matches!(error, ExecError::WrongValueCount));
    let error = run_err(&mut executor, "INSERT INTO foo VALUES (1)");
    assert!(matches!(error, ExecError::WrongValueCount));
    let error = run_err(&mut executor, "INSERT INTO foo (a, c) VALUES (1, 'x')");
    assert!(matches!(error, ExecError::ColumnNotFound(_)));
}

#[test]
fn test_select_with_where_and_projection() {
    let dir = TempDir::new().unwrap();
    let mut executor = Executor::new(dir.path()).unwrap();
    run(&mut executor, "CREATE TABLE foo (a INT, b TEXT)");
    run(&mut executor, "INSERT INTO foo VALUES (1, 'one')");
    run(&mut executor, "INSERT INTO foo VALUES (2, 'two')");
    run(&mut executor, "INSERT INTO foo VALUES (2, 'dos')");

    let result = run(&mut executor, "SELECT b FROM foo WHERE a = 2");
    assert_eq!(result.column_names().unwrap(), ["b"]);
    let rows = result.rows().unwrap();
    assert_eq!(rows.len(), 2);
    let mut values: Vec<String> = rows.iter().map(|row| text(row, "b")).collect();
    values.sort();
    assert_eq!(values, ["dos", "two"]);

    let result = run(
        &mut executor,
        "SELECT * FROM foo WHERE a = 2 AND b = 'dos'",
    );
    assert_eq!(result.rows().unwrap().len(), 1);

    let error = run_err(&mut executor, "SELECT nope FROM foo");
    assert!(error.to_string().contains("unknown column"));
}

#[test]
fn test_catalog_persists_across_sessions() {
    let dir = TempDir::new().unwrap();
    {
        let mut executor = Executor::new(dir.path()).unwrap();
        run(&mut executor, "CREATE TABLE foo (a INT, b TEXT)");
        run(&mut executor, "INSERT INTO foo VALUES (9, 'kept')");
    }
    let mut executor = Executor::new(dir.path()).unwrap();
    let result = run(&mut executor, "SELECT * FROM foo");
    let rows = result.rows().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(int(&rows[0], "a"), 9);
    assert_eq!(text(&rows[0], "b"), "kept");
}

#[test]
fn test_selecting_meta_tables_works() {
    let dir = TempDir::new().unwrap();
    let mut executor = Executor::new(dir.path()).unwrap();

    let result = run(&mut executor, "SELECT * FROM _tables");
    assert_eq!(result.rows().unwrap().len(), 3);

    let result = run(
        &mut executor,
        "SELECT column_name FROM _columns WHERE table_name = '_indices'",
    );
    assert_eq!(result.rows().unwrap().len(), 6);
}

#[test]
fn test_unknown_table_errors() {
    let dir = TempDir::new().unwrap();
    let mut executor = Executor::new(dir.path()).unwrap();

    let error = run_err(&mut executor, "SELECT * FROM ghost");
    assert!(error.to_string().contains("unknown table"));
    let error = run_err(&mut executor, "INSERT INTO ghost VALUES (1)");
    assert!(error.to_string().contains("unknown table"));
    let error = run_err(&mut executor, "DROP TABLE ghost");
    assert!(error.to_string().contains("unknown table"));
}
