//! Idempotent staging writes: schema bootstrap plus insert-or-update batches.

pub mod postgres;
pub mod sqlite;

use tracing::info;

use crate::config::StoreConfig;
use crate::error::{Error, Result, StorageError};
use crate::row::{Row, SqlValue};

pub use postgres::{PgConfig, PgStore};
pub use sqlite::SqliteStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Double,
    Text,
}

impl ColumnType {
    pub fn name(self) -> &'static str {
        match self {
            ColumnType::Integer => "integer",
            ColumnType::Double => "double",
            ColumnType::Text => "text",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
}

impl Column {
    pub const fn new(name: &'static str, ty: ColumnType) -> Self {
        Self { name, ty }
    }

    /// Checks `value` against the declared type. Integers widen into double
    /// columns; null fits anywhere.
    pub fn coerce(&self, value: &SqlValue) -> Result<SqlValue, StorageError> {
        match (self.ty, value) {
            (_, SqlValue::Null) => Ok(SqlValue::Null),
            (ColumnType::Integer, SqlValue::Integer(_))
            | (ColumnType::Double, SqlValue::Real(_))
            | (ColumnType::Text, SqlValue::Text(_)) => Ok(value.clone()),
            (ColumnType::Double, SqlValue::Integer(v)) => Ok(SqlValue::Real(*v as f64)),
            (ty, other) => Err(StorageError::TypeMismatch {
                column: self.name.to_string(),
                expected: ty.name(),
                found: other.type_name(),
            }),
        }
    }
}

/// Placeholder flavour for generated statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

impl Dialect {
    fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Sqlite => format!("?{index}"),
            Dialect::Postgres => format!("${index}"),
        }
    }
}

pub trait Store {
    /// Creates `schema` if needed, then runs `ddl`. Safe on every run.
    fn ensure_table(&mut self, schema: &str, table: &str, ddl: &str) -> Result<()>;

    /// Applies one prepared upsert statement per row inside a single
    /// transaction. Called only with validated, non-empty batches.
    fn write_batch(&mut self, sql: &str, columns: &[Column], rows: &[Row]) -> Result<usize>;

    fn dialect(&self) -> Dialect;

    /// Inserts each row, or overwrites `update_columns` when a row with the
    /// same `conflict_columns` already exists. All or nothing per call; an
    /// empty batch returns without touching the backend.
    fn upsert(
        &mut self,
        table: &str,
        columns: &[Column],
        rows: &[Row],
        conflict_columns: &[&str],
        update_columns: &[&str],
    ) -> Result<usize> {
        validate_columns(table, columns, conflict_columns, update_columns)?;
        if rows.is_empty() {
            return Ok(0);
        }
        validate_rows(rows, conflict_columns)?;
        let sql = upsert_sql(
            self.dialect(),
            table,
            columns,
            conflict_columns,
            update_columns,
        );
        self.write_batch(&sql, columns, rows)
    }
}

/// Opens the backend selected by `config`.
pub fn open_store(config: &StoreConfig) -> Result<Box<dyn Store>> {
    match config {
        StoreConfig::Postgres(pg) => {
            info!(host = %pg.host, port = pg.port, db = %pg.dbname, "using postgres store");
            Ok(Box::new(PgStore::connect(pg)?))
        }
        StoreConfig::Sqlite { path } => {
            info!(path = %path.display(), "using sqlite store");
            Ok(Box::new(SqliteStore::open(path)?))
        }
    }
}

pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `table` or `schema.table`, each part a plain identifier.
pub fn is_table_name(name: &str) -> bool {
    match name.split_once('.') {
        Some((schema, table)) => is_identifier(schema) && is_identifier(table),
        None => is_identifier(name),
    }
}

pub fn check_identifier(kind: &str, name: &str) -> Result<()> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(Error::Validation(format!("invalid {kind} name `{name}`")))
    }
}

pub fn validate_columns(
    table: &str,
    columns: &[Column],
    conflict_columns: &[&str],
    update_columns: &[&str],
) -> Result<()> {
    if !is_table_name(table) {
        return Err(Error::Validation(format!("invalid table name `{table}`")));
    }
    if columns.is_empty() {
        return Err(Error::Validation(format!("{table}: empty column list")));
    }
    for (idx, column) in columns.iter().enumerate() {
        check_identifier("column", column.name)?;
        if columns[..idx].iter().any(|c| c.name == column.name) {
            return Err(Error::Validation(format!(
                "{table}: duplicate column `{}`",
                column.name
            )));
        }
    }
    if conflict_columns.is_empty() {
        return Err(Error::Validation(format!("{table}: empty conflict key")));
    }
    let known = |name: &str| columns.iter().any(|c| c.name == name);
    for name in conflict_columns {
        if !known(*name) {
            return Err(Error::Validation(format!(
                "{table}: conflict column `{name}` is not in the column list"
            )));
        }
    }
    for name in update_columns {
        if !known(*name) {
            return Err(Error::Validation(format!(
                "{table}: update column `{name}` is not in the column list"
            )));
        }
        if conflict_columns.contains(name) {
            return Err(Error::Validation(format!(
                "{table}: update column `{name}` is part of the conflict key"
            )));
        }
    }
    Ok(())
}

pub fn validate_rows(rows: &[Row], conflict_columns: &[&str]) -> Result<()> {
    for (idx, row) in rows.iter().enumerate() {
        for name in conflict_columns {
            if row.get(name).is_null() {
                return Err(Error::Validation(format!(
                    "row {idx}: missing value for key column `{name}`"
                )));
            }
        }
    }
    Ok(())
}

pub fn upsert_sql(
    dialect: Dialect,
    table: &str,
    columns: &[Column],
    conflict_columns: &[&str],
    update_columns: &[&str],
) -> String {
    let names = columns.iter().map(|c| c.name).collect::<Vec<_>>().join(", ");
    let placeholders = (1..=columns.len())
        .map(|i| dialect.placeholder(i))
        .collect::<Vec<_>>()
        .join(", ");
    let conflict = conflict_columns.join(", ");
    let action = if update_columns.is_empty() {
        "DO NOTHING".to_string()
    } else {
        let setters = update_columns
            .iter()
            .map(|c| format!("{c} = excluded.{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("DO UPDATE SET {setters}")
    };
    format!("INSERT INTO {table} ({names}) VALUES ({placeholders}) ON CONFLICT ({conflict}) {action}")
}

/// Values of `row` in column order, type-checked.
pub fn bind_values(columns: &[Column], row: &Row) -> Result<Vec<SqlValue>> {
    columns
        .iter()
        .map(|column| column.coerce(row.get(column.name)).map_err(Error::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLUMNS: &[Column] = &[
        Column::new("year", ColumnType::Integer),
        Column::new("circuit_id", ColumnType::Text),
        Column::new("latitude", ColumnType::Double),
    ];

    #[derive(Default)]
    struct RecordingStore {
        batches: Vec<(String, usize)>,
    }

    impl Store for RecordingStore {
        fn ensure_table(&mut self, _schema: &str, _table: &str, _ddl: &str) -> Result<()> {
            Ok(())
        }

        fn write_batch(&mut self, sql: &str, _columns: &[Column], rows: &[Row]) -> Result<usize> {
            self.batches.push((sql.to_string(), rows.len()));
            Ok(rows.len())
        }

        fn dialect(&self) -> Dialect {
            Dialect::Sqlite
        }
    }

    #[test]
    fn sql_for_sqlite() {
        let sql = upsert_sql(
            Dialect::Sqlite,
            "f1_stg.circuits_stg",
            COLUMNS,
            &["year", "circuit_id"],
            &["latitude"],
        );
        assert_eq!(
            sql,
            "INSERT INTO f1_stg.circuits_stg (year, circuit_id, latitude) VALUES (?1, ?2, ?3) \
             ON CONFLICT (year, circuit_id) DO UPDATE SET latitude = excluded.latitude"
        );
    }

    #[test]
    fn sql_for_postgres_without_updates() {
        let sql = upsert_sql(Dialect::Postgres, "t", COLUMNS, &["year"], &[]);
        assert!(sql.contains("VALUES ($1, $2, $3)"));
        assert!(sql.ends_with("ON CONFLICT (year) DO NOTHING"));
    }

    #[test]
    fn empty_batch_skips_backend() {
        let mut store = RecordingStore::default();
        let n = store
            .upsert("t", COLUMNS, &[], &["year", "circuit_id"], &["latitude"])
            .unwrap();
        assert_eq!(n, 0);
        assert!(store.batches.is_empty());
    }

    #[test]
    fn missing_key_value_is_validation_error() {
        let mut store = RecordingStore::default();
        let rows = vec![
            Row::new().with("year", 2025).with("circuit_id", "monza"),
            Row::new().with("year", 2025),
        ];
        let err = store
            .upsert("t", COLUMNS, &rows, &["year", "circuit_id"], &["latitude"])
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(err.to_string().contains("row 1"));
        assert!(store.batches.is_empty());
    }

    #[test]
    fn rejects_bad_column_lists() {
        assert!(validate_columns("t", COLUMNS, &[], &[]).is_err());
        assert!(validate_columns("t", COLUMNS, &["nope"], &[]).is_err());
        assert!(validate_columns("t", COLUMNS, &["year"], &["year"]).is_err());
        assert!(validate_columns("t", COLUMNS, &["year"], &["wins"]).is_err());
        assert!(validate_columns("t; drop", COLUMNS, &["year"], &[]).is_err());
        assert!(validate_columns("a.b.c", COLUMNS, &["year"], &[]).is_err());
        assert!(validate_columns("s.t", COLUMNS, &["year"], &["latitude"]).is_ok());
    }

    #[test]
    fn coerce_widens_and_rejects() {
        let lat = Column::new("latitude", ColumnType::Double);
        assert_eq!(lat.coerce(&SqlValue::Integer(45)).unwrap(), SqlValue::Real(45.0));
        assert!(lat.coerce(&SqlValue::Null).unwrap().is_null());
        let err = lat.coerce(&SqlValue::Text("45.6".into())).unwrap_err();
        assert!(matches!(
            err,
            StorageError::TypeMismatch { expected: "double", found: "text", .. }
        ));
    }

    #[test]
    fn identifiers() {
        assert!(is_identifier("positionText"));
        assert!(is_identifier("_x1"));
        assert!(!is_identifier("1x"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("a-b"));
    }
}
