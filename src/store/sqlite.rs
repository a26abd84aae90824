use std::path::{Path, PathBuf};

use rusqlite::types::{FromSql, FromSqlResult, ToSqlOutput, Value, ValueRef};
use rusqlite::{Connection, ToSql, params_from_iter};
use tracing::debug;

use crate::error::{Error, Result, StorageError};
use crate::row::{Row, SqlValue};
use crate::store::{Column, Dialect, Store, bind_values, check_identifier, is_table_name};

/// SQLite-backed staging store. A schema other than `main` lives in its own
/// database file attached under the schema's name.
pub struct SqliteStore {
    conn: Connection,
    location: Location,
}

enum Location {
    File { dir: PathBuf, stem: String },
    Memory,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(StorageError::Runtime)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("staging")
            .to_string();
        Ok(Self {
            conn,
            location: Location::File { dir, stem },
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn,
            location: Location::Memory,
        })
    }

    /// File backing `schema`, or `None` for in-memory stores.
    pub fn schema_path(&self, schema: &str) -> Option<PathBuf> {
        match &self.location {
            Location::File { dir, stem } => Some(dir.join(format!("{stem}_{schema}.sqlite"))),
            Location::Memory => None,
        }
    }

    fn attached_schemas(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("PRAGMA database_list")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }

    fn ensure_schema(&self, schema: &str) -> Result<()> {
        check_identifier("schema", schema)?;
        if schema.eq_ignore_ascii_case("main") || schema.eq_ignore_ascii_case("temp") {
            return Ok(());
        }
        let attached = self.attached_schemas()?;
        if attached.iter().any(|name| name.eq_ignore_ascii_case(schema)) {
            return Ok(());
        }
        let target = match self.schema_path(schema) {
            Some(path) => path.to_string_lossy().into_owned(),
            None => ":memory:".to_string(),
        };
        debug!(schema, target = %target, "attaching schema database");
        self.conn
            .execute(&format!("ATTACH DATABASE ?1 AS {schema}"), [&target])?;
        Ok(())
    }

    /// Inspection helper, not used by the load path: every row of `table`,
    /// projected onto `columns`, ordered by `order_by`.
    pub fn read_table(&self, table: &str, columns: &[Column], order_by: &[&str]) -> Result<Vec<Row>> {
        if !is_table_name(table) {
            return Err(Error::Validation(format!("invalid table name `{table}`")));
        }
        for column in columns {
            check_identifier("column", column.name)?;
        }
        for name in order_by {
            check_identifier("column", name)?;
        }
        let names = columns.iter().map(|c| c.name).collect::<Vec<_>>().join(", ");
        let mut sql = format!("SELECT {names} FROM {table}");
        if !order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order_by.join(", "));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |r| {
            let mut row = Row::new();
            for (idx, column) in columns.iter().enumerate() {
                row.set(column.name, r.get::<_, SqlValue>(idx)?);
            }
            Ok(row)
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Inspection helper: row count of `table`. A missing table is an error.
    pub fn count_rows(&self, table: &str) -> Result<usize> {
        if !is_table_name(table) {
            return Err(Error::Validation(format!("invalid table name `{table}`")));
        }
        let n = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| {
                r.get::<_, i64>(0)
            })?;
        Ok(usize::try_from(n).unwrap_or_default())
    }
}

impl Store for SqliteStore {
    fn ensure_table(&mut self, schema: &str, table: &str, ddl: &str) -> Result<()> {
        self.ensure_schema(schema)?;
        debug!(schema, table, "ensuring table");
        self.conn.execute_batch(ddl)?;
        Ok(())
    }

    fn write_batch(&mut self, sql: &str, columns: &[Column], rows: &[Row]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut written = 0usize;
        {
            let mut stmt = tx.prepare(sql)?;
            for row in rows {
                let values = bind_values(columns, row)?;
                stmt.execute(params_from_iter(values.iter()))?;
                written += 1;
            }
        }
        tx.commit()?;
        Ok(written)
    }

    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Owned(Value::Null),
            SqlValue::Integer(v) => ToSqlOutput::Owned(Value::Integer(*v)),
            SqlValue::Real(v) => ToSqlOutput::Owned(Value::Real(*v)),
            SqlValue::Text(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
        })
    }
}

impl FromSql for SqlValue {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(match value {
            ValueRef::Null => SqlValue::Null,
            ValueRef::Integer(v) => SqlValue::Integer(v),
            ValueRef::Real(v) => SqlValue::Real(v),
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                SqlValue::Text(String::from_utf8_lossy(bytes).into_owned())
            }
        })
    }
}
