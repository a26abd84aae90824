use std::time::Duration;

use sqlx::postgres::{PgArguments, PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::query::Query;
use sqlx::{Postgres, Transaction};
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

use crate::error::{Error, Result, StorageError};
use crate::row::{Row, SqlValue};
use crate::store::{Column, ColumnType, Dialect, Store, bind_values, check_identifier};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgConfig {
    pub dbname: String,
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub acquire_timeout: Duration,
}

impl Default for PgConfig {
    fn default() -> Self {
        Self {
            dbname: "formula1".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            host: "localhost".to_string(),
            port: 5432,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

/// Postgres-backed staging store. The pool holds a single connection and is
/// driven from a private current-thread runtime so callers stay blocking.
pub struct PgStore {
    runtime: Runtime,
    pool: PgPool,
}

impl PgStore {
    pub fn connect(config: &PgConfig) -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(StorageError::Runtime)?;

        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.dbname);
        debug!(host = %config.host, port = config.port, db = %config.dbname, "connecting to postgres");
        let pool = runtime.block_on(
            PgPoolOptions::new()
                .max_connections(1)
                .acquire_timeout(config.acquire_timeout)
                .connect_with(options),
        )?;
        Ok(Self { runtime, pool })
    }
}

impl Store for PgStore {
    fn ensure_table(&mut self, schema: &str, table: &str, ddl: &str) -> Result<()> {
        check_identifier("schema", schema)?;
        debug!(schema, table, "ensuring table");
        let create_schema = format!("CREATE SCHEMA IF NOT EXISTS {schema}");
        let pool = &self.pool;
        self.runtime.block_on(async {
            sqlx::query(&create_schema).execute(pool).await?;
            sqlx::query(ddl).execute(pool).await?;
            Ok::<_, sqlx::Error>(())
        })?;
        Ok(())
    }

    fn write_batch(&mut self, sql: &str, columns: &[Column], rows: &[Row]) -> Result<usize> {
        let pool = &self.pool;
        self.runtime.block_on(async {
            let mut tx = pool.begin().await?;
            match apply_rows(&mut tx, sql, columns, rows).await {
                Ok(written) => {
                    tx.commit().await?;
                    Ok::<_, Error>(written)
                }
                Err(err) => {
                    tx.rollback().await.ok();
                    Err(err)
                }
            }
        })
    }

    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }
}

async fn apply_rows(
    tx: &mut Transaction<'static, Postgres>,
    sql: &str,
    columns: &[Column],
    rows: &[Row],
) -> Result<usize> {
    let mut written = 0usize;
    for row in rows {
        let values = bind_values(columns, row)?;
        let mut query = sqlx::query(sql);
        for (column, value) in columns.iter().zip(values) {
            query = bind(query, column, value)?;
        }
        query.execute(&mut **tx).await?;
        written += 1;
    }
    Ok(written)
}

fn bind<'q>(
    query: Query<'q, Postgres, PgArguments>,
    column: &Column,
    value: SqlValue,
) -> Result<Query<'q, Postgres, PgArguments>> {
    let mismatch = |found: &'static str| {
        Error::Storage(StorageError::TypeMismatch {
            column: column.name.to_string(),
            expected: column.ty.name(),
            found,
        })
    };
    let query = match (column.ty, value) {
        (ColumnType::Integer, SqlValue::Integer(v)) => {
            let v = i32::try_from(v).map_err(|_| mismatch("out-of-range integer"))?;
            query.bind(v)
        }
        (ColumnType::Integer, SqlValue::Null) => query.bind(None::<i32>),
        (ColumnType::Double, SqlValue::Real(v)) => query.bind(v),
        (ColumnType::Double, SqlValue::Null) => query.bind(None::<f64>),
        (ColumnType::Text, SqlValue::Text(v)) => query.bind(v),
        (ColumnType::Text, SqlValue::Null) => query.bind(None::<String>),
        (_, other) => return Err(mismatch(other.type_name())),
    };
    Ok(query)
}
