//! Environment-driven settings. `.env.local` and `.env` are loaded by the
//! binary before [`Config::from_env`] runs.

use std::path::PathBuf;
use std::time::Duration;

use crate::client::{ClientConfig, RetryPolicy};
use crate::error::{Error, Result};
use crate::store::PgConfig;

pub const DEFAULT_YEAR: i32 = 2025;
pub const DEFAULT_BASE_URL: &str = "https://api.jolpi.ca/ergast/f1";
pub const DEFAULT_SCHEMA: &str = "f1_stg";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
const APP_DIR: &str = "f1_stage";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub year: i32,
    pub schema: String,
    pub client: ClientConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreConfig {
    Postgres(PgConfig),
    Sqlite { path: PathBuf },
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Blank values count as
    /// unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let year = parse_or(var("F1_YEAR"), "F1_YEAR", DEFAULT_YEAR)?;
        let schema = var("F1_STG_SCHEMA").unwrap_or_else(|| DEFAULT_SCHEMA.to_string());
        if !crate::store::is_identifier(&schema) {
            return Err(Error::Config(format!(
                "F1_STG_SCHEMA `{schema}` is not a plain identifier"
            )));
        }

        let timeout_secs = parse_or(
            var("F1_HTTP_TIMEOUT_SECS"),
            "F1_HTTP_TIMEOUT_SECS",
            DEFAULT_TIMEOUT_SECS,
        )?;
        if timeout_secs == 0 {
            return Err(Error::Config(
                "F1_HTTP_TIMEOUT_SECS must be at least 1".to_string(),
            ));
        }
        let client = ClientConfig {
            base_url: var("F1_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            timeout: Duration::from_secs(timeout_secs),
            user_agent: var("F1_USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            retry: RetryPolicy::default(),
        };

        let pg = PgConfig {
            dbname: var("PGDATABASE").unwrap_or_else(|| "formula1".to_string()),
            user: var("PGUSER").unwrap_or_else(|| "postgres".to_string()),
            password: lookup("PGPASSWORD").unwrap_or_default(),
            host: var("PGHOST").unwrap_or_else(|| "localhost".to_string()),
            port: parse_or(var("PGPORT"), "PGPORT", 5432u16)?,
            ..PgConfig::default()
        };

        let backend = var("F1_STORE").unwrap_or_else(|| "postgres".to_string());
        let store = match backend.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => StoreConfig::Postgres(pg),
            "sqlite" => {
                let path = var("F1_SQLITE_PATH").map(PathBuf::from).unwrap_or_else(|| {
                    let file = format!("{}.sqlite", pg.dbname);
                    match app_cache_dir(&var) {
                        Some(dir) => dir.join(file),
                        None => PathBuf::from(file),
                    }
                });
                StoreConfig::Sqlite { path }
            }
            other => {
                return Err(Error::Config(format!(
                    "F1_STORE must be `postgres` or `sqlite`, got `{other}`"
                )));
            }
        };

        Ok(Self {
            year,
            schema,
            client,
            store,
        })
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, key: &str, default: T) -> Result<T> {
    match raw {
        None => Ok(default),
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| Error::Config(format!("{key} has invalid value `{raw}`"))),
    }
}

fn app_cache_dir(var: &dyn Fn(&str) -> Option<String>) -> Option<PathBuf> {
    if let Some(base) = var("XDG_CACHE_HOME") {
        return Some(PathBuf::from(base).join(APP_DIR));
    }
    let home = var("HOME")?;
    Some(PathBuf::from(home).join(".cache").join(APP_DIR))
}
