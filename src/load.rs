//! Per-entity load runs: fetch, parse, format, then upsert.

use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::info;

use crate::client::Fetch;
use crate::error::Result;
use crate::format::{self, StagingRecord};
use crate::parse::{self, Resource};
use crate::row::Row;
use crate::store::Store;
use crate::tables::{self, TableDef};

/// The entity kinds this job stages, in run order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Circuits,
    Constructors,
    ConstructorStandings,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [
        EntityKind::Circuits,
        EntityKind::Constructors,
        EntityKind::ConstructorStandings,
    ];

    pub fn resource(self) -> Resource {
        match self {
            EntityKind::Circuits => Resource::Circuits,
            EntityKind::Constructors => Resource::Constructors,
            EntityKind::ConstructorStandings => Resource::ConstructorStandings,
        }
    }

    pub fn table(self) -> TableDef {
        match self {
            EntityKind::Circuits => tables::CIRCUITS,
            EntityKind::Constructors => tables::CONSTRUCTORS,
            EntityKind::ConstructorStandings => tables::CONSTRUCTOR_STANDINGS,
        }
    }

    /// Formats raw entity objects into rows for [`EntityKind::table`].
    pub fn rows(self, entities: &[Value], year: i32) -> Result<Vec<Row>> {
        Ok(match self {
            EntityKind::Circuits => format::rows(format::circuit_records(entities, year)?),
            EntityKind::Constructors => format::rows(format::constructor_records(entities, year)?),
            EntityKind::ConstructorStandings => {
                format::rows(format::constructor_standing_records(entities, year)?)
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadSummary {
    pub kind: EntityKind,
    pub table: String,
    pub rows_upserted: usize,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub year: i32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub loads: Vec<LoadSummary>,
}

impl RunSummary {
    pub fn rows_upserted(&self) -> usize {
        self.loads.iter().map(|l| l.rows_upserted).sum()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Season: {}", self.year)?;
        for item in &self.loads {
            writeln!(f, "  {}: {} rows upserted", item.table, item.rows_upserted)?;
        }
        write!(f, "Rows upserted: {}", self.rows_upserted())
    }
}

/// Creates the target table if needed and upserts already-formatted rows.
pub fn load_rows(store: &mut dyn Store, schema: &str, def: &TableDef, rows: &[Row]) -> Result<usize> {
    let table = def.qualified_name(schema);
    store.ensure_table(schema, def.name, &def.ddl(schema))?;
    let update_columns = def.update_columns();
    store.upsert(&table, def.columns, rows, def.conflict, &update_columns)
}

/// Loads typed records into the record type's own table.
pub fn load_records<R: StagingRecord>(
    store: &mut dyn Store,
    schema: &str,
    records: Vec<R>,
) -> Result<usize> {
    load_rows(store, schema, &R::TABLE, &format::rows(records))
}

/// One full fetch → parse → format → upsert pass for `kind`.
pub fn load_entity(
    source: &dyn Fetch,
    store: &mut dyn Store,
    schema: &str,
    year: i32,
    kind: EntityKind,
) -> Result<LoadSummary> {
    let resource = kind.resource();
    let doc = source.fetch(year, resource)?;
    let entities = parse::entities(resource, &doc)?;
    let rows = kind.rows(&entities, year)?;
    let def = kind.table();
    info!(year, resource = %resource, rows = rows.len(), "loading {}", def.name);
    let rows_upserted = load_rows(store, schema, &def, &rows)?;
    Ok(LoadSummary {
        kind,
        table: def.qualified_name(schema),
        rows_upserted,
    })
}

/// Runs every entity kind in order. The first failure aborts the run;
/// kinds already loaded stay committed.
pub fn run_season(
    source: &dyn Fetch,
    store: &mut dyn Store,
    schema: &str,
    year: i32,
) -> Result<RunSummary> {
    let started_at = Utc::now();
    let mut loads = Vec::with_capacity(EntityKind::ALL.len());
    for kind in EntityKind::ALL {
        loads.push(load_entity(source, store, schema, year, kind)?);
    }
    let summary = RunSummary {
        year,
        started_at,
        finished_at: Utc::now(),
        loads,
    };
    info!(
        year,
        rows = summary.rows_upserted(),
        elapsed_ms = (summary.finished_at - summary.started_at).num_milliseconds(),
        "season load finished"
    );
    Ok(summary)
}
