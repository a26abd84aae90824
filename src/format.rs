//! Raw entity objects to typed staging records and canonical rows.

use serde::Deserialize;
use serde_json::{Number, Value};

use crate::error::{Error, Result};
use crate::row::Row;
use crate::tables::{self, TableDef};

/// A typed staging row bound to its target table.
pub trait StagingRecord {
    const TABLE: TableDef;

    fn into_row(self) -> Row;
}

pub fn rows<R: StagingRecord>(records: Vec<R>) -> Vec<Row> {
    records.into_iter().map(StagingRecord::into_row).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct CircuitRecord {
    pub year: i32,
    pub circuit_id: Option<String>,
    pub circuit_name: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub wiki_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorRecord {
    pub year: i32,
    pub constructor_id: Option<String>,
    pub constructor_name: Option<String>,
    pub nationality: Option<String>,
    pub wiki_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorStandingRecord {
    pub year: i32,
    pub position: Option<i64>,
    /// Kept verbatim; "D" and "E" mark disqualified or excluded entries.
    pub position_text: Option<String>,
    pub points: Option<f64>,
    pub wins: Option<i64>,
    pub constructor_id: Option<String>,
    pub url: Option<String>,
    pub name: Option<String>,
    pub nationality: Option<String>,
}

impl StagingRecord for CircuitRecord {
    const TABLE: TableDef = tables::CIRCUITS;

    fn into_row(self) -> Row {
        Row::new()
            .with("year", self.year)
            .with("circuit_id", self.circuit_id)
            .with("circuit_name", self.circuit_name)
            .with("city", self.city)
            .with("country", self.country)
            .with("latitude", self.latitude)
            .with("longitude", self.longitude)
            .with("wiki_url", self.wiki_url)
    }
}

impl StagingRecord for ConstructorRecord {
    const TABLE: TableDef = tables::CONSTRUCTORS;

    fn into_row(self) -> Row {
        Row::new()
            .with("year", self.year)
            .with("constructor_id", self.constructor_id)
            .with("constructor_name", self.constructor_name)
            .with("nationality", self.nationality)
            .with("wiki_url", self.wiki_url)
    }
}

impl StagingRecord for ConstructorStandingRecord {
    const TABLE: TableDef = tables::CONSTRUCTOR_STANDINGS;

    fn into_row(self) -> Row {
        Row::new()
            .with("year", self.year)
            .with("position", self.position)
            .with("positionText", self.position_text)
            .with("points", self.points)
            .with("wins", self.wins)
            .with("constructorId", self.constructor_id)
            .with("url", self.url)
            .with("name", self.name)
            .with("nationality", self.nationality)
    }
}

/// Leaf value as the API sends it. Ergast encodes numbers as strings, but
/// bare JSON numbers are accepted too.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Number(Number),
    Flag(bool),
}

impl Scalar {
    fn into_text(self) -> String {
        match self {
            Scalar::Text(s) => s,
            Scalar::Number(n) => n.to_string(),
            Scalar::Flag(b) => b.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCircuit {
    #[serde(rename = "circuitId")]
    circuit_id: Option<Scalar>,
    #[serde(rename = "circuitName")]
    circuit_name: Option<Scalar>,
    #[serde(rename = "Location")]
    location: Option<RawLocation>,
    url: Option<Scalar>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawLocation {
    lat: Option<Scalar>,
    long: Option<Scalar>,
    locality: Option<Scalar>,
    country: Option<Scalar>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConstructor {
    #[serde(rename = "constructorId")]
    constructor_id: Option<Scalar>,
    name: Option<Scalar>,
    nationality: Option<Scalar>,
    url: Option<Scalar>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawStanding {
    position: Option<Scalar>,
    #[serde(rename = "positionText")]
    position_text: Option<Scalar>,
    points: Option<Scalar>,
    wins: Option<Scalar>,
    #[serde(rename = "Constructor")]
    constructor: Option<RawConstructor>,
}

pub fn circuit_records(entities: &[Value], year: i32) -> Result<Vec<CircuitRecord>> {
    let mut out = Vec::with_capacity(entities.len());
    for (idx, entity) in entities.iter().enumerate() {
        let raw: RawCircuit = decode("circuit", idx, entity)?;
        let location = raw.location.unwrap_or_default();
        out.push(CircuitRecord {
            year,
            circuit_id: text(raw.circuit_id),
            circuit_name: text(raw.circuit_name),
            city: text(location.locality),
            country: text(location.country),
            latitude: real(location.lat).map_err(|e| field_error("circuit", idx, "lat", e))?,
            longitude: real(location.long).map_err(|e| field_error("circuit", idx, "long", e))?,
            wiki_url: text(raw.url),
        });
    }
    Ok(out)
}

pub fn constructor_records(entities: &[Value], year: i32) -> Result<Vec<ConstructorRecord>> {
    let mut out = Vec::with_capacity(entities.len());
    for (idx, entity) in entities.iter().enumerate() {
        let raw: RawConstructor = decode("constructor", idx, entity)?;
        out.push(ConstructorRecord {
            year,
            constructor_id: text(raw.constructor_id),
            constructor_name: text(raw.name),
            nationality: text(raw.nationality),
            wiki_url: text(raw.url),
        });
    }
    Ok(out)
}

pub fn constructor_standing_records(
    entities: &[Value],
    year: i32,
) -> Result<Vec<ConstructorStandingRecord>> {
    let mut out = Vec::with_capacity(entities.len());
    for (idx, entity) in entities.iter().enumerate() {
        let raw: RawStanding = decode("constructor standing", idx, entity)?;
        let constructor = raw.constructor.unwrap_or_default();
        let err = |field: &'static str| move |e| field_error("constructor standing", idx, field, e);
        out.push(ConstructorStandingRecord {
            year,
            position: integer(raw.position).map_err(err("position"))?,
            position_text: text(raw.position_text),
            points: real(raw.points).map_err(err("points"))?,
            wins: integer(raw.wins).map_err(err("wins"))?,
            constructor_id: text(constructor.constructor_id),
            url: text(constructor.url),
            name: text(constructor.name),
            nationality: text(constructor.nationality),
        });
    }
    Ok(out)
}

fn decode<'a, T: Deserialize<'a> + Default>(kind: &str, idx: usize, entity: &'a Value) -> Result<T> {
    if entity.is_null() {
        return Ok(T::default());
    }
    T::deserialize(entity).map_err(|err| Error::Validation(format!("{kind} entity {idx}: {err}")))
}

fn field_error(kind: &str, idx: usize, field: &str, reason: String) -> Error {
    Error::Validation(format!("{kind} entity {idx}: field `{field}`: {reason}"))
}

fn text(value: Option<Scalar>) -> Option<String> {
    value.map(Scalar::into_text)
}

/// Empty or blank numeric text is null, never zero.
fn real(value: Option<Scalar>) -> Result<Option<f64>, String> {
    match value {
        None => Ok(None),
        Some(Scalar::Number(n)) => Ok(n.as_f64()),
        Some(Scalar::Text(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed
                .parse::<f64>()
                .map(Some)
                .map_err(|_| format!("`{s}` is not a number"))
        }
        Some(Scalar::Flag(b)) => Err(format!("`{b}` is not a number")),
    }
}

fn integer(value: Option<Scalar>) -> Result<Option<i64>, String> {
    match value {
        None => Ok(None),
        Some(Scalar::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| format!("`{n}` is not an integer")),
        Some(Scalar::Text(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed
                .parse::<i64>()
                .map(Some)
                .map_err(|_| format!("`{s}` is not an integer"))
        }
        Some(Scalar::Flag(b)) => Err(format!("`{b}` is not an integer")),
    }
}
