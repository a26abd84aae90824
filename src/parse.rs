//! Projection of the Ergast `MRData` envelope down to entity objects.

use std::fmt;

use serde_json::Value;

use crate::error::{Error, Result};

const ROOT_KEY: &str = "MRData";
const STANDINGS_LISTS: &str = "StandingsLists";

/// An API resource addressable as `{base}/{year}/{resource}/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Circuits,
    Constructors,
    ConstructorStandings,
    Drivers,
    DriverStandings,
    Races,
    Results,
    Qualifying,
    Sprint,
    Seasons,
    Status,
}

/// Where a resource's entity array sits inside `MRData`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope {
    pub table: &'static str,
    pub list: &'static str,
    /// Standings responses wrap entities in `StandingsLists[0].<key>`.
    pub standings: Option<&'static str>,
}

impl Resource {
    pub const ALL: [Resource; 11] = [
        Resource::Circuits,
        Resource::Constructors,
        Resource::ConstructorStandings,
        Resource::Drivers,
        Resource::DriverStandings,
        Resource::Races,
        Resource::Results,
        Resource::Qualifying,
        Resource::Sprint,
        Resource::Seasons,
        Resource::Status,
    ];

    pub fn path_segment(self) -> &'static str {
        match self {
            Resource::Circuits => "circuits",
            Resource::Constructors => "constructors",
            Resource::ConstructorStandings => "constructorstandings",
            Resource::Drivers => "drivers",
            Resource::DriverStandings => "driverstandings",
            Resource::Races => "races",
            Resource::Results => "results",
            Resource::Qualifying => "qualifying",
            Resource::Sprint => "sprint",
            Resource::Seasons => "seasons",
            Resource::Status => "status",
        }
    }

    pub fn envelope(self) -> Envelope {
        match self {
            Resource::Circuits => flat("CircuitTable", "Circuits"),
            Resource::Constructors => flat("ConstructorTable", "Constructors"),
            Resource::ConstructorStandings => standings("ConstructorStandings"),
            Resource::Drivers => flat("DriverTable", "Drivers"),
            Resource::DriverStandings => standings("DriverStandings"),
            Resource::Races | Resource::Results | Resource::Qualifying | Resource::Sprint => {
                flat("RaceTable", "Races")
            }
            Resource::Seasons => flat("SeasonTable", "Seasons"),
            Resource::Status => flat("StatusTable", "Status"),
        }
    }

    pub fn from_path_segment(segment: &str) -> Option<Resource> {
        let wanted = segment.trim().trim_matches('/');
        Resource::ALL
            .into_iter()
            .find(|r| r.path_segment().eq_ignore_ascii_case(wanted))
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

fn flat(table: &'static str, list: &'static str) -> Envelope {
    Envelope {
        table,
        list,
        standings: None,
    }
}

fn standings(key: &'static str) -> Envelope {
    Envelope {
        table: "StandingsTable",
        list: STANDINGS_LISTS,
        standings: Some(key),
    }
}

/// Returns the innermost entity array for `resource`.
///
/// Any missing or mistyped level below the root yields an empty list; only a
/// root that is not a JSON object is an error.
pub fn entities(resource: Resource, doc: &Value) -> Result<Vec<Value>> {
    let Some(root) = doc.as_object() else {
        return Err(Error::Parse(format!(
            "{resource}: expected a JSON object at the root, got {}",
            kind_of(doc)
        )));
    };

    let envelope = resource.envelope();
    let list = root
        .get(ROOT_KEY)
        .and_then(|v| v.get(envelope.table))
        .and_then(|v| v.get(envelope.list))
        .and_then(|v| v.as_array());
    let Some(list) = list else {
        return Ok(Vec::new());
    };

    let items = match envelope.standings {
        None => Some(list),
        Some(key) => list
            .first()
            .and_then(|first| first.get(key))
            .and_then(|v| v.as_array()),
    };
    Ok(items.cloned().unwrap_or_default())
}

/// Decodes a raw response body and projects it. An empty body is an empty
/// result; any other body follows [`entities`], so `null` is rejected.
pub fn parse_document(resource: Resource, raw: &str) -> Result<Vec<Value>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let doc: Value = serde_json::from_str(trimmed)
        .map_err(|err| Error::Parse(format!("{resource}: invalid json: {err}")))?;
    entities(resource, &doc)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
