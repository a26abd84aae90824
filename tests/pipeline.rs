use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;

use serde_json::Value;

use f1_stage::client::Fetch;
use f1_stage::error::{Error, FetchError, Result};
use f1_stage::load::{EntityKind, load_entity, run_season};
use f1_stage::parse::Resource;
use f1_stage::row::SqlValue;
use f1_stage::store::SqliteStore;
use f1_stage::tables::{CIRCUITS, CONSTRUCTOR_STANDINGS, CONSTRUCTORS};

const SCHEMA: &str = "f1_stg";

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

/// Serves `tests/fixtures/{resource}_{year}.json` and records each request.
#[derive(Default)]
struct FixtureSource {
    requests: RefCell<Vec<(i32, Resource)>>,
    fail_on: Option<Resource>,
}

impl Fetch for FixtureSource {
    fn fetch(&self, year: i32, resource: Resource) -> Result<Value> {
        self.requests.borrow_mut().push((year, resource));
        if self.fail_on == Some(resource) {
            return Err(Error::Fetch {
                url: format!("fixture://{year}/{resource}/"),
                source: FetchError::Status {
                    status: 503,
                    body: "unavailable".to_string(),
                },
            });
        }
        let raw = read_fixture(&format!("{resource}_{year}.json"));
        Ok(serde_json::from_str(&raw).expect("fixture should be json"))
    }
}

#[test]
fn monza_loads_once_and_reruns_in_place() {
    let source = FixtureSource::default();
    let mut store = SqliteStore::open_in_memory().unwrap();

    for _ in 0..2 {
        let summary = load_entity(&source, &mut store, SCHEMA, 2025, EntityKind::Circuits).unwrap();
        assert_eq!(summary.rows_upserted, 2);
        assert_eq!(summary.table, "f1_stg.circuits_stg");
    }

    let rows = store
        .read_table(
            &CIRCUITS.qualified_name(SCHEMA),
            CIRCUITS.columns,
            &["circuit_id"],
        )
        .unwrap();
    let monza = rows
        .iter()
        .filter(|r| r.get("circuit_id").as_str() == Some("monza"))
        .collect::<Vec<_>>();
    assert_eq!(monza.len(), 1);
    let monza = monza[0];
    assert_eq!(monza.get("year"), &SqlValue::Integer(2025));
    assert_eq!(monza.get("latitude"), &SqlValue::Real(45.6156));
    assert_eq!(monza.get("longitude").as_f64(), Some(9.2811));
    assert_eq!(monza.get("city").as_str(), Some("Monza"));
    assert_eq!(monza.get("country").as_str(), Some("Italy"));
    assert_eq!(
        monza.get("circuit_name").as_str(),
        Some("Autodromo Nazionale Monza")
    );
    assert_eq!(rows.len(), 2);
}

#[test]
fn full_season_loads_every_table_in_order() {
    let source = FixtureSource::default();
    let mut store = SqliteStore::open_in_memory().unwrap();

    let summary = run_season(&source, &mut store, SCHEMA, 2025).unwrap();
    assert_eq!(summary.year, 2025);
    assert_eq!(summary.rows_upserted(), 2 + 3 + 3);
    assert!(summary.finished_at >= summary.started_at);
    assert_eq!(
        source.requests.borrow().as_slice(),
        &[
            (2025, Resource::Circuits),
            (2025, Resource::Constructors),
            (2025, Resource::ConstructorStandings),
        ]
    );

    assert_eq!(
        summary.to_string(),
        "Season: 2025\n  f1_stg.circuits_stg: 2 rows upserted\n  f1_stg.constructors_stg: 3 rows upserted\n  f1_stg.constructor_standings_stg: 3 rows upserted\nRows upserted: 8"
    );

    assert_eq!(store.count_rows(&CONSTRUCTORS.qualified_name(SCHEMA)).unwrap(), 3);
    let standings = store
        .read_table(
            &CONSTRUCTOR_STANDINGS.qualified_name(SCHEMA),
            CONSTRUCTOR_STANDINGS.columns,
            &["constructorId"],
        )
        .unwrap();
    assert_eq!(standings.len(), 3);
    let ferrari = &standings[0];
    assert_eq!(ferrari.get("constructorId").as_str(), Some("ferrari"));
    assert_eq!(ferrari.get("points"), &SqlValue::Real(280.5));
    assert_eq!(ferrari.get("position"), &SqlValue::Integer(2));
    let williams = &standings[2];
    assert_eq!(williams.get("positionText").as_str(), Some("-"));
    assert!(williams.get("points").is_null());
}

#[test]
fn failing_kind_aborts_the_run_after_earlier_kinds_commit() {
    let source = FixtureSource {
        fail_on: Some(Resource::Constructors),
        ..FixtureSource::default()
    };
    let mut store = SqliteStore::open_in_memory().unwrap();

    let err = run_season(&source, &mut store, SCHEMA, 2025).unwrap_err();
    assert!(matches!(err, Error::Fetch { .. }), "{err}");
    assert_eq!(source.requests.borrow().len(), 2);
    assert_eq!(store.count_rows(&CIRCUITS.qualified_name(SCHEMA)).unwrap(), 2);
    assert!(
        store
            .count_rows(&CONSTRUCTOR_STANDINGS.qualified_name(SCHEMA))
            .is_err()
    );
}
