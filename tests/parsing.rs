use std::fs;
use std::path::PathBuf;

use f1_stage::format::{circuit_records, constructor_records, constructor_standing_records};
use f1_stage::parse::{Resource, parse_document};

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

#[test]
fn parses_circuits_fixture() {
    let raw = read_fixture("circuits_2025.json");
    let entities = parse_document(Resource::Circuits, &raw).expect("fixture should parse");
    assert_eq!(entities.len(), 2);

    let records = circuit_records(&entities, 2025).expect("fixture should format");
    let monza = &records[0];
    assert_eq!(monza.year, 2025);
    assert_eq!(monza.circuit_id.as_deref(), Some("monza"));
    assert_eq!(monza.circuit_name.as_deref(), Some("Autodromo Nazionale Monza"));
    assert_eq!(monza.city.as_deref(), Some("Monza"));
    assert_eq!(monza.country.as_deref(), Some("Italy"));
    assert_eq!(monza.latitude, Some(45.6156));
    assert_eq!(monza.longitude, Some(9.2811));
    assert_eq!(records[1].circuit_id.as_deref(), Some("spa"));
}

#[test]
fn parses_constructors_fixture() {
    let raw = read_fixture("constructors_2025.json");
    let entities = parse_document(Resource::Constructors, &raw).expect("fixture should parse");
    let records = constructor_records(&entities, 2025).expect("fixture should format");
    assert_eq!(records.len(), 3);
    assert_eq!(records[1].constructor_id.as_deref(), Some("mclaren"));
    assert_eq!(records[1].constructor_name.as_deref(), Some("McLaren"));
    assert_eq!(records[1].nationality.as_deref(), Some("British"));
    assert!(
        records[0]
            .wiki_url
            .as_deref()
            .is_some_and(|u| u.ends_with("Scuderia_Ferrari"))
    );
}

#[test]
fn parses_constructor_standings_fixture() {
    let raw = read_fixture("constructorstandings_2025.json");
    let entities =
        parse_document(Resource::ConstructorStandings, &raw).expect("fixture should parse");
    let records = constructor_standing_records(&entities, 2025).expect("fixture should format");
    assert_eq!(records.len(), 3);

    assert_eq!(records[0].position, Some(1));
    assert_eq!(records[0].points, Some(617.0));
    assert_eq!(records[0].wins, Some(12));
    assert_eq!(records[0].constructor_id.as_deref(), Some("mclaren"));

    assert_eq!(records[1].points, Some(280.5));

    // Unclassified entry: no position, blank points.
    let williams = &records[2];
    assert_eq!(williams.position, None);
    assert_eq!(williams.position_text.as_deref(), Some("-"));
    assert_eq!(williams.points, None);
    assert_eq!(williams.wins, Some(0));
    assert_eq!(williams.name.as_deref(), Some("Williams"));
}

#[test]
fn fixture_under_wrong_resource_is_empty() {
    let raw = read_fixture("circuits_2025.json");
    let entities = parse_document(Resource::Constructors, &raw).expect("should not fail");
    assert!(entities.is_empty());
}

#[test]
fn table_without_list_is_empty() {
    let entities = parse_document(Resource::Circuits, r#"{"MRData": {"CircuitTable": {}}}"#)
        .expect("missing list should not fail");
    assert!(entities.is_empty());
}
