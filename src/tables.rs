//! Staging table catalog.

use crate::store::{Column, ColumnType};

use ColumnType::{Double, Integer, Text};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableDef {
    pub name: &'static str,
    pub columns: &'static [Column],
    pub conflict: &'static [&'static str],
}

impl TableDef {
    pub fn qualified_name(&self, schema: &str) -> String {
        format!("{schema}.{}", self.name)
    }

    /// Every column outside the conflict key, in declaration order.
    pub fn update_columns(&self) -> Vec<&'static str> {
        self.columns
            .iter()
            .map(|c| c.name)
            .filter(|name| !self.conflict.contains(name))
            .collect()
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    pub fn ddl(&self, schema: &str) -> String {
        let mut out = format!("CREATE TABLE IF NOT EXISTS {} (\n", self.qualified_name(schema));
        for column in self.columns {
            let ty = match column.ty {
                Integer => "INTEGER",
                Double => "DOUBLE PRECISION",
                Text => "TEXT",
            };
            out.push_str(&format!("  {} {ty},\n", column.name));
        }
        out.push_str(&format!("  PRIMARY KEY ({})\n);", self.conflict.join(", ")));
        out
    }
}

pub const CIRCUITS: TableDef = TableDef {
    name: "circuits_stg",
    columns: &[
        Column::new("year", Integer),
        Column::new("circuit_id", Text),
        Column::new("circuit_name", Text),
        Column::new("city", Text),
        Column::new("country", Text),
        Column::new("latitude", Double),
        Column::new("longitude", Double),
        Column::new("wiki_url", Text),
    ],
    conflict: &["year", "circuit_id"],
};

pub const CONSTRUCTORS: TableDef = TableDef {
    name: "constructors_stg",
    columns: &[
        Column::new("year", Integer),
        Column::new("constructor_id", Text),
        Column::new("constructor_name", Text),
        Column::new("nationality", Text),
        Column::new("wiki_url", Text),
    ],
    conflict: &["year", "constructor_id"],
};

pub const CONSTRUCTOR_STANDINGS: TableDef = TableDef {
    name: "constructor_standings_stg",
    columns: &[
        Column::new("year", Integer),
        Column::new("position", Integer),
        Column::new("positionText", Text),
        Column::new("points", Double),
        Column::new("wins", Integer),
        Column::new("constructorId", Text),
        Column::new("url", Text),
        Column::new("name", Text),
        Column::new("nationality", Text),
    ],
    conflict: &["year", "constructorId"],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_columns_exclude_key() {
        assert_eq!(
            CONSTRUCTOR_STANDINGS.update_columns(),
            vec!["position", "positionText", "points", "wins", "url", "name", "nationality"]
        );
        assert_eq!(
            CIRCUITS.update_columns(),
            vec!["circuit_name", "city", "country", "latitude", "longitude", "wiki_url"]
        );
    }

    #[test]
    fn ddl_declares_key_and_types() {
        let ddl = CIRCUITS.ddl("f1_stg");
        assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS f1_stg.circuits_stg ("));
        assert!(ddl.contains("  latitude DOUBLE PRECISION,\n"));
        assert!(ddl.ends_with("PRIMARY KEY (year, circuit_id)\n);"));
    }

    #[test]
    fn column_order_is_fixed() {
        assert_eq!(
            CONSTRUCTORS.column_names(),
            vec!["year", "constructor_id", "constructor_name", "nationality", "wiki_url"]
        );
    }
}
