use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::error::{Error, Result};
use crate::sql::schema::Column;
use crate::sql::table::Table;

/// The single mutable root of the data model: owns every named table for the
/// process lifetime. There is no drop operation. Constructed once and passed
/// by reference into the executor; no global state.
#[derive(Default)]
pub struct Catalog {
    tables: HashMap<String, Table>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates and registers a new table. Fails if the name is taken.
    pub fn create_table(&mut self, name: &str, columns: Vec<Column>) -> Result<&mut Table> {
        match self.tables.entry(name.to_string()) {
            Entry::Occupied(_) => Err(Error::Config(format!("table {name} already exists"))),
            Entry::Vacant(entry) => Ok(entry.insert(Table::new(name.to_string(), columns))),
        }
    }

    /// Returns the live table; callers mutate the table itself, not a copy.
    pub fn get_table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("table {name} not found")))
    }

    pub fn get_table_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| Error::NotFound(format!("table {name} not found")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::types::{DataType, Value};

    fn columns() -> Vec<Column> {
        vec![
            Column::new("id", DataType::Integer, false),
            Column::new("name", DataType::String, true),
        ]
    }

    #[test]
    fn test_create_and_get() -> Result<()> {
        let mut catalog = Catalog::new();
        catalog.create_table("users", columns())?;
        assert!(catalog.get_table("users").is_ok());
        Ok(())
    }

    #[test]
    fn test_duplicate_table_fails() -> Result<()> {
        let mut catalog = Catalog::new();
        catalog.create_table("users", columns())?;
        let Err(err) = catalog.create_table("users", columns()) else {
            panic!("duplicate table name must be rejected");
        };
        assert_eq!(err, Error::Config("table users already exists".into()));
        // the original table survives the failed attempt
        assert!(catalog.get_table("users").is_ok());
        Ok(())
    }

    #[test]
    fn test_create_table_returns_live_handle() -> Result<()> {
        let mut catalog = Catalog::new();
        let table = catalog.create_table("users", columns())?;
        table.insert(std::collections::HashMap::from([(
            "id".to_string(),
            Value::Integer(1),
        )]))?;
        assert_eq!(catalog.get_table("users")?.rows().len(), 1);
        Ok(())
    }

    #[test]
    fn test_missing_table_is_not_found() {
        let catalog = Catalog::new();
        assert!(matches!(
            catalog.get_table("ghost"),
            Err(Error::NotFound(_))
        ));
        let mut catalog = catalog;
        assert!(matches!(
            catalog.get_table_mut("ghost"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_get_table_mut_mutates_live_table() -> Result<()> {
        let mut catalog = Catalog::new();
        catalog.create_table("users", columns())?;

        let table = catalog.get_table_mut("users")?;
        table.insert(std::collections::HashMap::from([(
            "id".to_string(),
            Value::Integer(1),
        )]))?;

        assert_eq!(catalog.get_table("users")?.rows().len(), 1);
        Ok(())
    }
}
