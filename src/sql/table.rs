use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;

use crate::error::{Error, Result};
use crate::sql::index::HashIndex;
use crate::sql::predicate::RowFilter;
use crate::sql::schema::Column;
use crate::sql::types::{DataType, Row, Value};

/// In-memory table: ordered schema, row storage, constraints and one hash
/// index per unique column.
///
/// A row's identity is its position in the current row sequence. Positions
/// are not stable across a predicated delete: removing rows renumbers
/// everything behind them, and [`Table::reindex`] restores the indexes.
/// Callers must not retain positions across a delete.
pub struct Table {
    pub name: String,
    columns: Vec<Column>,
    rows: Vec<Row>,
    pk_column: Option<String>,
    unique_columns: HashSet<String>,
    indexes: HashMap<String, HashIndex>,
    autoincrement: bool,
    pk_counter: i64,
}

fn position_of(columns: &[Column], name: &str) -> Option<usize> {
    columns.iter().position(|c| c.name == name)
}

impl Table {
    pub fn new(name: String, columns: Vec<Column>) -> Self {
        Self {
            name,
            columns,
            rows: Vec::new(),
            pk_column: None,
            unique_columns: HashSet::new(),
            indexes: HashMap::new(),
            autoincrement: false,
            pk_counter: 0,
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column_position(&self, name: &str) -> Option<usize> {
        position_of(&self.columns, name)
    }

    /// Current rows in position order. Read-only; mutation goes through
    /// insert/update/delete so the indexes stay in sync.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Defines the single-column primary key. Auto-increment is honored only
    /// for integer-typed key columns.
    pub fn define_primary_key(&mut self, column: &str, autoincrement: bool) -> Result<()> {
        let Some(pos) = self.column_position(column) else {
            return Err(Error::Config(format!("column {column} does not exist")));
        };
        if self.pk_column.is_some() {
            return Err(Error::Config("primary key already defined".into()));
        }
        self.pk_column = Some(column.to_string());
        self.unique_columns.insert(column.to_string());
        self.indexes.entry(column.to_string()).or_default();
        if autoincrement && self.columns[pos].datatype == DataType::Integer {
            self.autoincrement = true;
        }
        Ok(())
    }

    /// Adds a UNIQUE constraint on `column`. Safe to call twice; the index
    /// is reused.
    pub fn add_unique(&mut self, column: &str) -> Result<()> {
        if self.column_position(column).is_none() {
            return Err(Error::Config(format!("column {column} does not exist")));
        }
        self.unique_columns.insert(column.to_string());
        self.indexes.entry(column.to_string()).or_default();
        Ok(())
    }

    /// Validates a UNIQUE/PK constraint for `value` in `column`, optionally
    /// ignoring one row position (a row may keep its own unique value).
    fn check_unique(&self, column: &str, value: &Value, exclude: Option<usize>) -> Result<()> {
        if !self.unique_columns.contains(column) {
            return Ok(());
        }
        let Some(index) = self.indexes.get(column) else {
            return Ok(());
        };
        if index.is_empty() {
            return Ok(());
        }
        let mut matches = index.lookup(value)?;
        if let Some(position) = exclude {
            matches.remove(&position);
        }
        if !matches.is_empty() {
            return Err(Error::Constraint(format!(
                "unique/PK violation on {column} = {value}"
            )));
        }
        Ok(())
    }

    /// Inserts one row. Declared columns missing from `values` become NULL;
    /// unknown keys are ignored. Everything is validated before any row or
    /// index state changes. Returns the new row's position.
    pub fn insert(&mut self, mut values: HashMap<String, Value>) -> Result<usize> {
        let mut row: Row = self
            .columns
            .iter()
            .map(|c| values.remove(&c.name).unwrap_or(Value::Null))
            .collect();

        // Auto-increment resolution precedes validation: an omitted key gets
        // counter+1, an explicit integer key advances the counter so it never
        // decreases. A non-integer key fails type validation below.
        if self.autoincrement {
            if let Some(pos) = self
                .pk_column
                .as_ref()
                .and_then(|pk| position_of(&self.columns, pk))
            {
                match row[pos] {
                    Value::Null => {
                        self.pk_counter += 1;
                        row[pos] = Value::Integer(self.pk_counter);
                    }
                    Value::Integer(supplied) => {
                        self.pk_counter = self.pk_counter.max(supplied);
                    }
                    _ => {}
                }
            }
        }

        for (column, value) in self.columns.iter().zip(row.iter()) {
            match value.datatype() {
                None if column.nullable => {}
                None => {
                    return Err(Error::Constraint(format!(
                        "NOT NULL column {} missing value",
                        column.name
                    )));
                }
                Some(datatype) if datatype != column.datatype => {
                    return Err(Error::Constraint(format!(
                        "type mismatch for {}: expected {}",
                        column.name, column.datatype
                    )));
                }
                Some(_) => {}
            }
        }

        for column in &self.unique_columns {
            if let Some(pos) = position_of(&self.columns, column) {
                self.check_unique(column, &row[pos], None)?;
            }
        }

        let position = self.rows.len();
        for (column, index) in &mut self.indexes {
            if let Some(pos) = position_of(&self.columns, column) {
                index.add(&row[pos], position)?;
            }
        }
        self.rows.push(row);
        debug!(table = %self.name, position, "inserted row");
        Ok(position)
    }

    /// Updates rows matching `filter` (all rows when None) with the given
    /// assignments. For each matching row, every unique-column assignment is
    /// validated against its index, excluding the row's own position, before
    /// the row is touched. Returns the matched row count.
    pub fn update(
        &mut self,
        assignments: &BTreeMap<String, Value>,
        filter: Option<&RowFilter>,
    ) -> Result<usize> {
        let mut targets = Vec::with_capacity(assignments.len());
        for (column, value) in assignments {
            let Some(pos) = self.column_position(column) else {
                return Err(Error::Config(format!("column {column} does not exist")));
            };
            targets.push((pos, column.as_str(), value));
        }

        let names = self.column_names();
        let mut count = 0;
        for position in 0..self.rows.len() {
            if let Some(filter) = filter {
                if !filter(&names, &self.rows[position]) {
                    continue;
                }
            }

            // Keeping its own unique value is allowed; only changed values
            // are checked, and the row's current position is excluded.
            for (pos, column, value) in &targets {
                if self.rows[position][*pos] != **value {
                    self.check_unique(column, value, Some(position))?;
                }
            }

            for (pos, column, value) in &targets {
                let old = std::mem::replace(&mut self.rows[position][*pos], (*value).clone());
                if let Some(index) = self.indexes.get_mut(*column) {
                    index.remove(&old, position)?;
                    index.add(value, position)?;
                }
            }
            count += 1;
        }
        debug!(table = %self.name, count, "updated rows");
        Ok(count)
    }

    /// Deletes rows matching `filter`. Without a predicate the table is
    /// cleared outright, every index emptied, and the auto-increment counter
    /// reset. With one, surviving rows keep their relative order but are
    /// renumbered, and every index is rebuilt; the counter is untouched.
    /// Returns the removed row count.
    pub fn delete(&mut self, filter: Option<&RowFilter>) -> Result<usize> {
        let Some(filter) = filter else {
            let count = self.rows.len();
            self.rows.clear();
            for index in self.indexes.values_mut() {
                index.clear();
            }
            self.pk_counter = 0;
            debug!(table = %self.name, count, "cleared table");
            return Ok(count);
        };

        let names = self.column_names();
        let before = self.rows.len();
        let rows = std::mem::take(&mut self.rows);
        self.rows = rows
            .into_iter()
            .filter(|row| !filter(&names, row))
            .collect();
        let count = before - self.rows.len();
        self.reindex()?;
        debug!(table = %self.name, count, "deleted rows");
        Ok(count)
    }

    /// Rebuilds every index from the current row sequence. The single code
    /// path that restores the index/row invariant after positions shift.
    fn reindex(&mut self) -> Result<()> {
        for index in self.indexes.values_mut() {
            index.clear();
        }
        for (position, row) in self.rows.iter().enumerate() {
            for (column, index) in &mut self.indexes {
                if let Some(pos) = position_of(&self.columns, column) {
                    index.add(&row[pos], position)?;
                }
            }
        }
        Ok(())
    }

    /// Runs the read pipeline: filter, project, stable sort, truncate.
    ///
    /// `projection: None` is the wildcard: full rows in declared column
    /// order. Requested columns missing from the schema are silently
    /// omitted. Ordering by a column absent from the projected set is a
    /// no-op. Returned columns and rows are fresh copies, never views into
    /// stored rows.
    pub fn select(
        &self,
        projection: Option<&[String]>,
        filter: Option<&RowFilter>,
        order_by: Option<(&str, bool)>,
        limit: Option<usize>,
    ) -> (Vec<String>, Vec<Row>) {
        let names = self.column_names();
        let kept: Vec<&Row> = self
            .rows
            .iter()
            .filter(|row| filter.map_or(true, |f| f(&names, row)))
            .collect();

        let (columns, mut rows): (Vec<String>, Vec<Row>) = match projection {
            None => (names, kept.iter().map(|row| (*row).clone()).collect()),
            Some(projection) => {
                let picked: Vec<(String, usize)> = projection
                    .iter()
                    .filter_map(|name| self.column_position(name).map(|pos| (name.clone(), pos)))
                    .collect();
                let rows = kept
                    .iter()
                    .map(|row| picked.iter().map(|(_, pos)| row[*pos].clone()).collect())
                    .collect();
                (picked.into_iter().map(|(name, _)| name).collect(), rows)
            }
        };

        if let Some((column, descending)) = order_by {
            if let Some(pos) = columns.iter().position(|name| name == column) {
                rows.sort_by(|a, b| {
                    let ordering = a[pos].partial_cmp(&b[pos]).unwrap_or(Ordering::Equal);
                    if descending { ordering.reverse() } else { ordering }
                });
            }
        }

        if let Some(limit) = limit {
            rows.truncate(limit);
        }

        (columns, rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users_table() -> Table {
        Table::new(
            "users".into(),
            vec![
                Column::new("id", DataType::Integer, false),
                Column::new("email", DataType::String, false),
                Column::new("name", DataType::String, true),
                Column::new("age", DataType::Integer, true),
            ],
        )
    }

    fn keyed_users_table() -> Result<Table> {
        let mut table = users_table();
        table.define_primary_key("id", true)?;
        table.add_unique("email")?;
        Ok(table)
    }

    fn values(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    fn user(email: &str, name: &str, age: i64) -> HashMap<String, Value> {
        values(&[
            ("email", Value::String(email.into())),
            ("name", Value::String(name.into())),
            ("age", Value::Integer(age)),
        ])
    }

    fn age_over(limit: i64) -> RowFilter {
        Box::new(move |columns, row| {
            columns
                .iter()
                .position(|name| name == "age")
                .and_then(|pos| row[pos].compare(&Value::Integer(limit)))
                .is_some_and(Ordering::is_gt)
        })
    }

    /// Every index must hold exactly the {value -> positions} mapping
    /// derivable by scanning the rows.
    fn assert_indexes_match_rows(table: &Table) {
        for (column, index) in &table.indexes {
            let pos = table.column_position(column).unwrap();
            let mut seen = HashSet::new();
            let mut distinct = Vec::new();
            for (position, row) in table.rows.iter().enumerate() {
                assert!(
                    index.lookup(&row[pos]).unwrap().contains(&position),
                    "position {position} missing from index {column}"
                );
                if seen.insert(bincode::serialize(&row[pos]).unwrap()) {
                    distinct.push(row[pos].clone());
                }
            }
            if table.rows.is_empty() {
                assert!(index.is_empty(), "stale keys in index {column}");
            }
            let total: usize = distinct
                .iter()
                .map(|value| index.lookup(value).unwrap().len())
                .sum();
            assert_eq!(total, table.rows.len(), "stale positions in index {column}");
        }
    }

    #[test]
    fn test_insert_positions_are_monotonic() -> Result<()> {
        let mut table = keyed_users_table()?;
        assert_eq!(table.insert(user("a@x.io", "A", 30))?, 0);
        assert_eq!(table.insert(user("b@x.io", "B", 40))?, 1);
        assert_eq!(table.insert(user("c@x.io", "C", 50))?, 2);
        assert_indexes_match_rows(&table);
        Ok(())
    }

    #[test]
    fn test_missing_values_become_null() -> Result<()> {
        let mut table = users_table();
        table.insert(values(&[
            ("id", Value::Integer(1)),
            ("email", Value::String("a@x.io".into())),
        ]))?;
        assert_eq!(table.rows()[0][2], Value::Null);
        assert_eq!(table.rows()[0][3], Value::Null);
        Ok(())
    }

    #[test]
    fn test_not_null_violation() -> Result<()> {
        let mut table = users_table();
        let err = table
            .insert(values(&[("id", Value::Integer(1))]))
            .unwrap_err();
        assert_eq!(
            err,
            Error::Constraint("NOT NULL column email missing value".into())
        );
        assert!(table.rows().is_empty());
        Ok(())
    }

    #[test]
    fn test_boolean_rejected_for_integer_column() -> Result<()> {
        let mut table = users_table();
        let err = table
            .insert(values(&[
                ("id", Value::Integer(1)),
                ("email", Value::String("a@x.io".into())),
                ("age", Value::Boolean(true)),
            ]))
            .unwrap_err();
        assert_eq!(
            err,
            Error::Constraint("type mismatch for age: expected integer".into())
        );
        Ok(())
    }

    #[test]
    fn test_unique_violation_on_insert() -> Result<()> {
        let mut table = keyed_users_table()?;
        table.insert(user("a@x.io", "A", 30))?;
        let err = table.insert(user("a@x.io", "B", 40)).unwrap_err();
        assert_eq!(
            err,
            Error::Constraint("unique/PK violation on email = a@x.io".into())
        );
        // failed insert left nothing behind
        assert_eq!(table.rows().len(), 1);
        assert_indexes_match_rows(&table);
        Ok(())
    }

    #[test]
    fn test_autoincrement_assignment_and_max_advance() -> Result<()> {
        let mut table = keyed_users_table()?;
        table.insert(user("a@x.io", "A", 30))?;
        table.insert(user("b@x.io", "B", 40))?;
        assert_eq!(table.rows()[0][0], Value::Integer(1));
        assert_eq!(table.rows()[1][0], Value::Integer(2));

        // explicit key advances the counter
        let mut explicit = user("c@x.io", "C", 50);
        explicit.insert("id".into(), Value::Integer(10));
        table.insert(explicit)?;
        table.insert(user("d@x.io", "D", 60))?;
        assert_eq!(table.rows()[3][0], Value::Integer(11));

        // a smaller explicit key never rewinds the counter
        let mut small = user("e@x.io", "E", 70);
        small.insert("id".into(), Value::Integer(3));
        table.insert(small)?;
        table.insert(user("f@x.io", "F", 80))?;
        assert_eq!(table.rows()[5][0], Value::Integer(12));
        assert_indexes_match_rows(&table);
        Ok(())
    }

    #[test]
    fn test_update_unique_rules() -> Result<()> {
        let mut table = keyed_users_table()?;
        table.insert(user("a@x.io", "A", 30))?;
        table.insert(user("b@x.io", "B", 40))?;

        // taking another row's unique value fails
        let taken = BTreeMap::from([("email".to_string(), Value::String("a@x.io".into()))]);
        let err = table.update(&taken, Some(&age_over(35))).unwrap_err();
        assert!(matches!(err, Error::Constraint(_)));

        // keeping your own unique value succeeds
        let own = BTreeMap::from([
            ("email".to_string(), Value::String("b@x.io".into())),
            ("name".to_string(), Value::String("Bee".into())),
        ]);
        assert_eq!(table.update(&own, Some(&age_over(35)))?, 1);
        assert_eq!(table.rows()[1][2], Value::String("Bee".into()));
        assert_indexes_match_rows(&table);
        Ok(())
    }

    #[test]
    fn test_update_all_rows_without_filter() -> Result<()> {
        let mut table = keyed_users_table()?;
        table.insert(user("a@x.io", "A", 30))?;
        table.insert(user("b@x.io", "B", 40))?;

        let assignments = BTreeMap::from([("age".to_string(), Value::Integer(18))]);
        assert_eq!(table.update(&assignments, None)?, 2);
        assert_eq!(table.rows()[0][3], Value::Integer(18));
        assert_eq!(table.rows()[1][3], Value::Integer(18));
        Ok(())
    }

    #[test]
    fn test_update_unknown_column_fails() -> Result<()> {
        let mut table = keyed_users_table()?;
        table.insert(user("a@x.io", "A", 30))?;
        let assignments = BTreeMap::from([("ghost".to_string(), Value::Integer(1))]);
        assert_eq!(
            table.update(&assignments, None),
            Err(Error::Config("column ghost does not exist".into()))
        );
        Ok(())
    }

    #[test]
    fn test_delete_all_resets_autoincrement() -> Result<()> {
        let mut table = keyed_users_table()?;
        table.insert(user("a@x.io", "A", 30))?;
        table.insert(user("b@x.io", "B", 40))?;

        assert_eq!(table.delete(None)?, 2);
        assert!(table.rows().is_empty());
        for index in table.indexes.values() {
            assert!(index.is_empty());
        }

        // counter restarts at 1
        table.insert(user("c@x.io", "C", 50))?;
        assert_eq!(table.rows()[0][0], Value::Integer(1));
        Ok(())
    }

    #[test]
    fn test_partial_delete_renumbers_and_reindexes() -> Result<()> {
        let mut table = keyed_users_table()?;
        table.insert(user("a@x.io", "A", 30))?;
        table.insert(user("b@x.io", "B", 40))?;
        table.insert(user("c@x.io", "C", 50))?;

        assert_eq!(table.delete(Some(&age_over(35)))?, 2);
        assert_eq!(table.rows().len(), 1);
        assert_eq!(table.rows()[0][2], Value::String("A".into()));
        // the survivor sits at position 0 in every index
        assert_eq!(
            table.indexes["email"].lookup(&Value::String("a@x.io".into()))?,
            HashSet::from([0])
        );
        assert_indexes_match_rows(&table);

        // counter untouched: next auto key continues from 3
        table.insert(user("d@x.io", "D", 60))?;
        assert_eq!(table.rows()[1][0], Value::Integer(4));
        Ok(())
    }

    #[test]
    fn test_indexes_survive_mixed_mutations() -> Result<()> {
        let mut table = keyed_users_table()?;
        for (email, name, age) in [
            ("a@x.io", "A", 10),
            ("b@x.io", "B", 20),
            ("c@x.io", "C", 30),
            ("d@x.io", "D", 40),
        ] {
            table.insert(user(email, name, age))?;
        }
        let bump = BTreeMap::from([("age".to_string(), Value::Integer(99))]);
        table.update(&bump, Some(&age_over(25)))?;
        table.delete(Some(&age_over(50)))?;
        table.insert(user("e@x.io", "E", 15))?;
        assert_indexes_match_rows(&table);
        Ok(())
    }

    #[test]
    fn test_select_returns_copies() -> Result<()> {
        let mut table = keyed_users_table()?;
        table.insert(user("a@x.io", "A", 30))?;

        let (_, mut rows) = table.select(None, None, None, None);
        rows[0][2] = Value::String("tampered".into());
        assert_eq!(table.rows()[0][2], Value::String("A".into()));
        Ok(())
    }

    #[test]
    fn test_select_pipeline_filter_project_order_limit() -> Result<()> {
        let mut table = keyed_users_table()?;
        for (email, age) in [
            ("a@x.io", 10),
            ("b@x.io", 20),
            ("c@x.io", 30),
            ("d@x.io", 40),
            ("e@x.io", 50),
        ] {
            table.insert(user(email, "x", age))?;
        }

        let projection = vec!["age".to_string()];
        let (columns, rows) = table.select(
            Some(&projection),
            Some(&age_over(25)),
            Some(("age", true)),
            Some(2),
        );
        assert_eq!(columns, vec!["age"]);
        assert_eq!(
            rows,
            vec![vec![Value::Integer(50)], vec![Value::Integer(40)]]
        );
        Ok(())
    }

    #[test]
    fn test_select_omits_unknown_projection_columns() -> Result<()> {
        let mut table = keyed_users_table()?;
        table.insert(user("a@x.io", "A", 30))?;

        let projection = vec!["name".to_string(), "ghost".to_string()];
        let (columns, rows) = table.select(Some(&projection), None, None, None);
        assert_eq!(columns, vec!["name"]);
        assert_eq!(rows, vec![vec![Value::String("A".into())]]);
        Ok(())
    }

    #[test]
    fn test_define_primary_key_errors() -> Result<()> {
        let mut table = users_table();
        assert_eq!(
            table.define_primary_key("ghost", false),
            Err(Error::Config("column ghost does not exist".into()))
        );
        table.define_primary_key("id", true)?;
        assert_eq!(
            table.define_primary_key("email", false),
            Err(Error::Config("primary key already defined".into()))
        );
        Ok(())
    }

    #[test]
    fn test_autoincrement_ignored_for_non_integer_key() -> Result<()> {
        let mut table = users_table();
        table.define_primary_key("email", true)?;
        table.insert(values(&[
            ("id", Value::Integer(1)),
            ("email", Value::String("a@x.io".into())),
        ]))?;
        // no auto-assignment happened; a second keyless insert hits NOT NULL
        let err = table
            .insert(values(&[("id", Value::Integer(2))]))
            .unwrap_err();
        assert!(matches!(err, Error::Constraint(_)));
        Ok(())
    }

    #[test]
    fn test_nullable_column_accepts_null_as_index_key() -> Result<()> {
        let mut table = users_table();
        table.add_unique("age")?;
        table.insert(values(&[
            ("id", Value::Integer(1)),
            ("email", Value::String("a@x.io".into())),
        ]))?;
        // age is NULL and indexed; a second NULL collides
        let err = table
            .insert(values(&[
                ("id", Value::Integer(2)),
                ("email", Value::String("b@x.io".into())),
            ]))
            .unwrap_err();
        assert_eq!(
            err,
            Error::Constraint("unique/PK violation on age = NULL".into())
        );
        Ok(())
    }
}
