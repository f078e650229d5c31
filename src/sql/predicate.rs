use std::cmp::Ordering;
use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::sql::ast::{Expression, Operation};
use crate::sql::types::{Row, Value};

/// Compiled row predicate: given the column names of the row's table and the
/// row itself, decide whether it matches. Filters resolve column names at
/// call time so one filter can run against any table exposing the column.
pub type RowFilter = Box<dyn Fn(&[String], &Row) -> bool>;

/// An equality condition between columns of two distinct tables
#[derive(Debug, Clone, PartialEq)]
pub struct JoinDescriptor {
    pub left_table: String,
    pub left_column: String,
    pub right_table: String,
    pub right_column: String,
}

/// What a WHERE clause resolved to. At most one join condition is allowed;
/// any residual comparisons ride along as filters applied to the left table's
/// rows before pairing.
pub enum WhereResolution {
    Filter(RowFilter),
    Join(JoinDescriptor),
    JoinWithFilters(JoinDescriptor, Vec<RowFilter>),
}

/// Resolves a WHERE expression against the set of table names in scope.
///
/// Supported shapes: `column <op> literal` and `literal <op> column` with
/// `=`, `>` or `<`; `table.col = other.col` between two in-scope tables;
/// and AND-conjunctions of those. Everything else is rejected as
/// unsupported rather than silently matching nothing.
pub fn resolve(expr: &Expression, tables: &HashSet<String>) -> Result<WhereResolution> {
    let mut joins = Vec::new();
    let mut filters = Vec::new();
    collect(expr, tables, &mut joins, &mut filters)?;

    if joins.len() > 1 {
        return Err(Error::Unsupported(
            "more than one join condition in WHERE clause".into(),
        ));
    }
    match joins.pop() {
        Some(join) if filters.is_empty() => Ok(WhereResolution::Join(join)),
        Some(join) => Ok(WhereResolution::JoinWithFilters(join, filters)),
        None => {
            let filter: RowFilter = if filters.len() == 1 {
                filters.remove(0)
            } else {
                let filters = filters;
                Box::new(move |columns, row| filters.iter().all(|f| f(columns, row)))
            };
            Ok(WhereResolution::Filter(filter))
        }
    }
}

fn collect(
    expr: &Expression,
    tables: &HashSet<String>,
    joins: &mut Vec<JoinDescriptor>,
    filters: &mut Vec<RowFilter>,
) -> Result<()> {
    match expr {
        Expression::Operation(Operation::And(left, right)) => {
            collect(left, tables, joins, filters)?;
            collect(right, tables, joins, filters)?;
        }
        Expression::Operation(Operation::Equal(left, right)) => {
            if let Some(join) = join_condition(left, right, tables) {
                joins.push(join);
            } else {
                filters.push(comparison(left, right, Ordering::is_eq, Ordering::is_eq, expr)?);
            }
        }
        Expression::Operation(Operation::GreaterThan(left, right)) => {
            filters.push(comparison(left, right, Ordering::is_gt, Ordering::is_lt, expr)?);
        }
        Expression::Operation(Operation::LessThan(left, right)) => {
            filters.push(comparison(left, right, Ordering::is_lt, Ordering::is_gt, expr)?);
        }
        other => {
            return Err(Error::Unsupported(format!(
                "condition not supported: {other:?}"
            )));
        }
    }
    Ok(())
}

/// Builds a column-vs-literal filter. `test` applies when the column is on
/// the left, `flipped` when the literal is (3 < age reads as age > 3).
fn comparison(
    left: &Expression,
    right: &Expression,
    test: fn(Ordering) -> bool,
    flipped: fn(Ordering) -> bool,
    origin: &Expression,
) -> Result<RowFilter> {
    if let (Expression::Field(_, column), Some(literal)) = (left, Value::from_literal(right)) {
        return Ok(filter_for(column.clone(), literal, test));
    }
    if let (Expression::Field(_, column), Some(literal)) = (right, Value::from_literal(left)) {
        return Ok(filter_for(column.clone(), literal, flipped));
    }
    Err(Error::Unsupported(format!(
        "condition not supported: {origin:?}"
    )))
}

fn filter_for(column: String, literal: Value, test: fn(Ordering) -> bool) -> RowFilter {
    Box::new(move |columns, row| {
        columns
            .iter()
            .position(|name| *name == column)
            .and_then(|pos| row.get(pos))
            .and_then(|value| value.compare(&literal))
            .is_some_and(test)
    })
}

fn join_condition(
    left: &Expression,
    right: &Expression,
    tables: &HashSet<String>,
) -> Option<JoinDescriptor> {
    match (left, right) {
        (Expression::Field(Some(lt), lc), Expression::Field(Some(rt), rc))
            if lt != rt && tables.contains(lt) && tables.contains(rt) =>
        {
            Some(JoinDescriptor {
                left_table: lt.clone(),
                left_column: lc.clone(),
                right_table: rt.clone(),
                right_column: rc.clone(),
            })
        }
        _ => None,
    }
}
