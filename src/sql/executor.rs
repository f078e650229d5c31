use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::sql::ast::{Expression, OrderDirection, SelectColumns, Statement};
use crate::sql::catalog::Catalog;
use crate::sql::predicate::{self, JoinDescriptor, RowFilter, WhereResolution};
use crate::sql::types::{Row, Value};

/// What a statement execution produced: a result table for reads, a
/// human-readable message for writes and non-statements.
#[derive(Debug, PartialEq)]
pub enum ResultSet {
    Query { columns: Vec<String>, rows: Vec<Row> },
    Message(String),
}

/// Executes one parsed statement against the catalog.
///
/// Takes the parser's output as a `Result` so a syntax failure becomes a
/// reported message rather than an execution error; every other error kind
/// propagates to the caller.
pub fn execute(parsed: Result<Statement>, catalog: &mut Catalog) -> Result<ResultSet> {
    let statement = match parsed {
        Ok(statement) => statement,
        Err(Error::Parse(detail)) => {
            return Ok(ResultSet::Message(format!("SQL syntax error: {detail}")));
        }
        Err(err) => return Err(err),
    };

    match statement {
        Statement::Select {
            columns,
            tables,
            where_clause,
            order_by,
            limit,
        } => execute_select(catalog, columns, tables, where_clause, order_by, limit),
        Statement::Insert {
            table_name,
            columns,
            values,
        } => execute_insert(catalog, table_name, columns, values),
        Statement::Update {
            table_name,
            assignments,
            where_clause,
        } => execute_update(catalog, table_name, assignments, where_clause),
        Statement::Delete {
            table_name,
            where_clause,
        } => execute_delete(catalog, table_name, where_clause),
        Statement::Other(kind) => {
            warn!(kind = %kind, "unsupported statement");
            Ok(ResultSet::Message("Unsupported statement type".into()))
        }
    }
}

fn execute_select(
    catalog: &Catalog,
    columns: SelectColumns,
    tables: Vec<String>,
    where_clause: Option<Expression>,
    order_by: Option<(String, OrderDirection)>,
    limit: Option<usize>,
) -> Result<ResultSet> {
    // Every named table must exist before shape checks or WHERE resolution.
    for name in &tables {
        catalog.get_table(name)?;
    }

    let aliases: HashSet<String> = tables.iter().cloned().collect();
    let mut join: Option<JoinDescriptor> = None;
    let mut filters: Vec<RowFilter> = Vec::new();
    if let Some(expr) = &where_clause {
        match predicate::resolve(expr, &aliases)? {
            WhereResolution::Filter(filter) => filters.push(filter),
            WhereResolution::Join(descriptor) => join = Some(descriptor),
            WhereResolution::JoinWithFilters(descriptor, residual) => {
                join = Some(descriptor);
                filters = residual;
            }
        }
    }

    match (tables.as_slice(), join) {
        ([name], None) => {
            let table = catalog.get_table(name)?;
            let projection = match &columns {
                SelectColumns::Star => None,
                SelectColumns::Columns(names) => Some(names.as_slice()),
            };
            let order = order_by
                .as_ref()
                .map(|(column, direction)| (column.as_str(), *direction == OrderDirection::Desc));
            let (columns, rows) = table.select(projection, filters.first(), order, limit);
            Ok(ResultSet::Query { columns, rows })
        }
        ([_, _], Some(descriptor)) => execute_join(catalog, &descriptor, &filters),
        _ => Ok(ResultSet::Message(
            "Only single table or simple comma-join supported".into(),
        )),
    }
}

/// Nested-loop equi-join of two tables. Residual filters apply to left-table
/// rows before pairing. Output columns are table-qualified, left table first.
fn execute_join(
    catalog: &Catalog,
    join: &JoinDescriptor,
    filters: &[RowFilter],
) -> Result<ResultSet> {
    let left = catalog.get_table(&join.left_table)?;
    let right = catalog.get_table(&join.right_table)?;
    let left_names = left.column_names();

    let columns: Vec<String> = left_names
        .iter()
        .map(|name| format!("{}.{name}", join.left_table))
        .chain(
            right
                .column_names()
                .iter()
                .map(|name| format!("{}.{name}", join.right_table)),
        )
        .collect();

    let mut rows = Vec::new();
    let (Some(left_pos), Some(right_pos)) = (
        left.column_position(&join.left_column),
        right.column_position(&join.right_column),
    ) else {
        // unknown join column: well-formed empty result
        return Ok(ResultSet::Query { columns, rows });
    };

    for left_row in left.rows() {
        if !filters.iter().all(|filter| filter(&left_names, left_row)) {
            continue;
        }
        for right_row in right.rows() {
            if left_row[left_pos].compare(&right_row[right_pos]) == Some(Ordering::Equal) {
                let mut combined = left_row.clone();
                combined.extend(right_row.iter().cloned());
                rows.push(combined);
            }
        }
    }
    debug!(
        left = %join.left_table,
        right = %join.right_table,
        rows = rows.len(),
        "joined tables"
    );
    Ok(ResultSet::Query { columns, rows })
}

fn execute_insert(
    catalog: &mut Catalog,
    table_name: String,
    columns: Option<Vec<String>>,
    values: Vec<Vec<Expression>>,
) -> Result<ResultSet> {
    let table = catalog.get_table_mut(&table_name)?;
    let columns = columns.unwrap_or_else(|| table.column_names());

    let mut count = 0;
    for exprs in &values {
        let row: HashMap<String, Value> = columns
            .iter()
            .zip(exprs.iter())
            .map(|(column, expr)| {
                (
                    column.clone(),
                    Value::from_literal(expr).unwrap_or(Value::Null),
                )
            })
            .collect();
        table.insert(row)?;
        count += 1;
    }
    Ok(ResultSet::Message(format!("Inserted {count} row(s)")))
}

fn execute_update(
    catalog: &mut Catalog,
    table_name: String,
    assignments: BTreeMap<String, Expression>,
    where_clause: Option<Expression>,
) -> Result<ResultSet> {
    let table = catalog.get_table_mut(&table_name)?;
    let filter = single_table_filter(&table_name, where_clause.as_ref())?;

    let assignments: BTreeMap<String, Value> = assignments
        .into_iter()
        .map(|(column, expr)| (column, Value::from_literal(&expr).unwrap_or(Value::Null)))
        .collect();

    let count = table.update(&assignments, filter.as_ref())?;
    Ok(ResultSet::Message(format!("Updated {count} row(s)")))
}

fn execute_delete(
    catalog: &mut Catalog,
    table_name: String,
    where_clause: Option<Expression>,
) -> Result<ResultSet> {
    let table = catalog.get_table_mut(&table_name)?;
    let filter = single_table_filter(&table_name, where_clause.as_ref())?;
    let count = table.delete(filter.as_ref())?;
    Ok(ResultSet::Message(format!("Deleted {count} row(s)")))
}

/// Resolves the WHERE of a single-table statement. A join condition in an
/// UPDATE or DELETE has nothing to pair against and is rejected outright.
fn single_table_filter(
    table_name: &str,
    where_clause: Option<&Expression>,
) -> Result<Option<RowFilter>> {
    let Some(expr) = where_clause else {
        return Ok(None);
    };
    let aliases: HashSet<String> = [table_name.to_string()].into();
    match predicate::resolve(expr, &aliases)? {
        WhereResolution::Filter(filter) => Ok(Some(filter)),
        WhereResolution::Join(_) | WhereResolution::JoinWithFilters(..) => Err(
            Error::Unsupported("join condition outside SELECT".into()),
        ),
    }
}
