use std::collections::BTreeMap;

/// Statement tree handed over by the SQL parser collaborator. The engine
/// never parses SQL text itself; it executes these nodes against the catalog.
#[derive(Debug, PartialEq)]
pub enum Statement {
    /// SELECT over one table, or two comma-joined tables
    Select {
        columns: SelectColumns,
        tables: Vec<String>,
        where_clause: Option<Expression>,
        order_by: Option<(String, OrderDirection)>,
        limit: Option<usize>,
    },
    /// INSERT statement
    Insert {
        table_name: String,
        /// Explicit column list; None means the table's declared order
        columns: Option<Vec<String>>,
        values: Vec<Vec<Expression>>,
    },
    /// UPDATE statement
    Update {
        table_name: String,
        assignments: BTreeMap<String, Expression>,
        where_clause: Option<Expression>,
    },
    /// DELETE statement
    Delete {
        table_name: String,
        where_clause: Option<Expression>,
    },
    /// Any other statement kind the parser recognizes (DDL, EXPLAIN, ...);
    /// carries the kind name for diagnostics
    Other(String),
}

/// Projection list of a SELECT
#[derive(Debug, PartialEq)]
pub enum SelectColumns {
    Star,
    Columns(Vec<String>),
}

/// Sort direction (ascending or descending)
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

/// Expression nodes: column references, constants, boolean operations
#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    /// Column reference with an optional table qualifier
    Field(Option<String>, String),
    /// Constant value
    Consts(Consts),
    /// Boolean operation
    Operation(Operation),
}

/// Implements From trait to convert Consts into Expression
impl From<Consts> for Expression {
    fn from(value: Consts) -> Self {
        Self::Consts(value)
    }
}

/// Constant values in SQL expressions
#[derive(Debug, PartialEq, Clone)]
pub enum Consts {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

/// Boolean operations over expressions
#[derive(Debug, PartialEq, Clone)]
pub enum Operation {
    Equal(Box<Expression>, Box<Expression>),
    GreaterThan(Box<Expression>, Box<Expression>),
    LessThan(Box<Expression>, Box<Expression>),
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
}
