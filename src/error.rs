use std::fmt::Display;

use bincode::ErrorKind;

/// Custom Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the engine
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// SQL parsing error, reported by the parser collaborator
    Parse(String),
    /// Bad schema reference: unknown column, duplicate primary key or table
    Config(String),
    /// NOT NULL, type or UNIQUE/PK constraint violation
    Constraint(String),
    /// Referenced table does not exist
    NotFound(String),
    /// Expression or statement shape the engine cannot evaluate
    Unsupported(String),
    /// Internal error (index key encoding)
    Internal(String),
}

impl From<Box<ErrorKind>> for Error {
    fn from(value: Box<ErrorKind>) -> Self {
        Error::Internal(value.to_string())
    }
}

impl std::error::Error for Error {}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Parse(err) => write!(f, "parse error {}", err),
            Error::Config(err) => write!(f, "configuration error {}", err),
            Error::Constraint(err) => write!(f, "constraint violation {}", err),
            Error::NotFound(err) => write!(f, "not found {}", err),
            Error::Unsupported(err) => write!(f, "unsupported {}", err),
            Error::Internal(err) => write!(f, "internal error {}", err),
        }
    }
}
