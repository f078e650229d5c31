use serde::{Deserialize, Serialize};

use crate::sql::types::DataType;

/// Column schema definition, immutable once its table is created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub datatype: DataType,
    pub nullable: bool,
}

impl Column {
    pub fn new(name: &str, datatype: DataType, nullable: bool) -> Self {
        Self {
            name: name.to_string(),
            datatype,
            nullable,
        }
    }
}
