use crate::error::{EngineError, EngineResult};
use crate::types::{DataType, Value};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    pub default_value: Option<Value>,
    pub primary_key: bool,
    pub unique: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Column { name: name.into(), data_type, nullable, default_value: None, primary_key: false, unique: false }
    }
}

/// A base table definition in the catalog (spec §1's `DataTableDef`, the
/// catalog-side description the core reads when preparing statements).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<Column>,
}

impl TableDef {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        TableDef { name: name.into(), columns }
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn primary_key_columns(&self) -> Vec<&str> {
        self.columns.iter().filter(|c| c.primary_key).map(|c| c.name.as_str()).collect()
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.name.is_empty() {
            return Err(EngineError::database_error("table name cannot be empty"));
        }
        if self.columns.is_empty() {
            return Err(EngineError::database_error("table must have at least one column"));
        }
        let mut seen = std::collections::HashSet::new();
        for c in &self.columns {
            if !seen.insert(c.name.to_ascii_lowercase()) {
                return Err(EngineError::database_error(format!("duplicate column '{}'", c.name)));
            }
        }
        Ok(())
    }
}
