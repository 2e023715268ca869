use super::Schema;
use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};

/// Catalog metadata for a `SelectableScheme` (spec §1): the core only sees the
/// index through this description plus the `storage::SelectableScheme` trait.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDef {
    pub name: String,
    pub table_name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

impl IndexDef {
    pub fn new(name: impl Into<String>, table_name: impl Into<String>, columns: Vec<String>, unique: bool) -> Self {
        IndexDef { name: name.into(), table_name: table_name.into(), columns, unique }
    }

    pub fn validate(&self, schema: &Schema) -> EngineResult<()> {
        if self.name.is_empty() || self.columns.is_empty() {
            return Err(EngineError::database_error("index requires a name and at least one column"));
        }
        let table = schema.get_table(&self.table_name).ok_or_else(|| EngineError::table_not_found(self.table_name.clone()))?;
        for c in &self.columns {
            if !table.has_column(c) {
                return Err(EngineError::column_not_found(c.clone()));
            }
        }
        Ok(())
    }
}
