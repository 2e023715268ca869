use super::Schema;
use crate::error::{ConstraintKind as Kind, EngineError, EngineResult};
use crate::expr::Expression;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constraint {
    pub name: String,
    pub constraint_type: ConstraintType,
    /// Checked at commit time rather than immediately (spec §3 invariant:
    /// "Constraint checks deferred by a statement are re-checked at commit").
    pub deferred: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConstraintType {
    PrimaryKey { table: String, columns: Vec<String> },
    ForeignKey { table: String, columns: Vec<String>, foreign_table: String, foreign_columns: Vec<String> },
    Unique { table: String, columns: Vec<String> },
    #[serde(skip)]
    Check { table: String, expression: Expression },
    NotNull { table: String, column: String },
}

impl Constraint {
    pub fn affected_tables(&self) -> Vec<String> {
        match &self.constraint_type {
            ConstraintType::PrimaryKey { table, .. } => vec![table.clone()],
            ConstraintType::ForeignKey { table, foreign_table, .. } => vec![table.clone(), foreign_table.clone()],
            ConstraintType::Unique { table, .. } => vec![table.clone()],
            ConstraintType::Check { table, .. } => vec![table.clone()],
            ConstraintType::NotNull { table, .. } => vec![table.clone()],
        }
    }

    pub fn validate(&self, schema: &Schema) -> EngineResult<()> {
        match &self.constraint_type {
            ConstraintType::PrimaryKey { table, columns } | ConstraintType::Unique { table, columns } => {
                let t = schema.get_table(table).ok_or_else(|| EngineError::table_not_found(table.clone()))?;
                for c in columns {
                    if !t.has_column(c) {
                        return Err(EngineError::column_not_found(c.clone()));
                    }
                }
                Ok(())
            }
            ConstraintType::ForeignKey { table, columns, foreign_table, foreign_columns } => {
                let t = schema.get_table(table).ok_or_else(|| EngineError::table_not_found(table.clone()))?;
                for c in columns {
                    if !t.has_column(c) {
                        return Err(EngineError::column_not_found(c.clone()));
                    }
                }
                let ft = schema.get_table(foreign_table).ok_or_else(|| EngineError::table_not_found(foreign_table.clone()))?;
                for c in foreign_columns {
                    if !ft.has_column(c) {
                        return Err(EngineError::column_not_found(c.clone()));
                    }
                }
                Ok(())
            }
            ConstraintType::Check { table, .. } => {
                schema.get_table(table).ok_or_else(|| EngineError::table_not_found(table.clone()))?;
                Ok(())
            }
            ConstraintType::NotNull { table, column } => {
                let t = schema.get_table(table).ok_or_else(|| EngineError::table_not_found(table.clone()))?;
                if !t.has_column(column) {
                    return Err(EngineError::column_not_found(column.clone()));
                }
                Ok(())
            }
        }
    }

    /// Whether `column` in `table_name` participates in this constraint, used
    /// by ALTER TABLE DROP COLUMN to refuse the drop (spec §4.C).
    pub fn blocks_column_drop(&self, table_name: &str, column: &str) -> Option<Kind> {
        match &self.constraint_type {
            ConstraintType::PrimaryKey { table, columns } if table == table_name && columns.iter().any(|c| c == column) => {
                Some(Kind::DropColumnViolation)
            }
            ConstraintType::Unique { table, columns } if table == table_name && columns.iter().any(|c| c == column) => {
                Some(Kind::DropColumnViolation)
            }
            ConstraintType::ForeignKey { table, columns, foreign_table, foreign_columns } => {
                if table == table_name && columns.iter().any(|c| c == column) {
                    Some(Kind::DropColumnViolation)
                } else if foreign_table == table_name && foreign_columns.iter().any(|c| c == column) {
                    Some(Kind::DropColumnViolation)
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}
