pub mod constraint;
pub mod index;
pub mod registry;
pub mod table;

pub use constraint::{Constraint, ConstraintType};
pub use index::IndexDef;
pub use registry::CatalogRegistry;
pub use table::{Column, TableDef};

use crate::error::{EngineError, EngineResult};
use std::collections::HashMap;

/// One named schema: a set of tables, indexes and constraints, generalized
/// from the teacher's single-schema `Schema` to the multi-schema catalog
/// spec.md's DDL/privilege executors require.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub name: String,
    pub tables: HashMap<String, TableDef>,
    pub indexes: HashMap<String, IndexDef>,
    pub constraints: Vec<Constraint>,
    pub version: u64,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Schema { name: name.into(), tables: HashMap::new(), indexes: HashMap::new(), constraints: Vec::new(), version: 1 }
    }

    pub fn add_table(&mut self, table: TableDef) -> EngineResult<()> {
        if self.tables.contains_key(&table.name) {
            return Err(EngineError::database_error(format!("table '{}' already exists", table.name)));
        }
        table.validate()?;
        self.tables.insert(table.name.clone(), table);
        self.version += 1;
        Ok(())
    }

    pub fn replace_table(&mut self, table: TableDef) -> EngineResult<()> {
        table.validate()?;
        self.tables.insert(table.name.clone(), table);
        self.version += 1;
        Ok(())
    }

    pub fn remove_table(&mut self, name: &str) -> EngineResult<TableDef> {
        let t = self.tables.remove(name).ok_or_else(|| EngineError::table_not_found(name))?;
        self.indexes.retain(|_, idx| idx.table_name != name);
        self.constraints.retain(|c| !c.affected_tables().iter().any(|t| t == name));
        self.version += 1;
        Ok(t)
    }

    pub fn add_index(&mut self, index: IndexDef) -> EngineResult<()> {
        if self.indexes.contains_key(&index.name) {
            return Err(EngineError::database_error(format!("index '{}' already exists", index.name)));
        }
        index.validate(self)?;
        self.indexes.insert(index.name.clone(), index);
        self.version += 1;
        Ok(())
    }

    pub fn remove_index(&mut self, name: &str) -> EngineResult<IndexDef> {
        let idx = self.indexes.remove(name).ok_or_else(|| EngineError::database_error(format!("index '{}' not found", name)))?;
        self.version += 1;
        Ok(idx)
    }

    pub fn add_constraint(&mut self, constraint: Constraint) -> EngineResult<()> {
        constraint.validate(self)?;
        self.constraints.push(constraint);
        self.version += 1;
        Ok(())
    }

    pub fn remove_constraint(&mut self, name: &str) -> EngineResult<Constraint> {
        let pos = self.constraints.iter().position(|c| c.name == name)
            .ok_or_else(|| EngineError::database_error(format!("constraint '{}' not found", name)))?;
        self.version += 1;
        Ok(self.constraints.remove(pos))
    }

    pub fn get_table(&self, name: &str) -> Option<&TableDef> {
        self.tables.get(name)
    }

    pub fn get_table_mut(&mut self, name: &str) -> Option<&mut TableDef> {
        self.tables.get_mut(name)
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    pub fn index_names(&self) -> Vec<String> {
        self.indexes.keys().cloned().collect()
    }

    pub fn constraints_for_table(&self, table_name: &str) -> Vec<&Constraint> {
        self.constraints.iter().filter(|c| c.affected_tables().iter().any(|t| t == table_name)).collect()
    }

    pub fn indexes_for_table(&self, table_name: &str) -> Vec<&IndexDef> {
        self.indexes.values().filter(|i| i.table_name == table_name).collect()
    }

    pub fn validate(&self) -> EngineResult<()> {
        for t in self.tables.values() {
            t.validate()?;
        }
        for i in self.indexes.values() {
            i.validate(self)?;
        }
        for c in &self.constraints {
            c.validate(self)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataType;

    #[test]
    fn add_and_remove_table_prunes_indexes() {
        let mut schema = Schema::new("public");
        schema.add_table(TableDef::new("t", vec![Column::new("a", DataType::Integer, false)])).unwrap();
        schema.add_index(IndexDef::new("idx_a", "t", vec!["a".into()], false)).unwrap();
        assert!(schema.has_table("t"));
        schema.remove_table("t").unwrap();
        assert!(schema.indexes.is_empty());
    }
}
