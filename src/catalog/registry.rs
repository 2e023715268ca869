use crate::catalog::Schema;
use crate::error::{EngineError, EngineResult};
use std::collections::HashMap;

/// Aggregate counters surfaced by the `Schema` statement and admin tooling.
#[derive(Debug, Clone, Default)]
pub struct CatalogStatistics {
    pub schema_count: usize,
    pub table_count: usize,
    pub index_count: usize,
    pub constraint_count: usize,
    pub version: u64,
}

/// Owns every named schema a connection can reference. A session's default
/// schema is selected by name (`"public"` unless configured otherwise); the
/// from-set resolver and statement executors only ever see one `Schema` at a
/// time through this registry.
#[derive(Debug, Clone)]
pub struct CatalogRegistry {
    schemas: HashMap<String, Schema>,
    version: u64,
}

impl CatalogRegistry {
    pub fn new() -> Self {
        let mut schemas = HashMap::new();
        schemas.insert("public".to_string(), Schema::new("public"));
        CatalogRegistry { schemas, version: 1 }
    }

    pub fn add_schema(&mut self, name: impl Into<String>) -> EngineResult<()> {
        let name = name.into();
        if self.schemas.contains_key(&name) {
            return Err(EngineError::database_error(format!("schema '{}' already exists", name)));
        }
        self.schemas.insert(name.clone(), Schema::new(name));
        self.version += 1;
        Ok(())
    }

    pub fn remove_schema(&mut self, name: &str) -> EngineResult<Schema> {
        if name == "public" {
            return Err(EngineError::database_error("cannot drop the default schema"));
        }
        let schema = self.schemas.remove(name).ok_or_else(|| EngineError::database_error(format!("schema '{}' not found", name)))?;
        self.version += 1;
        Ok(schema)
    }

    pub fn get_schema(&self, name: &str) -> Option<&Schema> {
        self.schemas.get(name)
    }

    pub fn get_schema_mut(&mut self, name: &str) -> Option<&mut Schema> {
        self.schemas.get_mut(name)
    }

    pub fn schema_names(&self) -> Vec<String> {
        self.schemas.keys().cloned().collect()
    }

    pub fn validate_all(&self) -> EngineResult<()> {
        for schema in self.schemas.values() {
            schema.validate()?;
        }
        Ok(())
    }

    pub fn statistics(&self) -> CatalogStatistics {
        let mut stats = CatalogStatistics { schema_count: self.schemas.len(), version: self.version, ..Default::default() };
        for schema in self.schemas.values() {
            stats.table_count += schema.tables.len();
            stats.index_count += schema.indexes.len();
            stats.constraint_count += schema.constraints.len();
        }
        stats
    }
}

impl Default for CatalogRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schema_cannot_be_dropped() {
        let mut reg = CatalogRegistry::new();
        assert!(reg.remove_schema("public").is_err());
    }

    #[test]
    fn statistics_aggregate_across_schemas() {
        let mut reg = CatalogRegistry::new();
        reg.add_schema("analytics").unwrap();
        let stats = reg.statistics();
        assert_eq!(stats.schema_count, 2);
    }
}
