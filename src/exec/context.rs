use super::EvalTable;
use crate::error::{EngineError, EngineResult};
use crate::storage::Table;
use crate::types::Row;
use std::collections::HashMap;

/// Runtime environment a plan tree evaluates against: the tables it can
/// fetch from, a cache for `CachePointNode` subtrees, and the stack of outer
/// rows a correlated sub-query resolves its `CorrelatedVariable`s against.
pub struct QueryContext<'a> {
    tables: HashMap<String, &'a dyn Table>,
    cache: HashMap<u64, EvalTable>,
    outer_scope: Vec<(Vec<String>, Row)>,
}

impl<'a> QueryContext<'a> {
    pub fn new() -> Self {
        QueryContext { tables: HashMap::new(), cache: HashMap::new(), outer_scope: Vec::new() }
    }

    pub fn register_table(&mut self, name: impl Into<String>, table: &'a dyn Table) {
        self.tables.insert(name.into(), table);
    }

    pub fn table(&self, name: &str) -> EngineResult<&'a dyn Table> {
        self.tables.get(name).copied().ok_or_else(|| EngineError::table_not_found(name))
    }

    pub fn cache_get(&self, id: u64) -> Option<EvalTable> {
        self.cache.get(&id).cloned()
    }

    pub fn cache_put(&mut self, id: u64, table: EvalTable) {
        self.cache.insert(id, table);
    }

    pub fn push_outer(&mut self, columns: Vec<String>, row: Row) {
        self.outer_scope.push((columns, row));
    }

    pub fn pop_outer(&mut self) {
        self.outer_scope.pop();
    }

    /// Looks up a correlated column at `level` frames up the outer-scope
    /// stack (1 = immediately enclosing query).
    pub fn outer_value(&self, level: u32, column: &str) -> Option<&crate::types::Value> {
        let idx = self.outer_scope.len().checked_sub(level as usize)?;
        let (columns, row) = self.outer_scope.get(idx)?;
        let col_idx = columns.iter().position(|c| c.eq_ignore_ascii_case(column) || c.rsplit('.').next() == Some(column))?;
        row.get(col_idx)
    }
}

impl<'a> Default for QueryContext<'a> {
    fn default() -> Self {
        Self::new()
    }
}
