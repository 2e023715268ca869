use super::Table;
use crate::catalog::TableDef;
use crate::error::{EngineError, EngineResult};
use crate::types::{Row, RowId};
use std::collections::BTreeMap;

/// An in-memory `Table` implementation, the reference storage engine used by
/// tests and the embedded engine. Rows are kept in a `BTreeMap` keyed by
/// `RowId` so `scan()` yields insertion order without re-deriving a B-tree.
#[derive(Debug, Clone)]
pub struct MemTable {
    def: TableDef,
    rows: BTreeMap<u64, Row>,
    next_id: u64,
}

impl MemTable {
    pub fn new(def: TableDef) -> Self {
        MemTable { def, rows: BTreeMap::new(), next_id: 1 }
    }

    pub fn definition(&self) -> &TableDef {
        &self.def
    }
}

impl Table for MemTable {
    fn name(&self) -> &str {
        &self.def.name
    }

    fn column_names(&self) -> Vec<String> {
        self.def.columns.iter().map(|c| c.name.clone()).collect()
    }

    fn scan(&self) -> Box<dyn Iterator<Item = (RowId, Row)> + '_> {
        Box::new(self.rows.iter().map(|(id, row)| (RowId(*id), row.clone())))
    }

    fn get(&self, id: RowId) -> Option<Row> {
        self.rows.get(&id.0).cloned()
    }

    fn insert(&mut self, row: Row) -> EngineResult<RowId> {
        if row.len() != self.def.columns.len() {
            return Err(EngineError::statement_error(format!(
                "expected {} values for table '{}', got {}",
                self.def.columns.len(),
                self.def.name,
                row.len()
            )));
        }
        let id = self.next_id;
        self.next_id += 1;
        self.rows.insert(id, row);
        Ok(RowId(id))
    }

    fn update(&mut self, id: RowId, row: Row) -> EngineResult<()> {
        if !self.rows.contains_key(&id.0) {
            return Err(EngineError::database_error(format!("row {} does not exist", id)));
        }
        self.rows.insert(id.0, row);
        Ok(())
    }

    fn delete(&mut self, id: RowId) -> EngineResult<()> {
        self.rows.remove(&id.0).ok_or_else(|| EngineError::database_error(format!("row {} does not exist", id)))?;
        Ok(())
    }

    fn len(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Column;
    use crate::types::{DataType, Value};

    fn table() -> MemTable {
        MemTable::new(TableDef::new("t", vec![Column::new("a", DataType::Integer, false)]))
    }

    #[test]
    fn insert_then_scan_preserves_order() {
        let mut t = table();
        t.insert(Row::new(vec![Value::Integer(1)])).unwrap();
        t.insert(Row::new(vec![Value::Integer(2)])).unwrap();
        let rows: Vec<_> = t.scan().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].1.get(0), Some(&Value::Integer(1)));
    }

    #[test]
    fn delete_removes_row() {
        let mut t = table();
        let id = t.insert(Row::new(vec![Value::Integer(1)])).unwrap();
        t.delete(id).unwrap();
        assert!(t.get(id).is_none());
        assert!(t.delete(id).is_err());
    }

    #[test]
    fn insert_rejects_wrong_arity() {
        let mut t = table();
        assert!(t.insert(Row::new(vec![Value::Integer(1), Value::Integer(2)])).is_err());
    }
}
