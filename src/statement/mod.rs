pub mod alter_table;
pub mod ddl;
pub mod dml;
pub mod select;

use crate::catalog::CatalogRegistry;
use crate::error::{EngineError, EngineResult};
use crate::exec::EvalTable;
use crate::parser::ast::{Statement, TransactionControl};
use crate::session::SessionState;
use crate::storage::MemTable;
use crate::types::{Row, Value};
use std::collections::HashMap;

/// The live table set an engine instance owns, keyed by table name. Kept
/// separate from `CatalogRegistry`, which only holds metadata: this mirrors
/// the spec's split between the catalog (`Schema`) and the conglomerate of
/// actual row storage.
pub type TableSet = HashMap<String, MemTable>;

/// Runs a statement's prepare phase then its evaluate phase under the
/// session's auto-commit discipline (spec §4.C, §4.F). `prepare` never
/// touches `tables`; `evaluate` is the only phase allowed to.
pub fn execute(stmt: &Statement, session: &mut SessionState, catalog: &mut CatalogRegistry, tables: &mut TableSet) -> EngineResult<EvalTable> {
    match stmt {
        Statement::CompleteTransaction(control) => execute_transaction_control(control.clone(), session),
        Statement::Set(set) => {
            let _ = set;
            Ok(EvalTable::new(vec!["result".into()], vec![Row::new(vec![Value::Text("SET".into())])]))
        }
        other => session.run_auto_commit(|session| {
            let schema = catalog.get_schema_mut(&session.current_schema).ok_or_else(|| EngineError::database_error("current schema missing"))?;
            match other {
                Statement::Select(select) => self::select::execute(select, schema, tables, session),
                Statement::Insert(insert) => self::dml::execute_insert(insert, schema, tables, session),
                Statement::Update(update) => self::dml::execute_update(update, schema, tables, session),
                Statement::Delete(delete) => self::dml::execute_delete(delete, schema, tables, session),
                Statement::CreateTable(create) => self::ddl::execute_create_table(create, schema, tables),
                Statement::DropTable(drop) => self::ddl::execute_drop_table(drop, schema, tables),
                Statement::AlterTable(alter) => self::alter_table::execute(alter, schema, tables),
                Statement::CreateIndex(create) => self::ddl::execute_create_index(create, schema),
                Statement::DropIndex(drop) => self::ddl::execute_drop_index(drop, schema),
                Statement::Set(_) | Statement::CompleteTransaction(_) => unreachable!("handled above"),
            }
        }),
    }
}

fn execute_transaction_control(control: TransactionControl, session: &mut SessionState) -> EngineResult<EvalTable> {
    match control {
        TransactionControl::Begin => session.begin()?,
        TransactionControl::Commit => session.commit()?,
        TransactionControl::Rollback => session.rollback()?,
    }
    Ok(EvalTable::new(vec!["result".into()], vec![Row::new(vec![Value::Text(format!("{:?}", control).to_uppercase())])]))
}

/// DML executors return a one-cell row count table (spec §3/§4.C).
pub fn count_table(n: usize) -> EvalTable {
    EvalTable::new(vec!["count".into()], vec![Row::new(vec![Value::Integer(n as i64)])])
}
