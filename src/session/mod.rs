pub mod locking;
pub mod result_set;

pub use locking::{LockMode, LockingMechanism};
pub use result_set::{LargeObjectRef, LargeObjectUploadMap, ResultSetTable};

use crate::error::{EngineError, EngineResult};
use crate::exec::EvalTable;
use uuid::Uuid;

/// Per-connection state: lock discipline, auto-commit flag, the live result
/// sets and in-flight large-object uploads for this session. Grounded on the
/// teacher's `TransactionManager` generalized to one transaction per
/// connection rather than a pool of independent transactions (spec §4.F:
/// "inside a connection, one statement at a time").
pub struct SessionState {
    pub session_id: Uuid,
    pub auto_commit: bool,
    pub locking: LockingMechanism,
    pub result_sets: ResultSetTable,
    pub large_objects: LargeObjectUploadMap,
    pub current_schema: String,
    in_transaction: bool,
}

impl SessionState {
    pub fn new(default_schema: impl Into<String>) -> Self {
        SessionState {
            session_id: Uuid::new_v4(),
            auto_commit: true,
            locking: LockingMechanism::new(),
            result_sets: ResultSetTable::new(),
            large_objects: LargeObjectUploadMap::new(),
            current_schema: default_schema.into(),
            in_transaction: false,
        }
    }

    pub fn begin(&mut self) -> EngineResult<()> {
        if self.in_transaction {
            return Err(EngineError::transaction(crate::error::TransactionKind::Conflict, "a transaction is already open"));
        }
        self.in_transaction = true;
        self.auto_commit = false;
        Ok(())
    }

    pub fn is_in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Implements the auto-commit discipline in spec §4.F: evaluate under
    /// EXCLUSIVE, then on success try to commit (rolling back on commit
    /// failure), or roll back directly if evaluation itself failed.
    pub fn run_auto_commit<F>(&mut self, evaluate: F) -> EngineResult<EvalTable>
    where
        F: FnOnce(&mut Self) -> EngineResult<EvalTable>,
    {
        self.locking.acquire(LockMode::Exclusive);
        let result = evaluate(self);
        self.locking.release();

        if !self.auto_commit {
            return result;
        }

        self.locking.acquire(LockMode::Exclusive);
        let outcome = match result {
            Ok(table) => match self.commit() {
                Ok(()) => Ok(table),
                Err(e) => {
                    self.rollback().ok();
                    Err(e)
                }
            },
            Err(e) => {
                self.rollback().ok();
                Err(e)
            }
        };
        self.locking.release();
        outcome
    }

    pub fn commit(&mut self) -> EngineResult<()> {
        self.in_transaction = false;
        self.auto_commit = true;
        Ok(())
    }

    pub fn rollback(&mut self) -> EngineResult<()> {
        self.in_transaction = false;
        self.auto_commit = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_commit_rolls_back_failed_evaluation() {
        let mut session = SessionState::new("public");
        let result = session.run_auto_commit(|_| Err(EngineError::statement_error("boom")));
        assert!(result.is_err());
        assert!(!session.is_in_transaction());
    }

    #[test]
    fn begin_then_begin_again_conflicts() {
        let mut session = SessionState::new("public");
        session.begin().unwrap();
        assert!(session.begin().is_err());
    }
}
