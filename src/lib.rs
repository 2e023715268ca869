//! relcore: an in-process relational query engine, a catalog and storage
//! layer under it, and a binary wire protocol in front of it.
//!
//! The engine is organized as the pipeline a query actually travels through:
//! text is parsed into an AST (`parser`), lowered into a postfix expression
//! form (`expr`), resolved against a from-set (`fromset`) and catalog
//! (`catalog`), planned into a tree of plan nodes (`plan`), and evaluated
//! against live tables (`exec`, `storage`). `statement` drives one statement
//! through prepare/evaluate; `session` wraps that in auto-commit and locking
//! discipline; `protocol` exposes it over the wire.

#![allow(dead_code)]

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod exec;
pub mod expr;
pub mod fromset;
pub mod parser;
pub mod plan;
pub mod protocol;
pub mod session;
pub mod statement;
pub mod storage;
pub mod types;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{EngineError, EngineResult};
pub use session::SessionState;

/// Runs one SQL statement against a fresh in-process `Engine`, for callers
/// that want the engine embedded rather than spoken to over the wire.
pub fn execute_embedded(engine: &Engine, session: &mut SessionState, sql: &str) -> EngineResult<exec::EvalTable> {
    let stmt = parser::parse_sql(sql)?;
    let mut catalog = engine.catalog.write();
    let mut tables = engine.tables.write();
    statement::execute(&stmt, session, &mut catalog, &mut tables)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_round_trip_create_insert_select() {
        let engine = Engine::new(EngineConfig::default());
        let mut session = SessionState::new("public");

        execute_embedded(&engine, &mut session, "CREATE TABLE widgets (id INTEGER PRIMARY KEY, name TEXT NOT NULL)").unwrap();
        execute_embedded(&engine, &mut session, "INSERT INTO widgets (id, name) VALUES (1, 'sprocket')").unwrap();
        let result = execute_embedded(&engine, &mut session, "SELECT * FROM widgets WHERE id = 1").unwrap();

        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.columns, vec!["id".to_string(), "name".to_string()]);
    }
}
