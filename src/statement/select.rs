use super::TableSet;
use crate::catalog::Schema;
use crate::error::EngineResult;
use crate::exec::{evaluate, EvalTable, QueryContext};
use crate::parser::ast::SelectStatement;
use crate::plan::planner::{build_from_set, plan_select};
use crate::session::SessionState;

/// Prepares (builds the from-set and plan) and evaluates a SELECT, per spec
/// §4.C: "generate from-set; form plan via §4.D... invoke the plan."
pub fn execute(select: &SelectStatement, schema: &Schema, tables: &mut TableSet, session: &mut SessionState) -> EngineResult<EvalTable> {
    let from_set = build_from_set(select, schema, None)?;
    let plan = plan_select(select, schema, &from_set)?;

    let mut ctx = QueryContext::new();
    for (name, table) in tables.iter() {
        ctx.register_table(name.clone(), table as &dyn crate::storage::Table);
    }

    let result = evaluate(&plan.root, &mut ctx)?;
    session.result_sets.register(result.clone());
    Ok(result)
}
