use super::{count_table, TableSet};
use crate::catalog::Schema;
use crate::error::{EngineError, EngineResult};
use crate::exec::eval_expr::eval_scalar;
use crate::exec::{evaluate, QueryContext};
use crate::expr::lower::lower_ast_expr;
use crate::parser::ast::{Assignment, DeleteStatement, InsertSource, InsertStatement, UpdateStatement};
use crate::plan::planner::{build_from_set, plan_select};
use crate::session::SessionState;
use crate::storage::Table;
use crate::types::{Row, RowId, Value};

/// Inserts via one of the three source modes spec §4.C names: VALUES, FROM
/// SELECT, SET. Missing columns are filled from the column's default.
pub fn execute_insert(stmt: &InsertStatement, schema: &Schema, tables: &mut TableSet, _session: &mut SessionState) -> EngineResult<crate::exec::EvalTable> {
    let def = schema.get_table(&stmt.table).ok_or_else(|| EngineError::table_not_found(stmt.table.clone()))?.clone();
    let target_columns: Vec<String> = stmt.columns.clone().unwrap_or_else(|| def.columns.iter().map(|c| c.name.clone()).collect());
    for c in &target_columns {
        if !def.has_column(c) {
            return Err(EngineError::column_not_found(c.clone()));
        }
    }

    let mut rows_to_insert: Vec<Row> = Vec::new();

    match &stmt.source {
        InsertSource::Values(value_lists) => {
            for values in value_lists {
                if values.len() != target_columns.len() {
                    return Err(EngineError::statement_error("value count does not match column count"));
                }
                let mut full = vec![Value::Null; def.columns.len()];
                for (i, col_name) in target_columns.iter().enumerate() {
                    let idx = def.column_index(col_name).unwrap();
                    let lowered = lower_ast_expr(&values[i])?;
                    full[idx] = eval_scalar(&lowered, &Row::default(), &[], &mut QueryContext::new())?;
                }
                apply_defaults(&def, &mut full);
                rows_to_insert.push(Row::new(full));
            }
        }
        InsertSource::Select(select) => {
            let from_set = build_from_set(select, schema, None)?;
            let plan = plan_select(select, schema, &from_set)?;
            let mut ctx = QueryContext::new();
            for (name, table) in tables.iter() {
                ctx.register_table(name.clone(), table as &dyn Table);
            }
            let result = evaluate(&plan.root, &mut ctx)?;
            for row in result.rows {
                let mut full = vec![Value::Null; def.columns.len()];
                for (i, col_name) in target_columns.iter().enumerate() {
                    let idx = def.column_index(col_name).unwrap();
                    full[idx] = row.get(i).cloned().unwrap_or(Value::Null);
                }
                apply_defaults(&def, &mut full);
                rows_to_insert.push(Row::new(full));
            }
        }
        InsertSource::Set(assignments) => {
            let mut full = vec![Value::Null; def.columns.len()];
            for a in assignments {
                let idx = def.column_index(&a.column).ok_or_else(|| EngineError::column_not_found(a.column.clone()))?;
                let lowered = lower_ast_expr(&a.value)?;
                full[idx] = eval_scalar(&lowered, &Row::default(), &[], &mut QueryContext::new())?;
            }
            apply_defaults(&def, &mut full);
            rows_to_insert.push(Row::new(full));
        }
    }

    let table = tables.get_mut(&stmt.table).ok_or_else(|| EngineError::table_not_found(stmt.table.clone()))?;
    let mut inserted = 0;
    for row in rows_to_insert {
        table.insert(row)?;
        inserted += 1;
    }
    Ok(count_table(inserted))
}

fn apply_defaults(def: &crate::catalog::TableDef, values: &mut [Value]) {
    for (i, col) in def.columns.iter().enumerate() {
        if values[i].is_null() {
            if let Some(default) = &col.default_value {
                values[i] = default.clone();
            }
        }
    }
}

/// Plans `SELECT * FROM t WHERE where_clause` to find affected rows, then
/// applies assignments (spec §4.C "Update / Delete" prepare/evaluate split).
pub fn execute_update(stmt: &UpdateStatement, schema: &Schema, tables: &mut TableSet, _session: &mut SessionState) -> EngineResult<crate::exec::EvalTable> {
    let def = schema.get_table(&stmt.table).ok_or_else(|| EngineError::table_not_found(stmt.table.clone()))?.clone();
    let matching_ids = matching_row_ids(&stmt.table, &stmt.where_clause, schema, tables)?;
    let limited: Vec<RowId> = match stmt.limit {
        Some(n) => matching_ids.into_iter().take(n as usize).collect(),
        None => matching_ids,
    };

    let table = tables.get_mut(&stmt.table).ok_or_else(|| EngineError::table_not_found(stmt.table.clone()))?;
    let mut updated = 0;
    for id in limited {
        if let Some(mut row) = table.get(id) {
            for assignment in &stmt.assignments {
                apply_assignment(&def, assignment, &mut row)?;
            }
            table.update(id, row)?;
            updated += 1;
        }
    }
    Ok(count_table(updated))
}

fn apply_assignment(def: &crate::catalog::TableDef, assignment: &Assignment, row: &mut Row) -> EngineResult<()> {
    let idx = def.column_index(&assignment.column).ok_or_else(|| EngineError::column_not_found(assignment.column.clone()))?;
    let lowered = lower_ast_expr(&assignment.value)?;
    let columns: Vec<String> = def.columns.iter().map(|c| c.name.clone()).collect();
    let value = eval_scalar(&lowered, row, &columns, &mut QueryContext::new())?;
    row.values[idx] = value;
    Ok(())
}

pub fn execute_delete(stmt: &DeleteStatement, schema: &Schema, tables: &mut TableSet, _session: &mut SessionState) -> EngineResult<crate::exec::EvalTable> {
    let matching_ids = matching_row_ids(&stmt.table, &stmt.where_clause, schema, tables)?;
    let limited: Vec<RowId> = match stmt.limit {
        Some(n) => matching_ids.into_iter().take(n as usize).collect(),
        None => matching_ids,
    };

    let table = tables.get_mut(&stmt.table).ok_or_else(|| EngineError::table_not_found(stmt.table.clone()))?;
    let mut deleted = 0;
    for id in limited {
        if table.delete(id).is_ok() {
            deleted += 1;
        }
    }
    Ok(count_table(deleted))
}

fn matching_row_ids(table_name: &str, where_clause: &Option<crate::parser::ast::Expression>, schema: &Schema, tables: &TableSet) -> EngineResult<Vec<RowId>> {
    let def = schema.get_table(table_name).ok_or_else(|| EngineError::table_not_found(table_name.to_string()))?;
    let table = tables.get(table_name).ok_or_else(|| EngineError::table_not_found(table_name.to_string()))?;
    let columns: Vec<String> = def.columns.iter().map(|c| c.name.clone()).collect();

    let predicate = match where_clause {
        Some(e) => {
            let mut lowered = lower_ast_expr(e)?;
            for el in lowered.elements.iter_mut() {
                if let crate::expr::ExprElement::Variable(v) = el {
                    if v.table.is_none() {
                        v.table = Some(table_name.to_string());
                    }
                }
            }
            lowered.normalize()
        }
        None => crate::expr::Expression::literal(Value::Boolean(true)),
    };

    let prefixed_columns: Vec<String> = columns.iter().map(|c| format!("{}.{}", table_name, c)).collect();
    let mut ctx = QueryContext::new();
    let mut ids = Vec::new();
    for (id, row) in table.scan() {
        if eval_scalar(&predicate, &row, &prefixed_columns, &mut ctx)?.as_boolean().unwrap_or(false) {
            ids.push(id);
        }
    }
    Ok(ids)
}
