use super::{count_table, ddl, TableSet};
use crate::catalog::{Column, Constraint, ConstraintType, Schema};
use crate::error::{EngineError, EngineResult};
use crate::exec::EvalTable;
use crate::expr::lower::lower_ast_expr;
use crate::parser::ast::{AlterAction, AlterTableStatement, TableConstraint};
use crate::storage::{MemTable, Table};
use crate::types::Value;

/// Applies one of the two ALTER TABLE shapes spec §4.C names. The legacy
/// shape redefines the whole table, carrying existing rows across by
/// position; the actions shape applies each `AlterAction` to the live
/// `TableDef` and, where relevant, to already-stored rows.
pub fn execute(stmt: &AlterTableStatement, schema: &mut Schema, tables: &mut TableSet) -> EngineResult<EvalTable> {
    match stmt {
        AlterTableStatement::Legacy(create) => execute_legacy(create, schema, tables),
        AlterTableStatement::Actions { table_name, actions } => {
            for action in actions {
                apply_action(table_name, action, schema, tables)?;
            }
            Ok(count_table(0))
        }
    }
}

fn execute_legacy(create: &crate::parser::ast::CreateTableStatement, schema: &mut Schema, tables: &mut TableSet) -> EngineResult<EvalTable> {
    let old_rows: Vec<_> = tables.get(&create.table_name).map(|t| t.scan().map(|(_, row)| row).collect()).unwrap_or_default();

    schema.remove_table(&create.table_name).ok();
    tables.remove(&create.table_name);

    let mut as_create = create.clone();
    as_create.if_not_exists = false;
    ddl::execute_create_table(&as_create, schema, tables)?;

    if let Some(new_table) = tables.get_mut(&create.table_name) {
        for row in old_rows {
            let _ = new_table.insert(row);
        }
    }
    Ok(count_table(0))
}

fn apply_action(table_name: &str, action: &AlterAction, schema: &mut Schema, tables: &mut TableSet) -> EngineResult<()> {
    match action {
        AlterAction::AlterSetDefault { column, default } => {
            let lowered = lower_ast_expr(default)?;
            let value = constant_value(&lowered)?;
            let col = schema.get_table_mut(table_name).and_then(|t| t.columns.iter_mut().find(|c| c.name.eq_ignore_ascii_case(column)));
            match col {
                Some(c) => c.default_value = Some(value),
                None => return Err(EngineError::column_not_found(column.clone())),
            }
            Ok(())
        }
        AlterAction::DropDefault { column } => {
            let col = schema.get_table_mut(table_name).and_then(|t| t.columns.iter_mut().find(|c| c.name.eq_ignore_ascii_case(column)));
            match col {
                Some(c) => c.default_value = None,
                None => return Err(EngineError::column_not_found(column.clone())),
            }
            Ok(())
        }
        AlterAction::DropColumn { column } => drop_column(table_name, column, schema, tables),
        AlterAction::AddColumn(col_def) => add_column(table_name, col_def, schema, tables),
        AlterAction::DropConstraint { name } => schema.remove_constraint(name).map(|_| ()),
        AlterAction::DropConstraintPrimaryKey => drop_primary_key(table_name, schema),
        AlterAction::AddConstraint(table_constraint) => add_constraint(table_name, table_constraint, schema),
    }
}

fn drop_column(table_name: &str, column: &str, schema: &mut Schema, tables: &mut TableSet) -> EngineResult<()> {
    for constraint in schema.constraints_for_table(table_name) {
        if let Some(kind) = constraint.blocks_column_drop(table_name, column) {
            return Err(EngineError::constraint(kind, format!("column '{}' participates in a constraint and cannot be dropped", column)));
        }
    }

    let def = schema.get_table(table_name).ok_or_else(|| EngineError::table_not_found(table_name.to_string()))?;
    let idx = def.column_index(column).ok_or_else(|| EngineError::column_not_found(column.to_string()))?;
    let mut new_def = def.clone();
    new_def.columns.remove(idx);
    schema.replace_table(new_def.clone())?;

    if let Some(old_table) = tables.get(table_name) {
        let mut rebuilt = MemTable::new(new_def);
        for (_, mut row) in old_table.scan() {
            row.values.remove(idx);
            rebuilt.insert(row)?;
        }
        tables.insert(table_name.to_string(), rebuilt);
    }
    Ok(())
}

fn add_column(table_name: &str, col_def: &crate::parser::ast::ColumnDefinition, schema: &mut Schema, tables: &mut TableSet) -> EngineResult<()> {
    let default = col_def.constraints.iter().find_map(|c| match c {
        crate::parser::ast::ColumnConstraint::Default(v) => Some(v.clone()),
        _ => None,
    });
    let nullable = !col_def.constraints.contains(&crate::parser::ast::ColumnConstraint::NotNull);

    let def = schema.get_table(table_name).ok_or_else(|| EngineError::table_not_found(table_name.to_string()))?;
    let mut new_def = def.clone();
    let mut column = Column::new(col_def.name.clone(), col_def.data_type, nullable);
    column.default_value = default.clone();
    new_def.columns.push(column);
    schema.replace_table(new_def.clone())?;

    if let Some(old_table) = tables.get(table_name) {
        let mut rebuilt = MemTable::new(new_def);
        for (_, mut row) in old_table.scan() {
            row.values.push(default.clone().unwrap_or(Value::Null));
            rebuilt.insert(row)?;
        }
        tables.insert(table_name.to_string(), rebuilt);
    }
    Ok(())
}

fn drop_primary_key(table_name: &str, schema: &mut Schema) -> EngineResult<()> {
    let names: Vec<String> = schema
        .constraints_for_table(table_name)
        .into_iter()
        .filter(|c| matches!(c.constraint_type, ConstraintType::PrimaryKey { .. }))
        .map(|c| c.name.clone())
        .collect();
    if names.is_empty() {
        return Err(EngineError::database_error(format!("table '{}' has no primary key", table_name)));
    }
    for name in names {
        schema.remove_constraint(&name)?;
    }
    if let Some(def) = schema.get_table_mut(table_name) {
        for c in def.columns.iter_mut() {
            c.primary_key = false;
        }
    }
    Ok(())
}

fn add_constraint(table_name: &str, table_constraint: &TableConstraint, schema: &mut Schema) -> EngineResult<()> {
    let constraint_type = match table_constraint {
        TableConstraint::PrimaryKey(cols) => ConstraintType::PrimaryKey { table: table_name.to_string(), columns: cols.clone() },
        TableConstraint::Unique(cols) => ConstraintType::Unique { table: table_name.to_string(), columns: cols.clone() },
        TableConstraint::ForeignKey { columns, foreign_table, foreign_columns } => ConstraintType::ForeignKey {
            table: table_name.to_string(),
            columns: columns.clone(),
            foreign_table: foreign_table.clone(),
            foreign_columns: foreign_columns.clone(),
        },
        TableConstraint::Check(expr) => ConstraintType::Check { table: table_name.to_string(), expression: lower_ast_expr(expr)? },
    };
    let name = format!("{}_{}_added", table_name, schema.constraints_for_table(table_name).len());
    schema.add_constraint(Constraint { name, constraint_type, deferred: false })
}

fn constant_value(expr: &crate::expr::Expression) -> EngineResult<Value> {
    match expr.elements() {
        [crate::expr::ExprElement::Value(v)] => Ok(v.clone()),
        _ => Err(EngineError::statement_error("ALTER SET DEFAULT requires a constant expression")),
    }
}
