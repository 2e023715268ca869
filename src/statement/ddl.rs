use super::{count_table, TableSet};
use crate::catalog::{Column, Constraint, ConstraintType, IndexDef, Schema, TableDef};
use crate::error::{EngineError, EngineResult};
use crate::exec::EvalTable;
use crate::expr::lower::lower_ast_expr;
use crate::parser::ast::{ColumnConstraint, ColumnDefinition, CreateIndexStatement, CreateTableStatement, DropIndexStatement, DropTableStatement, TableConstraint};
use crate::storage::MemTable;

pub fn execute_create_table(stmt: &CreateTableStatement, schema: &mut Schema, tables: &mut TableSet) -> EngineResult<EvalTable> {
    if schema.has_table(&stmt.table_name) {
        if stmt.if_not_exists {
            return Ok(count_table(0));
        }
        return Err(EngineError::database_error(format!("table '{}' already exists", stmt.table_name)));
    }

    let def = build_table_def(stmt)?;
    schema.add_table(def)?;
    tables.insert(stmt.table_name.clone(), MemTable::new(schema.get_table(&stmt.table_name).unwrap().clone()));

    for constraint in table_level_constraints(&stmt.table_name, &stmt.constraints)? {
        schema.add_constraint(constraint)?;
    }
    for col in &stmt.columns {
        for c in &col.constraints {
            if let Some(constraint) = column_level_constraint(&stmt.table_name, &col.name, c)? {
                schema.add_constraint(constraint)?;
            }
        }
    }

    Ok(count_table(0))
}

fn build_table_def(stmt: &CreateTableStatement) -> EngineResult<TableDef> {
    let mut columns = Vec::with_capacity(stmt.columns.len());
    for col_def in &stmt.columns {
        columns.push(build_column(col_def));
    }
    let def = TableDef::new(stmt.table_name.clone(), columns);
    def.validate()?;
    Ok(def)
}

fn build_column(col_def: &ColumnDefinition) -> Column {
    let mut column = Column::new(col_def.name.clone(), col_def.data_type, true);
    for c in &col_def.constraints {
        match c {
            ColumnConstraint::NotNull => column.nullable = false,
            ColumnConstraint::PrimaryKey => {
                column.primary_key = true;
                column.nullable = false;
            }
            ColumnConstraint::Unique => column.unique = true,
            ColumnConstraint::Default(v) => column.default_value = Some(v.clone()),
            ColumnConstraint::ForeignKey { .. } => {}
        }
    }
    column
}

fn table_level_constraints(table_name: &str, constraints: &[TableConstraint]) -> EngineResult<Vec<Constraint>> {
    let mut out = Vec::new();
    for (i, c) in constraints.iter().enumerate() {
        let constraint_type = match c {
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
        out.push(Constraint { name: format!("{}_ck{}", table_name, i), constraint_type, deferred: false });
    }
    Ok(out)
}

fn column_level_constraint(table_name: &str, column: &str, c: &ColumnConstraint) -> EngineResult<Option<Constraint>> {
    Ok(match c {
        ColumnConstraint::PrimaryKey => Some(Constraint {
            name: format!("{}_{}_pk", table_name, column),
            constraint_type: ConstraintType::PrimaryKey { table: table_name.to_string(), columns: vec![column.to_string()] },
            deferred: false,
        }),
        ColumnConstraint::Unique => Some(Constraint {
            name: format!("{}_{}_uq", table_name, column),
            constraint_type: ConstraintType::Unique { table: table_name.to_string(), columns: vec![column.to_string()] },
            deferred: false,
        }),
        ColumnConstraint::NotNull => Some(Constraint {
            name: format!("{}_{}_nn", table_name, column),
            constraint_type: ConstraintType::NotNull { table: table_name.to_string(), column: column.to_string() },
            deferred: false,
        }),
        ColumnConstraint::ForeignKey { table, column: foreign_column } => Some(Constraint {
            name: format!("{}_{}_fk", table_name, column),
            constraint_type: ConstraintType::ForeignKey {
                table: table_name.to_string(),
                columns: vec![column.to_string()],
                foreign_table: table.clone(),
                foreign_columns: vec![foreign_column.clone()],
            },
            deferred: false,
        }),
        ColumnConstraint::Default(_) => None,
    })
}

pub fn execute_drop_table(stmt: &DropTableStatement, schema: &mut Schema, tables: &mut TableSet) -> EngineResult<EvalTable> {
    if !schema.has_table(&stmt.table_name) {
        if stmt.if_exists {
            return Ok(count_table(0));
        }
        return Err(EngineError::table_not_found(stmt.table_name.clone()));
    }
    schema.remove_table(&stmt.table_name)?;
    tables.remove(&stmt.table_name);
    Ok(count_table(0))
}

pub fn execute_create_index(stmt: &CreateIndexStatement, schema: &mut Schema) -> EngineResult<EvalTable> {
    let index = IndexDef::new(stmt.index_name.clone(), stmt.table_name.clone(), stmt.columns.clone(), stmt.unique);
    schema.add_index(index)?;
    Ok(count_table(0))
}

pub fn execute_drop_index(stmt: &DropIndexStatement, schema: &mut Schema) -> EngineResult<EvalTable> {
    match schema.remove_index(&stmt.index_name) {
        Ok(_) => Ok(count_table(0)),
        Err(e) if stmt.if_exists => {
            let _ = e;
            Ok(count_table(0))
        }
        Err(e) => Err(e),
    }
}
