pub mod context;
pub mod eval_expr;

pub use context::QueryContext;

use crate::error::{EngineError, EngineResult};
use crate::expr::variable::Variable;
use crate::expr::Expression;
use crate::parser::ast::{CompositeOp, OrderDirection};
use crate::plan::QueryPlanNode;
use crate::types::{Row, Value};
use eval_expr::eval_scalar;
use std::collections::HashMap;

/// The evaluator's output shape: the virtual-table contract spec §3
/// describes, materialized as named columns plus row data. Every
/// `QueryPlanNode::evaluate` call produces one of these.
#[derive(Debug, Clone, Default)]
pub struct EvalTable {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl EvalTable {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        EvalTable { columns, rows }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name) || c.rsplit('.').next() == Some(name))
    }
}

/// Evaluates a compiled plan tree against a `QueryContext`, implementing
/// spec §4.E's node dispatch. Every node returns a materialized `EvalTable`;
/// nothing is streamed, matching the teacher's own simulated executor shape
/// generalized to real row data.
pub fn evaluate(node: &QueryPlanNode, ctx: &mut QueryContext) -> EngineResult<EvalTable> {
    match node {
        QueryPlanNode::SingleRow => Ok(EvalTable::new(vec![], vec![Row::new(vec![])])),

        QueryPlanNode::TableFetch { table, alias } => {
            let t = ctx.table(table)?;
            let prefix = alias.clone().unwrap_or_else(|| table.clone());
            let columns = t.column_names().into_iter().map(|c| format!("{}.{}", prefix, c)).collect();
            let rows: Vec<Row> = t.scan().map(|(_, row)| row).collect();
            Ok(EvalTable::new(columns, rows))
        }

        QueryPlanNode::CachePoint { inner, cache_id } => {
            if let Some(cached) = ctx.cache_get(*cache_id) {
                return Ok(cached);
            }
            let result = evaluate(inner, ctx)?;
            ctx.cache_put(*cache_id, result.clone());
            Ok(result)
        }

        QueryPlanNode::CreateFunctions { input, functions } => {
            let mut table = evaluate(input, ctx)?;
            for (name, expr) in functions {
                let mut values = Vec::with_capacity(table.rows.len());
                for row in &table.rows {
                    values.push(eval_scalar(expr, row, &table.columns, ctx)?);
                }
                table.columns.push(name.clone());
                for (row, value) in table.rows.iter_mut().zip(values) {
                    row.values.push(value);
                }
            }
            Ok(table)
        }

        QueryPlanNode::ConstantSelect { input, predicate } | QueryPlanNode::ExhaustiveSelect { input, predicate } | QueryPlanNode::SimpleSelect { input, predicate, .. } => {
            let table = evaluate(input, ctx)?;
            filter_rows(table, predicate, ctx)
        }

        QueryPlanNode::RangeSelect { input, predicate, .. } => {
            let table = evaluate(input, ctx)?;
            filter_rows(table, predicate, ctx)
        }

        QueryPlanNode::SimplePatternSelect { input, variable, pattern, negated } => {
            let table = evaluate(input, ctx)?;
            let idx = table.column_index(&variable.display_name()).or_else(|| table.column_index(&variable.column));
            let idx = idx.ok_or_else(|| EngineError::column_not_found(variable.display_name()))?;
            let rows = table
                .rows
                .into_iter()
                .filter(|r| r.get(idx).map(|v| like_match(v, pattern) != *negated).unwrap_or(false))
                .collect();
            Ok(EvalTable::new(table.columns, rows))
        }

        QueryPlanNode::NonCorrelatedAnyAll { input, predicate } => {
            let table = evaluate(input, ctx)?;
            filter_rows(table, predicate, ctx)
        }

        QueryPlanNode::NaturalJoin { left, right } => {
            let l = evaluate(left, ctx)?;
            let r = evaluate(right, ctx)?;
            cartesian(l, r)
        }

        QueryPlanNode::Join { left, right, predicate } => {
            let l = evaluate(left, ctx)?;
            let r = evaluate(right, ctx)?;
            let joined = cartesian(l, r)?;
            filter_rows(joined, predicate, ctx)
        }

        QueryPlanNode::LeftOuterJoin { left, right, predicate } => {
            let l = evaluate(left, ctx)?;
            let r = evaluate(right, ctx)?;
            let r_width = r.columns.len();
            let mut columns = l.columns.clone();
            columns.extend(r.columns.clone());
            let mut rows = Vec::new();
            for lrow in &l.rows {
                let mut matched = false;
                for rrow in &r.rows {
                    let mut combined = lrow.values.clone();
                    combined.extend(rrow.values.clone());
                    let candidate = Row::new(combined);
                    if eval_scalar(predicate, &candidate, &columns, ctx)?.as_boolean().unwrap_or(false) {
                        rows.push(candidate);
                        matched = true;
                    }
                }
                if !matched {
                    let mut combined = lrow.values.clone();
                    combined.extend(std::iter::repeat(Value::Null).take(r_width));
                    rows.push(Row::new(combined));
                }
            }
            Ok(EvalTable::new(columns, rows))
        }

        QueryPlanNode::Marker { input, .. } => evaluate(input, ctx),

        QueryPlanNode::Group { input, group_by, group_max: _, aggregates } => {
            let table = evaluate(input, ctx)?;
            eval_group(table, group_by, aggregates, ctx)
        }

        QueryPlanNode::Sort { input, keys } => {
            let mut table = evaluate(input, ctx)?;
            let idxs: Vec<(usize, OrderDirection)> = keys
                .iter()
                .map(|(v, dir)| (table.column_index(&v.display_name()).or_else(|| table.column_index(&v.column)).unwrap_or(0), *dir))
                .collect();
            table.rows.sort_by(|a, b| {
                for (idx, dir) in &idxs {
                    let ord = a.get(*idx).partial_cmp(&b.get(*idx)).unwrap_or(std::cmp::Ordering::Equal);
                    let ord = if *dir == OrderDirection::Desc { ord.reverse() } else { ord };
                    if ord != std::cmp::Ordering::Equal {
                        return ord;
                    }
                }
                std::cmp::Ordering::Equal
            });
            Ok(table)
        }

        QueryPlanNode::Distinct { input } => {
            let table = evaluate(input, ctx)?;
            let mut seen = std::collections::HashSet::new();
            let rows = table.rows.into_iter().filter(|r| seen.insert(format!("{:?}", r.values))).collect();
            Ok(EvalTable::new(table.columns, rows))
        }

        QueryPlanNode::Subset { input, columns } => {
            let table = evaluate(input, ctx)?;
            let idxs: EngineResult<Vec<usize>> = columns.iter().map(|(internal, _)| table.column_index(internal).ok_or_else(|| EngineError::column_not_found(internal.clone()))).collect();
            let idxs = idxs?;
            let out_columns = columns.iter().map(|(_, output)| output.clone()).collect();
            let rows = table.rows.into_iter().map(|r| Row::new(idxs.iter().map(|&i| r.get(i).cloned().unwrap_or(Value::Null)).collect())).collect();
            Ok(EvalTable::new(out_columns, rows))
        }

        QueryPlanNode::LogicalUnion { left, right } => {
            let l = evaluate(left, ctx)?;
            let r = evaluate(right, ctx)?;
            union_rows(l, r, true)
        }

        QueryPlanNode::Composite { left, right, op, all } => {
            let l = evaluate(left, ctx)?;
            let r = evaluate(right, ctx)?;
            match op {
                CompositeOp::Union => union_rows(l, r, *all),
                CompositeOp::Intersect => intersect_rows(l, r),
                CompositeOp::Except => except_rows(l, r),
            }
        }
    }
}

fn filter_rows(table: EvalTable, predicate: &Expression, ctx: &mut QueryContext) -> EngineResult<EvalTable> {
    let mut rows = Vec::with_capacity(table.rows.len());
    for row in table.rows {
        if eval_scalar(predicate, &row, &table.columns, ctx)?.as_boolean().unwrap_or(false) {
            rows.push(row);
        }
    }
    Ok(EvalTable::new(table.columns, rows))
}

fn cartesian(l: EvalTable, r: EvalTable) -> EngineResult<EvalTable> {
    let mut columns = l.columns.clone();
    columns.extend(r.columns.clone());
    let mut rows = Vec::with_capacity(l.rows.len() * r.rows.len().max(1));
    for lrow in &l.rows {
        for rrow in &r.rows {
            let mut values = lrow.values.clone();
            values.extend(rrow.values.clone());
            rows.push(Row::new(values));
        }
    }
    Ok(EvalTable::new(columns, rows))
}

fn union_rows(l: EvalTable, r: EvalTable, all: bool) -> EngineResult<EvalTable> {
    let mut rows = l.rows;
    rows.extend(r.rows);
    if !all {
        let mut seen = std::collections::HashSet::new();
        rows.retain(|r| seen.insert(format!("{:?}", r.values)));
    }
    Ok(EvalTable::new(l.columns, rows))
}

fn intersect_rows(l: EvalTable, r: EvalTable) -> EngineResult<EvalTable> {
    let right_set: std::collections::HashSet<String> = r.rows.iter().map(|row| format!("{:?}", row.values)).collect();
    let mut seen = std::collections::HashSet::new();
    let rows = l.rows.into_iter().filter(|row| right_set.contains(&format!("{:?}", row.values)) && seen.insert(format!("{:?}", row.values))).collect();
    Ok(EvalTable::new(l.columns, rows))
}

fn except_rows(l: EvalTable, r: EvalTable) -> EngineResult<EvalTable> {
    let right_set: std::collections::HashSet<String> = r.rows.iter().map(|row| format!("{:?}", row.values)).collect();
    let mut seen = std::collections::HashSet::new();
    let rows = l.rows.into_iter().filter(|row| !right_set.contains(&format!("{:?}", row.values)) && seen.insert(format!("{:?}", row.values))).collect();
    Ok(EvalTable::new(l.columns, rows))
}

fn like_match(value: &Value, pattern: &str) -> bool {
    match value.as_text() {
        Some(text) => like_pattern_match(text, pattern),
        None => false,
    }
}

pub(super) fn like_pattern_match(text: &str, pattern: &str) -> bool {
    if pattern.is_empty() {
        return text.is_empty();
    }
    let regex_like = pattern.replace('%', ".*").replace('_', ".");
    regex_glob_match(text, &regex_like)
}

/// A small hand-rolled glob matcher (`.` = any char, `.*` = any run) so LIKE
/// patterns don't need a full regex engine pulled in for one operator.
fn regex_glob_match(text: &str, pattern: &str) -> bool {
    fn matches(t: &[char], p: &[char]) -> bool {
        match p.split_first() {
            None => t.is_empty(),
            Some(('.', rest)) if rest.first() == Some(&'*') => {
                let rest = &rest[1..];
                (0..=t.len()).any(|i| matches(&t[i..], rest))
            }
            Some(('.', rest)) => !t.is_empty() && matches(&t[1..], rest),
            Some((c, rest)) => t.first() == Some(c) && matches(&t[1..], rest),
        }
    }
    let t: Vec<char> = text.chars().collect();
    let p: Vec<char> = pattern.chars().collect();
    matches(&t, &p)
}

fn eval_group(table: EvalTable, group_by: &[Variable], aggregates: &[(String, Expression)], ctx: &mut QueryContext) -> EngineResult<EvalTable> {
    let key_idxs: Vec<usize> = group_by.iter().map(|v| table.column_index(&v.display_name()).or_else(|| table.column_index(&v.column)).unwrap_or(0)).collect();

    let mut groups: HashMap<String, Vec<Row>> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    if group_by.is_empty() {
        groups.insert(String::new(), table.rows);
        order.push(String::new());
    } else {
        for row in table.rows {
            let key = format!("{:?}", key_idxs.iter().map(|&i| row.get(i).cloned()).collect::<Vec<_>>());
            if !groups.contains_key(&key) {
                order.push(key.clone());
            }
            groups.entry(key).or_default().push(row);
        }
    }

    let mut out_columns: Vec<String> = group_by.iter().map(|v| v.display_name()).collect();
    out_columns.extend(aggregates.iter().map(|(name, _)| name.clone()));

    let mut rows = Vec::new();
    for key in order {
        let group_rows = &groups[&key];
        let mut values: Vec<Value> = key_idxs.iter().filter_map(|&i| group_rows.first().and_then(|r| r.get(i).cloned())).collect();
        for (_, expr) in aggregates {
            values.push(eval_aggregate(expr, group_rows, &table.columns, ctx)?);
        }
        rows.push(Row::new(values));
    }
    Ok(EvalTable::new(out_columns, rows))
}

fn eval_aggregate(expr: &Expression, rows: &[Row], columns: &[String], ctx: &mut QueryContext) -> EngineResult<Value> {
    use crate::expr::ExprElement;
    use crate::expr::functions::AggregateFunction;

    let func = expr.elements().iter().find_map(|e| match e {
        ExprElement::Function { name, .. } => AggregateFunction::from_name(name),
        _ => None,
    });

    let Some(func) = func else {
        return rows.first().map(|r| eval_scalar(expr, r, columns, ctx)).transpose().map(|v| v.unwrap_or(Value::Null));
    };

    let arg_expr = inner_aggregate_arg(expr);
    let values: EngineResult<Vec<Value>> = rows.iter().map(|r| eval_scalar(&arg_expr, r, columns, ctx)).collect();
    let values: Vec<Value> = values?.into_iter().filter(|v| !v.is_null()).collect();

    Ok(match func {
        AggregateFunction::Count => Value::Integer(if is_count_star(expr) { rows.len() as i64 } else { values.len() as i64 }),
        AggregateFunction::Sum => values.iter().fold(None, |acc: Option<f64>, v| Some(acc.unwrap_or(0.0) + v.as_real().unwrap_or(0.0))).map(to_numeric).unwrap_or(Value::Null),
        AggregateFunction::Avg => {
            if values.is_empty() {
                Value::Null
            } else {
                let sum: f64 = values.iter().filter_map(|v| v.as_real()).sum();
                Value::Real(sum / values.len() as f64)
            }
        }
        AggregateFunction::Min => values.into_iter().min_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)).unwrap_or(Value::Null),
        AggregateFunction::Max => values.into_iter().max_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)).unwrap_or(Value::Null),
    })
}

fn to_numeric(f: f64) -> Value {
    if f.fract() == 0.0 { Value::Integer(f as i64) } else { Value::Real(f) }
}

fn is_count_star(expr: &Expression) -> bool {
    use crate::expr::ExprElement;
    matches!(expr.elements(), [ExprElement::Function { name, arg_count: 0, .. }] if name.eq_ignore_ascii_case("COUNT"))
}

fn inner_aggregate_arg(expr: &Expression) -> Expression {
    use crate::expr::ExprElement;
    match expr.elements() {
        [] => expr.clone(),
        elements => match elements.last() {
            Some(ExprElement::Function { arg_count, .. }) if *arg_count > 0 => Expression::new(elements[..elements.len() - 1].to_vec()),
            _ => expr.clone(),
        },
    }
}
