use super::QueryContext;
use crate::error::{EngineError, EngineResult};
use crate::expr::{ExprElement, Expression};
use crate::parser::ast::{BinaryOperator, UnaryOperator};
use crate::types::{Row, Value};

/// The postfix evaluator's stack cell. Most elements resolve to a single
/// scalar; a `SubQuery`/`PlanNode` element resolves to the whole column of
/// values its plan produces, which `=`/`<>` then treat as ANY/ALL membership
/// (the non-correlated `IN (SELECT ...)` / `NOT IN (SELECT ...)` shape).
enum StackValue {
    Scalar(Value),
    Set(Vec<Value>),
}

impl StackValue {
    fn into_scalar(self) -> Value {
        match self {
            StackValue::Scalar(v) => v,
            StackValue::Set(mut values) => values.pop().unwrap_or(Value::Null),
        }
    }
}

/// Evaluates a postfix `Expression` against one row, implementing spec §4.E's
/// per-row predicate/projection evaluation.
pub fn eval_scalar(expr: &Expression, row: &Row, columns: &[String], ctx: &mut QueryContext) -> EngineResult<Value> {
    let mut stack: Vec<StackValue> = Vec::new();

    for el in expr.elements() {
        match el {
            ExprElement::Value(v) => stack.push(StackValue::Scalar(v.clone())),
            ExprElement::Variable(v) => {
                let idx = columns
                    .iter()
                    .position(|c| c.eq_ignore_ascii_case(&v.display_name()) || c.rsplit('.').next() == Some(v.column.as_str()))
                    .ok_or_else(|| EngineError::column_not_found(v.display_name()))?;
                stack.push(StackValue::Scalar(row.get(idx).cloned().unwrap_or(Value::Null)));
            }
            ExprElement::CorrelatedVariable(cv) => {
                let value = ctx.outer_value(cv.level, &cv.variable.column).cloned().unwrap_or(Value::Null);
                stack.push(StackValue::Scalar(value));
            }
            ExprElement::SubQuery(_) => {
                return Err(EngineError::statement_error("sub-query must be prepared into a plan node before evaluation"));
            }
            ExprElement::PlanNode(plan) => {
                ctx.push_outer(columns.to_vec(), row.clone());
                let result = super::evaluate(plan, ctx);
                ctx.pop_outer();
                let table = result?;
                let values: Vec<Value> = table.rows.iter().filter_map(|r| r.get(0).cloned()).collect();
                stack.push(StackValue::Set(values));
            }
            ExprElement::UnaryOp(op) => {
                let operand = stack.pop().ok_or_else(|| EngineError::statement_error("stack underflow"))?.into_scalar();
                stack.push(StackValue::Scalar(apply_unary(*op, operand)?));
            }
            ExprElement::BinaryOp(op) => {
                let right = stack.pop().ok_or_else(|| EngineError::statement_error("stack underflow"))?;
                let left = stack.pop().ok_or_else(|| EngineError::statement_error("stack underflow"))?;
                stack.push(StackValue::Scalar(apply_binary(*op, left, right)?));
            }
            ExprElement::Function { name, arg_count, distinct: _ } => {
                let mut args = Vec::with_capacity(*arg_count);
                for _ in 0..*arg_count {
                    args.push(stack.pop().ok_or_else(|| EngineError::statement_error("stack underflow"))?.into_scalar());
                }
                args.reverse();
                stack.push(StackValue::Scalar(apply_function(name, args)?));
            }
        }
    }

    Ok(stack.pop().map(StackValue::into_scalar).unwrap_or(Value::Null))
}

fn apply_unary(op: UnaryOperator, operand: Value) -> EngineResult<Value> {
    Ok(match op {
        UnaryOperator::Plus => operand,
        UnaryOperator::Minus => match operand {
            Value::Integer(i) => Value::Integer(-i),
            Value::Real(r) => Value::Real(-r),
            Value::Null => Value::Null,
            other => return Err(EngineError::statement_error(format!("cannot negate {}", other))),
        },
        UnaryOperator::Not => Value::Boolean(!operand.as_boolean().unwrap_or(false)),
    })
}

fn apply_binary(op: BinaryOperator, left: StackValue, right: StackValue) -> EngineResult<Value> {
    use BinaryOperator::*;

    if matches!(op, Equal | NotEqual) {
        if let StackValue::Set(values) = &right {
            let l = match &left {
                StackValue::Scalar(v) => v.clone(),
                StackValue::Set(_) => return Err(EngineError::statement_error("set cannot appear on both sides of a comparison")),
            };
            let any_match = values.iter().any(|v| values_equal(&l, v));
            return Ok(Value::Boolean(if op == Equal { any_match } else { !any_match }));
        }
    }

    let l = left.into_scalar();
    let r = right.into_scalar();

    if l.is_null() || r.is_null() {
        return Ok(match op {
            And if matches!(l, Value::Boolean(false)) || matches!(r, Value::Boolean(false)) => Value::Boolean(false),
            Or if matches!(l, Value::Boolean(true)) || matches!(r, Value::Boolean(true)) => Value::Boolean(true),
            _ => Value::Null,
        });
    }

    Ok(match op {
        Add => numeric_op(&l, &r, |a, b| a + b, |a, b| a + b)?,
        Subtract => numeric_op(&l, &r, |a, b| a - b, |a, b| a - b)?,
        Multiply => numeric_op(&l, &r, |a, b| a * b, |a, b| a * b)?,
        Divide => {
            let rv = r.as_real().ok_or_else(|| EngineError::statement_error("non-numeric operand to /"))?;
            if rv == 0.0 {
                return Err(EngineError::database_error("division by zero"));
            }
            numeric_op(&l, &r, |a, b| a / b, |a, b| a / b)?
        }
        Modulo => {
            let a = l.as_integer().ok_or_else(|| EngineError::statement_error("non-integer operand to %"))?;
            let b = r.as_integer().ok_or_else(|| EngineError::statement_error("non-integer operand to %"))?;
            if b == 0 {
                return Err(EngineError::database_error("division by zero"));
            }
            Value::Integer(a % b)
        }
        Equal => Value::Boolean(values_equal(&l, &r)),
        NotEqual => Value::Boolean(!values_equal(&l, &r)),
        LessThan => Value::Boolean(l.partial_cmp(&r).map(|o| o.is_lt()).unwrap_or(false)),
        LessThanOrEqual => Value::Boolean(l.partial_cmp(&r).map(|o| o.is_le()).unwrap_or(false)),
        GreaterThan => Value::Boolean(l.partial_cmp(&r).map(|o| o.is_gt()).unwrap_or(false)),
        GreaterThanOrEqual => Value::Boolean(l.partial_cmp(&r).map(|o| o.is_ge()).unwrap_or(false)),
        And => Value::Boolean(l.as_boolean().unwrap_or(false) && r.as_boolean().unwrap_or(false)),
        Or => Value::Boolean(l.as_boolean().unwrap_or(false) || r.as_boolean().unwrap_or(false)),
        Like => Value::Boolean(like(&l, &r)),
        NotLike => Value::Boolean(!like(&l, &r)),
        Concat => Value::Text(format!("{}{}", display(&l), display(&r))),
    })
}

fn values_equal(a: &Value, b: &Value) -> bool {
    a.partial_cmp(b).map(|o| o.is_eq()).unwrap_or(false)
}

fn display(v: &Value) -> String {
    v.to_string()
}

fn numeric_op(a: &Value, b: &Value, int_op: fn(i64, i64) -> i64, real_op: fn(f64, f64) -> f64) -> EngineResult<Value> {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => Ok(Value::Integer(int_op(*x, *y))),
        _ => {
            let x = a.as_real().ok_or_else(|| EngineError::statement_error("non-numeric operand"))?;
            let y = b.as_real().ok_or_else(|| EngineError::statement_error("non-numeric operand"))?;
            Ok(Value::Real(real_op(x, y)))
        }
    }
}

fn like(value: &Value, pattern: &Value) -> bool {
    let (Some(text), Some(pat)) = (value.as_text(), pattern.as_text()) else { return false };
    super::like_pattern_match(text, pat)
}

fn apply_function(name: &str, args: Vec<Value>) -> EngineResult<Value> {
    match name.to_ascii_uppercase().as_str() {
        "__ISNULL" => Ok(Value::Boolean(args.first().map(|v| v.is_null()).unwrap_or(true))),
        "UPPER" => Ok(Value::Text(args.first().and_then(|v| v.as_text()).unwrap_or("").to_ascii_uppercase())),
        "LOWER" => Ok(Value::Text(args.first().and_then(|v| v.as_text()).unwrap_or("").to_ascii_lowercase())),
        "LENGTH" => Ok(Value::Integer(args.first().and_then(|v| v.as_text()).map(|s| s.len() as i64).unwrap_or(0))),
        "ABS" => Ok(match args.first() {
            Some(Value::Integer(i)) => Value::Integer(i.abs()),
            Some(Value::Real(r)) => Value::Real(r.abs()),
            _ => Value::Null,
        }),
        "COALESCE" => Ok(args.into_iter().find(|v| !v.is_null()).unwrap_or(Value::Null)),
        // COUNT/SUM/AVG/MIN/MAX are handled by the group evaluator; a bare
        // call outside GROUP BY context (e.g. `SELECT COUNT(*)` with no
        // grouping) falls through to the aggregate path in `exec::eval_group`
        // before `eval_scalar` is ever asked to apply it directly.
        other => Err(EngineError::statement_error(format!("unknown function '{}'", other))),
    }
}
