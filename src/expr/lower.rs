use super::{ExprElement, ExprNode, Expression, Variable};
use crate::error::{EngineError, EngineResult};
use crate::parser::ast;

/// Lowers the parser's tree-shaped `Expression` into the core's postfix
/// `Expression` by standard post-order linearization. Qualified columns with
/// no explicit table become unqualified `Variable`s, resolved later by the
/// from-set (`crate::fromset`).
pub fn lower_ast_expr(ast_expr: &ast::Expression) -> EngineResult<Expression> {
    let mut elements = Vec::new();
    emit(ast_expr, &mut elements)?;
    Ok(Expression::new(elements))
}

fn emit(ast_expr: &ast::Expression, out: &mut Vec<ExprElement>) -> EngineResult<()> {
    match ast_expr {
        ast::Expression::Literal(v) => out.push(ExprElement::Value(v.clone())),
        ast::Expression::Column(name) => out.push(ExprElement::Variable(Variable::unqualified(name.clone()))),
        ast::Expression::QualifiedColumn { table, column } => {
            out.push(ExprElement::Variable(Variable::qualified(table.clone(), column.clone())))
        }
        ast::Expression::Wildcard => {
            out.push(ExprElement::Function { name: "COUNT".into(), arg_count: 0, distinct: false })
        }
        ast::Expression::BinaryOp { left, op, right } => {
            emit(left, out)?;
            emit(right, out)?;
            out.push(ExprElement::BinaryOp(*op));
        }
        ast::Expression::UnaryOp { op, operand } => {
            emit(operand, out)?;
            out.push(ExprElement::UnaryOp(*op));
        }
        ast::Expression::Function { name, args, distinct } => {
            for a in args {
                emit(a, out)?;
            }
            out.push(ExprElement::Function { name: name.clone(), arg_count: args.len(), distinct: *distinct });
        }
        ast::Expression::Subquery(select) => out.push(ExprElement::SubQuery(select.clone())),
        ast::Expression::In { expr, list, negated } => {
            // Desugar `a IN (x, y)` into `a = x OR a = y` (and negate via De
            // Morgan for `NOT IN`), so the planner only ever sees binary
            // operators when deciding expression plan classes (spec §4.D).
            if list.is_empty() {
                let lit = if *negated { crate::types::Value::Boolean(true) } else { crate::types::Value::Boolean(false) };
                out.push(ExprElement::Value(lit));
                return Ok(());
            }
            let op = if *negated { ast::BinaryOperator::NotEqual } else { ast::BinaryOperator::Equal };
            let join_op = if *negated { ast::BinaryOperator::And } else { ast::BinaryOperator::Or };
            let mut acc: Option<ast::Expression> = None;
            for item in list {
                let cmp = ast::Expression::BinaryOp { left: expr.clone(), op, right: Box::new(item.clone()) };
                acc = Some(match acc {
                    None => cmp,
                    Some(prev) => ast::Expression::BinaryOp { left: Box::new(prev), op: join_op, right: Box::new(cmp) },
                });
            }
            emit(&acc.unwrap(), out)?;
        }
        ast::Expression::InSubquery { expr, query, negated } => {
            emit(expr, out)?;
            out.push(ExprElement::SubQuery(query.clone()));
            out.push(ExprElement::BinaryOp(if *negated { ast::BinaryOperator::NotEqual } else { ast::BinaryOperator::Equal }));
        }
        ast::Expression::Between { expr, low, high, negated } => {
            let ge = ast::Expression::BinaryOp { left: expr.clone(), op: ast::BinaryOperator::GreaterThanOrEqual, right: low.clone() };
            let le = ast::Expression::BinaryOp { left: expr.clone(), op: ast::BinaryOperator::LessThanOrEqual, right: high.clone() };
            let both = ast::Expression::BinaryOp { left: Box::new(ge), op: ast::BinaryOperator::And, right: Box::new(le) };
            if *negated {
                emit(&both, out)?;
                out.push(ExprElement::UnaryOp(ast::UnaryOperator::Not));
            } else {
                emit(&both, out)?;
            }
        }
        ast::Expression::IsNull(inner) => {
            emit(inner, out)?;
            out.push(ExprElement::Function { name: "__ISNULL".into(), arg_count: 1, distinct: false });
        }
        ast::Expression::IsNotNull(inner) => {
            emit(inner, out)?;
            out.push(ExprElement::Function { name: "__ISNULL".into(), arg_count: 1, distinct: false });
            out.push(ExprElement::UnaryOp(ast::UnaryOperator::Not));
        }
        ast::Expression::Placeholder => out.push(ExprElement::Value(crate::types::Value::Null)),
    }
    Ok(())
}

/// Parses a postfix `Expression` into the recursive `ExprNode` tree used
/// internally by `Expression::normalize`.
pub fn postfix_to_tree(expr: &Expression) -> ExprNode {
    let mut stack: Vec<ExprNode> = Vec::new();
    for el in expr.elements() {
        match el {
            ExprElement::Value(v) => stack.push(ExprNode::Value(v.clone())),
            ExprElement::Variable(v) => stack.push(ExprNode::Variable(v.clone())),
            ExprElement::CorrelatedVariable(cv) => stack.push(ExprNode::CorrelatedVariable(cv.clone())),
            ExprElement::SubQuery(q) => stack.push(ExprNode::SubQuery(q.clone())),
            ExprElement::PlanNode(p) => stack.push(ExprNode::PlanNode(p.clone())),
            ExprElement::UnaryOp(op) => {
                let operand = stack.pop().expect("malformed postfix expression");
                stack.push(ExprNode::Unary(*op, Box::new(operand)));
            }
            ExprElement::BinaryOp(op) => {
                let right = stack.pop().expect("malformed postfix expression");
                let left = stack.pop().expect("malformed postfix expression");
                stack.push(ExprNode::Binary(Box::new(left), *op, Box::new(right)));
            }
            ExprElement::Function { name, arg_count, distinct } => {
                let mut args = Vec::with_capacity(*arg_count);
                for _ in 0..*arg_count {
                    args.push(stack.pop().expect("malformed postfix expression"));
                }
                args.reverse();
                stack.push(ExprNode::Function { name: name.clone(), args, distinct: *distinct });
            }
        }
    }
    stack.pop().unwrap_or(ExprNode::Value(crate::types::Value::Null))
}

/// Linearizes an `ExprNode` tree back into a postfix `Expression`.
pub fn tree_to_postfix(node: &ExprNode) -> Expression {
    let mut out = Vec::new();
    flatten(node, &mut out);
    Expression::new(out)
}

fn flatten(node: &ExprNode, out: &mut Vec<ExprElement>) {
    match node {
        ExprNode::Value(v) => out.push(ExprElement::Value(v.clone())),
        ExprNode::Variable(v) => out.push(ExprElement::Variable(v.clone())),
        ExprNode::CorrelatedVariable(cv) => out.push(ExprElement::CorrelatedVariable(cv.clone())),
        ExprNode::SubQuery(q) => out.push(ExprElement::SubQuery(q.clone())),
        ExprNode::PlanNode(p) => out.push(ExprElement::PlanNode(p.clone())),
        ExprNode::Unary(op, inner) => {
            flatten(inner, out);
            out.push(ExprElement::UnaryOp(*op));
        }
        ExprNode::Binary(l, op, r) => {
            flatten(l, out);
            flatten(r, out);
            out.push(ExprElement::BinaryOp(*op));
        }
        ExprNode::Function { name, args, distinct } => {
            for a in args {
                flatten(a, out);
            }
            out.push(ExprElement::Function { name: name.clone(), arg_count: args.len(), distinct: *distinct });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    #[test]
    fn lowers_binary_expression_to_postfix() {
        let ast_expr = ast::Expression::BinaryOp {
            left: Box::new(ast::Expression::Column("a".into())),
            op: ast::BinaryOperator::Equal,
            right: Box::new(ast::Expression::Literal(Value::Integer(1))),
        };
        let expr = lower_ast_expr(&ast_expr).unwrap();
        assert_eq!(expr.elements().len(), 3);
        assert_eq!(expr.last_operator(), Some(ast::BinaryOperator::Equal));
    }

    #[test]
    fn lowers_in_list_to_or_of_equals() {
        let ast_expr = ast::Expression::In {
            expr: Box::new(ast::Expression::Column("a".into())),
            list: vec![ast::Expression::Literal(Value::Integer(1)), ast::Expression::Literal(Value::Integer(2))],
            negated: false,
        };
        let expr = lower_ast_expr(&ast_expr).unwrap();
        assert_eq!(expr.last_operator(), Some(ast::BinaryOperator::Or));
    }
}
