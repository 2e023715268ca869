pub mod functions;
pub mod lower;
pub mod variable;

pub use variable::{CorrelatedVariable, Variable};

use crate::error::{EngineError, EngineResult};
use crate::parser::ast::{BinaryOperator, UnaryOperator};
use crate::plan::QueryPlanNode;
use crate::types::Value;
use functions::FunctionRegistry;

/// One cell of the postfix element sequence spec §3 describes: a typed
/// constant, a variable, a correlated-variable reference, a sub-query (before
/// planning) or a compiled plan node (after the preparation walk substitutes
/// it), an operator, or a function reference.
#[derive(Debug, Clone)]
pub enum ExprElement {
    Value(Value),
    Variable(Variable),
    CorrelatedVariable(CorrelatedVariable),
    SubQuery(Box<crate::parser::ast::SelectStatement>),
    PlanNode(Box<QueryPlanNode>),
    BinaryOp(BinaryOperator),
    UnaryOp(UnaryOperator),
    Function { name: String, arg_count: usize, distinct: bool },
}

impl ExprElement {
    /// Net effect on an evaluation-stack's depth if this element were pushed:
    /// how many operands it consumes versus the one result it always leaves.
    fn stack_effect(&self) -> isize {
        match self {
            ExprElement::Value(_)
            | ExprElement::Variable(_)
            | ExprElement::CorrelatedVariable(_)
            | ExprElement::SubQuery(_)
            | ExprElement::PlanNode(_) => 1,
            ExprElement::UnaryOp(_) => 0,
            ExprElement::BinaryOp(_) => -1,
            ExprElement::Function { arg_count, .. } => 1 - *arg_count as isize,
        }
    }
}

/// An ordered postfix sequence of elements (spec §3). The from-set resolver,
/// normalizer and planner all operate on this flat representation rather than
/// on a tree.
#[derive(Debug, Clone, Default)]
pub struct Expression {
    pub elements: Vec<ExprElement>,
}

impl Expression {
    pub fn new(elements: Vec<ExprElement>) -> Self {
        Expression { elements }
    }

    pub fn literal(value: Value) -> Self {
        Expression { elements: vec![ExprElement::Value(value)] }
    }

    pub fn variable(v: Variable) -> Self {
        Expression { elements: vec![ExprElement::Variable(v)] }
    }

    pub fn is_single_variable(&self) -> bool {
        matches!(self.elements.as_slice(), [ExprElement::Variable(_)])
    }

    pub fn as_single_variable(&self) -> Option<&Variable> {
        match self.elements.as_slice() {
            [ExprElement::Variable(v)] => Some(v),
            _ => None,
        }
    }

    pub fn is_constant(&self) -> bool {
        self.elements.iter().all(|e| matches!(e, ExprElement::Value(_) | ExprElement::BinaryOp(_) | ExprElement::UnaryOp(_) | ExprElement::Function { .. }))
            && !self.has_variables()
    }

    pub fn has_variables(&self) -> bool {
        self.elements
            .iter()
            .any(|e| matches!(e, ExprElement::Variable(_) | ExprElement::CorrelatedVariable(_)))
    }

    /// Enumerates all variables referenced anywhere in the expression
    /// (CorrelatedVariables contribute their inner variable).
    pub fn variables(&self) -> Vec<&Variable> {
        self.elements
            .iter()
            .filter_map(|e| match e {
                ExprElement::Variable(v) => Some(v),
                ExprElement::CorrelatedVariable(cv) => Some(&cv.variable),
                _ => None,
            })
            .collect()
    }

    pub fn elements(&self) -> &[ExprElement] {
        &self.elements
    }

    /// True for a raw, not-yet-planned `SubQuery` element and also for a
    /// `PlanNode` element (a subquery already compiled by the planner), so
    /// classification doesn't change once preparation has run.
    pub fn has_subquery(&self) -> bool {
        self.elements.iter().any(|e| matches!(e, ExprElement::SubQuery(_) | ExprElement::PlanNode(_)))
    }

    /// Reports whether any element is a function tagged as aggregate in the
    /// function registry.
    pub fn is_aggregate(&self) -> bool {
        self.elements.iter().any(|e| matches!(e, ExprElement::Function { name, .. } if FunctionRegistry::is_aggregate(name)))
    }

    /// Preparation walk: each element satisfying `can_prepare` is replaced in
    /// place by `prepare(element)`.
    pub fn walk_prepare<P, M>(&mut self, can_prepare: P, mut prepare: M) -> EngineResult<()>
    where
        P: Fn(&ExprElement) -> bool,
        M: FnMut(&ExprElement) -> EngineResult<ExprElement>,
    {
        for el in self.elements.iter_mut() {
            if can_prepare(el) {
                *el = prepare(el)?;
            }
        }
        Ok(())
    }

    /// For an expression whose last element is a binary operator, returns the
    /// left and right sub-expressions without that operator (spec §4.A
    /// "split"). `join(split(e), lastOp(e)) ≡ e` holds by construction.
    pub fn split(&self) -> EngineResult<(Expression, Expression, BinaryOperator)> {
        let op = match self.elements.last() {
            Some(ExprElement::BinaryOp(op)) => *op,
            _ => return Err(EngineError::statement_error("split requires a binary-operator-rooted expression")),
        };
        let body = &self.elements[..self.elements.len() - 1];
        let boundary = first_complete_prefix_len(body)?;
        let left = Expression::new(body[..boundary].to_vec());
        let right = Expression::new(body[boundary..].to_vec());
        Ok((left, right, op))
    }

    pub fn join(mut left: Expression, mut right: Expression, op: BinaryOperator) -> Expression {
        let mut elements = Vec::with_capacity(left.elements.len() + right.elements.len() + 1);
        elements.append(&mut left.elements);
        elements.append(&mut right.elements);
        elements.push(ExprElement::BinaryOp(op));
        Expression::new(elements)
    }

    pub fn last_operator(&self) -> Option<BinaryOperator> {
        match self.elements.last() {
            Some(ExprElement::BinaryOp(op)) => Some(*op),
            _ => None,
        }
    }

    /// Removes every NOT by inverting its operand (spec §4.A). Idempotent:
    /// `normalize(normalize(e)) ≡ normalize(e)`.
    pub fn normalize(&self) -> Expression {
        let tree = lower::postfix_to_tree(self);
        let normalized = normalize_tree(tree, false);
        lower::tree_to_postfix(&normalized)
    }
}

/// Internal tree form used only by `normalize`, mirroring the shape a
/// recursive-descent parser naturally produces, so the NOT-pushdown recursion
/// reads the same way the rest of the crate's tree-walking code does.
#[derive(Debug, Clone)]
pub enum ExprNode {
    Value(Value),
    Variable(Variable),
    CorrelatedVariable(CorrelatedVariable),
    SubQuery(Box<crate::parser::ast::SelectStatement>),
    PlanNode(Box<QueryPlanNode>),
    Unary(UnaryOperator, Box<ExprNode>),
    Binary(Box<ExprNode>, BinaryOperator, Box<ExprNode>),
    Function { name: String, args: Vec<ExprNode>, distinct: bool },
}

fn normalize_tree(node: ExprNode, negate: bool) -> ExprNode {
    match node {
        ExprNode::Unary(UnaryOperator::Not, inner) => normalize_tree(*inner, !negate),
        ExprNode::Binary(l, BinaryOperator::And, r) if negate => ExprNode::Binary(
            Box::new(normalize_tree(*l, true)),
            BinaryOperator::Or,
            Box::new(normalize_tree(*r, true)),
        ),
        ExprNode::Binary(l, BinaryOperator::Or, r) if negate => ExprNode::Binary(
            Box::new(normalize_tree(*l, true)),
            BinaryOperator::And,
            Box::new(normalize_tree(*r, true)),
        ),
        ExprNode::Binary(l, op, r) if negate && op.is_comparison() => {
            let inv = op.inverse().unwrap_or(op);
            ExprNode::Binary(Box::new(normalize_tree(*l, false)), inv, Box::new(normalize_tree(*r, false)))
        }
        ExprNode::Binary(l, op, r) if !negate => {
            ExprNode::Binary(Box::new(normalize_tree(*l, false)), op, Box::new(normalize_tree(*r, false)))
        }
        other if negate => {
            // Non-inversible operator under negation: wrap as `(expr) = false`.
            let normalized = normalize_tree(other, false);
            ExprNode::Binary(Box::new(normalized), BinaryOperator::Equal, Box::new(ExprNode::Value(Value::Boolean(false))))
        }
        ExprNode::Unary(op, inner) => ExprNode::Unary(op, Box::new(normalize_tree(*inner, false))),
        ExprNode::Function { name, args, distinct } => ExprNode::Function {
            name,
            args: args.into_iter().map(|a| normalize_tree(a, false)).collect(),
            distinct,
        },
        leaf => leaf,
    }
}

/// Computes the length of the shortest prefix of `elements` that forms a
/// complete sub-expression (evaluation-stack depth returns to exactly 1).
fn first_complete_prefix_len(elements: &[ExprElement]) -> EngineResult<usize> {
    let mut depth: isize = 0;
    for (i, el) in elements.iter().enumerate() {
        depth += el.stack_effect();
        if depth == 1 {
            return Ok(i + 1);
        }
    }
    Err(EngineError::statement_error("malformed postfix expression: no complete prefix found"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::BinaryOperator as Op;

    fn var(name: &str) -> Expression {
        Expression::variable(Variable::unqualified(name))
    }

    #[test]
    fn split_then_join_round_trips() {
        let e = Expression::join(var("a"), Expression::literal(Value::Integer(1)), Op::Equal);
        let (l, r, op) = e.split().unwrap();
        let rejoined = Expression::join(l, r, op);
        assert_eq!(format!("{:?}", rejoined.elements), format!("{:?}", e.elements));
    }

    #[test]
    fn normalize_is_idempotent_and_removes_not() {
        use crate::parser::ast::UnaryOperator;
        let inner = Expression::join(var("a"), var("b"), Op::And);
        let mut elements = inner.elements.clone();
        elements.push(ExprElement::UnaryOp(UnaryOperator::Not));
        let e = Expression::new(elements);

        let once = e.normalize();
        let twice = once.normalize();
        assert!(!once.elements.iter().any(|el| matches!(el, ExprElement::UnaryOp(UnaryOperator::Not))));
        assert_eq!(format!("{:?}", once.elements), format!("{:?}", twice.elements));
    }

    #[test]
    fn normalize_flips_comparison_operators() {
        use crate::parser::ast::UnaryOperator;
        let cmp = Expression::join(var("a"), Expression::literal(Value::Integer(1)), Op::LessThan);
        let mut elements = cmp.elements.clone();
        elements.push(ExprElement::UnaryOp(UnaryOperator::Not));
        let e = Expression::new(elements);
        let normalized = e.normalize();
        assert_eq!(normalized.last_operator(), Some(Op::GreaterThanOrEqual));
    }

    #[test]
    fn aggregate_detection() {
        let e = Expression::new(vec![
            ExprElement::Variable(Variable::unqualified("a")),
            ExprElement::Function { name: "COUNT".into(), arg_count: 1, distinct: false },
        ]);
        assert!(e.is_aggregate());
    }
}
