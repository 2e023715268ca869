pub mod expression_plan;
pub mod planner;

pub use expression_plan::{ExpressionPlan, PredicateClass};

use crate::expr::variable::Variable;
use crate::expr::Expression;
use crate::parser::ast::{CompositeOp, JoinType, OrderDirection};

/// A node of the compiled query plan tree. Modeled as a closed tagged union
/// rather than a trait-object hierarchy (every node is known ahead of time
/// and the planner needs to pattern-match and rewrite subtrees freely).
#[derive(Debug, Clone)]
pub enum QueryPlanNode {
    TableFetch { table: String, alias: Option<String> },
    CachePoint { inner: Box<QueryPlanNode>, cache_id: u64 },
    CreateFunctions { input: Box<QueryPlanNode>, functions: Vec<(String, Expression)> },
    ConstantSelect { input: Box<QueryPlanNode>, predicate: Expression },
    RangeSelect { input: Box<QueryPlanNode>, index: String, predicate: Expression },
    SimpleSelect { input: Box<QueryPlanNode>, index: Option<String>, predicate: Expression },
    SimplePatternSelect { input: Box<QueryPlanNode>, variable: Variable, pattern: String, negated: bool },
    ExhaustiveSelect { input: Box<QueryPlanNode>, predicate: Expression },
    NonCorrelatedAnyAll { input: Box<QueryPlanNode>, predicate: Expression },
    Join { left: Box<QueryPlanNode>, right: Box<QueryPlanNode>, predicate: Expression },
    NaturalJoin { left: Box<QueryPlanNode>, right: Box<QueryPlanNode> },
    LeftOuterJoin { left: Box<QueryPlanNode>, right: Box<QueryPlanNode>, predicate: Expression },
    Marker { input: Box<QueryPlanNode>, marker_id: u64 },
    Group { input: Box<QueryPlanNode>, group_by: Vec<Variable>, group_max: Option<Variable>, aggregates: Vec<(String, Expression)> },
    Sort { input: Box<QueryPlanNode>, keys: Vec<(Variable, OrderDirection)> },
    Distinct { input: Box<QueryPlanNode> },
    Subset { input: Box<QueryPlanNode>, columns: Vec<(String, String)> },
    LogicalUnion { left: Box<QueryPlanNode>, right: Box<QueryPlanNode> },
    Composite { left: Box<QueryPlanNode>, right: Box<QueryPlanNode>, op: CompositeOp, all: bool },
    SingleRow,
}

impl QueryPlanNode {
    pub fn boxed(self) -> Box<QueryPlanNode> {
        Box::new(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinSide {
    Left,
    Right,
}

pub fn outer_join_type_swap(join_type: JoinType) -> (JoinType, JoinSide) {
    match join_type {
        JoinType::Right => (JoinType::Left, JoinSide::Right),
        other => (other, JoinSide::Left),
    }
}
