use super::expression_plan::{classify, ExpressionPlan, PredicateClass};
use super::QueryPlanNode;
use crate::catalog::Schema;
use crate::error::{EngineError, EngineResult};
use crate::expr::lower::lower_ast_expr;
use crate::expr::variable::Variable;
use crate::expr::{ExprElement, Expression};
use crate::fromset::{FromTable, TableExpressionFromSet};
use crate::parser::ast::{self, CompositeOp, FromItem, OrderDirection, SelectColumn, SelectStatement};
use crate::types::Value;
use std::sync::Arc;

/// One planned SELECT column: its internal (post-rename) name and the
/// expression computing it. Simple columns are a single qualified variable;
/// complex ones get a synthetic `FUNCTIONTABLE.n` name (spec §4.D step 1).
pub struct PlannedColumn {
    pub internal_name: String,
    pub output_name: String,
    pub expr: Expression,
    pub is_function: bool,
}

pub struct Plan {
    pub root: QueryPlanNode,
    pub columns: Vec<PlannedColumn>,
}

struct PlannerState {
    next_synthetic: u64,
    next_cache_id: u64,
}

impl PlannerState {
    fn new() -> Self {
        PlannerState { next_synthetic: 0, next_cache_id: 0 }
    }

    fn synthetic_name(&mut self, suffix: &str) -> String {
        let n = self.next_synthetic;
        self.next_synthetic += 1;
        format!("FUNCTIONTABLE.{}{}", n, suffix)
    }

    fn cache_id(&mut self) -> u64 {
        let id = self.next_cache_id;
        self.next_cache_id += 1;
        id
    }
}

/// Builds the from-set for a `SelectStatement`, recursing into sub-query
/// sources and wiring each nested from-set's parent (spec §4.B construction).
pub fn build_from_set(select: &SelectStatement, schema: &Schema, parent: Option<Arc<TableExpressionFromSet>>) -> EngineResult<TableExpressionFromSet> {
    let mut sources = Vec::new();
    if let Some(from) = &select.from {
        sources.push(from_item_to_table(&from.table, schema)?);
        for join in &from.joins {
            sources.push(from_item_to_table(&join.table, schema)?);
        }
    }
    Ok(TableExpressionFromSet::new(sources, parent))
}

fn from_item_to_table(item: &FromItem, schema: &Schema) -> EngineResult<FromTable> {
    match item {
        FromItem::Table { name, alias } => {
            let def = schema.get_table(name).ok_or_else(|| EngineError::table_not_found(name.clone()))?.clone();
            Ok(FromTable::direct(def, alias.clone()))
        }
        FromItem::SubQuery { query, alias } => Ok(FromTable::sub_query((**query).clone(), alias.clone())),
    }
}

/// Plans a prepared `SelectStatement` into a `QueryPlanNode` tree, implementing
/// spec §4.D's twelve-step algorithm. Sub-query sources are planned flat (as a
/// `SingleRow` seed wrapped in their own recursive plan by the caller); this
/// function handles one `TableSelectExpression` level at a time.
pub fn plan_select(select: &SelectStatement, schema: &Schema, from_set: &TableExpressionFromSet) -> EngineResult<Plan> {
    let mut state = PlannerState::new();

    // Step 1: column set.
    let mut columns = Vec::new();
    for col in &select.columns {
        match col {
            SelectColumn::Wildcard => {
                for v in from_set.expose_all() {
                    columns.push(PlannedColumn { internal_name: v.display_name(), output_name: v.column.clone(), expr: Expression::variable(v), is_function: false });
                }
            }
            SelectColumn::QualifiedWildcard(q) => {
                for v in from_set.expose_qualified(q)? {
                    columns.push(PlannedColumn { internal_name: v.display_name(), output_name: v.column.clone(), expr: Expression::variable(v), is_function: false });
                }
            }
            SelectColumn::Expression { expr, alias } => {
                let mut lowered = lower_ast_expr(expr)?;
                prepare_and_plan(&mut lowered, schema, from_set, &mut state)?;
                if let Some(v) = lowered.as_single_variable() {
                    let output = alias.clone().unwrap_or_else(|| v.column.clone());
                    columns.push(PlannedColumn { internal_name: v.display_name(), output_name: output, expr: lowered, is_function: false });
                } else {
                    let suffix = if lowered.is_aggregate() { "_A" } else { "" };
                    let name = state.synthetic_name(suffix);
                    let output = alias.clone().unwrap_or_else(|| name.clone());
                    columns.push(PlannedColumn { internal_name: name, output_name: output, expr: lowered, is_function: true });
                }
            }
        }
    }

    // Step 3: per-source planning.
    let mut source_plans: Vec<QueryPlanNode> = from_set.sources.iter().map(|s| s.initial_plan()).collect();

    // Step 4: join preparation. Inner joins push their ON expr into WHERE;
    // everything else is folded pairwise left-to-right as an outer join.
    let mut where_expr = select.where_clause.as_ref().map(lower_ast_expr).transpose()?;
    if let Some(where_e) = &mut where_expr {
        prepare_and_plan(where_e, schema, from_set, &mut state)?;
    }

    if let Some(from) = &select.from {
        for (i, join) in from.joins.iter().enumerate() {
            let right_idx = i + 1;
            let on_expr = match &join.condition {
                Some(e) => {
                    let mut lowered = lower_ast_expr(e)?;
                    prepare_and_plan(&mut lowered, schema, from_set, &mut state)?;
                    lowered
                }
                None => Expression::literal(crate::types::Value::Boolean(true)),
            };
            if matches!(join.join_type, ast::JoinType::Inner) {
                where_expr = Some(match where_expr.take() {
                    Some(w) => Expression::join(w, on_expr, ast::BinaryOperator::And),
                    None => on_expr,
                });
            } else {
                let left = source_plans[right_idx - 1].clone();
                let right = source_plans[right_idx].clone();
                let merged = QueryPlanNode::LeftOuterJoin { left: left.boxed(), right: right.boxed(), predicate: on_expr };
                source_plans[right_idx] = merged;
            }
        }
    }

    // Steps 7-8: WHERE decomposition, cheapest-first ordering, and source
    // merging. Single-source conjuncts push down onto that source's own plan
    // before any join happens; a conjunct spanning two or more sources merges
    // exactly those sources together via a real `Join` using the predicate as
    // the join condition, instead of a blind product of every source.
    let mut root = if let Some(where_e) = where_expr {
        let normalized = where_e.normalize();
        let conjuncts = flatten_conjuncts(&normalized);
        let mut plans: Vec<_> = conjuncts
            .iter()
            .map(|c| {
                classify(c, |v| {
                    v.table.as_ref().and_then(|t| from_set.sources.iter().position(|s| s.matches_name(t)))
                })
            })
            .collect();
        plans.sort_by(|a, b| a.score().partial_cmp(&b.score()).unwrap_or(std::cmp::Ordering::Equal));

        let mut slots: Vec<Option<QueryPlanNode>> = source_plans.into_iter().map(Some).collect();
        let mut owner: Vec<usize> = (0..slots.len()).collect();
        let mut deferred: Vec<ExpressionPlan> = Vec::new();

        for p in &plans {
            merge_predicate(p, &mut slots, &mut owner, &mut deferred);
        }

        let mut merged = slots.into_iter().flatten().reduce(|l, r| QueryPlanNode::NaturalJoin { left: l.boxed(), right: r.boxed() }).unwrap_or(QueryPlanNode::SingleRow);
        for p in &deferred {
            merged = inject_predicate(merged, p);
        }
        merged
    } else {
        source_plans.into_iter().reduce(|l, r| QueryPlanNode::NaturalJoin { left: l.boxed(), right: r.boxed() }).unwrap_or(QueryPlanNode::SingleRow)
    };

    // Step 9: grouping / simple functions.
    let has_aggregates = columns.iter().any(|c| c.expr.is_aggregate());
    let group_by_vars: Vec<Variable> = match &select.group_by {
        Some(exprs) => {
            let mut vars = Vec::new();
            for e in exprs {
                let mut lowered = lower_ast_expr(e)?;
                prepare_and_plan(&mut lowered, schema, from_set, &mut state)?;
                if let Some(v) = lowered.as_single_variable() {
                    vars.push(v.clone());
                } else {
                    vars.push(Variable::unqualified(state.synthetic_name("")));
                }
            }
            vars
        }
        None => Vec::new(),
    };

    if has_aggregates || !group_by_vars.is_empty() {
        let aggregates: Vec<(String, Expression)> = columns.iter().filter(|c| c.is_function).map(|c| (c.internal_name.clone(), c.expr.clone())).collect();
        root = QueryPlanNode::Group { input: root.boxed(), group_by: group_by_vars, group_max: None, aggregates };
    } else {
        let functions: Vec<(String, Expression)> = columns.iter().filter(|c| c.is_function).map(|c| (c.internal_name.clone(), c.expr.clone())).collect();
        if !functions.is_empty() {
            root = QueryPlanNode::CreateFunctions { input: root.boxed(), functions };
        }
    }

    // Step 10: HAVING as a second WHERE over the grouped table.
    if let Some(having) = &select.having {
        let mut lowered = lower_ast_expr(having)?;
        prepare_and_plan(&mut lowered, schema, from_set, &mut state)?;
        let normalized = lowered.normalize();
        root = QueryPlanNode::ExhaustiveSelect { input: root.boxed(), predicate: normalized };
    }

    // Step 11: composite.
    if let Some(composite) = &select.composite {
        let right_from_set = build_from_set(&composite.next, schema, from_set.parent.clone())?;
        let right_plan = plan_select(&composite.next, schema, &right_from_set)?;
        root = QueryPlanNode::Composite { left: root.boxed(), right: right_plan.root.boxed(), op: composite.op, all: composite.all };
    }

    // Step 12: DISTINCT, ORDER BY, final subset.
    if select.distinct {
        root = QueryPlanNode::Distinct { input: root.boxed() };
    }

    if let Some(order_by) = &select.order_by {
        root = plan_order_by(root, order_by, &columns, schema, from_set, &mut state)?;
    }

    let subset_columns: Vec<(String, String)> = columns.iter().map(|c| (c.internal_name.clone(), c.output_name.clone())).collect();
    if !subset_columns.is_empty() {
        root = QueryPlanNode::Subset { input: root.boxed(), columns: subset_columns };
    }

    Ok(Plan { root, columns })
}

fn flatten_conjuncts(expr: &Expression) -> Vec<Expression> {
    if let Some(ast::BinaryOperator::And) = expr.last_operator() {
        if let Ok((l, r, _)) = expr.split() {
            let mut out = flatten_conjuncts(&l);
            out.extend(flatten_conjuncts(&r));
            return out;
        }
    }
    vec![expr.clone()]
}

/// Runs the from-set's name-resolution pass, then recursively plans any
/// sub-query the expression still carries (spec §4.D step 5): each embedded
/// `SubQuery` is compiled into its own plan tree and wrapped in a
/// `CachePoint` so a correlated sub-query re-evaluated per outer row still
/// only plans once, and a non-correlated one evaluates at most once total.
fn prepare_and_plan(expr: &mut Expression, schema: &Schema, from_set: &TableExpressionFromSet, state: &mut PlannerState) -> EngineResult<()> {
    from_set.prepare_expression(expr)?;
    plan_subqueries(expr, schema, from_set, state)
}

fn plan_subqueries(expr: &mut Expression, schema: &Schema, from_set: &TableExpressionFromSet, state: &mut PlannerState) -> EngineResult<()> {
    if !expr.elements().iter().any(|e| matches!(e, ExprElement::SubQuery(_))) {
        return Ok(());
    }
    let parent = Arc::new(from_set.clone());
    expr.walk_prepare(
        |el| matches!(el, ExprElement::SubQuery(_)),
        |el| {
            let ExprElement::SubQuery(select) = el else { unreachable!() };
            let inner_from_set = build_from_set(select, schema, Some(parent.clone()))?;
            let inner_plan = plan_select(select, schema, &inner_from_set)?;
            let cache_id = state.cache_id();
            let cached = QueryPlanNode::CachePoint { inner: inner_plan.root.boxed(), cache_id };
            Ok(ExprElement::PlanNode(cached.boxed()))
        },
    )
}

/// Extracts the literal pattern and negation out of a `LIKE`/`NOT LIKE`
/// conjunct shaped `variable LIKE 'pattern'`, so `SimplePatternSelect` can
/// filter directly instead of re-evaluating the whole expression per row.
/// Returns `None` for anything not in that exact shape (e.g. a pattern built
/// from a function call), which falls back to an `ExhaustiveSelect`.
fn extract_like_pattern(expr: &Expression) -> Option<(Variable, String, bool)> {
    let negated = match expr.last_operator()? {
        ast::BinaryOperator::Like => false,
        ast::BinaryOperator::NotLike => true,
        _ => return None,
    };
    let (left, right, _) = expr.split().ok()?;
    let variable = left.as_single_variable()?.clone();
    match right.elements() {
        [ExprElement::Value(Value::Text(pattern))] => Some((variable, pattern.clone(), negated)),
        _ => None,
    }
}

fn inject_predicate(input: QueryPlanNode, plan: &ExpressionPlan) -> QueryPlanNode {
    match plan.class {
        PredicateClass::Constant => QueryPlanNode::ConstantSelect { input: input.boxed(), predicate: plan.predicate.clone() },
        PredicateClass::SingleVariableSimple
        | PredicateClass::SingleVariableComplex
        | PredicateClass::MultiVariableBothSimple
        | PredicateClass::MultiVariableOneSimple
        | PredicateClass::MultiVariableNoSimple => QueryPlanNode::SimpleSelect { input: input.boxed(), index: None, predicate: plan.predicate.clone() },
        PredicateClass::SimplePattern | PredicateClass::PatternComplexSide => match extract_like_pattern(&plan.predicate) {
            Some((variable, pattern, negated)) => QueryPlanNode::SimplePatternSelect { input: input.boxed(), variable, pattern, negated },
            None => QueryPlanNode::ExhaustiveSelect { input: input.boxed(), predicate: plan.predicate.clone() },
        },
        PredicateClass::SingleVariableSubQuery | PredicateClass::SimpleSubQueryNonCorrelated => {
            QueryPlanNode::NonCorrelatedAnyAll { input: input.boxed(), predicate: plan.predicate.clone() }
        }
        PredicateClass::ExhaustiveOrCorrelated => QueryPlanNode::ExhaustiveSelect { input: input.boxed(), predicate: plan.predicate.clone() },
        PredicateClass::OrSubLogicCommonTable | PredicateClass::OrSubLogicCrossTable => {
            QueryPlanNode::LogicalUnion { left: input.clone().boxed(), right: input.boxed() }
        }
    }
}

/// Union-find lookup with path compression: every original source index maps
/// to the slot currently holding the (possibly already-merged) plan it lives
/// in.
fn find_owner(owner: &mut [usize], i: usize) -> usize {
    if owner[i] != i {
        let root = find_owner(owner, owner[i]);
        owner[i] = root;
    }
    owner[i]
}

/// Applies one classified WHERE conjunct to the per-source slots (spec §4.D
/// step 8). A predicate naming exactly one still-distinct source pushes down
/// onto that source's own plan. A predicate naming two or more merges those
/// sources into one slot via a real `Join` using the predicate as the join
/// condition, rather than leaving them to a later blind natural join. A
/// predicate naming none of the from-set's sources (OR-branch logic, or a
/// correlated comparison against an outer row) is deferred to run against
/// the fully assembled plan instead.
fn merge_predicate(plan: &ExpressionPlan, slots: &mut [Option<QueryPlanNode>], owner: &mut [usize], deferred: &mut Vec<ExpressionPlan>) {
    if matches!(plan.class, PredicateClass::OrSubLogicCommonTable | PredicateClass::OrSubLogicCrossTable) {
        deferred.push(plan.clone());
        return;
    }

    let mut owners: Vec<usize> = plan.source_indices.iter().map(|&s| find_owner(owner, s)).collect();
    owners.sort_unstable();
    owners.dedup();

    match owners.len() {
        0 => deferred.push(plan.clone()),
        1 => {
            let idx = owners[0];
            if let Some(existing) = slots[idx].take() {
                slots[idx] = Some(inject_predicate(existing, plan));
            }
        }
        _ => {
            let mut rest = owners.into_iter();
            let first = rest.next().expect("checked len >= 2");
            let Some(mut merged) = slots[first].take() else { return };
            for idx in rest {
                let Some(right) = slots[idx].take() else { continue };
                merged = QueryPlanNode::Join { left: merged.boxed(), right: right.boxed(), predicate: plan.predicate.clone() };
                owner[idx] = first;
            }
            slots[first] = Some(merged);
        }
    }
}

fn plan_order_by(
    input: QueryPlanNode,
    order_by: &[ast::OrderByClause],
    columns: &[PlannedColumn],
    schema: &Schema,
    from_set: &TableExpressionFromSet,
    state: &mut PlannerState,
) -> EngineResult<QueryPlanNode> {
    let mut root = input;
    let mut keys = Vec::new();
    let mut functional = false;

    for item in order_by {
        // Step 2: numeric rewriting of `ORDER BY k`.
        if let ast::Expression::Literal(crate::types::Value::Integer(k)) = &item.expression {
            let idx = (*k - 1) as usize;
            if *k >= 1 && idx < columns.len() {
                if let Some(v) = columns[idx].expr.as_single_variable() {
                    keys.push((v.clone(), item.direction));
                    continue;
                }
                let name = Variable::unqualified(columns[idx].internal_name.clone());
                keys.push((name, item.direction));
                continue;
            }
            return Err(EngineError::statement_error(format!("ORDER BY position {} is out of range", k)));
        }

        let mut lowered = lower_ast_expr(&item.expression)?;
        prepare_and_plan(&mut lowered, schema, from_set, state)?;
        if let Some(v) = lowered.as_single_variable() {
            keys.push((v.clone(), item.direction));
        } else {
            functional = true;
            let name = state.synthetic_name("");
            root = QueryPlanNode::CreateFunctions { input: root.boxed(), functions: vec![(name.clone(), lowered)] };
            keys.push((Variable::unqualified(name), item.direction));
        }
    }

    root = QueryPlanNode::Sort { input: root.boxed(), keys };

    if functional {
        let subset: Vec<(String, String)> = columns.iter().map(|c| (c.internal_name.clone(), c.output_name.clone())).collect();
        root = QueryPlanNode::Subset { input: root.boxed(), columns: subset };
    }

    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, Schema, TableDef};
    use crate::parser::parse_sql;
    use crate::types::DataType;

    fn schema_with_t() -> Schema {
        let mut s = Schema::new("public");
        s.add_table(TableDef::new("t", vec![Column::new("a", DataType::Integer, true), Column::new("b", DataType::Integer, true)])).unwrap();
        s
    }

    fn select(sql: &str) -> ast::SelectStatement {
        match parse_sql(sql).unwrap() {
            ast::Statement::Select(s) => s,
            _ => panic!("expected select"),
        }
    }

    #[test]
    fn plans_simple_where_select() {
        let schema = schema_with_t();
        let stmt = select("SELECT a, b FROM t WHERE a = 1");
        let from_set = build_from_set(&stmt, &schema, None).unwrap();
        let plan = plan_select(&stmt, &schema, &from_set).unwrap();
        assert_eq!(plan.columns.len(), 2);
        assert!(matches!(plan.root, QueryPlanNode::Subset { .. }));
    }

    #[test]
    fn order_by_ordinal_rewrites_to_column() {
        let schema = schema_with_t();
        let stmt = select("SELECT a, b FROM t ORDER BY 2");
        let from_set = build_from_set(&stmt, &schema, None).unwrap();
        let plan = plan_select(&stmt, &schema, &from_set).unwrap();
        assert!(matches!(plan.root, QueryPlanNode::Subset { .. }));
    }
}
