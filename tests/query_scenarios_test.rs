use relcore::config::EngineConfig;
use relcore::engine::Engine;
use relcore::execute_embedded;
use relcore::session::SessionState;
use relcore::types::Value;

fn fresh() -> (Engine, SessionState) {
    (Engine::new(EngineConfig::default()), SessionState::new("public"))
}

fn seed_t(engine: &Engine, session: &mut SessionState) {
    execute_embedded(engine, session, "CREATE TABLE t (a INTEGER PRIMARY KEY, b VARCHAR(10))").unwrap();
    execute_embedded(engine, session, "INSERT INTO t VALUES (1, 'x'), (2, 'y')").unwrap();
}

#[test]
fn where_equality_returns_matching_row() {
    let (engine, mut session) = fresh();
    seed_t(&engine, &mut session);

    let result = execute_embedded(&engine, &mut session, "SELECT b FROM t WHERE a = 2").unwrap();

    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0].values, vec![Value::Text("y".into())]);
}

#[test]
fn in_subquery_plans_a_cache_pointed_non_correlated_any_all() {
    use relcore::catalog::Schema;
    use relcore::plan::planner::{build_from_set, plan_select};
    use relcore::plan::QueryPlanNode;

    let (engine, mut session) = fresh();
    seed_t(&engine, &mut session);

    let result = execute_embedded(&engine, &mut session, "SELECT a FROM t WHERE a IN (SELECT a FROM t WHERE b = 'x')").unwrap();
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0].values, vec![Value::Integer(1)]);

    let mut schema = Schema::new("public");
    let t_def = engine.catalog.read().get_schema("public").unwrap().tables.get("t").unwrap().clone();
    schema.add_table(t_def).unwrap();
    let stmt = match relcore::parser::parse_sql("SELECT a FROM t WHERE a IN (SELECT a FROM t WHERE b = 'x')").unwrap() {
        relcore::parser::ast::Statement::Select(s) => s,
        _ => panic!("expected select"),
    };
    let from_set = build_from_set(&stmt, &schema, None).unwrap();
    let plan = plan_select(&stmt, &schema, &from_set).unwrap();

    fn contains_cache_pointed_any_all(node: &QueryPlanNode) -> bool {
        match node {
            QueryPlanNode::NonCorrelatedAnyAll { input, predicate } => {
                let wraps_cache_point = predicate.elements().iter().any(|el| {
                    matches!(el, relcore::expr::ExprElement::PlanNode(inner) if matches!(inner.as_ref(), QueryPlanNode::CachePoint { .. }))
                });
                wraps_cache_point || contains_cache_pointed_any_all(input)
            }
            QueryPlanNode::ConstantSelect { input, .. }
            | QueryPlanNode::SimpleSelect { input, .. }
            | QueryPlanNode::RangeSelect { input, .. }
            | QueryPlanNode::SimplePatternSelect { input, .. }
            | QueryPlanNode::ExhaustiveSelect { input, .. }
            | QueryPlanNode::CreateFunctions { input, .. }
            | QueryPlanNode::CachePoint { inner: input, .. }
            | QueryPlanNode::Marker { input, .. }
            | QueryPlanNode::Group { input, .. }
            | QueryPlanNode::Sort { input, .. }
            | QueryPlanNode::Distinct { input }
            | QueryPlanNode::Subset { input, .. } => contains_cache_pointed_any_all(input),
            QueryPlanNode::Join { left, right, .. }
            | QueryPlanNode::NaturalJoin { left, right }
            | QueryPlanNode::LeftOuterJoin { left, right, .. }
            | QueryPlanNode::LogicalUnion { left, right }
            | QueryPlanNode::Composite { left, right, .. } => contains_cache_pointed_any_all(left) || contains_cache_pointed_any_all(right),
            QueryPlanNode::TableFetch { .. } | QueryPlanNode::SingleRow => false,
        }
    }

    assert!(contains_cache_pointed_any_all(&plan.root), "expected a NonCorrelatedAnyAll wrapping a CachePoint somewhere in the plan");
}

#[test]
fn group_by_having_order_by_matches_pipeline_order() {
    let (engine, mut session) = fresh();
    seed_t(&engine, &mut session);

    let result = execute_embedded(
        &engine,
        &mut session,
        "SELECT a, COUNT(*) c FROM t GROUP BY a HAVING COUNT(*) >= 1 ORDER BY 2 DESC, a ASC",
    )
    .unwrap();

    let rows: Vec<(i64, i64)> = result
        .rows
        .iter()
        .map(|r| {
            let a = match &r.values[0] {
                Value::Integer(i) => *i,
                other => panic!("expected integer, got {:?}", other),
            };
            let c = match &r.values[1] {
                Value::Integer(i) => *i,
                other => panic!("expected integer, got {:?}", other),
            };
            (a, c)
        })
        .collect();

    assert_eq!(rows, vec![(1, 1), (2, 1)]);
}

#[test]
fn like_pattern_filters_by_prefix_and_not_like_inverts() {
    let (engine, mut session) = fresh();
    execute_embedded(&engine, &mut session, "CREATE TABLE words (id INTEGER PRIMARY KEY, w TEXT)").unwrap();
    execute_embedded(&engine, &mut session, "INSERT INTO words VALUES (1, 'Apple'), (2, 'Banana'), (3, 'Apricot')").unwrap();

    let matches = execute_embedded(&engine, &mut session, "SELECT w FROM words WHERE w LIKE 'Ap%'").unwrap();
    let mut got: Vec<String> = matches.rows.iter().map(|r| match &r.values[0] {
        Value::Text(s) => s.clone(),
        other => panic!("expected text, got {:?}", other),
    }).collect();
    got.sort();
    assert_eq!(got, vec!["Apple".to_string(), "Apricot".to_string()]);

    let non_matches = execute_embedded(&engine, &mut session, "SELECT w FROM words WHERE w NOT LIKE 'Ap%'").unwrap();
    assert_eq!(non_matches.rows.len(), 1);
    assert_eq!(non_matches.rows[0].values, vec![Value::Text("Banana".into())]);
}

#[test]
fn multi_variable_join_predicate_merges_only_its_sources() {
    let (engine, mut session) = fresh();
    execute_embedded(&engine, &mut session, "CREATE TABLE orders (id INTEGER PRIMARY KEY, customer_id INTEGER)").unwrap();
    execute_embedded(&engine, &mut session, "CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT)").unwrap();
    execute_embedded(&engine, &mut session, "INSERT INTO customers VALUES (1, 'ann'), (2, 'bo')").unwrap();
    execute_embedded(&engine, &mut session, "INSERT INTO orders VALUES (10, 1), (11, 2), (12, 1)").unwrap();

    let result = execute_embedded(
        &engine,
        &mut session,
        "SELECT orders.id, customers.name FROM orders, customers WHERE orders.customer_id = customers.id AND customers.name = 'ann'",
    )
    .unwrap();

    let mut ids: Vec<i64> = result
        .rows
        .iter()
        .map(|r| match &r.values[0] {
            Value::Integer(i) => *i,
            other => panic!("expected integer, got {:?}", other),
        })
        .collect();
    ids.sort();
    assert_eq!(ids, vec![10, 12]);
}
