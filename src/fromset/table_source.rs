use crate::catalog::TableDef;
use crate::expr::variable::Variable;
use crate::parser::ast::{JoinType, SelectStatement};
use crate::plan::QueryPlanNode;

/// One FROM-clause entry, the spec's `FromTable`: either a base table or a
/// nested sub-query, each with the alias it's exposed as.
#[derive(Debug, Clone)]
pub enum FromTable {
    Direct { def: TableDef, alias: Option<String> },
    SubQuery { query: Box<SelectStatement>, alias: String },
}

/// The join relationship recorded between two adjacent `PlanTableSource`s
/// during from-set construction, consumed by the planner's join-preparation
/// step (spec §4.D step 4).
#[derive(Debug, Clone)]
pub struct JoinNeighborLink {
    pub join_type: JoinType,
    pub on_expr: crate::expr::Expression,
}

impl FromTable {
    pub fn direct(def: TableDef, alias: Option<String>) -> Self {
        FromTable::Direct { def, alias }
    }

    pub fn sub_query(query: SelectStatement, alias: impl Into<String>) -> Self {
        FromTable::SubQuery { query: Box::new(query), alias: alias.into() }
    }

    /// The unique name this source is addressed by: the alias if given, else
    /// the base table's own name.
    pub fn unique_name(&self) -> &str {
        match self {
            FromTable::Direct { def, alias } => alias.as_deref().unwrap_or(&def.name),
            FromTable::SubQuery { alias, .. } => alias,
        }
    }

    pub fn matches_name(&self, qualifier: &str) -> bool {
        self.unique_name().eq_ignore_ascii_case(qualifier)
    }

    pub fn exposed_columns(&self) -> Vec<Variable> {
        match self {
            FromTable::Direct { def, .. } => {
                def.columns.iter().map(|c| Variable::qualified(self.unique_name(), c.name.clone())).collect()
            }
            FromTable::SubQuery { query, .. } => {
                use crate::parser::ast::SelectColumn;
                query
                    .columns
                    .iter()
                    .filter_map(|col| match col {
                        SelectColumn::Expression { alias: Some(a), .. } => Some(Variable::qualified(self.unique_name(), a.clone())),
                        SelectColumn::Expression { expr: crate::parser::ast::Expression::Column(c), alias: None } => {
                            Some(Variable::qualified(self.unique_name(), c.clone()))
                        }
                        _ => None,
                    })
                    .collect()
            }
        }
    }

    /// Reports every column on this source matching `name`: zero, one, or many.
    pub fn resolve(&self, name: &Variable) -> Vec<Variable> {
        if let Some(t) = &name.table {
            if !self.matches_name(t) {
                return Vec::new();
            }
        }
        self.exposed_columns().into_iter().filter(|v| v.column.eq_ignore_ascii_case(&name.column)).collect()
    }

    /// The fetch-rooted plan node this source starts from before WHERE/join
    /// predicates are pushed onto it (spec §4.D step 3).
    pub fn initial_plan(&self) -> QueryPlanNode {
        match self {
            FromTable::Direct { def, alias } => QueryPlanNode::TableFetch { table: def.name.clone(), alias: alias.clone() },
            FromTable::SubQuery { .. } => QueryPlanNode::SingleRow,
        }
    }
}

/// Tracks the join-neighbor links attached to one `PlanTableSource` during
/// planning (spec §9 design note: index-based, not a shared reference, so the
/// set of sources can live in a plain `Vec` without aliasing).
#[derive(Debug, Clone, Default)]
pub struct PlanTableSource {
    pub source_index: usize,
    pub plan: Option<QueryPlanNode>,
    pub left_link: Option<(usize, JoinNeighborLink)>,
    pub right_link: Option<(usize, JoinNeighborLink)>,
}

impl PlanTableSource {
    pub fn new(source_index: usize, plan: QueryPlanNode) -> Self {
        PlanTableSource { source_index, plan: Some(plan), left_link: None, right_link: None }
    }
}
