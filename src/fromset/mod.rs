pub mod table_source;

pub use table_source::FromTable;

use crate::error::{EngineError, EngineResult};
use crate::expr::variable::{CorrelatedVariable, Variable};
use crate::expr::{ExprElement, Expression};
use std::sync::Arc;

/// One SELECT-list output column exposed by a from-set, keyed by name for
/// local/global resolution.
#[derive(Debug, Clone)]
pub struct ExposedColumn {
    pub variable: Variable,
}

/// A function alias introduced by the SELECT list (e.g. `SELECT a+1 AS total`)
/// resolved by column name only, never table-qualified (spec §4.B).
#[derive(Debug, Clone)]
pub struct FunctionAlias {
    pub alias: String,
    pub variable: Variable,
}

/// The from-set for one (possibly nested) `TableSelectExpression`: the set of
/// table sources visible to WHERE/GROUP BY/HAVING/ORDER BY within one query
/// block, plus a link to the enclosing block for correlated resolution.
#[derive(Clone)]
pub struct TableExpressionFromSet {
    pub sources: Vec<FromTable>,
    pub function_aliases: Vec<FunctionAlias>,
    pub parent: Option<Arc<TableExpressionFromSet>>,
}

impl TableExpressionFromSet {
    pub fn new(sources: Vec<FromTable>, parent: Option<Arc<TableExpressionFromSet>>) -> Self {
        TableExpressionFromSet { sources, function_aliases: Vec::new(), parent }
    }

    pub fn add_function_alias(&mut self, alias: impl Into<String>, variable: Variable) {
        self.function_aliases.push(FunctionAlias { alias: alias.into(), variable });
    }

    /// Exposes every column of every source in order, for an unqualified `*`.
    pub fn expose_all(&self) -> Vec<Variable> {
        self.sources.iter().flat_map(|s| s.exposed_columns()).collect()
    }

    /// Exposes every column of the one source whose unique name matches `qualifier`.
    pub fn expose_qualified(&self, qualifier: &str) -> EngineResult<Vec<Variable>> {
        let matches: Vec<_> = self.sources.iter().filter(|s| s.matches_name(qualifier)).collect();
        match matches.len() {
            0 => Err(EngineError::table_not_found(qualifier)),
            1 => Ok(matches[0].exposed_columns()),
            _ => Err(EngineError::ambiguous(qualifier)),
        }
    }

    /// Local resolution of a bare or qualified column name within this from-set only.
    pub fn resolve_local(&self, name: &Variable) -> EngineResult<Option<Variable>> {
        let mut found: Option<Variable> = None;

        if !name.is_qualified() {
            let alias_matches: Vec<_> = self.function_aliases.iter().filter(|f| f.alias.eq_ignore_ascii_case(&name.column)).collect();
            match alias_matches.len() {
                0 => {}
                1 => return Ok(Some(alias_matches[0].variable.clone())),
                _ => return Err(EngineError::ambiguous(&name.column)),
            }
        }

        let mut table_matches = 0;
        for source in &self.sources {
            let matches = source.resolve(name);
            match matches.len() {
                0 => {}
                1 => {
                    table_matches += 1;
                    found = Some(matches[0].clone());
                }
                _ => return Err(EngineError::ambiguous(name.display_name())),
            }
            if table_matches > 1 {
                return Err(EngineError::ambiguous(name.display_name()));
            }
        }

        if table_matches > 1 {
            // Unreachable: the per-source `> 1` check above already raises
            // ambiguity before the running total can exceed one, mirroring
            // the legacy resolver's own "negative total matches" guard.
            unreachable!("from-set resolver counted more than one unambiguous match")
        }

        Ok(found)
    }

    /// Walks parents for correlated resolution, wrapping the result in a
    /// `CorrelatedVariable` once it crosses into an enclosing from-set.
    pub fn resolve_global(&self, name: &Variable) -> EngineResult<ResolvedName> {
        self.resolve_global_at_level(name, 0)
    }

    fn resolve_global_at_level(&self, name: &Variable, level: u32) -> EngineResult<ResolvedName> {
        if let Some(v) = self.resolve_local(name)? {
            return Ok(if level == 0 { ResolvedName::Local(v) } else { ResolvedName::Correlated(CorrelatedVariable::new(v, level)) });
        }
        if let Some(parent) = &self.parent {
            return parent.resolve_global_at_level(name, level + 1);
        }
        Err(EngineError::statement_error(format!("reference '{}' not found", name.display_name())))
    }

    /// Rewrites every `Variable` element of `expr` to its canonical resolved
    /// form (local or correlated), the "qualifier transform" used by every
    /// clause that binds names against this from-set.
    pub fn prepare_expression(&self, expr: &mut Expression) -> EngineResult<()> {
        expr.walk_prepare(
            |el| matches!(el, ExprElement::Variable(_)),
            |el| {
                let ExprElement::Variable(v) = el else { unreachable!() };
                match self.resolve_global(v)? {
                    ResolvedName::Local(resolved) => Ok(ExprElement::Variable(resolved)),
                    ResolvedName::Correlated(cv) => Ok(ExprElement::CorrelatedVariable(cv)),
                }
            },
        )
    }
}

pub enum ResolvedName {
    Local(Variable),
    Correlated(CorrelatedVariable),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, TableDef};
    use crate::types::DataType;

    fn from_set() -> TableExpressionFromSet {
        let t = TableDef::new("t", vec![Column::new("a", DataType::Integer, true), Column::new("b", DataType::Integer, true)]);
        TableExpressionFromSet::new(vec![FromTable::direct(t, None)], None)
    }

    #[test]
    fn resolves_unqualified_column() {
        let fs = from_set();
        let resolved = fs.resolve_local(&Variable::unqualified("a")).unwrap().unwrap();
        assert_eq!(resolved.table.as_deref(), Some("t"));
    }

    #[test]
    fn unknown_column_resolves_to_none_locally() {
        let fs = from_set();
        assert!(fs.resolve_local(&Variable::unqualified("z")).unwrap().is_none());
    }

    #[test]
    fn global_resolution_wraps_parent_hit_as_correlated() {
        let parent = std::sync::Arc::new(from_set());
        let child_table = TableDef::new("u", vec![Column::new("c", DataType::Integer, true)]);
        let child = TableExpressionFromSet::new(vec![FromTable::direct(child_table, None)], Some(parent));
        match child.resolve_global(&Variable::unqualified("a")).unwrap() {
            ResolvedName::Correlated(cv) => assert_eq!(cv.level, 1),
            ResolvedName::Local(_) => panic!("expected correlated resolution"),
        }
    }
}
