use serde::{Deserialize, Serialize};

/// A qualified column reference: an optional (schema, table) pair plus a
/// column name. Resolution may rewrite a variable in place to its canonical
/// form (`set_in_place`); equality is structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Variable {
    pub schema: Option<String>,
    pub table: Option<String>,
    pub column: String,
}

impl Variable {
    pub fn unqualified(column: impl Into<String>) -> Self {
        Variable { schema: None, table: None, column: column.into() }
    }

    pub fn qualified(table: impl Into<String>, column: impl Into<String>) -> Self {
        Variable { schema: None, table: Some(table.into()), column: column.into() }
    }

    pub fn is_qualified(&self) -> bool {
        self.table.is_some()
    }

    /// Rewrites `self` to its resolved, canonical form in place. Because this
    /// takes `&mut self` rather than returning a new value, no caller can
    /// observe or depend on the pre-mutation identity (spec §9's concern
    /// about in-place `set(Variable)` calls does not apply here).
    pub fn set_in_place(&mut self, resolved: Variable) {
        *self = resolved;
    }

    pub fn display_name(&self) -> String {
        match (&self.table, &self.column) {
            (Some(t), c) => format!("{}.{}", t, c),
            (None, c) => c.clone(),
        }
    }
}

/// A variable plus a non-negative level indicating how many from-set parents
/// up to look for its binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelatedVariable {
    pub variable: Variable,
    pub level: u32,
}

impl CorrelatedVariable {
    pub fn new(variable: Variable, level: u32) -> Self {
        debug_assert!(level >= 1, "a correlated variable always references a strict ancestor");
        CorrelatedVariable { variable, level }
    }
}
