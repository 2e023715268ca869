/// Registry of known SQL functions, distinguishing aggregates (used by
/// `Expression::is_aggregate` and by GROUP BY/HAVING planning) from scalar
/// functions.
pub struct FunctionRegistry;

const AGGREGATE_NAMES: &[&str] = &["COUNT", "SUM", "AVG", "MIN", "MAX"];

impl FunctionRegistry {
    pub fn is_aggregate(name: &str) -> bool {
        AGGREGATE_NAMES.iter().any(|n| n.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunction {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "COUNT" => Some(AggregateFunction::Count),
            "SUM" => Some(AggregateFunction::Sum),
            "AVG" => Some(AggregateFunction::Avg),
            "MIN" => Some(AggregateFunction::Min),
            "MAX" => Some(AggregateFunction::Max),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_aggregates_case_insensitively() {
        assert!(FunctionRegistry::is_aggregate("count"));
        assert!(FunctionRegistry::is_aggregate("SUM"));
        assert!(!FunctionRegistry::is_aggregate("upper"));
    }
}
