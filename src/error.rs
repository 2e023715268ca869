use thiserror::Error;

/// Sub-kinds of a deferred or immediate constraint failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintKind {
    DropColumnViolation,
    DropTableViolation,
    UniqueViolation,
    CheckViolation,
    ForeignKeyViolation,
    DeferredUniqueViolation,
    DeferredForeignKeyViolation,
    DeferredCheckViolation,
}

impl std::fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConstraintKind::DropColumnViolation => "DROP_COLUMN_VIOLATION",
            ConstraintKind::DropTableViolation => "DROP_TABLE_VIOLATION",
            ConstraintKind::UniqueViolation => "UNIQUE_VIOLATION",
            ConstraintKind::CheckViolation => "CHECK_VIOLATION",
            ConstraintKind::ForeignKeyViolation => "FOREIGN_KEY_VIOLATION",
            ConstraintKind::DeferredUniqueViolation => "DEFERRED_UNIQUE_VIOLATION",
            ConstraintKind::DeferredForeignKeyViolation => "DEFERRED_FOREIGN_KEY_VIOLATION",
            ConstraintKind::DeferredCheckViolation => "DEFERRED_CHECK_VIOLATION",
        };
        write!(f, "{}", s)
    }
}

/// Sub-kinds of a transaction-layer failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionKind {
    Conflict,
    DirtySelect,
    Deadlock,
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransactionKind::Conflict => "CONFLICT",
            TransactionKind::DirtySelect => "DIRTY_SELECT",
            TransactionKind::Deadlock => "DEADLOCK",
        };
        write!(f, "{}", s)
    }
}

/// Engine-wide error taxonomy. Each kind maps to the SQL error code clients see
/// on the wire.
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    #[error("parse error: {message}")]
    ParseError { message: String },

    #[error("statement error: {message}")]
    StatementError { message: String },

    #[error("database error: {message}")]
    DatabaseError { message: String },

    #[error("access denied: {message}")]
    UserAccessError { message: String },

    #[error("constraint violation ({kind}): {message}")]
    ConstraintViolation { kind: ConstraintKind, message: String },

    #[error("transaction error ({kind}): {message}")]
    TransactionError { kind: TransactionKind, message: String },

    #[error("io error: {message}")]
    IoError { message: String },
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub fn parse_error(message: impl Into<String>) -> Self {
        EngineError::ParseError { message: message.into() }
    }

    pub fn statement_error(message: impl Into<String>) -> Self {
        EngineError::StatementError { message: message.into() }
    }

    pub fn database_error(message: impl Into<String>) -> Self {
        EngineError::DatabaseError { message: message.into() }
    }

    pub fn access_error(message: impl Into<String>) -> Self {
        EngineError::UserAccessError { message: message.into() }
    }

    pub fn constraint(kind: ConstraintKind, message: impl Into<String>) -> Self {
        EngineError::ConstraintViolation { kind, message: message.into() }
    }

    pub fn transaction(kind: TransactionKind, message: impl Into<String>) -> Self {
        EngineError::TransactionError { kind, message: message.into() }
    }

    pub fn io_error(message: impl Into<String>) -> Self {
        EngineError::IoError { message: message.into() }
    }

    pub fn table_not_found(name: impl Into<String>) -> Self {
        EngineError::DatabaseError { message: format!("table '{}' not found", name.into()) }
    }

    pub fn column_not_found(name: impl Into<String>) -> Self {
        EngineError::StatementError { message: format!("column '{}' not found", name.into()) }
    }

    pub fn ambiguous(name: impl Into<String>) -> Self {
        EngineError::StatementError { message: format!("ambiguous reference '{}'", name.into()) }
    }

    /// SQL error code surfaced to the wire protocol's EXCEPTION response.
    pub fn sql_code(&self) -> i32 {
        match self {
            EngineError::ParseError { .. } => 35,
            EngineError::StatementError { .. } => 1,
            EngineError::DatabaseError { .. } => 1,
            EngineError::UserAccessError { .. } => 1,
            EngineError::ConstraintViolation { .. } => 1,
            EngineError::TransactionError { kind, .. } => {
                200 + match kind {
                    TransactionKind::Conflict => 1,
                    TransactionKind::DirtySelect => 2,
                    TransactionKind::Deadlock => 3,
                }
            }
            EngineError::IoError { .. } => -1,
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::io_error(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sql_codes_match_taxonomy() {
        assert_eq!(EngineError::parse_error("x").sql_code(), 35);
        assert_eq!(EngineError::statement_error("x").sql_code(), 1);
        assert_eq!(
            EngineError::transaction(TransactionKind::Deadlock, "x").sql_code(),
            203
        );
    }

    #[test]
    fn constraint_kind_displays_upper_snake() {
        let e = EngineError::constraint(ConstraintKind::DropColumnViolation, "a referenced by fk");
        assert!(e.to_string().contains("DROP_COLUMN_VIOLATION"));
    }
}
