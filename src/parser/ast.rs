use crate::types::{DataType, Value};

/// Top-level statement tree produced by the parser. The core treats this as
/// an opaque property bag: it reads fields but never mutates parser-supplied
/// data in place (mutation happens on the core's own lowered representation,
/// see `crate::expr`).
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(SelectStatement),
    Insert(InsertStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
    CreateTable(CreateTableStatement),
    DropTable(DropTableStatement),
    AlterTable(AlterTableStatement),
    CreateIndex(CreateIndexStatement),
    DropIndex(DropIndexStatement),
    Set(SetStatement),
    CompleteTransaction(TransactionControl),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransactionControl {
    Begin,
    Commit,
    Rollback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetStatement {
    pub name: String,
    pub value: Expression,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectStatement {
    pub distinct: bool,
    pub columns: Vec<SelectColumn>,
    pub from: Option<FromClause>,
    pub where_clause: Option<Expression>,
    pub group_by: Option<Vec<Expression>>,
    pub having: Option<Expression>,
    pub order_by: Option<Vec<OrderByClause>>,
    pub limit: Option<LimitClause>,
    /// UNION/INTERSECT/EXCEPT chained onto this select, per spec §3
    /// TableSelectExpression's composite link.
    pub composite: Option<Box<CompositeSelect>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompositeSelect {
    pub op: CompositeOp,
    pub all: bool,
    pub next: SelectStatement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeOp {
    Union,
    Intersect,
    Except,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectColumn {
    Wildcard,
    QualifiedWildcard(String),
    Expression { expr: Expression, alias: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FromClause {
    pub table: FromItem,
    pub joins: Vec<JoinClause>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FromItem {
    Table { name: String, alias: Option<String> },
    SubQuery { query: Box<SelectStatement>, alias: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub join_type: JoinType,
    pub table: FromItem,
    pub condition: Option<Expression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByClause {
    pub expression: Expression,
    pub direction: OrderDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LimitClause {
    pub count: u64,
    pub offset: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InsertSource {
    Values(Vec<Vec<Expression>>),
    Select(Box<SelectStatement>),
    Set(Vec<Assignment>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub table: String,
    pub columns: Option<Vec<String>>,
    pub source: InsertSource,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub table: String,
    pub assignments: Vec<Assignment>,
    pub where_clause: Option<Expression>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: String,
    pub value: Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    pub table: String,
    pub where_clause: Option<Expression>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableStatement {
    pub table_name: String,
    pub if_not_exists: bool,
    pub columns: Vec<ColumnDefinition>,
    pub constraints: Vec<TableConstraint>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: DataType,
    pub constraints: Vec<ColumnConstraint>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnConstraint {
    NotNull,
    PrimaryKey,
    Unique,
    Default(Value),
    ForeignKey { table: String, column: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableConstraint {
    PrimaryKey(Vec<String>),
    Unique(Vec<String>),
    ForeignKey {
        columns: Vec<String>,
        foreign_table: String,
        foreign_columns: Vec<String>,
    },
    Check(Expression),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropTableStatement {
    pub table_name: String,
    pub if_exists: bool,
}

/// The two ALTER TABLE shapes named in spec §4.C: a legacy "replace whole
/// definition" form and an explicit-actions form.
#[derive(Debug, Clone, PartialEq)]
pub enum AlterTableStatement {
    Legacy(CreateTableStatement),
    Actions { table_name: String, actions: Vec<AlterAction> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum AlterAction {
    AlterSetDefault { column: String, default: Expression },
    DropDefault { column: String },
    DropColumn { column: String },
    AddColumn(ColumnDefinition),
    DropConstraint { name: String },
    DropConstraintPrimaryKey,
    AddConstraint(TableConstraint),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateIndexStatement {
    pub index_name: String,
    pub table_name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropIndexStatement {
    pub index_name: String,
    pub if_exists: bool,
}

/// Tree-shaped expression AST, the natural output of a recursive-descent
/// parser. The core lowers this into its own postfix `Expression`
/// (`crate::expr`) before planning; this tree is never mutated once produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Value),
    Column(String),
    QualifiedColumn { table: String, column: String },
    Wildcard,
    BinaryOp {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expression>,
    },
    Function {
        name: String,
        args: Vec<Expression>,
        distinct: bool,
    },
    Subquery(Box<SelectStatement>),
    In {
        expr: Box<Expression>,
        list: Vec<Expression>,
        negated: bool,
    },
    InSubquery {
        expr: Box<Expression>,
        query: Box<SelectStatement>,
        negated: bool,
    },
    Between {
        expr: Box<Expression>,
        low: Box<Expression>,
        high: Box<Expression>,
        negated: bool,
    },
    IsNull(Box<Expression>),
    IsNotNull(Box<Expression>),
    Placeholder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    And,
    Or,
    Like,
    NotLike,
    Concat,
}

impl BinaryOperator {
    /// The inverse comparison used by NOT-normalization (spec §4.A). Returns
    /// `None` for operators with no inversible counterpart (`AND`/`OR`/
    /// `LIKE`/arithmetic), which normalization instead wraps as `(expr) =
    /// false`.
    pub fn inverse(&self) -> Option<BinaryOperator> {
        use BinaryOperator::*;
        match self {
            Equal => Some(NotEqual),
            NotEqual => Some(Equal),
            LessThan => Some(GreaterThanOrEqual),
            GreaterThanOrEqual => Some(LessThan),
            GreaterThan => Some(LessThanOrEqual),
            LessThanOrEqual => Some(GreaterThan),
            _ => None,
        }
    }

    pub fn is_comparison(&self) -> bool {
        use BinaryOperator::*;
        matches!(self, Equal | NotEqual | LessThan | LessThanOrEqual | GreaterThan | GreaterThanOrEqual)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Plus,
    Minus,
    Not,
}
