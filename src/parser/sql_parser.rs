use super::ast::*;
use super::lexer::{Lexer, Token};
use crate::error::{EngineError, EngineResult};
use crate::types::{DataType, Value};

/// Recursive-descent parser producing the statement tree the core consumes.
/// Parsing itself is outside the core's scope; this exists to drive the
/// executors and the test suite with real SQL text.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

pub fn parse_sql(sql: &str) -> EngineResult<Statement> {
    let tokens = Lexer::new(sql).tokenize()?;
    let mut parser = Parser { tokens, pos: 0 };
    parser.parse_statement()
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens.get(self.pos).cloned().unwrap_or(Token::Eof);
        self.pos += 1;
        t
    }

    fn check_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Token::Identifier(s) if s.eq_ignore_ascii_case(kw))
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if self.check_keyword(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, kw: &str) -> EngineResult<()> {
        if self.eat_keyword(kw) {
            Ok(())
        } else {
            Err(EngineError::parse_error(format!("expected keyword '{}', found {:?}", kw, self.peek())))
        }
    }

    fn expect_token(&mut self, tok: Token) -> EngineResult<()> {
        if *self.peek() == tok {
            self.advance();
            Ok(())
        } else {
            Err(EngineError::parse_error(format!("expected {:?}, found {:?}", tok, self.peek())))
        }
    }

    fn expect_identifier(&mut self) -> EngineResult<String> {
        match self.advance() {
            Token::Identifier(s) => Ok(s),
            Token::QuotedIdentifier(s) => Ok(s),
            other => Err(EngineError::parse_error(format!("expected identifier, found {:?}", other))),
        }
    }

    fn parse_statement(&mut self) -> EngineResult<Statement> {
        let stmt = if self.check_keyword("SELECT") {
            Statement::Select(self.parse_select()?)
        } else if self.check_keyword("INSERT") {
            Statement::Insert(self.parse_insert()?)
        } else if self.check_keyword("UPDATE") {
            Statement::Update(self.parse_update()?)
        } else if self.check_keyword("DELETE") {
            Statement::Delete(self.parse_delete()?)
        } else if self.check_keyword("CREATE") {
            self.parse_create()?
        } else if self.check_keyword("DROP") {
            self.parse_drop()?
        } else if self.check_keyword("ALTER") {
            Statement::AlterTable(self.parse_alter_table()?)
        } else if self.check_keyword("SET") {
            Statement::Set(self.parse_set()?)
        } else if self.check_keyword("BEGIN") {
            self.advance();
            Statement::CompleteTransaction(TransactionControl::Begin)
        } else if self.check_keyword("COMMIT") {
            self.advance();
            Statement::CompleteTransaction(TransactionControl::Commit)
        } else if self.check_keyword("ROLLBACK") {
            self.advance();
            Statement::CompleteTransaction(TransactionControl::Rollback)
        } else {
            return Err(EngineError::parse_error(format!("unexpected token {:?}", self.peek())));
        };
        if *self.peek() == Token::Semicolon {
            self.advance();
        }
        Ok(stmt)
    }

    /// Parses a `;`-separated batch of statements, as a client connection's
    /// QUERY command text may contain more than one.
    pub fn parse_statements(sql: &str) -> EngineResult<Vec<Statement>> {
        let tokens = Lexer::new(sql).tokenize()?;
        let mut parser = Parser { tokens, pos: 0 };
        let mut out = Vec::new();
        while *parser.peek() != Token::Eof {
            out.push(parser.parse_statement()?);
        }
        Ok(out)
    }

    fn parse_select(&mut self) -> EngineResult<SelectStatement> {
        self.expect_keyword("SELECT")?;
        let distinct = self.eat_keyword("DISTINCT");
        if self.check_keyword("ALL") {
            self.advance();
        }

        let mut columns = Vec::new();
        loop {
            columns.push(self.parse_select_column()?);
            if *self.peek() == Token::Comma {
                self.advance();
                continue;
            }
            break;
        }

        let from = if self.eat_keyword("FROM") { Some(self.parse_from_clause()?) } else { None };

        let where_clause = if self.eat_keyword("WHERE") { Some(self.parse_expr()?) } else { None };

        let group_by = if self.eat_keyword("GROUP") {
            self.expect_keyword("BY")?;
            let mut list = vec![self.parse_expr()?];
            while *self.peek() == Token::Comma {
                self.advance();
                list.push(self.parse_expr()?);
            }
            Some(list)
        } else {
            None
        };

        let having = if self.eat_keyword("HAVING") { Some(self.parse_expr()?) } else { None };

        let order_by = if self.eat_keyword("ORDER") {
            self.expect_keyword("BY")?;
            let mut list = vec![self.parse_order_by_item()?];
            while *self.peek() == Token::Comma {
                self.advance();
                list.push(self.parse_order_by_item()?);
            }
            Some(list)
        } else {
            None
        };

        let limit = if self.eat_keyword("LIMIT") {
            let count = self.parse_u64_literal()?;
            let offset = if self.eat_keyword("OFFSET") { Some(self.parse_u64_literal()?) } else { None };
            Some(LimitClause { count, offset })
        } else {
            None
        };

        let composite = if self.check_keyword("UNION") || self.check_keyword("INTERSECT") || self.check_keyword("EXCEPT") {
            let op = if self.eat_keyword("UNION") {
                CompositeOp::Union
            } else if self.eat_keyword("INTERSECT") {
                CompositeOp::Intersect
            } else {
                self.expect_keyword("EXCEPT")?;
                CompositeOp::Except
            };
            let all = self.eat_keyword("ALL");
            let next = self.parse_select()?;
            Some(Box::new(CompositeSelect { op, all, next }))
        } else {
            None
        };

        Ok(SelectStatement { distinct, columns, from, where_clause, group_by, having, order_by, limit, composite })
    }

    fn parse_u64_literal(&mut self) -> EngineResult<u64> {
        match self.advance() {
            Token::IntegerLiteral(i) if i >= 0 => Ok(i as u64),
            other => Err(EngineError::parse_error(format!("expected non-negative integer, found {:?}", other))),
        }
    }

    fn parse_select_column(&mut self) -> EngineResult<SelectColumn> {
        if *self.peek() == Token::Star {
            self.advance();
            return Ok(SelectColumn::Wildcard);
        }
        if let Token::Identifier(name) = self.peek().clone() {
            let mut lookahead = self.pos;
            if self.tokens.get(lookahead + 1) == Some(&Token::Dot) && self.tokens.get(lookahead + 2) == Some(&Token::Star) {
                self.pos += 3;
                return Ok(SelectColumn::QualifiedWildcard(name));
            }
            let _ = &mut lookahead;
        }
        let expr = self.parse_expr()?;
        let alias = if self.eat_keyword("AS") {
            Some(self.expect_identifier()?)
        } else if let Token::Identifier(s) = self.peek().clone() {
            if !is_reserved(&s) {
                self.advance();
                Some(s)
            } else {
                None
            }
        } else {
            None
        };
        Ok(SelectColumn::Expression { expr, alias })
    }

    fn parse_from_clause(&mut self) -> EngineResult<FromClause> {
        let table = self.parse_from_item()?;
        let mut joins = Vec::new();
        loop {
            let join_type = if self.eat_keyword("JOIN") || (self.eat_keyword("INNER") && self.expect_keyword("JOIN").is_ok()) {
                JoinType::Inner
            } else if self.check_keyword("LEFT") {
                self.advance();
                self.eat_keyword("OUTER");
                self.expect_keyword("JOIN")?;
                JoinType::Left
            } else if self.check_keyword("RIGHT") {
                self.advance();
                self.eat_keyword("OUTER");
                self.expect_keyword("JOIN")?;
                JoinType::Right
            } else if self.check_keyword("FULL") {
                self.advance();
                self.eat_keyword("OUTER");
                self.expect_keyword("JOIN")?;
                JoinType::Full
            } else if *self.peek() == Token::Comma {
                self.advance();
                JoinType::Inner
            } else {
                break;
            };
            let table = self.parse_from_item()?;
            let condition = if self.eat_keyword("ON") { Some(self.parse_expr()?) } else { None };
            joins.push(JoinClause { join_type, table, condition });
        }
        Ok(FromClause { table, joins })
    }

    fn parse_from_item(&mut self) -> EngineResult<FromItem> {
        if *self.peek() == Token::LeftParen {
            self.advance();
            let query = self.parse_select()?;
            self.expect_token(Token::RightParen)?;
            self.eat_keyword("AS");
            let alias = self.expect_identifier()?;
            Ok(FromItem::SubQuery { query: Box::new(query), alias })
        } else {
            let name = self.expect_identifier()?;
            let alias = if self.eat_keyword("AS") {
                Some(self.expect_identifier()?)
            } else if let Token::Identifier(s) = self.peek().clone() {
                if !is_reserved(&s) {
                    self.advance();
                    Some(s)
                } else {
                    None
                }
            } else {
                None
            };
            Ok(FromItem::Table { name, alias })
        }
    }

    fn parse_order_by_item(&mut self) -> EngineResult<OrderByClause> {
        let expression = self.parse_expr()?;
        let direction = if self.eat_keyword("DESC") {
            OrderDirection::Desc
        } else {
            self.eat_keyword("ASC");
            OrderDirection::Asc
        };
        Ok(OrderByClause { expression, direction })
    }

    fn parse_insert(&mut self) -> EngineResult<InsertStatement> {
        self.expect_keyword("INSERT")?;
        self.expect_keyword("INTO")?;
        let table = self.expect_identifier()?;

        let columns = if *self.peek() == Token::LeftParen {
            self.advance();
            let mut cols = vec![self.expect_identifier()?];
            while *self.peek() == Token::Comma {
                self.advance();
                cols.push(self.expect_identifier()?);
            }
            self.expect_token(Token::RightParen)?;
            Some(cols)
        } else {
            None
        };

        let source = if self.eat_keyword("VALUES") {
            let mut rows = vec![self.parse_value_tuple()?];
            while *self.peek() == Token::Comma {
                self.advance();
                rows.push(self.parse_value_tuple()?);
            }
            InsertSource::Values(rows)
        } else if self.check_keyword("SELECT") {
            InsertSource::Select(Box::new(self.parse_select()?))
        } else if self.eat_keyword("SET") {
            let mut assigns = vec![self.parse_assignment()?];
            while *self.peek() == Token::Comma {
                self.advance();
                assigns.push(self.parse_assignment()?);
            }
            InsertSource::Set(assigns)
        } else {
            return Err(EngineError::parse_error("expected VALUES, SELECT or SET after INSERT INTO table"));
        };

        Ok(InsertStatement { table, columns, source })
    }

    fn parse_value_tuple(&mut self) -> EngineResult<Vec<Expression>> {
        self.expect_token(Token::LeftParen)?;
        let mut vals = vec![self.parse_expr()?];
        while *self.peek() == Token::Comma {
            self.advance();
            vals.push(self.parse_expr()?);
        }
        self.expect_token(Token::RightParen)?;
        Ok(vals)
    }

    fn parse_assignment(&mut self) -> EngineResult<Assignment> {
        let column = self.expect_identifier()?;
        self.expect_token(Token::Eq)?;
        let value = self.parse_expr()?;
        Ok(Assignment { column, value })
    }

    fn parse_update(&mut self) -> EngineResult<UpdateStatement> {
        self.expect_keyword("UPDATE")?;
        let table = self.expect_identifier()?;
        self.expect_keyword("SET")?;
        let mut assignments = vec![self.parse_assignment()?];
        while *self.peek() == Token::Comma {
            self.advance();
            assignments.push(self.parse_assignment()?);
        }
        let where_clause = if self.eat_keyword("WHERE") { Some(self.parse_expr()?) } else { None };
        let limit = if self.eat_keyword("LIMIT") { Some(self.parse_u64_literal()?) } else { None };
        Ok(UpdateStatement { table, assignments, where_clause, limit })
    }

    fn parse_delete(&mut self) -> EngineResult<DeleteStatement> {
        self.expect_keyword("DELETE")?;
        self.expect_keyword("FROM")?;
        let table = self.expect_identifier()?;
        let where_clause = if self.eat_keyword("WHERE") { Some(self.parse_expr()?) } else { None };
        let limit = if self.eat_keyword("LIMIT") { Some(self.parse_u64_literal()?) } else { None };
        Ok(DeleteStatement { table, where_clause, limit })
    }

    fn parse_create(&mut self) -> EngineResult<Statement> {
        self.expect_keyword("CREATE")?;
        let unique = self.eat_keyword("UNIQUE");
        if self.eat_keyword("TABLE") {
            Ok(Statement::CreateTable(self.parse_create_table_body()?))
        } else if self.eat_keyword("INDEX") {
            Ok(Statement::CreateIndex(self.parse_create_index_body(unique)?))
        } else {
            Err(EngineError::parse_error("expected TABLE or INDEX after CREATE"))
        }
    }

    fn parse_create_table_body(&mut self) -> EngineResult<CreateTableStatement> {
        let if_not_exists = if self.eat_keyword("IF") {
            self.expect_keyword("NOT")?;
            self.expect_keyword("EXISTS")?;
            true
        } else {
            false
        };
        let table_name = self.expect_identifier()?;
        self.expect_token(Token::LeftParen)?;
        let mut columns = Vec::new();
        let mut constraints = Vec::new();
        loop {
            if self.check_keyword("PRIMARY") || self.check_keyword("UNIQUE") || self.check_keyword("FOREIGN") || self.check_keyword("CHECK") {
                constraints.push(self.parse_table_constraint()?);
            } else {
                columns.push(self.parse_column_definition()?);
            }
            if *self.peek() == Token::Comma {
                self.advance();
                continue;
            }
            break;
        }
        self.expect_token(Token::RightParen)?;
        Ok(CreateTableStatement { table_name, if_not_exists, columns, constraints })
    }

    fn parse_column_definition(&mut self) -> EngineResult<ColumnDefinition> {
        let name = self.expect_identifier()?;
        let data_type = self.parse_data_type()?;
        let mut constraints = Vec::new();
        loop {
            if self.eat_keyword("NOT") {
                self.expect_keyword("NULL")?;
                constraints.push(ColumnConstraint::NotNull);
            } else if self.check_keyword("PRIMARY") {
                self.advance();
                self.expect_keyword("KEY")?;
                constraints.push(ColumnConstraint::PrimaryKey);
            } else if self.eat_keyword("UNIQUE") {
                constraints.push(ColumnConstraint::Unique);
            } else if self.eat_keyword("DEFAULT") {
                let v = self.parse_literal_value()?;
                constraints.push(ColumnConstraint::Default(v));
            } else if self.eat_keyword("REFERENCES") {
                let table = self.expect_identifier()?;
                self.expect_token(Token::LeftParen)?;
                let column = self.expect_identifier()?;
                self.expect_token(Token::RightParen)?;
                constraints.push(ColumnConstraint::ForeignKey { table, column });
            } else {
                break;
            }
        }
        Ok(ColumnDefinition { name, data_type, constraints })
    }

    fn parse_data_type(&mut self) -> EngineResult<DataType> {
        let name = self.expect_identifier()?;
        let dt = match name.to_ascii_uppercase().as_str() {
            "INT" | "INTEGER" | "BIGINT" | "SMALLINT" => DataType::Integer,
            "REAL" | "FLOAT" | "DOUBLE" | "DECIMAL" | "NUMERIC" => DataType::Real,
            "TEXT" | "VARCHAR" | "CHAR" | "CHARACTER" => DataType::Text,
            "BLOB" => DataType::Blob,
            "BOOLEAN" | "BOOL" => DataType::Boolean,
            other => return Err(EngineError::parse_error(format!("unknown data type '{}'", other))),
        };
        if *self.peek() == Token::LeftParen {
            self.advance();
            let _ = self.parse_u64_literal();
            if *self.peek() == Token::Comma {
                self.advance();
                let _ = self.parse_u64_literal();
            }
            self.expect_token(Token::RightParen)?;
        }
        Ok(dt)
    }

    fn parse_table_constraint(&mut self) -> EngineResult<TableConstraint> {
        if self.eat_keyword("PRIMARY") {
            self.expect_keyword("KEY")?;
            Ok(TableConstraint::PrimaryKey(self.parse_column_list()?))
        } else if self.eat_keyword("UNIQUE") {
            Ok(TableConstraint::Unique(self.parse_column_list()?))
        } else if self.eat_keyword("FOREIGN") {
            self.expect_keyword("KEY")?;
            let columns = self.parse_column_list()?;
            self.expect_keyword("REFERENCES")?;
            let foreign_table = self.expect_identifier()?;
            let foreign_columns = self.parse_column_list()?;
            Ok(TableConstraint::ForeignKey { columns, foreign_table, foreign_columns })
        } else if self.eat_keyword("CHECK") {
            self.expect_token(Token::LeftParen)?;
            let expr = self.parse_expr()?;
            self.expect_token(Token::RightParen)?;
            Ok(TableConstraint::Check(expr))
        } else {
            Err(EngineError::parse_error("expected a table constraint"))
        }
    }

    fn parse_column_list(&mut self) -> EngineResult<Vec<String>> {
        self.expect_token(Token::LeftParen)?;
        let mut cols = vec![self.expect_identifier()?];
        while *self.peek() == Token::Comma {
            self.advance();
            cols.push(self.expect_identifier()?);
        }
        self.expect_token(Token::RightParen)?;
        Ok(cols)
    }

    fn parse_create_index_body(&mut self, unique: bool) -> EngineResult<CreateIndexStatement> {
        let index_name = self.expect_identifier()?;
        self.expect_keyword("ON")?;
        let table_name = self.expect_identifier()?;
        let columns = self.parse_column_list()?;
        Ok(CreateIndexStatement { index_name, table_name, columns, unique })
    }

    fn parse_drop(&mut self) -> EngineResult<Statement> {
        self.expect_keyword("DROP")?;
        if self.eat_keyword("TABLE") {
            let if_exists = self.eat_keyword("IF") && self.expect_keyword("EXISTS").is_ok();
            let table_name = self.expect_identifier()?;
            Ok(Statement::DropTable(DropTableStatement { table_name, if_exists }))
        } else if self.eat_keyword("INDEX") {
            let if_exists = self.eat_keyword("IF") && self.expect_keyword("EXISTS").is_ok();
            let index_name = self.expect_identifier()?;
            Ok(Statement::DropIndex(DropIndexStatement { index_name, if_exists }))
        } else {
            Err(EngineError::parse_error("expected TABLE or INDEX after DROP"))
        }
    }

    fn parse_alter_table(&mut self) -> EngineResult<AlterTableStatement> {
        self.expect_keyword("ALTER")?;
        self.expect_keyword("TABLE")?;
        let table_name = self.expect_identifier()?;
        let mut actions = vec![self.parse_alter_action()?];
        while *self.peek() == Token::Comma {
            self.advance();
            actions.push(self.parse_alter_action()?);
        }
        Ok(AlterTableStatement::Actions { table_name, actions })
    }

    fn parse_alter_action(&mut self) -> EngineResult<AlterAction> {
        if self.eat_keyword("ADD") {
            if self.eat_keyword("CONSTRAINT") {
                let _name = self.expect_identifier()?;
                Ok(AlterAction::AddConstraint(self.parse_table_constraint()?))
            } else {
                self.eat_keyword("COLUMN");
                Ok(AlterAction::AddColumn(self.parse_column_definition()?))
            }
        } else if self.eat_keyword("DROP") {
            if self.eat_keyword("CONSTRAINT") {
                if self.eat_keyword("PRIMARY") {
                    self.expect_keyword("KEY")?;
                    Ok(AlterAction::DropConstraintPrimaryKey)
                } else {
                    Ok(AlterAction::DropConstraint { name: self.expect_identifier()? })
                }
            } else if self.eat_keyword("DEFAULT") {
                Err(EngineError::parse_error("DROP DEFAULT requires a column name before it"))
            } else {
                self.eat_keyword("COLUMN");
                Ok(AlterAction::DropColumn { column: self.expect_identifier()? })
            }
        } else if self.eat_keyword("ALTER") {
            self.eat_keyword("COLUMN");
            let column = self.expect_identifier()?;
            if self.eat_keyword("SET") {
                self.expect_keyword("DEFAULT")?;
                let default = self.parse_expr()?;
                Ok(AlterAction::AlterSetDefault { column, default })
            } else if self.eat_keyword("DROP") {
                self.expect_keyword("DEFAULT")?;
                Ok(AlterAction::DropDefault { column })
            } else {
                Err(EngineError::parse_error("expected SET DEFAULT or DROP DEFAULT"))
            }
        } else {
            Err(EngineError::parse_error("expected ADD, DROP or ALTER in ALTER TABLE"))
        }
    }

    fn parse_set(&mut self) -> EngineResult<SetStatement> {
        self.expect_keyword("SET")?;
        let name = self.expect_identifier()?;
        self.expect_token(Token::Eq)?;
        let value = self.parse_expr()?;
        Ok(SetStatement { name, value })
    }

    fn parse_literal_value(&mut self) -> EngineResult<Value> {
        match self.advance() {
            Token::IntegerLiteral(i) => Ok(Value::Integer(i)),
            Token::RealLiteral(r) => Ok(Value::Real(r)),
            Token::StringLiteral(s) => Ok(Value::Text(s)),
            Token::Identifier(s) if s.eq_ignore_ascii_case("NULL") => Ok(Value::Null),
            Token::Identifier(s) if s.eq_ignore_ascii_case("TRUE") => Ok(Value::Boolean(true)),
            Token::Identifier(s) if s.eq_ignore_ascii_case("FALSE") => Ok(Value::Boolean(false)),
            Token::Minus => {
                let v = self.parse_literal_value()?;
                match v {
                    Value::Integer(i) => Ok(Value::Integer(-i)),
                    Value::Real(r) => Ok(Value::Real(-r)),
                    other => Ok(other),
                }
            }
            other => Err(EngineError::parse_error(format!("expected a literal value, found {:?}", other))),
        }
    }

    // ---- expressions, by ascending precedence ----

    pub fn parse_expr(&mut self) -> EngineResult<Expression> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> EngineResult<Expression> {
        let mut left = self.parse_and()?;
        while self.eat_keyword("OR") {
            let right = self.parse_and()?;
            left = Expression::BinaryOp { left: Box::new(left), op: BinaryOperator::Or, right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> EngineResult<Expression> {
        let mut left = self.parse_not()?;
        while self.eat_keyword("AND") {
            let right = self.parse_not()?;
            left = Expression::BinaryOp { left: Box::new(left), op: BinaryOperator::And, right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> EngineResult<Expression> {
        if self.eat_keyword("NOT") {
            let operand = self.parse_not()?;
            Ok(Expression::UnaryOp { op: UnaryOperator::Not, operand: Box::new(operand) })
        } else {
            self.parse_comparison()
        }
    }

    fn parse_comparison(&mut self) -> EngineResult<Expression> {
        let expr = self.parse_additive()?;
        self.parse_comparison_tail(expr)
    }

    fn parse_comparison_tail(&mut self, expr: Expression) -> EngineResult<Expression> {
        let negated = self.eat_keyword("NOT");
        if self.eat_keyword("BETWEEN") {
            let low = self.parse_additive()?;
            self.expect_keyword("AND")?;
            let high = self.parse_additive()?;
            return Ok(Expression::Between { expr: Box::new(expr), low: Box::new(low), high: Box::new(high), negated });
        }
        if self.eat_keyword("IN") {
            self.expect_token(Token::LeftParen)?;
            if self.check_keyword("SELECT") {
                let query = self.parse_select()?;
                self.expect_token(Token::RightParen)?;
                return Ok(Expression::InSubquery { expr: Box::new(expr), query: Box::new(query), negated });
            }
            let mut list = vec![self.parse_expr()?];
            while *self.peek() == Token::Comma {
                self.advance();
                list.push(self.parse_expr()?);
            }
            self.expect_token(Token::RightParen)?;
            return Ok(Expression::In { expr: Box::new(expr), list, negated });
        }
        if negated {
            self.eat_keyword("LIKE");
            let right = self.parse_additive()?;
            return Ok(Expression::BinaryOp { left: Box::new(expr), op: BinaryOperator::NotLike, right: Box::new(right) });
        }
        if self.eat_keyword("LIKE") {
            let right = self.parse_additive()?;
            return Ok(Expression::BinaryOp { left: Box::new(expr), op: BinaryOperator::Like, right: Box::new(right) });
        }
        if self.eat_keyword("IS") {
            if self.eat_keyword("NOT") {
                self.expect_keyword("NULL")?;
                return Ok(Expression::IsNotNull(Box::new(expr)));
            }
            self.expect_keyword("NULL")?;
            return Ok(Expression::IsNull(Box::new(expr)));
        }

        let op = match self.peek() {
            Token::Eq => Some(BinaryOperator::Equal),
            Token::NotEq => Some(BinaryOperator::NotEqual),
            Token::Lt => Some(BinaryOperator::LessThan),
            Token::LtEq => Some(BinaryOperator::LessThanOrEqual),
            Token::Gt => Some(BinaryOperator::GreaterThan),
            Token::GtEq => Some(BinaryOperator::GreaterThanOrEqual),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let right = self.parse_additive()?;
            return Ok(Expression::BinaryOp { left: Box::new(expr), op, right: Box::new(right) });
        }
        Ok(expr)
    }

    fn parse_additive(&mut self) -> EngineResult<Expression> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                Token::Pipes => BinaryOperator::Concat,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expression::BinaryOp { left: Box::new(left), op, right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> EngineResult<Expression> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                Token::Percent => BinaryOperator::Modulo,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expression::BinaryOp { left: Box::new(left), op, right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> EngineResult<Expression> {
        match self.peek() {
            Token::Minus => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expression::UnaryOp { op: UnaryOperator::Minus, operand: Box::new(operand) })
            }
            Token::Plus => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expression::UnaryOp { op: UnaryOperator::Plus, operand: Box::new(operand) })
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> EngineResult<Expression> {
        match self.peek().clone() {
            Token::IntegerLiteral(i) => {
                self.advance();
                Ok(Expression::Literal(Value::Integer(i)))
            }
            Token::RealLiteral(r) => {
                self.advance();
                Ok(Expression::Literal(Value::Real(r)))
            }
            Token::StringLiteral(s) => {
                self.advance();
                Ok(Expression::Literal(Value::Text(s)))
            }
            Token::Placeholder => {
                self.advance();
                Ok(Expression::Placeholder)
            }
            Token::Star => {
                self.advance();
                Ok(Expression::Wildcard)
            }
            Token::LeftParen => {
                self.advance();
                if self.check_keyword("SELECT") {
                    let query = self.parse_select()?;
                    self.expect_token(Token::RightParen)?;
                    return Ok(Expression::Subquery(Box::new(query)));
                }
                let expr = self.parse_expr()?;
                self.expect_token(Token::RightParen)?;
                Ok(expr)
            }
            Token::Identifier(name) => {
                self.advance();
                if name.eq_ignore_ascii_case("NULL") {
                    return Ok(Expression::Literal(Value::Null));
                }
                if name.eq_ignore_ascii_case("TRUE") {
                    return Ok(Expression::Literal(Value::Boolean(true)));
                }
                if name.eq_ignore_ascii_case("FALSE") {
                    return Ok(Expression::Literal(Value::Boolean(false)));
                }
                if *self.peek() == Token::LeftParen {
                    self.advance();
                    let distinct = self.eat_keyword("DISTINCT");
                    let mut args = Vec::new();
                    if *self.peek() != Token::RightParen {
                        if *self.peek() == Token::Star {
                            self.advance();
                            args.push(Expression::Wildcard);
                        } else {
                            args.push(self.parse_expr()?);
                            while *self.peek() == Token::Comma {
                                self.advance();
                                args.push(self.parse_expr()?);
                            }
                        }
                    }
                    self.expect_token(Token::RightParen)?;
                    return Ok(Expression::Function { name, args, distinct });
                }
                if *self.peek() == Token::Dot {
                    self.advance();
                    let column = self.expect_identifier()?;
                    return Ok(Expression::QualifiedColumn { table: name, column });
                }
                Ok(Expression::Column(name))
            }
            Token::QuotedIdentifier(name) => {
                self.advance();
                Ok(Expression::Column(name))
            }
            other => Err(EngineError::parse_error(format!("unexpected token in expression: {:?}", other))),
        }
    }
}

fn is_reserved(word: &str) -> bool {
    const RESERVED: &[&str] = &[
        "FROM", "WHERE", "GROUP", "HAVING", "ORDER", "LIMIT", "OFFSET", "JOIN", "INNER", "LEFT",
        "RIGHT", "FULL", "OUTER", "ON", "AND", "OR", "NOT", "UNION", "INTERSECT", "EXCEPT", "AS",
    ];
    RESERVED.iter().any(|kw| word.eq_ignore_ascii_case(kw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_select() {
        let stmt = parse_sql("SELECT a, b FROM t WHERE a = 1").unwrap();
        match stmt {
            Statement::Select(s) => {
                assert_eq!(s.columns.len(), 2);
                assert!(s.where_clause.is_some());
            }
            _ => panic!("expected select"),
        }
    }

    #[test]
    fn parses_insert_values() {
        let stmt = parse_sql("INSERT INTO t VALUES (1, 'x'), (2, 'y')").unwrap();
        match stmt {
            Statement::Insert(i) => match i.source {
                InsertSource::Values(rows) => assert_eq!(rows.len(), 2),
                _ => panic!("expected VALUES"),
            },
            _ => panic!("expected insert"),
        }
    }

    #[test]
    fn parses_group_by_having_order_limit() {
        let stmt = parse_sql(
            "SELECT a, COUNT(*) c FROM t GROUP BY a HAVING COUNT(*) >= 1 ORDER BY 2 DESC, a ASC",
        )
        .unwrap();
        match stmt {
            Statement::Select(s) => {
                assert!(s.group_by.is_some());
                assert!(s.having.is_some());
                assert_eq!(s.order_by.unwrap().len(), 2);
            }
            _ => panic!("expected select"),
        }
    }

    #[test]
    fn parses_in_subquery() {
        let stmt = parse_sql("SELECT a FROM t WHERE a IN (SELECT a FROM t WHERE b = 'x')").unwrap();
        match stmt {
            Statement::Select(s) => match s.where_clause {
                Some(Expression::InSubquery { .. }) => {}
                other => panic!("expected InSubquery, got {:?}", other),
            },
            _ => panic!("expected select"),
        }
    }

    #[test]
    fn parses_alter_table_add_constraint_and_drop_column() {
        let stmt = parse_sql("ALTER TABLE t ADD CONSTRAINT fk FOREIGN KEY (a) REFERENCES t(a)").unwrap();
        assert!(matches!(stmt, Statement::AlterTable(_)));
        let stmt2 = parse_sql("ALTER TABLE t DROP COLUMN a").unwrap();
        assert!(matches!(stmt2, Statement::AlterTable(_)));
    }
}
