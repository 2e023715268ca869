use super::frame::{read_frame, write_frame, FrameReader, FrameWriter};
use super::opcode::{Opcode, HANDSHAKE_MAGIC, SERVER_VERSION, UNSOLICITED_DISPATCH_ID};
use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::exec::EvalTable;
use crate::parser::sql_parser::parse_sql;
use crate::session::SessionState;
use crate::statement;
use crate::types::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Per-connection state, spec §4.G's three-state machine: HANDSHAKE (0),
/// LOGIN (4), command loop (100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Handshake,
    Login,
    Commands,
    Closed,
}

/// One client connection, owning its own `SessionState` against the shared
/// `Engine`. Grounded on the teacher's `daemon::ipc::IpcServer::handle_client`
/// accept-then-serve shape, replaced with this protocol's opcode table and
/// state machine instead of the teacher's JSON daemon messages.
pub struct Connection {
    pub state: ConnectionState,
    session: SessionState,
    engine: Engine,
    auth_attempts: u32,
}

impl Connection {
    pub fn new(engine: Engine) -> Self {
        Connection { state: ConnectionState::Handshake, session: SessionState::new("public"), engine, auth_attempts: 0 }
    }

    /// Drives the connection to completion against an async duplex stream.
    /// Exits when the client sends CLOSE, closes the socket, or an IO error
    /// occurs (spec §5 "Cancellation & timeout": any IO error ends the
    /// connection).
    pub async fn serve<S>(&mut self, stream: &mut S) -> EngineResult<()>
    where
        S: AsyncReadExt + AsyncWriteExt + Unpin,
    {
        self.handshake(stream).await?;
        self.login(stream).await?;
        while self.state == ConnectionState::Commands {
            self.run_turn(stream).await?;
        }
        Ok(())
    }

    async fn handshake<S>(&mut self, stream: &mut S) -> EngineResult<()>
    where
        S: AsyncReadExt + AsyncWriteExt + Unpin,
    {
        let frame = read_frame(stream).await?;
        let mut r = FrameReader::new(&frame);
        let magic = r.read_u32()?;
        let _major = r.read_u32()?;
        let _minor = r.read_u32()?;
        if magic != HANDSHAKE_MAGIC {
            return Err(EngineError::access_error("handshake magic mismatch"));
        }

        let mut w = FrameWriter::new();
        w.write_i32(Opcode::Acknowledgement as i32).write_u8(1).write_u32(SERVER_VERSION).write_u8(1);
        write_frame(stream, &w.into_bytes()).await?;
        self.state = ConnectionState::Login;
        Ok(())
    }

    async fn login<S>(&mut self, stream: &mut S) -> EngineResult<()>
    where
        S: AsyncReadExt + AsyncWriteExt + Unpin,
    {
        loop {
            let frame = read_frame(stream).await?;
            let mut r = FrameReader::new(&frame);
            let default_schema = r.read_string()?;
            let username = r.read_string()?;
            let password = r.read_string()?;

            if self.engine.authenticate(&username, &password) {
                self.session = SessionState::new(default_schema);
                let mut w = FrameWriter::new();
                w.write_i32(Opcode::UserAuthenticationPassed as i32).write_u32(0);
                write_frame(stream, &w.into_bytes()).await?;
                self.state = ConnectionState::Commands;
                return Ok(());
            }

            self.auth_attempts += 1;
            let mut w = FrameWriter::new();
            w.write_i32(Opcode::UserAuthenticationFailed as i32).write_u32(1);
            write_frame(stream, &w.into_bytes()).await?;

            if self.auth_attempts >= EngineConfig::MAX_AUTH_RETRIES {
                self.state = ConnectionState::Closed;
                return Err(EngineError::access_error("exceeded maximum authentication retries"));
            }
        }
    }

    /// Processes up to `MAX_COMMANDS_PER_TURN` consecutive requests before
    /// yielding the worker (spec §4.G "Request framing").
    async fn run_turn<S>(&mut self, stream: &mut S) -> EngineResult<()>
    where
        S: AsyncReadExt + AsyncWriteExt + Unpin,
    {
        for _ in 0..EngineConfig::MAX_COMMANDS_PER_TURN {
            let frame = read_frame(stream).await?;
            let mut r = FrameReader::new(&frame);
            let dispatch_id = r.read_i32()?;
            let opcode = Opcode::from_i32(r.read_i32()?).ok_or_else(|| EngineError::parse_error("unknown opcode"))?;

            match opcode {
                Opcode::Close => {
                    self.state = ConnectionState::Closed;
                    return Ok(());
                }
                Opcode::Query => self.handle_query(stream, dispatch_id, &mut r).await?,
                Opcode::DisposeResult => self.handle_dispose_result(stream, dispatch_id, &mut r).await?,
                Opcode::PushStreamableObjectPart => self.handle_push_part(stream, dispatch_id, &mut r).await?,
                Opcode::StreamableObjectSection => self.handle_streamable_section(stream, dispatch_id, &mut r).await?,
                Opcode::DisposeStreamableObject => self.handle_dispose_streamable(stream, dispatch_id, &mut r).await?,
                other => {
                    self.send_exception(stream, dispatch_id, &EngineError::parse_error(format!("unexpected opcode {:?} in command state", other))).await?;
                }
            }

            if self.state != ConnectionState::Commands {
                return Ok(());
            }
        }
        Ok(())
    }

    async fn handle_query<S>(&mut self, stream: &mut S, dispatch_id: i32, r: &mut FrameReader<'_>) -> EngineResult<()>
    where
        S: AsyncReadExt + AsyncWriteExt + Unpin,
    {
        let text = r.read_string()?;
        let param_count = r.read_u32()?;
        let mut params = Vec::with_capacity(param_count as usize);
        for _ in 0..param_count {
            params.push(read_wire_value(r)?);
        }

        let outcome = self.execute_text(&text, &params);
        match outcome {
            Ok(table) => {
                let result_id = self.session.result_sets.register(table.clone());
                let mut w = FrameWriter::new();
                w.write_i32(Opcode::Success as i32);
                write_result_table(&mut w, result_id, &table);
                write_frame(stream, &w.into_bytes()).await?;
            }
            Err(e) => self.send_exception(stream, dispatch_id, &e).await?,
        }
        Ok(())
    }

    fn execute_text(&mut self, text: &str, params: &[Value]) -> EngineResult<EvalTable> {
        let stmt = parse_sql(text)?;
        let stmt = bind_placeholders(stmt, params);
        let mut catalog = self.engine.catalog.write();
        let mut tables = self.engine.tables.write();
        statement::execute(&stmt, &mut self.session, &mut catalog, &mut tables)
    }

    async fn handle_dispose_result<S>(&mut self, stream: &mut S, dispatch_id: i32, r: &mut FrameReader<'_>) -> EngineResult<()>
    where
        S: AsyncReadExt + AsyncWriteExt + Unpin,
    {
        let result_id = r.read_u32()?;
        match self.session.result_sets.dispose(result_id as u64) {
            Ok(()) => self.send_success_empty(stream).await,
            Err(e) => self.send_exception(stream, dispatch_id, &e).await,
        }
    }

    async fn handle_push_part<S>(&mut self, stream: &mut S, dispatch_id: i32, r: &mut FrameReader<'_>) -> EngineResult<()>
    where
        S: AsyncReadExt + AsyncWriteExt + Unpin,
    {
        let object_type = r.read_u8()?;
        let object_id = r.read_u64()?;
        let total_length = r.read_u64()?;
        let length = r.read_u32()? as usize;
        let bytes = r.read_bytes(length)?.to_vec();
        let offset = r.read_u64()?;

        self.session.large_objects.begin(object_type, total_length, object_id);
        match self.session.large_objects.push_part(object_type, total_length, object_id, offset, &bytes) {
            Ok(()) => self.send_success_empty(stream).await,
            Err(e) => self.send_exception(stream, dispatch_id, &e).await,
        }
    }

    async fn handle_streamable_section<S>(&mut self, stream: &mut S, dispatch_id: i32, r: &mut FrameReader<'_>) -> EngineResult<()>
    where
        S: AsyncReadExt + AsyncWriteExt + Unpin,
    {
        let result_id = r.read_u32()?;
        let streamable_id = r.read_u64()?;
        let offset = r.read_u64()?;
        let len = r.read_u32()? as u64;

        if self.session.result_sets.get(result_id as u64).is_none() {
            return self.send_exception(stream, dispatch_id, &EngineError::statement_error("unknown result id")).await;
        }
        match self.session.large_objects.take_completed_by_id(streamable_id) {
            Ok(obj) => {
                let part = obj.read_part(offset, len).to_vec();
                let mut w = FrameWriter::new();
                w.write_i32(Opcode::Success as i32).write_u32(part.len() as u32).write_bytes(&part);
                write_frame(stream, &w.into_bytes()).await?;
                Ok(())
            }
            Err(e) => self.send_exception(stream, dispatch_id, &e).await,
        }
    }

    async fn handle_dispose_streamable<S>(&mut self, stream: &mut S, _dispatch_id: i32, r: &mut FrameReader<'_>) -> EngineResult<()>
    where
        S: AsyncReadExt + AsyncWriteExt + Unpin,
    {
        let _result_id = r.read_u32()?;
        let _streamable_id = r.read_u64()?;
        self.send_success_empty(stream).await
    }

    async fn send_success_empty<S>(&self, stream: &mut S) -> EngineResult<()>
    where
        S: AsyncReadExt + AsyncWriteExt + Unpin,
    {
        let mut w = FrameWriter::new();
        w.write_i32(Opcode::Success as i32).write_u32(0);
        write_frame(stream, &w.into_bytes()).await
    }

    async fn send_exception<S>(&self, stream: &mut S, dispatch_id: i32, error: &EngineError) -> EngineResult<()>
    where
        S: AsyncReadExt + AsyncWriteExt + Unpin,
    {
        let mut w = FrameWriter::new();
        w.write_i32(dispatch_id).write_i32(Opcode::Exception as i32).write_i32(error.sql_code()).write_string(&error.to_string()).write_string("");
        write_frame(stream, &w.into_bytes()).await
    }

    /// Pushes an unsolicited PING, spec §4.G/§5's farmer-model keepalive.
    pub async fn send_ping<S>(stream: &mut S) -> EngineResult<()>
    where
        S: AsyncReadExt + AsyncWriteExt + Unpin,
    {
        let mut w = FrameWriter::new();
        w.write_i32(UNSOLICITED_DISPATCH_ID).write_i32(Opcode::Ping as i32);
        write_frame(stream, &w.into_bytes()).await
    }
}

fn read_wire_value(r: &mut FrameReader) -> EngineResult<Value> {
    let tag = r.read_u8()?;
    Ok(match tag {
        0 => Value::Null,
        1 => Value::Integer(r.read_u64()? as i64),
        2 => Value::Real(f64::from_bits(r.read_u64()?)),
        3 => Value::Text(r.read_string()?),
        4 => {
            let len = r.read_u32()? as usize;
            Value::Blob(r.read_bytes(len)?.to_vec())
        }
        5 => Value::Boolean(r.read_u8()? != 0),
        6 => Value::StreamableObject { object_type: r.read_u8()?, total_length: r.read_u64()?, id: r.read_u64()? },
        other => return Err(EngineError::parse_error(format!("unknown wire value tag {}", other))),
    })
}

fn write_wire_value(w: &mut FrameWriter, value: &Value) {
    match value {
        Value::Null => {
            w.write_u8(0);
        }
        Value::Integer(i) => {
            w.write_u8(1).write_u64(*i as u64);
        }
        Value::Real(f) => {
            w.write_u8(2).write_u64(f.to_bits());
        }
        Value::Text(s) => {
            w.write_u8(3).write_string(s);
        }
        Value::Blob(b) => {
            w.write_u8(4).write_u32(b.len() as u32).write_bytes(b);
        }
        Value::Boolean(b) => {
            w.write_u8(5).write_u8(*b as u8);
        }
        Value::StreamableObject { object_type, total_length, id } => {
            w.write_u8(6).write_u8(*object_type).write_u64(*total_length).write_u64(*id);
        }
    }
}

fn write_result_table(w: &mut FrameWriter, result_id: u64, table: &EvalTable) {
    w.write_u32(result_id as u32);
    w.write_u32(table.columns.len() as u32);
    for c in &table.columns {
        w.write_string(c);
    }
    w.write_u32(table.rows.len() as u32);
    for row in &table.rows {
        w.write_u32(row.values.len() as u32);
        for v in &row.values {
            write_wire_value(w, v);
        }
    }
}

/// Substitutes each `Expression::Placeholder` in statement order with the
/// corresponding bound parameter from the query's parameter array.
fn bind_placeholders(stmt: crate::parser::ast::Statement, params: &[Value]) -> crate::parser::ast::Statement {
    use crate::parser::ast::{Expression, Statement};

    fn bind_expr(expr: Expression, params: &[Value], cursor: &mut usize) -> Expression {
        match expr {
            Expression::Placeholder => {
                let v = params.get(*cursor).cloned().unwrap_or(Value::Null);
                *cursor += 1;
                Expression::Literal(v)
            }
            Expression::BinaryOp { left, op, right } => Expression::BinaryOp {
                left: Box::new(bind_expr(*left, params, cursor)),
                op,
                right: Box::new(bind_expr(*right, params, cursor)),
            },
            Expression::UnaryOp { op, operand } => Expression::UnaryOp { op, operand: Box::new(bind_expr(*operand, params, cursor)) },
            Expression::Function { name, args, distinct } => {
                Expression::Function { name, args: args.into_iter().map(|a| bind_expr(a, params, cursor)).collect(), distinct }
            }
            Expression::In { expr, list, negated } => Expression::In {
                expr: Box::new(bind_expr(*expr, params, cursor)),
                list: list.into_iter().map(|e| bind_expr(e, params, cursor)).collect(),
                negated,
            },
            Expression::Between { expr, low, high, negated } => Expression::Between {
                expr: Box::new(bind_expr(*expr, params, cursor)),
                low: Box::new(bind_expr(*low, params, cursor)),
                high: Box::new(bind_expr(*high, params, cursor)),
                negated,
            },
            Expression::IsNull(e) => Expression::IsNull(Box::new(bind_expr(*e, params, cursor))),
            Expression::IsNotNull(e) => Expression::IsNotNull(Box::new(bind_expr(*e, params, cursor))),
            other => other,
        }
    }

    if params.is_empty() {
        return stmt;
    }
    let mut cursor = 0;
    match stmt {
        Statement::Select(mut s) => {
            s.where_clause = s.where_clause.map(|e| bind_expr(e, params, &mut cursor));
            Statement::Select(s)
        }
        Statement::Insert(mut s) => {
            if let crate::parser::ast::InsertSource::Values(ref mut rows) = s.source {
                for row in rows.iter_mut() {
                    for cell in row.iter_mut() {
                        let taken = std::mem::replace(cell, Expression::Placeholder);
                        *cell = bind_expr(taken, params, &mut cursor);
                    }
                }
            }
            Statement::Insert(s)
        }
        Statement::Update(mut s) => {
            for a in s.assignments.iter_mut() {
                let taken = std::mem::replace(&mut a.value, Expression::Placeholder);
                a.value = bind_expr(taken, params, &mut cursor);
            }
            s.where_clause = s.where_clause.map(|e| bind_expr(e, params, &mut cursor));
            Statement::Update(s)
        }
        Statement::Delete(mut s) => {
            s.where_clause = s.where_clause.map(|e| bind_expr(e, params, &mut cursor));
            Statement::Delete(s)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_value_round_trips_through_writer_and_reader() {
        let mut w = FrameWriter::new();
        write_wire_value(&mut w, &Value::Text("hi".into()));
        let bytes = w.into_bytes();
        let mut r = FrameReader::new(&bytes);
        assert_eq!(read_wire_value(&mut r).unwrap(), Value::Text("hi".into()));
    }
}
