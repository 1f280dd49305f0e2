//! Statement executors.
//!
//! Every executor runs the same three phases in order: validate the statement
//! shape (no I/O), build the request from rendered fragments, then dispatch it
//! over the borrowed connection and interpret the response.
//!
//! Failures map onto three outcomes. A shape the protocol cannot express is
//! `StatementUnsupported` and never reaches the network. A transport failure or a
//! success status without its payload is `ConnectionBroken` and the pool must drop
//! the connection. A non-success status is a `DbError` whose diagnostic SQL info is
//! synthesized locally when the backend omits it.

mod delete;
mod insert;
mod select;
mod update;

pub use delete::DeleteExecutor;
pub use insert::InsertExecutor;
pub use select::SelectExecutor;
pub use update::UpdateExecutor;

use crate::buffer::BufferPool;
use crate::conn::{invoke, CallContext, Connection};
use crate::planner::{plan_statement, Filter, FilterKind, Plan};
use crate::route::RouteInfo;
use cdbpool_core::error::{CdbError, DbError};
use cdbpool_core::types::{ExecResult, QueryResult, SqlInfo};
use cdbpool_protocol::messages::{CdbPoolRequest, CdbPoolResponse, Command, RequestPayload};
use metrics::counter;
use sqlparser::ast::{Expr, Statement};
use std::fmt;
use tracing::{debug, error};

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Exec(ExecResult),
    Rows(QueryResult),
}

/// Reason a statement shape cannot be sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unsupported(pub String);

impl Unsupported {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

impl fmt::Display for Unsupported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Unsupported> for CdbError {
    fn from(err: Unsupported) -> Self {
        CdbError::StatementUnsupported(err.0)
    }
}

/// Lowers and validates a parsed statement without touching any connection.
/// A statement that passes is guaranteed to reach the backend in `dispatch`.
pub fn prepare(stmt: &Statement) -> Result<Plan, CdbError> {
    let plan = plan_statement(stmt)?;
    match &plan {
        Plan::Update(stmt) => update::validate(stmt)
            .map(|_| ())
            .map_err(|err| reject(Command::OriUpdate, err))?,
        Plan::Insert(stmt) => insert::validate(stmt)
            .map(|_| ())
            .map_err(|err| reject(Command::OriInsert, err))?,
        Plan::Delete(stmt) => delete::validate(stmt)
            .map(|_| ())
            .map_err(|err| reject(Command::OriDelete, err))?,
        Plan::Select(stmt) => select::validate(stmt)
            .map(|_| ())
            .map_err(|err| reject(Command::OriSelect, err))?,
    }
    Ok(plan)
}

/// Runs the executor matching a lowered statement on `conn`.
pub async fn dispatch(
    plan: &Plan,
    route: RouteInfo,
    conn: &mut dyn Connection,
    ctx: &CallContext,
    buffers: &BufferPool,
) -> Result<Outcome, CdbError> {
    match plan {
        Plan::Update(stmt) => UpdateExecutor::new(route, ctx, conn, buffers, stmt)
            .run()
            .await
            .map(Outcome::Exec),
        Plan::Insert(stmt) => InsertExecutor::new(route, ctx, conn, buffers, stmt)
            .run()
            .await
            .map(Outcome::Exec),
        Plan::Delete(stmt) => DeleteExecutor::new(route, ctx, conn, buffers, stmt)
            .run()
            .await
            .map(Outcome::Exec),
        Plan::Select(stmt) => SelectExecutor::new(route, ctx, conn, buffers, stmt)
            .run()
            .await
            .map(Outcome::Rows),
    }
}

/// Lowers a parsed statement and runs the matching executor.
pub async fn execute(
    stmt: &Statement,
    route: RouteInfo,
    conn: &mut dyn Connection,
    ctx: &CallContext,
    buffers: &BufferPool,
) -> Result<Outcome, CdbError> {
    let plan = prepare(stmt)?;
    dispatch(&plan, route, conn, ctx, buffers).await
}

/// Filter rules shared by UPDATE and DELETE: a plain `where` is mandatory.
pub(crate) fn required_where(filter: Option<&Filter>) -> Result<&Expr, Unsupported> {
    let filter = filter.ok_or_else(|| Unsupported::new("must have `where` conditions"))?;
    plain_where(filter)
}

pub(crate) fn plain_where(filter: &Filter) -> Result<&Expr, Unsupported> {
    if filter.kind != FilterKind::Where {
        return Err(Unsupported::new(format!(
            "filters `{}` not supported",
            filter.kind.as_str()
        )));
    }
    Ok(&filter.expr)
}

pub(crate) fn log_id(db_name: &str, table: &str, command: Command) -> String {
    format!("{}.{}.{}", db_name, table, command.op())
}

pub(crate) fn new_request(
    logid: String,
    command: Command,
    route: &RouteInfo,
    req: RequestPayload,
) -> CdbPoolRequest {
    CdbPoolRequest {
        logid,
        command,
        bigid: route.big_id,
        need_sql_info: true,
        req,
    }
}

pub(crate) fn reject(command: Command, err: Unsupported) -> CdbError {
    debug!(command = command.as_str(), reason = %err, "statement rejected");
    counter!("cdbpool_unsupported_total", "command" => command.as_str()).increment(1);
    err.into()
}

pub(crate) async fn call_backend(
    conn: &mut dyn Connection,
    ctx: &CallContext,
    req: &CdbPoolRequest,
) -> Result<CdbPoolResponse, CdbError> {
    counter!("cdbpool_statement_total", "command" => req.command.as_str()).increment(1);
    match invoke(&mut *conn, ctx, req).await {
        Ok(resp) => Ok(resp),
        Err(err) => {
            log_failure(&*conn, req, &err);
            counter!("cdbpool_bad_conn_total", "command" => req.command.as_str()).increment(1);
            Err(CdbError::ConnectionBroken(err.to_string()))
        }
    }
}

pub(crate) fn backend_error(
    conn: &dyn Connection,
    req: &CdbPoolRequest,
    resp: CdbPoolResponse,
    fallback: impl FnOnce() -> SqlInfo,
) -> CdbError {
    let sql_info = resp.sql_info.unwrap_or_else(fallback);
    let err = DbError::new(resp.error, resp.err_msg, sql_info);
    log_failure(conn, req, &err);
    counter!("cdbpool_backend_error_total", "command" => req.command.as_str()).increment(1);
    CdbError::Backend(err)
}

/// Success status without the command payload: the exchange is out of sync.
pub(crate) fn missing_payload(conn: &dyn Connection, req: &CdbPoolRequest) -> CdbError {
    let msg = format!("no {} response", req.command.op());
    log_failure(conn, req, &msg);
    counter!("cdbpool_bad_conn_total", "command" => req.command.as_str()).increment(1);
    CdbError::ConnectionBroken(msg)
}

fn log_failure(conn: &dyn Connection, req: &CdbPoolRequest, err: &dyn fmt::Display) {
    error!(
        logid = %req.logid,
        vsid = req.bigid.vsid(),
        conn_id = conn.id(),
        server_addr = conn.addr(),
        error = %err,
        "db.{}",
        req.command.op()
    );
}
