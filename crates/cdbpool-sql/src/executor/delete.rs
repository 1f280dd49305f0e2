use super::{
    backend_error, call_backend, log_id, missing_payload, new_request, reject, required_where,
    Unsupported,
};
use crate::buffer::BufferPool;
use crate::conn::{CallContext, Connection};
use crate::planner::DeleteStmt;
use crate::render::render;
use crate::route::RouteInfo;
use cdbpool_core::error::CdbError;
use cdbpool_core::types::{ExecResult, SqlInfo};
use cdbpool_protocol::messages::{Command, OriDeleteRequest, RequestPayload};
use sqlparser::ast::Expr;

const COMMAND: Command = Command::OriDelete;

pub struct DeleteExecutor<'a> {
    route: RouteInfo,
    ctx: &'a CallContext,
    conn: &'a mut dyn Connection,
    buffers: &'a BufferPool,
    stmt: &'a DeleteStmt,
}

impl<'a> DeleteExecutor<'a> {
    pub fn new(
        route: RouteInfo,
        ctx: &'a CallContext,
        conn: &'a mut dyn Connection,
        buffers: &'a BufferPool,
        stmt: &'a DeleteStmt,
    ) -> Self {
        Self {
            route,
            ctx,
            conn,
            buffers,
            stmt,
        }
    }

    pub async fn run(self) -> Result<ExecResult, CdbError> {
        let Self {
            route,
            ctx,
            conn,
            buffers,
            stmt,
        } = self;
        let filter = validate(stmt).map_err(|err| reject(COMMAND, err))?;

        let db_name = route.resolve_db_name(stmt.table.db(), conn.db_name());
        let table = render(buffers, &stmt.table.name);
        let req = new_request(
            log_id(&db_name, &table, COMMAND),
            COMMAND,
            &route,
            RequestPayload::OriDelete(OriDeleteRequest {
                dbname: db_name.clone(),
                table,
                complex_filter: render(buffers, filter),
            }),
        );

        let resp = call_backend(&mut *conn, ctx, &req).await?;
        if !resp.is_success() {
            return Err(backend_error(&*conn, &req, resp, || SqlInfo {
                sql: stmt.to_string(),
                vsid: route.big_id.vsid(),
                dbname: db_name.clone(),
            }));
        }
        let delete = resp
            .delete_resp()
            .ok_or_else(|| missing_payload(&*conn, &req))?;
        Ok(ExecResult {
            rows_affected: delete.affect_rows as i64,
            last_insert_id: 0,
        })
    }
}

/// Same guards as UPDATE: a full-table or row-limited delete cannot be sent.
pub fn validate(stmt: &DeleteStmt) -> Result<&Expr, Unsupported> {
    let filter = required_where(stmt.filter.as_ref())?;
    if stmt.limit.is_some() {
        return Err(Unsupported::new("`limit` not supported"));
    }
    if !stmt.order_by.is_empty() {
        return Err(Unsupported::new("`order by` not supported"));
    }
    Ok(filter)
}
