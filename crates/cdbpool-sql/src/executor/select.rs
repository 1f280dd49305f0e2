use super::{
    backend_error, call_backend, log_id, missing_payload, new_request, plain_where, reject,
    Unsupported,
};
use crate::buffer::BufferPool;
use crate::conn::{CallContext, Connection};
use crate::planner::SelectStmt;
use crate::render::{render, render_list, render_opt};
use crate::route::RouteInfo;
use cdbpool_core::error::CdbError;
use cdbpool_core::types::{QueryResult, SqlInfo};
use cdbpool_protocol::messages::{Command, OriSelectRequest, RequestPayload};
use sqlparser::ast::Expr;

const COMMAND: Command = Command::OriSelect;

pub struct SelectExecutor<'a> {
    route: RouteInfo,
    ctx: &'a CallContext,
    conn: &'a mut dyn Connection,
    buffers: &'a BufferPool,
    stmt: &'a SelectStmt,
}

impl<'a> SelectExecutor<'a> {
    pub fn new(
        route: RouteInfo,
        ctx: &'a CallContext,
        conn: &'a mut dyn Connection,
        buffers: &'a BufferPool,
        stmt: &'a SelectStmt,
    ) -> Self {
        Self {
            route,
            ctx,
            conn,
            buffers,
            stmt,
        }
    }

    pub async fn run(self) -> Result<QueryResult, CdbError> {
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
            RequestPayload::OriSelect(OriSelectRequest {
                dbname: db_name.clone(),
                table,
                fields: render_list(buffers, &stmt.projection),
                complex_filter: render_opt(buffers, filter),
                order_by: render_list(buffers, &stmt.order_by),
                limit: render_opt(buffers, stmt.limit.as_ref()),
                offset: render_opt(buffers, stmt.offset.as_ref()),
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
        let select = resp
            .select_resp()
            .ok_or_else(|| missing_payload(&*conn, &req))?;
        Ok(QueryResult {
            columns: select.columns.clone(),
            rows: select.rows.clone(),
        })
    }
}

/// A single-shard read: one table, no grouping, optional plain filter.
pub fn validate(stmt: &SelectStmt) -> Result<Option<&Expr>, Unsupported> {
    if !stmt.joins.is_empty() {
        return Err(Unsupported::new("joins not supported"));
    }
    if !stmt.group_by.is_empty() {
        return Err(Unsupported::new("`group by` not supported"));
    }
    if stmt.having.is_some() {
        return Err(Unsupported::new("`having` not supported"));
    }
    if stmt.distinct {
        return Err(Unsupported::new("`distinct` not supported"));
    }
    stmt.filter.as_ref().map(plain_where).transpose()
}
