use super::{backend_error, call_backend, log_id, missing_payload, new_request, reject, Unsupported};
use crate::buffer::BufferPool;
use crate::conn::{CallContext, Connection};
use crate::planner::{InsertSource, InsertStmt};
use crate::render::{render, render_list, render_rows};
use crate::route::RouteInfo;
use cdbpool_core::error::CdbError;
use cdbpool_core::types::{ExecResult, SqlInfo};
use cdbpool_protocol::messages::{Command, OriInsertRequest, RequestPayload};
use sqlparser::ast::Expr;

const COMMAND: Command = Command::OriInsert;

pub struct InsertExecutor<'a> {
    route: RouteInfo,
    ctx: &'a CallContext,
    conn: &'a mut dyn Connection,
    buffers: &'a BufferPool,
    stmt: &'a InsertStmt,
}

impl<'a> InsertExecutor<'a> {
    pub fn new(
        route: RouteInfo,
        ctx: &'a CallContext,
        conn: &'a mut dyn Connection,
        buffers: &'a BufferPool,
        stmt: &'a InsertStmt,
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
        let rows = validate(stmt).map_err(|err| reject(COMMAND, err))?;

        let db_name = route.resolve_db_name(stmt.table.db(), conn.db_name());
        let table = render(buffers, &stmt.table.name);
        let req = new_request(
            log_id(&db_name, &table, COMMAND),
            COMMAND,
            &route,
            RequestPayload::OriInsert(OriInsertRequest {
                dbname: db_name.clone(),
                table,
                columns: render_list(buffers, &stmt.columns),
                values: render_rows(buffers, rows),
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
        let insert = resp
            .insert_resp()
            .ok_or_else(|| missing_payload(&*conn, &req))?;
        Ok(ExecResult {
            rows_affected: insert.affect_rows as i64,
            last_insert_id: insert.last_insertid as i64,
        })
    }
}

/// Only literal `VALUES` lists of consistent width can be forwarded.
pub fn validate(stmt: &InsertStmt) -> Result<&[Vec<Expr>], Unsupported> {
    if stmt.on_duplicate {
        return Err(Unsupported::new("`on duplicate key update` not supported"));
    }
    let rows = match &stmt.source {
        InsertSource::Values(rows) => rows,
        InsertSource::Query(_) => return Err(Unsupported::new("`insert ... select` not supported")),
        InsertSource::DefaultValues => {
            return Err(Unsupported::new("`default values` not supported"))
        }
    };
    let Some(first) = rows.first() else {
        return Err(Unsupported::new("insert needs at least one row"));
    };
    let width = if stmt.columns.is_empty() {
        first.len()
    } else {
        stmt.columns.len()
    };
    if let Some((idx, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != width) {
        return Err(Unsupported::new(format!(
            "row {} has {} values, expected {}",
            idx + 1,
            row.len(),
            width
        )));
    }
    Ok(rows)
}
