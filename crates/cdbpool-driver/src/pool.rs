use async_trait::async_trait;
use cdbpool_core::error::CdbError;
use cdbpool_sql::conn::{CallContext, Connection, TransportError};
use cdbpool_sql::{dispatch, prepare, BufferPool, Outcome, RouteInfo, Statement};
use metrics::counter;
use std::sync::Mutex;
use tracing::warn;

/// Opens new backend connections for the pool.
#[async_trait]
pub trait Connect: Send + Sync {
    type Conn: Connection + 'static;

    async fn connect(&self) -> Result<Self::Conn, TransportError>;
}

/// Checkout/checkin pool. A connection is owned by exactly one caller between
/// `checkout` and `checkin`; one that reported a broken exchange is dropped.
pub struct ConnPool<K: Connect> {
    connector: K,
    idle: Mutex<Vec<K::Conn>>,
    max_idle: usize,
}

impl<K: Connect> ConnPool<K> {
    pub fn new(connector: K, max_idle: usize) -> Self {
        Self {
            connector,
            idle: Mutex::new(Vec::new()),
            max_idle,
        }
    }

    pub async fn checkout(&self) -> Result<K::Conn, TransportError> {
        let reused = self
            .idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop();
        match reused {
            Some(conn) => Ok(conn),
            None => self.connector.connect().await,
        }
    }

    pub fn checkin(&self, conn: K::Conn, err: Option<&CdbError>) {
        if let Some(err) = err.filter(|err| err.is_bad_conn()) {
            warn!(
                conn_id = conn.id(),
                server_addr = conn.addr(),
                error = %err,
                "discarding connection"
            );
            counter!("cdbpool_conn_discarded_total").increment(1);
            return;
        }
        let mut idle = self
            .idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if idle.len() < self.max_idle {
            idle.push(conn);
        }
    }

    pub fn idle_count(&self) -> usize {
        self.idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Runs one statement on a pooled connection and returns the connection.
    /// Unsupported statements are rejected before a connection is checked out.
    pub async fn run(
        &self,
        stmt: &Statement,
        route: RouteInfo,
        ctx: &CallContext,
        buffers: &BufferPool,
    ) -> Result<Outcome, CdbError> {
        let plan = prepare(stmt)?;
        let mut conn = self
            .checkout()
            .await
            .map_err(|err| CdbError::ConnectionBroken(err.to_string()))?;
        let result = dispatch(&plan, route, &mut conn, ctx, buffers).await;
        self.checkin(conn, result.as_ref().err());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::{Connect, ConnPool};
    use async_trait::async_trait;
    use cdbpool_core::error::CdbError;
    use cdbpool_core::types::BigId;
    use cdbpool_protocol::messages::{
        CdbPoolRequest, CdbPoolResponse, ResponsePayload, ResultCode, UpdateResponse,
    };
    use cdbpool_sql::conn::{CallContext, Connection, TransportError};
    use cdbpool_sql::{parse_sql, BufferPool, RouteInfo};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Clone, Copy)]
    enum Reply {
        Ok,
        Reject,
        Drop,
    }

    struct ScriptedConn {
        id: String,
        reply: Reply,
    }

    #[async_trait]
    impl Connection for ScriptedConn {
        fn id(&self) -> &str {
            &self.id
        }

        fn addr(&self) -> &str {
            "127.0.0.1:0"
        }

        fn db_name(&self) -> &str {
            "orders"
        }

        async fn call(&mut self, _req: &CdbPoolRequest) -> Result<CdbPoolResponse, TransportError> {
            match self.reply {
                Reply::Ok => Ok(CdbPoolResponse::success(ResponsePayload::Update(
                    UpdateResponse {
                        affect_rows: 1,
                        last_insertid: 0,
                    },
                ))),
                Reply::Reject => Ok(CdbPoolResponse::failure(
                    ResultCode::SqlError.code(),
                    "bad column",
                    None,
                )),
                Reply::Drop => Err(TransportError::Closed),
            }
        }
    }

    struct ScriptedConnector {
        reply: Reply,
        opened: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Connect for ScriptedConnector {
        type Conn = ScriptedConn;

        async fn connect(&self) -> Result<ScriptedConn, TransportError> {
            let n = self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(ScriptedConn {
                id: format!("conn-{n}"),
                reply: self.reply,
            })
        }
    }

    fn pool(reply: Reply) -> (ConnPool<ScriptedConnector>, Arc<AtomicUsize>) {
        let opened = Arc::new(AtomicUsize::new(0));
        let connector = ScriptedConnector {
            reply,
            opened: opened.clone(),
        };
        (ConnPool::new(connector, 4), opened)
    }

    async fn run_update(pool: &ConnPool<ScriptedConnector>) -> Result<(), CdbError> {
        let stmts = parse_sql("UPDATE users SET name = 'bob' WHERE id = 1").expect("parse");
        pool.run(
            &stmts[0],
            RouteInfo::new(BigId::new(1)),
            &CallContext::new(),
            &BufferPool::default(),
        )
        .await
        .map(|_| ())
    }

    #[tokio::test]
    async fn healthy_connections_are_reused() {
        let (pool, opened) = pool(Reply::Ok);
        run_update(&pool).await.expect("first");
        run_update(&pool).await.expect("second");
        assert_eq!(opened.load(Ordering::SeqCst), 1);
        assert_eq!(pool.idle_count(), 1);
    }

    #[tokio::test]
    async fn backend_rejections_keep_the_connection() {
        let (pool, opened) = pool(Reply::Reject);
        assert!(run_update(&pool).await.is_err());
        assert!(run_update(&pool).await.is_err());
        assert_eq!(opened.load(Ordering::SeqCst), 1);
        assert_eq!(pool.idle_count(), 1);
    }

    #[tokio::test]
    async fn broken_connections_are_discarded() {
        let (pool, opened) = pool(Reply::Drop);
        let err = run_update(&pool).await.expect_err("broken");
        assert!(err.is_bad_conn());
        assert_eq!(pool.idle_count(), 0);
        run_update(&pool).await.expect_err("broken again");
        assert_eq!(opened.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unsupported_statements_never_open_a_connection() {
        let (pool, opened) = pool(Reply::Ok);
        let stmts = parse_sql("UPDATE users SET name = 'bob'").expect("parse");
        let err = pool
            .run(
                &stmts[0],
                RouteInfo::new(BigId::new(1)),
                &CallContext::new(),
                &BufferPool::default(),
            )
            .await
            .expect_err("unsupported");
        assert!(matches!(err, CdbError::StatementUnsupported(_)));
        assert_eq!(opened.load(Ordering::SeqCst), 0);
        assert_eq!(pool.idle_count(), 0);
    }

    struct RefusingConnector;

    #[async_trait]
    impl Connect for RefusingConnector {
        type Conn = ScriptedConn;

        async fn connect(&self) -> Result<ScriptedConn, TransportError> {
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused").into())
        }
    }

    #[tokio::test]
    async fn unsupported_statement_wins_over_unreachable_backend() {
        let pool = ConnPool::new(RefusingConnector, 4);
        let stmts = parse_sql("UPDATE users SET name = 'bob'").expect("parse");
        let err = pool
            .run(
                &stmts[0],
                RouteInfo::new(BigId::new(1)),
                &CallContext::new(),
                &BufferPool::default(),
            )
            .await
            .expect_err("unsupported");
        assert!(
            matches!(err, CdbError::StatementUnsupported(ref msg) if msg.contains("`where`")),
            "unexpected error: {err}"
        );

        let stmts = parse_sql("UPDATE users SET name = 'bob' WHERE id = 1").expect("parse");
        let err = pool
            .run(
                &stmts[0],
                RouteInfo::new(BigId::new(1)),
                &CallContext::new(),
                &BufferPool::default(),
            )
            .await
            .expect_err("refused");
        assert!(err.is_bad_conn());
    }
}
