use async_trait::async_trait;
use cdbpool_protocol::codec::CodecError;
use cdbpool_protocol::messages::{CdbPoolRequest, CdbPoolResponse};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("call timed out after {0:?}")]
    Timeout(Duration),
    #[error("call cancelled")]
    Cancelled,
    #[error("connection closed")]
    Closed,
}

/// One checked-out backend connection.
///
/// `call` takes `&mut self`: a connection serves a single in-flight request at a
/// time and the pool hands out exclusive borrows. Implementations do one round
/// trip and never retry.
#[async_trait]
pub trait Connection: Send + Sync {
    fn id(&self) -> &str;

    fn addr(&self) -> &str;

    /// Database used when the statement does not name one.
    fn db_name(&self) -> &str;

    async fn call(&mut self, req: &CdbPoolRequest) -> Result<CdbPoolResponse, TransportError>;
}

/// Deadline and cancellation for a single call.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    pub timeout: Option<Duration>,
    pub cancel: CancellationToken,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Runs `conn.call` bounded by the context. An abandoned call leaves the
/// connection in an unknown state, so callers must treat every error here as
/// fatal for the connection.
pub async fn invoke(
    conn: &mut dyn Connection,
    ctx: &CallContext,
    req: &CdbPoolRequest,
) -> Result<CdbPoolResponse, TransportError> {
    let call = conn.call(req);
    match ctx.timeout {
        Some(limit) => tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => Err(TransportError::Cancelled),
            res = tokio::time::timeout(limit, call) => match res {
                Ok(res) => res,
                Err(_) => Err(TransportError::Timeout(limit)),
            },
        },
        None => tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => Err(TransportError::Cancelled),
            res = call => res,
        },
    }
}
