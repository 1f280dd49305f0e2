use crate::config::BackendConfig;
use crate::pool::Connect;
use async_trait::async_trait;
use cdbpool_protocol::codec::{read_frame, write_frame};
use cdbpool_protocol::messages::{CdbPoolRequest, CdbPoolResponse};
use cdbpool_sql::conn::{Connection, TransportError};
use tokio::net::TcpStream;
use tracing::debug;
use uuid::Uuid;

/// Backend connection speaking length-prefixed bincode frames over TCP.
#[derive(Debug)]
pub struct TcpConnection {
    id: String,
    addr: String,
    db_name: String,
    stream: TcpStream,
    max_frame: usize,
}

impl TcpConnection {
    pub async fn connect(
        addr: &str,
        db_name: &str,
        max_frame: usize,
    ) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let id = Uuid::new_v4().to_string();
        debug!(conn_id = %id, server_addr = addr, "backend connected");
        Ok(Self {
            id,
            addr: addr.to_string(),
            db_name: db_name.to_string(),
            stream,
            max_frame,
        })
    }
}

#[async_trait]
impl Connection for TcpConnection {
    fn id(&self) -> &str {
        &self.id
    }

    fn addr(&self) -> &str {
        &self.addr
    }

    fn db_name(&self) -> &str {
        &self.db_name
    }

    async fn call(&mut self, req: &CdbPoolRequest) -> Result<CdbPoolResponse, TransportError> {
        write_frame(&mut self.stream, req, self.max_frame).await?;
        let resp = read_frame(&mut self.stream, self.max_frame).await?;
        Ok(resp)
    }
}

#[derive(Debug, Clone)]
pub struct TcpConnector {
    addr: String,
    db_name: String,
    max_frame: usize,
}

impl TcpConnector {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            addr: config.addr.clone(),
            db_name: config.db_name.clone(),
            max_frame: config.max_frame_bytes,
        }
    }
}

#[async_trait]
impl Connect for TcpConnector {
    type Conn = TcpConnection;

    async fn connect(&self) -> Result<TcpConnection, TransportError> {
        TcpConnection::connect(&self.addr, &self.db_name, self.max_frame).await
    }
}
