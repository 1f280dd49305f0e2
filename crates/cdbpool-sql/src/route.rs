use cdbpool_core::types::BigId;

/// Where a single statement is sent: database and shard key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteInfo {
    pub db_name: Option<String>,
    pub big_id: BigId,
}

impl RouteInfo {
    pub fn new(big_id: BigId) -> Self {
        Self {
            db_name: None,
            big_id,
        }
    }

    pub fn with_db_name(mut self, db_name: impl Into<String>) -> Self {
        let db_name = db_name.into();
        self.db_name = if db_name.is_empty() { None } else { Some(db_name) };
        self
    }

    /// Picks the database for a request: the route's own name, then the
    /// qualifier written in the statement, then the connection's default.
    pub fn resolve_db_name(&self, stmt_db_name: Option<&str>, conn_db_name: &str) -> String {
        [self.db_name.as_deref(), stmt_db_name]
            .into_iter()
            .flatten()
            .find(|name| !name.is_empty())
            .unwrap_or(conn_db_name)
            .to_string()
    }
}
