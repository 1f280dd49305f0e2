use crate::types::SqlInfo;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CdbError {
    #[error("statement unsupported: {0}")]
    StatementUnsupported(String),
    #[error("bad connection: {0}")]
    ConnectionBroken(String),
    #[error(transparent)]
    Backend(#[from] DbError),
}

impl CdbError {
    /// True when the connection that produced this error must not be reused.
    pub fn is_bad_conn(&self) -> bool {
        matches!(self, CdbError::ConnectionBroken(_))
    }

    pub fn db_error(&self) -> Option<&DbError> {
        match self {
            CdbError::Backend(err) => Some(err),
            _ => None,
        }
    }
}

/// Statement rejected by the backend. The connection stays healthy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct DbError {
    pub code: i32,
    pub message: String,
    pub sql_info: SqlInfo,
}

impl DbError {
    pub fn new(code: i32, message: impl Into<String>, sql_info: SqlInfo) -> Self {
        Self {
            code,
            message: message.into(),
            sql_info,
        }
    }
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "db error {}: {} (db={}, vsid={}, sql={})",
            self.code, self.message, self.sql_info.dbname, self.sql_info.vsid, self.sql_info.sql
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{CdbError, DbError};
    use crate::types::SqlInfo;

    #[test]
    fn only_connection_broken_is_bad_conn() {
        assert!(CdbError::ConnectionBroken("eof".into()).is_bad_conn());
        assert!(!CdbError::StatementUnsupported("limit".into()).is_bad_conn());
        let backend = CdbError::from(DbError::new(3, "dup", SqlInfo::default()));
        assert!(!backend.is_bad_conn());
        assert_eq!(backend.db_error().map(|e| e.code), Some(3));
    }

    #[test]
    fn db_error_display_carries_context() {
        let err = DbError::new(
            7,
            "duplicate entry",
            SqlInfo {
                sql: "UPDATE t SET a = 1 WHERE id = 2".into(),
                vsid: 12,
                dbname: "orders".into(),
            },
        );
        let text = err.to_string();
        assert!(text.contains("db error 7"));
        assert!(text.contains("db=orders"));
        assert!(text.contains("vsid=12"));
        assert!(text.contains("UPDATE t SET a = 1 WHERE id = 2"));
    }
}
