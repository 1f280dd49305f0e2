pub mod error;
pub mod types;

pub use error::{CdbError, DbError};
pub use types::{BigId, ExecResult, QueryResult, SqlInfo, Value};
