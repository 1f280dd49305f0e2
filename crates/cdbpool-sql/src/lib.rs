pub mod buffer;
pub mod conn;
pub mod executor;
pub mod parser;
pub mod planner;
pub mod render;
pub mod route;

pub use buffer::{BufferPool, PooledBuffer};
pub use conn::{CallContext, Connection, TransportError};
pub use executor::{dispatch, execute, prepare, Outcome};
pub use parser::parse_sql;
pub use planner::Plan;
pub use route::RouteInfo;
pub use sqlparser::ast::Statement;
