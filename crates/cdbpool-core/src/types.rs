use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of low bits of a big id that belong to the row-level part of the key.
/// Everything above them is the virtual shard id.
pub const VSID_SHIFT: u32 = 48;

/// Routing key attached to every request. Derivation from row values happens
/// outside this crate; here it is an opaque 64-bit value whose upper bits name
/// the virtual shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BigId(pub u64);

impl BigId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn from_parts(vsid: u16, local: u64) -> Self {
        Self((u64::from(vsid) << VSID_SHIFT) | (local & ((1u64 << VSID_SHIFT) - 1)))
    }

    pub fn raw(self) -> u64 {
        self.0
    }

    pub fn vsid(self) -> i32 {
        (self.0 >> VSID_SHIFT) as i32
    }
}

impl fmt::Display for BigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Diagnostic context attached to backend errors.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SqlInfo {
    pub sql: String,
    pub vsid: i32,
    pub dbname: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecResult {
    pub rows_affected: i64,
    pub last_insert_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    Null,
    Int64(i64),
    Float64(f64),
    Bool(bool),
    String(String),
    Bytes(Vec<u8>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::String(v) => f.write_str(v),
            Value::Bytes(v) => write!(f, "{}", String::from_utf8_lossy(v)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}
