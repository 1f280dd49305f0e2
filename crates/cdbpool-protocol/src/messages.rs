use cdbpool_core::types::{BigId, SqlInfo, Value};
use serde::{Deserialize, Serialize};

/// Status codes carried in `CdbPoolResponse::error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ResultCode {
    Success = 0,
    InvalidRequest = 1,
    SqlError = 2,
    ShardUnavailable = 3,
    Timeout = 4,
    Internal = 5,
}

impl ResultCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn is_success(code: i32) -> bool {
        code == ResultCode::Success.code()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    #[serde(rename = "ori_update")]
    OriUpdate,
    #[serde(rename = "ori_insert")]
    OriInsert,
    #[serde(rename = "ori_delete")]
    OriDelete,
    #[serde(rename = "ori_select")]
    OriSelect,
}

impl Command {
    pub fn as_str(self) -> &'static str {
        match self {
            Command::OriUpdate => "ori_update",
            Command::OriInsert => "ori_insert",
            Command::OriDelete => "ori_delete",
            Command::OriSelect => "ori_select",
        }
    }

    /// Operation suffix used in log ids, e.g. `orders.users.update`.
    pub fn op(self) -> &'static str {
        match self {
            Command::OriUpdate => "update",
            Command::OriInsert => "insert",
            Command::OriDelete => "delete",
            Command::OriSelect => "select",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CdbPoolRequest {
    pub logid: String,
    pub command: Command,
    pub bigid: BigId,
    pub need_sql_info: bool,
    pub req: RequestPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RequestPayload {
    OriUpdate(OriUpdateRequest),
    OriInsert(OriInsertRequest),
    OriDelete(OriDeleteRequest),
    OriSelect(OriSelectRequest),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriUpdateRequest {
    pub dbname: String,
    pub table: String,
    pub sets: String,
    pub complex_filter: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriInsertRequest {
    pub dbname: String,
    pub table: String,
    pub columns: String,
    pub values: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriDeleteRequest {
    pub dbname: String,
    pub table: String,
    pub complex_filter: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriSelectRequest {
    pub dbname: String,
    pub table: String,
    pub fields: String,
    pub complex_filter: String,
    pub order_by: String,
    pub limit: String,
    pub offset: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CdbPoolResponse {
    pub error: i32,
    pub err_msg: String,
    pub sql_info: Option<SqlInfo>,
    pub resp: Option<ResponsePayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResponsePayload {
    Update(UpdateResponse),
    Insert(InsertResponse),
    Delete(DeleteResponse),
    Select(SelectResponse),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UpdateResponse {
    pub affect_rows: u64,
    pub last_insertid: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InsertResponse {
    pub affect_rows: u64,
    pub last_insertid: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub affect_rows: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SelectResponse {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl CdbPoolResponse {
    pub fn success(resp: ResponsePayload) -> Self {
        Self {
            error: ResultCode::Success.code(),
            err_msg: String::new(),
            sql_info: None,
            resp: Some(resp),
        }
    }

    pub fn failure(code: i32, err_msg: impl Into<String>, sql_info: Option<SqlInfo>) -> Self {
        Self {
            error: code,
            err_msg: err_msg.into(),
            sql_info,
            resp: None,
        }
    }

    pub fn is_success(&self) -> bool {
        ResultCode::is_success(self.error)
    }

    pub fn update_resp(&self) -> Option<&UpdateResponse> {
        match &self.resp {
            Some(ResponsePayload::Update(r)) => Some(r),
            _ => None,
        }
    }

    pub fn insert_resp(&self) -> Option<&InsertResponse> {
        match &self.resp {
            Some(ResponsePayload::Insert(r)) => Some(r),
            _ => None,
        }
    }

    pub fn delete_resp(&self) -> Option<&DeleteResponse> {
        match &self.resp {
            Some(ResponsePayload::Delete(r)) => Some(r),
            _ => None,
        }
    }

    pub fn select_resp(&self) -> Option<&SelectResponse> {
        match &self.resp {
            Some(ResponsePayload::Select(r)) => Some(r),
            _ => None,
        }
    }
}
