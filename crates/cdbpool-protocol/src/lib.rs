pub mod codec;
pub mod messages;

pub use codec::{read_frame, write_frame, CodecError};
pub use messages::{
    CdbPoolRequest, CdbPoolResponse, Command, DeleteResponse, InsertResponse, OriDeleteRequest,
    OriInsertRequest, OriSelectRequest, OriUpdateRequest, RequestPayload, ResponsePayload,
    ResultCode, SelectResponse, UpdateResponse,
};
