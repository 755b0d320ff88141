//! # tabledb-protocol
//!
//! Binary wire protocol spoken between tabledb clients and the table service.
//!
//! This crate provides:
//! - Primitive big-endian encoding of integers, strings, durations and timestamps
//! - Serial version tracking with one-way downgrade
//! - Validation and encoding of DDL and table requests
//! - Status-code mapping and decoding of responses

pub mod codec;
pub mod error;
pub mod opcode;
pub mod options;
pub mod request;
pub mod response;
pub mod version;

pub use codec::{WireReader, WireWriter};
pub use error::{ErrorCode, WireError};
pub use opcode::OpCode;
pub use options::{
    validate_table_limits, validate_timeout_and_poll_delay, TableDdlOptions, TableLimits,
};
pub use request::{
    AddReplicaRequest, GetTableRequest, Request, RequestHeader, RequestSerializer, TableRequest,
    TableUsageRequest,
};
pub use response::{
    decode_response, read_and_check_error, Response, ResponseWriter, TableResult, TableState,
    TableUsageResult, UsageRecord,
};
pub use version::{SerialVersion, VersionNegotiator};

/// Content type announced to the transport for every request body.
pub const CONTENT_TYPE: &str = "application/octet-stream";

/// Maximum encoded request size (2 MiB).
pub const MAX_REQUEST_SIZE: usize = 2 * 1024 * 1024;
