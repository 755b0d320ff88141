//! Wire error types and the service status-code table.

use crate::version::SerialVersion;
use std::fmt;
use thiserror::Error;

/// Errors raised while validating, encoding or decoding protocol messages.
#[derive(Debug, Error)]
pub enum WireError {
    /// Local validation failed before any byte was written.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("truncated input: need {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("invalid UTF-8 in string field")]
    InvalidUtf8,

    #[error("malformed message: {0}")]
    Malformed(String),

    /// The operation or field does not exist at the negotiated serial version.
    #[error("{feature} requires serial version {required}, negotiated {negotiated}")]
    UnsupportedFeature {
        feature: String,
        required: SerialVersion,
        negotiated: SerialVersion,
    },

    /// The service answered with a nonzero status code.
    #[error("service error: {code} - {message}")]
    Service { code: ErrorCode, message: String },
}

impl WireError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        WireError::InvalidArgument(msg.into())
    }

    /// Returns whether this error came from malformed or truncated wire data.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            WireError::Truncated { .. } | WireError::InvalidUtf8 | WireError::Malformed(_)
        )
    }

    /// Returns whether the service rejected the serial version used.
    pub fn is_unsupported_protocol(&self) -> bool {
        matches!(
            self,
            WireError::Service {
                code: ErrorCode::UnsupportedProtocol,
                ..
            }
        )
    }

    /// Returns whether this error is potentially retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            WireError::Service { code, .. } => code.is_retryable(),
            _ => false,
        }
    }
}

/// Service status codes carried in the first byte of every response.
///
/// The numeric values are part of the protocol contract and must remain
/// stable. Codes not listed here decode to [`ErrorCode::Unrecognized`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    UnknownOperation,
    TableNotFound,
    IndexNotFound,
    IllegalArgument,
    RowSizeLimitExceeded,
    KeySizeLimitExceeded,
    BatchOpNumberLimitExceeded,
    RequestSizeLimitExceeded,
    TableExists,
    IndexExists,
    InvalidAuthorization,
    InsufficientPermission,
    ResourceExists,
    ResourceNotFound,
    TableLimitExceeded,
    IndexLimitExceeded,
    BadProtocolMessage,
    EvolutionLimitExceeded,
    TableDeploymentLimitExceeded,
    TenantDeploymentLimitExceeded,
    OperationNotSupported,
    EtagMismatch,
    CannotCancelWorkRequest,
    UnsupportedProtocol,
    TableNotReady,

    // Throttling
    ReadLimitExceeded,
    WriteLimitExceeded,
    SizeLimitExceeded,
    OperationLimitExceeded,

    // Service availability
    RequestTimeout,
    ServerError,
    ServiceUnavailable,
    TableBusy,
    SecurityInfoUnavailable,
    RetryAuthentication,
    UnknownError,
    IllegalState,

    /// A nonzero status this client does not know about.
    Unrecognized(u8),
}

impl ErrorCode {
    /// Status byte of a successful response.
    pub const SUCCESS: u8 = 0;

    /// Maps a nonzero status byte to its error code.
    ///
    /// Returns `None` for [`ErrorCode::SUCCESS`]; every other value maps to
    /// some variant, falling back to [`ErrorCode::Unrecognized`].
    pub fn from_status(status: u8) -> Option<Self> {
        let code = match status {
            Self::SUCCESS => return None,
            1 => ErrorCode::UnknownOperation,
            2 => ErrorCode::TableNotFound,
            3 => ErrorCode::IndexNotFound,
            4 => ErrorCode::IllegalArgument,
            5 => ErrorCode::RowSizeLimitExceeded,
            6 => ErrorCode::KeySizeLimitExceeded,
            7 => ErrorCode::BatchOpNumberLimitExceeded,
            8 => ErrorCode::RequestSizeLimitExceeded,
            9 => ErrorCode::TableExists,
            10 => ErrorCode::IndexExists,
            11 => ErrorCode::InvalidAuthorization,
            12 => ErrorCode::InsufficientPermission,
            13 => ErrorCode::ResourceExists,
            14 => ErrorCode::ResourceNotFound,
            15 => ErrorCode::TableLimitExceeded,
            16 => ErrorCode::IndexLimitExceeded,
            17 => ErrorCode::BadProtocolMessage,
            18 => ErrorCode::EvolutionLimitExceeded,
            19 => ErrorCode::TableDeploymentLimitExceeded,
            20 => ErrorCode::TenantDeploymentLimitExceeded,
            21 => ErrorCode::OperationNotSupported,
            22 => ErrorCode::EtagMismatch,
            23 => ErrorCode::CannotCancelWorkRequest,
            24 => ErrorCode::UnsupportedProtocol,
            26 => ErrorCode::TableNotReady,
            50 => ErrorCode::ReadLimitExceeded,
            51 => ErrorCode::WriteLimitExceeded,
            52 => ErrorCode::SizeLimitExceeded,
            53 => ErrorCode::OperationLimitExceeded,
            100 => ErrorCode::RequestTimeout,
            101 => ErrorCode::ServerError,
            102 => ErrorCode::ServiceUnavailable,
            103 => ErrorCode::TableBusy,
            104 => ErrorCode::SecurityInfoUnavailable,
            105 => ErrorCode::RetryAuthentication,
            125 => ErrorCode::UnknownError,
            126 => ErrorCode::IllegalState,
            other => ErrorCode::Unrecognized(other),
        };
        Some(code)
    }

    /// Returns the status byte for this code.
    pub fn status(&self) -> u8 {
        match self {
            ErrorCode::UnknownOperation => 1,
            ErrorCode::TableNotFound => 2,
            ErrorCode::IndexNotFound => 3,
            ErrorCode::IllegalArgument => 4,
            ErrorCode::RowSizeLimitExceeded => 5,
            ErrorCode::KeySizeLimitExceeded => 6,
            ErrorCode::BatchOpNumberLimitExceeded => 7,
            ErrorCode::RequestSizeLimitExceeded => 8,
            ErrorCode::TableExists => 9,
            ErrorCode::IndexExists => 10,
            ErrorCode::InvalidAuthorization => 11,
            ErrorCode::InsufficientPermission => 12,
            ErrorCode::ResourceExists => 13,
            ErrorCode::ResourceNotFound => 14,
            ErrorCode::TableLimitExceeded => 15,
            ErrorCode::IndexLimitExceeded => 16,
            ErrorCode::BadProtocolMessage => 17,
            ErrorCode::EvolutionLimitExceeded => 18,
            ErrorCode::TableDeploymentLimitExceeded => 19,
            ErrorCode::TenantDeploymentLimitExceeded => 20,
            ErrorCode::OperationNotSupported => 21,
            ErrorCode::EtagMismatch => 22,
            ErrorCode::CannotCancelWorkRequest => 23,
            ErrorCode::UnsupportedProtocol => 24,
            ErrorCode::TableNotReady => 26,
            ErrorCode::ReadLimitExceeded => 50,
            ErrorCode::WriteLimitExceeded => 51,
            ErrorCode::SizeLimitExceeded => 52,
            ErrorCode::OperationLimitExceeded => 53,
            ErrorCode::RequestTimeout => 100,
            ErrorCode::ServerError => 101,
            ErrorCode::ServiceUnavailable => 102,
            ErrorCode::TableBusy => 103,
            ErrorCode::SecurityInfoUnavailable => 104,
            ErrorCode::RetryAuthentication => 105,
            ErrorCode::UnknownError => 125,
            ErrorCode::IllegalState => 126,
            ErrorCode::Unrecognized(code) => *code,
        }
    }

    /// Returns whether this error is potentially retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::ReadLimitExceeded
                | ErrorCode::WriteLimitExceeded
                | ErrorCode::SizeLimitExceeded
                | ErrorCode::OperationLimitExceeded
                | ErrorCode::RequestTimeout
                | ErrorCode::ServiceUnavailable
                | ErrorCode::TableBusy
                | ErrorCode::SecurityInfoUnavailable
                | ErrorCode::RetryAuthentication
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCode::UnknownOperation => "UNKNOWN_OPERATION",
            ErrorCode::TableNotFound => "TABLE_NOT_FOUND",
            ErrorCode::IndexNotFound => "INDEX_NOT_FOUND",
            ErrorCode::IllegalArgument => "ILLEGAL_ARGUMENT",
            ErrorCode::RowSizeLimitExceeded => "ROW_SIZE_LIMIT_EXCEEDED",
            ErrorCode::KeySizeLimitExceeded => "KEY_SIZE_LIMIT_EXCEEDED",
            ErrorCode::BatchOpNumberLimitExceeded => "BATCH_OP_NUMBER_LIMIT_EXCEEDED",
            ErrorCode::RequestSizeLimitExceeded => "REQUEST_SIZE_LIMIT_EXCEEDED",
            ErrorCode::TableExists => "TABLE_EXISTS",
            ErrorCode::IndexExists => "INDEX_EXISTS",
            ErrorCode::InvalidAuthorization => "INVALID_AUTHORIZATION",
            ErrorCode::InsufficientPermission => "INSUFFICIENT_PERMISSION",
            ErrorCode::ResourceExists => "RESOURCE_EXISTS",
            ErrorCode::ResourceNotFound => "RESOURCE_NOT_FOUND",
            ErrorCode::TableLimitExceeded => "TABLE_LIMIT_EXCEEDED",
            ErrorCode::IndexLimitExceeded => "INDEX_LIMIT_EXCEEDED",
            ErrorCode::BadProtocolMessage => "BAD_PROTOCOL_MESSAGE",
            ErrorCode::EvolutionLimitExceeded => "EVOLUTION_LIMIT_EXCEEDED",
            ErrorCode::TableDeploymentLimitExceeded => "TABLE_DEPLOYMENT_LIMIT_EXCEEDED",
            ErrorCode::TenantDeploymentLimitExceeded => "TENANT_DEPLOYMENT_LIMIT_EXCEEDED",
            ErrorCode::OperationNotSupported => "OPERATION_NOT_SUPPORTED",
            ErrorCode::EtagMismatch => "ETAG_MISMATCH",
            ErrorCode::CannotCancelWorkRequest => "CANNOT_CANCEL_WORK_REQUEST",
            ErrorCode::UnsupportedProtocol => "UNSUPPORTED_PROTOCOL",
            ErrorCode::TableNotReady => "TABLE_NOT_READY",
            ErrorCode::ReadLimitExceeded => "READ_LIMIT_EXCEEDED",
            ErrorCode::WriteLimitExceeded => "WRITE_LIMIT_EXCEEDED",
            ErrorCode::SizeLimitExceeded => "SIZE_LIMIT_EXCEEDED",
            ErrorCode::OperationLimitExceeded => "OPERATION_LIMIT_EXCEEDED",
            ErrorCode::RequestTimeout => "REQUEST_TIMEOUT",
            ErrorCode::ServerError => "SERVER_ERROR",
            ErrorCode::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ErrorCode::TableBusy => "TABLE_BUSY",
            ErrorCode::SecurityInfoUnavailable => "SECURITY_INFO_UNAVAILABLE",
            ErrorCode::RetryAuthentication => "RETRY_AUTHENTICATION",
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
            ErrorCode::IllegalState => "ILLEGAL_STATE",
            ErrorCode::Unrecognized(code) => return write!(f, "UNRECOGNIZED({})", code),
        };
        f.write_str(name)
    }
}
