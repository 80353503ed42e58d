/// Status codes written through `error_code` out-parameters.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommStatus {
    Ok = 0,
    InvalidArgument = 1,
    TransportError = 2,
    FrameError = 3,
    NotInitialized = 4,
    AlreadyInitialized = 5,
    Timeout = 6,
    Stopped = 7,
    Internal = 99,
}

pub const COMM_OK: CommStatus = CommStatus::Ok;
pub const COMM_ERR_INVALID_ARGUMENT: CommStatus = CommStatus::InvalidArgument;
pub const COMM_ERR_TRANSPORT: CommStatus = CommStatus::TransportError;
pub const COMM_ERR_FRAME: CommStatus = CommStatus::FrameError;
pub const COMM_ERR_NOT_INITIALIZED: CommStatus = CommStatus::NotInitialized;
pub const COMM_ERR_ALREADY_INITIALIZED: CommStatus = CommStatus::AlreadyInitialized;
pub const COMM_ERR_TIMEOUT: CommStatus = CommStatus::Timeout;
pub const COMM_ERR_STOPPED: CommStatus = CommStatus::Stopped;
pub const COMM_ERR_INTERNAL: CommStatus = CommStatus::Internal;

/// Largest payload accepted by `comm_p2p_endpoint_send`.
pub const COMM_MAX_PAYLOAD_SIZE: usize = commlink_frame::MAX_PAYLOAD_SIZE;
