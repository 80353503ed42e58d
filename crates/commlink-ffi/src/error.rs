use std::cell::RefCell;
use std::ffi::CString;
use std::os::raw::c_char;

use commlink_endpoint::EndpointError;

use crate::types::CommStatus;

thread_local! {
    static LAST_ERROR: RefCell<CString> = RefCell::new(CString::default());
}

pub(crate) fn clear_error_state() {
    LAST_ERROR.with(|state| {
        *state.borrow_mut() = CString::default();
    });
}

pub(crate) fn set_error_message(message: impl Into<String>) {
    let message = message.into();
    let sanitized = message.replace('\0', "?");
    LAST_ERROR.with(|state| {
        *state.borrow_mut() = CString::new(sanitized).unwrap_or_default();
    });
}

pub(crate) fn set_invalid_argument(message: impl Into<String>) -> CommStatus {
    set_error_message(message);
    CommStatus::InvalidArgument
}

pub(crate) fn set_status(status: CommStatus, message: impl Into<String>) -> CommStatus {
    set_error_message(message);
    status
}

pub(crate) fn set_panic_error() {
    set_error_message("panic across FFI boundary");
}

pub(crate) fn map_endpoint_error(err: &EndpointError) -> CommStatus {
    set_error_message(err.to_string());
    match err {
        EndpointError::Transport(_) => CommStatus::TransportError,
        EndpointError::Frame(_) => CommStatus::FrameError,
        EndpointError::Stopped => CommStatus::Stopped,
        EndpointError::Timeout(_) => CommStatus::Timeout,
        EndpointError::InvalidState { .. } | EndpointError::Spawn { .. } => CommStatus::Internal,
    }
}

pub(crate) fn last_error_ptr() -> *const c_char {
    LAST_ERROR.with(|state| state.borrow().as_ptr())
}
