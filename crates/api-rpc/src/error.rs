//! RPC Error Types
//!
//! Maps application errors to JSON-RPC error codes.

use distribute_core::application::worker::constants::MAX_FAILURE_OUTPUT_BYTES;
use distribute_core::domain::DomainError;
use distribute_core::error::AppError;
use distribute_core::port::ExecutionError;
use jsonrpsee::types::ErrorObjectOwned;
use serde::Serialize;

/// RPC Error Codes
pub mod code {
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const CONFLICT: i32 = 4002;
    /// The command ran (or failed to start) and did not succeed. Anything else is transport.
    pub const PROCESS_FAILED: i32 = 4100;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const SYSTEM_ERROR: i32 = 5002;
}

/// `data` member of a PROCESS_FAILED error
#[derive(Debug, Serialize)]
pub struct ProcessFailureData<'a> {
    pub exit_code: Option<i32>,
    pub output: &'a str,
}

/// Error object for a command that did not succeed
///
/// The message is `exit status <code>: [<output>]`; `data` carries the same pieces
/// separately. Output beyond `MAX_FAILURE_OUTPUT_BYTES` is cut from the front.
pub fn process_failure(err: &ExecutionError) -> ErrorObjectOwned {
    let err = err.clone().truncated(MAX_FAILURE_OUTPUT_BYTES);
    ErrorObjectOwned::owned(
        code::PROCESS_FAILED,
        err.to_string(),
        Some(ProcessFailureData {
            exit_code: err.exit_code(),
            output: err.output(),
        }),
    )
}

/// Convert AppError to JSON-RPC ErrorObject
pub fn to_rpc_error(err: AppError) -> ErrorObjectOwned {
    match err {
        AppError::Validation(msg) => {
            ErrorObjectOwned::owned(code::VALIDATION_ERROR, msg, None::<()>)
        }
        AppError::Domain(DomainError::DispatcherClosed) => ErrorObjectOwned::owned(
            code::CONFLICT,
            DomainError::DispatcherClosed.to_string(),
            None::<()>,
        ),
        AppError::Domain(e) => {
            ErrorObjectOwned::owned(code::VALIDATION_ERROR, e.to_string(), None::<()>)
        }
        AppError::Execution(e) => process_failure(&e),
        AppError::Io(e) => ErrorObjectOwned::owned(code::SYSTEM_ERROR, e.to_string(), None::<()>),
        AppError::Serialization(e) => {
            ErrorObjectOwned::owned(code::VALIDATION_ERROR, e.to_string(), None::<()>)
        }
        AppError::Source(e) => {
            ErrorObjectOwned::owned(code::VALIDATION_ERROR, e.to_string(), None::<()>)
        }
        AppError::Call(e) => ErrorObjectOwned::owned(code::SYSTEM_ERROR, e.to_string(), None::<()>),
        AppError::Transport(msg) => ErrorObjectOwned::owned(code::SYSTEM_ERROR, msg, None::<()>),
        AppError::Config(msg) => ErrorObjectOwned::owned(code::INTERNAL_ERROR, msg, None::<()>),
        AppError::Internal(msg) => ErrorObjectOwned::owned(code::INTERNAL_ERROR, msg, None::<()>),
    }
}
