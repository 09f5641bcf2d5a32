use std::os::raw::c_int;

use crate::ffi::error::ErrorCode;

pub mod error;
pub mod export;

pub use error::{FFIError, FFIResult};

/// Error handling helper for FFI boundaries (returns error code)
pub fn handle_status_result<F>(func: F) -> c_int
where
    F: FnOnce() -> FFIResult<()>,
{
    match func() {
        Ok(_) => ErrorCode::Success as c_int,
        Err(e) => {
            log::error!(
                "[FFI] Code: {:?}, Message: {}, Details: {:?}",
                e.code,
                e.message,
                e.details.as_deref().unwrap_or("None")
            );
            e.code as c_int
        }
    }
}
