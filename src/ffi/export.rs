// src/ffi/export.rs
// ============================================================================
// FFI bindings for the `ExportService`.
// The wrappers decode C strings coming from the host, forward the request to
// the async service on the shared runtime, and hand the result back as JSON.
//
// Memory ownership:
//   Any *mut c_char returned from Rust must be released by the host through
//   `export_free`. Strings are created with `CString::into_raw`.
// ============================================================================

use crate::domains::export::types::ExportRequest;
use crate::domains::export::delivery::FileDelivery;
use crate::ffi::{error::FFIError, handle_status_result};
use crate::globals;
use serde::Deserialize;
use std::ffi::{c_char, CStr, CString};
use std::os::raw::c_int;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Helper to parse JSON payload
fn parse_json_payload<T: serde::de::DeserializeOwned>(json_str: &str) -> Result<T, FFIError> {
    serde_json::from_str(json_str)
        .map_err(|e| FFIError::invalid_argument(&format!("Invalid JSON payload: {}", e)))
}

/// Helper to create JSON response
fn create_json_response<T: serde::Serialize>(data: T) -> Result<*mut c_char, FFIError> {
    let json_string = serde_json::to_string(&data)
        .map_err(|e| FFIError::internal(format!("JSON serialization failed: {}", e)))?;

    let c_string = CString::new(json_string)
        .map_err(|e| FFIError::internal(format!("CString creation failed: {}", e)))?;

    Ok(c_string.into_raw())
}

/// Decode a borrowed C string argument
unsafe fn read_c_str<'a>(ptr: *const c_char, what: &str) -> Result<&'a str, FFIError> {
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|_| FFIError::invalid_argument(&format!("Invalid {} string", what)))
}

/// CSV generation payload: an export request plus an optional output
/// directory overriding the configured one.
#[derive(Debug, Deserialize)]
struct GenerateCsvPayload {
    #[serde(flatten)]
    request: ExportRequest,
    #[serde(default)]
    output_dir: Option<String>,
}

// ============================================================================
// ENTRY POINTS
// ============================================================================

/// Initialize the library against a SQLite database.
/// A null `database_url` falls back to `POST_EXPORT_DATABASE_URL`.
/// # Safety
/// `database_url` must be null or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn export_initialize(database_url: *const c_char) -> c_int {
    handle_status_result(|| unsafe {
        let url = if database_url.is_null() {
            None
        } else {
            Some(read_c_str(database_url, "database URL")?)
        };
        globals::initialize(url)
    })
}

/// List the exportable record types as a JSON array of `{name, label}`.
/// # Safety
/// `result` must be a valid pointer; the returned string must be released
/// with `export_free`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn export_list_record_types(result: *mut *mut c_char) -> c_int {
    handle_status_result(|| unsafe {
        if result.is_null() {
            return Err(FFIError::invalid_argument("Null pointer(s) provided"));
        }

        let service = globals::get_export_service()?;
        let types = globals::block_on_async(async {
            service.list_record_types().await.map_err(FFIError::from)
        })?;

        *result = create_json_response(types)?;
        Ok(())
    })
}

/// Discover the fields of a record type as a JSON array of
/// `{key, name, label}` in schema order.
/// # Safety
/// `record_type` must be a valid NUL-terminated string and `result` a valid
/// pointer; the returned string must be released with `export_free`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn export_discover_fields(
    record_type: *const c_char,
    result: *mut *mut c_char,
) -> c_int {
    handle_status_result(|| unsafe {
        if record_type.is_null() || result.is_null() {
            return Err(FFIError::invalid_argument("Null pointer(s) provided"));
        }

        let record_type = read_c_str(record_type, "record type")?;
        let service = globals::get_export_service()?;
        let fields = globals::block_on_async(async {
            service
                .discovery()
                .discover_fields(record_type)
                .await
                .map_err(FFIError::from)
        })?;

        *result = create_json_response(fields)?;
        Ok(())
    })
}

/// Generate a CSV file for `{"record_type": ..., "fields": [...]}` and
/// return the delivered export (`path`, `filename`, `stats`) as JSON.
/// # Safety
/// `request_json` must be a valid NUL-terminated string and `result` a valid
/// pointer; the returned string must be released with `export_free`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn export_generate_csv(
    request_json: *const c_char,
    result: *mut *mut c_char,
) -> c_int {
    handle_status_result(|| unsafe {
        if request_json.is_null() || result.is_null() {
            return Err(FFIError::invalid_argument("Null pointer(s) provided"));
        }

        let json_str = read_c_str(request_json, "export request JSON")?;
        let payload: GenerateCsvPayload = parse_json_payload(json_str)?;
        let (record_type, selection) = payload.request.into_parts()?;

        let service = globals::get_export_service()?;
        let delivery = match payload.output_dir {
            Some(dir) => FileDelivery::new(dir, globals::get_config()?.csv_config()),
            None => globals::get_file_delivery()?,
        };

        let delivered = globals::block_on_async(async {
            delivery
                .deliver(&service, record_type.as_str(), &selection)
                .await
                .map_err(FFIError::from)
        })?;

        *result = create_json_response(delivered)?;
        Ok(())
    })
}

/// Free memory allocated by export FFI functions
/// # Safety
/// This function should only be called with pointers returned from export FFI functions
#[unsafe(no_mangle)]
pub unsafe extern "C" fn export_free(ptr: *mut c_char) {
    if !ptr.is_null() {
        unsafe {
            let _ = CString::from_raw(ptr);
        }
    }
}
