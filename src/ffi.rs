//! FFI bindings for the insulin wave engine
//!
//! This module provides C-compatible functions for calling the engine from host
//! applications. All functions use C strings (null-terminated) and return
//! allocated memory that must be freed by the caller using `iwave_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use chrono::{Local, NaiveDateTime};

use crate::calibration::{JsonFileStore, KeyValueStore, MemoryStore};
use crate::clock::{parse_datetime, FixedClock};
use crate::error::WaveError;
use crate::pipeline::{compute_wave, CatalogInput, WaveInput, WaveProcessor};
use crate::types::DayRecord;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// "now" from an optional C string; NULL means local system time
unsafe fn now_from(ptr: *const c_char) -> Result<NaiveDateTime, WaveError> {
    match cstr_to_string(ptr) {
        Some(s) => parse_datetime(&s),
        None => Ok(Local::now().naive_local()),
    }
}

/// Serialize a result, or JSON `null` when there is none
fn result_to_cstr<T: serde::Serialize>(value: &Option<T>) -> *mut c_char {
    match serde_json::to_string(value) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Compute the wave for one input document.
///
/// `input_json` is a wave input (meals, day context, history, config) with the
/// product catalog under `products`. Returns the wave result JSON, or `null`
/// when no meal has a parseable time.
///
/// # Safety
/// - `input_json` must be a valid null-terminated C string.
/// - `now` may be NULL (system time) or a "YYYY-MM-DDTHH:MM:SS" C string.
/// - Returns a newly allocated string that must be freed with `iwave_free_string`.
/// - Returns NULL on error; call `iwave_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn iwave_compute_json(
    input_json: *const c_char,
    now: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let input_str = match cstr_to_string(input_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid input string pointer");
            return ptr::null_mut();
        }
    };

    let now = match now_from(now) {
        Ok(n) => n,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    let request: CatalogInput<WaveInput> = match serde_json::from_str(&input_str) {
        Ok(r) => r,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    let (input, products) = request.into_parts();
    result_to_cstr(&compute_wave(&input, &products, now))
}

// ============================================================================
// Stateful Processor API
// ============================================================================

/// Opaque handle to a WaveProcessor
pub struct WaveProcessorHandle {
    processor: WaveProcessor<Box<dyn KeyValueStore>>,
}

/// Create a new WaveProcessor.
///
/// # Safety
/// - `store_path` may be NULL for an in-memory store, or a path to a JSON file.
/// - Returns a pointer to a newly allocated WaveProcessor.
/// - Must be freed with `iwave_processor_free`.
#[no_mangle]
pub unsafe extern "C" fn iwave_processor_new(store_path: *const c_char) -> *mut WaveProcessorHandle {
    clear_last_error();

    let store: Box<dyn KeyValueStore> = match cstr_to_string(store_path) {
        Some(path) => Box::new(JsonFileStore::new(path)),
        None => Box::new(MemoryStore::new()),
    };

    let handle = Box::new(WaveProcessorHandle {
        processor: WaveProcessor::new(store),
    });
    Box::into_raw(handle)
}

/// Free a WaveProcessor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `iwave_processor_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn iwave_processor_free(processor: *mut WaveProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Freeze the processor clock at a fixed instant.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `iwave_processor_new`.
/// - `now` must be a valid null-terminated "YYYY-MM-DDTHH:MM:SS" C string.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn iwave_processor_set_now(
    processor: *mut WaveProcessorHandle,
    now: *const c_char,
) -> i32 {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return -1;
    }

    let handle = &mut *processor;

    let now_str = match cstr_to_string(now) {
        Some(s) => s,
        None => {
            set_last_error("Invalid time string pointer");
            return -1;
        }
    };

    match parse_datetime(&now_str) {
        Ok(at) => {
            handle.processor.set_clock(FixedClock(at));
            0
        }
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Compute the wave for a day record with a stateful processor.
///
/// `day_json` is a day record with the product catalog under `products`.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `iwave_processor_new`.
/// - `day_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `iwave_free_string`.
/// - Returns NULL on error; call `iwave_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn iwave_processor_compute(
    processor: *mut WaveProcessorHandle,
    day_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &mut *processor;

    let day_str = match cstr_to_string(day_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid day string pointer");
            return ptr::null_mut();
        }
    };

    let request: CatalogInput<DayRecord> = match serde_json::from_str(&day_str) {
        Ok(r) => r,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    let (day, products) = request.into_parts();
    match handle.processor.compute(&day, &products) {
        Ok(result) => result_to_cstr(&result),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Save processor calibration state to JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `iwave_processor_new`.
/// - Returns a newly allocated string that must be freed with `iwave_free_string`.
/// - Returns NULL on error; call `iwave_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn iwave_processor_save_state(
    processor: *mut WaveProcessorHandle,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &*processor;

    match handle.processor.save_state() {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Load processor calibration state from JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `iwave_processor_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns 0 on success, non-zero on error.
/// - On error, call `iwave_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn iwave_processor_load_state(
    processor: *mut WaveProcessorHandle,
    json: *const c_char,
) -> i32 {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return -1;
    }

    let handle = &mut *processor;

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return -1;
        }
    };

    match handle.processor.load_state(&json_str) {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by engine functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by an engine function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn iwave_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next engine call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn iwave_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn iwave_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    const PRODUCTS: &str = r#"[{"id": "bread", "name": "White bread", "protein100": 8,
        "simple100": 5, "complex100": 45, "good_fat100": 3, "fiber100": 2, "gi": 75}]"#;

    fn sample_input() -> CString {
        CString::new(format!(
            r#"{{
                "products": {},
                "meals": [{{"time": "12:30", "items": [{{"product_id": "bread", "grams": 120}}]}}],
                "day": {{"profile": {{"age": 35, "sex": "female", "weight_kg": 62, "height_cm": 168}}}},
                "base_wave_hours": 3.5
            }}"#,
            PRODUCTS
        ))
        .unwrap()
    }

    fn sample_day() -> CString {
        CString::new(format!(
            r#"{{
                "products": {},
                "meals": [
                    {{"time": "08:00", "items": [{{"product_id": "bread", "grams": 80}}]}},
                    {{"time": "12:30", "items": [{{"product_id": "bread", "grams": 120}}]}}
                ],
                "profile": {{"age": 35, "sex": "female", "weight_kg": 62, "height_cm": 168}},
                "sleep_hours": 7.5,
                "stress": 4
            }}"#,
            PRODUCTS
        ))
        .unwrap()
    }

    #[test]
    fn test_ffi_compute_json() {
        let input = sample_input();
        let now = CString::new("2024-03-10T13:00:00").unwrap();

        unsafe {
            let result = iwave_compute_json(input.as_ptr(), now.as_ptr());
            assert!(!result.is_null());

            let result_str = CStr::from_ptr(result).to_str().unwrap();
            assert!(result_str.contains("\"last_meal_time\":\"12:30\""));
            assert!(result_str.contains("wave_minutes"));

            iwave_free_string(result);
        }
    }

    #[test]
    fn test_ffi_compute_without_meals() {
        let input = CString::new(r#"{"meals": []}"#).unwrap();
        let now = CString::new("2024-03-10T13:00:00").unwrap();

        unsafe {
            let result = iwave_compute_json(input.as_ptr(), now.as_ptr());
            assert!(!result.is_null());
            assert_eq!(CStr::from_ptr(result).to_str().unwrap(), "null");
            iwave_free_string(result);
        }
    }

    #[test]
    fn test_ffi_processor_lifecycle() {
        unsafe {
            let processor = iwave_processor_new(ptr::null());
            assert!(!processor.is_null());

            let now = CString::new("2024-03-10T20:00:00").unwrap();
            assert_eq!(iwave_processor_set_now(processor, now.as_ptr()), 0);

            let day = sample_day();
            let result = iwave_processor_compute(processor, day.as_ptr());
            assert!(!result.is_null());
            iwave_free_string(result);

            let state = iwave_processor_save_state(processor);
            assert!(!state.is_null());
            let state_str = CStr::from_ptr(state).to_str().unwrap();
            assert!(state_str.contains("\"avg_gap\":270"));

            let processor2 = iwave_processor_new(ptr::null());
            assert_eq!(iwave_processor_load_state(processor2, state), 0);

            iwave_free_string(state);
            iwave_processor_free(processor);
            iwave_processor_free(processor2);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            let invalid = CString::new("not json").unwrap();

            let result = iwave_compute_json(invalid.as_ptr(), ptr::null());
            assert!(result.is_null());

            let error = iwave_last_error();
            assert!(!error.is_null());
            let error_str = CStr::from_ptr(error).to_str().unwrap();
            assert!(!error_str.is_empty());

            let bad_now = CString::new("noon").unwrap();
            let input = sample_input();
            let result = iwave_compute_json(input.as_ptr(), bad_now.as_ptr());
            assert!(result.is_null());
        }
    }

    #[test]
    fn test_ffi_null_processor() {
        unsafe {
            let result = iwave_processor_save_state(ptr::null_mut());
            assert!(result.is_null());
            assert!(!iwave_last_error().is_null());
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = iwave_version();
            assert!(!version.is_null());
            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert!(!version_str.is_empty());
        }
    }
}
