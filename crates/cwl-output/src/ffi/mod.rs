// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! C bindings for embedding the output plugin in a log-forwarding host.
//!
//! ## Thread Safety
//!
//! A `CwlOutput` pointer is **not** thread-safe. The host creates one per
//! configured output and calls it from a single thread at a time, the way a
//! `FILE*` is used.
//!
//! ## Panic Safety
//!
//! Every exported function runs its body inside `std::panic::catch_unwind`, so
//! a panic is reported as an error code instead of aborting the host.
//!
//! ## Usage Example (C)
//!
//! ```c
//! CwlOutputOptions options = {
//!     .message_key = "log",
//!     .log_group_name_key = "group",
//!     .log_stream_name_key = "stream",
//!     .endpoint = "http://127.0.0.1:4566",
//! };
//!
//! CwlOutputInitResult result = cwl_output_init(&options);
//! if (result.error != CWL_OK) {
//!     return -1;
//! }
//!
//! if (cwl_output_flush(result.output, data, len) == CWL_FLUSH_ERROR) {
//!     // at least one destination failed; the batch is not retried
//! }
//!
//! cwl_output_exit(result.output);
//! ```

use std::ffi::CStr;
use std::os::raw::c_char;
use std::ptr;
use tokio::runtime::Runtime;
use tracing::error;

use crate::config::Config;
use crate::constants::DEFAULT_LOG_LEVEL;
use crate::errors::InitError;
use crate::logger;
use crate::plugin::Plugin;

static VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");

/// Error codes returned by FFI functions
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CwlError {
    /// Operation succeeded
    Ok = 0,
    /// Null pointer provided
    NullPointer = 1,
    /// Invalid UTF-8 string
    InvalidString = 2,
    /// Missing or invalid configuration entry
    ConfigError = 3,
    /// HTTP client or runtime could not be created
    InitError = 4,
    /// A panic was caught
    RuntimeError = 5,
}

/// Outcome of a flush, mirroring the host's output status codes.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CwlFlushStatus {
    /// At least one destination failed this cycle
    Error = 0,
    /// Every destination was flushed
    Ok = 1,
}

/// Configuration options for one output instance.
///
/// All fields are null-terminated UTF-8 strings. NULL or empty means "not set",
/// in which case the matching environment variable or default applies.
#[repr(C)]
pub struct CwlOutputOptions {
    /// Record field holding the message (required)
    pub message_key: *const c_char,
    /// Record field naming the log group (required)
    pub log_group_name_key: *const c_char,
    /// Record field naming the log stream (required)
    pub log_stream_name_key: *const c_char,
    /// Service endpoint, a signing proxy or emulator (required)
    pub endpoint: *const c_char,
    /// Proxy for HTTPS requests
    pub https_proxy: *const c_char,
    /// Request timeout in seconds
    pub request_timeout: *const c_char,
    /// Attempts per request for network errors and 5xx responses
    pub max_retries: *const c_char,
    /// Destinations flushed at the same time
    pub flush_concurrency: *const c_char,
    /// Discover/create rounds per destination per flush
    pub discovery_attempts: *const c_char,
    /// One of trace, debug, info, warn, error
    pub log_level: *const c_char,
}

/// Opaque handle to an output instance
#[repr(C)]
#[derive(Copy, Clone)]
pub struct CwlOutput {
    _private: [u8; 0],
}

/// Result returned by `cwl_output_init()`
#[repr(C)]
pub struct CwlOutputInitResult {
    /// Pointer to the output instance, or NULL on error
    pub output: *mut CwlOutput,
    /// Error code (`CwlError::Ok` if successful)
    pub error: CwlError,
    /// Version string of the library (static, never NULL)
    pub version: *const c_char,
}

/// What the C side points at through `CwlOutput`.
struct OutputHandle {
    plugin: Plugin,
    runtime: Runtime,
}

fn version_ptr() -> *const c_char {
    VERSION.as_ptr().cast::<c_char>()
}

fn panic_message(payload: &(dyn std::any::Any + Send), context: &str) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("Panic during {context}: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("Panic during {context}: {s}")
    } else {
        format!("Panic during {context} (unknown cause)")
    }
}

/// Converts a C string, treating NULL as unset.
///
/// # Safety
/// `ptr` must be NULL or point to a null-terminated string.
unsafe fn cstr_to_option(ptr: *const c_char) -> Result<Option<String>, CwlError> {
    if ptr.is_null() {
        return Ok(None);
    }
    match CStr::from_ptr(ptr).to_str() {
        Ok(s) => Ok(Some(s.to_string())),
        Err(_) => Err(CwlError::InvalidString),
    }
}

/// Reads every option into `(host key, value)` pairs.
///
/// # Safety
/// Every pointer in `opts` must be NULL or a null-terminated string.
unsafe fn read_options(opts: &CwlOutputOptions) -> Result<Vec<(&'static str, String)>, CwlError> {
    let fields = [
        ("MessageKey", opts.message_key),
        ("LogGroupNameKey", opts.log_group_name_key),
        ("LogStreamNameKey", opts.log_stream_name_key),
        ("Endpoint", opts.endpoint),
        ("HttpsProxy", opts.https_proxy),
        ("RequestTimeout", opts.request_timeout),
        ("MaxRetries", opts.max_retries),
        ("FlushConcurrency", opts.flush_concurrency),
        ("DiscoveryAttempts", opts.discovery_attempts),
        ("LogLevel", opts.log_level),
    ];

    let mut values = Vec::with_capacity(fields.len());
    for (key, ptr) in fields {
        if let Some(value) = cstr_to_option(ptr)? {
            values.push((key, value));
        }
    }
    Ok(values)
}

/// Create an output instance from the given options
///
/// # Safety
///
/// - `options` must be a valid pointer to a `CwlOutputOptions` struct
/// - All string pointers in `options` must be valid null-terminated UTF-8 strings or NULL
/// - The returned `output` pointer must be released with `cwl_output_exit()`
#[no_mangle]
pub unsafe extern "C" fn cwl_output_init(
    options: *const CwlOutputOptions,
) -> CwlOutputInitResult {
    let mk_result = |output: *mut CwlOutput, error: CwlError| CwlOutputInitResult {
        output,
        error,
        version: version_ptr(),
    };

    let panic_result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        if options.is_null() {
            return mk_result(ptr::null_mut(), CwlError::NullPointer);
        }

        let values = match read_options(&*options) {
            Ok(values) => values,
            Err(e) => return mk_result(ptr::null_mut(), e),
        };

        let config = match Config::from_lookup(|key| {
            values
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.clone())
        }) {
            Ok(config) => config,
            Err(e) => {
                logger::init(DEFAULT_LOG_LEVEL);
                error!("{e}");
                return mk_result(ptr::null_mut(), CwlError::ConfigError);
            }
        };

        logger::init(&config.log_level);

        let runtime = match Runtime::new() {
            Ok(rt) => rt,
            Err(e) => {
                error!("Failed to create runtime: {e}");
                return mk_result(ptr::null_mut(), CwlError::InitError);
            }
        };

        let plugin = match Plugin::init(&config) {
            Ok(plugin) => plugin,
            Err(e) => {
                error!("{e}");
                let code = match e {
                    InitError::Config(_) => CwlError::ConfigError,
                    InitError::Client(_) => CwlError::InitError,
                };
                return mk_result(ptr::null_mut(), code);
            }
        };

        let handle = Box::new(OutputHandle { plugin, runtime });
        mk_result(Box::into_raw(handle).cast::<CwlOutput>(), CwlError::Ok)
    }));

    match panic_result {
        Ok(result) => result,
        Err(payload) => {
            eprintln!("{}", panic_message(payload.as_ref(), "output init"));
            mk_result(ptr::null_mut(), CwlError::RuntimeError)
        }
    }
}

/// Ship one raw MessagePack batch
///
/// Blocks until every destination in the batch has been attempted.
///
/// # Safety
///
/// - `output` must be a pointer returned by `cwl_output_init()` and not yet exited
/// - `data` must point to `len` readable bytes, or be NULL when `len` is 0
#[no_mangle]
pub unsafe extern "C" fn cwl_output_flush(
    output: *mut CwlOutput,
    data: *const u8,
    len: usize,
) -> CwlFlushStatus {
    let panic_result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        if output.is_null() || (data.is_null() && len > 0) {
            return CwlFlushStatus::Error;
        }

        let handle = &mut *output.cast::<OutputHandle>();
        let batch: &[u8] = if len == 0 {
            &[]
        } else {
            std::slice::from_raw_parts(data, len)
        };

        match handle.runtime.block_on(handle.plugin.flush(batch)) {
            Ok(_) => CwlFlushStatus::Ok,
            Err(_) => CwlFlushStatus::Error,
        }
    }));

    match panic_result {
        Ok(status) => status,
        Err(payload) => {
            eprintln!("{}", panic_message(payload.as_ref(), "output flush"));
            CwlFlushStatus::Error
        }
    }
}

/// Release an output instance
///
/// # Safety
///
/// - `output` must be a pointer returned by `cwl_output_init()`
/// - After calling this function, the pointer must not be used again
#[no_mangle]
pub unsafe extern "C" fn cwl_output_exit(output: *mut CwlOutput) -> CwlError {
    let panic_result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        if output.is_null() {
            return CwlError::NullPointer;
        }

        let handle = Box::from_raw(output.cast::<OutputHandle>());
        let OutputHandle { plugin, runtime } = *handle;
        plugin.exit();
        runtime.shutdown_background();
        CwlError::Ok
    }));

    match panic_result {
        Ok(error) => error,
        Err(payload) => {
            eprintln!("{}", panic_message(payload.as_ref(), "output exit"));
            CwlError::RuntimeError
        }
    }
}

/// Library version as a static null-terminated string
#[no_mangle]
pub extern "C" fn cwl_output_version() -> *const c_char {
    version_ptr()
}
