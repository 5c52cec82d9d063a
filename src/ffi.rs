//! C ABI for the summary renderer, used by the service that hosts the chat
//! API. Every entry point is `extern "C"` and `#[no_mangle]`; the header is
//! generated into `include/summary_forge.h` by the build script.
//!
//! ## Memory management
//! - Buffers returned by `sf_*` functions are allocated on the Rust heap.
//! - Callers **must** free them with `sf_free_buffer` / `sf_free_string`.
//! - Freeing a null pointer does nothing.
//!
//! ## Error handling
//! - Functions that can fail return a `c_int` holding an [`SfStatus`]
//!   (0 = success).
//! - Error details can be retrieved via `sf_last_error`.
//!
//! ## Thread safety
//! - `sf_last_error` uses a thread-local, so it is safe to call from
//!   multiple threads.
//!
//! ## Linking
//! ```c
//! // cc app.c -lsummary_forge
//! #include "summary_forge.h"
//! ```

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::ptr;
use std::slice;
use std::sync::Arc;

use chrono::DateTime;

use crate::config::PdfConfig;
use crate::document::SummaryMeta;
use crate::layout_config::LayoutConfig;
use crate::pipeline::SummaryRenderer;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Status codes returned by the `sf_*` functions.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SfStatus {
    Ok = 0,
    /// A required pointer argument was null.
    NullArgument = 1,
    /// A string argument was not valid UTF-8.
    InvalidUtf8 = 2,
    /// The YAML config failed to parse or validate.
    InvalidConfig = 3,
    /// Layout or PDF generation failed.
    RenderFailed = 4,
    /// A numeric argument was out of range.
    InvalidArgument = 5,
}

impl From<SfStatus> for c_int {
    fn from(status: SfStatus) -> Self {
        status as c_int
    }
}

/// Borrow a null-terminated UTF-8 string.
///
/// # Safety
/// `p` must be null or point to a valid null-terminated string.
unsafe fn c_str<'a>(p: *const c_char, what: &str) -> Result<&'a str, SfStatus> {
    if p.is_null() {
        set_last_error(&format!("Null pointer argument: {what}"));
        return Err(SfStatus::NullArgument);
    }
    CStr::from_ptr(p).to_str().map_err(|e| {
        set_last_error(&format!("Invalid UTF-8 in {what}: {e}"));
        SfStatus::InvalidUtf8
    })
}

fn renderer(config_yaml: &str) -> Result<SummaryRenderer, SfStatus> {
    let config = PdfConfig::from_yaml_str(config_yaml).map_err(|e| {
        set_last_error(&e.to_string());
        SfStatus::InvalidConfig
    })?;
    SummaryRenderer::new(Arc::new(config)).map_err(|e| {
        set_last_error(&e.to_string());
        SfStatus::InvalidConfig
    })
}

/// # Safety
/// `title` must be null or a valid null-terminated string.
unsafe fn summary_meta(
    renderer: &SummaryRenderer,
    title: *const c_char,
    created_at_unix: i64,
    message_count: u32,
) -> Result<SummaryMeta, SfStatus> {
    let room_title = if title.is_null() {
        renderer.config().labels.untitled_room.clone()
    } else {
        c_str(title, "title")?.to_string()
    };
    let created_at = DateTime::from_timestamp(created_at_unix, 0)
        .ok_or_else(|| {
            set_last_error(&format!("Timestamp out of range: {created_at_unix}"));
            SfStatus::InvalidArgument
        })?
        .naive_utc();
    Ok(SummaryMeta {
        room_title,
        created_at,
        message_count: message_count as usize,
    })
}

/// Hand a byte vector to the caller.
///
/// # Safety
/// `out_buf` and `out_len` must be valid pointers.
unsafe fn emit_buffer(bytes: Vec<u8>, out_buf: *mut *mut u8, out_len: *mut u32) -> c_int {
    let Ok(len) = u32::try_from(bytes.len()) else {
        set_last_error("PDF larger than 4 GiB");
        return SfStatus::RenderFailed.into();
    };
    let raw = Box::into_raw(bytes.into_boxed_slice()) as *mut u8;
    *out_buf = raw;
    *out_len = len;
    SfStatus::Ok.into()
}

// ---------------------------------------------------------------------------
// Core API
// ---------------------------------------------------------------------------

/// Render a chat summary PDF.
///
/// # Parameters
/// - `config_yaml`: null-terminated YAML style configuration
/// - `markdown`: null-terminated summary text
/// - `title`: null-terminated room title, or `NULL` for the untitled label
/// - `created_at_unix`: conversation start, seconds since the epoch (UTC)
/// - `message_count`: number of messages in the conversation
/// - `out_buf`, `out_len`: on success, receive the heap-allocated PDF bytes
///
/// # Returns
/// An [`SfStatus`] code. On error, call `sf_last_error`.
///
/// # Safety
/// - String arguments must be null or valid null-terminated strings.
/// - `out_buf` and `out_len` must be valid pointers.
/// - The caller must free `*out_buf` by calling `sf_free_buffer`.
#[no_mangle]
pub unsafe extern "C" fn sf_render_summary(
    config_yaml: *const c_char,
    markdown: *const c_char,
    title: *const c_char,
    created_at_unix: i64,
    message_count: u32,
    out_buf: *mut *mut u8,
    out_len: *mut u32,
) -> c_int {
    if out_buf.is_null() || out_len.is_null() {
        set_last_error("Null pointer argument: output");
        return SfStatus::NullArgument.into();
    }

    let result = (|| {
        let renderer = renderer(c_str(config_yaml, "config_yaml")?)?;
        let markdown = c_str(markdown, "markdown")?;
        let meta = summary_meta(&renderer, title, created_at_unix, message_count)?;
        renderer.render_summary(&meta, markdown).map_err(|e| {
            set_last_error(&e.to_string());
            SfStatus::RenderFailed
        })
    })();

    match result {
        Ok(bytes) => emit_buffer(bytes, out_buf, out_len),
        Err(status) => status.into(),
    }
}

/// Compute the paginated layout of a chat summary without rendering it.
///
/// # Returns
/// An [`SfStatus`] code; on success `*out_json` receives the layout as a
/// null-terminated JSON string.
///
/// # Safety
/// Same as `sf_render_summary`. `*out_json` must be freed with
/// `sf_free_string`.
#[no_mangle]
pub unsafe extern "C" fn sf_compute_layout(
    config_yaml: *const c_char,
    markdown: *const c_char,
    title: *const c_char,
    created_at_unix: i64,
    message_count: u32,
    out_json: *mut *mut c_char,
) -> c_int {
    if out_json.is_null() {
        set_last_error("Null pointer argument: out_json");
        return SfStatus::NullArgument.into();
    }

    let result = (|| {
        let renderer = renderer(c_str(config_yaml, "config_yaml")?)?;
        let markdown = c_str(markdown, "markdown")?;
        let meta = summary_meta(&renderer, title, created_at_unix, message_count)?;
        renderer.layout_summary(&meta, markdown).map_err(|e| {
            set_last_error(&e.to_string());
            SfStatus::RenderFailed
        })
    })();

    match result {
        Ok(layout) => match CString::new(layout.to_json()) {
            Ok(cs) => {
                *out_json = cs.into_raw();
                SfStatus::Ok.into()
            }
            Err(e) => {
                set_last_error(&format!("Layout JSON contains NUL: {e}"));
                SfStatus::RenderFailed.into()
            }
        },
        Err(status) => status.into(),
    }
}

/// Render a PDF from a layout JSON produced by `sf_compute_layout`.
///
/// `config_yaml` supplies the fonts the layout was measured with.
///
/// # Safety
/// Same as `sf_render_summary`.
#[no_mangle]
pub unsafe extern "C" fn sf_render_from_layout(
    config_yaml: *const c_char,
    layout_json: *const c_char,
    out_buf: *mut *mut u8,
    out_len: *mut u32,
) -> c_int {
    if out_buf.is_null() || out_len.is_null() {
        set_last_error("Null pointer argument: output");
        return SfStatus::NullArgument.into();
    }

    let result = (|| {
        let renderer = renderer(c_str(config_yaml, "config_yaml")?)?;
        let layout = LayoutConfig::from_json(c_str(layout_json, "layout_json")?).map_err(|e| {
            set_last_error(&e.to_string());
            SfStatus::InvalidArgument
        })?;
        renderer.render_layout(&layout).map_err(|e| {
            set_last_error(&e.to_string());
            SfStatus::RenderFailed
        })
    })();

    match result {
        Ok(bytes) => emit_buffer(bytes, out_buf, out_len),
        Err(status) => status.into(),
    }
}

// ---------------------------------------------------------------------------
// Memory management
// ---------------------------------------------------------------------------

/// Free a PDF buffer returned by `sf_render_summary` or
/// `sf_render_from_layout`.
///
/// # Safety
/// `buf` must have been returned by one of those calls, and `len` must be
/// the corresponding length.
#[no_mangle]
pub unsafe extern "C" fn sf_free_buffer(buf: *mut u8, len: u32) {
    if !buf.is_null() {
        let _ = Box::from_raw(slice::from_raw_parts_mut(buf, len as usize));
    }
}

/// Free a string returned by `sf_compute_layout`.
///
/// # Safety
/// `s` must have been returned by Rust's `CString::into_raw`.
#[no_mangle]
pub unsafe extern "C" fn sf_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = CString::from_raw(s);
    }
}

/// Retrieve the last error message. Returns a null-terminated string.
///
/// The returned pointer is valid until the next `sf_*` call on the same
/// thread. The caller should **not** free this pointer – it is managed
/// internally.
///
/// Returns null if no error has occurred.
#[no_mangle]
pub extern "C" fn sf_last_error() -> *const c_char {
    LAST_ERROR.with(|e| {
        let borrow = e.borrow();
        match borrow.as_ref() {
            Some(cs) => cs.as_ptr(),
            None => ptr::null(),
        }
    })
}

/// Return the library version as a null-terminated string.
/// The caller must **not** free this pointer.
#[no_mangle]
pub extern "C" fn sf_version() -> *const c_char {
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr() as *const c_char
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
