//! C ABI for tract-router.
//!
//! Every operation takes and returns primitive values so the router can be
//! driven from any language with a C foreign-function interface.
//!
//! # Handle lifecycle
//!
//! ```text
//! tract_router_create ──► route / drain ... ──► tract_router_destroy ──► tract_router_free
//! ```
//!
//! - `destroy` discards queued messages and makes every later `route` /
//!   `drain` fail with [`TRACT_ERR_INVALID_HANDLE`]. It waits for calls
//!   already in flight and may be called more than once.
//! - `free` releases the handle memory. It must be called exactly once,
//!   after which the pointer must not be used; the adapter must make sure
//!   no other thread still holds it.
//!
//! # Payload ownership
//!
//! `route` copies the caller's bytes once into a router-owned buffer. From
//! then on the buffer is moved, never copied: `drain` hands that same
//! allocation out as a [`TractPayload`], which the caller returns with
//! [`tract_payload_free`].

pub mod codes;

use once_cell::sync::OnceCell;
use std::ffi::{c_char, CStr};
use std::mem::ManuallyDrop;
use std::ptr;
use tracing::{debug, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tract_router_core::config::ConfigLoader;
use tract_router_core::logging::init_logging;
use tract_router_core::{Partition, Priority, RouteError, Router, Target};

pub use codes::*;

/// Opaque router handle
pub struct TractRouter {
    inner: Router,
}

/// A drained payload. Owned by the caller until passed to
/// [`tract_payload_free`].
#[repr(C)]
#[derive(Debug)]
pub struct TractPayload {
    pub data: *mut u8,
    pub len: usize,
    pub capacity: usize,
}

impl TractPayload {
    fn empty() -> Self {
        Self {
            data: ptr::null_mut(),
            len: 0,
            capacity: 0,
        }
    }

    fn from_vec(bytes: Vec<u8>) -> Self {
        let mut bytes = ManuallyDrop::new(bytes);
        Self {
            data: bytes.as_mut_ptr(),
            len: bytes.len(),
            capacity: bytes.capacity(),
        }
    }
}

static LOG_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Install the tracing subscriber using the configuration found in
/// `config_dir` (null for the default `~/.tract-router`).
///
/// Returns [`TRACT_OK`], or [`TRACT_ERR_MALFORMED`] when the directory is
/// not valid UTF-8, the configuration fails to load, or the log directory
/// cannot be created. Only the first successful call has an effect.
///
/// # Safety
///
/// `config_dir` must be null or point to a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn tract_router_init_logging(config_dir: *const c_char) -> i32 {
    let loader = if config_dir.is_null() {
        ConfigLoader::new()
    } else {
        // SAFETY: caller guarantees a NUL-terminated string.
        match unsafe { CStr::from_ptr(config_dir) }.to_str() {
            Ok(dir) => ConfigLoader::with_dir(dir),
            Err(_) => return TRACT_ERR_MALFORMED,
        }
    };

    let config = match loader.load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("tract-router: failed to load config: {}", e);
            return TRACT_ERR_MALFORMED;
        }
    };

    match LOG_GUARD.get_or_try_init(|| init_logging(&config.logging)) {
        Ok(_) => TRACT_OK,
        Err(e) => {
            eprintln!("tract-router: failed to initialize logging: {}", e);
            TRACT_ERR_MALFORMED
        }
    }
}

/// Create a router whose two partition queues each hold `capacity`
/// messages. Returns null when `capacity` is zero or too large.
///
/// The returned handle must eventually be passed to [`tract_router_free`].
#[no_mangle]
pub extern "C" fn tract_router_create(capacity: usize) -> *mut TractRouter {
    match Router::create(capacity) {
        Ok(inner) => Box::into_raw(Box::new(TractRouter { inner })),
        Err(e) => {
            warn!(error = %e, "Router allocation failed");
            ptr::null_mut()
        }
    }
}

/// Route one message.
///
/// `target` is `0` (Internal), `1` (External) or `2` (Bridge). For a
/// partition target the 8-byte little-endian sequence tag is written to
/// `out`; for the Bridge the inline response is. Returns the number of
/// bytes written, or a negative `TRACT_ERR_*` code. A failed call leaves
/// the router unchanged. A destroyed router answers
/// [`TRACT_ERR_INVALID_HANDLE`] whatever the other arguments are.
///
/// A Bridge response is never longer than the request body for `echo`,
/// 8 bytes for `digest`, 4 for `ping` and [`TRACT_STATUS_RESPONSE_MAX`]
/// for `status`, so a buffer of `payload_len + TRACT_STATUS_RESPONSE_MAX`
/// bytes never yields [`TRACT_ERR_BUFFER_TOO_SMALL`].
///
/// # Safety
///
/// `handle` must be null or a live handle from [`tract_router_create`].
/// `payload` must point to `payload_len` readable bytes (may be null when
/// `payload_len` is 0). `out` must point to `out_capacity` writable bytes
/// (may be null when `out_capacity` is 0).
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn tract_router_route(
    handle: *const TractRouter,
    payload: *const u8,
    payload_len: usize,
    priority: i32,
    source: i32,
    target: i32,
    out: *mut u8,
    out_capacity: usize,
) -> i64 {
    // SAFETY: caller guarantees `handle` is null or live.
    let Some(router) = (unsafe { handle.as_ref() }) else {
        return i64::from(TRACT_ERR_INVALID_HANDLE);
    };
    let router = &router.inner;
    if !router.is_active() {
        return i64::from(TRACT_ERR_INVALID_HANDLE);
    }

    let (priority, source, target) = match parse_route_tags(priority, source, target) {
        Ok(tags) => tags,
        // Destroyed after the check above
        Err(_) if !router.is_active() => return i64::from(TRACT_ERR_INVALID_HANDLE),
        Err(e) => {
            debug!(error = %e, "Rejected route tags");
            return i64::from(error_code(&e));
        }
    };

    if payload.is_null() && payload_len > 0 {
        return i64::from(TRACT_ERR_MALFORMED);
    }
    let bytes = if payload_len == 0 {
        Vec::new()
    } else {
        // SAFETY: caller guarantees `payload_len` readable bytes.
        unsafe { std::slice::from_raw_parts(payload, payload_len) }.to_vec()
    };

    let out: &mut [u8] = if out.is_null() || out_capacity == 0 {
        &mut []
    } else {
        // SAFETY: caller guarantees `out_capacity` writable bytes.
        unsafe { std::slice::from_raw_parts_mut(out, out_capacity) }
    };

    match router.route_into(bytes, priority, source, target, out) {
        Ok(written) => written as i64,
        Err(rejected) => i64::from(error_code(&rejected.error)),
    }
}

/// Pull the next message from partition `0` (Internal) or `1` (External).
///
/// Returns [`TRACT_DRAIN_MESSAGE`] and fills `out` with an owned payload,
/// [`TRACT_DRAIN_EMPTY`] when nothing is queued, or a negative code. On
/// anything other than a message `out` is set to a null payload.
///
/// # Safety
///
/// `handle` must be null or a live handle; `out` must be valid for writes.
#[no_mangle]
pub unsafe extern "C" fn tract_router_drain(
    handle: *const TractRouter,
    partition: i32,
    out: *mut TractPayload,
) -> i32 {
    if out.is_null() {
        return TRACT_ERR_MALFORMED;
    }
    // SAFETY: `out` is non-null and the caller guarantees it is writable.
    unsafe { out.write(TractPayload::empty()) };

    // SAFETY: caller guarantees `handle` is null or live.
    let Some(router) = (unsafe { handle.as_ref() }) else {
        return TRACT_ERR_INVALID_HANDLE;
    };
    let Some(partition) = Partition::from_code(partition) else {
        return TRACT_ERR_UNKNOWN_PARTITION;
    };

    match router.inner.try_drain(partition) {
        Ok(Some(msg)) => {
            // SAFETY: as above.
            unsafe { out.write(TractPayload::from_vec(msg.into_payload())) };
            TRACT_DRAIN_MESSAGE
        }
        Ok(None) => TRACT_DRAIN_EMPTY,
        Err(e) => error_code(&e),
    }
}

/// Number of messages queued for a partition, or a negative code.
///
/// # Safety
///
/// `handle` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn tract_router_len(handle: *const TractRouter, partition: i32) -> i64 {
    // SAFETY: caller guarantees `handle` is null or live.
    let Some(router) = (unsafe { handle.as_ref() }) else {
        return i64::from(TRACT_ERR_INVALID_HANDLE);
    };
    if !router.inner.is_active() {
        return i64::from(TRACT_ERR_INVALID_HANDLE);
    }
    match Partition::from_code(partition) {
        Some(partition) => router.inner.len(partition) as i64,
        None => i64::from(TRACT_ERR_UNKNOWN_PARTITION),
    }
}

/// Mark the router destroyed and discard anything still queued.
///
/// Blocks until in-flight `route` / `drain` calls return. Safe to call
/// again on the same handle; later calls do nothing. Does not release the
/// handle, see [`tract_router_free`].
///
/// # Safety
///
/// `handle` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn tract_router_destroy(handle: *const TractRouter) {
    // SAFETY: caller guarantees `handle` is null or live.
    if let Some(router) = unsafe { handle.as_ref() } {
        let report = router.inner.destroy();
        if !report.is_empty() {
            debug!(
                discarded = report.discarded(),
                "Dropping undrained messages at the boundary"
            );
        }
    }
}

/// Release a handle. Destroys the router first if needed.
///
/// # Safety
///
/// `handle` must be null or a handle from [`tract_router_create`] that has
/// not been freed, and no other thread may be using it.
#[no_mangle]
pub unsafe extern "C" fn tract_router_free(handle: *mut TractRouter) {
    if handle.is_null() {
        return;
    }
    // SAFETY: caller guarantees exclusive ownership of a live handle.
    let router = unsafe { Box::from_raw(handle) };
    router.inner.destroy();
}

/// Return a drained payload's memory to the router allocator.
///
/// # Safety
///
/// `payload` must come from [`tract_router_drain`] and must not be freed
/// twice. Null payloads are ignored.
#[no_mangle]
pub unsafe extern "C" fn tract_payload_free(payload: TractPayload) {
    if payload.data.is_null() {
        return;
    }
    // SAFETY: fields came from a leaked Vec<u8> in `TractPayload::from_vec`.
    drop(unsafe { Vec::from_raw_parts(payload.data, payload.len, payload.capacity) });
}

fn parse_route_tags(
    priority: i32,
    source: i32,
    target: i32,
) -> Result<(Priority, Partition, Target), RouteError> {
    let source = Partition::from_code(source).ok_or(RouteError::UnknownPartition(source))?;
    let target = Target::from_code(target).ok_or(RouteError::UnknownPartition(target))?;
    let priority = Priority::from_code(priority)
        .ok_or_else(|| RouteError::MalformedRequest(format!("priority {} outside 0..=3", priority)))?;
    Ok((priority, source, target))
}
