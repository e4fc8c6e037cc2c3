// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # radiohal C FFI Bindings
//!
//! C-compatible bindings over the `radiohal` device/stream abstraction.
//! A single process-wide [`Factory`](radiohal::Factory) backs
//! `radiohal_enumerate`/`radiohal_make`/`radiohal_unmake`; everything
//! else is a thin wrapper around the matching `Device`/`Stream` method.
//!
//! # Safety
//!
//! All public functions are `unsafe` and require the caller to uphold
//! the invariants documented on each function.

mod handles;

use handles::{
    device_drop_handle, device_from_handle, device_into_handle, stream_drop_handle,
    stream_from_handle, stream_into_handle, RadiohalDevice, RadiohalStream,
};
use radiohal::{Args, Config, Direction, Factory, StreamFlags};
use std::ffi::CStr;
use std::os::raw::c_char;
use std::ptr;
use std::slice;
use std::sync::OnceLock;

/// Exact numeric error codes from the driver surface; `RadiohalOk` (0)
/// is the FFI layer's own addition for the success case.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadiohalErrorCode {
    RadiohalOk = 0,
    RadiohalTimeout = -1,
    RadiohalStreamError = -2,
    RadiohalCorruption = -3,
    RadiohalOverflow = -4,
    RadiohalNotSupported = -5,
    RadiohalTimeError = -6,
    RadiohalUnderflow = -7,
}

impl From<radiohal::Error> for RadiohalErrorCode {
    fn from(err: radiohal::Error) -> Self {
        match err.code() {
            radiohal::ErrorCode::None => RadiohalErrorCode::RadiohalOk,
            radiohal::ErrorCode::Timeout => RadiohalErrorCode::RadiohalTimeout,
            radiohal::ErrorCode::StreamError => RadiohalErrorCode::RadiohalStreamError,
            radiohal::ErrorCode::Corruption => RadiohalErrorCode::RadiohalCorruption,
            radiohal::ErrorCode::Overflow => RadiohalErrorCode::RadiohalOverflow,
            radiohal::ErrorCode::NotSupported => RadiohalErrorCode::RadiohalNotSupported,
            radiohal::ErrorCode::TimeError => RadiohalErrorCode::RadiohalTimeError,
            radiohal::ErrorCode::Underflow => RadiohalErrorCode::RadiohalUnderflow,
        }
    }
}

impl From<radiohal::StreamEvent> for RadiohalErrorCode {
    fn from(event: radiohal::StreamEvent) -> Self {
        match event {
            radiohal::StreamEvent::Ok => RadiohalErrorCode::RadiohalOk,
            radiohal::StreamEvent::Timeout => RadiohalErrorCode::RadiohalTimeout,
            radiohal::StreamEvent::Overflow => RadiohalErrorCode::RadiohalOverflow,
            radiohal::StreamEvent::Underflow => RadiohalErrorCode::RadiohalUnderflow,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadiohalDirection {
    RadiohalTx = 0,
    RadiohalRx = 1,
}

impl From<RadiohalDirection> for Direction {
    fn from(direction: RadiohalDirection) -> Self {
        match direction {
            RadiohalDirection::RadiohalTx => Direction::Tx,
            RadiohalDirection::RadiohalRx => Direction::Rx,
        }
    }
}

fn factory() -> &'static Factory {
    static FACTORY: OnceLock<Factory> = OnceLock::new();
    FACTORY.get_or_init(|| {
        use std::sync::Once;
        static INIT: Once = Once::new();
        INIT.call_once(|| {
            let _ = env_logger::try_init();
        });
        Factory::new(Config::default())
    })
}

/// # Safety
/// `markup` must be NULL or a valid null-terminated C string.
unsafe fn args_from_markup(markup: *const c_char) -> Args {
    if markup.is_null() {
        return Args::new();
    }
    match CStr::from_ptr(markup).to_str() {
        Ok(s) => Args::parse(s),
        Err(_) => Args::new(),
    }
}

/// Enumerate visible devices, writing `", "`-joined descriptor markup
/// strings into `out[0..out_len]`. Returns the number of devices found,
/// which may exceed `out_len` if the caller's buffer was too small.
///
/// # Safety
/// - `args` must be NULL or a valid null-terminated C string.
/// - `out` must point to at least `out_len` writable `*mut c_char` slots,
///   each later freed with `radiohal_free_string`.
#[no_mangle]
pub unsafe extern "C" fn radiohal_enumerate(
    args: *const c_char,
    out: *mut *mut c_char,
    out_len: usize,
) -> usize {
    let parsed = args_from_markup(args);
    let found = factory().enumerate(&parsed);
    if !out.is_null() {
        let slots = slice::from_raw_parts_mut(out, out_len.min(found.len()));
        for (slot, info) in slots.iter_mut().zip(found.iter()) {
            *slot = string_to_c(info.args.serialize());
        }
    }
    found.len()
}

/// Release a string returned by `radiohal_enumerate`.
///
/// # Safety
/// `s` must be a pointer previously returned by this crate, or NULL.
#[no_mangle]
pub unsafe extern "C" fn radiohal_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(std::ffi::CString::from_raw(s));
    }
}

fn string_to_c(s: String) -> *mut c_char {
    std::ffi::CString::new(s).map(std::ffi::CString::into_raw).unwrap_or(ptr::null_mut())
}

/// Construct (or share) a device matching `args`.
///
/// # Safety
/// `args` must be NULL or a valid null-terminated C string. The returned
/// handle must be released with `radiohal_unmake`.
#[no_mangle]
pub unsafe extern "C" fn radiohal_make(args: *const c_char) -> *mut RadiohalDevice {
    let parsed = args_from_markup(args);
    match factory().make(&parsed) {
        Ok(device) => device_into_handle(device),
        Err(err) => {
            log::warn!("radiohal_make failed: {err}");
            ptr::null_mut()
        }
    }
}

/// # Safety
/// `device` must be a valid handle from `radiohal_make`, not previously
/// released.
#[no_mangle]
pub unsafe extern "C" fn radiohal_unmake(device: *mut RadiohalDevice) {
    if device.is_null() {
        return;
    }
    let device = device_drop_handle(device);
    factory().unmake(&device);
}

/// # Safety
/// `device` must be a valid handle from `radiohal_make`.
#[no_mangle]
pub unsafe extern "C" fn radiohal_set_frequency(
    device: *const RadiohalDevice,
    direction: RadiohalDirection,
    freq_hz: f64,
    args: *const c_char,
) -> RadiohalErrorCode {
    if device.is_null() {
        return RadiohalErrorCode::RadiohalStreamError;
    }
    let device = device_from_handle(device);
    let parsed = args_from_markup(args);
    match device.set_frequency(direction.into(), freq_hz, &parsed) {
        Ok(()) => RadiohalErrorCode::RadiohalOk,
        Err(err) => err.into(),
    }
}

/// # Safety
/// `device` must be a valid handle from `radiohal_make`.
#[no_mangle]
pub unsafe extern "C" fn radiohal_set_sample_rate(
    device: *const RadiohalDevice,
    direction: RadiohalDirection,
    rate_hz: f64,
) -> RadiohalErrorCode {
    if device.is_null() {
        return RadiohalErrorCode::RadiohalStreamError;
    }
    match device_from_handle(device).set_sample_rate(direction.into(), rate_hz) {
        Ok(()) => RadiohalErrorCode::RadiohalOk,
        Err(err) => err.into(),
    }
}

/// # Safety
/// `device` must be a valid handle from `radiohal_make`.
#[no_mangle]
pub unsafe extern "C" fn radiohal_set_bandwidth(
    device: *const RadiohalDevice,
    direction: RadiohalDirection,
    bandwidth_hz: f64,
) -> RadiohalErrorCode {
    if device.is_null() {
        return RadiohalErrorCode::RadiohalStreamError;
    }
    match device_from_handle(device).set_bandwidth(direction.into(), bandwidth_hz) {
        Ok(()) => RadiohalErrorCode::RadiohalOk,
        Err(err) => err.into(),
    }
}

/// # Safety
/// `device` must be a valid handle from `radiohal_make`; `value` is the
/// composite gain in dB distributed across the driver's gain elements.
#[no_mangle]
pub unsafe extern "C" fn radiohal_set_gain(
    device: *const RadiohalDevice,
    direction: RadiohalDirection,
    value_db: f64,
) -> RadiohalErrorCode {
    if device.is_null() {
        return RadiohalErrorCode::RadiohalStreamError;
    }
    match device_from_handle(device).set_gain(direction.into(), value_db) {
        Ok(()) => RadiohalErrorCode::RadiohalOk,
        Err(err) => err.into(),
    }
}

/// # Safety
/// `device` must be a valid handle from `radiohal_make`; `name` a valid
/// null-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn radiohal_set_antenna(
    device: *const RadiohalDevice,
    direction: RadiohalDirection,
    name: *const c_char,
) -> RadiohalErrorCode {
    if device.is_null() || name.is_null() {
        return RadiohalErrorCode::RadiohalStreamError;
    }
    let Ok(name) = CStr::from_ptr(name).to_str() else {
        return RadiohalErrorCode::RadiohalStreamError;
    };
    match device_from_handle(device).set_antenna(direction.into(), name) {
        Ok(()) => RadiohalErrorCode::RadiohalOk,
        Err(err) => err.into(),
    }
}

/// Open a stream on `device`. Returns NULL on failure.
///
/// # Safety
/// - `device` must be a valid handle from `radiohal_make`.
/// - `format`/`args` must be NULL or valid null-terminated C strings.
/// - The returned handle must be released with `radiohal_close_stream`.
#[no_mangle]
pub unsafe extern "C" fn radiohal_setup_stream(
    device: *const RadiohalDevice,
    direction: RadiohalDirection,
    format: *const c_char,
    args: *const c_char,
) -> *mut RadiohalStream {
    if device.is_null() || format.is_null() {
        return ptr::null_mut();
    }
    let Ok(format) = CStr::from_ptr(format).to_str() else {
        return ptr::null_mut();
    };
    let device = device_from_handle(device);
    let parsed = args_from_markup(args);
    match radiohal::Stream::setup(device, direction.into(), format, &[0], &parsed) {
        Ok(stream) => stream_into_handle(std::sync::Arc::new(stream)),
        Err(err) => {
            log::warn!("radiohal_setup_stream failed: {err}");
            ptr::null_mut()
        }
    }
}

/// # Safety
/// `stream` must be a valid handle from `radiohal_setup_stream`.
#[no_mangle]
pub unsafe extern "C" fn radiohal_activate_stream(
    stream: *const RadiohalStream,
    flags: u32,
    time_ns: i64,
    num_elems: usize,
) -> RadiohalErrorCode {
    if stream.is_null() {
        return RadiohalErrorCode::RadiohalStreamError;
    }
    match stream_from_handle(stream).activate(StreamFlags(flags), time_ns, num_elems) {
        Ok(()) => RadiohalErrorCode::RadiohalOk,
        Err(err) => err.into(),
    }
}

/// # Safety
/// `stream` must be a valid handle from `radiohal_setup_stream`.
#[no_mangle]
pub unsafe extern "C" fn radiohal_deactivate_stream(
    stream: *const RadiohalStream,
    flags: u32,
    time_ns: i64,
) -> RadiohalErrorCode {
    if stream.is_null() {
        return RadiohalErrorCode::RadiohalStreamError;
    }
    match stream_from_handle(stream).deactivate(StreamFlags(flags), time_ns) {
        Ok(()) => RadiohalErrorCode::RadiohalOk,
        Err(err) => err.into(),
    }
}

/// # Safety
/// `stream` must be a valid handle from `radiohal_setup_stream`, not
/// previously released.
#[no_mangle]
pub unsafe extern "C" fn radiohal_close_stream(stream: *mut RadiohalStream) -> RadiohalErrorCode {
    if stream.is_null() {
        return RadiohalErrorCode::RadiohalStreamError;
    }
    let stream = stream_drop_handle(stream);
    match stream.close() {
        Ok(()) => RadiohalErrorCode::RadiohalOk,
        Err(err) => err.into(),
    }
}

/// MTU of `stream` in samples, or 0 if `stream` is NULL.
///
/// # Safety
/// `stream` must be a valid handle from `radiohal_setup_stream`.
#[no_mangle]
pub unsafe extern "C" fn radiohal_mtu(stream: *const RadiohalStream) -> usize {
    if stream.is_null() {
        return 0;
    }
    stream_from_handle(stream).mtu()
}

/// Read up to `num_elems` samples into `buf`. Writes the number of
/// samples actually read to `out_samples`. Returns `RadiohalTimeout` /
/// `RadiohalOverflow` / `RadiohalUnderflow` for the matching stream
/// event; a partial read before timeout still returns `RadiohalOk`.
///
/// # Safety
/// - `stream` must be a valid RX-stream handle.
/// - `buf` must point to at least `num_elems * bytes_per_sample` writable
///   bytes for the stream's configured format; `out_samples` must be valid.
#[no_mangle]
pub unsafe extern "C" fn radiohal_read_stream(
    stream: *const RadiohalStream,
    buf: *mut u8,
    buf_len: usize,
    num_elems: usize,
    timeout_us: u64,
    out_samples: *mut usize,
) -> RadiohalErrorCode {
    if stream.is_null() || buf.is_null() || out_samples.is_null() {
        return RadiohalErrorCode::RadiohalStreamError;
    }
    let out = slice::from_raw_parts_mut(buf, buf_len);
    match stream_from_handle(stream).read(out, num_elems, timeout_us) {
        Ok(result) => {
            *out_samples = result.samples;
            result.event.into()
        }
        Err(err) => err.into(),
    }
}

/// Write up to `num_elems` samples from `buf`. Writes the number of
/// samples actually accepted to `out_samples`.
///
/// # Safety
/// - `stream` must be a valid TX-stream handle.
/// - `buf` must point to at least `num_elems * bytes_per_sample` readable
///   bytes for the stream's configured format; `out_samples` must be valid.
#[no_mangle]
pub unsafe extern "C" fn radiohal_write_stream(
    stream: *const RadiohalStream,
    buf: *const u8,
    buf_len: usize,
    num_elems: usize,
    flags: u32,
    time_ns: i64,
    timeout_us: u64,
    out_samples: *mut usize,
) -> RadiohalErrorCode {
    if stream.is_null() || buf.is_null() || out_samples.is_null() {
        return RadiohalErrorCode::RadiohalStreamError;
    }
    let input = slice::from_raw_parts(buf, buf_len);
    match stream_from_handle(stream).write(input, num_elems, StreamFlags(flags), time_ns, timeout_us) {
        Ok(result) => {
            *out_samples = result.samples;
            result.event.into()
        }
        Err(err) => err.into(),
    }
}
