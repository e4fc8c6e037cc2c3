// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Opaque C handle types and the boxing/unboxing helpers that back them.
//!
//! Each handle is a zero-sized `#[repr(C)]` struct; the pointer `radiohal`
//! hands back actually points at a `Box<Arc<T>>` cast to the opaque type.
//! This mirrors the teacher's own `HddsParticipant`-style handles: the
//! cast is sound because every handle is only ever produced by the
//! matching `_create`/`_setup` function and consumed by its `_destroy`/
//! `_close` counterpart.

use radiohal::{Device, Stream};
use std::sync::Arc;

#[repr(C)]
pub struct RadiohalDevice {
    _private: [u8; 0],
}

#[repr(C)]
pub struct RadiohalStream {
    _private: [u8; 0],
}

pub(crate) fn device_into_handle(device: Arc<Device>) -> *mut RadiohalDevice {
    Box::into_raw(Box::new(device)).cast::<RadiohalDevice>()
}

/// # Safety
/// `handle` must be a live pointer produced by [`device_into_handle`].
pub(crate) unsafe fn device_from_handle(handle: *const RadiohalDevice) -> Arc<Device> {
    Arc::clone(&*handle.cast::<Arc<Device>>())
}

/// # Safety
/// `handle` must be a live pointer produced by [`device_into_handle`], not
/// previously passed to this function.
pub(crate) unsafe fn device_drop_handle(handle: *mut RadiohalDevice) -> Arc<Device> {
    *Box::from_raw(handle.cast::<Arc<Device>>())
}

pub(crate) fn stream_into_handle(stream: Arc<Stream>) -> *mut RadiohalStream {
    Box::into_raw(Box::new(stream)).cast::<RadiohalStream>()
}

/// # Safety
/// `handle` must be a live pointer produced by [`stream_into_handle`].
pub(crate) unsafe fn stream_from_handle(handle: *const RadiohalStream) -> Arc<Stream> {
    Arc::clone(&*handle.cast::<Arc<Stream>>())
}

/// # Safety
/// `handle` must be a live pointer produced by [`stream_into_handle`], not
/// previously passed to this function.
pub(crate) unsafe fn stream_drop_handle(handle: *mut RadiohalStream) -> Arc<Stream> {
    *Box::from_raw(handle.cast::<Arc<Stream>>())
}
