// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The driver surface (§6): the contract a radio-hardware binding
//! implements. `radiohal` ships no concrete driver other than
//! [`null_driver`] — HackRF/RTL-SDR/Airspy bindings are out of scope.

pub mod null_driver;
pub mod registry;
pub mod session;

use crate::args::Args;
use crate::error::Result;
use crate::types::Direction;

/// RX sample callback (§6): the driver hands us the `valid_length`
/// bytes it already read off the USB transfer; we copy them into the
/// ring. Modeled as a borrowed slice rather than `{buffer,
/// buffer_length, valid_length}` since the driver, not us, owns the
/// buffer's lifetime for the duration of the call.
pub type RxCallback = Box<dyn FnMut(&[u8]) + Send>;

/// TX sample callback (§6): we fill up to `buf.len()` bytes and report
/// how many we actually produced. `end_transfer` ("returning non-zero"
/// in the C sense) tells the driver to end the transfer after this call.
pub type TxCallback = Box<dyn FnMut(&mut [u8]) -> TxCallbackResult + Send>;

pub struct TxCallbackResult {
    pub valid_len: usize,
    pub end_transfer: bool,
}

/// `True` / `NotStreaming` / `StreamingExitCalled` from §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamingState {
    True,
    NotStreaming,
    StreamingExitCalled,
}

/// One tuner component's current value and tunable range, e.g. the
/// `RF`/`BB`/`CORR` stages composed by [`crate::device::tuner`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainRange {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

/// Static identity reported by `list_devices` / `find` (§4.6, §4.7):
/// serial plus whatever descriptive markup the driver wants to surface
/// before `make` is called.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub args: Args,
}

/// A handle to one opened physical device, as returned by
/// [`DriverOps::open`]. Opaque to `radiohal`; the driver is free to
/// box whatever native pointer or struct it needs behind this trait.
pub trait DriverHandle: Send {
    /// Board id / USB part identifier, for diagnostics (§6 introspection).
    fn hardware_key(&self) -> String;
}

/// The contract a driver module implements (§6 "driver surface").
/// `radiohal` never calls into real hardware through this trait itself
/// — [`null_driver::NullDriver`] is the only built-in implementation.
pub trait DriverOps: Send + Sync {
    /// Stable name this driver registers under, e.g. `"hackrf"`.
    fn name(&self) -> &'static str;

    /// §4.7 `find(args)`: enumerate devices this driver can see,
    /// without opening any of them.
    fn find(&self, args: &Args) -> Result<Vec<DeviceInfo>>;

    /// Open a handle to the device matching `args` (by `serial` if
    /// present, otherwise the first device found).
    fn open(&self, args: &Args) -> Result<Box<dyn DriverHandle>>;

    fn close(&self, dev: &mut dyn DriverHandle) -> Result<()>;

    fn is_streaming(&self, dev: &dyn DriverHandle, direction: Direction) -> Result<StreamingState>;

    fn start_rx(&self, dev: &dyn DriverHandle, callback: RxCallback) -> Result<()>;
    fn stop_rx(&self, dev: &dyn DriverHandle) -> Result<()>;

    fn start_tx(&self, dev: &dyn DriverHandle, callback: TxCallback) -> Result<()>;
    fn stop_tx(&self, dev: &dyn DriverHandle) -> Result<()>;

    fn set_frequency(&self, dev: &dyn DriverHandle, component: &str, hz: f64) -> Result<()>;
    fn get_frequency(&self, dev: &dyn DriverHandle, component: &str) -> Result<f64>;
    fn list_frequencies(&self, dev: &dyn DriverHandle, direction: Direction) -> Vec<&'static str>;

    fn set_sample_rate(&self, dev: &dyn DriverHandle, rate: f64) -> Result<()>;
    fn set_bandwidth(&self, dev: &dyn DriverHandle, hz: f64) -> Result<()>;

    fn list_gains(&self, dev: &dyn DriverHandle, direction: Direction) -> Vec<&'static str>;
    fn gain_range(&self, dev: &dyn DriverHandle, element: &str) -> Result<GainRange>;
    fn set_element_gain(&self, dev: &dyn DriverHandle, element: &str, value: f64) -> Result<()>;

    fn set_antenna(&self, dev: &dyn DriverHandle, direction: Direction, name: &str) -> Result<()>;
    fn set_amp_enable(&self, dev: &dyn DriverHandle, enable: bool) -> Result<()>;

    /// §6 introspection: tuner type/name (`"Rafael Micro R820T"`, ...).
    fn tuner_name(&self, dev: &dyn DriverHandle) -> Result<String>;

    /// Wire stream format strings this driver actually supports.
    fn stream_formats(&self, direction: Direction) -> Vec<&'static str>;
}
