// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # radiohal - Software-Defined Radio Hardware Abstraction Layer
//!
//! A uniform device and streaming abstraction over heterogeneous SDR
//! front-ends (HackRF, RTL-SDR, Airspy, ...). `radiohal` itself never
//! talks to hardware; it defines the [`DriverOps`] contract a driver
//! module implements and the device/stream/ring machinery that sits in
//! front of it.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use radiohal::{Config, Factory, Args, Direction, StreamFlags};
//!
//! fn main() -> radiohal::Result<()> {
//!     let factory = Factory::new(Config::default());
//!     let device = factory.make(&Args::new())?;
//!
//!     device.set_sample_rate(Direction::Rx, 2_000_000.0)?;
//!     device.set_frequency(Direction::Rx, 100_000_000.0, &Args::new())?;
//!
//!     let stream = radiohal::Stream::setup(device.clone(), Direction::Rx, "CF32", &[0], &Args::new())?;
//!     stream.activate(StreamFlags::NONE, 0, 0)?;
//!
//!     let mut buf = vec![0u8; stream.mtu() * 8];
//!     let _ = stream.read(&mut buf, stream.mtu(), 100_000)?;
//!
//!     stream.close()?;
//!     factory.unmake(&device);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------+
//! |                        Client code                            |
//! +---------------------------------------------------------------+
//! |  Factory  ->  Device  ->  Stream  (read/write, direct access)  |
//! +---------------------------------------------------------------+
//! |  RingBuffer (SPSC, buf_mutex)   |   tuner defaults (§4.5)      |
//! +---------------------------------------------------------------+
//! |                  DriverOps (driver surface)                    |
//! +---------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|--------------|
//! | [`Factory`] | Enumerates and constructs devices, dedup'd by args |
//! | [`Device`] | One opened radio: tuning, mode, RX/TX rings |
//! | [`Stream`] | Idle/Active/Closed client-facing read/write handle |
//! | [`Args`] | `key=value` markup map used throughout the API |
//! | [`DriverOps`] | The contract a driver module implements |
//!
//! ## Modules Overview
//!
//! - [`factory`] - device enumeration and construction
//! - [`device`] - device handle, transceiver state machine, tuner defaults
//! - [`stream`] - client-facing stream lifecycle and read/write
//! - [`ring`] - the fixed-count SPSC ring buffer
//! - [`format`] - native <-> client sample format codec
//! - [`driver`] - the `DriverOps` trait, registry, sessions, built-in null driver
//! - [`args`] - argument marshalling
//! - [`time`] - tick/nanosecond conversion
//! - [`types`] - wire-level constants shared with the C ABI
//! - [`config`] - factory-wide tunables
//! - [`error`] - error taxonomy

pub mod args;
pub mod config;
pub mod device;
pub mod driver;
pub mod error;
pub mod factory;
pub mod format;
pub mod ring;
pub mod stream;
pub mod time;
pub mod types;

pub use args::Args;
pub use config::Config;
pub use device::Device;
pub use driver::{DeviceInfo, DriverHandle, DriverOps, GainRange, RxCallback, StreamingState, TxCallback, TxCallbackResult};
pub use error::{Error, Result};
pub use factory::Factory;
pub use stream::{Stream, StreamEvent, StreamResult};
pub use types::{Direction, ErrorCode, StreamFlags, StreamFormat};
