// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Device handle and transceiver state machine (§3, §4.3).
//!
//! `Device` owns the native driver handle, the process-wide session,
//! the current `Off`/`Rx`/`Tx` mode, a per-direction tuner cache, and
//! the RX/TX rings. `device_mutex` (here, `state`) covers mode and
//! tuner state; each ring carries its own internal mutex (`buf_mutex`
//! in spec terms) and is never touched while `state` is held.

pub mod tuner;

use crate::args::Args;
use crate::driver::session::Session;
use crate::driver::{DriverHandle, DriverOps, RxCallback, StreamingState, TxCallback, TxCallbackResult};
use crate::error::{Error, Result};
use crate::ring::RingBuffer;
use crate::types::{Direction, ErrorCode, StreamFlags, StreamFormat};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

const TX_DRAIN_POLL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Off,
    Rx,
    Tx,
}

/// Cached tuner values for one direction (§3 "Tuner state cache").
#[derive(Debug, Clone, Default)]
pub struct TunerState {
    pub frequency: f64,
    pub sample_rate: f64,
    pub bandwidth: f64,
    pub gain: f64,
    pub antenna: String,
    /// Cached "AMP" element value, if the driver has one. Amp enable
    /// is `amp_gain > 0` on both the normal and the recovery path
    /// (§9 corrects an inverted sense on the recovery path only).
    pub amp_gain: f64,
}

struct DeviceState {
    handle: Box<dyn DriverHandle>,
    mode: Mode,
    rx_tuner: TunerState,
    tx_tuner: TunerState,
}

/// Per-direction bookkeeping that sits alongside the ring but outside
/// its mutex: opened/format/iq_swap, the remainder cursor, and the
/// soft-error flags (§3 "Stream state").
pub(crate) struct StreamMeta {
    pub opened: bool,
    pub format: Option<StreamFormat>,
    pub iq_swap: bool,
    pub remainder_handle: Option<usize>,
    pub remainder_offset: usize,
    pub remainder_samps: usize,
    pub burst_end: bool,
    pub burst_samps: usize,
}

impl Default for StreamMeta {
    fn default() -> Self {
        Self {
            opened: false,
            format: None,
            iq_swap: false,
            remainder_handle: None,
            remainder_offset: 0,
            remainder_samps: 0,
            burst_end: false,
            burst_samps: 0,
        }
    }
}

pub struct Device {
    pub(crate) driver: Arc<dyn DriverOps>,
    pub(crate) driver_name: &'static str,
    pub(crate) args: Args,
    state: Mutex<DeviceState>,
    session: Mutex<Option<Session>>,
    /// Allocated by `setup_stream`, freed by `close` (§3 invariant);
    /// absent otherwise. `Stream::activate` requires it to already exist.
    pub(crate) rx_ring: Mutex<Option<Arc<RingBuffer>>>,
    pub(crate) tx_ring: Mutex<Option<Arc<RingBuffer>>>,
    pub(crate) rx_meta: Mutex<StreamMeta>,
    pub(crate) tx_meta: Mutex<StreamMeta>,
}

impl Device {
    pub fn new(
        driver: Arc<dyn DriverOps>,
        driver_name: &'static str,
        args: Args,
        handle: Box<dyn DriverHandle>,
        session: Session,
    ) -> Self {
        Self {
            driver,
            driver_name,
            args,
            state: Mutex::new(DeviceState {
                handle,
                mode: Mode::Off,
                rx_tuner: TunerState::default(),
                tx_tuner: TunerState::default(),
            }),
            session: Mutex::new(Some(session)),
            rx_ring: Mutex::new(None),
            tx_ring: Mutex::new(None),
            rx_meta: Mutex::new(StreamMeta::default()),
            tx_meta: Mutex::new(StreamMeta::default()),
        }
    }

    pub fn mode(&self) -> Mode {
        self.state.lock().mode
    }

    /// §3: ring memory is allocated at `setup_stream` and freed at
    /// `close_stream`, never reallocated under activation.
    pub(crate) fn allocate_ring(&self, direction: Direction, buf_count: usize, buf_len: usize) -> Arc<RingBuffer> {
        let ring = Arc::new(RingBuffer::new(buf_count, buf_len));
        let slot = match direction {
            Direction::Rx => &self.rx_ring,
            Direction::Tx => &self.tx_ring,
        };
        *slot.lock() = Some(Arc::clone(&ring));
        ring
    }

    pub(crate) fn free_ring(&self, direction: Direction) {
        let slot = match direction {
            Direction::Rx => &self.rx_ring,
            Direction::Tx => &self.tx_ring,
        };
        *slot.lock() = None;
    }

    pub(crate) fn ring(&self, direction: Direction) -> Option<Arc<RingBuffer>> {
        match direction {
            Direction::Rx => self.rx_ring.lock().clone(),
            Direction::Tx => self.tx_ring.lock().clone(),
        }
    }

    pub(crate) fn meta(&self, direction: Direction) -> parking_lot::MutexGuard<'_, StreamMeta> {
        match direction {
            Direction::Rx => self.rx_meta.lock(),
            Direction::Tx => self.tx_meta.lock(),
        }
    }

    pub fn driver_name(&self) -> &'static str {
        self.driver_name
    }

    pub fn args(&self) -> &Args {
        &self.args
    }

    /// Releases the device's native handle and its driver session.
    /// Idempotent; called once by the factory when the refcount hits zero.
    pub fn dispose(&self) {
        let mut state = self.state.lock();
        if let Err(err) = self.driver.close(state.handle.as_mut()) {
            log::warn!("radiohal: driver '{}' close failed: {err}", self.driver_name);
        }
        drop(state);
        if let Some(session) = self.session.lock().take() {
            session.release(|| {
                log::debug!("radiohal: driver '{}' session released", self.driver_name);
            });
        }
    }

    // ------------------------------------------------------------------
    // Tuner passthrough (§4.5), backed by the composite defaults.
    // ------------------------------------------------------------------

    pub fn set_frequency(&self, direction: Direction, freq: f64, args: &Args) -> Result<()> {
        let mut state = self.state.lock();
        tuner::set_frequency(self.driver.as_ref(), state.handle.as_ref(), direction, freq, args)?;
        let achieved = tuner::get_frequency(self.driver.as_ref(), state.handle.as_ref(), direction)?;
        self.tuner_mut(&mut state, direction).frequency = achieved;
        Ok(())
    }

    pub fn get_frequency(&self, direction: Direction) -> Result<f64> {
        let state = self.state.lock();
        tuner::get_frequency(self.driver.as_ref(), state.handle.as_ref(), direction)
    }

    pub fn set_frequency_correction(&self, direction: Direction, ppm: f64) -> Result<()> {
        let state = self.state.lock();
        tuner::set_frequency_correction(self.driver.as_ref(), state.handle.as_ref(), direction, ppm)
    }

    pub fn set_sample_rate(&self, direction: Direction, rate: f64) -> Result<()> {
        let mut state = self.state.lock();
        self.driver.set_sample_rate(state.handle.as_ref(), rate)?;
        self.tuner_mut(&mut state, direction).sample_rate = rate;
        Ok(())
    }

    pub fn set_bandwidth(&self, direction: Direction, hz: f64) -> Result<()> {
        let mut state = self.state.lock();
        self.driver.set_bandwidth(state.handle.as_ref(), hz)?;
        self.tuner_mut(&mut state, direction).bandwidth = hz;
        Ok(())
    }

    pub fn set_antenna(&self, direction: Direction, name: &str) -> Result<()> {
        let mut state = self.state.lock();
        self.driver.set_antenna(state.handle.as_ref(), direction, name)?;
        self.tuner_mut(&mut state, direction).antenna = name.to_string();
        Ok(())
    }

    /// §4.5 `set_gain`, plus the corrected amp-enable sense (§9): the
    /// driver's `"AMP"` element, if present, also drives `set_amp_enable`.
    pub fn set_gain(&self, direction: Direction, value: f64) -> Result<()> {
        let mut state = self.state.lock();
        let applied = tuner::set_gain(self.driver.as_ref(), state.handle.as_ref(), direction, value)?;
        let amp_gain = applied.iter().find(|(name, _)| *name == "AMP").map(|(_, v)| *v);
        {
            let tuner = self.tuner_mut(&mut state, direction);
            tuner.gain = value;
            if let Some(amp_gain) = amp_gain {
                tuner.amp_gain = amp_gain;
            }
        }
        if let Some(amp_gain) = amp_gain {
            self.driver.set_amp_enable(state.handle.as_ref(), amp_gain > 0.0)?;
        }
        Ok(())
    }

    fn tuner_mut<'a>(&self, state: &'a mut DeviceState, direction: Direction) -> &'a mut TunerState {
        match direction {
            Direction::Rx => &mut state.rx_tuner,
            Direction::Tx => &mut state.tx_tuner,
        }
    }

    // ------------------------------------------------------------------
    // Transceiver state machine (§4.3).
    // ------------------------------------------------------------------

    /// `activate(stream)`. `num_elems`/`flags` only matter for TX (the
    /// bursted-start requirement).
    pub fn activate(&self, direction: Direction, flags: StreamFlags, num_elems: usize) -> Result<()> {
        match direction {
            Direction::Rx => self.activate_rx(),
            Direction::Tx => self.activate_tx(flags, num_elems),
        }
    }

    pub fn deactivate(&self, direction: Direction) -> Result<()> {
        let mut state = self.state.lock();
        match (direction, state.mode) {
            (Direction::Rx, Mode::Rx) => {
                self.driver.stop_rx(state.handle.as_ref())?;
                state.mode = Mode::Off;
            }
            (Direction::Tx, Mode::Tx) => {
                self.driver.stop_tx(state.handle.as_ref())?;
                state.mode = Mode::Off;
            }
            _ => {}
        }
        Ok(())
    }

    fn activate_rx(&self) -> Result<()> {
        let mut state = self.state.lock();
        match state.mode {
            Mode::Rx => return Ok(()),
            Mode::Tx => {
                self.wait_for_tx_drain(&state)?;
                self.driver.stop_tx(state.handle.as_ref())?;
                self.reapply_tuner_locked(&mut state, Direction::Rx)?;
            }
            Mode::Off => {}
        }
        self.start_rx_locked(&mut state)?;
        state.mode = Mode::Rx;
        Ok(())
    }

    fn activate_tx(&self, flags: StreamFlags, num_elems: usize) -> Result<()> {
        let mut state = self.state.lock();
        if state.mode == Mode::Tx {
            return Ok(());
        }
        if !(flags.contains(StreamFlags::END_BURST) && num_elems > 0) {
            // Armed, not started: the transition is refused with no error
            // until a bursted write actually arrives (§4.3).
            return Ok(());
        }
        if state.mode == Mode::Rx {
            self.driver.stop_rx(state.handle.as_ref())?;
            self.reapply_tuner_locked(&mut state, Direction::Tx)?;
        }
        self.start_tx_locked(&mut state)?;
        state.mode = Mode::Tx;
        let mut meta = self.tx_meta.lock();
        meta.burst_end = true;
        meta.burst_samps = num_elems;
        Ok(())
    }

    fn wait_for_tx_drain(&self, state: &DeviceState) -> Result<()> {
        loop {
            match self.driver.is_streaming(state.handle.as_ref(), Direction::Tx)? {
                StreamingState::NotStreaming => return Ok(()),
                _ => std::thread::sleep(TX_DRAIN_POLL),
            }
        }
    }

    fn start_rx_locked(&self, state: &mut DeviceState) -> Result<()> {
        let ring = self.ring(Direction::Rx).ok_or(Error::StreamClosed)?;
        ring.reset();
        let cb_ring = Arc::clone(&ring);
        let callback: RxCallback = Box::new(move |data: &[u8]| {
            cb_ring.rx_push(data, 0);
        });
        self.driver.start_rx(state.handle.as_ref(), callback)?;

        match self.driver.is_streaming(state.handle.as_ref(), Direction::Rx)? {
            StreamingState::True => Ok(()),
            StreamingState::StreamingExitCalled => {
                self.recover_device_locked(state)?;
                ring.reset();
                let cb_ring = Arc::clone(&ring);
                let callback: RxCallback = Box::new(move |data: &[u8]| {
                    cb_ring.rx_push(data, 0);
                });
                self.driver.start_rx(state.handle.as_ref(), callback)?;
                match self.driver.is_streaming(state.handle.as_ref(), Direction::Rx)? {
                    StreamingState::True => Ok(()),
                    _ => Err(stream_error(self.driver_name, "start_rx")),
                }
            }
            StreamingState::NotStreaming => Err(stream_error(self.driver_name, "start_rx")),
        }
    }

    fn start_tx_locked(&self, state: &mut DeviceState) -> Result<()> {
        let ring = self.ring(Direction::Tx).ok_or(Error::StreamClosed)?;
        ring.reset();
        let cb_ring = Arc::clone(&ring);
        let callback: TxCallback = Box::new(move |buf: &mut [u8]| {
            let (len, underflow, flags) = cb_ring.tx_pull(buf);
            TxCallbackResult {
                valid_len: if underflow { 0 } else { len },
                end_transfer: flags.contains(StreamFlags::END_BURST),
            }
        });
        self.driver.start_tx(state.handle.as_ref(), callback)?;

        match self.driver.is_streaming(state.handle.as_ref(), Direction::Tx)? {
            StreamingState::True => Ok(()),
            StreamingState::StreamingExitCalled => {
                self.recover_device_locked(state)?;
                ring.reset();
                let cb_ring = Arc::clone(&ring);
                let callback: TxCallback = Box::new(move |buf: &mut [u8]| {
                    let (len, underflow, flags) = cb_ring.tx_pull(buf);
                    TxCallbackResult {
                        valid_len: if underflow { 0 } else { len },
                        end_transfer: flags.contains(StreamFlags::END_BURST),
                    }
                });
                self.driver.start_tx(state.handle.as_ref(), callback)?;
                match self.driver.is_streaming(state.handle.as_ref(), Direction::Tx)? {
                    StreamingState::True => Ok(()),
                    _ => Err(stream_error(self.driver_name, "start_tx")),
                }
            }
            StreamingState::NotStreaming => Err(stream_error(self.driver_name, "start_tx")),
        }
    }

    /// Close-and-reopen-by-serial recovery from `StreamingExitCalled`,
    /// then reapply every cached tuner value for both directions (§4.3,
    /// §9's amp-enable correction applies identically here and on the
    /// non-recovery path).
    fn recover_device_locked(&self, state: &mut DeviceState) -> Result<()> {
        if let Err(err) = self.driver.close(state.handle.as_mut()) {
            log::warn!("radiohal: driver '{}' close-for-recovery failed: {err}", self.driver_name);
        }
        let new_handle = self.driver.open(&self.args).map_err(|_| Error::Unrecoverable {
            driver: self.driver_name.to_string(),
            reason: "reopen after StreamingExitCalled failed".to_string(),
        })?;
        state.handle = new_handle;
        self.reapply_tuner_locked(state, Direction::Rx)?;
        self.reapply_tuner_locked(state, Direction::Tx)?;
        Ok(())
    }

    fn reapply_tuner_locked(&self, state: &mut DeviceState, direction: Direction) -> Result<()> {
        let cached = match direction {
            Direction::Rx => state.rx_tuner.clone(),
            Direction::Tx => state.tx_tuner.clone(),
        };
        if cached.sample_rate > 0.0 {
            self.driver.set_sample_rate(state.handle.as_ref(), cached.sample_rate)?;
        }
        if cached.bandwidth > 0.0 {
            self.driver.set_bandwidth(state.handle.as_ref(), cached.bandwidth)?;
        }
        if cached.frequency != 0.0 {
            tuner::set_frequency(
                self.driver.as_ref(),
                state.handle.as_ref(),
                direction,
                cached.frequency,
                &Args::new(),
            )?;
        }
        if !cached.antenna.is_empty() {
            self.driver.set_antenna(state.handle.as_ref(), direction, &cached.antenna)?;
        }
        tuner::set_gain(self.driver.as_ref(), state.handle.as_ref(), direction, cached.gain)?;
        self.driver.set_amp_enable(state.handle.as_ref(), cached.amp_gain > 0.0)?;
        Ok(())
    }
}

fn stream_error(driver_name: &'static str, operation: &'static str) -> Error {
    Error::DriverError {
        driver: driver_name.to_string(),
        operation,
        code: ErrorCode::StreamError as i32,
    }
}
