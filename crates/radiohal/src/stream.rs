// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Stream object (§4.4): the public per-direction handle returned by
//! `setup_stream`. Owns its own `Idle`/`Active`/`Closed` lifecycle,
//! distinct from (and stricter than) `Device`'s `Off`/`Rx`/`Tx` mode —
//! activating a closed or already-active stream raises, symmetric for
//! deactivate (§9: the source tests `_isClosed` on the wrong branch).
//!
//! `read`/`write` run the sample-format codec over direct ring access;
//! `acquire_read`/`release_read`/`acquire_write`/`release_write` bypass
//! the codec entirely for callers that want the native representation.

use crate::args::Args;
use crate::config::{DEFAULT_RING_BUFFERS, DEFAULT_RING_SLOT_BYTES};
use crate::device::Device;
use crate::error::{Error, Result};
use crate::format;
use crate::ring::RingError;
use crate::types::{Direction, StreamFlags, StreamFormat};
use std::sync::Arc;
use std::time::Duration;

/// Bytes per native interleaved-complex-int8 sample as stored in the
/// ring, independent of the client's chosen wire format (§4.2). MTU is
/// defined against this native width, not the client format's width.
const NATIVE_BYTES_PER_SAMPLE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Idle,
    Active,
    Closed,
}

/// Outcome of one `read`/`write`/`read_status` call. `Timeout`,
/// `Overflow`, `Underflow` and `EndAbrupt` are stream runtime events
/// (§7) — returned here, never raised as an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEvent {
    Ok,
    Timeout,
    Overflow,
    Underflow,
}

#[derive(Debug, Clone, Copy)]
pub struct StreamResult {
    pub samples: usize,
    pub event: StreamEvent,
    pub flags: StreamFlags,
    pub time_ns: i64,
}

impl StreamResult {
    fn timeout() -> Self {
        Self { samples: 0, event: StreamEvent::Timeout, flags: StreamFlags::NONE, time_ns: 0 }
    }
}

/// A direct (codec-bypassing) read acquisition.
pub struct DirectRead {
    pub index: Option<usize>,
    pub result: StreamResult,
}

/// A direct (codec-bypassing) write acquisition.
pub struct DirectWrite {
    pub index: Option<usize>,
    pub mtu_bytes: usize,
}

pub struct Stream {
    device: Arc<Device>,
    direction: Direction,
    format: StreamFormat,
    lifecycle: parking_lot::Mutex<Lifecycle>,
}

impl Stream {
    /// §4.4 stream construction: exactly one channel (index 0), format
    /// must be in the driver's advertised `GetStreamFormats`. Allocates
    /// the ring and marks the direction opened on success.
    pub fn setup(
        device: Arc<Device>,
        direction: Direction,
        format_str: &str,
        channels: &[usize],
        args: &Args,
    ) -> Result<Self> {
        if channels != [0] {
            return Err(Error::InvalidChannel(channels.first().copied().unwrap_or(usize::MAX)));
        }
        let format = StreamFormat::parse(format_str)
            .ok_or_else(|| Error::UnsupportedFormat(format_str.to_string()))?;
        if !device.driver.stream_formats(direction).iter().any(|s| *s == format_str) {
            return Err(Error::UnsupportedFormat(format_str.to_string()));
        }

        let buf_count: usize = args
            .get("buffers")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_RING_BUFFERS);
        let buf_len: usize = args
            .get("bufflen")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_RING_SLOT_BYTES);
        let iq_swap = args.get("iq_swap") == Some("true");

        device.allocate_ring(direction, buf_count, buf_len);
        {
            let mut meta = device.meta(direction);
            *meta = Default::default();
            meta.opened = true;
            meta.format = Some(format);
            meta.iq_swap = iq_swap;
        }

        Ok(Self {
            device,
            direction,
            format,
            lifecycle: parking_lot::Mutex::new(Lifecycle::Idle),
        })
    }

    /// `buf_len / bytes_per_sample` (§4.4, §8 property 3), against the
    /// native representation stored in the ring, not the client format.
    pub fn mtu(&self) -> usize {
        self.device
            .ring(self.direction)
            .map(|ring| ring.buf_len() / NATIVE_BYTES_PER_SAMPLE)
            .unwrap_or(0)
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    // ------------------------------------------------------------------
    // Lifecycle (§9 quirk #2: activating closed/active raises, symmetric
    // for deactivate).
    // ------------------------------------------------------------------

    pub fn activate(&self, flags: StreamFlags, _time_ns: i64, num_elems: usize) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock();
        match *lifecycle {
            Lifecycle::Closed => return Err(Error::StreamClosed),
            Lifecycle::Active => {
                return Err(Error::InvalidStreamState { expected: "Idle", actual: "Active" })
            }
            Lifecycle::Idle => {}
        }
        self.device.activate(self.direction, flags, num_elems)?;
        *lifecycle = Lifecycle::Active;
        Ok(())
    }

    pub fn deactivate(&self, _flags: StreamFlags, _time_ns: i64) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock();
        match *lifecycle {
            Lifecycle::Closed => return Err(Error::StreamClosed),
            Lifecycle::Idle => {
                return Err(Error::InvalidStreamState { expected: "Active", actual: "Idle" })
            }
            Lifecycle::Active => {}
        }
        self.device.deactivate(self.direction)?;
        self.reset_remainder();
        *lifecycle = Lifecycle::Idle;
        Ok(())
    }

    /// Auto-deactivates, frees the ring, and marks the stream closed.
    /// Idempotent: closing an already-closed stream is a no-op.
    pub fn close(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock();
        if *lifecycle == Lifecycle::Closed {
            return Ok(());
        }
        if *lifecycle == Lifecycle::Active {
            self.device.deactivate(self.direction)?;
        }
        self.reset_remainder();
        self.device.free_ring(self.direction);
        self.device.meta(self.direction).opened = false;
        *lifecycle = Lifecycle::Closed;
        Ok(())
    }

    fn reset_remainder(&self) {
        let mut meta = self.device.meta(self.direction);
        meta.remainder_handle = None;
        meta.remainder_offset = 0;
        meta.remainder_samps = 0;
    }

    fn ring(&self) -> Result<Arc<crate::ring::RingBuffer>> {
        self.device.ring(self.direction).ok_or(Error::StreamClosed)
    }

    // ------------------------------------------------------------------
    // read_status (§4.4): polls the underflow flag.
    // ------------------------------------------------------------------

    pub fn read_status(&self, timeout_us: u64) -> Result<StreamEvent> {
        let ring = self.ring()?;
        let deadline = std::time::Instant::now() + Duration::from_micros(timeout_us);
        loop {
            if ring.take_underflow() {
                return Ok(StreamEvent::Underflow);
            }
            let now = std::time::Instant::now();
            if now >= deadline {
                return Ok(StreamEvent::Timeout);
            }
            let step = (deadline - now) / 10;
            std::thread::sleep(step.min(Duration::from_millis(10)));
        }
    }

    // ------------------------------------------------------------------
    // Direct (codec-bypassing) ring access.
    // ------------------------------------------------------------------

    pub fn acquire_read(&self, timeout: Duration) -> Result<DirectRead> {
        let ring = self.ring()?;
        match ring.acquire_read(timeout) {
            Ok(slot) => Ok(DirectRead {
                index: Some(slot.index),
                result: StreamResult {
                    samples: slot.valid_len / NATIVE_BYTES_PER_SAMPLE,
                    event: StreamEvent::Ok,
                    flags: slot.flags,
                    time_ns: slot.time_ns,
                },
            }),
            Err(RingError::Timeout) => Ok(DirectRead { index: None, result: StreamResult::timeout() }),
            Err(RingError::Overflow) => Ok(DirectRead {
                index: None,
                result: StreamResult {
                    samples: 0,
                    event: StreamEvent::Overflow,
                    flags: StreamFlags::END_ABRUPT,
                    time_ns: 0,
                },
            }),
        }
    }

    pub fn release_read(&self, index: usize) -> Result<()> {
        self.ring()?.release_read(index);
        Ok(())
    }

    pub fn acquire_write(&self, timeout: Duration) -> Result<DirectWrite> {
        let ring = self.ring()?;
        match ring.acquire_write(timeout) {
            Ok(slot) => Ok(DirectWrite { index: Some(slot.index), mtu_bytes: slot.mtu_bytes }),
            Err(_) => Ok(DirectWrite { index: None, mtu_bytes: 0 }),
        }
    }

    pub fn release_write(&self, index: usize, num_elems: usize, flags: StreamFlags, time_ns: i64) -> Result<()> {
        self.ring()?
            .release_write(index, num_elems * NATIVE_BYTES_PER_SAMPLE, flags, time_ns);
        Ok(())
    }

    // ------------------------------------------------------------------
    // read / write (§4.4): codec over direct ring access, with the
    // remainder cursor carrying a partially-consumed buffer forward.
    // ------------------------------------------------------------------

    /// `num_elems` is clamped to MTU. A live remainder is drained first;
    /// once exhausted its handle is released and a fresh direct buffer
    /// is acquired. If acquisition times out but the remainder already
    /// served some samples, those are returned with `StreamEvent::Ok`.
    pub fn read(&self, out: &mut [u8], num_elems: usize, timeout_us: u64) -> Result<StreamResult> {
        if self.direction != Direction::Rx {
            return Err(Error::NotSupported("read on a non-RX stream"));
        }
        let ring = self.ring()?;
        let want = num_elems.min(self.mtu());
        let mut delivered = 0usize;
        let mut flags = StreamFlags::NONE;
        let mut time_ns = 0i64;

        {
            let mut meta = self.device.meta(Direction::Rx);
            if meta.remainder_samps > 0 {
                let index = meta
                    .remainder_handle
                    .expect("remainder_samps > 0 implies a live remainder handle");
                let take = meta.remainder_samps.min(want);
                let total_native = meta.remainder_offset + meta.remainder_samps;
                let slot_bytes = ring.read_slot(index, total_native * NATIVE_BYTES_PER_SAMPLE);
                let start = meta.remainder_offset * NATIVE_BYTES_PER_SAMPLE;
                let native_bytes = &slot_bytes[start..start + take * NATIVE_BYTES_PER_SAMPLE];
                let native = as_native_i8(native_bytes);
                decode_into(&native, take, self.format, meta.iq_swap, out, 0);
                delivered += take;
                meta.remainder_offset += take;
                meta.remainder_samps -= take;
                if meta.remainder_samps == 0 {
                    ring.release_read(index);
                    meta.remainder_handle = None;
                    meta.remainder_offset = 0;
                }
            }
        }

        if delivered >= want {
            return Ok(StreamResult { samples: delivered, event: StreamEvent::Ok, flags, time_ns });
        }

        let still_need = want - delivered;
        match ring.acquire_read(Duration::from_micros(timeout_us)) {
            Ok(slot) => {
                flags = slot.flags;
                time_ns = slot.time_ns;
                let available = slot.valid_len / NATIVE_BYTES_PER_SAMPLE;
                let take = available.min(still_need);
                let native_bytes = ring.read_slot(slot.index, take * NATIVE_BYTES_PER_SAMPLE);
                let native = as_native_i8(native_bytes);
                let iq_swap = self.device.meta(Direction::Rx).iq_swap;
                decode_into(&native, take, self.format, iq_swap, out, delivered);
                delivered += take;
                if take < available {
                    let mut meta = self.device.meta(Direction::Rx);
                    meta.remainder_handle = Some(slot.index);
                    meta.remainder_offset = take;
                    meta.remainder_samps = available - take;
                } else {
                    ring.release_read(slot.index);
                }
                Ok(StreamResult { samples: delivered, event: StreamEvent::Ok, flags, time_ns })
            }
            Err(RingError::Overflow) => {
                Ok(StreamResult { samples: delivered, event: StreamEvent::Overflow, flags: StreamFlags::END_ABRUPT, time_ns: 0 })
            }
            Err(RingError::Timeout) => {
                if delivered > 0 {
                    Ok(StreamResult { samples: delivered, event: StreamEvent::Ok, flags, time_ns })
                } else {
                    Ok(StreamResult::timeout())
                }
            }
        }
    }

    /// Mirror of `read`. The unfilled tail of the burst's final slot is
    /// zero-filled and `END_BURST` is recorded on it so the TX driver
    /// callback can end the transfer (§4.4, §8 S6). Quirk #4 (§9): this
    /// path consults only `tx_meta`, never `rx_meta`.
    pub fn write(&self, input: &[u8], num_elems: usize, flags: StreamFlags, time_ns: i64, timeout_us: u64) -> Result<StreamResult> {
        if self.direction != Direction::Tx {
            return Err(Error::NotSupported("write on a non-TX stream"));
        }
        let ring = self.ring()?;
        let mut want = num_elems.min(self.mtu());

        let (burst_end, burst_remaining) = {
            let meta = self.device.meta(Direction::Tx);
            (meta.burst_end, meta.burst_samps)
        };
        if burst_end {
            want = want.min(burst_remaining);
        }
        if want == 0 {
            return Ok(StreamResult { samples: 0, event: StreamEvent::Ok, flags, time_ns });
        }

        let has_remainder = self.device.meta(Direction::Tx).remainder_samps > 0;
        let (index, capacity, base_offset) = if has_remainder {
            let meta = self.device.meta(Direction::Tx);
            let index = meta
                .remainder_handle
                .expect("remainder_samps > 0 implies a live remainder handle");
            (index, meta.remainder_offset + meta.remainder_samps, meta.remainder_offset)
        } else {
            match ring.acquire_write(Duration::from_micros(timeout_us)) {
                Ok(slot) => (slot.index, slot.mtu_bytes / NATIVE_BYTES_PER_SAMPLE, 0),
                Err(_) => return Ok(StreamResult::timeout()),
            }
        };

        let room = capacity - base_offset;
        let take = want.min(room);
        let in_bytes = take * self.format.bytes_per_sample();
        let iq_swap = self.device.meta(Direction::Tx).iq_swap;
        let mut native = vec![0i8; take * NATIVE_BYTES_PER_SAMPLE];
        format::encode(&input[..in_bytes], take, self.format, iq_swap, &mut native);
        ring.write_slot_at(index, base_offset * NATIVE_BYTES_PER_SAMPLE, &as_native_u8(&native));

        let consumed_total = base_offset + take;
        let mut meta = self.device.meta(Direction::Tx);
        let burst_done = meta.burst_end && {
            meta.burst_samps = meta.burst_samps.saturating_sub(take);
            meta.burst_samps == 0
        };

        if burst_done {
            ring.zero_slot_from(index, consumed_total * NATIVE_BYTES_PER_SAMPLE);
            ring.release_write(index, consumed_total * NATIVE_BYTES_PER_SAMPLE, flags.union(StreamFlags::END_BURST), time_ns);
            meta.remainder_handle = None;
            meta.remainder_offset = 0;
            meta.remainder_samps = 0;
            meta.burst_end = false;
        } else if consumed_total == capacity {
            ring.release_write(index, consumed_total * NATIVE_BYTES_PER_SAMPLE, flags, time_ns);
            meta.remainder_handle = None;
            meta.remainder_offset = 0;
            meta.remainder_samps = 0;
        } else {
            meta.remainder_handle = Some(index);
            meta.remainder_offset = consumed_total;
            meta.remainder_samps = capacity - consumed_total;
        }

        Ok(StreamResult { samples: take, event: StreamEvent::Ok, flags, time_ns })
    }
}

fn as_native_i8(bytes: &[u8]) -> Vec<i8> {
    bytes.iter().map(|&b| b as i8).collect()
}

fn as_native_u8(native: &[i8]) -> Vec<u8> {
    native.iter().map(|&b| b as u8).collect()
}

/// Decode `len` native complex samples into `out`, writing starting at
/// sample offset `out_sample_offset` (used when a read call partially
/// fills `out` from the remainder before pulling a fresh slot).
fn decode_into(native: &[i8], len: usize, format: StreamFormat, iq_swap: bool, out: &mut [u8], out_sample_offset: usize) {
    let byte_offset = out_sample_offset * format.bytes_per_sample();
    let byte_len = len * format.bytes_per_sample();
    format::decode(native, len, format, iq_swap, &mut out[byte_offset..byte_offset + byte_len]);
}
