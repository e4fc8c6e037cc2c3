// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Direct-access FIFO ring buffer (§4.1).
//!
//! Shared between exactly two parties: a producer and a consumer. For
//! an RX stream the producer is the driver's sample callback and the
//! consumer is the client; for TX it's the reverse. A single mutex
//! protects `head`/`tail`/`count` and the overflow/underflow flags; a
//! condition variable wakes whichever side is blocked in `acquire_*`.
//!
//! `head` is the consumer's cursor, `tail` is the producer's. Both the
//! client-facing `acquire_write`/`acquire_read` pair and the driver
//! callback's direct push/pull share this same head/tail state, so a
//! TX client write (producer) and the TX driver callback (consumer)
//! stay on one FIFO, and likewise for RX.

use crate::types::StreamFlags;
use parking_lot::{Condvar, Mutex};
use std::cell::UnsafeCell;
use std::time::{Duration, Instant};

/// Per-slot metadata recorded at `release_write` / the RX producer
/// push, and handed back unchanged by the matching `acquire_read`.
#[derive(Debug, Clone, Copy, Default)]
struct SlotInfo {
    valid_len: usize,
    flags: StreamFlags,
    time_ns: i64,
}

struct Inner {
    head: usize,
    tail: usize,
    count: usize,
    overflow: bool,
    underflow: bool,
    slots: Vec<SlotInfo>,
}

/// Outcome of `acquire_read`/`acquire_write` in the timeout/overflow
/// cases (§4.1, §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingError {
    Timeout,
    /// RX consumer acquire observed the overflow flag; the flag has
    /// already been cleared by the time this is returned.
    Overflow,
}

/// A slot handed to the consumer by `acquire_read`.
pub struct ReadSlot {
    pub index: usize,
    pub valid_len: usize,
    pub flags: StreamFlags,
    pub time_ns: i64,
}

/// A slot handed to the producer by `acquire_write`.
pub struct WriteSlot {
    pub index: usize,
    pub mtu_bytes: usize,
}

/// Fixed-count, pre-allocated byte-buffer ring (§3 "Ring" data model).
///
/// `buffers` is boxed once at construction and never reallocated while
/// the stream is active, matching the "Buffer memory is allocated at
/// `setup_stream` and freed at `close_stream`" invariant.
pub struct RingBuffer {
    buffers: Vec<UnsafeCell<Box<[u8]>>>,
    buf_len: usize,
    buf_count: usize,
    inner: Mutex<Inner>,
    not_empty_or_full: Condvar,
}

// SAFETY: `buffers` is only ever accessed through the slot indices
// handed out by `acquire_read`/`acquire_write` under `inner`'s lock,
// and the FIFO protocol (head/tail/count) guarantees the producer's
// tail slot and the consumer's head slot never alias while both sides
// hold a live acquisition. The buffers themselves never move or
// reallocate for the ring's lifetime.
unsafe impl Sync for RingBuffer {}

impl RingBuffer {
    pub fn new(buf_count: usize, buf_len: usize) -> Self {
        let buffers = (0..buf_count)
            .map(|_| UnsafeCell::new(vec![0u8; buf_len].into_boxed_slice()))
            .collect();
        Self {
            buffers,
            buf_len,
            buf_count,
            inner: Mutex::new(Inner {
                head: 0,
                tail: 0,
                count: 0,
                overflow: false,
                underflow: false,
                slots: vec![SlotInfo::default(); buf_count],
            }),
            not_empty_or_full: Condvar::new(),
        }
    }

    pub fn buf_count(&self) -> usize {
        self.buf_count
    }

    pub fn buf_len(&self) -> usize {
        self.buf_len
    }

    /// Raw bytes of slot `index`. Caller must hold a live acquisition
    /// of that slot (enforced by the acquire/release protocol, not the
    /// type system — mirrors the teacher's shared-memory ring).
    fn slot_bytes_mut(&self, index: usize) -> &mut [u8] {
        // SAFETY: `index` was handed out by acquire_read/acquire_write
        // and is only used by the single holder of that acquisition
        // until the matching release call.
        unsafe { &mut *self.buffers[index].get() }
    }

    fn deadline(timeout: Duration) -> Instant {
        Instant::now() + timeout
    }

    /// §4.1 `acquire_read`. Blocks until `count > 0`, `timeout`
    /// elapses, or the overflow flag is observed (cleared and
    /// reported, consuming no samples).
    pub fn acquire_read(&self, timeout: Duration) -> Result<ReadSlot, RingError> {
        let until = Self::deadline(timeout);
        let mut guard = self.inner.lock();
        loop {
            if guard.overflow {
                guard.overflow = false;
                return Err(RingError::Overflow);
            }
            if guard.count > 0 {
                let index = guard.head;
                guard.head = (guard.head + 1) % self.buf_count;
                let info = guard.slots[index];
                return Ok(ReadSlot {
                    index,
                    valid_len: info.valid_len,
                    flags: info.flags,
                    time_ns: info.time_ns,
                });
            }
            let now = Instant::now();
            if now >= until {
                return Err(RingError::Timeout);
            }
            let remaining = until - now;
            let timed_out = self
                .not_empty_or_full
                .wait_for(&mut guard, remaining)
                .timed_out();
            if timed_out && guard.count == 0 && !guard.overflow {
                return Err(RingError::Timeout);
            }
        }
    }

    /// §4.1 `release_read`: decrements `count`, frees the slot for the
    /// producer, wakes anyone blocked on `acquire_write`.
    pub fn release_read(&self, _index: usize) {
        let mut guard = self.inner.lock();
        guard.count = guard.count.saturating_sub(1);
        self.not_empty_or_full.notify_all();
    }

    /// §4.1 `acquire_write`. Blocks until `count < buf_count`, or
    /// `timeout` elapses.
    pub fn acquire_write(&self, timeout: Duration) -> Result<WriteSlot, RingError> {
        let until = Self::deadline(timeout);
        let mut guard = self.inner.lock();
        loop {
            if guard.count < self.buf_count {
                let index = guard.tail;
                guard.tail = (guard.tail + 1) % self.buf_count;
                return Ok(WriteSlot {
                    index,
                    mtu_bytes: self.buf_len,
                });
            }
            let now = Instant::now();
            if now >= until {
                return Err(RingError::Timeout);
            }
            let remaining = until - now;
            let timed_out = self
                .not_empty_or_full
                .wait_for(&mut guard, remaining)
                .timed_out();
            if timed_out && guard.count >= self.buf_count {
                return Err(RingError::Timeout);
            }
        }
    }

    /// §4.1 `release_write`: records the slot's metadata, increments
    /// `count`, wakes anyone blocked on `acquire_read`.
    pub fn release_write(&self, index: usize, num_elems_bytes: usize, flags: StreamFlags, time_ns: i64) {
        let mut guard = self.inner.lock();
        guard.slots[index] = SlotInfo {
            valid_len: num_elems_bytes,
            flags,
            time_ns,
        };
        guard.count += 1;
        self.not_empty_or_full.notify_all();
    }

    /// Copy `data` into the slot returned by `acquire_write`/`acquire_read`.
    pub fn write_slot(&self, index: usize, data: &[u8]) {
        self.slot_bytes_mut(index)[..data.len()].copy_from_slice(data);
    }

    /// Read the slot's bytes (up to `valid_len`).
    pub fn read_slot(&self, index: usize, valid_len: usize) -> &[u8] {
        &self.slot_bytes_mut(index)[..valid_len]
    }

    /// Zero-fill a slot (used by the TX underflow path).
    pub fn zero_slot(&self, index: usize) {
        self.slot_bytes_mut(index).fill(0);
    }

    /// Copy `data` into slot `index` starting at `offset_bytes`, used to
    /// continue filling a TX slot held open across several `write` calls.
    pub fn write_slot_at(&self, index: usize, offset_bytes: usize, data: &[u8]) {
        self.slot_bytes_mut(index)[offset_bytes..offset_bytes + data.len()].copy_from_slice(data);
    }

    /// Zero-fill the tail of a slot from `offset_bytes` onward, used to
    /// pad a burst that ends short of a full MTU (§4.4, §8 S6).
    pub fn zero_slot_from(&self, index: usize, offset_bytes: usize) {
        self.slot_bytes_mut(index)[offset_bytes..].fill(0);
    }

    // ------------------------------------------------------------------
    // Driver-callback-side paths (§4.1 "Producer path"). Called
    // directly from the hardware I/O thread, never blocking.
    // ------------------------------------------------------------------

    /// RX driver callback producer push: copies `data` into the tail
    /// slot, advances `tail`. If the ring is full, sets `overflow` and
    /// also advances `head`, dropping the oldest buffer — so overflow
    /// is reported exactly once per epoch rather than once per dropped
    /// buffer (§8 property 4).
    pub fn rx_push(&self, data: &[u8], time_ns: i64) {
        let mut guard = self.inner.lock();
        let index = guard.tail;
        let len = data.len().min(self.buf_len);
        self.slot_bytes_mut(index)[..len].copy_from_slice(&data[..len]);
        guard.slots[index] = SlotInfo {
            valid_len: len,
            flags: StreamFlags::NONE,
            time_ns,
        };
        guard.tail = (guard.tail + 1) % self.buf_count;
        if guard.count == self.buf_count {
            guard.overflow = true;
            guard.head = (guard.head + 1) % self.buf_count;
        } else {
            guard.count += 1;
        }
        self.not_empty_or_full.notify_all();
    }

    /// TX driver callback consumer pull: copies up to `out.len()`
    /// bytes from the head slot into `out`, advances `head`. On
    /// underflow, zero-fills `out` and sets the underflow flag.
    /// Returns `(bytes_delivered, underflow, flags)`; `flags` is the
    /// slot's recorded flags (e.g. `END_BURST`, set by `release_write`),
    /// letting the driver callback decide whether to end the transfer.
    pub fn tx_pull(&self, out: &mut [u8]) -> (usize, bool, StreamFlags) {
        let mut guard = self.inner.lock();
        if guard.count == 0 {
            guard.underflow = true;
            out.fill(0);
            self.not_empty_or_full.notify_all();
            return (0, true, StreamFlags::NONE);
        }
        let index = guard.head;
        let info = guard.slots[index];
        let len = info.valid_len.min(out.len());
        out[..len].copy_from_slice(&self.slot_bytes_mut(index)[..len]);
        guard.head = (guard.head + 1) % self.buf_count;
        guard.count -= 1;
        self.not_empty_or_full.notify_all();
        (len, false, info.flags)
    }

    /// Poll-and-clear the underflow flag (§4.4 `read_status`).
    pub fn take_underflow(&self) -> bool {
        let mut guard = self.inner.lock();
        std::mem::take(&mut guard.underflow)
    }

    pub fn reset(&self) {
        let mut guard = self.inner.lock();
        guard.head = 0;
        guard.tail = 0;
        guard.count = 0;
        guard.overflow = false;
        guard.underflow = false;
    }

    #[cfg(test)]
    fn count(&self) -> usize {
        self.inner.lock().count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn fifo_order_is_preserved() {
        let ring = RingBuffer::new(4, 8);
        for i in 0..3u8 {
            let slot = ring.acquire_write(Duration::from_millis(10)).unwrap();
            ring.write_slot(slot.index, &[i; 8]);
            ring.release_write(slot.index, 8, StreamFlags::NONE, 0);
        }
        for i in 0..3u8 {
            let slot = ring.acquire_read(Duration::from_millis(10)).unwrap();
            assert_eq!(ring.read_slot(slot.index, slot.valid_len), &[i; 8]);
            ring.release_read(slot.index);
        }
    }

    #[test]
    fn acquire_read_times_out_on_empty_ring() {
        let ring = RingBuffer::new(2, 8);
        let err = ring.acquire_read(Duration::from_millis(5)).unwrap_err();
        assert_eq!(err, RingError::Timeout);
    }

    #[test]
    fn acquire_write_times_out_when_full() {
        let ring = RingBuffer::new(1, 8);
        let slot = ring.acquire_write(Duration::from_millis(10)).unwrap();
        ring.release_write(slot.index, 8, StreamFlags::NONE, 0);
        let err = ring.acquire_write(Duration::from_millis(5)).unwrap_err();
        assert_eq!(err, RingError::Timeout);
    }

    /// S5: with buf_num=3, a producer that writes 4 buffers before any
    /// consumer read sets overflow on the fourth; the next acquire_read
    /// reports Overflow, and subsequent acquires return the remaining
    /// FIFO contents.
    #[test]
    fn overflow_is_reported_once_then_fifo_resumes() {
        let ring = RingBuffer::new(3, 4);
        for i in 0..4u8 {
            ring.rx_push(&[i; 4], 0);
        }
        assert_eq!(ring.count(), 3);

        let err = ring.acquire_read(Duration::from_millis(10)).unwrap_err();
        assert_eq!(err, RingError::Overflow);

        // The oldest buffer (index 0, dropped by overflow) is gone;
        // remaining FIFO contents are buffers 1, 2, 3.
        let mut seen = Vec::new();
        for _ in 0..3 {
            let slot = ring.acquire_read(Duration::from_millis(10)).unwrap();
            seen.push(ring.read_slot(slot.index, slot.valid_len)[0]);
            ring.release_read(slot.index);
        }
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn underflow_zero_fills_and_sets_flag() {
        let ring = RingBuffer::new(2, 4);
        let mut out = [0xAAu8; 4];
        let (delivered, underflow, _flags) = ring.tx_pull(&mut out);
        assert_eq!(delivered, 0);
        assert!(underflow);
        assert_eq!(out, [0u8; 4]);
        assert!(ring.take_underflow());
        assert!(!ring.take_underflow());
    }

    #[test]
    fn count_never_exceeds_capacity_under_concurrent_access() {
        let ring = Arc::new(RingBuffer::new(8, 4));
        let producer = {
            let ring = Arc::clone(&ring);
            thread::spawn(move || {
                for i in 0..500u32 {
                    ring.rx_push(&i.to_le_bytes(), 0);
                }
            })
        };
        let consumer = {
            let ring = Arc::clone(&ring);
            thread::spawn(move || {
                let mut received = 0;
                while received < 400 {
                    if let Ok(slot) = ring.acquire_read(Duration::from_millis(50)) {
                        ring.release_read(slot.index);
                        received += 1;
                    }
                }
            })
        };
        producer.join().unwrap();
        consumer.join().unwrap();
        assert!(ring.count() <= 8);
    }
}
