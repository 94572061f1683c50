// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! A bounded single-producer/single-consumer ring of [`Envelope`] values.
//!
//! Exactly one thread may call [`Ring::try_push`] and exactly one thread may call
//! [`Ring::try_pop`]; mixing producers or consumers breaks the lock-free invariants documented on
//! each method.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;

/// Maximum size of a single envelope's payload.
pub const PAYLOAD_CAPACITY: usize = 1024;

/// Number of envelope slots held by a [`Ring`] created with [`Ring::new`].
pub const RING_CAPACITY: usize = 2048;

/// Opaque handle identifying an open connection, minted by the event loop.
///
/// Distinct from the underlying OS file descriptor: fds are reused by the kernel as soon as a
/// connection is closed, but a `ConnId` is never reused while any stale reference (e.g. an
/// in-flight envelope) to the old connection might still exist.
pub type ConnId = u64;

/// A value-copied record carrying one client's ingress bytes through the ring.
#[derive(Clone, Copy)]
pub struct Envelope {
    /// The connection that produced this envelope; excluded from fan-out.
    pub originator: ConnId,
    len: usize,
    payload: [u8; PAYLOAD_CAPACITY],
}

impl Envelope {
    /// Builds an envelope from `originator` and `data`.
    ///
    /// # Panics
    ///
    /// Panics if `data` is longer than [`PAYLOAD_CAPACITY`]; callers read at most `BUFFER_SIZE`
    /// bytes per ingress chunk, which is chosen to fit.
    pub fn new(originator: ConnId, data: &[u8]) -> Self {
        assert!(data.len() <= PAYLOAD_CAPACITY, "payload exceeds envelope capacity");
        let mut payload = [0u8; PAYLOAD_CAPACITY];
        payload[..data.len()].copy_from_slice(data);
        Self {
            originator,
            len: data.len(),
            payload,
        }
    }

    /// The payload bytes actually read, i.e. `payload[..len]`.
    pub fn as_bytes(&self) -> &[u8] {
        &self.payload[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for Envelope {
    fn default() -> Self {
        Self {
            originator: 0,
            len: 0,
            payload: [0u8; PAYLOAD_CAPACITY],
        }
    }
}

/// A single ring slot. `Sync` is safe because the ring's push/pop protocol guarantees that a
/// given slot is only ever touched by the producer (while publishing) or the consumer (after the
/// producer's release store is observed), never both at once.
struct Slot(UnsafeCell<Envelope>);

unsafe impl Sync for Slot {}

/// Bounded SPSC ring of [`Envelope`]s.
///
/// `head` is owned by the consumer, `tail` by the producer; each is padded to its own cache line
/// so that producer and consumer progress without contending on false-shared cache lines.
pub struct Ring {
    buffer: Box<[Slot]>,
    capacity: usize,
    head: CachePadded<AtomicUsize>,
    tail: CachePadded<AtomicUsize>,
}

unsafe impl Send for Ring {}
unsafe impl Sync for Ring {}

impl Ring {
    /// A ring with the default [`RING_CAPACITY`].
    pub fn new() -> Self {
        Self::with_capacity(RING_CAPACITY)
    }

    /// A ring holding up to `capacity - 1` envelopes at once (one slot is always kept empty to
    /// distinguish full from empty without a separate counter).
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity >= 2, "ring capacity must allow at least one occupied slot");
        let buffer = (0..capacity)
            .map(|_| Slot(UnsafeCell::new(Envelope::default())))
            .collect();

        Self {
            buffer,
            capacity,
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    /// Attempts to push `envelope`. Returns `false` without blocking if the ring is full.
    ///
    /// Only the single producer thread may call this.
    pub fn try_push(&self, envelope: Envelope) -> bool {
        let tail = self.tail.load(Ordering::Relaxed);
        let next_tail = (tail + 1) % self.capacity;

        if next_tail == self.head.load(Ordering::Acquire) {
            return false;
        }

        // SAFETY: this slot is not touched by the consumer until `tail` advances past it with a
        // release store, which happens below, after this write.
        unsafe {
            *self.buffer[tail].0.get() = envelope;
        }

        self.tail.store(next_tail, Ordering::Release);
        true
    }

    /// Spins until `envelope` is accepted.
    ///
    /// This is the event loop's backpressure mechanism: a full ring means the broadcaster has
    /// fallen behind, and the producer intentionally stalls rather than buffering unboundedly.
    pub fn spin_push(&self, envelope: Envelope) {
        while !self.try_push(envelope) {
            std::hint::spin_loop();
        }
    }

    /// Attempts to pop the oldest envelope. Returns `None` without blocking if the ring is empty.
    ///
    /// Only the single consumer thread may call this.
    pub fn try_pop(&self) -> Option<Envelope> {
        let head = self.head.load(Ordering::Relaxed);

        if head == self.tail.load(Ordering::Acquire) {
            return None;
        }

        // SAFETY: the producer's release store of `tail` (observed above via acquire) happens
        // after its write to this slot, so the write is visible here.
        let envelope = unsafe { *self.buffer[head].0.get() };

        self.head.store((head + 1) % self.capacity, Ordering::Release);
        Some(envelope)
    }
}

impl Default for Ring {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ring_pops_none() {
        let ring = Ring::with_capacity(8);
        assert!(ring.try_pop().is_none());
    }

    #[test]
    fn push_pop_preserves_order() {
        let ring = Ring::with_capacity(8);
        for i in 0..5u64 {
            assert!(ring.try_push(Envelope::new(i, b"x")));
        }
        for i in 0..5u64 {
            let e = ring.try_pop().unwrap();
            assert_eq!(e.originator, i);
        }
        assert!(ring.try_pop().is_none());
    }

    #[test]
    fn full_empty_duality() {
        // capacity N holds at most N - 1 envelopes at once.
        let capacity = 8;
        let ring = Ring::with_capacity(capacity);

        let mut pushed = 0;
        while ring.try_push(Envelope::new(pushed as u64, b"a")) {
            pushed += 1;
        }
        assert_eq!(pushed, capacity - 1);

        // Ring is full now; the next push must fail.
        assert!(!ring.try_push(Envelope::new(99, b"a")));

        // Draining one slot makes room for exactly one more push.
        assert!(ring.try_pop().is_some());
        assert!(ring.try_push(Envelope::new(100, b"a")));
        assert!(!ring.try_push(Envelope::new(101, b"a")));
    }

    #[test]
    fn envelope_round_trips_payload() {
        let data = b"hello world";
        let e = Envelope::new(7, data);
        assert_eq!(e.originator, 7);
        assert_eq!(e.as_bytes(), data);
        assert_eq!(e.len(), data.len());
    }

    #[test]
    #[should_panic]
    fn envelope_rejects_oversized_payload() {
        let data = vec![0u8; PAYLOAD_CAPACITY + 1];
        Envelope::new(0, &data);
    }

    #[test]
    fn concurrent_spsc_delivers_every_envelope_in_order() {
        use std::sync::Arc;
        use std::thread;

        let ring = Arc::new(Ring::with_capacity(64));
        let total = 5000u64;

        let producer = {
            let ring = Arc::clone(&ring);
            thread::spawn(move || {
                for i in 0..total {
                    let payload = i.to_le_bytes();
                    ring.spin_push(Envelope::new(i, &payload));
                }
            })
        };

        let consumer = {
            let ring = Arc::clone(&ring);
            thread::spawn(move || {
                let mut received = Vec::with_capacity(total as usize);
                while (received.len() as u64) < total {
                    if let Some(e) = ring.try_pop() {
                        received.push(e.originator);
                    }
                }
                received
            })
        };

        producer.join().unwrap();
        let received = consumer.join().unwrap();
        let expected: Vec<u64> = (0..total).collect();
        assert_eq!(received, expected);
    }
}
