// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

use std::os::fd::RawFd;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use broadcast_ring::Ring;

use crate::config::BROADCASTER_IDLE_PAUSE;
use crate::multicast::MulticastSink;
use crate::registry::ClientRegistry;

/// Best-effort `send(2)` of `data` on `fd`, ignoring short writes and errors.
///
/// A persistent failure on this fd (closed peer, broken pipe) is not reported here; the next
/// read attempt on that connection by the owning core will observe the failure and tear the
/// connection down. `MSG_NOSIGNAL` keeps a send to an already-closed peer from raising `SIGPIPE`
/// in this process.
///
/// # Safety
///
/// `fd` must name an open, connected stream socket for the duration of this call. The registry
/// mutex is held by the caller for the whole fan-out, and the owning core only closes a
/// connection while holding that same mutex, so `fd` cannot be closed concurrently with this
/// call.
fn best_effort_send(fd: RawFd, data: &[u8]) {
    unsafe {
        libc::send(
            fd,
            data.as_ptr() as *const libc::c_void,
            data.len(),
            libc::MSG_NOSIGNAL,
        );
    }
}

/// Spawns the broadcaster as a detached background thread.
///
/// Pops envelopes from `ring` in a tight loop; for each one, fans it out to every registered
/// client except its originator while holding `registry`'s mutex, then mirrors it as one
/// multicast datagram. Sleeps briefly when the ring is empty rather than blocking on a condition
/// variable, trading idle CPU for minimum latency under load.
pub fn spawn(
    ring: Arc<Ring>,
    registry: Arc<ClientRegistry>,
    multicast: MulticastSink,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match ring.try_pop() {
            Some(envelope) => {
                let payload = envelope.as_bytes();

                registry.for_each_except(envelope.originator, |_handle, entry| {
                    best_effort_send(entry.fd, payload);
                });

                multicast.send(payload);
            }
            None => thread::sleep(BROADCASTER_IDLE_PAUSE),
        }
    })
}
