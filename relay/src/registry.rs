// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::os::fd::RawFd;
use std::sync::Mutex;

use broadcast_ring::ConnId;

/// What the registry keeps per connection: the peer's address, retained only for logging, and
/// the raw fd the broadcaster writes through directly.
///
/// The registry does not own the fd. Ownership of the underlying socket lives with whichever
/// core accepted the connection (the event loop's `mio::net::TcpStream`, or the
/// thread-per-connection core's `std::net::TcpStream`); the registry only ever closes a
/// connection through that owner, and only while holding its own mutex, so a concurrent send on
/// a half-closed fd can't happen.
#[derive(Clone, Copy)]
pub struct ClientEntry {
    pub addr: SocketAddr,
    pub fd: RawFd,
}

/// Mapping from connection handle to [`ClientEntry`], serialized by one mutex.
///
/// An entry exists iff the connection is registered with the event loop (or reader thread) and
/// the peer socket is open.
#[derive(Default)]
pub struct ClientRegistry {
    inner: Mutex<HashMap<ConnId, ClientEntry>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent insert/replace. Called only by the accepting core.
    pub fn insert(&self, handle: ConnId, entry: ClientEntry) {
        self.inner.lock().unwrap().insert(handle, entry);
    }

    /// No-op if `handle` is absent.
    pub fn remove(&self, handle: ConnId) {
        self.inner.lock().unwrap().remove(&handle);
    }

    /// Invokes `f` once for every registered entry other than `originator`, while holding the
    /// mutex for the whole call. This is the "consistent peer set per envelope" guarantee: no
    /// insert or remove can interleave with one envelope's fan-out.
    pub fn for_each_except(&self, originator: ConnId, mut f: impl FnMut(ConnId, ClientEntry)) {
        let guard = self.inner.lock().unwrap();
        for (&handle, &entry) in guard.iter() {
            if handle != originator {
                f(handle, entry);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, handle: ConnId) -> bool {
        self.inner.lock().unwrap().contains_key(&handle)
    }
}
