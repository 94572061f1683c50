// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Process-wide constants. None of these are configurable via flag, file, or environment
//! variable; the launcher's only configurable surface is the mode argument (see `relay-server`).

/// TCP port the relay listens on, all interfaces.
pub const TCP_PORT: u16 = 8080;

/// Size of the stack buffer used for one ingress read.
pub const BUFFER_SIZE: usize = 1024;

/// Maximum readiness events drained from the poller per wait.
pub const MAX_EVENTS: usize = 128;

/// Multicast destination group.
pub const MCAST_GROUP: [u8; 4] = [239, 0, 0, 1];

/// Multicast destination port.
pub const MCAST_PORT: u16 = 8081;

/// TTL applied to outgoing multicast datagrams.
pub const MCAST_TTL: u32 = 4;

/// Maximum simultaneously registered clients in the thread-per-connection core.
pub const MAX_CLIENTS: usize = 1024;

/// Pause taken by the broadcaster when the ring is observed empty.
pub const BROADCASTER_IDLE_PAUSE: std::time::Duration = std::time::Duration::from_micros(10);
