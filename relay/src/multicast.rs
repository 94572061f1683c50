// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};

use log::warn;

use crate::config::{MCAST_GROUP, MCAST_PORT, MCAST_TTL};
use crate::error::SetupError;

/// The broadcaster's datagram egress: one socket, immutable destination, fixed TTL, for the
/// process lifetime.
pub struct MulticastSink {
    socket: UdpSocket,
    target: SocketAddr,
}

impl MulticastSink {
    /// Binds an ephemeral UDP socket and configures it to send to the configured multicast group
    /// with the configured TTL.
    pub fn new() -> Result<Self, SetupError> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).map_err(SetupError::Socket)?;
        socket
            .set_multicast_ttl_v4(MCAST_TTL)
            .map_err(SetupError::Socket)?;

        let group = Ipv4Addr::from(MCAST_GROUP);
        let target = SocketAddr::V4(SocketAddrV4::new(group, MCAST_PORT));

        Ok(Self { socket, target })
    }

    /// Sends `payload` as one datagram to the multicast destination. Errors are logged and
    /// otherwise ignored; multicast delivery is best-effort only.
    pub fn send(&self, payload: &[u8]) {
        if let Err(e) = self.socket.send_to(payload, self.target) {
            warn!("multicast send failed: {e}");
        }
    }
}
