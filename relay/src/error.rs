// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

use std::fmt;

/// Errors that can arise while standing up a server core. Every variant here is fatal: the
/// caller is expected to log it and abort the process. Steady-state faults (a bad read, a failed
/// accept, a send to a dead peer) are not represented here; they are handled locally where they
/// occur, per the design's "only startup errors are fatal" principle.
#[derive(Debug)]
pub enum SetupError {
    /// Failed to create the listening or multicast socket.
    Socket(std::io::Error),

    /// Failed to bind the listening socket to its configured address.
    Bind(std::io::Error),

    /// Failed to put the listening socket into the listening state.
    Listen(std::io::Error),

    /// Failed to create the readiness poller.
    Poller(std::io::Error),
}

impl std::error::Error for SetupError {}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Socket(e) => write!(f, "socket creation failed: {e}"),
            Self::Bind(e) => write!(f, "bind failed: {e}"),
            Self::Listen(e) => write!(f, "listen failed: {e}"),
            Self::Poller(e) => write!(f, "failed to create readiness poller: {e}"),
        }
    }
}

impl From<std::io::Error> for SetupError {
    fn from(e: std::io::Error) -> Self {
        Self::Socket(e)
    }
}
