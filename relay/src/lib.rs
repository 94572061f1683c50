// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Library crate backing the `relay-server` binary: two interchangeable broadcast chat server
//! cores, selected by the launcher.

pub mod broadcaster;
pub mod config;
pub mod error;
pub mod event_loop;
pub mod multicast;
pub mod registry;
pub mod thread_server;

use std::net::SocketAddr;

use log::info;

/// Logs a new connection in the format both cores agree on: the peer's address only, matching
/// the source's `inet_ntoa`-style log line.
pub(crate) fn log_new_connection(addr: SocketAddr) {
    info!("New connection: {}", addr.ip());
}

/// Which server core the launcher should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Mode {
    /// The event-driven core (readiness poller + ring + broadcaster thread + multicast).
    Epoll,
    /// The thread-per-connection core (one reader thread per client, no ring, no multicast).
    Thread,
}

/// Runs the server core selected by `mode` on `port`. Only returns on a fatal setup error.
pub fn run(mode: Mode, port: u16) -> Result<(), error::SetupError> {
    match mode {
        Mode::Epoll => event_loop::run(port),
        Mode::Thread => thread_server::run(port),
    }
}
