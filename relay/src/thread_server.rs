// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! The thread-per-connection core: the simpler of the two server modes. Shares the registry and
//! the exclude-the-sender fan-out policy with the event-driven core, but has no ring and no
//! multicast mirror — fan-out happens directly on the reader thread of the originating
//! connection.

use std::io::Read;
use std::net::{Ipv4Addr, TcpListener, TcpStream};
use std::os::fd::AsRawFd;
use std::sync::Arc;

use log::{info, warn};

use crate::config::{BUFFER_SIZE, MAX_CLIENTS};
use crate::error::SetupError;
use crate::log_new_connection;
use crate::registry::{ClientEntry, ClientRegistry};

fn best_effort_send(fd: std::os::fd::RawFd, data: &[u8]) {
    unsafe {
        libc::send(
            fd,
            data.as_ptr() as *const libc::c_void,
            data.len(),
            libc::MSG_NOSIGNAL,
        );
    }
}

/// Runs the thread-per-connection core for the process lifetime. Only returns on a fatal setup
/// error.
pub fn run(port: u16) -> Result<(), SetupError> {
    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).map_err(SetupError::Bind)?;
    info!("Listening on port {port}");

    let registry = Arc::new(ClientRegistry::new());
    let mut next_id: u64 = 1;

    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                warn!("accept failed: {e}");
                continue;
            }
        };

        if registry.len() >= MAX_CLIENTS {
            warn!("Max clients reached. Rejecting connection.");
            drop(stream);
            continue;
        }

        let addr = match stream.peer_addr() {
            Ok(addr) => addr,
            Err(e) => {
                warn!("failed to read peer address: {e}");
                continue;
            }
        };

        let id = next_id;
        next_id += 1;

        let fd = stream.as_raw_fd();
        registry.insert(id, ClientEntry { addr, fd });
        log_new_connection(addr);

        let registry = Arc::clone(&registry);
        std::thread::spawn(move || handle_connection(id, stream, registry));
    }

    Ok(())
}

fn handle_connection(id: u64, mut stream: TcpStream, registry: Arc<ClientRegistry>) {
    let mut buf = [0u8; BUFFER_SIZE];

    loop {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                registry.for_each_except(id, |_handle, entry| {
                    best_effort_send(entry.fd, &buf[..n]);
                });
            }
        }
    }

    registry.remove(id);
    info!("Client disconnected: {id}");
    // `stream` drops here, closing the underlying fd, after removal from the registry so no
    // fan-out from another reader thread can still be in flight against this fd.
}
