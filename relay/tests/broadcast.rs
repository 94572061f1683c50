// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! End-to-end scenarios against the event-driven core over real loopback sockets.

use std::io::{Read, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpStream, UdpSocket};
use std::thread;
use std::time::{Duration, Instant};

fn connect_with_retry(port: u16) -> TcpStream {
    let addr: SocketAddr = (Ipv4Addr::LOCALHOST, port).into();
    let deadline = Instant::now() + Duration::from_secs(5);

    loop {
        if let Ok(stream) = TcpStream::connect(addr) {
            return stream;
        }
        if Instant::now() > deadline {
            panic!("server on port {port} never came up");
        }
        thread::sleep(Duration::from_millis(20));
    }
}

/// Reads whatever bytes are available within `timeout`, or panics if none arrive.
fn recv_within(stream: &mut TcpStream, timeout: Duration) -> Vec<u8> {
    stream.set_read_timeout(Some(timeout)).unwrap();
    let mut buf = [0u8; 4096];
    let n = stream
        .read(&mut buf)
        .expect("expected bytes within timeout, got none");
    buf[..n].to_vec()
}

/// Asserts that no bytes arrive within `timeout` (used to check sender exclusion).
fn assert_silent(stream: &mut TcpStream, timeout: Duration) {
    stream.set_read_timeout(Some(timeout)).unwrap();
    let mut buf = [0u8; 64];
    match stream.read(&mut buf) {
        Ok(0) => {}
        Ok(n) => panic!("expected silence, got {} bytes: {:?}", n, &buf[..n]),
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
        Err(e) => panic!("unexpected error waiting for silence: {e}"),
    }
}

fn spawn_event_driven_core(port: u16) {
    thread::spawn(move || {
        let _ = relay::event_loop::run(port);
    });
}

/// S1: two clients connect; one sends, the other receives, the sender hears nothing back.
#[test]
fn single_delivery_and_sender_exclusion() {
    let port = 18080;
    spawn_event_driven_core(port);

    let mut a = connect_with_retry(port);
    let mut b = connect_with_retry(port);

    a.write_all(b"hello").unwrap();

    let received = recv_within(&mut b, Duration::from_secs(2));
    assert_eq!(received, b"hello");

    assert_silent(&mut a, Duration::from_millis(200));
}

/// S2: three clients, two senders; the third sees both messages in ingress order, and each
/// sender sees only the other's message.
#[test]
fn ingress_order_is_preserved_per_peer() {
    let port = 18081;
    spawn_event_driven_core(port);

    let mut a = connect_with_retry(port);
    let mut b = connect_with_retry(port);
    let mut c = connect_with_retry(port);

    a.write_all(b"x").unwrap();
    // Give the relay a moment to fully process `x` before `y` is sent, so C's ingress order is
    // deterministic.
    thread::sleep(Duration::from_millis(50));
    b.write_all(b"y").unwrap();

    let mut seen = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(2);
    while seen.len() < 2 && Instant::now() < deadline {
        seen.push(recv_within(&mut c, Duration::from_secs(2)));
    }

    assert_eq!(seen, vec![b"x".to_vec(), b"y".to_vec()]);

    assert_eq!(recv_within(&mut a, Duration::from_secs(2)), b"y");
    assert_eq!(recv_within(&mut b, Duration::from_secs(2)), b"x");
}

/// S3: a client that connects, sends, then disconnects leaves the registry back at its
/// pre-accept size once the event loop notices the close.
#[test]
fn disconnect_is_torn_down() {
    let port = 18083;
    spawn_event_driven_core(port);

    let mut a = connect_with_retry(port);
    let mut b = connect_with_retry(port);

    a.write_all(b"ping").unwrap();
    assert_eq!(recv_within(&mut b, Duration::from_secs(2)), b"ping");

    drop(a);

    // No registry handle is exposed by the public API; observe teardown indirectly: after A
    // disconnects, a fresh client C should only ever see the bytes it causes B (not a phantom A)
    // to emit, and B should still be reachable.
    let mut c = connect_with_retry(port);
    c.write_all(b"after-disconnect").unwrap();
    assert_eq!(
        recv_within(&mut b, Duration::from_secs(2)),
        b"after-disconnect"
    );
}

/// S4: a multicast listener joined before a client sends receives one datagram with the same
/// payload.
#[test]
fn multicast_mirrors_envelopes() {
    let port = 18082;
    spawn_event_driven_core(port);

    let listener = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, relay::config::MCAST_PORT))
        .expect("bind multicast listener");
    listener
        .join_multicast_v4(
            &Ipv4Addr::from(relay::config::MCAST_GROUP),
            &Ipv4Addr::UNSPECIFIED,
        )
        .expect("join multicast group");
    listener
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();

    let mut a = connect_with_retry(port);
    a.write_all(b"data").unwrap();

    let mut buf = [0u8; 4096];
    let (n, _src) = listener.recv_from(&mut buf).expect("expected one datagram");
    assert_eq!(&buf[..n], b"data");
}
