// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Trivial connecting client for the broadcast chat relay: reads lines from stdin and sends each
//! one (without its trailing newline) as one write, while a background thread prints everything
//! the relay sends back.

use std::io::{self, BufRead, Read, Write};
use std::net::TcpStream;

use clap::Parser;
use log::warn;

#[derive(Parser)]
struct Cli {
    /// host:port of the relay to connect to.
    #[arg(long, default_value = "127.0.0.1:8080")]
    addr: String,
}

fn main() -> io::Result<()> {
    env_logger::init();

    let args = Cli::parse();
    let stream = TcpStream::connect(&args.addr)?;

    let reader_stream = stream.try_clone()?;
    std::thread::spawn(move || receive_loop(reader_stream));

    send_loop(stream)
}

fn receive_loop(mut stream: TcpStream) {
    let mut buf = [0u8; 1024];

    loop {
        match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                println!("Received: {}", String::from_utf8_lossy(&buf[..n]));
            }
            Err(e) => {
                warn!("read failed: {e}");
                break;
            }
        }
    }
}

fn send_loop(mut stream: TcpStream) -> io::Result<()> {
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        stream.write_all(line.as_bytes())?;
    }
    Ok(())
}
