// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

use clap::Parser;
use log::error;

use relay::config::TCP_PORT;
use relay::Mode;

/// Broadcast chat relay: fans client bytes out to every other connected client and mirrors them
/// on a multicast group.
#[derive(Parser)]
struct Cli {
    /// Which server core to run.
    mode: Mode,

    /// TCP port to listen on.
    #[arg(long, default_value_t = TCP_PORT)]
    port: u16,
}

fn main() {
    env_logger::init();

    let args = Cli::parse();

    if let Err(e) = relay::run(args.mode, args.port) {
        error!("fatal error during startup: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// S6: missing mode argument is rejected by clap before `relay::run` is ever called.
    #[test]
    fn missing_mode_argument_is_rejected() {
        assert!(Cli::try_parse_from(["relay-server"]).is_err());
    }

    /// S6: an unrecognized mode tag is rejected the same way.
    #[test]
    fn unrecognized_mode_argument_is_rejected() {
        assert!(Cli::try_parse_from(["relay-server", "bogus"]).is_err());
    }

    #[test]
    fn recognized_modes_parse() {
        assert!(Cli::try_parse_from(["relay-server", "epoll"]).is_ok());
        assert!(Cli::try_parse_from(["relay-server", "thread"]).is_ok());
    }
}
