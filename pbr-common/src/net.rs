// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};

/// Destination used to tease the preferred outbound address out of the
/// kernel. The socket is never written to, so nothing is sent there.
const PROBE_ADDR: (&str, u16) = ("8.8.8.8", 80);

/// Discover the host's preferred outbound IPv4 address by opening an
/// unconnected UDP socket toward a well-known external address and reading
/// back the local endpoint the kernel selected for it.
pub fn preferred_v4_source() -> io::Result<Ipv4Addr> {
    let sock = UdpSocket::bind(("0.0.0.0", 0))?;
    sock.connect(PROBE_ADDR)?;
    match sock.local_addr()?.ip() {
        IpAddr::V4(addr) => Ok(addr),
        IpAddr::V6(_) => Err(io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            "v4 probe socket bound to a v6 address",
        )),
    }
}
