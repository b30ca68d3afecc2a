// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client-side view of the BIRD routing daemon: a control-socket client,
//! a parser for the tagged response stream of `show route all`, and a
//! reader for the one configuration value this system needs from the
//! daemon's config file (the local AS number).

use ipnetwork::IpNetwork;
use slog::Logger;
use std::fmt;
use std::net::IpAddr;

pub use error::Error;

pub mod config;
mod error;
pub mod parse;
pub mod socket;

/// Well-known control socket paths, one per address family.
pub const BIRD4_SOCKET: &str = "/run/bird/bird.ctl";
pub const BIRD6_SOCKET: &str = "/run/bird/bird6.ctl";

/// The one command this system issues.
const SHOW_ROUTE_ALL: &str = "show route all\n";

/// Which of the two daemon instances a session talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::Ipv4 => write!(f, "v4"),
            AddressFamily::Ipv6 => write!(f, "v6"),
        }
    }
}

/// A destination prefix together with every BGP path the daemon knows
/// toward it. The originating AS is scraped from the route header and is
/// zero when the header carried nothing recognizable.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub network: IpNetwork,
    pub origin_as: u32,
    pub paths: Vec<BgpPath>,
}

/// One candidate forwarding path for a route.
#[derive(Debug, Clone, PartialEq)]
pub struct BgpPath {
    /// First-hop AS. Equal to `as_path[0]` whenever the path is
    /// non-empty, zero otherwise.
    pub neighbor_as: u32,
    /// Full AS path, nearest neighbor first. May legitimately be empty
    /// for locally sourced prefixes.
    pub as_path: Vec<u32>,
    pub nexthop: IpAddr,
    /// Egress interface name from the route header.
    pub ifname: String,
    pub med: u32,
    pub local_pref: u32,
    /// Origin attribute as printed by the daemon ("IGP", "EGP",
    /// "Incomplete", ...). Kept verbatim.
    pub origin_type: String,
}

/// Fetch every route the daemon at `socket_path` knows about.
///
/// Opens a fresh control session, issues `show route all` and runs the
/// tagged response stream through the parser until the end-of-data
/// sentinel.
pub async fn routes(socket_path: &str, log: &Logger) -> Result<Vec<Route>, Error> {
    let mut sock = socket::ControlSocket::connect(socket_path, log.clone()).await?;
    sock.send_command(SHOW_ROUTE_ALL).await?;

    let mut parser = parse::Parser::new();
    let mut routes = Vec::new();
    while let Some(line) = sock.next_line().await? {
        if let Some(route) = parser.feed(&line)? {
            routes.push(route);
        }
    }
    if let Some(route) = parser.finish()? {
        routes.push(route);
    }
    Ok(routes)
}
