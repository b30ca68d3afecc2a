// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Netlink-backed implementations of the platform traits, for Linux
//! hosts. One rtnetlink handle serves both the routing-table primitives
//! and the interface scan behind IPv6 source selection.

use crate::platform::{Fib, HostAddrs, KernelRoute, V6SourceSelector};
use crate::Error;
use futures::TryStreamExt;
use ipnetwork::IpNetwork;
use netlink_packet_route::address::AddressAttribute;
use netlink_packet_route::link::LinkAttribute;
use netlink_packet_route::route::{RouteAddress, RouteAttribute, RouteMessage};
use netlink_packet_route::AddressFamily;
use rtnetlink::{Handle, RouteMessageBuilder};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

#[derive(Clone)]
pub struct NetlinkFib {
    handle: Handle,
}

impl NetlinkFib {
    /// Open a netlink socket and spawn its connection task onto the
    /// current runtime.
    pub fn new() -> Result<Self, Error> {
        let (connection, handle, _) = rtnetlink::new_connection()?;
        tokio::spawn(connection);
        Ok(Self { handle })
    }

    async fn dump(&self, v4: bool) -> Result<Vec<KernelRoute>, Error> {
        let mut routes = Vec::new();
        let mut stream = self.handle.route().get(family_message(v4)).execute();
        while let Some(msg) = stream.try_next().await.map_err(translate)? {
            if let Some(route) = decode_route(&msg) {
                routes.push(route);
            }
        }
        Ok(routes)
    }
}

impl Fib for NetlinkFib {
    async fn routes_for(&self, dst: IpNetwork) -> Result<Vec<KernelRoute>, Error> {
        Ok(self
            .dump(dst.is_ipv4())
            .await?
            .into_iter()
            .filter(|r| r.dst == dst)
            .collect())
    }

    async fn route_dump(&self) -> Result<Vec<KernelRoute>, Error> {
        let mut all = self.dump(true).await?;
        all.extend(self.dump(false).await?);
        Ok(all)
    }

    async fn route_add(&self, route: &KernelRoute) -> Result<(), Error> {
        let msg = encode_route(route)?;
        self.handle
            .route()
            .add(msg)
            .execute()
            .await
            .map_err(translate)
    }

    async fn route_replace(&self, route: &KernelRoute) -> Result<(), Error> {
        let msg = encode_route(route)?;
        self.handle
            .route()
            .add(msg)
            .replace()
            .execute()
            .await
            .map_err(translate)
    }

    async fn route_del(&self, dst: IpNetwork, protocol: u8) -> Result<(), Error> {
        let mut found = false;
        let mut stream = self.handle.route().get(family_message(dst.is_ipv4())).execute();
        let mut victims = Vec::new();
        while let Some(msg) = stream.try_next().await.map_err(translate)? {
            if u8::from(msg.header.protocol) != protocol {
                continue;
            }
            if route_dst(&msg) != Some(dst) {
                continue;
            }
            victims.push(msg);
        }
        for msg in victims {
            self.handle
                .route()
                .del(msg)
                .execute()
                .await
                .map_err(translate)?;
            found = true;
        }
        if !found {
            return Err(Error::DoesNotExist);
        }
        Ok(())
    }
}

impl HostAddrs for NetlinkFib {
    async fn outbound_v4(&self) -> Result<Ipv4Addr, Error> {
        pbr_common::net::preferred_v4_source().map_err(|e| Error::NoSourceAddr(e.to_string()))
    }

    async fn outbound_v6(&self, selector: &V6SourceSelector) -> Result<Ipv6Addr, Error> {
        // Candidate interfaces, by index.
        let mut candidates: HashMap<u32, String> = HashMap::new();
        let mut links = self.handle.link().get().execute();
        while let Some(msg) = links.try_next().await.map_err(translate)? {
            for attr in &msg.attributes {
                if let LinkAttribute::IfName(name) = attr {
                    if name.starts_with(&selector.ifname_prefix) {
                        candidates.insert(msg.header.index, name.clone());
                    }
                }
            }
        }

        let mut addrs = self.handle.address().get().execute();
        while let Some(msg) = addrs.try_next().await.map_err(translate)? {
            if !candidates.contains_key(&msg.header.index) {
                continue;
            }
            for attr in &msg.attributes {
                let AddressAttribute::Address(IpAddr::V6(addr)) = attr else {
                    continue;
                };
                let text = addr.to_string();
                if text.starts_with(&selector.addr_prefix)
                    && text.ends_with(&selector.addr_suffix)
                {
                    return Ok(*addr);
                }
            }
        }

        Err(Error::NoSourceAddr(format!(
            "no {}*{} address on {}* interfaces",
            selector.addr_prefix, selector.addr_suffix, selector.ifname_prefix
        )))
    }
}

/// An empty per-family route message, used to scope dump requests.
fn family_message(v4: bool) -> RouteMessage {
    if v4 {
        RouteMessageBuilder::<Ipv4Addr>::new().build()
    } else {
        RouteMessageBuilder::<Ipv6Addr>::new().build()
    }
}

fn encode_route(route: &KernelRoute) -> Result<RouteMessage, Error> {
    let mut msg = match (route.dst, route.gw) {
        (IpNetwork::V4(dst), IpAddr::V4(gw)) => {
            let mut msg = RouteMessageBuilder::<Ipv4Addr>::new()
                .destination_prefix(dst.ip(), dst.prefix())
                .gateway(gw)
                .build();
            if let Some(IpAddr::V4(src)) = route.src {
                msg.attributes
                    .push(RouteAttribute::PrefSource(RouteAddress::Inet(src)));
            }
            msg
        }
        (IpNetwork::V6(dst), IpAddr::V6(gw)) => {
            let mut msg = RouteMessageBuilder::<Ipv6Addr>::new()
                .destination_prefix(dst.ip(), dst.prefix())
                .gateway(gw)
                .build();
            if let Some(IpAddr::V6(src)) = route.src {
                msg.attributes
                    .push(RouteAttribute::PrefSource(RouteAddress::Inet6(src)));
            }
            msg
        }
        _ => {
            return Err(Error::BadArgument(format!(
                "family mismatch: {} via {}",
                route.dst, route.gw
            )));
        }
    };
    msg.header.protocol = route.protocol.into();
    Ok(msg)
}

fn decode_route(msg: &RouteMessage) -> Option<KernelRoute> {
    let mut dst_addr = None;
    let mut gw = None;
    let mut src = None;
    for attr in &msg.attributes {
        match attr {
            RouteAttribute::Destination(a) => dst_addr = route_addr(a),
            RouteAttribute::Gateway(a) => gw = route_addr(a),
            RouteAttribute::PrefSource(a) => src = route_addr(a),
            _ => {}
        }
    }
    // Default routes carry no destination attribute.
    let dst_addr = dst_addr.or(match msg.header.address_family {
        AddressFamily::Inet => Some(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
        AddressFamily::Inet6 => Some(IpAddr::V6(Ipv6Addr::UNSPECIFIED)),
        _ => None,
    })?;
    let dst = IpNetwork::new(dst_addr, msg.header.destination_prefix_length).ok()?;

    // Entries without a gateway (directly connected, blackholes) are not
    // candidates for anything this system does.
    Some(KernelRoute {
        dst,
        gw: gw?,
        src,
        protocol: msg.header.protocol.into(),
    })
}

fn route_dst(msg: &RouteMessage) -> Option<IpNetwork> {
    let addr = msg.attributes.iter().find_map(|attr| match attr {
        RouteAttribute::Destination(a) => route_addr(a),
        _ => None,
    })?;
    IpNetwork::new(addr, msg.header.destination_prefix_length).ok()
}

fn route_addr(addr: &RouteAddress) -> Option<IpAddr> {
    match addr {
        RouteAddress::Inet(a) => Some(IpAddr::V4(*a)),
        RouteAddress::Inet6(a) => Some(IpAddr::V6(*a)),
        _ => None,
    }
}

fn translate(e: rtnetlink::Error) -> Error {
    if let rtnetlink::Error::NetlinkError(ref msg) = e {
        match msg.raw_code() {
            c if c == -libc::EEXIST => return Error::Exists,
            c if c == -libc::ESRCH => return Error::DoesNotExist,
            _ => {}
        }
    }
    Error::SystemError(e.to_string())
}
