// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Traits decoupling the reconciler from the live host: raw routing-table
//! primitives and outbound source-address discovery. This keeps the
//! convergence logic testable without a netlink socket or real
//! interfaces.

use crate::Error;
use ipnetwork::IpNetwork;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// One kernel forwarding entry as this system sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelRoute {
    pub dst: IpNetwork,
    pub gw: IpAddr,
    pub src: Option<IpAddr>,
    /// Routing protocol identifier stored on the entry, naming its
    /// installer.
    pub protocol: u8,
}

/// Raw routing-table primitives. The ownership semantics live a level up
/// in [`crate::table::RouteTable`]; implementations only move routes in
/// and out of the kernel.
#[allow(async_fn_in_trait)]
pub trait Fib {
    /// Every route to exactly this destination prefix, any owner.
    async fn routes_for(&self, dst: IpNetwork) -> Result<Vec<KernelRoute>, Error>;

    /// Every route in the table, any owner, both address families.
    async fn route_dump(&self) -> Result<Vec<KernelRoute>, Error>;

    /// Add a route. Fails with [`Error::Exists`] when the kernel already
    /// has a route to this destination.
    async fn route_add(&self, route: &KernelRoute) -> Result<(), Error>;

    /// Add or overwrite a route.
    async fn route_replace(&self, route: &KernelRoute) -> Result<(), Error>;

    /// Delete the route to `dst` owned by `protocol`. Fails with
    /// [`Error::DoesNotExist`] when nothing matched.
    async fn route_del(&self, dst: IpNetwork, protocol: u8) -> Result<(), Error>;
}

// Convergence code takes platform handles by reference; let shared
// borrows of an implementation be implementations themselves.
impl<T: Fib> Fib for &T {
    async fn routes_for(&self, dst: IpNetwork) -> Result<Vec<KernelRoute>, Error> {
        (**self).routes_for(dst).await
    }

    async fn route_dump(&self) -> Result<Vec<KernelRoute>, Error> {
        (**self).route_dump().await
    }

    async fn route_add(&self, route: &KernelRoute) -> Result<(), Error> {
        (**self).route_add(route).await
    }

    async fn route_replace(&self, route: &KernelRoute) -> Result<(), Error> {
        (**self).route_replace(route).await
    }

    async fn route_del(&self, dst: IpNetwork, protocol: u8) -> Result<(), Error> {
        (**self).route_del(dst, protocol).await
    }
}

/// Outbound source-address discovery.
#[allow(async_fn_in_trait)]
pub trait HostAddrs {
    /// The host's preferred outbound IPv4 address.
    async fn outbound_v4(&self) -> Result<Ipv4Addr, Error>;

    /// The site-scoped IPv6 source address matching `selector`.
    async fn outbound_v6(&self, selector: &V6SourceSelector) -> Result<Ipv6Addr, Error>;
}

/// How to pick the IPv6 source address: the first address on an interface
/// whose name starts with `ifname_prefix`, whose textual form starts with
/// `addr_prefix` and ends with `addr_suffix`. This is site policy, so it
/// is a configuration input rather than a constant.
#[derive(Debug, Clone)]
pub struct V6SourceSelector {
    pub ifname_prefix: String,
    pub addr_prefix: String,
    pub addr_suffix: String,
}

impl Default for V6SourceSelector {
    fn default() -> Self {
        Self {
            ifname_prefix: "e".into(),
            addr_prefix: "fdac:c9:".into(),
            addr_suffix: "::2".into(),
        }
    }
}
