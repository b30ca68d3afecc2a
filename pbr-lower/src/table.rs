// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The ownership layer over the kernel routing table. Every mutation this
//! system makes carries [`OWNER_PROTOCOL`], and only routes carrying it
//! are visible to the managed operations here, so install, update and
//! withdrawal stay idempotent against whatever else programs the FIB.

use crate::platform::{Fib, KernelRoute};
use crate::Error;
use ipnetwork::IpNetwork;
use slog::{debug, error, info, Logger};
use std::net::IpAddr;

/// Routing protocol identifier marking routes as ours. 201 sits in the
/// user-defined range of the standard protocol registry
/// (/etc/iproute2/rt_protos).
pub const OWNER_PROTOCOL: u8 = 201;

pub struct RouteTable<F> {
    fib: F,
    log: Logger,
}

impl<F: Fib> RouteTable<F> {
    pub fn new(fib: F, log: Logger) -> Self {
        Self { fib, log }
    }

    /// Install or update the managed route to `dst` via `gw`, optionally
    /// bound to source `src`. A managed route already carrying the same
    /// parameters is left alone; differing parameters are replaced; a
    /// racing add that reports the route exists falls back to replace.
    pub async fn configure(
        &self,
        dst: IpNetwork,
        gw: IpAddr,
        src: Option<IpAddr>,
    ) -> Result<(), Error> {
        if dst.is_ipv4() != gw.is_ipv4() {
            return Err(Error::BadArgument(format!(
                "family mismatch: {dst} via {gw}"
            )));
        }
        if let Some(src) = src {
            if src.is_ipv4() != dst.is_ipv4() {
                return Err(Error::BadArgument(format!(
                    "family mismatch: {dst} src {src}"
                )));
            }
        }
        let route = KernelRoute {
            dst,
            gw,
            src,
            protocol: OWNER_PROTOCOL,
        };

        for existing in self.fib.routes_for(dst).await? {
            if existing.protocol != OWNER_PROTOCOL {
                continue;
            }
            if existing.gw == gw && existing.src == src {
                debug!(self.log, "route to {dst} via {gw} already present");
                return Ok(());
            }
            info!(self.log, "updating route to {dst} via {gw}");
            return self.fib.route_replace(&route).await;
        }

        match self.fib.route_add(&route).await {
            Ok(()) => {
                info!(self.log, "added route to {dst} via {gw}");
                Ok(())
            }
            // The kernel can know routes our lookup did not surface;
            // treat them the same as a parameter change.
            Err(Error::Exists) => {
                debug!(self.log, "route to {dst} exists, replacing");
                self.fib.route_replace(&route).await
            }
            Err(e) => Err(e),
        }
    }

    /// Withdraw the managed route to `dst`. Absence is not an error.
    pub async fn remove(&self, dst: IpNetwork) -> Result<(), Error> {
        match self.fib.route_del(dst, OWNER_PROTOCOL).await {
            Ok(()) => {
                info!(self.log, "removed route to {dst}");
                Ok(())
            }
            Err(Error::DoesNotExist) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Whether a managed route to `dst` exists, matching `src` when one
    /// is given.
    pub async fn exists(&self, dst: IpNetwork, src: Option<IpAddr>) -> Result<bool, Error> {
        Ok(self.fib.routes_for(dst).await?.iter().any(|r| {
            r.protocol == OWNER_PROTOCOL && (src.is_none() || r.src == src)
        }))
    }

    /// Every managed route, both address families.
    pub async fn list_managed(&self) -> Result<Vec<KernelRoute>, Error> {
        Ok(self
            .fib
            .route_dump()
            .await?
            .into_iter()
            .filter(|r| r.protocol == OWNER_PROTOCOL)
            .collect())
    }

    /// Withdraw every managed route, continuing past individual failures.
    /// Returns the number actually removed.
    pub async fn remove_all_managed(&self) -> Result<usize, Error> {
        let mut removed = 0;
        for route in self.list_managed().await? {
            if let Err(e) = self.fib.route_del(route.dst, route.protocol).await {
                error!(self.log, "failed to remove route to {}: {e}", route.dst);
                continue;
            }
            debug!(self.log, "removed route to {}", route.dst);
            removed += 1;
        }
        if removed > 0 {
            info!(self.log, "removed {removed} managed routes");
        }
        Ok(removed)
    }
}
