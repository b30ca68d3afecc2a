// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The lower half of the performance routing overlay. It joins the
//! routes BIRD knows about with oracle-derived path costs, picks the
//! cheapest path per prefix and converges the kernel forwarding table on
//! the winners. Every mutation rides under the owner protocol tag, so a
//! restarted process can withdraw its predecessor's state wholesale and
//! re-install from scratch.

use crate::platform::{Fib, HostAddrs, V6SourceSelector};
use crate::table::RouteTable;
use bird::AddressFamily;
use cost::MetricsSource;
use slog::{debug, error, info, warn, Logger};
use std::net::IpAddr;
use std::time::Duration;
use tokio::time::Instant;

pub use error::Error;
pub use table::OWNER_PROTOCOL;

mod error;
pub mod netlink;
pub mod platform;
pub mod table;

#[cfg(test)]
mod test;

/// Upper bound on one reconcile pass. Metrics queries still in flight at
/// the deadline abort and resolve through the unknown-cost policy.
pub const RECONCILE_TIMEOUT: Duration = Duration::from_secs(30);

/// Wall-clock delay between daemon reconcile passes.
pub const RECONCILE_INTERVAL: Duration = Duration::from_secs(120);

/// Everything a reconcile pass needs to know that is not a platform
/// handle.
#[derive(Debug, Clone)]
pub struct Config {
    /// The local AS number, or zero when none is configured. Zero never
    /// matches a first-hop AS, which disables the self-AS withdraw
    /// branch.
    pub local_as: u32,
    pub bird4_socket: String,
    pub bird6_socket: String,
    pub v6_source: V6SourceSelector,
}

/// Daemon loop. Withdraws everything a previous incarnation owned, then
/// reconciles both families on a fixed interval, forever. Pass failures
/// are logged and retried on the next tick.
pub async fn run<F, H, M>(
    cfg: &Config,
    engine: &cost::Engine<M>,
    table: &RouteTable<F>,
    hosts: &H,
    log: &Logger,
) where
    F: Fib,
    H: HostAddrs,
    M: MetricsSource,
{
    if let Err(e) = table.remove_all_managed().await {
        error!(log, "failed to withdraw stale routes: {e}");
    }
    loop {
        info!(log, "running in daemon mode");
        for family in [AddressFamily::Ipv4, AddressFamily::Ipv6] {
            if let Err(e) = reconcile(family, cfg, engine, table, hosts, log).await {
                error!(log, "reconcile {family} failed: {e}");
            }
        }
        tokio::time::sleep(RECONCILE_INTERVAL).await;
    }
}

/// One pass for one family: discover the outbound source address, fetch
/// routes from BIRD and converge the kernel table on the winners.
pub async fn reconcile<F, H, M>(
    family: AddressFamily,
    cfg: &Config,
    engine: &cost::Engine<M>,
    table: &RouteTable<F>,
    hosts: &H,
    log: &Logger,
) -> Result<(), Error>
where
    F: Fib,
    H: HostAddrs,
    M: MetricsSource,
{
    let source = match family {
        AddressFamily::Ipv4 => IpAddr::V4(hosts.outbound_v4().await?),
        AddressFamily::Ipv6 => IpAddr::V6(hosts.outbound_v6(&cfg.v6_source).await?),
    };
    let socket = match family {
        AddressFamily::Ipv4 => &cfg.bird4_socket,
        AddressFamily::Ipv6 => &cfg.bird6_socket,
    };
    let routes = bird::routes(socket, log).await?;
    debug!(log, "fetched {} routes for {family}", routes.len());
    converge(&routes, source, cfg.local_as, engine, table, log).await
}

/// Apply the decision table to each route, in the order the parser
/// emitted them. Kernel failures are fatal to the pass; the caller
/// decides whether that ends the process or just this tick.
pub async fn converge<F, M>(
    routes: &[bird::Route],
    source: IpAddr,
    local_as: u32,
    engine: &cost::Engine<M>,
    table: &RouteTable<F>,
    log: &Logger,
) -> Result<(), Error>
where
    F: Fib,
    M: MetricsSource,
{
    let deadline = Instant::now() + RECONCILE_TIMEOUT;
    for route in routes {
        let Some(chosen) = best_path(route, local_as, engine, deadline, log).await else {
            continue;
        };
        if chosen.as_path.is_empty() || chosen.as_path[0] == local_as {
            // Either there is nothing to forward through, or the best
            // path leads straight back into this AS. In both cases the
            // prefix must not be imported.
            table.remove(route.network).await?;
            continue;
        }
        table
            .configure(route.network, chosen.nexthop, Some(source))
            .await?;
    }
    Ok(())
}

/// Minimum-cost path of a route, stable on ties (first seen wins).
/// `None` when the route has no paths at all or no finite-cost path.
async fn best_path<'a, M: MetricsSource>(
    route: &'a bird::Route,
    local_as: u32,
    engine: &cost::Engine<M>,
    deadline: Instant,
    log: &Logger,
) -> Option<&'a bird::BgpPath> {
    let mut min = f64::INFINITY;
    let mut chosen = None;
    for path in &route.paths {
        let total = engine.total_cost(&path.as_path, local_as, deadline).await;
        debug!(
            log,
            "cost for {} via AS{}: {total}", route.network, path.neighbor_as
        );
        if total < min {
            min = total;
            chosen = Some(path);
        }
    }
    if chosen.is_none() && !route.paths.is_empty() {
        warn!(log, "no usable path for {}", route.network);
    }
    chosen
}
