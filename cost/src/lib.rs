// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Edge and path cost computation against the performance oracle, with a
//! process-wide TTL cache in front of it.
//!
//! A link cost is derived from one oracle sample:
//!
//! ```text
//! cost = K1*latency_ms + K2*(latency_ms * loss / (1 - loss)) + K3*jitter_ms
//! ```
//!
//! divided by availability when below one, scaled by 1000. Total loss,
//! zero availability or zero latency make a link infinitely expensive. A
//! path's total cost is the sum of its edge costs plus a fixed bias per
//! hop, so shorter AS paths win at equal link quality.

use slog::{error, warn, Logger};
use tokio::time::{timeout_at, Instant};

pub use cache::{CostCache, COST_TTL};
pub use metrics::{MetricsError, MetricsSource, Sample, StaticSource, PEER_INDEX_BASE};

pub mod cache;
pub mod metrics;

/// Latency weight.
const K1: f64 = 1.0;
/// Loss weight.
const K2: f64 = 1.0;
/// Jitter weight.
const K3: f64 = 0.5;

/// Fixed per-hop bias added on top of every edge cost.
pub const HOP_BIAS: f64 = 10_000.0;

/// Edges into this AS cost nothing; neither cache nor oracle is
/// consulted for them.
pub const EDGE_FREE_AS: u32 = 65_000;

/// Edges into this AS carry the oracle cost scaled up.
pub const EDGE_PENALTY_AS: u32 = 64_512;
const EDGE_PENALTY_FACTOR: f64 = 1.5;

/// What an unknowable edge costs: oracle error, missing sample, or a
/// query aborted at the pass deadline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownCostPolicy {
    /// Unknown edges cost nothing and never block selection.
    #[default]
    ZeroPermits,
    /// Unknown edges cost infinity, so such paths are never installed.
    InfinityBlocks,
}

impl UnknownCostPolicy {
    fn cost(&self) -> f64 {
        match self {
            UnknownCostPolicy::ZeroPermits => 0.0,
            UnknownCostPolicy::InfinityBlocks => f64::INFINITY,
        }
    }
}

/// Turn one measurement into a scalar link cost.
pub fn link_cost(sample: &Sample) -> f64 {
    let loss = sample.packet_loss / 100.0;
    if loss >= 1.0 || sample.availability == 0.0 || sample.latency == 0.0 {
        return f64::INFINITY;
    }

    let latency_ms = sample.latency / 1e6;
    let jitter_ms = sample.jitter / 1e6;

    let mut cost = K1 * latency_ms + K2 * (latency_ms * loss / (1.0 - loss)) + K3 * jitter_ms;
    if sample.availability < 1.0 {
        cost /= sample.availability;
    }
    cost * 1000.0
}

/// The cost engine: oracle access, the unknown-cost policy, and the cache
/// that wraps both. One engine is shared across every reconcile pass and
/// both address families.
pub struct Engine<M> {
    source: M,
    cache: CostCache,
    policy: UnknownCostPolicy,
    log: Logger,
}

impl<M: MetricsSource> Engine<M> {
    pub fn new(source: M, policy: UnknownCostPolicy, log: Logger) -> Self {
        Self {
            source,
            cache: CostCache::new(),
            policy,
            log,
        }
    }

    /// Cost of the directed edge `src -> dst`, from cache when fresh.
    pub async fn edge_cost(&self, src: u32, dst: u32, deadline: Instant) -> f64 {
        if dst == EDGE_FREE_AS {
            return 0.0;
        }
        if let Some(cost) = self.cache.get((src, dst)).await {
            return cost;
        }
        // Miss. Compute without holding any cache lock; a racing miss on
        // the same key just computes twice and the last writer wins.
        let cost = self.compute_edge(src, dst, deadline).await;
        self.cache.put((src, dst), cost).await;
        cost
    }

    async fn compute_edge(&self, src: u32, dst: u32, deadline: Instant) -> f64 {
        let query = self.source.preferred_path(
            src as i64 - PEER_INDEX_BASE,
            dst as i64 - PEER_INDEX_BASE,
        );
        let sample = match timeout_at(deadline, query).await {
            Ok(Ok(Some(sample))) => sample,
            Ok(Ok(None)) => return self.policy.cost(),
            Ok(Err(e)) => {
                error!(self.log, "metrics unavailable for {src} -> {dst}: {e}");
                return self.policy.cost();
            }
            Err(_) => {
                error!(self.log, "metrics query for {src} -> {dst} aborted at deadline");
                return self.policy.cost();
            }
        };

        let mut cost = link_cost(&sample);
        if dst == EDGE_PENALTY_AS {
            cost *= EDGE_PENALTY_FACTOR;
        }
        cost
    }

    /// Total cost of an AS path as seen from `local_as`, hop bias
    /// included. An infinite edge short-circuits without querying the
    /// remaining edges. An empty path costs nothing.
    pub async fn total_cost(&self, as_path: &[u32], local_as: u32, deadline: Instant) -> f64 {
        let mut total = 0.0;
        let mut prev = local_as;
        for &asn in as_path {
            let cost = self.edge_cost(prev, asn, deadline).await;
            if cost.is_infinite() {
                return f64::INFINITY;
            }
            if cost == 0.0 && asn != EDGE_FREE_AS {
                warn!(self.log, "unexpected cost of 0 for edge {prev} -> {asn}");
            }
            total += cost + HOP_BIAS;
            prev = asn;
        }
        total
    }
}
