// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Memoized edge costs, keyed by the ordered (source AS, destination AS)
//! pair, with TTL expiry and a background sweeper.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::{interval, Instant, MissedTickBehavior};

/// How long a computed edge cost stays valid.
pub const COST_TTL: Duration = Duration::from_secs(15);

/// How often the sweeper clears out expired entries.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct Entry {
    cost: f64,
    expires: Instant,
}

/// Process-wide cache of edge costs. Constructing one starts its sweeper
/// task, which runs for the lifetime of the cache; the cache is expected
/// to live as long as the process.
pub struct CostCache {
    entries: Arc<RwLock<HashMap<(u32, u32), Entry>>>,
}

impl CostCache {
    pub fn new() -> Self {
        let entries: Arc<RwLock<HashMap<(u32, u32), Entry>>> = Arc::default();
        let sweep = Arc::clone(&entries);
        tokio::spawn(async move {
            let mut tick = interval(SWEEP_INTERVAL);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of an interval fires immediately.
            tick.tick().await;
            loop {
                tick.tick().await;
                let now = Instant::now();
                sweep.write().await.retain(|_, e| e.expires > now);
            }
        });
        Self { entries }
    }

    /// Fresh cached cost for `key`, if any. An expired entry reads as a
    /// miss; the sweeper or the next writer disposes of it.
    pub async fn get(&self, key: (u32, u32)) -> Option<f64> {
        let entries = self.entries.read().await;
        let entry = entries.get(&key)?;
        (entry.expires > Instant::now()).then_some(entry.cost)
    }

    /// Insert `cost`, overwriting whatever was there. Two racing misses
    /// may both land here; the last writer wins, which is fine because
    /// the computation is idempotent under fixed inputs.
    pub async fn put(&self, key: (u32, u32), cost: f64) {
        let entry = Entry {
            cost,
            expires: Instant::now() + COST_TTL,
        };
        self.entries.write().await.insert(key, entry);
    }
}

impl Default for CostCache {
    fn default() -> Self {
        Self::new()
    }
}
