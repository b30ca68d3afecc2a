// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The outbound interface to the performance metrics oracle. One method,
//! so a live client and a deterministic test double are interchangeable.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// The oracle numbers peers from zero; AS numbers translate to peer
/// indices by subtracting this base. The result is signed on purpose:
/// a local AS below the base simply produces an index the oracle has no
/// data for.
pub const PEER_INDEX_BASE: i64 = 64512;

/// One link measurement as reported by the oracle. Latency and jitter
/// are nanoseconds, packet loss a percentage in [0, 100], availability a
/// fraction in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub latency: f64,
    pub jitter: f64,
    pub packet_loss: f64,
    pub availability: f64,
}

#[derive(thiserror::Error, Debug)]
pub enum MetricsError {
    #[error("metrics query failed: {0}")]
    Query(String),
}

#[allow(async_fn_in_trait)]
pub trait MetricsSource {
    /// Fetch the preferred-path measurement between two oracle peer
    /// indices. `Ok(None)` means the oracle has no data for the pair.
    async fn preferred_path(&self, src: i64, dst: i64)
        -> Result<Option<Sample>, MetricsError>;
}

impl<T: MetricsSource> MetricsSource for &T {
    async fn preferred_path(
        &self,
        src: i64,
        dst: i64,
    ) -> Result<Option<Sample>, MetricsError> {
        (**self).preferred_path(src, dst).await
    }
}

/// A fixed in-memory source: serves samples from a table and counts
/// queries. Used by tests across the workspace.
#[derive(Default)]
pub struct StaticSource {
    samples: HashMap<(i64, i64), Sample>,
    calls: AtomicUsize,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, src: i64, dst: i64, sample: Sample) {
        self.samples.insert((src, dst), sample);
    }

    /// How many queries have been issued against this source.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl MetricsSource for StaticSource {
    async fn preferred_path(
        &self,
        src: i64,
        dst: i64,
    ) -> Result<Option<Sample>, MetricsError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.samples.get(&(src, dst)).copied())
    }
}
