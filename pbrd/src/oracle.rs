// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP client for the performance metrics oracle. The core only ever
//! sees the `MetricsSource` trait; this adapter is the one place that
//! knows the oracle speaks JSON.

use cost::{MetricsError, MetricsSource, Sample};

pub struct HttpSource {
    client: reqwest::Client,
    base: String,
}

impl HttpSource {
    pub fn new(base: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base: base.trim_end_matches('/').to_string(),
        }
    }
}

impl MetricsSource for HttpSource {
    async fn preferred_path(
        &self,
        src: i64,
        dst: i64,
    ) -> Result<Option<Sample>, MetricsError> {
        let url = format!("{}/metrics/path?src={src}&dst={dst}", self.base);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| MetricsError::Query(e.to_string()))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = resp
            .error_for_status()
            .map_err(|e| MetricsError::Query(e.to_string()))?;
        let sample = resp
            .json::<Sample>()
            .await
            .map_err(|e| MetricsError::Query(e.to_string()))?;
        Ok(Some(sample))
    }
}
