// HTTP transport for the gaming platform's catalog feed and manager endpoint.

use std::time::Duration;

use async_trait::async_trait;
use leagueboard_core::{CatalogSource, FetchError, SnapshotSource};
use reqwest::header::HeaderMap;
use serde_json::Value;
use tracing::debug;

use crate::config::Config;

/// reqwest-backed client implementing both upstream seams.
pub struct GamingApiClient {
    http: reqwest::Client,
    catalog_url: String,
    manager_url: String,
    phase_id: u32,
    headers: HeaderMap,
    catalog_timeout: Duration,
    snapshot_timeout: Duration,
}

impl GamingApiClient {
    pub fn from_config(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            catalog_url: config.upstream.catalog_url.clone(),
            manager_url: config.upstream.manager_url.clone(),
            phase_id: config.upstream.phase_id,
            headers: config.upstream_headers.clone(),
            catalog_timeout: config.upstream.catalog_timeout(),
            snapshot_timeout: config.upstream.snapshot_timeout(),
        }
    }

    pub fn catalog_url(&self, matchday: u32) -> String {
        self.catalog_url.replace("{matchday}", &matchday.to_string())
    }

    pub fn manager_url(&self, matchday: u32, guid: &str) -> String {
        self.manager_url
            .replace("{guid}", guid)
            .replace("{matchday}", &matchday.to_string())
            .replace("{phase}", &self.phase_id.to_string())
    }

    async fn get_json(
        &self,
        request: reqwest::RequestBuilder,
        timeout: Duration,
    ) -> Result<Value, FetchError> {
        let response = request
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| transport_error(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    secs: timeout.as_secs(),
                }
            } else {
                FetchError::Malformed(e.to_string())
            }
        })
    }
}

fn transport_error(e: reqwest::Error, timeout: Duration) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            secs: timeout.as_secs(),
        }
    } else {
        FetchError::Transport(e.to_string())
    }
}

#[async_trait]
impl CatalogSource for GamingApiClient {
    async fn fetch_catalog(&self, matchday: u32) -> Result<Value, FetchError> {
        let url = self.catalog_url(matchday);
        debug!(matchday, %url, "fetching catalog");
        self.get_json(self.http.get(&url), self.catalog_timeout).await
    }
}

#[async_trait]
impl SnapshotSource for GamingApiClient {
    async fn fetch_snapshot(&self, matchday: u32, manager_id: &str) -> Result<Value, FetchError> {
        let url = self.manager_url(matchday, manager_id);
        debug!(matchday, manager_id, "fetching manager snapshot");
        let request = self.http.get(&url).headers(self.headers.clone());
        self.get_json(request, self.snapshot_timeout).await
    }
}
