use std::time::Duration;

use curation::favicon::{favicon_candidates, placeholder_data_uri};
use reqwest::Client;

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Picks a working icon URL for a listing, falling back to a generated
/// placeholder. Network failures are never reported to the caller.
#[derive(Debug, Clone)]
pub struct FaviconResolver {
    http: Client,
    timeout: Duration,
}

impl Default for FaviconResolver {
    fn default() -> Self {
        Self::new(Client::new(), DEFAULT_PROBE_TIMEOUT)
    }
}

impl FaviconResolver {
    pub fn new(http: Client, timeout: Duration) -> Self {
        Self { http, timeout }
    }

    /// Icon for the record whose apply link is `website_url`. `label` seeds
    /// the placeholder.
    pub async fn resolve(&self, website_url: &str, label: &str) -> String {
        self.resolve_from(&favicon_candidates(website_url), label)
            .await
    }

    /// First candidate answering a HEAD probe with 2xx, in order.
    pub async fn resolve_from(&self, candidates: &[String], label: &str) -> String {
        for candidate in candidates {
            if self.probe(candidate).await {
                return candidate.clone();
            }
        }
        placeholder_data_uri(label)
    }

    async fn probe(&self, candidate: &str) -> bool {
        match self
            .http
            .head(candidate)
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                tracing::debug!(candidate, status = %response.status(), "favicon candidate rejected");
                false
            }
            Err(error) => {
                tracing::debug!(candidate, %error, "favicon probe failed");
                false
            }
        }
    }
}
