use crate::dataset::GraphDataset;
use crate::error::{FetchError, Result};
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use url::Url;

/// Single-shot client for the `/graph-data` endpoint.
///
/// There is no retry here. Callers decide when to ask again.
#[derive(Debug, Clone)]
pub struct GraphFetcher {
    client: Client,
    endpoint: Url,
}

impl GraphFetcher {
    pub fn new(endpoint: Url) -> Result<Self> {
        Self::with_timeout(endpoint, 30)
    }

    pub fn with_timeout(endpoint: Url, timeout_secs: u64) -> Result<Self> {
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(format!(
                "{} (expected http or https)",
                endpoint
            )));
        }

        let client = Client::builder()
            .user_agent("Framewire/0.1")
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.div_ceil(2)))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| FetchError::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, endpoint })
    }

    /// Resolve `/graph-data` against a server base URL.
    pub fn for_server(base: &Url) -> Result<Self> {
        let endpoint = base
            .join("/graph-data")
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", base, e)))?;
        Self::new(endpoint)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub async fn fetch_dataset(&self) -> Result<GraphDataset> {
        debug!("Fetching {}", self.endpoint);

        let start = Instant::now();
        let response = self.client.get(self.endpoint.clone()).send().await?;
        let status = response.status();

        if !status.is_success() {
            // Body is informational only; a failed read is not worth surfacing.
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::NotReady {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        let body = response.bytes().await?;
        let dataset: GraphDataset =
            serde_json::from_slice(&body).map_err(|e| FetchError::Malformed(e.to_string()))?;

        info!(
            "Fetched graph data from {} ({} nodes, {} edges) in {:?}",
            self.endpoint,
            dataset.nodes.len(),
            dataset.edges.len(),
            start.elapsed()
        );

        Ok(dataset)
    }
}
