use crate::dataset::GraphDataset;
use crate::error::Result;
use crate::fetcher::GraphFetcher;
pub use futures::future::BoxFuture;

/// Anything that can produce the current graph data set.
pub trait DatasetSource: Send + Sync {
    fn fetch_dataset(&self) -> BoxFuture<'_, Result<GraphDataset>>;

    /// Human-readable description for logs and CLI output.
    fn describe(&self) -> String;
}

impl DatasetSource for GraphFetcher {
    fn fetch_dataset(&self) -> BoxFuture<'_, Result<GraphDataset>> {
        Box::pin(GraphFetcher::fetch_dataset(self))
    }

    fn describe(&self) -> String {
        format!("GET {}", self.endpoint())
    }
}

/// Serves a fixed data set, for running without a server.
#[derive(Debug, Clone, Default)]
pub struct FixtureSource {
    dataset: GraphDataset,
}

impl FixtureSource {
    pub fn new(dataset: GraphDataset) -> Self {
        Self { dataset }
    }

    pub fn sample() -> Self {
        Self::new(GraphDataset::sample())
    }
}

impl DatasetSource for FixtureSource {
    fn fetch_dataset(&self) -> BoxFuture<'_, Result<GraphDataset>> {
        let dataset = self.dataset.clone();
        Box::pin(async move { Ok(dataset) })
    }

    fn describe(&self) -> String {
        format!("fixture ({} nodes)", self.dataset.nodes.len())
    }
}
