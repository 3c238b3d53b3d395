pub mod dataset;
pub mod error;
pub mod fetcher;
pub mod source;

pub use dataset::{DatasetIssue, GraphDataset, GraphEdge, GraphNode, NodeKind};
pub use error::FetchError;
pub use fetcher::GraphFetcher;
pub use source::{BoxFuture, DatasetSource, FixtureSource};
