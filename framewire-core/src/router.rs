use crate::error::{Error, Result};
use crate::state::DeploymentState;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// The three frames embedded in the parent page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameId {
    Config,
    Graph,
    Results,
}

impl FrameId {
    /// Element id of the frame in the parent document.
    pub fn element_id(&self) -> &'static str {
        match self {
            FrameId::Config => "formFrame",
            FrameId::Graph => "graphFrame",
            FrameId::Results => "outputFrame",
        }
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.element_id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRoute {
    pub frame: FrameId,
    pub url: Url,
}

impl FrameRoute {
    pub fn new(frame: FrameId, url: Url) -> Self {
        Self { frame, url }
    }
}

/// What the graph frame is currently showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphStage {
    Placeholder,
    Loading,
    Visualization,
}

/// Document URLs for every frame, resolved against one base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameDocuments {
    pub config: Url,
    pub graph_placeholder: Url,
    pub graph_loading: Url,
    pub visualization: Url,
    pub results: Url,
}

impl FrameDocuments {
    pub fn new(base: &Url) -> Result<Self> {
        if base.cannot_be_a_base() {
            return Err(Error::InvalidDocument(format!("{} cannot be a base URL", base)));
        }

        let resolve = |doc: &str| {
            base.join(doc)
                .map_err(|e| Error::InvalidDocument(format!("{} relative to {}: {}", doc, base, e)))
        };

        Ok(Self {
            config: resolve("form.html")?,
            graph_placeholder: resolve("graph.html")?,
            graph_loading: resolve("loading.html")?,
            visualization: resolve("generated_graph.html")?,
            results: resolve("results.html")?,
        })
    }

    /// ASCII serialization of the results document's origin.
    pub fn results_origin(&self) -> String {
        self.results.origin().ascii_serialization()
    }
}

/// Outcome of one routing decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePlan {
    pub routes: Vec<FrameRoute>,
    pub graph_stage: GraphStage,
    /// Whether the data set should be fetched alongside this routing.
    pub fetch: bool,
}

impl RoutePlan {
    pub fn target(&self, frame: FrameId) -> Option<&Url> {
        self.routes.iter().find(|r| r.frame == frame).map(|r| &r.url)
    }
}

#[derive(Debug, Clone)]
pub struct Router {
    documents: FrameDocuments,
}

impl Router {
    pub fn new(documents: FrameDocuments) -> Self {
        Self { documents }
    }

    pub fn documents(&self) -> &FrameDocuments {
        &self.documents
    }

    /// Targets for the graph and results frames in the given state.
    ///
    /// A deployed page first shows the loading document in the graph frame;
    /// [`Router::promote`] yields the follow-up route to the visualization.
    pub fn route(&self, state: DeploymentState) -> RoutePlan {
        let docs = &self.documents;
        match state {
            DeploymentState::NotDeployed => RoutePlan {
                routes: vec![
                    FrameRoute::new(FrameId::Graph, docs.graph_placeholder.clone()),
                    FrameRoute::new(FrameId::Results, docs.results.clone()),
                ],
                graph_stage: GraphStage::Placeholder,
                fetch: false,
            },
            DeploymentState::Deployed => RoutePlan {
                routes: vec![
                    FrameRoute::new(FrameId::Graph, docs.graph_loading.clone()),
                    FrameRoute::new(FrameId::Results, docs.results.clone()),
                ],
                graph_stage: GraphStage::Loading,
                fetch: true,
            },
        }
    }

    pub fn promote(&self) -> FrameRoute {
        FrameRoute::new(FrameId::Graph, self.documents.visualization.clone())
    }
}
