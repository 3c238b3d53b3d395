use framewire_fetch::GraphDataset;
use serde::{Deserialize, Serialize};

/// Messages exchanged between the parent page and its frames.
///
/// On the wire this is `{"type": ..., "data": ...}` with camelCase type names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum Message {
    /// Sent by the results frame once its listener is attached.
    ResultsFrameReady,
    /// Sent by the graph frame once it can be switched to the visualization.
    GraphFrameReady,
    /// Parent to results frame. `None` means "loading / nothing yet".
    UpdateResults(Option<GraphDataset>),
    /// Any frame may ask the parent to fetch the data again.
    RefreshData,
}

impl Message {
    pub fn type_name(&self) -> &'static str {
        match self {
            Message::ResultsFrameReady => "resultsFrameReady",
            Message::GraphFrameReady => "graphFrameReady",
            Message::UpdateResults(_) => "updateResults",
            Message::RefreshData => "refreshData",
        }
    }

    pub fn to_value(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}
