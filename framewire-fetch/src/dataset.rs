use petgraph::algo::{is_cyclic_directed, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// What a node in the computational graph stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A value carried on a topic (an input or intermediate value).
    #[serde(alias = "input-value")]
    Topic,
    /// An operation that consumes and produces topics.
    #[serde(alias = "operation")]
    Agent,
    /// A derived output value.
    Result,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Topic => "topic",
            NodeKind::Agent => "agent",
            NodeKind::Result => "result",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

impl GraphNode {
    pub fn topic(id: &str, value: f64) -> Self {
        Self {
            id: id.to_string(),
            label: id.to_string(),
            kind: NodeKind::Topic,
            value: Some(value),
        }
    }

    pub fn agent(id: &str) -> Self {
        Self {
            id: id.to_string(),
            label: id.to_string(),
            kind: NodeKind::Agent,
            value: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
}

impl GraphEdge {
    pub fn new(source: &str, target: &str) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
        }
    }
}

/// A complete snapshot of the graph served by `/graph-data`.
///
/// Deliveries always carry a whole data set; there are no partial updates.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphDataset {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
}

/// Structural problems found by [`GraphDataset::issues`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetIssue {
    DanglingEdge { source: String, target: String },
    Cycle,
}

impl fmt::Display for DatasetIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetIssue::DanglingEdge { source, target } => {
                write!(f, "edge {} -> {} references an unknown node", source, target)
            }
            DatasetIssue::Cycle => f.write_str("graph contains a cycle"),
        }
    }
}

impl GraphDataset {
    /// The static fixture shown when no server is available:
    /// A + B feed `plus` which yields C, and C, D feed `times`.
    pub fn sample() -> Self {
        Self {
            nodes: vec![
                GraphNode::topic("A", 2.0),
                GraphNode::topic("B", 3.5),
                GraphNode::agent("plus"),
                GraphNode::topic("C", 5.5),
                GraphNode::agent("times"),
                GraphNode::topic("D", 1.0),
            ],
            edges: vec![
                GraphEdge::new("A", "plus"),
                GraphEdge::new("B", "plus"),
                GraphEdge::new("plus", "C"),
                GraphEdge::new("C", "times"),
                GraphEdge::new("D", "times"),
            ],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn count_of(&self, kind: NodeKind) -> usize {
        self.nodes.iter().filter(|n| n.kind == kind).count()
    }

    /// Build a directed graph over node ids, skipping edges whose endpoints
    /// are not nodes.
    fn to_graph(&self) -> (DiGraph<&str, ()>, HashMap<&str, NodeIndex>) {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();

        for node in &self.nodes {
            index
                .entry(node.id.as_str())
                .or_insert_with(|| graph.add_node(node.id.as_str()));
        }

        for edge in &self.edges {
            if let (Some(&from), Some(&to)) =
                (index.get(edge.source.as_str()), index.get(edge.target.as_str()))
            {
                graph.add_edge(from, to, ());
            }
        }

        (graph, index)
    }

    pub fn issues(&self) -> Vec<DatasetIssue> {
        let (graph, index) = self.to_graph();

        let mut issues: Vec<DatasetIssue> = self
            .edges
            .iter()
            .filter(|e| {
                !index.contains_key(e.source.as_str()) || !index.contains_key(e.target.as_str())
            })
            .map(|e| DatasetIssue::DanglingEdge {
                source: e.source.clone(),
                target: e.target.clone(),
            })
            .collect();

        if is_cyclic_directed(&graph) {
            issues.push(DatasetIssue::Cycle);
        }

        issues
    }

    /// Node ids in dependency order, or `None` if the graph has a cycle.
    pub fn evaluation_order(&self) -> Option<Vec<String>> {
        let (graph, _) = self.to_graph();
        toposort(&graph, None)
            .ok()
            .map(|order| order.into_iter().map(|ix| graph[ix].to_string()).collect())
    }
}
