//! Causal graph behind the county adjustment.
//!
//! County shapes both home values and inequality, so it is a common cause of
//! the exposure and the outcome. Adjusting for it (fixed effects or partial
//! pooling) closes the backdoor path `Home value ← County → Gini`.

use crate::error::{ModelError, Result};
use petgraph::Direction;
use petgraph::algo::{is_cyclic_directed, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, EdgeRef, Reversed};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Node label for county membership.
pub const COUNTY: &str = "County";
/// Node label for median home value.
pub const HOME_VALUE: &str = "Home value";
/// Node label for the Gini Index.
pub const GINI: &str = "Gini";

/// A directed acyclic graph with one exposure and one outcome.
///
/// Serialises as node and edge name lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "GraphRepr", try_from = "GraphRepr")]
pub struct CausalGraph {
    graph: DiGraph<String, ()>,
    index: BTreeMap<String, NodeIndex>,
    exposure: NodeIndex,
    outcome: NodeIndex,
}

#[derive(Serialize, Deserialize)]
struct GraphRepr {
    nodes: Vec<String>,
    edges: Vec<(String, String)>,
    exposure: String,
    outcome: String,
}

impl From<CausalGraph> for GraphRepr {
    fn from(g: CausalGraph) -> Self {
        Self {
            nodes: g.nodes().into_iter().map(str::to_string).collect(),
            edges: g
                .edges()
                .into_iter()
                .map(|(a, b)| (a.to_string(), b.to_string()))
                .collect(),
            exposure: g.exposure().to_string(),
            outcome: g.outcome().to_string(),
        }
    }
}

impl TryFrom<GraphRepr> for CausalGraph {
    type Error = ModelError;

    fn try_from(repr: GraphRepr) -> Result<Self> {
        let edges: Vec<(&str, &str)> = repr.edges.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
        Self::build(repr.nodes.iter().map(String::as_str), &edges, &repr.exposure, &repr.outcome)
    }
}

impl PartialEq for CausalGraph {
    fn eq(&self, other: &Self) -> bool {
        self.nodes() == other.nodes()
            && self.edges() == other.edges()
            && self.exposure() == other.exposure()
            && self.outcome() == other.outcome()
    }
}

impl Eq for CausalGraph {}

impl Default for CausalGraph {
    fn default() -> Self {
        let mut graph = DiGraph::new();
        let county = graph.add_node(COUNTY.to_string());
        let home_value = graph.add_node(HOME_VALUE.to_string());
        let gini = graph.add_node(GINI.to_string());
        graph.add_edge(county, home_value, ());
        graph.add_edge(county, gini, ());
        graph.add_edge(home_value, gini, ());
        let index = [(COUNTY, county), (HOME_VALUE, home_value), (GINI, gini)]
            .into_iter()
            .map(|(name, i)| (name.to_string(), i))
            .collect();
        Self {
            graph,
            index,
            exposure: home_value,
            outcome: gini,
        }
    }
}

impl CausalGraph {
    /// Build a graph from named edges.
    ///
    /// # Errors
    /// Fails if the exposure or outcome is not a node, or the edges form a cycle.
    pub fn new(edges: &[(&str, &str)], exposure: &str, outcome: &str) -> Result<Self> {
        Self::build(std::iter::empty(), edges, exposure, outcome)
    }

    fn build<'n>(
        nodes: impl IntoIterator<Item = &'n str>,
        edges: &[(&str, &str)],
        exposure: &str,
        outcome: &str,
    ) -> Result<Self> {
        let mut graph = DiGraph::new();
        let mut index: BTreeMap<String, NodeIndex> = BTreeMap::new();
        let mut node = |graph: &mut DiGraph<String, ()>, name: &str| {
            *index
                .entry(name.to_string())
                .or_insert_with(|| graph.add_node(name.to_string()))
        };
        for name in nodes {
            node(&mut graph, name);
        }
        for (a, b) in edges {
            let (a, b) = (node(&mut graph, a), node(&mut graph, b));
            graph.update_edge(a, b, ());
        }

        if is_cyclic_directed(&graph) {
            return Err(ModelError::InvalidConfig("causal graph contains a cycle".to_string()));
        }
        let find = |name: &str| {
            index
                .get(name)
                .copied()
                .ok_or_else(|| ModelError::UnknownName(name.to_string()))
        };
        Ok(Self {
            exposure: find(exposure)?,
            outcome: find(outcome)?,
            graph,
            index,
        })
    }

    /// Node names in insertion order.
    pub fn nodes(&self) -> Vec<&str> {
        self.graph.node_weights().map(String::as_str).collect()
    }

    /// Edges as `(from, to)` names, in insertion order.
    pub fn edges(&self) -> Vec<(&str, &str)> {
        self.graph
            .edge_references()
            .map(|e| (self.graph[e.source()].as_str(), self.graph[e.target()].as_str()))
            .collect()
    }

    /// Exposure node.
    pub fn exposure(&self) -> &str {
        &self.graph[self.exposure]
    }

    /// Outcome node.
    pub fn outcome(&self) -> &str {
        &self.graph[self.outcome]
    }

    fn index(&self, name: &str) -> Result<NodeIndex> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| ModelError::UnknownName(name.to_string()))
    }

    /// Whether the graph has no directed cycle.
    pub fn is_acyclic(&self) -> bool {
        !is_cyclic_directed(&self.graph)
    }

    /// Direct parents of a node.
    pub fn parents(&self, name: &str) -> Result<BTreeSet<&str>> {
        let target = self.index(name)?;
        Ok(self
            .graph
            .neighbors_directed(target, Direction::Incoming)
            .map(|n| self.graph[n].as_str())
            .collect())
    }

    /// Every node with a directed path into `name`.
    pub fn ancestors(&self, name: &str) -> Result<BTreeSet<&str>> {
        let start = self.index(name)?;
        let reversed = Reversed(&self.graph);
        let mut dfs = Dfs::new(reversed, start);
        let mut seen = BTreeSet::new();
        while let Some(n) = dfs.next(reversed) {
            if n != start {
                seen.insert(self.graph[n].as_str());
            }
        }
        Ok(seen)
    }

    /// Common causes of exposure and outcome: ancestors of both, excluding the
    /// exposure itself.
    pub fn confounders(&self) -> BTreeSet<&str> {
        let exposure = self.exposure();
        match (self.ancestors(exposure), self.ancestors(self.outcome())) {
            (Ok(of_exposure), Ok(of_outcome)) => of_exposure
                .intersection(&of_outcome)
                .copied()
                .filter(|n| *n != exposure)
                .collect(),
            _ => BTreeSet::new(),
        }
    }

    /// Topological order of the nodes; `None` when cyclic.
    pub fn topological_order(&self) -> Option<Vec<&str>> {
        toposort(&self.graph, None)
            .ok()
            .map(|order| order.into_iter().map(|n| self.graph[n].as_str()).collect())
    }
}
