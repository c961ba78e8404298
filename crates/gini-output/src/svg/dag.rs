//! Causal graph diagrams.

use super::{Anchor, Canvas};
use gini_models::CausalGraph;
use std::collections::BTreeMap;

const NODE_RX: f64 = 58.0;
const NODE_RY: f64 = 22.0;
const LAYER_GAP: f64 = 110.0;
const ROW_GAP: f64 = 150.0;
const MARKER: &str = "dag-arrow";

/// Layered drawing of a [`CausalGraph`].
///
/// Nodes are placed in layers by longest path from a root, left to right.
/// The exposure is outlined in blue and the outcome in red.
#[derive(Debug, Clone)]
pub struct DagPlot<'a> {
    graph: &'a CausalGraph,
    title: String,
}

impl<'a> DagPlot<'a> {
    /// Diagram of `graph`.
    pub fn new(graph: &'a CausalGraph, title: impl Into<String>) -> Self {
        Self {
            graph,
            title: title.into(),
        }
    }

    /// Pixel centers of each node.
    pub fn layout(&self) -> BTreeMap<&'a str, (f64, f64)> {
        let edges = self.graph.edges();
        let order = self
            .graph
            .topological_order()
            .unwrap_or_else(|| self.graph.nodes());

        let mut depth: BTreeMap<&str, usize> = BTreeMap::new();
        for node in &order {
            let d = edges
                .iter()
                .filter(|(_, to)| to == node)
                .filter_map(|(from, _)| depth.get(from).map(|d| d + 1))
                .max()
                .unwrap_or(0);
            depth.insert(*node, d);
        }

        let mut per_layer: BTreeMap<usize, usize> = BTreeMap::new();
        let mut positions = BTreeMap::new();
        for node in order {
            let layer = depth.get(node).copied().unwrap_or(0);
            let slot = per_layer.entry(layer).or_default();
            // Rows 0, +1, -1, +2, -2, ... within a layer
            let row = if *slot % 2 == 1 {
                (*slot / 2 + 1) as f64
            } else {
                -((*slot / 2) as f64)
            };
            // Odd layers sit higher so edges skipping a layer stay visible
            let stagger = (layer % 2) as f64 * LAYER_GAP * 0.6;
            positions.insert(
                node,
                (
                    80.0 + layer as f64 * ROW_GAP,
                    160.0 + row * LAYER_GAP - stagger,
                ),
            );
            *slot += 1;
        }
        positions
    }

    /// Render to an SVG string.
    pub fn render(&self) -> String {
        let positions = self.layout();
        let width = positions.values().map(|p| p.0).fold(0.0, f64::max) + 100.0;
        let height = positions.values().map(|p| p.1).fold(0.0, f64::max) + 80.0;

        let mut canvas = Canvas::new(width.max(360.0), height.max(220.0));
        canvas.def(&format!(
            "<marker id=\"{}\" viewBox=\"0 0 10 10\" refX=\"10\" refY=\"5\" markerWidth=\"8\" markerHeight=\"8\" orient=\"auto-start-reverse\"><path d=\"M 0 0 L 10 5 L 0 10 z\" fill=\"#333333\"/></marker>",
            MARKER
        ));
        canvas.text((canvas.width() / 2.0, 24.0), &self.title, Anchor::Middle, 14.0);

        for (from, to) in self.graph.edges() {
            let (Some(&a), Some(&b)) = (positions.get(from), positions.get(to)) else {
                continue;
            };
            let (start, end) = trim_to_ellipses(a, b);
            canvas.arrow(start, end, "#333333", MARKER);
        }

        for (name, &center) in &positions {
            let stroke = if *name == self.graph.exposure() {
                "#1f77b4"
            } else if *name == self.graph.outcome() {
                "#d62728"
            } else {
                "#333333"
            };
            canvas.ellipse(center, (NODE_RX, NODE_RY), "#ffffff", stroke);
            canvas.text((center.0, center.1 + 4.0), name, Anchor::Middle, 12.0);
        }

        canvas.finish()
    }
}

/// Shorten the segment `a -> b` so it starts and ends on the node ellipses.
fn trim_to_ellipses(a: (f64, f64), b: (f64, f64)) -> ((f64, f64), (f64, f64)) {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let length = (dx * dx + dy * dy).sqrt();
    if length == 0.0 {
        return (a, b);
    }
    let (ux, uy) = (dx / length, dy / length);
    // Distance from an ellipse center to its boundary along (ux, uy)
    let r = 1.0 / ((ux / NODE_RX).powi(2) + (uy / NODE_RY).powi(2)).sqrt();
    ((a.0 + ux * r, a.1 + uy * r), (b.0 - ux * r, b.1 - uy * r))
}
