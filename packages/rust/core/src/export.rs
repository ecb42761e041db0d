//! Node/edge payload handed to the graph renderer.

use serde::Serialize;

use techtree_shared::{DEFAULT_PALETTE, Step, StepId};

/// A step as a graph node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    pub id: StepId,
    pub label: String,
}

/// A prerequisite edge, producer → consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub from: StepId,
    pub to: StepId,
    /// Matched product strings, newline-joined.
    pub label: String,
    pub color: String,
}

/// Everything the renderer needs for one image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphExport {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// Build the export payload for `steps`.
///
/// Edge colours cycle through `palette` in emission order, starting from
/// the first colour on every call; an empty palette falls back to
/// [`DEFAULT_PALETTE`].
pub fn export<'a>(steps: impl IntoIterator<Item = &'a Step>, palette: &[String]) -> GraphExport {
    let fallback: Vec<String>;
    let palette = if palette.is_empty() {
        fallback = DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect();
        &fallback
    } else {
        palette
    };

    let mut graph = GraphExport::default();
    for step in steps {
        graph.nodes.push(GraphNode {
            id: step.id,
            label: step.title.clone(),
        });
        for (producer, matched) in &step.prereqs {
            let color = palette[graph.edges.len() % palette.len()].clone();
            graph.edges.push(GraphEdge {
                from: *producer,
                to: step.id,
                label: matched.join("\n"),
                color,
            });
        }
    }
    graph
}

#[cfg(test)]
mod tests {
    use super::*;

    fn palette(colors: &[&str]) -> Vec<String> {
        colors.iter().map(|c| c.to_string()).collect()
    }

    fn chain() -> Vec<Step> {
        let ore = Step::new(StepId(1), "mine", "").with_products(["ore", "stone"]);
        let mut smelt = Step::new(StepId(2), "smelt", "").with_products(["ingot"]);
        smelt.link(StepId(1), "ore");
        smelt.link(StepId(1), "stone");
        let mut forge = Step::new(StepId(3), "forge", "");
        forge.link(StepId(2), "ingot");
        forge.link(StepId(1), "stone");
        vec![ore, smelt, forge]
    }

    #[test]
    fn one_node_per_step_labelled_by_title() {
        let graph = export(&chain(), &palette(&["red"]));
        let labels: Vec<&str> = graph.nodes.iter().map(|n| n.label.as_str()).collect();
        assert_eq!(labels, vec!["mine", "smelt", "forge"]);
    }

    #[test]
    fn one_edge_per_prereq_key_with_joined_label() {
        let graph = export(&chain(), &palette(&["red"]));
        assert_eq!(graph.edges.len(), 3);
        assert_eq!(graph.edges[0].from, StepId(1));
        assert_eq!(graph.edges[0].to, StepId(2));
        assert_eq!(graph.edges[0].label, "ore\nstone");
    }

    #[test]
    fn colours_cycle_and_restart_per_export() {
        let colors = palette(&["red", "blue"]);
        let first = export(&chain(), &colors);
        let used: Vec<&str> = first.edges.iter().map(|e| e.color.as_str()).collect();
        assert_eq!(used, vec!["red", "blue", "red"]);

        let second = export(&chain(), &colors);
        assert_eq!(first, second);
    }

    #[test]
    fn empty_palette_uses_default() {
        let graph = export(&chain(), &[]);
        assert_eq!(graph.edges[0].color, DEFAULT_PALETTE[0]);
    }

    #[test]
    fn empty_route_exports_nothing() {
        let graph = export(&[], &palette(&["red"]));
        assert!(graph.nodes.is_empty());
        assert!(graph.edges.is_empty());
    }
}
