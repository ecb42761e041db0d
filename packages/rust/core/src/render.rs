//! Graphviz rendering of an exported route graph.

use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info, instrument, warn};

use techtree_shared::{RenderConfig, Result, TechTreeError};

use crate::export::GraphExport;

/// Turns an export payload into an image on disk.
pub trait Renderer {
    /// Render `graph` under `name`; returns the path of the produced file.
    fn render(&self, graph: &GraphExport, name: &str) -> Result<PathBuf>;
}

/// Renders through the Graphviz `dot` binary.
#[derive(Debug, Clone)]
pub struct GraphvizRenderer {
    /// Layout engine passed as `-K`.
    pub engine: String,
    /// Output format passed as `-T`.
    pub format: String,
    /// Directory receiving `<name>.dot` and `<name>.<format>`.
    pub output_dir: PathBuf,
    /// Open the image once rendered.
    pub view: bool,
}

impl GraphvizRenderer {
    pub fn new(config: &RenderConfig, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            engine: config.engine.clone(),
            format: config.format.clone(),
            output_dir: output_dir.into(),
            view: config.view,
        }
    }
}

impl Renderer for GraphvizRenderer {
    #[instrument(skip_all, fields(name = %name, nodes = graph.nodes.len(), edges = graph.edges.len()))]
    fn render(&self, graph: &GraphExport, name: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)
            .map_err(|e| TechTreeError::io(&self.output_dir, e))?;

        let source = to_dot(graph);
        let dot_path = self.output_dir.join(format!("{name}.dot"));
        std::fs::write(&dot_path, &source).map_err(|e| TechTreeError::io(&dot_path, e))?;
        debug!(path = %dot_path.display(), "dot source written");

        let image_path = self.output_dir.join(format!("{name}.{}", self.format));
        let image = run_dot(&source, &self.engine, &self.format)?;
        std::fs::write(&image_path, image).map_err(|e| TechTreeError::io(&image_path, e))?;
        info!(path = %image_path.display(), "graph rendered");

        if self.view {
            open_viewer(&image_path);
        }
        Ok(image_path)
    }
}

/// Graphviz source for `graph`: top-down, dark background, filled boxes,
/// edge labels coloured like their edge. Parallel edges are kept.
pub fn to_dot(graph: &GraphExport) -> String {
    let mut dot = String::from(
        "digraph {\n\
         \tgraph [bgcolor=\"#043742\" nodesep=0.1 rankdir=TD ranksep=0.5 splines=true]\n\
         \tnode [fontname=arial fontsize=11 shape=box style=filled]\n\
         \tedge [fontname=arial fontsize=10]\n",
    );

    // Writing into a String cannot fail.
    for node in &graph.nodes {
        let _ = writeln!(dot, "\t{} [label=\"{}\"]", node.id, escape(&node.label));
    }
    for edge in &graph.edges {
        let _ = writeln!(
            dot,
            "\t{} -> {} [label=\"{}\" color=\"{color}\" fontcolor=\"{color}\"]",
            edge.from,
            edge.to,
            escape(&edge.label),
            color = edge.color,
        );
    }

    dot.push_str("}\n");
    dot
}

/// Escape a label for a double-quoted DOT string; newlines become `\n`.
fn escape(label: &str) -> String {
    label
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn run_dot(source: &str, engine: &str, format: &str) -> Result<Vec<u8>> {
    let mut child = Command::new("dot")
        .arg(format!("-K{engine}"))
        .arg(format!("-T{format}"))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            TechTreeError::Engine(format!(
                "failed to spawn graphviz `dot` ({e}); install graphviz to export graphs"
            ))
        })?;

    child
        .stdin
        .take()
        .ok_or_else(|| TechTreeError::engine("dot stdin unavailable"))?
        .write_all(source.as_bytes())
        .map_err(|e| TechTreeError::Engine(format!("failed writing dot input: {e}")))?;

    let output = child
        .wait_with_output()
        .map_err(|e| TechTreeError::Engine(format!("failed reading dot output: {e}")))?;

    if !output.status.success() {
        return Err(TechTreeError::Engine(format!(
            "dot exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(output.stdout)
}

fn open_viewer(path: &Path) {
    let opener = if cfg!(target_os = "macos") {
        "open"
    } else if cfg!(target_os = "windows") {
        "explorer"
    } else {
        "xdg-open"
    };

    if let Err(e) = Command::new(opener).arg(path).spawn() {
        warn!(opener, error = %e, "could not open rendered graph");
    }
}
