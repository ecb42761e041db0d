//! Route model and domain logic for techtree.
//!
//! This crate ties the step collection to its derived lookup tables, the
//! search index, the prerequisite resolver, and graph export.

pub mod export;
pub mod index;
pub mod render;
pub mod resolver;
pub mod route;

pub use export::{GraphEdge, GraphExport, GraphNode};
pub use render::{GraphvizRenderer, Renderer};
pub use resolver::{Candidate, Chooser, CorpusSelector, FixedChoice, Resolution};
pub use route::{Route, RouteOptions};
