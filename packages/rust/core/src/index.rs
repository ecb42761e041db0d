//! Derived lookup tables and search corpora for a step collection.
//!
//! [`build_tables`] walks the (possibly nested) collection once and
//! produces everything the route keeps in sync with its steps. It is total:
//! an empty collection yields empty tables and `max_idx == 0`.

use std::collections::HashMap;

use tracing::{debug, instrument, warn};

use techtree_search::Document;
use techtree_shared::{Step, StepId, StepNode, walk};

/// Tables derived from a route's steps. Rebuilt from scratch, never patched.
#[derive(Debug, Clone, Default)]
pub struct RouteTables {
    /// Step id → step. On duplicate ids the later-visited step wins.
    pub lookup_step: HashMap<StepId, Step>,
    /// Product string → producer ids, in traversal order.
    pub lookup_parent: HashMap<String, Vec<StepId>>,
    /// Largest id seen, 0 when there are no steps.
    pub max_idx: u32,
    /// One document per step: `"{id}"` → title.
    pub titles: Vec<Document>,
    /// One document per product: `"{id}-{ordinal}"` → product.
    pub products: Vec<Document>,
}

/// Compute all derived tables for `nodes`.
#[instrument(skip_all, fields(top_level = nodes.len()))]
pub fn build_tables(nodes: &[StepNode]) -> RouteTables {
    let mut tables = RouteTables::default();

    walk(nodes, &mut |step| {
        if let Some(previous) = tables.lookup_step.insert(step.id, step.clone()) {
            warn!(
                id = %step.id,
                replaced = %previous.title,
                by = %step.title,
                "duplicate step id, later step wins"
            );
        }
        tables.max_idx = tables.max_idx.max(step.id.0);

        tables
            .titles
            .push(Document::new(step.id.to_string(), step.title.clone()));
        for (ordinal, product) in step.products.iter().enumerate() {
            tables
                .lookup_parent
                .entry(product.clone())
                .or_default()
                .push(step.id);
            tables
                .products
                .push(Document::new(product_key(step.id, ordinal), product.clone()));
        }
    });

    debug!(
        steps = tables.lookup_step.len(),
        products = tables.products.len(),
        max_idx = tables.max_idx,
        "route tables built"
    );
    tables
}

/// Corpus key of the `ordinal`-th product of step `id`.
pub fn product_key(id: StepId, ordinal: usize) -> String {
    format!("{id}-{ordinal}")
}
