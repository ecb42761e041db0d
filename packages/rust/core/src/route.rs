//! The route aggregate: steps, derived tables, search index, and the
//! persisted route file.
//!
//! Every mutating entry point ends with a full rebuild before returning, so
//! the tables and the search index never lag behind `steps` from the
//! outside. The route file is always rewritten in full.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use techtree_search::SearchIndex;
use techtree_shared::{Result, Step, StepDraft, StepId, StepNode, TechTreeError, flatten};

use crate::export::{self, GraphExport};
use crate::index::{RouteTables, build_tables};
use crate::render::Renderer;
use crate::resolver::{self, Candidate, Chooser, CorpusSelector, Resolution};

/// Export name used when the route has no backing file.
const DEFAULT_EXPORT_NAME: &str = "route";

/// Tunables applied to a route's operations.
#[derive(Debug, Clone)]
pub struct RouteOptions {
    /// Maximum hits taken from each corpus per query.
    pub search_limit: u32,
}

impl Default for RouteOptions {
    fn default() -> Self {
        Self { search_limit: 10 }
    }
}

/// A tech-tree route.
pub struct Route {
    nodes: Vec<StepNode>,
    tables: RouteTables,
    index: SearchIndex,
    path: Option<PathBuf>,
    options: RouteOptions,
}

impl Route {
    /// Load the flat step list at `path`, creating it as `[]` when missing.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load(
        path: impl AsRef<Path>,
        index: SearchIndex,
        options: RouteOptions,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| TechTreeError::io(parent, e))?;
            }
            std::fs::write(&path, "[]").map_err(|e| TechTreeError::io(&path, e))?;
            info!(path = %path.display(), "created empty route file");
        }

        let content = std::fs::read_to_string(&path).map_err(|e| TechTreeError::io(&path, e))?;
        let steps = parse_records(&content, &path)?;
        debug!(steps = steps.len(), "route file parsed");

        let mut route = Self::detached(steps.into_iter().map(StepNode::Step).collect(), index, options);
        route.path = Some(path);
        route.rebuild().await?;
        Ok(route)
    }

    /// Build a route from an explicit, possibly grouped, step list.
    /// The route has no backing file until [`Route::with_path`] is used.
    pub async fn from_nodes(
        nodes: Vec<StepNode>,
        index: SearchIndex,
        options: RouteOptions,
    ) -> Result<Self> {
        let mut route = Self::detached(nodes, index, options);
        route.rebuild().await?;
        Ok(route)
    }

    /// Build a route from a grouped outline: an array of step and grouping
    /// objects, as accepted by [`StepNode::from_value`].
    pub async fn from_outline(
        outline: Value,
        origin: &Path,
        index: SearchIndex,
        options: RouteOptions,
    ) -> Result<Self> {
        let Value::Array(elements) = outline else {
            return Err(TechTreeError::malformed(
                origin,
                "outline must be an array of steps and groupings",
            ));
        };
        let nodes = elements
            .into_iter()
            .map(|element| StepNode::from_value(element, origin))
            .collect::<Result<Vec<_>>>()?;

        Self::from_nodes(nodes, index, options).await
    }

    fn detached(nodes: Vec<StepNode>, index: SearchIndex, options: RouteOptions) -> Self {
        Self {
            nodes,
            tables: RouteTables::default(),
            index,
            path: None,
            options,
        }
    }

    /// Attach the file that [`Route::persist`] writes to.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    // -----------------------------------------------------------------------
    // Rebuild / mutation
    // -----------------------------------------------------------------------

    /// Recompute every table and the search index from `steps`.
    ///
    /// The new tables replace the old ones only once the index rebuild has
    /// succeeded.
    #[instrument(skip(self), fields(top_level = self.nodes.len()))]
    pub async fn rebuild(&mut self) -> Result<()> {
        let tables = build_tables(&self.nodes);
        self.index.rebuild(&tables.titles, &tables.products).await?;
        self.tables = tables;
        Ok(())
    }

    /// Id the next appended step gets when its draft carries none.
    pub fn next_id(&self) -> Result<StepId> {
        StepId(self.tables.max_idx).next().ok_or_else(|| {
            TechTreeError::validation(format!(
                "no step id left after {}; pass an explicit id",
                self.tables.max_idx
            ))
        })
    }

    /// Append a step, rebuild, and rewrite the route file.
    ///
    /// The step must have a positive id and may only name producers that are
    /// already part of the route; otherwise nothing changes. If the rebuild
    /// or the write fails, the step is removed again and the route is rebuilt
    /// to its previous state before the error is returned.
    #[instrument(skip_all, fields(title = %draft.title))]
    pub async fn append(&mut self, draft: StepDraft) -> Result<StepId> {
        let id = match draft.id {
            Some(id) => id,
            None => self.next_id()?,
        };
        let step = draft.into_step(id);
        self.check_appendable(&step)?;
        self.nodes.push(StepNode::Step(step));

        if let Err(err) = self.commit().await {
            self.nodes.pop();
            if let Err(restore) = self.rebuild().await {
                warn!(error = %restore, "rebuild after rolled-back append failed");
            }
            return Err(err);
        }

        info!(%id, "step appended");
        Ok(id)
    }

    fn check_appendable(&self, step: &Step) -> Result<()> {
        if step.id.0 == 0 {
            return Err(TechTreeError::validation(format!(
                "step {:?} has id 0; ids start at 1",
                step.title
            )));
        }
        if let Some(producer) = step
            .prereqs
            .keys()
            .find(|producer| !self.tables.lookup_step.contains_key(producer))
        {
            return Err(TechTreeError::validation(format!(
                "step {:?} needs unknown producer step {producer}",
                step.title
            )));
        }
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.rebuild().await?;
        self.persist()
    }

    // -----------------------------------------------------------------------
    // Search
    // -----------------------------------------------------------------------

    /// Resolve `query` into a prerequisite edge, asking `chooser` to pick.
    pub async fn search(
        &self,
        selector: CorpusSelector,
        query: &str,
        chooser: &mut dyn Chooser,
    ) -> Result<Option<Resolution>> {
        resolver::resolve(
            &self.index,
            &self.tables.lookup_step,
            selector,
            query,
            self.options.search_limit,
            chooser,
        )
        .await
    }

    /// Numbered hits for `query` without asking for a selection.
    pub async fn candidates(&self, selector: CorpusSelector, query: &str) -> Result<Vec<Candidate>> {
        resolver::collect_candidates(
            &self.index,
            &self.tables.lookup_step,
            selector,
            query,
            self.options.search_limit,
        )
        .await
    }

    // -----------------------------------------------------------------------
    // Export / persistence
    // -----------------------------------------------------------------------

    /// Node/edge payload for the renderer.
    pub fn export(&self, palette: &[String]) -> GraphExport {
        export::export(flatten(&self.nodes), palette)
    }

    /// Render the route through `renderer`, named after the route file.
    pub fn render(&self, renderer: &dyn Renderer, palette: &[String]) -> Result<PathBuf> {
        renderer.render(&self.export(palette), &self.export_name())
    }

    /// Base name for rendered output: the route file stem.
    pub fn export_name(&self) -> String {
        self.path
            .as_deref()
            .and_then(Path::file_stem)
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_EXPORT_NAME.to_string())
    }

    /// Steps in persisted form: groupings flattened, traversal order.
    pub fn to_records(&self) -> Vec<Step> {
        flatten(&self.nodes).into_iter().cloned().collect()
    }

    /// Rewrite the backing route file, if there is one.
    pub fn persist(&self) -> Result<()> {
        match &self.path {
            Some(path) => self.persist_to(path),
            None => {
                debug!("route has no backing file, skipping write");
                Ok(())
            }
        }
    }

    /// Write the route, in full, to `path`, creating its directory.
    pub fn persist_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| TechTreeError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(&self.to_records())
            .map_err(|e| TechTreeError::validation(format!("failed to serialize route: {e}")))?;
        std::fs::write(path, json).map_err(|e| TechTreeError::io(path, e))?;
        debug!(path = %path.display(), "route written");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Top-level step collection.
    pub fn nodes(&self) -> &[StepNode] {
        &self.nodes
    }

    /// All steps, groupings flattened.
    pub fn steps(&self) -> Vec<&Step> {
        flatten(&self.nodes)
    }

    pub fn step(&self, id: StepId) -> Option<&Step> {
        self.tables.lookup_step.get(&id)
    }

    pub fn lookup_step(&self) -> &HashMap<StepId, Step> {
        &self.tables.lookup_step
    }

    pub fn lookup_parent(&self) -> &HashMap<String, Vec<StepId>> {
        &self.tables.lookup_parent
    }

    /// Steps declaring `product` verbatim.
    pub fn producers_of(&self, product: &str) -> &[StepId] {
        self.tables
            .lookup_parent
            .get(product)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn max_idx(&self) -> u32 {
        self.tables.max_idx
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn index(&self) -> &SearchIndex {
        &self.index
    }
}

/// Parse a route file: a JSON array of complete step records.
fn parse_records(content: &str, path: &Path) -> Result<Vec<Step>> {
    let steps: Vec<Step> =
        serde_json::from_str(content).map_err(|e| TechTreeError::malformed(path, e.to_string()))?;
    for step in &steps {
        step.validate(path)?;
    }
    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::FixedChoice;
    use serde_json::json;
    use techtree_search::Corpus;
    use techtree_shared::Grouping;
    use uuid::Uuid;

    fn temp_route_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("techtree_route_{}", Uuid::now_v7()))
            .join("route.json")
    }

    async fn memory_index() -> SearchIndex {
        SearchIndex::in_memory().await.expect("open index")
    }

    async fn route_of(steps: Vec<Step>) -> Route {
        let nodes = steps.into_iter().map(StepNode::from).collect();
        Route::from_nodes(nodes, memory_index().await, RouteOptions::default())
            .await
            .expect("build route")
    }

    fn draft(title: &str, products: &[&str]) -> StepDraft {
        StepDraft {
            title: title.into(),
            products: products.iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn missing_file_is_created_empty() {
        let path = temp_route_path();
        let route = Route::load(&path, memory_index().await, RouteOptions::default())
            .await
            .expect("load");

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");
        assert!(route.steps().is_empty());
        assert_eq!(route.max_idx(), 0);
        assert_eq!(route.next_id().unwrap(), StepId(1));
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[tokio::test]
    async fn empty_route_has_empty_corpora() {
        let route = route_of(vec![]).await;
        assert_eq!(route.max_idx(), 0);
        assert_eq!(route.index().count(Corpus::Titles).await.unwrap(), 0);
        assert_eq!(route.index().count(Corpus::Products).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn ore_to_ingot_scenario() {
        let path = temp_route_path();
        let mut route = Route::load(&path, memory_index().await, RouteOptions::default())
            .await
            .expect("load");
        route.append(draft("mine", &["ore"])).await.expect("append mine");

        let resolution = route
            .search(CorpusSelector::Products, "ore", &mut FixedChoice(1))
            .await
            .unwrap()
            .expect("ore resolves");
        let mut smelt = draft("smelt", &["ingot"]);
        smelt
            .prereqs
            .entry(resolution.producer)
            .or_default()
            .push(resolution.matched);
        let id = route.append(smelt).await.expect("append smelt");

        assert_eq!(id, StepId(2));
        let smelt = route.step(id).unwrap();
        assert_eq!(smelt.prereqs[&StepId(1)], vec!["ore"]);

        let graph = route.export(&[]);
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].from, StepId(1));
        assert_eq!(graph.edges[0].to, StepId(2));
        assert_eq!(graph.edges[0].label, "ore");

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written[1]["prereqs"], json!({"1": ["ore"]}));
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[tokio::test]
    async fn persisted_route_loads_back_identically() {
        let mut forge = Step::new(StepId(3), "forge", "hammer time").with_products(["gear"]);
        forge.link(StepId(2), "iron plate");
        forge.link(StepId(1), "stone");
        forge.link(StepId(2), "iron plate");
        let route = route_of(vec![
            Step::new(StepId(1), "mine", "").with_products(["stone", "ore"]),
            Step::new(StepId(2), "smelt", "").with_products(["iron plate"]),
            forge,
        ])
        .await;

        let path = temp_route_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        route.persist_to(&path).expect("persist");

        let loaded = Route::load(&path, memory_index().await, RouteOptions::default())
            .await
            .expect("reload");
        assert_eq!(loaded.to_records(), route.to_records());
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[tokio::test]
    async fn next_id_follows_the_maximum_not_the_last() {
        let mut route = route_of(vec![
            Step::new(StepId(1), "a", ""),
            Step::new(StepId(7), "b", ""),
            Step::new(StepId(3), "c", ""),
        ])
        .await;

        assert_eq!(route.max_idx(), 7);
        let id = route.append(draft("d", &[])).await.unwrap();
        assert_eq!(id, StepId(8));
        assert_eq!(route.max_idx(), 8);
    }

    #[tokio::test]
    async fn explicit_draft_id_is_kept() {
        let mut route = route_of(vec![Step::new(StepId(1), "a", "")]).await;
        let id = route
            .append(StepDraft {
                id: Some(StepId(40)),
                ..draft("b", &[])
            })
            .await
            .unwrap();
        assert_eq!(id, StepId(40));
        assert_eq!(route.next_id().unwrap(), StepId(41));
    }

    #[tokio::test]
    async fn identical_products_list_both_producers() {
        let mut route = route_of(vec![]).await;
        route.append(draft("pump", &["water"])).await.unwrap();
        route.append(draft("mine", &["ore"])).await.unwrap();
        route.append(draft("melt ice", &["water"])).await.unwrap();

        assert_eq!(route.producers_of("water"), &[StepId(1), StepId(3)]);
        assert!(route.producers_of("steam").is_empty());
    }

    #[tokio::test]
    async fn appended_step_is_searchable_immediately() {
        let mut route = route_of(vec![]).await;
        assert!(route
            .candidates(CorpusSelector::Both, "circuit")
            .await
            .unwrap()
            .is_empty());

        route.append(draft("assemble", &["circuits"])).await.unwrap();
        let hits = route.candidates(CorpusSelector::Both, "circuit").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].producer, StepId(1));
        assert_eq!(hits[0].producer_title.as_deref(), Some("assemble"));
    }

    #[tokio::test]
    async fn unmatched_product_query_is_no_match() {
        let route = route_of(vec![Step::new(StepId(1), "mine", "").with_products(["ore"])]).await;
        let resolved = route
            .search(CorpusSelector::Products, "uranium", &mut FixedChoice(1))
            .await
            .unwrap();
        assert_eq!(resolved, None);
    }

    #[tokio::test]
    async fn failed_write_rolls_the_append_back() {
        let path = temp_route_path();
        let mut route = Route::load(&path, memory_index().await, RouteOptions::default())
            .await
            .expect("load");
        route.append(draft("mine", &["ore"])).await.unwrap();

        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();
        let err = route.append(draft("smelt", &["ingot"])).await.unwrap_err();

        assert!(matches!(err, TechTreeError::Io { .. }));
        assert_eq!(route.steps().len(), 1);
        assert_eq!(route.next_id().unwrap(), StepId(2));
        assert!(route
            .candidates(CorpusSelector::Products, "ingot")
            .await
            .unwrap()
            .is_empty());
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    /// Appends `bad` to a one-step route backed by a file and checks that
    /// it is refused without touching the route or the file.
    async fn assert_append_refused(bad: StepDraft) {
        let path = temp_route_path();
        let mut route = Route::load(&path, memory_index().await, RouteOptions::default())
            .await
            .expect("load");
        route.append(draft("mine", &["ore"])).await.unwrap();
        let before = std::fs::read_to_string(&path).unwrap();

        let err = route.append(bad).await.unwrap_err();

        assert!(matches!(err, TechTreeError::Validation { .. }), "{err}");
        assert_eq!(route.steps().len(), 1);
        assert_eq!(route.next_id().unwrap(), StepId(2));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
        Route::load(&path, memory_index().await, RouteOptions::default())
            .await
            .expect("file still loads");
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[tokio::test]
    async fn append_refuses_id_zero() {
        assert_append_refused(StepDraft {
            id: Some(StepId(0)),
            ..draft("zero", &[])
        })
        .await;
    }

    #[tokio::test]
    async fn append_refuses_unknown_producer() {
        let mut smelt = draft("smelt", &["ingot"]);
        smelt.link(StepId(99), "ore");
        assert_append_refused(smelt).await;
    }

    #[tokio::test]
    async fn append_refuses_a_step_that_needs_itself() {
        let mut loop_step = draft("loop", &[]);
        loop_step.link(StepId(2), "loop");
        assert_append_refused(loop_step).await;
    }

    #[tokio::test]
    async fn exhausted_ids_need_an_explicit_id() {
        let mut route = route_of(vec![Step::new(StepId(u32::MAX), "last", "")]).await;

        assert!(matches!(route.next_id(), Err(TechTreeError::Validation { .. })));
        let err = route.append(draft("one more", &[])).await.unwrap_err();
        assert!(matches!(err, TechTreeError::Validation { .. }));
        assert_eq!(route.steps().len(), 1);

        let id = route
            .append(StepDraft {
                id: Some(StepId(5)),
                ..draft("explicit", &[])
            })
            .await
            .unwrap();
        assert_eq!(id, StepId(5));
    }

    #[tokio::test]
    async fn persist_creates_missing_directories() {
        let route = route_of(vec![Step::new(StepId(1), "mine", "")]).await;
        let path = temp_route_path().with_file_name("plans").join("new.json");

        route.with_path(&path).persist().expect("persist");

        let loaded = Route::load(&path, memory_index().await, RouteOptions::default())
            .await
            .expect("reload");
        assert_eq!(loaded.steps().len(), 1);
        std::fs::remove_dir_all(path.parent().unwrap().parent().unwrap()).ok();
    }

    #[tokio::test]
    async fn grouped_steps_index_and_persist_flat() {
        let nodes: Vec<StepNode> = vec![
            Step::new(StepId(1), "mine", "").with_products(["ore"]).into(),
            Grouping::with_steps(
                "smelting",
                vec![Step::new(StepId(2), "smelt", "").with_products(["ingot"]).into()],
            )
            .into(),
        ];
        let route = Route::from_nodes(nodes, memory_index().await, RouteOptions::default())
            .await
            .unwrap();

        assert_eq!(route.nodes().len(), 2);
        assert_eq!(route.lookup_step().len(), 2);
        assert_eq!(route.producers_of("ingot"), &[StepId(2)]);
        let ids: Vec<StepId> = route.to_records().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![StepId(1), StepId(2)]);
        assert_eq!(route.export(&[]).nodes.len(), 2);
    }

    #[tokio::test]
    async fn outline_with_unknown_element_is_rejected() {
        let outline = json!([
            {"index": 1, "title": "mine", "details": "", "products": [], "prereqs": {}},
            ["not", "a", "step"]
        ]);
        let result = Route::from_outline(
            outline,
            Path::new("outline.json"),
            memory_index().await,
            RouteOptions::default(),
        )
        .await;
        assert!(matches!(result, Err(TechTreeError::UnknownStepElement { .. })));
    }

    #[tokio::test]
    async fn malformed_route_files_abort_loading() {
        for content in [
            r#"[{"index": 1, "title": "mine", "products": [], "prereqs": {}}]"#,
            r#"[{"index": 0, "title": "mine", "details": "", "products": [], "prereqs": {}}]"#,
            r#"{"index": 1}"#,
            "not json",
        ] {
            let path = temp_route_path();
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, content).unwrap();

            let result = Route::load(&path, memory_index().await, RouteOptions::default()).await;
            assert!(
                matches!(result, Err(TechTreeError::MalformedSchema { .. })),
                "accepted {content}"
            );
            std::fs::remove_dir_all(path.parent().unwrap()).ok();
        }
    }

    /// Captures what would have been drawn.
    struct Capture(std::cell::RefCell<Vec<(String, GraphExport)>>);

    impl Renderer for Capture {
        fn render(&self, graph: &GraphExport, name: &str) -> Result<PathBuf> {
            self.0.borrow_mut().push((name.to_string(), graph.clone()));
            Ok(PathBuf::from(format!("{name}.png")))
        }
    }

    #[tokio::test]
    async fn render_hands_the_export_to_the_renderer_once() {
        let mut smelt = Step::new(StepId(2), "smelt", "");
        smelt.link(StepId(1), "ore");
        let route = route_of(vec![Step::new(StepId(1), "mine", ""), smelt])
            .await
            .with_path("plans/factorio.json");

        let capture = Capture(Default::default());
        let palette = vec!["#ffffff".to_string()];
        let out = route.render(&capture, &palette).unwrap();

        assert_eq!(out, PathBuf::from("factorio.png"));
        let calls = capture.0.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "factorio");
        assert_eq!(calls[0].1, route.export(&palette));
    }

    #[tokio::test]
    async fn export_name_comes_from_route_file() {
        let route = route_of(vec![]).await;
        assert_eq!(route.export_name(), "route");
        let route = route.with_path("/tmp/factorio.json");
        assert_eq!(route.export_name(), "factorio");
    }
}
