//! Turns a free-text prerequisite query into a (producer step, matched
//! string) pair.
//!
//! Queried corpora are numbered with one global 1-based counter (titles
//! before products) so the user picks a single index regardless of which
//! corpus a hit came from. Selection `0` always means "none of these".
//! Ranking is left entirely to the search index.

use std::collections::HashMap;
use std::str::FromStr;

use tracing::{debug, instrument};

use techtree_search::{Corpus, SearchIndex};
use techtree_shared::{Result, Step, StepId, TechTreeError};

/// Which corpora a query runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorpusSelector {
    Titles,
    Products,
    Both,
}

impl CorpusSelector {
    /// Corpora to query, in display order.
    pub fn corpora(self) -> &'static [Corpus] {
        match self {
            Self::Titles => &[Corpus::Titles],
            Self::Products => &[Corpus::Products],
            Self::Both => &Corpus::ALL,
        }
    }
}

impl FromStr for CorpusSelector {
    type Err = TechTreeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "titles" | "title" => Ok(Self::Titles),
            "products" | "product" => Ok(Self::Products),
            "both" | "all" => Ok(Self::Both),
            other => Err(TechTreeError::validation(format!(
                "unknown corpus '{other}': expected 'titles', 'products', or 'all'"
            ))),
        }
    }
}

/// A numbered search hit, ready to be shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// 1-based position across all queried corpora.
    pub number: usize,
    pub corpus: Corpus,
    /// Step that owns the matching title or product.
    pub producer: StepId,
    /// Matching title or product text.
    pub text: String,
    /// Title of the owning step, when it is known to the route.
    pub producer_title: Option<String>,
}

/// A resolved prerequisite edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub producer: StepId,
    pub matched: String,
}

/// Presents candidates and returns the user's pick.
pub trait Chooser {
    /// Pick a candidate by its `number`, or `0` for none.
    fn choose(&mut self, candidates: &[Candidate]) -> Result<usize>;

    /// Called for every queried corpus that produced no hits.
    fn no_match(&mut self, _corpus: Corpus) {}
}

/// A chooser that always answers with the same index.
#[derive(Debug, Clone, Copy)]
pub struct FixedChoice(pub usize);

impl Chooser for FixedChoice {
    fn choose(&mut self, _candidates: &[Candidate]) -> Result<usize> {
        Ok(self.0)
    }
}

/// Owning step of a corpus document key.
///
/// Title keys are the step id; product keys are `"{id}-{ordinal}"`.
pub fn owner_of(corpus: Corpus, key: &str) -> Result<StepId> {
    let id = match corpus {
        Corpus::Titles => key,
        Corpus::Products => key.split_once('-').map_or(key, |(id, _)| id),
    };
    id.parse().map_err(|_| {
        TechTreeError::Engine(format!("{corpus} index returned a malformed key '{key}'"))
    })
}

/// Query every corpus of `selector` and number the hits globally.
#[instrument(skip(index, lookup))]
pub async fn collect_candidates(
    index: &SearchIndex,
    lookup: &HashMap<StepId, Step>,
    selector: CorpusSelector,
    query: &str,
    limit: u32,
) -> Result<Vec<Candidate>> {
    let mut candidates = Vec::new();

    for &corpus in selector.corpora() {
        let hits = index.search(corpus, query, limit).await?;
        debug!(%corpus, hits = hits.len(), "corpus queried");

        for hit in hits {
            let producer = owner_of(corpus, &hit.key)?;
            candidates.push(Candidate {
                number: candidates.len() + 1,
                corpus,
                producer,
                text: hit.content,
                producer_title: lookup.get(&producer).map(|step| step.title.clone()),
            });
        }
    }

    Ok(candidates)
}

/// Reduce a user selection to an edge.
///
/// `0` is "no match"; `1..=len` picks that candidate; anything else is an
/// [`TechTreeError::InvalidSelection`] the caller should re-prompt on.
pub fn select(candidates: &[Candidate], choice: usize) -> Result<Option<Resolution>> {
    if choice == 0 {
        return Ok(None);
    }
    let candidate = candidates
        .get(choice - 1)
        .ok_or(TechTreeError::InvalidSelection {
            index: choice,
            max: candidates.len(),
        })?;

    Ok(Some(Resolution {
        producer: candidate.producer,
        matched: candidate.text.clone(),
    }))
}

/// Full search-and-select protocol.
///
/// Returns `Ok(None)` when nothing matched (the chooser is not asked) or
/// when the user picked `0`.
pub async fn resolve(
    index: &SearchIndex,
    lookup: &HashMap<StepId, Step>,
    selector: CorpusSelector,
    query: &str,
    limit: u32,
    chooser: &mut dyn Chooser,
) -> Result<Option<Resolution>> {
    let candidates = collect_candidates(index, lookup, selector, query, limit).await?;

    for &corpus in selector.corpora() {
        if !candidates.iter().any(|c| c.corpus == corpus) {
            chooser.no_match(corpus);
        }
    }
    if candidates.is_empty() {
        debug!(query, "no match in any corpus");
        return Ok(None);
    }

    let choice = chooser.choose(&candidates)?;
    let resolution = select(&candidates, choice)?;
    debug!(query, choice, ?resolution, "selection resolved");
    Ok(resolution)
}
