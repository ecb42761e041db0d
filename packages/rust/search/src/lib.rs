//! libSQL full-text search index for route corpora.
//!
//! The [`SearchIndex`] struct wraps a libSQL database holding two FTS5
//! tables, `titles` and `products`. Both are rebuilt from scratch on every
//! [`SearchIndex::rebuild`]; there are no incremental updates.

mod schema;

use std::path::{Path, PathBuf};

use libsql::{Connection, Database, params};
use techtree_shared::{Result, TechTreeError};

/// File name of the index database inside the index directory.
pub const INDEX_FILE_NAME: &str = "search.db";

/// One of the two searchable document sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Corpus {
    /// One document per step, keyed by step id.
    Titles,
    /// One document per (step, product), keyed `"{stepId}-{ordinal}"`.
    Products,
}

impl Corpus {
    /// Both corpora, in query order.
    pub const ALL: [Corpus; 2] = [Corpus::Titles, Corpus::Products];

    /// Table name of the corpus.
    pub fn name(self) -> &'static str {
        match self {
            Self::Titles => "titles",
            Self::Products => "products",
        }
    }
}

impl std::fmt::Display for Corpus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A document written to a corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Stored identifier.
    pub key: String,
    /// Stored, searchable text.
    pub content: String,
}

impl Document {
    pub fn new(key: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            content: content.into(),
        }
    }
}

/// A ranked search result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    /// Stored identifier of the matching document.
    pub key: String,
    /// Stored text of the matching document.
    pub content: String,
}

/// Search index handle wrapping a libSQL database.
pub struct SearchIndex {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    location: Option<PathBuf>,
}

impl SearchIndex {
    /// Open or create the index database inside `dir`.
    pub async fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| TechTreeError::io(dir, e))?;
        let path = dir.join(INDEX_FILE_NAME);

        let db = libsql::Builder::new_local(&path)
            .build()
            .await
            .map_err(TechTreeError::engine)?;

        Self::init(db, Some(path)).await
    }

    /// Open a private in-memory index.
    pub async fn in_memory() -> Result<Self> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(TechTreeError::engine)?;

        Self::init(db, None).await
    }

    async fn init(db: Database, location: Option<PathBuf>) -> Result<Self> {
        let conn = db.connect().map_err(TechTreeError::engine)?;
        for corpus in Corpus::ALL {
            conn.execute_batch(&schema::create_sql(corpus))
                .await
                .map_err(|e| {
                    TechTreeError::Engine(format!("failed to create {corpus} index: {e}"))
                })?;
        }
        tracing::debug!(?location, "search index opened");

        Ok(Self { db, conn, location })
    }

    /// Database file backing the index, if any.
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    /// Discard both corpora and write the given documents.
    ///
    /// Runs in a single transaction: if any statement fails, the previous
    /// index content is kept.
    pub async fn rebuild(&self, titles: &[Document], products: &[Document]) -> Result<()> {
        let tx = self
            .conn
            .transaction()
            .await
            .map_err(TechTreeError::engine)?;

        for (corpus, documents) in [(Corpus::Titles, titles), (Corpus::Products, products)] {
            tx.execute_batch(&schema::rebuild_sql(corpus))
                .await
                .map_err(|e| {
                    TechTreeError::Engine(format!("failed to recreate {corpus} index: {e}"))
                })?;

            let insert = schema::insert_sql(corpus);
            for doc in documents {
                tx.execute(&insert, params![doc.key.as_str(), doc.content.as_str()])
                    .await
                    .map_err(TechTreeError::engine)?;
            }
        }

        tx.commit().await.map_err(TechTreeError::engine)?;
        tracing::debug!(
            titles = titles.len(),
            products = products.len(),
            "search index rebuilt"
        );
        Ok(())
    }

    /// Stemmed full-text search of `corpus`, best match first.
    pub async fn search(&self, corpus: Corpus, text: &str, limit: u32) -> Result<Vec<Hit>> {
        let Some(expression) = schema::match_expression(text) else {
            return Ok(Vec::new());
        };

        let mut rows = self
            .conn
            .query(&schema::search_sql(corpus), params![expression, i64::from(limit)])
            .await
            .map_err(TechTreeError::engine)?;

        let mut hits = Vec::new();
        while let Some(row) = rows.next().await.map_err(TechTreeError::engine)? {
            hits.push(Hit {
                key: row.get::<String>(0).map_err(TechTreeError::engine)?,
                content: row.get::<String>(1).map_err(TechTreeError::engine)?,
            });
        }
        tracing::trace!(%corpus, text, hits = hits.len(), "corpus searched");
        Ok(hits)
    }

    /// Number of documents in `corpus`.
    pub async fn count(&self, corpus: Corpus) -> Result<u64> {
        let mut rows = self
            .conn
            .query(&format!("SELECT COUNT(*) FROM {}", corpus.name()), params![])
            .await
            .map_err(TechTreeError::engine)?;

        match rows.next().await.map_err(TechTreeError::engine)? {
            Some(row) => {
                let count = row.get::<i64>(0).map_err(TechTreeError::engine)?;
                Ok(count.max(0) as u64)
            }
            None => Ok(0),
        }
    }
}
