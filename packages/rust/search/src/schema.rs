//! SQL definitions for the corpus tables and query construction.
//!
//! Each corpus is an FTS5 table with a stored identifier column and a
//! stored, porter-stemmed text column. Tables are dropped and recreated on
//! every rebuild; nothing is ever patched in place.

use crate::Corpus;

/// Column layout and tokenizer shared by both corpora.
const FTS_COLUMNS: &str = "ident UNINDEXED, content, tokenize = 'porter unicode61'";

/// Create the table for `corpus` if it is missing (used on open).
pub(crate) fn create_sql(corpus: Corpus) -> String {
    format!(
        "CREATE VIRTUAL TABLE IF NOT EXISTS {} USING fts5({FTS_COLUMNS});",
        corpus.name()
    )
}

/// Drop and recreate the table for `corpus`.
pub(crate) fn rebuild_sql(corpus: Corpus) -> String {
    format!(
        "DROP TABLE IF EXISTS {name};\nCREATE VIRTUAL TABLE {name} USING fts5({FTS_COLUMNS});",
        name = corpus.name()
    )
}

pub(crate) fn insert_sql(corpus: Corpus) -> String {
    format!(
        "INSERT INTO {} (ident, content) VALUES (?1, ?2)",
        corpus.name()
    )
}

/// Ranked lookup; `rowid` breaks rank ties so result order is stable.
pub(crate) fn search_sql(corpus: Corpus) -> String {
    format!(
        "SELECT ident, content FROM {name} WHERE {name} MATCH ?1 ORDER BY rank, rowid LIMIT ?2",
        name = corpus.name()
    )
}

/// Turn free text into an FTS5 match expression.
///
/// Every word becomes a quoted term so user punctuation never reaches the
/// FTS5 query grammar; terms are ANDed. The porter tokenizer stems both the
/// indexed text and the terms, so "smelting" finds "smelt". Returns `None`
/// when the text has no words.
pub(crate) fn match_expression(text: &str) -> Option<String> {
    let terms: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(|word| format!("\"{word}\""))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}
