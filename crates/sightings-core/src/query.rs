//! Query translator: raw free text to the index's native query.
//!
//! The mapping is a pass-through. Field-qualified terms, phrases, and
//! boolean operators are handed to the engine exactly as written, and the
//! engine reports its own parse errors as [`Error::QuerySyntax`].

use serde::Serialize;

use crate::error::{Error, Result};

/// Token that selects every indexed record.
pub const MATCH_ALL: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "query", rename_all = "snake_case")]
pub enum SearchQuery {
    MatchAll,
    /// Query text in the engine's own syntax.
    Native(String),
}

pub fn translate_query(raw: &str) -> Result<SearchQuery> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::QuerySyntax("query must not be empty".to_string()));
    }
    if trimmed == MATCH_ALL {
        return Ok(SearchQuery::MatchAll);
    }
    Ok(SearchQuery::Native(trimmed.to_string()))
}
