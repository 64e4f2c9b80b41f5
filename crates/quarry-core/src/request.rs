//! Search request options.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::filter::QueryFilter;

/// What to match: a free-text query string or a structured filter list.
/// An empty filter list matches every document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryInput {
    Text(String),
    Filters(Vec<QueryFilter>),
}

impl Default for QueryInput {
    fn default() -> Self {
        QueryInput::Filters(Vec::new())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapUnit {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

impl FromStr for GapUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.trim_end_matches('s') {
            "year" => GapUnit::Year,
            "month" => GapUnit::Month,
            "day" => GapUnit::Day,
            "hour" => GapUnit::Hour,
            "minute" => GapUnit::Minute,
            "second" => GapUnit::Second,
            _ => return Err(Error::Query(format!("unknown date facet gap '{s}'"))),
        })
    }
}

/// Buckets of `amount` x `gap` starting at `start`, the last one ending at `end`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateFacet {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub gap: GapUnit,
    pub amount: u32,
}

impl DateFacet {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime, gap: GapUnit) -> Self {
        Self { start, end, gap, amount: 1 }
    }

    pub fn every(mut self, amount: u32) -> Self {
        self.amount = amount;
        self
    }
}

/// Search request.
///
/// - `kinds`: restrict matches to these object kinds (empty means all)
/// - `boosts`: `(term, weight)` pairs that raise the score of documents containing `term`
/// - `narrow_queries`: free-text filters ANDed on without affecting relevance
/// - `sort_by`: field names, `-field` for descending
/// - `offset`/`limit`: page over the sorted matches
/// - `facets`, `date_facets`, `query_facets`: facet tables computed over every match
/// - `spelling_query`: text to correct instead of the query text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub input: QueryInput,
    pub kinds: Vec<String>,
    pub boosts: Vec<(String, f32)>,
    pub narrow_queries: Vec<String>,
    pub sort_by: Vec<String>,
    pub offset: usize,
    pub limit: Option<usize>,
    pub facets: Vec<String>,
    pub date_facets: BTreeMap<String, DateFacet>,
    pub query_facets: BTreeMap<String, String>,
    pub highlight: bool,
    pub spelling_query: Option<String>,
}

impl SearchQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn text(query: impl Into<String>) -> Self {
        Self { input: QueryInput::Text(query.into()), ..Self::default() }
    }

    pub fn filtered(filters: Vec<QueryFilter>) -> Self {
        Self { input: QueryInput::Filters(filters), ..Self::default() }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kinds.push(kind.into());
        self
    }

    pub fn with_boost(mut self, term: impl Into<String>, weight: f32) -> Self {
        self.boosts.push((term.into(), weight));
        self
    }

    pub fn with_narrow(mut self, query: impl Into<String>) -> Self {
        self.narrow_queries.push(query.into());
        self
    }

    pub fn sort_by<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sort_by = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_facet(mut self, field: impl Into<String>) -> Self {
        self.facets.push(field.into());
        self
    }

    pub fn with_date_facet(mut self, field: impl Into<String>, facet: DateFacet) -> Self {
        self.date_facets.insert(field.into(), facet);
        self
    }

    pub fn with_query_facet(mut self, field: impl Into<String>, query: impl Into<String>) -> Self {
        self.query_facets.insert(field.into(), query.into());
        self
    }

    pub fn with_highlight(mut self) -> Self {
        self.highlight = true;
        self
    }

    pub fn with_spelling_query(mut self, query: impl Into<String>) -> Self {
        self.spelling_query = Some(query.into());
        self
    }
}

/// Options for a "more like this" request.
///
/// `silently_fail` overrides the backend setting for an unregistered seed kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MoreLikeThis {
    pub additional_query: Option<QueryInput>,
    pub kinds: Vec<String>,
    pub max_terms: Option<usize>,
    pub offset: usize,
    pub limit: Option<usize>,
    pub silently_fail: Option<bool>,
}

impl MoreLikeThis {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_additional_query(mut self, query: QueryInput) -> Self {
        self.additional_query = Some(query);
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kinds.push(kind.into());
        self
    }

    pub fn silently_fail(mut self, silently: bool) -> Self {
        self.silently_fail = Some(silently);
        self
    }
}
