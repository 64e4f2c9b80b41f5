//! Multi-key ordering over value columns.
//!
//! Keys follow the engine convention where a key's `reverse` flag means
//! ascending order. A caller key `"value"` therefore becomes
//! `reverse = true` and `"-value"` becomes `reverse = false`. Remaining ties
//! go to the higher score, then to the natural order of identifiers.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use quarry_core::{Error, Identifier, Schema};

use crate::error::SearchResult;

/// Descending marker on a caller sort key.
const DESCENDING: char = '-';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
	pub column: u32,
	pub reverse: bool,
}

/// What the sorter needs from one match.
#[derive(Debug, Clone)]
pub struct SortCandidate<'c> {
	pub identifier: &'c Identifier,
	pub score: f32,
	pub columns: &'c BTreeMap<u32, Vec<Vec<u8>>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiValueSorter {
	keys: Vec<SortKey>,
}

impl MultiValueSorter {
	/// Fails on the first key naming a field the schema does not index.
	pub fn from_sort_by(schema: &Schema, sort_by: &[String]) -> SearchResult<Self> {
		let mut keys = Vec::with_capacity(sort_by.len());
		for key in sort_by {
			let (name, reverse) = match key.strip_prefix(DESCENDING) {
				Some(name) => (name, false),
				None => (key.as_str(), true),
			};
			let field = schema.field(name).ok_or_else(|| Error::InvalidField(name.to_string()))?;
			keys.push(SortKey { column: field.column, reverse });
		}
		Ok(Self { keys })
	}

	pub fn keys(&self) -> &[SortKey] { &self.keys }

	pub fn compare(&self, a: &SortCandidate<'_>, b: &SortCandidate<'_>) -> Ordering {
		for key in &self.keys {
			let ordering = sort_value(a, key.column).cmp(&sort_value(b, key.column));
			let ordering = if key.reverse { ordering } else { ordering.reverse() };
			if ordering != Ordering::Equal { return ordering; }
		}
		b.score.total_cmp(&a.score).then_with(|| a.identifier.natural_cmp(b.identifier))
	}
}

/// Smallest value of a multi-valued column; a document without one sorts as the lowest value.
fn sort_value<'c>(candidate: &SortCandidate<'c>, column: u32) -> Option<&'c [u8]> {
	candidate.columns.get(&column).and_then(|values| values.iter().min()).map(Vec::as_slice)
}
