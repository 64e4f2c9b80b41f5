//! Query execution: matches, ordering, pagination, facets and highlighting.

use std::collections::BTreeMap;

use regex::{Regex, RegexBuilder};
use tantivy::collector::{Count, TopDocs};
use tantivy::schema::Value;
use tantivy::{DocAddress, TantivyDocument};
use tracing::debug;

use quarry_core::filter::{Clause, QueryFilter};
use quarry_core::request::{QueryInput, SearchQuery};
use quarry_core::schema::CONTENT_FIELD;
use quarry_core::{Error, FieldMap, FieldValue, Facets, Identifier, SearchHit, SearchResponse};

use crate::compiler::{CompiledQuery, QueryCompiler};
use crate::error::{SearchError, SearchResult};
use crate::facets::{date_facets, field_facets, query_facet_node, Columns};
use crate::index::StoredPayload;
use crate::query::{Node, QueryNode};
use crate::sort::{MultiValueSorter, SortCandidate};
use crate::store::Snapshot;
use crate::tantivy_utils::split_value_term;

/// Query syntax that never reaches the highlighter.
const RESERVED: [&str; 3] = ["AND", "OR", "NOT"];

/// One matched document with everything needed to order, facet and return it.
#[derive(Debug, Clone)]
pub struct Match {
	pub identifier: Identifier,
	pub score: f32,
	pub fields: FieldMap,
	pub columns: Columns,
}

impl Match {
	pub(crate) fn candidate(&self) -> SortCandidate<'_> {
		SortCandidate { identifier: &self.identifier, score: self.score, columns: &self.columns }
	}

	pub(crate) fn into_hit(self, highlighted: Option<BTreeMap<String, String>>) -> SearchHit {
		SearchHit { identifier: self.identifier, score: self.score, fields: self.fields, highlighted }
	}
}

pub struct Executor<'s> {
	snapshot: &'s Snapshot,
	max_results: usize,
	highlight_tag: &'s str,
}

impl<'s> Executor<'s> {
	pub fn new(snapshot: &'s Snapshot, max_results: usize, highlight_tag: &'s str) -> Self {
		Self { snapshot, max_results: max_results.max(1), highlight_tag }
	}

	/// Number of documents matching `query`.
	pub fn count(&self, query: &QueryNode) -> SearchResult<u64> {
		let query = query.to_tantivy(&self.snapshot.fields)?;
		let count = self.snapshot.searcher.search(&*query, &Count)?;
		u64::try_from(count).map_err(|_| SearchError::Engine(format!("hit count {count} does not fit in u64")))
	}

	/// Total hit count and the best `max_results` matches, in engine order.
	pub fn matches(&self, query: &QueryNode) -> SearchResult<(usize, Vec<Match>)> {
		let searcher = &self.snapshot.searcher;
		let query = query.to_tantivy(&self.snapshot.fields)?;
		let total = searcher.search(&*query, &Count)?;
		if total == 0 { return Ok((0, Vec::new())); }
		let top = searcher.search(&*query, &TopDocs::with_limit(total.min(self.max_results)))?;
		let mut matches = Vec::with_capacity(top.len());
		for (score, address) in top {
			matches.push(self.load(score, address)?);
		}
		Ok((total, matches))
	}

	fn load(&self, score: f32, address: DocAddress) -> SearchResult<Match> {
		let fields = &self.snapshot.fields;
		let doc: TantivyDocument = self.snapshot.searcher.doc(address)?;
		let payload = StoredPayload::from_document(&doc, fields)?;
		let mut columns = Columns::new();
		for value in doc.get_all(fields.values) {
			let Some((column, encoded)) = value.as_bytes().and_then(split_value_term) else { continue };
			columns.entry(column).or_default().push(encoded.to_vec());
		}
		Ok(Match { identifier: payload.identifier(), score, fields: payload.fields, columns })
	}

	/// Run a compiled query and shape the response the request asks for.
	pub fn execute(&self, compiler: &QueryCompiler<'_>, compiled: CompiledQuery, request: &SearchQuery) -> SearchResult<SearchResponse> {
		let schema = &self.snapshot.schema;
		let sorter = MultiValueSorter::from_sort_by(schema, &request.sort_by)?;
		let (hits, mut matches) = self.matches(&compiled.query)?;
		matches.sort_by(|a, b| sorter.compare(&a.candidate(), &b.candidate()));

		let columns: Vec<&Columns> = matches.iter().map(|m| &m.columns).collect();
		let mut facets = Facets { fields: field_facets(schema, &request.facets, &columns)?, dates: date_facets(schema, &request.date_facets, &columns)?, ..Facets::default() };
		for (field, text) in &request.query_facets {
			let narrowed = QueryNode(Node::filter(compiled.query.0.clone(), query_facet_node(compiler, field, text)?));
			facets.queries.insert(field.clone(), (text.clone(), self.count(&narrowed)?));
		}

		let highlighter = if request.highlight { Highlighter::new(&highlight_terms(&request.input, schema.content_field()), self.highlight_tag)? } else { None };
		let content_field = schema.content_field().to_string();
		let limit = request.limit.unwrap_or(usize::MAX);
		let results = matches
			.into_iter()
			.skip(request.offset)
			.take(limit)
			.map(|m| {
				let highlighted = request.highlight.then(|| {
					let mut out = BTreeMap::new();
					if let (Some(highlighter), Some(FieldValue::Text(text))) = (&highlighter, m.fields.get(&content_field)) {
						out.insert(content_field.clone(), highlighter.apply(text));
					}
					out
				});
				m.into_hit(highlighted)
			})
			.collect::<Vec<_>>();
		debug!(hits, returned = results.len(), offset = request.offset, "search executed");
		Ok(SearchResponse { results, hits, facets, spelling_suggestion: compiled.spelling_suggestion })
	}
}

/// Words of the request worth highlighting: free text minus syntax, or the values of content clauses.
pub fn highlight_terms(input: &QueryInput, content_field: &str) -> Vec<String> {
	match input {
		QueryInput::Text(text) => text
			.split_whitespace()
			.filter(|piece| !RESERVED.contains(piece))
			.map(|piece| {
				let value = piece.rsplit_once(':').map_or(piece, |(_, v)| v);
				value.trim_matches(|c: char| matches!(c, '"' | '(' | ')' | '+' | '-' | '*')).to_string()
			})
			.filter(|term| !term.is_empty() && !term.contains(".."))
			.collect(),
		QueryInput::Filters(filters) => {
			let mut out = Vec::new();
			collect_content_values(filters, content_field, &mut out);
			out
		}
	}
}

fn collect_content_values(filters: &[QueryFilter], content_field: &str, out: &mut Vec<String>) {
	for filter in filters {
		if filter.negated { continue; }
		match &filter.clause {
			Clause::Field { field, value, .. } if field == CONTENT_FIELD || field == content_field => {
				for element in value.elements() { out.extend(element.to_string().split_whitespace().map(str::to_string)); }
			}
			Clause::Group(inner) => collect_content_values(inner, content_field, out),
			Clause::Field { .. } => {}
		}
	}
}

/// Wraps every case-insensitive occurrence of the query terms in a tag.
pub struct Highlighter {
	pattern: Regex,
	replacement: String,
}

impl Highlighter {
	/// `None` when there is nothing to highlight.
	pub fn new(terms: &[String], tag: &str) -> SearchResult<Option<Self>> {
		if terms.is_empty() { return Ok(None); }
		let mut sorted: Vec<&String> = terms.iter().collect();
		// longer alternatives first so a term never shadows a longer one it prefixes
		sorted.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
		sorted.dedup();
		let alternation = sorted.iter().map(|t| regex::escape(t)).collect::<Vec<_>>().join("|");
		let pattern = RegexBuilder::new(&alternation).case_insensitive(true).build().map_err(|e| Error::Query(format!("cannot highlight terms: {e}")))?;
		Ok(Some(Self { pattern, replacement: format!("<{tag}>${{0}}</{tag}>") }))
	}

	pub fn apply(&self, text: &str) -> String {
		self.pattern.replace_all(text, self.replacement.as_str()).into_owned()
	}
}
