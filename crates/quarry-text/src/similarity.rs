//! "More like this": documents sharing the characteristic words of a seed.
//!
//! The seed's terms are regenerated from its stored payload, weighted by
//! `tf * ln(N / df)`, and the best of them are ORed into a query that
//! excludes the seed itself.

use std::collections::BTreeMap;

use tantivy::collector::TopDocs;
use tantivy::query::TermQuery;
use tantivy::schema::IndexRecordOption;
use tantivy::Term;
use tracing::debug;

use quarry_core::request::{MoreLikeThis, QueryInput};
use quarry_core::{Identifier, SearchResponse};

use crate::compiler::QueryCompiler;
use crate::error::SearchResult;
use crate::index::StoredPayload;
use crate::query::{Node, QueryNode};
use crate::search::Executor;
use crate::sort::MultiValueSorter;
use crate::store::Snapshot;
use crate::terms::{is_unprefixed, TermGenerator};

/// Characteristic terms of `seed`, best first. Empty when the seed is not in the store.
pub fn expansion_terms(snapshot: &Snapshot, compiler: &QueryCompiler<'_>, seed: &Identifier, max_terms: usize) -> SearchResult<Vec<(String, f32)>> {
	let searcher = &snapshot.searcher;
	let query = TermQuery::new(Term::from_field_text(snapshot.fields.id, &seed.term()), IndexRecordOption::Basic);
	let Some((_, address)) = searcher.search(&query, &TopDocs::with_limit(1))?.into_iter().next() else {
		debug!(seed = %seed, "seed document not in the store");
		return Ok(Vec::new());
	};
	let payload = StoredPayload::from_document(&searcher.doc(address)?, &snapshot.fields)?;

	let mut generator = TermGenerator::new(compiler.analyzer());
	for field in compiler.schema().fields() {
		if let Some(value) = payload.fields.get(&field.field_name) { generator.index_field(field, value); }
	}
	let mut frequencies: BTreeMap<&str, u32> = BTreeMap::new();
	for term in generator.terms().filter(|t| is_unprefixed(t)) { *frequencies.entry(term).or_default() += 1; }

	let total = searcher.num_docs() as f32;
	let mut weighted = Vec::with_capacity(frequencies.len());
	for (term, tf) in frequencies {
		let df = searcher.doc_freq(&Term::from_field_text(snapshot.fields.terms, term))?;
		if df <= 1 { continue; }
		let weight = tf as f32 * (total / df as f32).ln();
		if weight > 0.0 { weighted.push((term.to_string(), weight)); }
	}
	weighted.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
	weighted.truncate(max_terms);
	Ok(weighted)
}

/// Rank documents like `seed`, never returning the seed.
pub fn more_like_this(executor: &Executor<'_>, snapshot: &Snapshot, compiler: &QueryCompiler<'_>, seed: &Identifier, options: &MoreLikeThis, default_max_terms: usize) -> SearchResult<SearchResponse> {
	let terms = expansion_terms(snapshot, compiler, seed, options.max_terms.unwrap_or(default_max_terms))?;
	if terms.is_empty() { return Ok(SearchResponse::empty()); }
	debug!(seed = %seed, terms = ?terms.iter().map(|(t, _)| t.as_str()).collect::<Vec<_>>(), "more like this expansion");

	let expanded = Node::or(terms.into_iter().map(|(term, _)| Node::Term(term)).collect());
	let mut node = Node::and_not(expanded, Node::Identifier(seed.term()));
	if let Some(additional) = &options.additional_query {
		let restriction = match additional {
			QueryInput::Text(text) => compiler.parse_text(text)?,
			QueryInput::Filters(filters) => compiler.compile_filters(filters)?,
		};
		node = Node::filter(node, restriction);
	}
	let node = compiler.restrict_kinds(node, &options.kinds);

	let (hits, mut matches) = executor.matches(&QueryNode(node))?;
	let sorter = MultiValueSorter::default();
	matches.sort_by(|a, b| sorter.compare(&a.candidate(), &b.candidate()));
	let results = matches.into_iter().skip(options.offset).take(options.limit.unwrap_or(usize::MAX)).map(|m| m.into_hit(None)).collect();
	Ok(SearchResponse { results, hits, ..SearchResponse::default() })
}
