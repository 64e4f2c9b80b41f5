//! Filter-tree compilation.
//!
//! Lookup shapes:
//! - `exact`: on `content`, each word as `(Zstem OR word)`; on a field, a
//!   phrase between the field's `^`/`$` markers so partial values never match
//! - `contains`: the field-prefixed word (stemmed or not), or a phrase for several words
//! - `gte`/`lte`/`range`: inclusive value ranges on the field's column
//! - `gt`/`lt`: all documents AND_NOT the inclusive range up to the literal
//! - `in`: OR of `exact` per candidate
//! - `startswith`: a prefix phrase anchored at the field start

use std::ops::Bound;

use quarry_core::codec;
use quarry_core::filter::{Clause, Connector, Lookup, QueryFilter};
use quarry_core::schema::{SchemaField, CONTENT_FIELD};
use quarry_core::{Error, FieldType, FieldValue, Schema};

use crate::error::SearchResult;
use crate::query::{Node, QueryNode};
use crate::tantivy_utils::truncate_text_value;
use crate::terms::{begin_marker, end_marker, field_prefix, Analyzer, STEM_PREFIX};

/// A compiled query and, for free text, an optional spelling correction.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
	pub query: QueryNode,
	pub spelling_suggestion: Option<String>,
}

pub struct QueryCompiler<'a> {
	schema: &'a Schema,
	analyzer: &'a Analyzer,
}

impl<'a> QueryCompiler<'a> {
	pub fn new(schema: &'a Schema, analyzer: &'a Analyzer) -> Self {
		Self { schema, analyzer }
	}

	pub fn schema(&self) -> &Schema { self.schema }

	pub(crate) fn analyzer(&self) -> &Analyzer { self.analyzer }

	/// Compile `filters`, restricted to `kinds` when it is not empty.
	pub fn compile(&self, filters: &[QueryFilter], kinds: &[String]) -> SearchResult<CompiledQuery> {
		let node = self.compile_filters(filters)?;
		Ok(CompiledQuery { query: QueryNode(self.restrict_kinds(node, kinds)), spelling_suggestion: None })
	}

	/// Each filter joins the ones before it through its connector.
	pub(crate) fn compile_filters(&self, filters: &[QueryFilter]) -> SearchResult<Node> {
		let mut acc: Option<Node> = None;
		for filter in filters {
			let mut node = match &filter.clause {
				Clause::Field { field, lookup, value } => self.compile_lookup(field, *lookup, value)?,
				Clause::Group(children) => self.compile_filters(children)?,
			};
			if filter.negated { node = Node::and_not(Node::All, node); }
			acc = Some(match (acc, filter.connector) {
				(None, _) => node,
				(Some(prev), Connector::And) => Node::and(vec![prev, node]),
				(Some(prev), Connector::Or) => Node::or(vec![prev, node]),
			});
		}
		Ok(acc.unwrap_or(Node::All))
	}

	fn compile_lookup(&self, field: &str, lookup: Lookup, value: &FieldValue) -> SearchResult<Node> {
		let target = if field == CONTENT_FIELD { None } else { Some(self.schema.require(field)?) };
		let ranged = || match target { Some(f) => Ok(f), None => self.schema.require(self.schema.content_field()) };
		Ok(match lookup {
			Lookup::Exact => match target {
				None => self.content_exact(value),
				Some(f) => Node::or(value.elements().into_iter().map(|v| self.field_exact(f, v)).collect()),
			},
			Lookup::Contains => self.contains(target, value),
			Lookup::In => Node::or(value.elements().into_iter().map(|v| match target { None => self.content_exact(v), Some(f) => self.field_exact(f, v) }).collect()),
			Lookup::StartsWith => self.starts_with(target, value),
			Lookup::Gte => self.value_range(ranged()?, Some(value), None)?,
			Lookup::Lte => self.value_range(ranged()?, None, Some(value))?,
			Lookup::Gt => Node::and_not(Node::All, self.value_range(ranged()?, None, Some(value))?),
			Lookup::Lt => Node::and_not(Node::All, self.value_range(ranged()?, Some(value), None)?),
			Lookup::Range => match value {
				FieldValue::List(bounds) if bounds.len() == 2 => self.value_range(ranged()?, Some(&bounds[0]), Some(&bounds[1]))?,
				other => return Err(Error::Query(format!("range on '{field}' needs exactly two bounds, got {other:?}")).into()),
			},
		})
	}

	/// `(Zstem OR word)` when stemming applies, otherwise the bare word.
	pub(crate) fn word(&self, prefix: &str, word: &str, stem: bool) -> Node {
		let plain = Node::Term(format!("{prefix}{word}"));
		match self.analyzer.stem(word) {
			Some(stemmed) if stem => Node::or(vec![Node::Term(format!("{STEM_PREFIX}{prefix}{stemmed}")), plain]),
			_ => plain,
		}
	}

	pub(crate) fn content_exact(&self, value: &FieldValue) -> Node {
		let stem = matches!(value, FieldValue::Text(_));
		Node::or(self.analyzer.value_words(value).iter().map(|w| self.word("", w, stem)).collect())
	}

	pub(crate) fn field_exact(&self, field: &SchemaField, value: &FieldValue) -> Node {
		let prefix = field_prefix(&field.field_name);
		let mut terms = vec![begin_marker(&prefix)];
		terms.extend(self.analyzer.value_words(value).iter().map(|w| format!("{prefix}{w}")));
		terms.push(end_marker(&prefix));
		Node::phrase(terms)
	}

	fn contains(&self, field: Option<&SchemaField>, value: &FieldValue) -> Node {
		let (prefix, stem) = match field {
			Some(f) => (field_prefix(&f.field_name), f.field_type == FieldType::Text),
			None => (String::new(), matches!(value, FieldValue::Text(_))),
		};
		let words = self.analyzer.value_words(value);
		match words.as_slice() {
			[] => Node::Nothing,
			[single] => self.word(&prefix, single, stem),
			_ => Node::phrase(words.iter().map(|w| format!("{prefix}{w}")).collect()),
		}
	}

	/// One word matches as a prefix; several words must open the field exactly.
	fn starts_with(&self, field: Option<&SchemaField>, value: &FieldValue) -> Node {
		match field {
			None => {
				let words = self.analyzer.value_words(value);
				if words.len() == 1 { Node::phrase_prefix(words) } else { Node::phrase(words) }
			}
			Some(f) if f.field_type == FieldType::Text => {
				let prefix = field_prefix(&f.field_name);
				let words = self.analyzer.value_words(value);
				let mut terms = vec![begin_marker(&prefix)];
				terms.extend(words.iter().map(|w| format!("{prefix}{w}")));
				match words.len() {
					0 => Node::Nothing,
					1 => Node::phrase_prefix(terms),
					_ => Node::phrase(terms),
				}
			}
			Some(f) => Node::Wildcard(format!("{}{}", field_prefix(&f.field_name), value.to_string().to_lowercase())),
		}
	}

	/// Inclusive range on `field`'s column; a missing end falls back to the type's sentinel.
	pub(crate) fn value_range(&self, field: &SchemaField, low: Option<&FieldValue>, high: Option<&FieldValue>) -> SearchResult<Node> {
		let ty = field.field_type;
		let literal = |v: &FieldValue| -> SearchResult<Vec<u8>> {
			let encoded = codec::encode(v, ty)?;
			Ok(if ty == FieldType::Text { truncate_text_value(encoded) } else { encoded })
		};
		let open = |sentinel: Option<Vec<u8>>| sentinel.map_or(Bound::Unbounded, Bound::Included);
		let low = match low { Some(v) => Bound::Included(literal(v)?), None => open(codec::lower_sentinel(ty)) };
		let high = match high { Some(v) => Bound::Included(literal(v)?), None => open(codec::upper_sentinel(ty)) };
		Ok(Node::ValueRange { column: field.column, low, high })
	}

	/// AND in an OR of kind terms that carries no weight.
	pub(crate) fn restrict_kinds(&self, node: Node, kinds: &[String]) -> Node {
		if kinds.is_empty() { return node; }
		let restriction = Node::or(kinds.iter().map(|k| Node::scale(0.0, Node::Kind(k.clone()))).collect());
		Node::and(vec![node, restriction])
	}

	pub(crate) fn apply_boosts(&self, node: Node, boosts: &[(String, f32)]) -> Node {
		boosts.iter().fold(node, |acc, (term, weight)| {
			Node::and_maybe(acc, Node::scale(*weight, self.content_exact(&FieldValue::Text(term.clone()))))
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::NaiveDate;
	use quarry_core::FieldDescriptor;

	fn schema() -> Schema {
		Schema::build(&[
			FieldDescriptor::content("text"),
			FieldDescriptor::new("name", FieldType::Text),
			FieldDescriptor::new("title", FieldType::Text),
			FieldDescriptor::new("pub_date", FieldType::Date),
			FieldDescriptor::new("value", FieldType::Long),
		])
		.expect("schema")
	}

	fn describe(filters: Vec<QueryFilter>) -> String {
		let schema = schema();
		let analyzer = Analyzer::new("english").expect("analyzer");
		QueryCompiler::new(&schema, &analyzer).compile(&filters, &[]).expect("compile").query.to_string()
	}

	#[test]
	fn content_words_pair_stem_and_raw() {
		assert_eq!(describe(vec![QueryFilter::content("hello")]), "Query((Zhello OR hello))");
		assert_eq!(describe(vec![QueryFilter::content("hello world")]), "Query((Zhello OR hello OR Zworld OR world))");
	}

	#[test]
	fn negation_subtracts_from_all_documents() {
		assert_eq!(describe(vec![QueryFilter::content("hello").not()]), "Query((<alldocuments> AND_NOT (Zhello OR hello)))");
		let q = describe(vec![QueryFilter::content("hello"), QueryFilter::content("world").or()]);
		assert_eq!(q, "Query((Zhello OR hello OR Zworld OR world))");
	}

	#[test]
	fn exact_fields_are_bracketed_phrases() {
		let q = describe(vec![QueryFilter::new("name", Lookup::Exact, "hello")]);
		assert_eq!(q, "Query((XNAME^ PHRASE 3 XNAMEhello PHRASE 3 XNAME$))");
		let q = describe(vec![QueryFilter::new("name", Lookup::In, vec!["a b", "c"])]);
		assert_eq!(q, "Query(((XNAME^ PHRASE 4 XNAMEa PHRASE 4 XNAMEb PHRASE 4 XNAME$) OR (XNAME^ PHRASE 3 XNAMEc PHRASE 3 XNAME$)))");
	}

	#[test]
	fn contains_uses_prefixed_stems() {
		assert_eq!(describe(vec![QueryFilter::new("title", Lookup::Contains, "haystack")]), "Query((ZXTITLEhaystack OR XTITLEhaystack))");
		assert_eq!(describe(vec![QueryFilter::new("title", Lookup::Contains, "hay stack")]), "Query((XTITLEhay PHRASE 2 XTITLEstack))");
	}

	#[test]
	fn strict_bounds_exclude_the_boundary() {
		let gt = describe(vec![QueryFilter::new("name", Lookup::Gt, "m")]);
		assert_eq!(gt, "Query((<alldocuments> AND_NOT VALUE_LE 1 m))");
		let gte = describe(vec![QueryFilter::new("name", Lookup::Gte, "m")]);
		assert_eq!(gte, "Query(VALUE_GE 1 m)");
		let lt = describe(vec![QueryFilter::new("name", Lookup::Lt, "m")]);
		assert_eq!(lt, "Query((<alldocuments> AND_NOT VALUE_GE 1 m))");
		let day = NaiveDate::from_ymd_opt(2009, 2, 10).expect("date");
		let lte = describe(vec![QueryFilter::new("pub_date", Lookup::Lte, day)]);
		assert_eq!(lte, "Query(VALUE_RANGE 3 00010101000000 20090210000000)");
	}

	#[test]
	fn ranges_need_two_bounds() {
		let schema = schema();
		let analyzer = Analyzer::new("english").expect("analyzer");
		let compiler = QueryCompiler::new(&schema, &analyzer);
		let bad = QueryFilter::new("value", Lookup::Range, vec![1]);
		assert!(compiler.compile(&[bad], &[]).is_err());
		let q = compiler.compile(&[QueryFilter::range("name", "a", "m")], &[]).expect("range");
		assert_eq!(q.query.to_string(), "Query(VALUE_RANGE 1 a m)");
	}

	#[test]
	fn startswith_anchors_at_field_start() {
		assert_eq!(describe(vec![QueryFilter::new("name", Lookup::StartsWith, "da")]), "Query((XNAME^ PHRASE_PREFIX 2 XNAMEda))");
		assert_eq!(describe(vec![QueryFilter::new("content", Lookup::StartsWith, "hel")]), "Query(WILDCARD hel*)");
	}

	#[test]
	fn unknown_fields_fail_fast() {
		let schema = schema();
		let analyzer = Analyzer::new("english").expect("analyzer");
		let compiler = QueryCompiler::new(&schema, &analyzer);
		let err = compiler.compile(&[QueryFilter::new("nope", Lookup::Exact, "x")], &[]).expect_err("unknown field");
		assert!(matches!(err, crate::error::SearchError::Core(Error::InvalidField(_))));
	}

	#[test]
	fn kinds_and_boosts_wrap_the_query() {
		let schema = schema();
		let analyzer = Analyzer::new("english").expect("analyzer");
		let compiler = QueryCompiler::new(&schema, &analyzer);
		let base = compiler.compile_filters(&[QueryFilter::content("hello")]).expect("compile");
		let boosted = compiler.apply_boosts(base, &[("world".to_string(), 5.0)]);
		assert_eq!(boosted.to_string(), "((Zhello OR hello) AND_MAYBE 5 * (Zworld OR world))");
		let scoped = compiler.restrict_kinds(Node::All, &["core.a".to_string(), "core.b".to_string()]);
		assert_eq!(scoped.to_string(), "(<alldocuments> AND (0 * CONTENTTYPEcore.a OR 0 * CONTENTTYPEcore.b))");
	}
}
