//! Engine-neutral query tree and its lowering to tantivy queries.

use std::fmt;
use std::ops::Bound;

use tantivy::query::{AllQuery, BooleanQuery, BoostQuery, ConstScoreQuery, EmptyQuery, Occur, PhrasePrefixQuery, PhraseQuery, Query, RangeQuery, RegexQuery, TermQuery};
use tantivy::schema::IndexRecordOption;
use tantivy::Term;

use crate::error::SearchResult;
use crate::tantivy_utils::{column_bounds, value_term, StoreFields};

/// Expansion cap for trailing-wildcard phrases.
const MAX_PREFIX_EXPANSIONS: u32 = 1_000;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
	All,
	Nothing,
	Term(String),
	Phrase(Vec<String>),
	/// Phrase whose last term is a prefix.
	PhrasePrefix(Vec<String>),
	/// Every term starting with the given text.
	Wildcard(String),
	Identifier(String),
	Kind(String),
	ValueRange { column: u32, low: Bound<Vec<u8>>, high: Bound<Vec<u8>> },
	And(Vec<Node>),
	Or(Vec<Node>),
	AndNot(Box<Node>, Box<Node>),
	AndMaybe(Box<Node>, Box<Node>),
	/// Left side scored, right side only restricts.
	Filter(Box<Node>, Box<Node>),
	Scale(f32, Box<Node>),
}

/// A compiled query. Only the compiler builds these.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryNode(pub(crate) Node);

impl QueryNode {
	pub fn to_tantivy(&self, fields: &StoreFields) -> SearchResult<Box<dyn Query>> { self.0.to_tantivy(fields) }
}

impl fmt::Display for QueryNode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Query({})", self.0) }
}

impl Node {
	pub(crate) fn and(nodes: Vec<Node>) -> Node { Self::flatten(nodes, true) }

	pub(crate) fn or(nodes: Vec<Node>) -> Node { Self::flatten(nodes, false) }

	fn flatten(nodes: Vec<Node>, conjunction: bool) -> Node {
		let mut out = Vec::with_capacity(nodes.len());
		for node in nodes {
			match (node, conjunction) {
				(Node::And(inner), true) | (Node::Or(inner), false) => out.extend(inner),
				(node, _) => out.push(node),
			}
		}
		match out.len() {
			0 => if conjunction { Node::All } else { Node::Nothing },
			1 => out.pop().unwrap_or(Node::Nothing),
			_ => if conjunction { Node::And(out) } else { Node::Or(out) },
		}
	}

	pub(crate) fn and_not(left: Node, right: Node) -> Node { Node::AndNot(Box::new(left), Box::new(right)) }

	pub(crate) fn and_maybe(left: Node, right: Node) -> Node { Node::AndMaybe(Box::new(left), Box::new(right)) }

	pub(crate) fn filter(left: Node, right: Node) -> Node { Node::Filter(Box::new(left), Box::new(right)) }

	pub(crate) fn scale(factor: f32, node: Node) -> Node { Node::Scale(factor, Box::new(node)) }

	/// A phrase of one term is just that term.
	pub(crate) fn phrase(terms: Vec<String>) -> Node {
		match terms.len() {
			0 => Node::Nothing,
			1 => terms.into_iter().next().map_or(Node::Nothing, Node::Term),
			_ => Node::Phrase(terms),
		}
	}

	pub(crate) fn phrase_prefix(mut terms: Vec<String>) -> Node {
		match terms.len() {
			0 => Node::Nothing,
			1 => terms.pop().map_or(Node::Nothing, Node::Wildcard),
			_ => Node::PhrasePrefix(terms),
		}
	}

	fn to_tantivy(&self, fields: &StoreFields) -> SearchResult<Box<dyn Query>> {
		let text_term = |t: &str| Term::from_field_text(fields.terms, t);
		Ok(match self {
			Node::All => Box::new(AllQuery),
			Node::Nothing => Box::new(EmptyQuery),
			Node::Term(t) => Box::new(TermQuery::new(text_term(t), IndexRecordOption::WithFreqs)),
			Node::Phrase(terms) => Box::new(PhraseQuery::new(terms.iter().map(|t| text_term(t)).collect())),
			Node::PhrasePrefix(terms) => {
				let mut query = PhrasePrefixQuery::new(terms.iter().map(|t| text_term(t)).collect());
				query.set_max_expansions(MAX_PREFIX_EXPANSIONS);
				Box::new(query)
			}
			Node::Wildcard(prefix) => Box::new(RegexQuery::from_pattern(&format!("{}.*", regex::escape(prefix)), fields.terms)?),
			Node::Identifier(id) => Box::new(TermQuery::new(Term::from_field_text(fields.id, id), IndexRecordOption::Basic)),
			Node::Kind(kind) => Box::new(TermQuery::new(Term::from_field_text(fields.kind, kind), IndexRecordOption::Basic)),
			Node::ValueRange { column, low, high } => {
				let (open_low, open_high) = column_bounds(*column);
				let to_term = |bound: &Bound<Vec<u8>>, open: Bound<Vec<u8>>| match bound {
					Bound::Included(v) => Bound::Included(value_term(*column, v)),
					Bound::Excluded(v) => Bound::Excluded(value_term(*column, v)),
					Bound::Unbounded => open,
				};
				let as_term = |bound: Bound<Vec<u8>>| match bound {
					Bound::Included(b) => Bound::Included(Term::from_field_bytes(fields.values, &b)),
					Bound::Excluded(b) => Bound::Excluded(Term::from_field_bytes(fields.values, &b)),
					Bound::Unbounded => Bound::Unbounded,
				};
				Box::new(RangeQuery::new(as_term(to_term(low, open_low)), as_term(to_term(high, open_high))))
			}
			Node::And(nodes) => Self::boolean(nodes.iter().map(|n| (Occur::Must, n)), fields)?,
			Node::Or(nodes) => Self::boolean(nodes.iter().map(|n| (Occur::Should, n)), fields)?,
			Node::AndNot(l, r) => Self::boolean([(Occur::Must, &**l), (Occur::MustNot, &**r)].into_iter(), fields)?,
			Node::AndMaybe(l, r) => Self::boolean([(Occur::Must, &**l), (Occur::Should, &**r)].into_iter(), fields)?,
			Node::Filter(l, r) => Box::new(BooleanQuery::new(vec![
				(Occur::Must, l.to_tantivy(fields)?),
				(Occur::Must, Box::new(ConstScoreQuery::new(r.to_tantivy(fields)?, 0.0)) as Box<dyn Query>),
			])),
			Node::Scale(factor, inner) if *factor == 0.0 => Box::new(ConstScoreQuery::new(inner.to_tantivy(fields)?, 0.0)),
			Node::Scale(factor, inner) => Box::new(BoostQuery::new(inner.to_tantivy(fields)?, *factor)),
		})
	}

	fn boolean<'n>(clauses: impl Iterator<Item = (Occur, &'n Node)>, fields: &StoreFields) -> SearchResult<Box<dyn Query>> {
		let mut subqueries = Vec::new();
		for (occur, node) in clauses { subqueries.push((occur, node.to_tantivy(fields)?)); }
		Ok(Box::new(BooleanQuery::new(subqueries)))
	}
}

fn describe_bytes(bytes: &[u8]) -> String {
	match std::str::from_utf8(bytes) {
		Ok(text) if text.chars().all(|c| !c.is_control()) => text.to_string(),
		_ => bytes.iter().fold(String::from("0x"), |mut out, b| { out.push_str(&format!("{b:02x}")); out }),
	}
}

impl fmt::Display for Node {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let join = |f: &mut fmt::Formatter<'_>, nodes: &[Node], op: &str| -> fmt::Result {
			f.write_str("(")?;
			for (i, node) in nodes.iter().enumerate() {
				if i > 0 { write!(f, " {op} ")?; }
				write!(f, "{node}")?;
			}
			f.write_str(")")
		};
		let phrase = |f: &mut fmt::Formatter<'_>, terms: &[String], op: &str| -> fmt::Result {
			let sep = format!(" {op} {} ", terms.len());
			write!(f, "({})", terms.join(&sep))
		};
		match self {
			Node::All => f.write_str("<alldocuments>"),
			Node::Nothing => f.write_str("<nothing>"),
			Node::Term(t) | Node::Identifier(t) => f.write_str(t),
			Node::Kind(k) => write!(f, "CONTENTTYPE{k}"),
			Node::Phrase(terms) => phrase(f, terms, "PHRASE"),
			Node::PhrasePrefix(terms) => phrase(f, terms, "PHRASE_PREFIX"),
			Node::Wildcard(prefix) => write!(f, "WILDCARD {prefix}*"),
			Node::ValueRange { column, low, high } => match (low, high) {
				(Bound::Unbounded, Bound::Included(h)) => write!(f, "VALUE_LE {column} {}", describe_bytes(h)),
				(Bound::Included(l), Bound::Unbounded) => write!(f, "VALUE_GE {column} {}", describe_bytes(l)),
				_ => {
					let end = |b: &Bound<Vec<u8>>| match b { Bound::Included(v) | Bound::Excluded(v) => describe_bytes(v), Bound::Unbounded => "*".to_string() };
					write!(f, "VALUE_RANGE {column} {} {}", end(low), end(high))
				}
			},
			Node::And(nodes) => join(f, nodes, "AND"),
			Node::Or(nodes) => join(f, nodes, "OR"),
			Node::AndNot(l, r) => write!(f, "({l} AND_NOT {r})"),
			Node::AndMaybe(l, r) => write!(f, "({l} AND_MAYBE {r})"),
			Node::Filter(l, r) => write!(f, "({l} FILTER {r})"),
			Node::Scale(factor, inner) => write!(f, "{factor} * {inner}"),
		}
	}
}
