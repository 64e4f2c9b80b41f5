//! Free-text query strings.
//!
//! Grammar: bare words, `"quoted phrases"`, `field:value`, `field:"phrase"`,
//! ranges `field:low..high` (either end may be empty or `*`), trailing
//! wildcards `word*`, `kind:<kind>`, `+`/`-` modifiers, parentheses and the
//! case-sensitive operators `AND`, `OR`, `NOT`. Adjacent clauses combine with
//! OR; ranges and kind clauses only filter.

use quarry_core::schema::CONTENT_FIELD;
use quarry_core::{Error, FieldValue};

use crate::compiler::{CompiledQuery, QueryCompiler};
use crate::error::SearchResult;
use crate::query::{Node, QueryNode};
use crate::spelling::SpellingCorrector;
use crate::terms::field_prefix;

/// Pseudo-field restricting matches to one kind, unless the schema defines a field of that name.
const KIND_FIELD: &str = "kind";

#[derive(Debug, Clone, PartialEq)]
enum Lexeme {
	Open,
	Close,
	And,
	Or,
	Not,
	Plus,
	Minus,
	Phrase(Option<String>, String),
	Word(String),
}

fn lex(text: &str) -> Vec<Lexeme> {
	let chars: Vec<char> = text.chars().collect();
	let mut out = Vec::new();
	let mut i = 0;
	let read_phrase = |i: &mut usize| -> String {
		let start = *i;
		while *i < chars.len() && chars[*i] != '"' { *i += 1; }
		let phrase: String = chars[start..*i].iter().collect();
		*i += 1;
		phrase
	};
	while i < chars.len() {
		let c = chars[i];
		let next_is_word = chars.get(i + 1).is_some_and(|n| !n.is_whitespace());
		match c {
			c if c.is_whitespace() => i += 1,
			'(' => { out.push(Lexeme::Open); i += 1; }
			')' => { out.push(Lexeme::Close); i += 1; }
			'+' if next_is_word => { out.push(Lexeme::Plus); i += 1; }
			'-' if next_is_word => { out.push(Lexeme::Minus); i += 1; }
			'"' => { i += 1; out.push(Lexeme::Phrase(None, read_phrase(&mut i))); }
			_ => {
				let start = i;
				while i < chars.len() && !chars[i].is_whitespace() && !matches!(chars[i], '(' | ')' | '"') { i += 1; }
				let word: String = chars[start..i].iter().collect();
				if word.ends_with(':') && chars.get(i) == Some(&'"') {
					i += 1;
					let field = word.trim_end_matches(':').to_string();
					out.push(Lexeme::Phrase(Some(field), read_phrase(&mut i)));
					continue;
				}
				out.push(match word.as_str() {
					"AND" => Lexeme::And,
					"OR" => Lexeme::Or,
					"NOT" => Lexeme::Not,
					_ => Lexeme::Word(word),
				});
			}
		}
	}
	out
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mode {
	Should,
	Must,
	MustNot,
}

enum Unit {
	Scored(Node),
	Filter(Node),
}

struct Parser<'p, 'a> {
	compiler: &'p QueryCompiler<'a>,
	lexemes: Vec<Lexeme>,
	pos: usize,
}

impl<'p, 'a> Parser<'p, 'a> {
	fn peek(&self) -> Option<&Lexeme> { self.lexemes.get(self.pos) }

	fn parse_or(&mut self) -> SearchResult<Node> {
		let mut branches = vec![self.parse_and()?];
		while self.peek() == Some(&Lexeme::Or) {
			self.pos += 1;
			branches.push(self.parse_and()?);
		}
		Ok(Node::or(branches))
	}

	fn parse_and(&mut self) -> SearchResult<Node> {
		let mut clauses: Vec<(Mode, Unit)> = Vec::new();
		let mut pending: Option<Mode> = None;
		while let Some(lexeme) = self.peek().cloned() {
			match lexeme {
				Lexeme::Or | Lexeme::Close => break,
				Lexeme::And => {
					self.pos += 1;
					if let Some((mode @ Mode::Should, _)) = clauses.last_mut() { *mode = Mode::Must; }
					pending = Some(Mode::Must);
				}
				Lexeme::Not | Lexeme::Minus => { self.pos += 1; pending = Some(Mode::MustNot); }
				Lexeme::Plus => { self.pos += 1; pending = Some(Mode::Must); }
				_ => {
					let unit = self.parse_primary()?;
					if let Some(unit) = unit { clauses.push((pending.unwrap_or(Mode::Should), unit)); }
					pending = None;
				}
			}
		}
		if clauses.is_empty() { return Ok(Node::Nothing); }
		let (mut must, mut should, mut must_not, mut filters) = (Vec::new(), Vec::new(), Vec::new(), Vec::new());
		for (mode, unit) in clauses {
			match (mode, unit) {
				(Mode::MustNot, Unit::Scored(n) | Unit::Filter(n)) => must_not.push(n),
				(_, Unit::Filter(n)) => filters.push(n),
				(Mode::Must, Unit::Scored(n)) => must.push(n),
				(Mode::Should, Unit::Scored(n)) => should.push(n),
			}
		}
		let mut node = match (must.is_empty(), should.is_empty()) {
			(false, true) => Node::and(must),
			(false, false) => Node::and_maybe(Node::and(must), Node::or(should)),
			(true, false) => Node::or(should),
			(true, true) => Node::All,
		};
		if !filters.is_empty() { node = Node::filter(node, Node::and(filters)); }
		if !must_not.is_empty() { node = Node::and_not(node, Node::or(must_not)); }
		Ok(node)
	}

	fn parse_primary(&mut self) -> SearchResult<Option<Unit>> {
		let Some(lexeme) = self.lexemes.get(self.pos).cloned() else { return Ok(None) };
		self.pos += 1;
		match lexeme {
			Lexeme::Open => {
				let inner = self.parse_or()?;
				if self.peek() == Some(&Lexeme::Close) { self.pos += 1; }
				Ok(Some(Unit::Scored(inner)))
			}
			Lexeme::Phrase(field, text) => Ok(Some(Unit::Scored(self.phrase(field.as_deref(), &text)))),
			Lexeme::Word(word) => self.word(&word),
			other => Err(Error::Query(format!("unexpected {other:?} in query")).into()),
		}
	}

	fn phrase(&self, field: Option<&str>, text: &str) -> Node {
		let words = self.compiler.analyzer().words(text);
		let prefix = match field.and_then(|f| self.compiler.schema().field(f)) {
			Some(f) => field_prefix(&f.field_name),
			None => String::new(),
		};
		Node::phrase(words.iter().map(|w| format!("{prefix}{w}")).collect())
	}

	fn word(&self, word: &str) -> SearchResult<Option<Unit>> {
		if word == "*" { return Ok(Some(Unit::Scored(Node::All))); }
		if let Some((field, rest)) = word.split_once(':') {
			if let Some(schema_field) = self.compiler.schema().field(field) {
				let schema_field = schema_field.clone();
				if let Some((low, high)) = rest.split_once("..") {
					let literal = |s: &str| -> SearchResult<Option<FieldValue>> {
						if s.is_empty() || s == "*" { return Ok(None); }
						Ok(Some(FieldValue::parse(s, schema_field.field_type)?))
					};
					let (low, high) = (literal(low)?, literal(high)?);
					let range = self.compiler.value_range(&schema_field, low.as_ref(), high.as_ref())?;
					return Ok(Some(Unit::Filter(range)));
				}
				let prefix = field_prefix(&schema_field.field_name);
				if let Some(stem) = rest.strip_suffix('*') {
					return Ok(Some(Unit::Scored(Node::Wildcard(format!("{prefix}{}", stem.to_lowercase())))));
				}
				let ty = schema_field.field_type;
				let words = if !ty.is_exact_only() {
					self.compiler.analyzer().words(rest)
				} else if ty.is_temporal() {
					vec![rest.to_lowercase()]
				} else {
					// numbers and booleans match in the spelling they were indexed with
					vec![FieldValue::parse(rest, ty).map_or_else(|_| rest.to_lowercase(), |v| v.to_string().to_lowercase())]
				};
				let stem = !schema_field.field_type.is_exact_only();
				return Ok(match words.as_slice() {
					[] => None,
					[single] => Some(Unit::Scored(self.compiler.word(&prefix, single, stem))),
					_ => Some(Unit::Scored(Node::phrase(words.iter().map(|w| format!("{prefix}{w}")).collect()))),
				});
			}
			if field == KIND_FIELD && !rest.is_empty() {
				return Ok(Some(Unit::Filter(Node::Kind(rest.to_string()))));
			}
			if field == CONTENT_FIELD {
				return self.word(rest);
			}
			if rest.contains("..") {
				return Err(Error::InvalidField(field.to_string()).into());
			}
		}
		if let Some(stem) = word.strip_suffix('*') {
			let stem = stem.to_lowercase();
			return Ok(Some(Unit::Scored(if stem.is_empty() { Node::All } else { Node::Wildcard(stem) })));
		}
		let words = self.compiler.analyzer().words(word);
		Ok(match words.as_slice() {
			[] => None,
			[single] => Some(Unit::Scored(self.compiler.word("", single, true))),
			_ => Some(Unit::Scored(Node::phrase(words))),
		})
	}
}

impl QueryCompiler<'_> {
	/// Compile a free-text query, ANDing each narrow query on as a non-scoring filter.
	/// `*` alone matches everything.
	pub fn compile_string(&self, text: &str, narrow_queries: &[String], speller: Option<&SpellingCorrector<'_>>) -> SearchResult<CompiledQuery> {
		let mut node = self.parse_text(text)?;
		if !narrow_queries.is_empty() {
			let narrow = narrow_queries.iter().map(|q| self.parse_text(q)).collect::<SearchResult<Vec<_>>>()?;
			node = Node::filter(node, Node::and(narrow));
		}
		let spelling_suggestion = match speller {
			Some(speller) if text.trim() != "*" => speller.correct_query(text)?,
			_ => None,
		};
		Ok(CompiledQuery { query: QueryNode(node), spelling_suggestion })
	}

	pub(crate) fn parse_text(&self, text: &str) -> SearchResult<Node> {
		if text.trim() == "*" { return Ok(Node::All); }
		let mut parser = Parser { compiler: self, lexemes: lex(text), pos: 0 };
		let mut node = parser.parse_or()?;
		// stray closing parentheses start a new top-level group
		while parser.pos < parser.lexemes.len() {
			parser.pos += 1;
			node = Node::or(vec![node, parser.parse_or()?]);
		}
		Ok(node)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::terms::Analyzer;
	use quarry_core::{FieldDescriptor, FieldType, Schema};

	fn schema() -> Schema {
		Schema::build(&[
			FieldDescriptor::content("text"),
			FieldDescriptor::new("name", FieldType::Text),
			FieldDescriptor::new("value", FieldType::Long),
		])
		.expect("schema")
	}

	fn describe(text: &str) -> String {
		let schema = schema();
		let analyzer = Analyzer::new("english").expect("analyzer");
		QueryCompiler::new(&schema, &analyzer).compile_string(text, &[], None).expect("compile").query.to_string()
	}

	#[test]
	fn lexer_splits_operators_phrases_and_fields() {
		let lexemes = lex(r#"name:"david one" AND -foo (bar)"#);
		assert_eq!(
			lexemes,
			vec![
				Lexeme::Phrase(Some("name".into()), "david one".into()),
				Lexeme::And,
				Lexeme::Minus,
				Lexeme::Word("foo".into()),
				Lexeme::Open,
				Lexeme::Word("bar".into()),
				Lexeme::Close,
			]
		);
	}

	#[test]
	fn star_matches_everything() {
		assert_eq!(describe("*"), "Query(<alldocuments>)");
		assert_eq!(describe(" * "), "Query(<alldocuments>)");
	}

	#[test]
	fn bare_words_combine_with_or() {
		assert_eq!(describe("hello world"), "Query((Zhello OR hello OR Zworld OR world))");
		assert_eq!(describe("hello AND world"), "Query(((Zhello OR hello) AND (Zworld OR world)))");
	}

	#[test]
	fn not_subtracts() {
		assert_eq!(describe("NOT hello"), "Query((<alldocuments> AND_NOT (Zhello OR hello)))");
		assert_eq!(describe("index NOT name:david1"), "Query(((Zindex OR index) AND_NOT (ZXNAMEdavid1 OR XNAMEdavid1)))");
	}

	#[test]
	fn ranges_filter_without_scoring() {
		assert_eq!(describe("index name:david2..david3"), "Query(((Zindex OR index) FILTER VALUE_RANGE 1 david2 david3))");
		assert_eq!(describe("name:..david2"), "Query((<alldocuments> FILTER VALUE_LE 1 david2))");
		let err = QueryCompiler::new(&schema(), &Analyzer::new("english").expect("analyzer")).compile_string("nope:1..2", &[], None);
		assert!(err.is_err());
	}

	#[test]
	fn exact_only_values_use_their_indexed_spelling() {
		assert_eq!(describe("value:+010"), "Query(XVALUE10)");
		assert_eq!(describe("value:ten"), "Query(XVALUEten)");
	}

	#[test]
	fn wildcards_and_phrases() {
		assert_eq!(describe("name:da*"), "Query(WILDCARD XNAMEda*)");
		assert_eq!(describe("Ind*"), "Query(WILDCARD ind*)");
		assert_eq!(describe("\"hello world\""), "Query((hello PHRASE 2 world))");
	}

	#[test]
	fn narrow_queries_filter() {
		let schema = schema();
		let analyzer = Analyzer::new("english").expect("analyzer");
		let compiled = QueryCompiler::new(&schema, &analyzer).compile_string("*", &["name:david1".to_string()], None).expect("compile");
		assert_eq!(compiled.query.to_string(), "Query((<alldocuments> FILTER (ZXNAMEdavid1 OR XNAMEdavid1)))");
		assert!(compiled.spelling_suggestion.is_none());
	}
}
