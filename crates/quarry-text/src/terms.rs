//! Term generation.
//!
//! Every indexed value is written twice into the `_terms` field: once
//! unprefixed for free-text search and once under the field prefix
//! (`X` + upper-cased field name) between `^` and `$` boundary markers.
//! Text words also get a stemmed twin, prefixed with `Z`, at the same
//! position. Positions jump by a fixed gap between runs so phrases never
//! span two values.

use rust_stemmers::{Algorithm, Stemmer};
use tantivy::tokenizer::{LowerCaser, PreTokenizedString, SimpleTokenizer, TextAnalyzer, Token, TokenStream};

use quarry_core::schema::SchemaField;
use quarry_core::{Error, FieldType, FieldValue};

use crate::error::SearchResult;

pub const STEM_PREFIX: &str = "Z";
const FIELD_PREFIX: &str = "X";
const BEGIN_MARKER: &str = "^";
const END_MARKER: &str = "$";
const RUN_GAP: usize = 100;

pub fn field_prefix(field_name: &str) -> String {
	format!("{FIELD_PREFIX}{}", field_name.to_uppercase())
}

pub fn begin_marker(prefix: &str) -> String { format!("{prefix}{BEGIN_MARKER}") }

pub fn end_marker(prefix: &str) -> String { format!("{prefix}{END_MARKER}") }

/// Unprefixed terms start with a lowercase letter or a digit; prefixes are upper case.
pub fn is_unprefixed(term: &str) -> bool {
	term.chars().next().is_some_and(|c| !c.is_ascii_uppercase())
}

fn stemming_algorithm(language: &str) -> SearchResult<Option<Algorithm>> {
	let algorithm = match language.to_ascii_lowercase().as_str() {
		"" | "none" => return Ok(None),
		"arabic" => Algorithm::Arabic,
		"danish" | "da" => Algorithm::Danish,
		"dutch" | "nl" => Algorithm::Dutch,
		"english" | "en" => Algorithm::English,
		"finnish" | "fi" => Algorithm::Finnish,
		"french" | "fr" => Algorithm::French,
		"german" | "de" => Algorithm::German,
		"greek" | "el" => Algorithm::Greek,
		"hungarian" | "hu" => Algorithm::Hungarian,
		"italian" | "it" => Algorithm::Italian,
		"norwegian" | "no" => Algorithm::Norwegian,
		"portuguese" | "pt" => Algorithm::Portuguese,
		"romanian" | "ro" => Algorithm::Romanian,
		"russian" | "ru" => Algorithm::Russian,
		"spanish" | "es" => Algorithm::Spanish,
		"swedish" | "sv" => Algorithm::Swedish,
		"tamil" | "ta" => Algorithm::Tamil,
		"turkish" | "tr" => Algorithm::Turkish,
		other => return Err(Error::Configuration(format!("unsupported stemming language '{other}'")).into()),
	};
	Ok(Some(algorithm))
}

/// Splits values into lowercase words and stems them.
pub struct Analyzer {
	tokenizer: TextAnalyzer,
	stemmer: Option<Stemmer>,
}

impl Analyzer {
	pub fn new(language: &str) -> SearchResult<Self> {
		let tokenizer = TextAnalyzer::builder(SimpleTokenizer::default()).filter(LowerCaser).build();
		let stemmer = stemming_algorithm(language)?.map(Stemmer::create);
		Ok(Self { tokenizer, stemmer })
	}

	pub fn words(&self, text: &str) -> Vec<String> {
		let mut tokenizer = self.tokenizer.clone();
		let mut stream = tokenizer.token_stream(text);
		let mut words = Vec::new();
		while stream.advance() { words.push(stream.token().text.clone()); }
		words
	}

	/// Words for one scalar value. Non-text values stay whole: numbers and
	/// booleans as written, dates as `YYYY-MM-DD`, datetimes as date then `hh:mm:ss`.
	pub fn value_words(&self, value: &FieldValue) -> Vec<String> {
		match value {
			FieldValue::Text(text) => self.words(text),
			FieldValue::DateTime(dt) => vec![dt.format("%Y-%m-%d").to_string(), dt.format("%H:%M:%S").to_string()],
			FieldValue::List(items) => items.iter().flat_map(|item| self.value_words(item)).collect(),
			other => vec![other.to_string().to_lowercase()],
		}
	}

	pub fn stem(&self, word: &str) -> Option<String> {
		self.stemmer.as_ref().map(|s| s.stem(word).into_owned())
	}

	pub fn stems(&self) -> bool { self.stemmer.is_some() }
}

/// Accumulates the positioned terms of one document.
pub struct TermGenerator<'a> {
	analyzer: &'a Analyzer,
	tokens: Vec<Token>,
	position: usize,
}

impl<'a> TermGenerator<'a> {
	pub fn new(analyzer: &'a Analyzer) -> Self {
		Self { analyzer, tokens: Vec::new(), position: 0 }
	}

	/// Index every element of `value` for `field`.
	pub fn index_field(&mut self, field: &SchemaField, value: &FieldValue) {
		let prefix = field_prefix(&field.field_name);
		let stem = field.field_type == FieldType::Text && self.analyzer.stems();
		for element in value.elements() {
			let words = self.analyzer.value_words(element);
			self.push_run("", &words, stem, false);
			self.push_run(&prefix, &words, stem, true);
		}
	}

	fn push_run(&mut self, prefix: &str, words: &[String], stem: bool, bounded: bool) {
		if bounded { self.push(begin_marker(prefix)); self.position += 1; }
		for word in words {
			self.push(format!("{prefix}{word}"));
			if stem {
				if let Some(stemmed) = self.analyzer.stem(word) { self.push(format!("{STEM_PREFIX}{prefix}{stemmed}")); }
			}
			self.position += 1;
		}
		if bounded { self.push(end_marker(prefix)); self.position += 1; }
		self.position += RUN_GAP;
	}

	fn push(&mut self, text: String) {
		self.tokens.push(Token { offset_from: 0, offset_to: 0, position: self.position, text, position_length: 1 });
	}

	pub fn terms(&self) -> impl Iterator<Item = &str> {
		self.tokens.iter().map(|t| t.text.as_str())
	}

	pub fn into_pre_tokenized(self) -> PreTokenizedString {
		PreTokenizedString { text: String::new(), tokens: self.tokens }
	}
}
