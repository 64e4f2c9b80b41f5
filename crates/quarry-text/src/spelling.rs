//! Spelling suggestions from the unprefixed vocabulary of the store.

use std::collections::BTreeMap;

use levenshtein_automata::{Distance, LevenshteinAutomatonBuilder};
use tantivy::schema::Field;
use tantivy::{Searcher, Term};
use tracing::debug;

use crate::error::SearchResult;
use crate::terms::is_unprefixed;

const MAX_EDIT_DISTANCE: u8 = 2;

/// Words the query syntax reserves; never corrected.
const OPERATORS: [&str; 3] = ["AND", "OR", "NOT"];

pub struct SpellingCorrector<'s> {
	searcher: &'s Searcher,
	field: Field,
	builder: LevenshteinAutomatonBuilder,
}

impl<'s> SpellingCorrector<'s> {
	pub fn new(searcher: &'s Searcher, field: Field) -> Self {
		Self { searcher, field, builder: LevenshteinAutomatonBuilder::new(MAX_EDIT_DISTANCE, true) }
	}

	fn frequency(&self, word: &str) -> SearchResult<u64> {
		Ok(self.searcher.doc_freq(&Term::from_field_text(self.field, word))?)
	}

	/// Closest indexed word within two edits. Closer wins, then the more frequent, then the alphabetically first.
	pub fn suggest(&self, word: &str) -> SearchResult<Option<String>> {
		let dfa = self.builder.build_dfa(word);
		let mut candidates: BTreeMap<String, (u8, u64)> = BTreeMap::new();
		for segment_reader in self.searcher.segment_readers() {
			let inverted_index = segment_reader.inverted_index(self.field)?;
			let mut stream = inverted_index.terms().stream()?;
			while stream.advance() {
				let Ok(term) = std::str::from_utf8(stream.key()) else { continue };
				if !is_unprefixed(term) || term == word { continue; }
				let mut state = dfa.initial_state();
				for &byte in term.as_bytes() { state = dfa.transition(state, byte); }
				if let Distance::Exact(distance) = dfa.distance(state) {
					let entry = candidates.entry(term.to_string()).or_insert((distance, 0));
					entry.1 += u64::from(stream.value().doc_freq);
				}
			}
		}
		let best = candidates
			.into_iter()
			.min_by(|(a_term, (a_dist, a_freq)), (b_term, (b_dist, b_freq))| a_dist.cmp(b_dist).then(b_freq.cmp(a_freq)).then(a_term.cmp(b_term)))
			.map(|(term, _)| term);
		Ok(best)
	}

	/// Replace every unknown plain word of `text` by its suggestion.
	/// `None` when nothing changed.
	pub fn correct_query(&self, text: &str) -> SearchResult<Option<String>> {
		let mut changed = false;
		let mut pieces = Vec::new();
		for piece in text.split_whitespace() {
			let core = piece.trim_start_matches(['+', '-', '(', '"']).trim_end_matches([')', '"']);
			let plain = !core.is_empty() && !OPERATORS.contains(&core) && core.chars().all(char::is_alphanumeric);
			if !plain { pieces.push(piece.to_string()); continue; }
			let word = core.to_lowercase();
			if self.frequency(&word)? > 0 { pieces.push(piece.to_string()); continue; }
			match self.suggest(&word)? {
				Some(suggestion) => {
					debug!(word = %word, suggestion = %suggestion, "spelling correction");
					pieces.push(piece.replacen(core, &suggestion, 1));
					changed = true;
				}
				None => pieces.push(piece.to_string()),
			}
		}
		Ok(changed.then(|| pieces.join(" ")))
	}
}
