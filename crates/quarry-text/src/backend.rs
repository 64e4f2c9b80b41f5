//! `SearchBackend`: one configured store plus the kinds registered for it.

use tracing::{debug, info, warn};

use quarry_core::config::{BackendSettings, Config};
use quarry_core::registry::IndexRegistry;
use quarry_core::request::{MoreLikeThis, QueryInput, SearchQuery};
use quarry_core::traits::SearchIndex;
use quarry_core::{Error, Identifier, Schema, SearchResponse};

use crate::compiler::{CompiledQuery, QueryCompiler};
use crate::error::{SearchError, SearchResult};
use crate::index::{Indexer, UpdateReport};
use crate::query::Node;
use crate::search::Executor;
use crate::similarity;
use crate::spelling::SpellingCorrector;
use crate::store::{Snapshot, Store};
use crate::terms::Analyzer;

pub struct SearchBackend {
	store: Store,
	registry: IndexRegistry,
	settings: BackendSettings,
	analyzer: Analyzer,
}

impl SearchBackend {
	pub fn new(settings: BackendSettings, registry: IndexRegistry) -> SearchResult<Self> {
		let path = settings.store_path()?;
		let analyzer = Analyzer::new(&settings.stemming_language)?;
		info!(path = %path.display(), language = %settings.stemming_language, kinds = ?registry.kinds(), "search backend ready");
		Ok(Self { store: Store::new(path, &settings), registry, settings, analyzer })
	}

	/// Build from the `[search]` section of a loaded configuration.
	pub fn from_config(config: &Config, registry: IndexRegistry) -> SearchResult<Self> {
		Self::new(config.backend_settings()?, registry)
	}

	pub fn settings(&self) -> &BackendSettings { &self.settings }

	pub fn registry(&self) -> &IndexRegistry { &self.registry }

	pub fn store(&self) -> &Store { &self.store }

	/// The schema the registry describes now, compared against the one in the store.
	fn live_schema(&self) -> SearchResult<Schema> {
		let schema = self.registry.build_schema()?;
		match self.store.load_schema() {
			Ok(Some(stored)) if stored.fingerprint() != schema.fingerprint() => {
				warn!(path = %self.store.path().display(), "registered fields differ from the stored schema; rebuild the index to reassign columns");
			}
			Ok(_) | Err(SearchError::UninitializedIndex(_)) => {}
			Err(err) => return Err(err),
		}
		Ok(schema)
	}

	/// Index or re-index `objects` of one registered kind in a single writer session.
	pub fn update<I: SearchIndex>(&self, index: &I, objects: &[I::Object]) -> SearchResult<UpdateReport> {
		if !self.registry.is_registered(index.kind()) {
			return Err(Error::UnindexedKind(index.kind().to_string()).into());
		}
		let session = self.store.open_write(self.live_schema()?)?;
		let mut indexer = Indexer::new(session, &self.analyzer);
		let report = indexer.update(index, objects)?;
		indexer.commit()?;
		Ok(report)
	}

	pub fn remove(&self, identifier: &Identifier) -> SearchResult<()> {
		let session = self.store.open_write(self.live_schema()?)?;
		let mut indexer = Indexer::new(session, &self.analyzer);
		indexer.remove(identifier);
		indexer.commit()
	}

	pub fn remove_object<I: SearchIndex>(&self, index: &I, object: &I::Object) -> SearchResult<()> {
		self.remove(&Identifier::new(index.kind(), index.pk(object)))
	}

	/// Remove every document, or only those of `kinds`.
	pub fn clear(&self, kinds: &[&str]) -> SearchResult<()> {
		let session = self.store.open_write(self.live_schema()?)?;
		let mut indexer = Indexer::new(session, &self.analyzer);
		indexer.clear(kinds)?;
		indexer.commit()
	}

	pub fn search(&self, request: &SearchQuery) -> SearchResult<SearchResponse> {
		let Some(snapshot) = self.store.open_read()? else {
			debug!(path = %self.store.path().display(), "no store yet, nothing to search");
			return Ok(SearchResponse::empty());
		};
		let compiler = QueryCompiler::new(&snapshot.schema, &self.analyzer);
		let Some(compiled) = self.compile_request(&snapshot, &compiler, request)? else { return Ok(SearchResponse::empty()) };
		debug!(query = %compiled.query, "compiled query");
		Executor::new(&snapshot, self.settings.max_results, &self.settings.highlight_tag).execute(&compiler, compiled, request)
	}

	/// `None` for an empty query string.
	fn compile_request(&self, snapshot: &Snapshot, compiler: &QueryCompiler<'_>, request: &SearchQuery) -> SearchResult<Option<CompiledQuery>> {
		let mut compiled = match &request.input {
			QueryInput::Text(text) if text.trim().is_empty() => return Ok(None),
			QueryInput::Text(text) => {
				let speller = self.settings.include_spelling.then(|| SpellingCorrector::new(&snapshot.searcher, snapshot.fields.terms));
				match (&request.spelling_query, &speller) {
					(Some(spelling_text), Some(speller)) => {
						let mut compiled = compiler.compile_string(text, &request.narrow_queries, None)?;
						compiled.spelling_suggestion = speller.correct_query(spelling_text)?;
						compiled
					}
					_ => compiler.compile_string(text, &request.narrow_queries, speller.as_ref())?,
				}
			}
			QueryInput::Filters(filters) => {
				let mut compiled = compiler.compile(filters, &[])?;
				if !request.narrow_queries.is_empty() {
					let narrow = request.narrow_queries.iter().map(|q| compiler.parse_text(q)).collect::<SearchResult<Vec<_>>>()?;
					compiled.query.0 = Node::filter(compiled.query.0, Node::and(narrow));
				}
				compiled
			}
		};
		let node = std::mem::replace(&mut compiled.query.0, Node::Nothing);
		compiled.query.0 = compiler.restrict_kinds(compiler.apply_boosts(node, &request.boosts), &request.kinds);
		Ok(Some(compiled))
	}

	/// Documents similar to the one indexed for `seed`.
	pub fn more_like_this(&self, seed: &Identifier, options: &MoreLikeThis) -> SearchResult<SearchResponse> {
		if !self.registry.is_registered(&seed.kind) {
			if options.silently_fail.unwrap_or(self.settings.silently_fail) {
				warn!(kind = %seed.kind, "more like this on an unregistered kind");
				return Ok(SearchResponse::empty());
			}
			return Err(Error::UnindexedKind(seed.kind.clone()).into());
		}
		let Some(snapshot) = self.store.open_read()? else { return Ok(SearchResponse::empty()) };
		let compiler = QueryCompiler::new(&snapshot.schema, &self.analyzer);
		let executor = Executor::new(&snapshot, self.settings.max_results, &self.settings.highlight_tag);
		similarity::more_like_this(&executor, &snapshot, &compiler, seed, options, self.settings.mlt_max_terms)
	}

	pub fn more_like_object<I: SearchIndex>(&self, index: &I, object: &I::Object, options: &MoreLikeThis) -> SearchResult<SearchResponse> {
		self.more_like_this(&Identifier::new(index.kind(), index.pk(object)), options)
	}

	/// Documents currently committed; 0 when the store does not exist.
	pub fn document_count(&self) -> SearchResult<u64> {
		Ok(self.store.open_read()?.map_or(0, |snapshot| snapshot.searcher.num_docs()))
	}

	/// Delete the store directory and everything in it.
	pub fn delete_index(&self) -> SearchResult<()> {
		self.store.delete()?;
		info!(path = %self.store.path().display(), "deleted index");
		Ok(())
	}

	/// The schema persisted with the last commit.
	pub fn load_schema(&self) -> SearchResult<Option<Schema>> { self.store.load_schema() }
}
