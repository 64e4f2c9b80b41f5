//! On-disk store: opening snapshots for reading and sessions for writing.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tantivy::directory::error::LockError;
use tantivy::directory::MmapDirectory;
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, Searcher, TantivyError};
use tracing::{debug, warn};

use quarry_core::config::BackendSettings;
use quarry_core::Schema;

use crate::error::{SearchError, SearchResult};
use crate::tantivy_utils::{build_schema, StoreFields};

/// A point-in-time view of the store together with the schema it was written with.
pub struct Snapshot {
	pub searcher: Searcher,
	pub fields: StoreFields,
	pub schema: Schema,
}

/// An open writer. Holding it holds the store's single writer lock.
pub struct WriteSession {
	pub writer: IndexWriter,
	pub fields: StoreFields,
	pub schema: Schema,
}

impl WriteSession {
	/// Commit everything written so far and persist the schema with it.
	pub fn commit(mut self) -> SearchResult<()> {
		let payload = self.schema.to_json()?;
		{
			let mut prepared = self.writer.prepare_commit()?;
			prepared.set_payload(&payload);
			prepared.commit()?;
		}
		self.writer.wait_merging_threads()?;
		Ok(())
	}
}

#[derive(Debug, Clone)]
pub struct Store {
	path: PathBuf,
	writer_heap_size: usize,
	lock_retries: u32,
	lock_backoff: Duration,
}

impl Store {
	pub fn new(path: PathBuf, settings: &BackendSettings) -> Self {
		Self {
			path,
			writer_heap_size: settings.writer_heap_size,
			lock_retries: settings.lock_retries.max(1),
			lock_backoff: Duration::from_millis(settings.lock_backoff_ms),
		}
	}

	pub fn path(&self) -> &Path { &self.path }

	pub fn exists(&self) -> bool { self.path.join("meta.json").exists() }

	/// `Ok(None)` when nothing was ever written here.
	pub fn open_read(&self) -> SearchResult<Option<Snapshot>> {
		if !self.exists() { return Ok(None); }
		let index = Index::open_in_dir(&self.path)?;
		let payload = index.load_metas()?.payload.ok_or_else(|| SearchError::UninitializedIndex(self.path.clone()))?;
		let schema = Schema::from_json(&payload)?;
		let fields = StoreFields::from_schema(&index.schema())?;
		let reader: IndexReader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;
		Ok(Some(Snapshot { searcher: reader.searcher(), fields, schema }))
	}

	/// Persisted schema without opening a searcher.
	pub fn load_schema(&self) -> SearchResult<Option<Schema>> {
		if !self.exists() { return Ok(None); }
		let index = Index::open_in_dir(&self.path)?;
		match index.load_metas()?.payload {
			Some(payload) => Ok(Some(Schema::from_json(&payload)?)),
			None => Err(SearchError::UninitializedIndex(self.path.clone())),
		}
	}

	/// Open the store for writing with `schema`, creating it if needed.
	pub fn open_write(&self, schema: Schema) -> SearchResult<WriteSession> {
		std::fs::create_dir_all(&self.path)?;
		let directory = MmapDirectory::open(&self.path)?;
		let index = Index::open_or_create(directory, build_schema())?;
		let fields = StoreFields::from_schema(&index.schema())?;
		let writer = self.acquire_writer(&index)?;
		Ok(WriteSession { writer, fields, schema })
	}

	/// A busy lock is retried with doubling delays before giving up.
	fn acquire_writer(&self, index: &Index) -> SearchResult<IndexWriter> {
		let mut delay = self.lock_backoff;
		for attempt in 1..=self.lock_retries {
			match index.writer_with_num_threads(1, self.writer_heap_size) {
				Ok(writer) => return Ok(writer),
				Err(TantivyError::LockFailure(LockError::LockBusy, _)) if attempt < self.lock_retries => {
					warn!(path = %self.path.display(), attempt, delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX), "index writer lock busy, retrying");
					thread::sleep(delay);
					delay = delay.saturating_mul(2);
				}
				Err(TantivyError::LockFailure(LockError::LockBusy, _)) => break,
				Err(err) => return Err(err.into()),
			}
		}
		Err(SearchError::StoreLocked { attempts: self.lock_retries })
	}

	pub fn delete(&self) -> SearchResult<()> {
		if self.path.exists() {
			std::fs::remove_dir_all(&self.path)?;
			debug!(path = %self.path.display(), "deleted index directory");
		}
		Ok(())
	}
}
