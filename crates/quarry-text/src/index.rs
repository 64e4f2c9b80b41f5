use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tantivy::schema::Value;
use tantivy::{TantivyDocument, Term};
use tracing::{info, warn};

use quarry_core::codec;
use quarry_core::traits::SearchIndex;
use quarry_core::{Error, FieldMap, FieldType, FieldValue, Identifier};

use crate::error::{SearchError, SearchResult};
use crate::store::WriteSession;
use crate::tantivy_utils::{truncate_text_value, value_term, StoreFields};
use crate::terms::{Analyzer, TermGenerator};

/// The serialized form kept in `_data`: enough to rebuild a result without the object store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredPayload {
	pub kind: String,
	pub pk: String,
	pub fields: FieldMap,
}

impl StoredPayload {
	pub fn identifier(&self) -> Identifier { Identifier::new(self.kind.clone(), self.pk.clone()) }

	pub fn from_document(doc: &TantivyDocument, fields: &StoreFields) -> SearchResult<Self> {
		let raw = doc.get_first(fields.data).and_then(|v| v.as_bytes()).ok_or_else(|| Error::encoding("document has no payload"))?;
		Ok(serde_json::from_slice(raw)?)
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateReport {
	pub indexed: usize,
	pub skipped: usize,
}

/// Writes documents through an open [`WriteSession`]. Nothing is visible until [`Indexer::commit`].
pub struct Indexer<'a> {
	session: WriteSession,
	analyzer: &'a Analyzer,
}

impl<'a> Indexer<'a> {
	pub fn new(session: WriteSession, analyzer: &'a Analyzer) -> Self {
		Self { session, analyzer }
	}

	/// Replace the document of every object. Objects that fail to encode are logged and skipped.
	pub fn update<I: SearchIndex>(&mut self, index: &I, objects: &[I::Object]) -> SearchResult<UpdateReport> {
		let stored: HashSet<String> = index.fields().into_iter().filter(|d| d.stored).map(|d| d.name).collect();
		let mut report = UpdateReport::default();
		for object in objects {
			let identifier = Identifier::new(index.kind(), index.pk(object));
			let built = index.prepare(object).map_err(SearchError::from).and_then(|prepared| self.build_document(&identifier, &prepared, &stored));
			match built {
				Ok(doc) => {
					self.session.writer.delete_term(self.identifier_term(&identifier));
					self.session.writer.add_document(doc)?;
					report.indexed += 1;
				}
				Err(err) if err.is_object_local() => {
					warn!(identifier = %identifier, error = %err, "skipping object that cannot be indexed");
					report.skipped += 1;
				}
				Err(err) => return Err(err),
			}
		}
		info!(kind = index.kind(), indexed = report.indexed, skipped = report.skipped, "updated documents");
		Ok(report)
	}

	/// Deleting an identifier that was never indexed is a no-op.
	pub fn remove(&mut self, identifier: &Identifier) {
		self.session.writer.delete_term(self.identifier_term(identifier));
		info!(identifier = %identifier, "removed document");
	}

	/// Drop every document, or only those of `kinds` when it is not empty.
	pub fn clear(&mut self, kinds: &[&str]) -> SearchResult<()> {
		if kinds.is_empty() {
			self.session.writer.delete_all_documents()?;
			info!("cleared all documents");
			return Ok(());
		}
		for kind in kinds {
			self.session.writer.delete_term(Term::from_field_text(self.session.fields.kind, kind));
		}
		info!(kinds = ?kinds, "cleared documents by kind");
		Ok(())
	}

	pub fn commit(self) -> SearchResult<()> { self.session.commit() }

	fn identifier_term(&self, identifier: &Identifier) -> Term {
		Term::from_field_text(self.session.fields.id, &identifier.term())
	}

	fn build_document(&self, identifier: &Identifier, prepared: &FieldMap, stored: &HashSet<String>) -> SearchResult<TantivyDocument> {
		let fields = self.session.fields;
		let mut generator = TermGenerator::new(self.analyzer);
		let mut doc = TantivyDocument::new();
		for field in self.session.schema.fields() {
			let Some(value) = prepared.get(&field.field_name) else { continue };
			if matches!(value, FieldValue::List(_)) && !field.multi_valued {
				return Err(Error::encoding(format!("field '{}' is not multi-valued", field.field_name)).into());
			}
			for encoded in codec::encode_all(value, field.field_type)? {
				let encoded = if field.field_type == FieldType::Text { truncate_text_value(encoded) } else { encoded };
				doc.add_bytes(fields.values, value_term(field.column, &encoded).as_slice());
			}
			generator.index_field(field, value);
		}
		let payload_fields: FieldMap = prepared.iter().filter(|(name, _)| stored.contains(*name)).map(|(k, v)| (k.clone(), v.clone())).collect();
		if let Some(name) = payload_fields.iter().find(|(_, v)| has_non_finite(v)).map(|(k, _)| k) {
			return Err(Error::encoding(format!("field '{name}' holds a non-finite float")).into());
		}
		let payload = StoredPayload { kind: identifier.kind.clone(), pk: identifier.pk.clone(), fields: payload_fields };
		doc.add_pre_tokenized_text(fields.terms, generator.into_pre_tokenized());
		doc.add_text(fields.id, identifier.term());
		doc.add_text(fields.kind, &identifier.kind);
		doc.add_bytes(fields.data, serde_json::to_vec(&payload)?.as_slice());
		Ok(doc)
	}
}

fn has_non_finite(value: &FieldValue) -> bool {
	match value {
		FieldValue::Float(v) => !v.is_finite(),
		FieldValue::List(items) => items.iter().any(has_non_finite),
		_ => false,
	}
}
