use std::ops::Bound;

use tantivy::schema::{BytesOptions, Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED, STRING};

use crate::error::SearchResult;

pub const ID_FIELD: &str = "_id";
pub const KIND_FIELD: &str = "_kind";
pub const TERMS_FIELD: &str = "_terms";
pub const VALUES_FIELD: &str = "_values";
pub const DATA_FIELD: &str = "_data";

/// Text values longer than this are cut (on a char boundary) before they go into a value column.
pub const MAX_VALUE_TERM_BYTES: usize = 1024;

/// Physical layout shared by every store, whatever kinds it holds.
pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	schema_builder.add_text_field(ID_FIELD, STRING | STORED);
	schema_builder.add_text_field(KIND_FIELD, STRING | STORED);
	// tokens arrive pre-generated, the tokenizer name is never used
	let terms_indexing = TextFieldIndexing::default().set_tokenizer("raw").set_index_option(IndexRecordOption::WithFreqsAndPositions);
	schema_builder.add_text_field(TERMS_FIELD, TextOptions::default().set_indexing_options(terms_indexing));
	schema_builder.add_bytes_field(VALUES_FIELD, BytesOptions::default().set_indexed().set_stored());
	schema_builder.add_bytes_field(DATA_FIELD, BytesOptions::default().set_stored());
	schema_builder.build()
}

#[derive(Debug, Clone, Copy)]
pub struct StoreFields {
	pub id: Field,
	pub kind: Field,
	pub terms: Field,
	pub values: Field,
	pub data: Field,
}

impl StoreFields {
	pub fn from_schema(schema: &Schema) -> SearchResult<Self> {
		Ok(Self {
			id: schema.get_field(ID_FIELD)?,
			kind: schema.get_field(KIND_FIELD)?,
			terms: schema.get_field(TERMS_FIELD)?,
			values: schema.get_field(VALUES_FIELD)?,
			data: schema.get_field(DATA_FIELD)?,
		})
	}
}

/// `column` as 4 big-endian bytes followed by the encoded value.
pub fn value_term(column: u32, encoded: &[u8]) -> Vec<u8> {
	let mut out = Vec::with_capacity(4 + encoded.len());
	out.extend_from_slice(&column.to_be_bytes());
	out.extend_from_slice(encoded);
	out
}

/// Inverse of [`value_term`].
pub fn split_value_term(bytes: &[u8]) -> Option<(u32, &[u8])> {
	if bytes.len() < 4 { return None; }
	let (head, rest) = bytes.split_at(4);
	let column = u32::from_be_bytes([head[0], head[1], head[2], head[3]]);
	Some((column, rest))
}

/// Smallest and just-past-largest keys of a column, for ranges left open.
pub fn column_bounds(column: u32) -> (Bound<Vec<u8>>, Bound<Vec<u8>>) {
	let low = Bound::Included(column.to_be_bytes().to_vec());
	let high = match column.checked_add(1) { Some(next) => Bound::Excluded(next.to_be_bytes().to_vec()), None => Bound::Unbounded };
	(low, high)
}

pub fn truncate_text_value(mut encoded: Vec<u8>) -> Vec<u8> {
	if encoded.len() <= MAX_VALUE_TERM_BYTES { return encoded; }
	let mut cut = MAX_VALUE_TERM_BYTES;
	// utf-8 continuation bytes are 0b10xxxxxx
	while cut > 0 && (encoded[cut] & 0xC0) == 0x80 { cut -= 1; }
	encoded.truncate(cut);
	encoded
}
