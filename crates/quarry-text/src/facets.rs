//! Facet tables computed from the value columns of every match.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Duration, Months, NaiveDateTime};

use quarry_core::codec;
use quarry_core::request::{DateFacet, GapUnit};
use quarry_core::{Error, FieldValue, Schema};

use crate::compiler::QueryCompiler;
use crate::error::SearchResult;
use crate::query::Node;

/// Value columns of one matched document.
pub type Columns = BTreeMap<u32, Vec<Vec<u8>>>;

/// Count, per requested field, how many documents hold each distinct value.
/// Largest counts first, equal counts in value order.
pub fn field_facets(schema: &Schema, facets: &[String], docs: &[&Columns]) -> SearchResult<BTreeMap<String, Vec<(FieldValue, u64)>>> {
	let mut out = BTreeMap::new();
	for name in facets {
		let field = schema.require(name)?;
		let mut counts: BTreeMap<&[u8], u64> = BTreeMap::new();
		for doc in docs {
			let Some(values) = doc.get(&field.column) else { continue };
			let distinct: BTreeSet<&[u8]> = values.iter().map(Vec::as_slice).collect();
			for value in distinct { *counts.entry(value).or_default() += 1; }
		}
		let mut table = Vec::with_capacity(counts.len());
		for (encoded, count) in counts {
			table.push((codec::decode(encoded, field.field_type)?, count));
		}
		// stable sort keeps value order among equal counts
		table.sort_by(|a, b| b.1.cmp(&a.1));
		out.insert(name.clone(), table);
	}
	Ok(out)
}

fn step(at: NaiveDateTime, gap: GapUnit, amount: u32) -> Option<NaiveDateTime> {
	let amount_i64 = i64::from(amount);
	match gap {
		GapUnit::Year => at.checked_add_months(Months::new(amount.checked_mul(12)?)),
		GapUnit::Month => at.checked_add_months(Months::new(amount)),
		GapUnit::Day => at.checked_add_signed(Duration::days(amount_i64)),
		GapUnit::Hour => at.checked_add_signed(Duration::hours(amount_i64)),
		GapUnit::Minute => at.checked_add_signed(Duration::minutes(amount_i64)),
		GapUnit::Second => at.checked_add_signed(Duration::seconds(amount_i64)),
	}
}

/// Bucket starts from `start` up to (not including) `end`.
fn bucket_starts(facet: &DateFacet) -> SearchResult<Vec<NaiveDateTime>> {
	if facet.amount == 0 { return Err(Error::Query("date facet gap amount must be positive".into()).into()); }
	let mut starts = Vec::new();
	let mut at = facet.start;
	while at < facet.end {
		starts.push(at);
		match step(at, facet.gap, facet.amount) {
			Some(next) => at = next,
			None => break,
		}
	}
	Ok(starts)
}

/// Count documents per date bucket. Buckets come out latest first, empty ones included.
pub fn date_facets(schema: &Schema, requests: &BTreeMap<String, DateFacet>, docs: &[&Columns]) -> SearchResult<BTreeMap<String, Vec<(NaiveDateTime, u64)>>> {
	let mut out = BTreeMap::new();
	for (name, facet) in requests {
		let field = schema.require(name)?;
		if !field.field_type.is_temporal() {
			return Err(Error::Query(format!("date facet on '{name}', which holds {} values", field.field_type)).into());
		}
		let starts = bucket_starts(facet)?;
		let mut counts = vec![0u64; starts.len()];
		for doc in docs {
			let Some(values) = doc.get(&field.column) else { continue };
			let mut hit = BTreeSet::new();
			for encoded in values {
				let Some(at) = codec::decode(encoded, field.field_type)?.as_datetime() else { continue };
				if at < facet.start || at >= facet.end { continue; }
				// last bucket whose start is not after the value
				let bucket = starts.partition_point(|s| *s <= at);
				if bucket > 0 { hit.insert(bucket - 1); }
			}
			for bucket in hit { counts[bucket] += 1; }
		}
		let table: Vec<(NaiveDateTime, u64)> = starts.into_iter().zip(counts).rev().collect();
		out.insert(name.clone(), table);
	}
	Ok(out)
}

/// The filter for one query facet: the text as a `field:` clause of the free-text syntax.
pub(crate) fn query_facet_node(compiler: &QueryCompiler<'_>, field: &str, text: &str) -> SearchResult<Node> {
	compiler.schema().require(field)?;
	let clause = if text.contains(char::is_whitespace) { format!("{field}:\"{text}\"") } else { format!("{field}:{text}") };
	compiler.parse_text(&clause)
}
