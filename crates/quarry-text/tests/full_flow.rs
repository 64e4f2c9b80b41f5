use std::path::Path;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use tempfile::TempDir;

use quarry_core::config::BackendSettings;
use quarry_core::filter::QueryFilter;
use quarry_core::registry::IndexRegistry;
use quarry_core::request::{DateFacet, GapUnit, MoreLikeThis, QueryInput, SearchQuery};
use quarry_core::traits::{IndexDefinition, SearchIndex};
use quarry_core::{Error, FieldDescriptor, FieldMap, FieldType, FieldValue, Identifier};
use quarry_text::{SearchBackend, SearchError};

const MOCK: &str = "core.mockmodel";
const NOTE: &str = "core.note";

#[derive(Debug, Clone)]
struct Mock {
	id: u32,
	name: &'static str,
	value: i64,
	pub_date: NaiveDateTime,
	text: &'static str,
	tags: Vec<&'static str>,
}

struct MockIndex;

impl IndexDefinition for MockIndex {
	fn kind(&self) -> &str { MOCK }

	fn fields(&self) -> Vec<FieldDescriptor> {
		vec![
			FieldDescriptor::content("text"),
			FieldDescriptor::new("name", FieldType::Text),
			FieldDescriptor::new("value", FieldType::Long),
			FieldDescriptor::new("pub_date", FieldType::DateTime),
			FieldDescriptor::new("tags", FieldType::Text).multi_valued(),
		]
	}
}

impl SearchIndex for MockIndex {
	type Object = Mock;

	fn pk(&self, object: &Mock) -> String { object.id.to_string() }

	fn prepare(&self, object: &Mock) -> quarry_core::Result<FieldMap> {
		if object.name.is_empty() { return Err(Error::encoding("mock without a name")); }
		let mut map = FieldMap::new();
		map.insert("text".into(), FieldValue::from(object.text));
		map.insert("name".into(), FieldValue::from(object.name));
		map.insert("value".into(), FieldValue::Long(object.value));
		map.insert("pub_date".into(), FieldValue::DateTime(object.pub_date));
		map.insert("tags".into(), FieldValue::List(object.tags.iter().map(|t| FieldValue::from(*t)).collect()));
		Ok(map)
	}
}

struct NoteIndex;

impl IndexDefinition for NoteIndex {
	fn kind(&self) -> &str { NOTE }

	fn fields(&self) -> Vec<FieldDescriptor> {
		vec![FieldDescriptor::content("text"), FieldDescriptor::new("name", FieldType::Text)]
	}
}

impl SearchIndex for NoteIndex {
	type Object = (u32, &'static str);

	fn pk(&self, object: &Self::Object) -> String { object.0.to_string() }

	fn prepare(&self, object: &Self::Object) -> quarry_core::Result<FieldMap> {
		let mut map = FieldMap::new();
		map.insert("text".into(), FieldValue::from(object.1));
		map.insert("name".into(), FieldValue::from(format!("note{}", object.0)));
		Ok(map)
	}
}

fn day(d: u32) -> NaiveDateTime {
	NaiveDate::from_ymd_opt(2009, 2, d).and_then(|d| d.and_hms_opt(0, 0, 0)).expect("date")
}

fn mocks() -> Vec<Mock> {
	vec![
		Mock { id: 1, name: "david1", value: 5, pub_date: day(24), text: "Indexed! Running through the fields", tags: vec!["a", "b"] },
		Mock { id: 2, name: "david2", value: 10, pub_date: day(23), text: "Indexed! Another runner walks", tags: vec!["b"] },
		Mock { id: 3, name: "david3", value: 15, pub_date: day(22), text: "Indexed! Something entirely different", tags: vec!["c"] },
	]
}

fn registry() -> IndexRegistry {
	IndexRegistry::new().with(Arc::new(MockIndex)).and_then(|r| r.with(Arc::new(NoteIndex))).expect("registry")
}

fn backend_at(path: &Path, settings: BackendSettings) -> SearchBackend {
	let settings = BackendSettings { path: Some(path.display().to_string()), lock_backoff_ms: 1, ..settings };
	SearchBackend::new(settings, registry()).expect("backend")
}

fn indexed(tmp: &TempDir) -> SearchBackend {
	let backend = backend_at(&tmp.path().join("index"), BackendSettings::default());
	let report = backend.update(&MockIndex, &mocks()).expect("update");
	assert_eq!(report.indexed, 3);
	backend
}

fn pks(backend: &SearchBackend, query: &SearchQuery) -> Vec<String> {
	backend.search(query).expect("search").pks().into_iter().map(str::to_string).collect()
}

fn filtered(key: &str, value: impl Into<FieldValue>) -> SearchQuery {
	SearchQuery::filtered(vec![QueryFilter::parse(key, value).expect("filter")])
}

#[test]
fn universal_query_sort_and_range() {
	let tmp = TempDir::new().expect("tmp");
	let backend = indexed(&tmp);

	let all = backend.search(&SearchQuery::text("*")).expect("search");
	assert_eq!(all.hits, 3);
	assert_eq!(all.pks(), vec!["1", "2", "3"]);
	assert_eq!(pks(&backend, &SearchQuery::all()), vec!["1", "2", "3"]);

	assert_eq!(pks(&backend, &SearchQuery::text("*").sort_by(["-value"])), vec!["3", "2", "1"]);
	assert_eq!(pks(&backend, &SearchQuery::text("*").sort_by(["pub_date"])), vec!["3", "2", "1"]);
	assert_eq!(pks(&backend, &SearchQuery::text("value:10..*")), vec!["2", "3"]);
	assert_eq!(pks(&backend, &SearchQuery::text("value:..10")), vec!["1", "2"]);
	assert_eq!(pks(&backend, &SearchQuery::text("*").sort_by(["value"]).with_offset(1).with_limit(1)), vec!["2"]);
}

#[test]
fn range_lookups_respect_inclusivity() {
	let tmp = TempDir::new().expect("tmp");
	let backend = indexed(&tmp);
	assert_eq!(pks(&backend, &filtered("value__gte", 10)), vec!["2", "3"]);
	assert_eq!(pks(&backend, &filtered("value__gt", 10)), vec!["3"]);
	assert_eq!(pks(&backend, &filtered("value__lte", 10)), vec!["1", "2"]);
	assert_eq!(pks(&backend, &filtered("value__lt", 10)), vec!["1"]);
	assert_eq!(pks(&backend, &SearchQuery::filtered(vec![QueryFilter::range("value", 5, 10)])), vec!["1", "2"]);
	let feb_23 = NaiveDate::from_ymd_opt(2009, 2, 23).expect("date");
	assert_eq!(pks(&backend, &filtered("pub_date__lte", feb_23)), vec!["2", "3"]);
	assert_eq!(pks(&backend, &filtered("name__gt", "david1")), vec!["2", "3"]);
}

#[test]
fn field_lookups_and_free_text() {
	let tmp = TempDir::new().expect("tmp");
	let backend = indexed(&tmp);
	assert_eq!(pks(&backend, &filtered("name", "david2")), vec!["2"]);
	assert_eq!(pks(&backend, &filtered("name__startswith", "david").sort_by(["value"])), vec!["1", "2", "3"]);
	assert_eq!(pks(&backend, &filtered("name__in", vec![FieldValue::from("david1"), FieldValue::from("david3")]).sort_by(["value"])), vec!["1", "3"]);
	assert_eq!(pks(&backend, &filtered("tags", "b").sort_by(["value"])), vec!["1", "2"]);
	assert_eq!(pks(&backend, &SearchQuery::filtered(vec![QueryFilter::parse("name", "david1").expect("filter").not()])), vec!["2", "3"]);
	assert_eq!(pks(&backend, &SearchQuery::text("indexed -david2")).len(), 2);
	assert_eq!(pks(&backend, &SearchQuery::text("name:david3")), vec!["3"]);
	assert_eq!(pks(&backend, &SearchQuery::text("\"another runner\"")), vec!["2"]);
	assert_eq!(pks(&backend, &SearchQuery::text("dav*").sort_by(["value"])), vec!["1", "2", "3"]);
	assert!(matches!(backend.search(&SearchQuery::text("nope:1..2")), Err(SearchError::Core(Error::InvalidField(_)))));
	assert_eq!(backend.search(&SearchQuery::text("   ")).expect("search").hits, 0);
}

#[test]
fn stemming_matches_inflected_forms() {
	let tmp = TempDir::new().expect("tmp");
	let backend = indexed(&tmp);
	assert_eq!(pks(&backend, &SearchQuery::text("run")), vec!["1"]);
	assert_eq!(pks(&backend, &SearchQuery::text("walking")), vec!["2"]);
	assert_eq!(pks(&backend, &SearchQuery::filtered(vec![QueryFilter::content("walked")])), vec!["2"]);
}

#[test]
fn updates_are_idempotent_and_removals_stick() {
	let tmp = TempDir::new().expect("tmp");
	let backend = indexed(&tmp);
	backend.update(&MockIndex, &mocks()).expect("second update");
	assert_eq!(backend.document_count().expect("count"), 3);

	backend.remove(&Identifier::new(MOCK, "2")).expect("remove");
	assert_eq!(pks(&backend, &SearchQuery::text("*")), vec!["1", "3"]);
	backend.remove(&Identifier::new(MOCK, "404")).expect("remove missing");
	assert_eq!(backend.document_count().expect("count"), 2);
}

#[test]
fn bad_objects_are_skipped() {
	let tmp = TempDir::new().expect("tmp");
	let backend = backend_at(&tmp.path().join("index"), BackendSettings::default());
	let mut objects = mocks();
	objects.push(Mock { id: 4, name: "", value: 0, pub_date: day(1), text: "broken", tags: Vec::new() });
	let report = backend.update(&MockIndex, &objects).expect("update");
	assert_eq!((report.indexed, report.skipped), (3, 1));
	assert_eq!(backend.document_count().expect("count"), 3);
}

#[test]
fn kinds_restrict_and_clear() {
	let tmp = TempDir::new().expect("tmp");
	let backend = indexed(&tmp);
	backend.update(&NoteIndex, &[(1, "Indexed note"), (2, "Another note")]).expect("notes");
	assert_eq!(backend.document_count().expect("count"), 5);

	let notes = backend.search(&SearchQuery::text("indexed").with_kind(NOTE)).expect("search");
	assert_eq!(notes.hits, 1);
	assert_eq!(notes.results[0].identifier, Identifier::new(NOTE, "1"));

	backend.clear(&[NOTE]).expect("clear notes");
	assert_eq!(backend.document_count().expect("count"), 3);
	backend.clear(&[]).expect("clear all");
	assert_eq!(backend.document_count().expect("count"), 0);
}

#[test]
fn facets_cover_every_match() {
	let tmp = TempDir::new().expect("tmp");
	let backend = indexed(&tmp);
	let request = SearchQuery::text("*")
		.with_limit(1)
		.with_facet("tags")
		.with_date_facet("pub_date", DateFacet::new(day(22), day(25), GapUnit::Day))
		.with_query_facet("name", "david1");
	let response = backend.search(&request).expect("search");
	assert_eq!(response.results.len(), 1);
	assert_eq!(response.facets.fields["tags"], vec![(FieldValue::from("b"), 2), (FieldValue::from("a"), 1), (FieldValue::from("c"), 1)]);
	assert_eq!(response.facets.dates["pub_date"], vec![(day(24), 1), (day(23), 1), (day(22), 1)]);
	assert_eq!(response.facets.queries["name"], ("david1".to_string(), 1));

	let unknown = backend.search(&SearchQuery::text("*").with_facet("missing"));
	assert!(matches!(unknown, Err(SearchError::Core(Error::InvalidField(_)))));
}

#[test]
fn boosts_and_narrowing() {
	let tmp = TempDir::new().expect("tmp");
	let backend = indexed(&tmp);
	let boosted = backend.search(&SearchQuery::text("indexed").with_boost("different", 5.0)).expect("search");
	assert_eq!(boosted.hits, 3);
	assert_eq!(boosted.results[0].pk(), "3");
	assert_eq!(pks(&backend, &SearchQuery::text("*").with_narrow("name:david1")), vec!["1"]);
}

#[test]
fn highlighting_wraps_query_terms() {
	let tmp = TempDir::new().expect("tmp");
	let backend = indexed(&tmp);
	let response = backend.search(&SearchQuery::text("indexed").with_highlight()).expect("search");
	let first = response.results.iter().find(|hit| hit.pk() == "1").expect("hit");
	let highlighted = first.highlighted.as_ref().expect("highlighted");
	assert_eq!(highlighted["text"], "<em>Indexed</em>! Running through the fields");
	assert!(backend.search(&SearchQuery::text("indexed")).expect("search").results.iter().all(|hit| hit.highlighted.is_none()));
}

#[test]
fn spelling_suggestions() {
	let tmp = TempDir::new().expect("tmp");
	let settings = BackendSettings { include_spelling: true, ..BackendSettings::default() };
	let backend = backend_at(&tmp.path().join("index"), settings);
	backend.update(&MockIndex, &mocks()).expect("update");

	let response = backend.search(&SearchQuery::text("indxed")).expect("search");
	assert_eq!(response.hits, 0);
	assert_eq!(response.spelling_suggestion.as_deref(), Some("indexed"));
	assert_eq!(backend.search(&SearchQuery::text("indexed")).expect("search").spelling_suggestion, None);
	let overridden = backend.search(&SearchQuery::text("indexed").with_spelling_query("anothr")).expect("search");
	assert_eq!(overridden.spelling_suggestion.as_deref(), Some("another"));
	assert_eq!(backend.search(&filtered("name", "david2")).expect("search").spelling_suggestion, None);
}

#[test]
fn more_like_this_excludes_the_seed() {
	let tmp = TempDir::new().expect("tmp");
	let backend = indexed(&tmp);
	let similar = backend.more_like_object(&MockIndex, &mocks()[0], &MoreLikeThis::new()).expect("mlt");
	assert_eq!(similar.pks(), vec!["2"]);

	let restricted = MoreLikeThis::new().with_additional_query(QueryInput::Text("name:david3".into()));
	assert!(backend.more_like_this(&Identifier::new(MOCK, "1"), &restricted).expect("mlt").results.is_empty());
	assert!(backend.more_like_this(&Identifier::new(MOCK, "404"), &MoreLikeThis::new()).expect("mlt").results.is_empty());

	let unknown = Identifier::new("core.unknown", "1");
	assert!(backend.more_like_this(&unknown, &MoreLikeThis::new()).expect("silent").results.is_empty());
	let loud = backend.more_like_this(&unknown, &MoreLikeThis::new().silently_fail(false));
	assert!(matches!(loud, Err(SearchError::Core(Error::UnindexedKind(kind))) if kind == "core.unknown"));
}

#[test]
fn missing_store_reads_as_empty() {
	let tmp = TempDir::new().expect("tmp");
	let backend = backend_at(&tmp.path().join("never"), BackendSettings::default());
	assert_eq!(backend.search(&SearchQuery::text("*")).expect("search").hits, 0);
	assert_eq!(backend.document_count().expect("count"), 0);
	assert!(backend.load_schema().expect("schema").is_none());
	assert!(backend.more_like_this(&Identifier::new(MOCK, "1"), &MoreLikeThis::new()).expect("mlt").results.is_empty());
}

#[test]
fn uninitialized_store_is_an_error() {
	let tmp = TempDir::new().expect("tmp");
	let path = tmp.path().join("bare");
	std::fs::create_dir_all(&path).expect("mkdir");
	tantivy::Index::create_in_dir(&path, quarry_text::tantivy_utils::build_schema()).expect("bare index");
	let backend = backend_at(&path, BackendSettings::default());
	assert!(matches!(backend.search(&SearchQuery::text("*")), Err(SearchError::UninitializedIndex(_))));
}

#[test]
fn unregistered_kinds_and_missing_paths_are_rejected() {
	struct Stray;
	impl IndexDefinition for Stray {
		fn kind(&self) -> &str { "core.stray" }
		fn fields(&self) -> Vec<FieldDescriptor> { vec![FieldDescriptor::content("text")] }
	}
	impl SearchIndex for Stray {
		type Object = u32;
		fn pk(&self, object: &u32) -> String { object.to_string() }
		fn prepare(&self, _: &u32) -> quarry_core::Result<FieldMap> { Ok(FieldMap::new()) }
	}

	let tmp = TempDir::new().expect("tmp");
	let backend = indexed(&tmp);
	assert!(matches!(backend.update(&Stray, &[1]), Err(SearchError::Core(Error::UnindexedKind(_)))));
	assert!(matches!(SearchBackend::new(BackendSettings::default(), registry()), Err(SearchError::Core(Error::Configuration(_)))));
}

#[test]
fn schema_is_persisted_and_index_can_be_deleted() {
	let tmp = TempDir::new().expect("tmp");
	let backend = indexed(&tmp);
	let schema = backend.load_schema().expect("load").expect("schema");
	assert_eq!(schema.content_field(), "text");
	assert_eq!(schema.field("tags").map(|f| f.column), Some(4));
	backend.delete_index().expect("delete");
	assert_eq!(backend.document_count().expect("count"), 0);
}

struct PriceIndex;

impl IndexDefinition for PriceIndex {
	fn kind(&self) -> &str { "core.price" }

	fn fields(&self) -> Vec<FieldDescriptor> {
		vec![
			FieldDescriptor::content("text"),
			FieldDescriptor::new("price", FieldType::Decimal),
			FieldDescriptor::new("ratio", FieldType::Float),
		]
	}
}

impl SearchIndex for PriceIndex {
	type Object = (u32, &'static str, f64);

	fn pk(&self, object: &Self::Object) -> String { object.0.to_string() }

	fn prepare(&self, object: &Self::Object) -> quarry_core::Result<FieldMap> {
		let mut map = FieldMap::new();
		map.insert("text".into(), FieldValue::from("priced item"));
		map.insert("price".into(), FieldValue::decimal(object.1)?);
		map.insert("ratio".into(), FieldValue::Float(object.2));
		Ok(map)
	}
}

#[test]
fn equal_values_match_whatever_their_spelling() {
	let tmp = TempDir::new().expect("tmp");
	let settings = BackendSettings { path: Some(tmp.path().join("prices").display().to_string()), ..BackendSettings::default() };
	let backend = SearchBackend::new(settings, IndexRegistry::new().with(Arc::new(PriceIndex)).expect("registry")).expect("backend");
	backend.update(&PriceIndex, &[(1, "5.0", -0.0), (2, "5", 0.0), (3, "+05.50", 1.5)]).expect("update");

	let decimal = |s: &str| FieldValue::decimal(s).expect("decimal");
	let sorted = |query: SearchQuery| pks(&backend, &query.sort_by(["ratio", "price"]));
	assert_eq!(sorted(filtered("price__gte", decimal("5.0"))), vec!["1", "2", "3"]);
	assert_eq!(sorted(filtered("price__gt", decimal("5"))), vec!["3"]);
	assert_eq!(sorted(filtered("price__lte", decimal("5.00"))), vec!["1", "2"]);
	assert_eq!(sorted(filtered("price__lt", decimal("5"))), Vec::<String>::new());
	assert_eq!(sorted(SearchQuery::text("price:5..5")), vec!["1", "2"]);
	assert_eq!(sorted(filtered("price", decimal("5.000"))), vec!["1", "2"]);
	assert_eq!(sorted(SearchQuery::text("price:5.50")), vec!["3"]);

	assert_eq!(sorted(filtered("ratio__gte", 0.0)), vec!["1", "2", "3"]);
	assert_eq!(sorted(filtered("ratio__lt", 0.0)), Vec::<String>::new());
	assert_eq!(sorted(SearchQuery::filtered(vec![QueryFilter::range("ratio", -0.0, 0.0)])), vec!["1", "2"]);
	assert_eq!(sorted(SearchQuery::text("ratio:0")), vec!["1", "2"]);

	let first = backend.search(&filtered("price", decimal("5")).sort_by(["ratio", "price"])).expect("search");
	assert_eq!(first.results[0].fields.get("price"), Some(&FieldValue::Decimal("5.0".into())));
	let facets = backend.search(&SearchQuery::text("*").with_facet("price")).expect("search");
	assert_eq!(facets.facets.fields["price"], vec![(FieldValue::Decimal("5".into()), 2), (FieldValue::Decimal("5.5".into()), 1)]);
}
