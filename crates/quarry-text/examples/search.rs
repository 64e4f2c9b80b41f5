use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use quarry_core::config::{resolve_with_base, BackendSettings, Config};
use quarry_core::registry::IndexRegistry;
use quarry_core::request::SearchQuery;
use quarry_core::traits::{IndexDefinition, SearchIndex};
use quarry_core::{FieldDescriptor, FieldMap, FieldType, FieldValue};
use quarry_text::SearchBackend;
use tracing_subscriber::EnvFilter;

// Index a handful of notes and run one free-text query against them.
// Usage:
//   cargo run -p quarry-text --example search -- "your query" \
//     [--index ../dev_data/indexes/quarry] [--limit 10] [--facets]

struct Note {
	id: u32,
	title: &'static str,
	body: &'static str,
	topic: &'static str,
}

struct NoteIndex;

impl IndexDefinition for NoteIndex {
	fn kind(&self) -> &str { "demo.note" }

	fn fields(&self) -> Vec<FieldDescriptor> {
		vec![
			FieldDescriptor::content("body"),
			FieldDescriptor::new("title", FieldType::Text),
			FieldDescriptor::new("topic", FieldType::Text),
			FieldDescriptor::new("id", FieldType::Long),
		]
	}
}

impl SearchIndex for NoteIndex {
	type Object = Note;

	fn pk(&self, note: &Note) -> String { note.id.to_string() }

	fn prepare(&self, note: &Note) -> quarry_core::Result<FieldMap> {
		let mut map = FieldMap::new();
		map.insert("body".into(), FieldValue::from(note.body));
		map.insert("title".into(), FieldValue::from(note.title));
		map.insert("topic".into(), FieldValue::from(note.topic));
		map.insert("id".into(), FieldValue::from(i64::from(note.id)));
		Ok(map)
	}
}

fn notes() -> Vec<Note> {
	vec![
		Note { id: 1, title: "Starting a fire", body: "Firecraft basics: tinder, kindling and fuel wood.", topic: "fire" },
		Note { id: 2, title: "Rain water", body: "Collecting and filtering rain water for drinking.", topic: "water" },
		Note { id: 3, title: "Banked fires", body: "Banking a fire overnight keeps coals burning until morning.", topic: "fire" },
		Note { id: 4, title: "Mesh networking", body: "Small radios can relay messages between computers.", topic: "networking" },
	]
}

fn main() -> anyhow::Result<()> {
	tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();

	let args: Vec<String> = env::args().skip(1).collect();
	let mut query = String::new();
	let mut index_dir: Option<PathBuf> = None;
	let mut limit: usize = 10;
	let mut show_facets = false;
	let mut i = 0;
	while i < args.len() {
		match args[i].as_str() {
			"--index" => {
				let Some(dir) = args.get(i + 1) else { anyhow::bail!("--index requires a path") };
				index_dir = Some(PathBuf::from(dir));
				i += 2;
			}
			"--limit" => {
				let Some(n) = args.get(i + 1) else { anyhow::bail!("--limit requires a number") };
				limit = n.parse()?;
				i += 2;
			}
			"--facets" => { show_facets = true; i += 1; }
			s if s.starts_with("--") => anyhow::bail!("unknown flag: {s}"),
			s => { if query.is_empty() { query = s.to_string(); } i += 1; }
		}
	}
	if query.is_empty() { anyhow::bail!("usage: search <query> [--index DIR] [--limit N] [--facets]"); }

	// path precedence: flag > [search].path from quarry.toml / QUARRY_SEARCH__PATH > workspace dev_data
	let mut settings = Config::load().and_then(|c| c.backend_settings()).unwrap_or_default();
	if let Some(dir) = index_dir {
		settings.path = Some(dir.display().to_string());
	} else if settings.path.is_none() {
		let base = Path::new(env!("CARGO_MANIFEST_DIR")).ancestors().nth(2).unwrap_or(Path::new("."));
		settings = BackendSettings { path: Some(resolve_with_base(base, "dev_data/indexes/quarry").display().to_string()), ..settings };
	}

	let registry = IndexRegistry::new().with(Arc::new(NoteIndex))?;
	let backend = SearchBackend::new(settings, registry)?;
	let report = backend.update(&NoteIndex, &notes())?;
	println!("Quarry search\n=============");
	println!("Index: {} ({} indexed, {} skipped)", backend.store().path().display(), report.indexed, report.skipped);
	println!("Query: {query} (limit {limit})\n");

	let mut request = SearchQuery::text(query).with_limit(limit).with_highlight();
	if show_facets { request = request.with_facet("topic"); }
	let response = backend.search(&request)?;
	for (i, hit) in response.results.iter().enumerate() {
		let snippet = hit.highlighted.as_ref().and_then(|h| h.get("body")).cloned().unwrap_or_default();
		println!("{:>2}. score={:.3} id={}\n    {}", i + 1, hit.score, hit.identifier, snippet);
	}
	println!("\n{} hit(s)", response.hits);

	if show_facets {
		println!("\nFacets:");
		for (value, count) in response.facets.fields.get("topic").into_iter().flatten() {
			println!("  {value} -> {count}");
		}
	}
	Ok(())
}
