//! quarry-text
//!
//! Tantivy-backed search adapter: typed documents in, compiled queries,
//! sorted and faceted results out. Start from [`SearchBackend`].

pub mod backend;
pub mod compiler;
pub mod error;
pub mod facets;
pub mod index;
pub mod parser;
pub mod query;
pub mod search;
pub mod similarity;
pub mod sort;
pub mod spelling;
pub mod store;
pub mod tantivy_utils;
pub mod terms;

pub use backend::SearchBackend;
pub use compiler::{CompiledQuery, QueryCompiler};
pub use error::{SearchError, SearchResult};
pub use index::{Indexer, StoredPayload, UpdateReport};
pub use query::QueryNode;
pub use store::{Snapshot, Store};
pub use terms::Analyzer;
