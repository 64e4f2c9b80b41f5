#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod codec;
pub mod config;
pub mod error;
pub mod filter;
pub mod registry;
pub mod request;
pub mod schema;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use schema::Schema;
pub use types::{FieldDescriptor, FieldMap, FieldType, FieldValue, Facets, Identifier, SearchHit, SearchResponse};
