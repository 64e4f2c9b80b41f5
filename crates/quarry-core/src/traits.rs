use crate::error::Result;
use crate::types::{FieldDescriptor, FieldMap};

/// The static half of an index definition: which kind it covers and which fields it declares.
pub trait IndexDefinition: Send + Sync {
    fn kind(&self) -> &str;
    fn fields(&self) -> Vec<FieldDescriptor>;
}

/// An index definition that can also turn one of its objects into a field map.
pub trait SearchIndex: IndexDefinition {
    type Object;

    /// Primary key of `object`; the identifier becomes `<kind>.<pk>`.
    fn pk(&self, object: &Self::Object) -> String;

    /// Field name to value map for `object`. An [`crate::error::Error::Encoding`]
    /// here skips the object without failing the batch.
    fn prepare(&self, object: &Self::Object) -> Result<FieldMap>;
}
