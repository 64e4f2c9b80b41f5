use std::sync::Arc;

use crate::error::{Error, Result};
use crate::schema::Schema;
use crate::traits::IndexDefinition;
use crate::types::FieldDescriptor;

/// The set of kinds registered for indexing. All kinds share one store and one schema.
#[derive(Clone, Default)]
pub struct IndexRegistry {
    definitions: Vec<Arc<dyn IndexDefinition>>,
}

impl IndexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, definition: Arc<dyn IndexDefinition>) -> Result<()> {
        if self.is_registered(definition.kind()) {
            return Err(Error::Schema(format!("kind '{}' is already registered", definition.kind())));
        }
        self.definitions.push(definition);
        Ok(())
    }

    pub fn with(mut self, definition: Arc<dyn IndexDefinition>) -> Result<Self> {
        self.register(definition)?;
        Ok(self)
    }

    pub fn is_registered(&self, kind: &str) -> bool {
        self.definitions.iter().any(|d| d.kind() == kind)
    }

    pub fn kinds(&self) -> Vec<&str> {
        self.definitions.iter().map(|d| d.kind()).collect()
    }

    pub fn descriptors(&self) -> Vec<FieldDescriptor> {
        self.definitions.iter().flat_map(|d| d.fields()).collect()
    }

    pub fn build_schema(&self) -> Result<Schema> {
        Schema::build(&self.descriptors())
    }
}

impl std::fmt::Debug for IndexRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexRegistry").field("kinds", &self.kinds()).finish()
    }
}
