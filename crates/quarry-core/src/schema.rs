//! Column-addressed schema built from field descriptors.

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use crate::error::{Error, Result};
use crate::types::{FieldDescriptor, FieldType};

/// Name callers use for "no field restriction, search the full text".
pub const CONTENT_FIELD: &str = "content";

/// One indexed field and the value column it owns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaField {
    pub field_name: String,
    pub field_type: FieldType,
    pub column: u32,
    pub multi_valued: bool,
}

/// Immutable schema value. Persisted next to the documents and reloaded by readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    content_field: String,
    fields: Vec<SchemaField>,
    fingerprint: u64,
}

impl Schema {
    /// Columns are assigned densely from 0 in descriptor order, skipping
    /// non-indexed fields. A field repeated across kinds keeps its first
    /// column as long as its declaration agrees.
    pub fn build(descriptors: &[FieldDescriptor]) -> Result<Self> {
        let mut fields: Vec<SchemaField> = Vec::new();
        let mut content: Option<String> = None;
        for d in descriptors {
            if d.name.is_empty() || d.name == CONTENT_FIELD {
                return Err(Error::Schema(format!("'{}' cannot be used as a field name", d.name)));
            }
            if d.document {
                match &content {
                    Some(existing) if existing != &d.name => {
                        return Err(Error::Schema(format!(
                            "more than one content field declared: '{existing}' and '{}'",
                            d.name
                        )));
                    }
                    _ => content = Some(d.name.clone()),
                }
            }
            if !d.indexed {
                continue;
            }
            if let Some(existing) = fields.iter().find(|f| f.field_name == d.name) {
                if existing.field_type != d.field_type || existing.multi_valued != d.multi_valued {
                    return Err(Error::Schema(format!("field '{}' is declared with conflicting types", d.name)));
                }
                continue;
            }
            let column = u32::try_from(fields.len()).map_err(|_| Error::Schema("too many columns".into()))?;
            fields.push(SchemaField { field_name: d.name.clone(), field_type: d.field_type, column, multi_valued: d.multi_valued });
        }
        let content_field = content.ok_or_else(|| Error::Schema("no content field declared".into()))?;
        let fingerprint = fingerprint(&content_field, &fields);
        Ok(Self { content_field, fields, fingerprint })
    }

    pub fn content_field(&self) -> &str {
        &self.content_field
    }

    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.field_name == name)
    }

    /// Like [`Schema::field`], but an unknown name is an [`Error::InvalidField`].
    pub fn require(&self, name: &str) -> Result<&SchemaField> {
        self.field(name).ok_or_else(|| Error::InvalidField(name.to_string()))
    }

    /// Hash of the definitions this schema was built from.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Schema(format!("cannot serialize schema: {e}")))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::Schema(format!("stored schema is unreadable: {e}")))
    }
}

fn fingerprint(content_field: &str, fields: &[SchemaField]) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    content_field.hash(&mut hasher);
    fields.hash(&mut hasher);
    hasher.finish()
}
