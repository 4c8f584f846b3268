//! Document model for the execution core
//!
//! A document is an immutable JSON object carrying its identifier under
//! `_id`. Once published into a collection store it is shared as a
//! [`DocumentRef`]; updates replace the stored reference rather than
//! mutating the document.

mod compare;
mod id;

use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

pub use compare::{compare_optional, compare_values, same_type, Comparator, SortKey, SortOrder};
pub use id::{DocumentId, DocumentIdError, DOCUMENT_ID_LEN};

/// Shared, immutable handle to a stored document
pub type DocumentRef = Arc<Document>;

/// Errors raised while constructing a document
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("document body must be a JSON object")]
    NotAnObject,

    #[error("document has no `_id` field")]
    MissingId,

    #[error("document `_id` is not a string")]
    IdNotString,

    #[error("invalid document `_id`: {0}")]
    InvalidId(#[from] DocumentIdError),
}

pub type DocumentResult<T> = Result<T, DocumentError>;

/// An immutable document
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    id: DocumentId,
    body: Value,
}

impl Document {
    /// Field holding the document identifier
    pub const ID_FIELD: &'static str = "_id";

    /// Wraps a body that already carries a valid `_id`.
    pub fn new(body: Value) -> DocumentResult<Self> {
        let object = body.as_object().ok_or(DocumentError::NotAnObject)?;
        let raw_id = object.get(Self::ID_FIELD).ok_or(DocumentError::MissingId)?;
        let id = raw_id
            .as_str()
            .ok_or(DocumentError::IdNotString)?
            .parse::<DocumentId>()?;
        Ok(Self { id, body })
    }

    /// Wraps a body, stamping `id` into its `_id` field.
    pub fn with_id(id: DocumentId, body: Value) -> DocumentResult<Self> {
        let mut object = match body {
            Value::Object(map) => map,
            _ => return Err(DocumentError::NotAnObject),
        };
        object.insert(Self::ID_FIELD.to_string(), Value::String(id.to_hex()));
        Ok(Self {
            id,
            body: Value::Object(object),
        })
    }

    /// Wraps a body, generating a fresh identifier when `_id` is absent.
    pub fn with_generated_id(body: Value) -> DocumentResult<Self> {
        match body.get(Self::ID_FIELD) {
            Some(_) => Self::new(body),
            None => Self::with_id(DocumentId::generate(), body),
        }
    }

    /// Builds a document from a field map and identifier
    pub fn from_fields(id: DocumentId, fields: Map<String, Value>) -> Self {
        let mut fields = fields;
        fields.insert(Self::ID_FIELD.to_string(), Value::String(id.to_hex()));
        Self {
            id,
            body: Value::Object(fields),
        }
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Returns a top-level field
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.body.get(field)
    }

    /// Resolves a dotted field path (`a.b.0.c`) through nested objects and
    /// array indices. Returns `None` if any segment is missing.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut current = &self.body;
        for segment in path.split('.') {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn into_ref(self) -> DocumentRef {
        Arc::new(self)
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.body.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let body = Value::deserialize(deserializer)?;
        Document::new(body).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_with_id_stamps_field() {
        let id = DocumentId::from_parts(10, 1);
        let doc = Document::with_id(id, json!({"name": "Alice"})).unwrap();
        assert_eq!(doc.id(), id);
        assert_eq!(doc.get("_id"), Some(&json!(id.to_hex())));
    }

    #[test]
    fn test_new_requires_valid_id() {
        assert_eq!(
            Document::new(json!({"name": "x"})),
            Err(DocumentError::MissingId)
        );
        assert_eq!(Document::new(json!([1, 2])), Err(DocumentError::NotAnObject));
        assert_eq!(
            Document::new(json!({"_id": 5})),
            Err(DocumentError::IdNotString)
        );
        assert!(matches!(
            Document::new(json!({"_id": "nothex"})),
            Err(DocumentError::InvalidId(_))
        ));
    }

    #[test]
    fn test_get_path_nested() {
        let doc = Document::with_id(
            DocumentId::from_parts(1, 1),
            json!({"a": {"b": [10, {"c": "deep"}]}}),
        )
        .unwrap();

        assert_eq!(doc.get_path("a.b.0"), Some(&json!(10)));
        assert_eq!(doc.get_path("a.b.1.c"), Some(&json!("deep")));
        assert_eq!(doc.get_path("a.x"), None);
        assert_eq!(doc.get_path("a.b.9"), None);
        assert_eq!(doc.get_path("a.b.0.z"), None);
    }

    #[test]
    fn test_serde_roundtrip_through_body() {
        let doc = Document::with_id(DocumentId::from_parts(3, 3), json!({"n": 1})).unwrap();
        let encoded = serde_json::to_string(&doc).unwrap();
        let decoded: Document = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, doc);
    }
}
