//! Document store abstraction.
//!
//! The record and profile services persist through the [`DocumentStore`] trait, which models
//! a schemaless document database: documents are JSON objects grouped in named collections,
//! addressed by id, merged on update and queried by field equality. Timestamps are not
//! supplied by callers; a [`Write`] names the fields that the store must stamp with its own
//! clock at the moment the write is applied.

mod file;

pub use file::FileStore;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Mutex;

/// A document body: a JSON object of field name to value.
pub type Document = serde_json::Map<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid document id: '{0}'")]
    InvalidId(String),
    #[error("invalid collection name: '{0}'")]
    InvalidCollection(String),
    #[error("document {collection}/{id} not found")]
    NotFound { collection: String, id: String },
    #[error("document store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize document: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize document {id}: {source}")]
    Deserialization {
        id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("document fields must be a JSON object")]
    NotAnObject,
    #[error("document store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A set of field values to write, plus the fields to stamp with the server time.
#[derive(Debug, Clone, Default)]
pub struct Write {
    fields: Document,
    server_timestamps: Vec<String>,
}

impl Write {
    pub fn new(fields: Document) -> Self {
        Self {
            fields,
            server_timestamps: Vec::new(),
        }
    }

    /// Builds a write from any value that serialises to a JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] if serialisation fails, or
    /// [`StoreError::NotAnObject`] if the value is not an object.
    pub fn from_serializable<T: Serialize>(value: &T) -> StoreResult<Self> {
        match serde_json::to_value(value).map_err(StoreError::Serialization)? {
            Value::Object(fields) => Ok(Self::new(fields)),
            _ => Err(StoreError::NotAnObject),
        }
    }

    /// Marks `field` to be set to the store's clock when the write is applied.
    pub fn with_server_timestamp(mut self, field: &str) -> Self {
        self.server_timestamps.push(field.to_string());
        self
    }

    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    pub fn fields(&self) -> &Document {
        &self.fields
    }

    /// Resolves the server timestamp sentinels and returns the concrete field values.
    pub fn resolve(self, now: DateTime<Utc>) -> Document {
        let mut fields = self.fields;
        let stamp = Value::String(format_timestamp(now));
        for field in self.server_timestamps {
            fields.insert(field, stamp.clone());
        }
        fields
    }
}

/// A document as read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub fields: Document,
}

impl StoredDocument {
    /// Decodes the document into `T`, exposing the document id as an `id` field.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Deserialization`] if the fields do not match `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> StoreResult<T> {
        let mut fields = self.fields.clone();
        fields.insert("id".into(), Value::String(self.id.clone()));
        serde_json::from_value(Value::Object(fields)).map_err(|source| {
            StoreError::Deserialization {
                id: self.id.clone(),
                source,
            }
        })
    }

    /// Parses a timestamp field, if present and well formed.
    pub fn timestamp(&self, field: &str) -> Option<DateTime<Utc>> {
        self.fields
            .get(field)
            .and_then(Value::as_str)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|t| t.with_timezone(&Utc))
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Creates a document with a store-assigned id and returns that id.
    async fn create(&self, collection: &str, write: Write) -> StoreResult<String>;

    /// Creates or replaces the document at `id`.
    async fn set(&self, collection: &str, id: &str, write: Write) -> StoreResult<()>;

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<StoredDocument>>;

    /// Merges `write` into the existing document. Fields not named are left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no document exists at `id`.
    async fn update(&self, collection: &str, id: &str, write: Write) -> StoreResult<()>;

    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no document exists at `id`.
    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()>;

    /// Returns every document whose string field `field` equals `value`, ordered by the
    /// timestamp field `order_by`, newest first.
    async fn query_eq_desc(
        &self,
        collection: &str,
        field: &str,
        value: &str,
        order_by: &str,
    ) -> StoreResult<Vec<StoredDocument>>;
}

/// Formats a timestamp the way the store persists it (RFC 3339, microseconds, `Z`).
pub fn format_timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Strictly increasing clock used to resolve server timestamps.
///
/// Successive calls never return the same instant, so a later write always carries a
/// later timestamp even when the wall clock has not advanced (or has stepped back).
#[derive(Debug)]
pub struct ServerClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl ServerClock {
    pub fn new() -> Self {
        Self {
            last: Mutex::new(None),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        let wall = Utc::now().trunc_subsecs(6);
        let mut last = self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let next = match *last {
            Some(prev) if wall <= prev => prev + TimeDelta::microseconds(1),
            _ => wall,
        };
        *last = Some(next);
        next
    }
}

impl Default for ServerClock {
    fn default() -> Self {
        Self::new()
    }
}
