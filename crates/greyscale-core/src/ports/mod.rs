//! Interfaces to the external collaborators every stage talks to.
//!
//! Stages only ever see these traits. Each call is treated as atomic on its
//! own; there are no transactions spanning calls.
//!
//! Uses `async_trait` because native async fn in trait is not object-safe
//! (stages hold `Arc<dyn BlobStore>` and friends).

pub mod memory;

pub use memory::{MemoryBlobStore, MemoryDocumentStore, MemoryTopic};

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::error::StoreError;
use crate::types::ObjectLocation;

/// An object's bytes together with its stored content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobObject {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Bucket/key object storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch an object. Missing objects are [`StoreError::NotFound`].
    async fn get(&self, location: &ObjectLocation) -> Result<BlobObject, StoreError>;

    /// Create or overwrite an object.
    async fn put(
        &self,
        location: &ObjectLocation,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError>;

    /// Delete an object. Deleting a missing object succeeds.
    async fn delete(&self, location: &ObjectLocation) -> Result<(), StoreError>;
}

/// Publish side of a pub/sub transport. Messages are opaque strings.
#[async_trait]
pub trait Topic: Send + Sync {
    async fn publish(&self, topic: &str, message: &str) -> Result<(), StoreError>;
}

/// A document store item: attribute name to value.
pub type Item = serde_json::Map<String, Value>;

/// Scan predicate over item attributes.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Attribute is a string equal to the value
    Equals { attribute: String, value: String },
    /// Attribute is present, not null, and not an empty string
    Exists { attribute: String },
    /// Every inner filter matches
    All(Vec<Filter>),
}

impl Filter {
    pub fn equals(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Equals {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    pub fn exists(attribute: impl Into<String>) -> Self {
        Self::Exists {
            attribute: attribute.into(),
        }
    }

    pub fn matches(&self, item: &Item) -> bool {
        match self {
            Self::Equals { attribute, value } => {
                item.get(attribute).and_then(Value::as_str) == Some(value.as_str())
            }
            Self::Exists { attribute } => match item.get(attribute) {
                None | Some(Value::Null) => false,
                Some(Value::String(s)) => !s.is_empty(),
                Some(_) => true,
            },
            Self::All(filters) => filters.iter().all(|f| f.matches(item)),
        }
    }
}

/// Keyed document tables with filtered scans.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert or replace the item under its key attribute.
    async fn put(&self, table: &str, item: Item) -> Result<(), StoreError>;

    /// Full scan returning every item matching `filter`.
    async fn scan(&self, table: &str, filter: &Filter) -> Result<Vec<Item>, StoreError>;

    /// Delete by key. Deleting a missing key succeeds.
    async fn delete(&self, table: &str, key: &str) -> Result<(), StoreError>;
}

/// The set of backends handed to every stage.
#[derive(Clone)]
pub struct Backends {
    pub blobs: Arc<dyn BlobStore>,
    pub topics: Arc<dyn Topic>,
    pub documents: Arc<dyn DocumentStore>,
}
