//! Core data types carried between stages.
//!
//! Field names on the wire match the attribute names stored in the `Image`
//! table, so a notification and a record serialize to the same keys.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A bucket/key pair addressing one object in the blob store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Published by the convert stage once the derived image is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionNotification {
    pub source_bucket: String,
    pub source_key: String,
    #[serde(rename = "sourceURL")]
    pub source_url: String,
    pub convert_bucket: String,
    pub convert_key: String,
    #[serde(rename = "convertURL")]
    pub convert_url: String,
    /// Content type reported by the blob store for the original object
    pub image_type: String,
}

impl ConversionNotification {
    /// Attach an identity, producing the record the index stores.
    pub fn into_record(self, identity: String) -> ConversionRecord {
        ConversionRecord {
            identity,
            notification: self,
        }
    }
}

/// Provenance record persisted in the `Image` table.
///
/// The identity is the table key. It is not derivable from either object
/// location, so lookups by location are always scans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRecord {
    #[serde(rename = "imageConverter")]
    pub identity: String,

    #[serde(flatten)]
    pub notification: ConversionNotification,
}

/// Kind of blob store mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectEventKind {
    Created,
    Removed,
}

/// A blob store notification for one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEvent {
    pub kind: ObjectEventKind,
    pub location: ObjectLocation,
}

impl ObjectEvent {
    pub fn created(location: ObjectLocation) -> Self {
        Self {
            kind: ObjectEventKind::Created,
            location,
        }
    }

    pub fn removed(location: ObjectLocation) -> Self {
        Self {
            kind: ObjectEventKind::Removed,
            location,
        }
    }
}

/// Envelope a topic wraps around every published payload.
///
/// `message` stays optional so that a queue body missing the field is a
/// distinct, reportable failure rather than a generic parse error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicEnvelope {
    #[serde(rename = "Message", default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(rename = "TopicArn", default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

/// One message delivered by a queue. The body is opaque to the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub message_id: String,
    pub body: String,
}

/// Kind of document store mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Insert,
    Modify,
    Remove,
}

/// A change stream notification for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    pub event_id: String,
    pub kind: ChangeKind,
    pub table: String,
    pub key: String,
}

/// Outcome counts for one stage invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Items that completed every step
    pub succeeded: usize,
    /// Items whose failure was reported to the error topic
    pub failed: usize,
}

impl BatchReport {
    pub fn record<T, E>(&mut self, result: &std::result::Result<T, E>) {
        match result {
            Ok(_) => self.succeeded += 1,
            Err(_) => self.failed += 1,
        }
    }
}
