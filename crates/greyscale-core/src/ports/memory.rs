//! In-memory backends with notification fan-out.
//!
//! These stand in for the hosted object store, topic/queue pair and document
//! store when running the choreography locally or in tests. Each mutation
//! notifies subscribers through tracked [`Outbox`]es, mirroring bucket
//! notifications, queue subscriptions and change streams.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::{BlobObject, BlobStore, DocumentStore, Filter, Item, Topic};
use crate::bus::Outbox;
use crate::error::StoreError;
use crate::types::{
    ChangeKind, ChangeRecord, ObjectEvent, ObjectEventKind, ObjectLocation, QueueMessage,
    TopicEnvelope,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct BucketSubscription {
    bucket: String,
    kind: ObjectEventKind,
    outbox: Outbox<ObjectEvent>,
}

/// Object store keyed by bucket and key.
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: Mutex<BTreeMap<ObjectLocation, BlobObject>>,
    subscriptions: Mutex<Vec<BucketSubscription>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notify `outbox` of every `kind` event on `bucket`.
    pub fn subscribe(&self, bucket: impl Into<String>, kind: ObjectEventKind, outbox: Outbox<ObjectEvent>) {
        lock(&self.subscriptions).push(BucketSubscription {
            bucket: bucket.into(),
            kind,
            outbox,
        });
    }

    pub fn contains(&self, location: &ObjectLocation) -> bool {
        lock(&self.objects).contains_key(location)
    }

    /// Snapshot of one object, if present.
    pub fn object(&self, location: &ObjectLocation) -> Option<BlobObject> {
        lock(&self.objects).get(location).cloned()
    }

    /// Locations of every object in `bucket`, in key order.
    pub fn list(&self, bucket: &str) -> Vec<ObjectLocation> {
        lock(&self.objects)
            .keys()
            .filter(|loc| loc.bucket == bucket)
            .cloned()
            .collect()
    }

    fn notify(&self, event: ObjectEvent) {
        for sub in lock(&self.subscriptions).iter() {
            if sub.kind == event.kind && sub.bucket == event.location.bucket {
                sub.outbox.send(event.clone());
            }
        }
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, location: &ObjectLocation) -> Result<BlobObject, StoreError> {
        self.object(location)
            .ok_or_else(|| StoreError::NotFound(location.to_string()))
    }

    async fn put(
        &self,
        location: &ObjectLocation,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        lock(&self.objects).insert(
            location.clone(),
            BlobObject {
                bytes,
                content_type: Some(content_type.to_string()),
            },
        );
        self.notify(ObjectEvent::created(location.clone()));
        Ok(())
    }

    async fn delete(&self, location: &ObjectLocation) -> Result<(), StoreError> {
        // Object stores report a removal even when nothing was there.
        lock(&self.objects).remove(location);
        self.notify(ObjectEvent::removed(location.clone()));
        Ok(())
    }
}

/// A message as published, before any envelope is added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub message: String,
}

/// Topic fan-out with queue subscriptions.
///
/// Queue subscribers receive each message wrapped in a [`TopicEnvelope`],
/// serialized as the queue body.
#[derive(Default)]
pub struct MemoryTopic {
    log: Mutex<Vec<PublishedMessage>>,
    queues: Mutex<Vec<(String, Outbox<QueueMessage>)>>,
    next_message_id: AtomicU64,
}

impl MemoryTopic {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver every message published to `topic` into a queue.
    pub fn subscribe_queue(&self, topic: impl Into<String>, outbox: Outbox<QueueMessage>) {
        lock(&self.queues).push((topic.into(), outbox));
    }

    /// Every message published to `topic`, in publish order.
    pub fn messages(&self, topic: &str) -> Vec<String> {
        lock(&self.log)
            .iter()
            .filter(|m| m.topic == topic)
            .map(|m| m.message.clone())
            .collect()
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        lock(&self.log).clone()
    }
}

#[async_trait]
impl Topic for MemoryTopic {
    async fn publish(&self, topic: &str, message: &str) -> Result<(), StoreError> {
        lock(&self.log).push(PublishedMessage {
            topic: topic.to_string(),
            message: message.to_string(),
        });

        let queues = lock(&self.queues);
        let subscribers: Vec<_> = queues.iter().filter(|(t, _)| t == topic).collect();
        if subscribers.is_empty() {
            return Ok(());
        }

        let body = serde_json::to_string(&TopicEnvelope {
            message: Some(message.to_string()),
            topic: Some(topic.to_string()),
        })
        .map_err(|e| StoreError::Serialization(e.to_string()))?;

        for (_, outbox) in subscribers {
            let id = self.next_message_id.fetch_add(1, Ordering::SeqCst);
            outbox.send(QueueMessage {
                message_id: format!("msg-{id:06}"),
                body: body.clone(),
            });
        }
        Ok(())
    }
}

struct Table {
    key_attribute: String,
    items: BTreeMap<String, Item>,
}

/// Keyed tables with scan and change streams.
///
/// Scans return items in key order, so repeated scans of an unchanged table
/// are identical.
#[derive(Default)]
pub struct MemoryDocumentStore {
    tables: Mutex<BTreeMap<String, Table>>,
    streams: Mutex<Vec<(String, Outbox<ChangeRecord>)>>,
    next_event_id: AtomicU64,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or reset) a table keyed by `key_attribute`.
    pub fn create_table(&self, table: impl Into<String>, key_attribute: impl Into<String>) {
        lock(&self.tables).insert(
            table.into(),
            Table {
                key_attribute: key_attribute.into(),
                items: BTreeMap::new(),
            },
        );
    }

    /// Builder-style [`create_table`](Self::create_table).
    pub fn with_table(self, table: impl Into<String>, key_attribute: impl Into<String>) -> Self {
        self.create_table(table, key_attribute);
        self
    }

    /// Subscribe to the change stream of `table`.
    pub fn subscribe(&self, table: impl Into<String>, outbox: Outbox<ChangeRecord>) {
        lock(&self.streams).push((table.into(), outbox));
    }

    /// Every item in `table`, in key order.
    pub fn items(&self, table: &str) -> Vec<Item> {
        lock(&self.tables)
            .get(table)
            .map(|t| t.items.values().cloned().collect())
            .unwrap_or_default()
    }

    fn notify(&self, table: &str, key: &str, kind: ChangeKind) {
        let id = self.next_event_id.fetch_add(1, Ordering::SeqCst);
        for (t, outbox) in lock(&self.streams).iter() {
            if t == table {
                outbox.send(ChangeRecord {
                    event_id: format!("evt-{id:06}"),
                    kind,
                    table: table.to_string(),
                    key: key.to_string(),
                });
            }
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn put(&self, table: &str, item: Item) -> Result<(), StoreError> {
        let (key, kind) = {
            let mut tables = lock(&self.tables);
            let t = tables
                .get_mut(table)
                .ok_or_else(|| StoreError::NotFound(format!("table {table}")))?;
            let key = item
                .get(&t.key_attribute)
                .and_then(|v| v.as_str())
                .filter(|k| !k.is_empty())
                .ok_or_else(|| {
                    StoreError::Serialization(format!(
                        "item has no string key attribute '{}'",
                        t.key_attribute
                    ))
                })?
                .to_string();
            let kind = match t.items.insert(key.clone(), item) {
                Some(_) => ChangeKind::Modify,
                None => ChangeKind::Insert,
            };
            (key, kind)
        };
        self.notify(table, &key, kind);
        Ok(())
    }

    async fn scan(&self, table: &str, filter: &Filter) -> Result<Vec<Item>, StoreError> {
        let tables = lock(&self.tables);
        let t = tables
            .get(table)
            .ok_or_else(|| StoreError::NotFound(format!("table {table}")))?;
        Ok(t.items
            .values()
            .filter(|item| filter.matches(item))
            .cloned()
            .collect())
    }

    async fn delete(&self, table: &str, key: &str) -> Result<(), StoreError> {
        let removed = {
            let mut tables = lock(&self.tables);
            let t = tables
                .get_mut(table)
                .ok_or_else(|| StoreError::NotFound(format!("table {table}")))?;
            t.items.remove(key).is_some()
        };
        if removed {
            self.notify(table, key, ChangeKind::Remove);
        }
        Ok(())
    }
}
