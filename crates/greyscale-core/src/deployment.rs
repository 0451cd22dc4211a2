//! In-process deployment of the whole choreography.
//!
//! Wires every stage to the in-memory backends the same way a hosted
//! deployment wires functions to bucket notifications, topic queues and
//! table streams:
//!
//! ```text
//! source bucket ──created──▶ convert ──▶ converted topic ──queue──▶ index-write
//!               ──removed──▶ delete                                     │
//!               ──removed──▶ index-delete ──────────┐                   │
//!                                                   ▼                   ▼
//!                                        Image table change stream ──▶ gallery
//!                                                                       │
//!                           gallery bucket ──created──▶ backup ◀────────┘
//! ```
//!
//! Every stage runs as its own task and only communicates through the
//! backends. [`LocalDeployment::settle`] waits until no notification is
//! queued or being handled anywhere.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::bus::{tracked_channel, InFlight, Inbox, StageRunner};
use crate::config::Config;
use crate::error::StoreError;
use crate::identity::IdentityGenerator;
use crate::ports::{Backends, BlobStore, MemoryBlobStore, MemoryDocumentStore, MemoryTopic};
use crate::stages::{
    BackupStage, ConvertStage, DeleteStage, GalleryStage, IndexDeleteStage, IndexWriteStage,
};
use crate::types::{BatchReport, ObjectEventKind, ObjectLocation};

/// Key attribute of the provenance table.
pub const RECORD_KEY_ATTRIBUTE: &str = "imageConverter";

/// Concrete in-memory backends, kept typed so callers can inspect them.
#[derive(Clone)]
pub struct LocalBackends {
    pub blobs: Arc<MemoryBlobStore>,
    pub topics: Arc<MemoryTopic>,
    pub documents: Arc<MemoryDocumentStore>,
}

impl LocalBackends {
    /// Fresh stores with the provenance table created.
    pub fn new(config: &Config) -> Self {
        let documents = MemoryDocumentStore::new();
        documents.create_table(&config.index.table, RECORD_KEY_ATTRIBUTE);
        Self {
            blobs: Arc::new(MemoryBlobStore::new()),
            topics: Arc::new(MemoryTopic::new()),
            documents: Arc::new(documents),
        }
    }

    /// The same stores behind the stage-facing traits.
    pub fn backends(&self) -> Backends {
        Backends {
            blobs: self.blobs.clone(),
            topics: self.topics.clone(),
            documents: self.documents.clone(),
        }
    }
}

/// A running local deployment. Stage tasks are aborted on drop.
pub struct LocalDeployment {
    local: LocalBackends,
    inflight: Arc<InFlight>,
    tasks: Vec<JoinHandle<()>>,
}

impl LocalDeployment {
    /// Create backends, subscribe every stage and start the stage tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: &Config, identities: Arc<dyn IdentityGenerator>) -> Self {
        let local = LocalBackends::new(config);
        let backends = local.backends();
        let inflight = InFlight::new();
        let batch_size = config.deployment.batch_size;
        let mut tasks = Vec::new();

        let (convert_tx, convert_rx) = tracked_channel(&inflight);
        let (delete_tx, delete_rx) = tracked_channel(&inflight);
        let (index_delete_tx, index_delete_rx) = tracked_channel(&inflight);
        for bucket in &config.deployment.source_buckets {
            local
                .blobs
                .subscribe(bucket, ObjectEventKind::Created, convert_tx.clone());
            local
                .blobs
                .subscribe(bucket, ObjectEventKind::Removed, delete_tx.clone());
            local
                .blobs
                .subscribe(bucket, ObjectEventKind::Removed, index_delete_tx.clone());
        }

        let (queue_tx, queue_rx) = tracked_channel(&inflight);
        local.topics.subscribe_queue(&config.topics.converted, queue_tx);

        let (stream_tx, stream_rx) = tracked_channel(&inflight);
        local.documents.subscribe(&config.index.table, stream_tx);

        let stage = Arc::new(ConvertStage::new(config, &backends));
        tasks.push(spawn_stage("convert", convert_rx, batch_size, move |events| {
            let stage = Arc::clone(&stage);
            async move { stage.handle(events).await }
        }));

        let stage = Arc::new(DeleteStage::new(config, &backends));
        tasks.push(spawn_stage("delete", delete_rx, batch_size, move |events| {
            let stage = Arc::clone(&stage);
            async move { stage.handle(events).await }
        }));

        let stage = Arc::new(IndexDeleteStage::new(config, &backends));
        tasks.push(spawn_stage("index_delete", index_delete_rx, batch_size, move |events| {
            let stage = Arc::clone(&stage);
            async move { stage.handle(events).await }
        }));

        let stage = Arc::new(IndexWriteStage::new(config, &backends, identities));
        tasks.push(spawn_stage("index_write", queue_rx, batch_size, move |messages| {
            let stage = Arc::clone(&stage);
            async move { stage.handle(messages).await }
        }));

        let stage = Arc::new(GalleryStage::new(config, &backends));
        tasks.push(spawn_stage("gallery", stream_rx, batch_size, move |changes| {
            let stage = Arc::clone(&stage);
            async move { stage.handle(changes).await }
        }));

        if config.deployment.backup_gallery {
            let (backup_tx, backup_rx) = tracked_channel(&inflight);
            local
                .blobs
                .subscribe(&config.gallery.bucket, ObjectEventKind::Created, backup_tx);
            let stage = Arc::new(BackupStage::new(config, &backends));
            tasks.push(spawn_stage("backup", backup_rx, batch_size, move |events| {
                let stage = Arc::clone(&stage);
                async move { stage.handle(events).await }
            }));
        }

        tracing::debug!(
            "Local deployment started with {} stage(s) on {} source bucket(s)",
            tasks.len(),
            config.deployment.source_buckets.len()
        );

        Self {
            local,
            inflight,
            tasks,
        }
    }

    pub fn local(&self) -> &LocalBackends {
        &self.local
    }

    pub fn backends(&self) -> Backends {
        self.local.backends()
    }

    /// Create or overwrite a source object, triggering the choreography.
    pub async fn upload(
        &self,
        location: &ObjectLocation,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        self.local.blobs.put(location, bytes, content_type).await
    }

    /// Remove a source object, triggering the compensating stages.
    pub async fn remove(&self, location: &ObjectLocation) -> Result<(), StoreError> {
        self.local.blobs.delete(location).await
    }

    /// Wait until every notification has been handled.
    pub async fn settle(&self) {
        self.inflight.wait_idle().await;
    }
}

impl Drop for LocalDeployment {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

fn spawn_stage<T, F, Fut>(
    name: &'static str,
    inbox: Inbox<T>,
    batch_size: usize,
    handler: F,
) -> JoinHandle<()>
where
    T: Send + 'static,
    F: Fn(Vec<T>) -> Fut + Send + 'static,
    Fut: Future<Output = BatchReport> + Send + 'static,
{
    tokio::spawn(StageRunner::new(name, inbox, batch_size).run(handler))
}
