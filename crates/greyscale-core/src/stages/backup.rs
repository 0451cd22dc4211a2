//! Backup stage: copies each published gallery object to its backup bucket.

use std::sync::Arc;

use tracing::Instrument;

use crate::config::Config;
use crate::error::{StageError, StageResult};
use crate::naming::Naming;
use crate::ports::{Backends, BlobStore};
use crate::report::ErrorReporter;
use crate::types::{BatchReport, ObjectEvent, ObjectEventKind, ObjectLocation};

pub struct BackupStage {
    blobs: Arc<dyn BlobStore>,
    reporter: ErrorReporter,
    naming: Naming,
}

impl BackupStage {
    pub fn new(config: &Config, backends: &Backends) -> Self {
        Self {
            blobs: Arc::clone(&backends.blobs),
            reporter: ErrorReporter::new(Arc::clone(&backends.topics), &config.topics.errors),
            naming: Naming::new(config),
        }
    }

    pub async fn handle(&self, events: Vec<ObjectEvent>) -> BatchReport {
        let span = tracing::info_span!("backup", batch = events.len());
        async {
            let mut report = BatchReport::default();
            for event in events.iter().filter(|e| e.kind == ObjectEventKind::Created) {
                let result = self.copy(&event.location).await;
                if let Err(e) = &result {
                    self.reporter.report(e).await;
                }
                report.record(&result);
            }
            report
        }
        .instrument(span)
        .await
    }

    /// Copy `location` to its backup location, keeping the content type.
    pub async fn copy(&self, location: &ObjectLocation) -> StageResult<ObjectLocation> {
        let object = self
            .blobs
            .get(location)
            .await
            .map_err(|e| StageError::Fetch {
                location: location.clone(),
                source: e,
            })?;

        let target = self.naming.backup(location);
        let content_type = object
            .content_type
            .unwrap_or_else(|| "application/octet-stream".to_string());
        self.blobs
            .put(&target, object.bytes, &content_type)
            .await
            .map_err(|e| StageError::StoreWrite {
                location: target.clone(),
                source: e,
            })?;
        tracing::info!("Backed up {} to {}", location, target);
        Ok(target)
    }
}
