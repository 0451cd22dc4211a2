//! Delete stage: removes the derived object when its source is removed.
//!
//! Idempotency: deleting an absent object succeeds, so a redelivered removal
//! is a no-op.

use std::sync::Arc;

use tracing::Instrument;

use crate::config::Config;
use crate::error::{StageError, StageResult};
use crate::naming::Naming;
use crate::ports::{Backends, BlobStore};
use crate::report::ErrorReporter;
use crate::types::{BatchReport, ObjectEvent, ObjectEventKind, ObjectLocation};

pub struct DeleteStage {
    blobs: Arc<dyn BlobStore>,
    reporter: ErrorReporter,
    naming: Naming,
}

impl DeleteStage {
    pub fn new(config: &Config, backends: &Backends) -> Self {
        Self {
            blobs: Arc::clone(&backends.blobs),
            reporter: ErrorReporter::new(Arc::clone(&backends.topics), &config.topics.errors),
            naming: Naming::new(config),
        }
    }

    pub async fn handle(&self, events: Vec<ObjectEvent>) -> BatchReport {
        let span = tracing::info_span!("delete", batch = events.len());
        async {
            let mut report = BatchReport::default();
            for event in events.iter().filter(|e| e.kind == ObjectEventKind::Removed) {
                let result = self.remove_derived(&event.location).await;
                if let Err(e) = &result {
                    self.reporter.report(e).await;
                }
                report.record(&result);
            }
            tracing::info!("Processed {} event(s)", events.len());
            report
        }
        .instrument(span)
        .await
    }

    /// Delete the derived object of `source`, returning its location.
    pub async fn remove_derived(&self, source: &ObjectLocation) -> StageResult<ObjectLocation> {
        let derived = self.naming.derived(source);
        self.blobs
            .delete(&derived)
            .await
            .map_err(|e| StageError::Delete {
                target: derived.to_string(),
                source: e,
            })?;
        tracing::info!("Removed {} from bucket {}", derived.key, derived.bucket);
        Ok(derived)
    }
}
