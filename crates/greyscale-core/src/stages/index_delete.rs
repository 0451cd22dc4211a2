//! Index-delete stage: removes provenance records of a removed source.
//!
//! Record identities are not derivable from object locations, so matching
//! records are found with a full filtered scan and deleted one by one.
//! Zero matches is not an error: the record may never have been written.
//! Only the key attribute of a match is read; other attributes may be missing
//! or malformed and the record is still deleted.

use std::sync::Arc;

use tracing::Instrument;

use crate::config::Config;
use crate::deployment::RECORD_KEY_ATTRIBUTE;
use crate::error::{StageError, StageResult};
use crate::naming::Naming;
use crate::ports::{Backends, DocumentStore, Filter, Item};
use crate::report::ErrorReporter;
use crate::types::{BatchReport, ObjectEvent, ObjectEventKind, ObjectLocation};

/// Outcome of removing the records for one source object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Removal {
    /// Records deleted
    pub deleted: usize,
    /// Matching items without a usable key, or whose delete failed
    pub failed: usize,
}

pub struct IndexDeleteStage {
    documents: Arc<dyn DocumentStore>,
    reporter: ErrorReporter,
    naming: Naming,
    table: String,
}

impl IndexDeleteStage {
    pub fn new(config: &Config, backends: &Backends) -> Self {
        Self {
            documents: Arc::clone(&backends.documents),
            reporter: ErrorReporter::new(Arc::clone(&backends.topics), &config.topics.errors),
            naming: Naming::new(config),
            table: config.index.table.clone(),
        }
    }

    pub async fn handle(&self, events: Vec<ObjectEvent>) -> BatchReport {
        let span = tracing::info_span!("index_delete", batch = events.len());
        async {
            let mut report = BatchReport::default();
            for event in events.iter().filter(|e| e.kind == ObjectEventKind::Removed) {
                match self.remove_records(&event.location).await {
                    Ok(removal) if removal.failed == 0 => report.succeeded += 1,
                    Ok(_) => report.failed += 1,
                    Err(e) => {
                        self.reporter.report(&e).await;
                        report.failed += 1;
                    }
                }
            }
            report
        }
        .instrument(span)
        .await
    }

    /// Delete every record whose derived location is that of `source`.
    ///
    /// Failures on individual matches are reported here and counted in the
    /// returned [`Removal`]; only a failed scan is returned as an error.
    pub async fn remove_records(&self, source: &ObjectLocation) -> StageResult<Removal> {
        let derived = self.naming.derived(source);
        let filter = Filter::All(vec![
            Filter::equals("convertKey", derived.key.as_str()),
            Filter::equals("convertBucket", derived.bucket.as_str()),
        ]);

        let items = self
            .documents
            .scan(&self.table, &filter)
            .await
            .map_err(|e| StageError::Scan {
                table: self.table.clone(),
                message: e.to_string(),
            })?;
        tracing::debug!("Found {} record(s) for {}", items.len(), derived);

        let mut removal = Removal::default();
        for item in items {
            match self.delete_item(item).await {
                Ok(identity) => {
                    tracing::info!("Deleted record {} for {}", identity, derived);
                    removal.deleted += 1;
                }
                Err(e) => {
                    self.reporter.report(&e).await;
                    removal.failed += 1;
                }
            }
        }
        Ok(removal)
    }

    async fn delete_item(&self, item: Item) -> StageResult<String> {
        let identity = match item.get(RECORD_KEY_ATTRIBUTE).and_then(|v| v.as_str()) {
            Some(identity) => identity.to_string(),
            None => {
                return Err(StageError::Scan {
                    table: self.table.clone(),
                    message: format!("matching item has no string {}", RECORD_KEY_ATTRIBUTE),
                })
            }
        };

        self.documents
            .delete(&self.table, &identity)
            .await
            .map_err(|e| StageError::Delete {
                target: format!("{}/{}", self.table, identity),
                source: e,
            })?;
        Ok(identity)
    }
}
