//! Index-write stage: queue messages to provenance records.
//!
//! Every queue body is a topic envelope whose `Message` is the conversion
//! notification, so unwrapping takes two explicit steps, each failing with
//! its own [`EnvelopeLayer`].
//!
//! Idempotency: none. A redelivered notification gets a fresh identity and
//! becomes a second record for the same derived object. Index-delete removes
//! every match and the gallery deduplicates URLs, so duplicates converge.

use std::sync::Arc;

use tracing::Instrument;

use crate::config::Config;
use crate::error::{EnvelopeLayer, StageError, StageResult, StoreError};
use crate::identity::IdentityGenerator;
use crate::ports::{Backends, DocumentStore, Item};
use crate::report::ErrorReporter;
use crate::types::{BatchReport, ConversionNotification, ConversionRecord, QueueMessage, TopicEnvelope};

/// Unwrap the queue layer, returning the topic payload.
pub fn unwrap_queue_body(message: &QueueMessage) -> StageResult<String> {
    let envelope: TopicEnvelope =
        serde_json::from_str(&message.body).map_err(|e| StageError::EnvelopeParse {
            layer: EnvelopeLayer::Queue,
            message_id: message.message_id.clone(),
            message: e.to_string(),
        })?;
    envelope.message.ok_or_else(|| StageError::EnvelopeParse {
        layer: EnvelopeLayer::Queue,
        message_id: message.message_id.clone(),
        message: "topic message can not be empty".to_string(),
    })
}

/// Unwrap the topic layer, returning the conversion notification.
pub fn parse_notification(message_id: &str, payload: &str) -> StageResult<ConversionNotification> {
    serde_json::from_str(payload).map_err(|e| StageError::EnvelopeParse {
        layer: EnvelopeLayer::Topic,
        message_id: message_id.to_string(),
        message: e.to_string(),
    })
}

/// Both unwrapping steps in order.
pub fn unwrap_message(message: &QueueMessage) -> StageResult<ConversionNotification> {
    let payload = unwrap_queue_body(message)?;
    parse_notification(&message.message_id, &payload)
}

/// Serialize a record into a document store item.
pub fn record_to_item(record: &ConversionRecord) -> Result<Item, StoreError> {
    match serde_json::to_value(record) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(other) => Err(StoreError::Serialization(format!(
            "record serialized to non-object: {}",
            other
        ))),
        Err(e) => Err(StoreError::Serialization(e.to_string())),
    }
}

/// Persists conversion notifications as records.
pub struct IndexWriteStage {
    documents: Arc<dyn DocumentStore>,
    identities: Arc<dyn IdentityGenerator>,
    reporter: ErrorReporter,
    table: String,
}

impl IndexWriteStage {
    pub fn new(
        config: &Config,
        backends: &Backends,
        identities: Arc<dyn IdentityGenerator>,
    ) -> Self {
        Self {
            documents: Arc::clone(&backends.documents),
            identities,
            reporter: ErrorReporter::new(Arc::clone(&backends.topics), &config.topics.errors),
            table: config.index.table.clone(),
        }
    }

    /// Handle one batch of queue messages.
    ///
    /// Parse failures are reported per message. A batch with nothing to
    /// index is reported as [`StageError::EmptyBatch`]; the handler still
    /// returns normally.
    pub async fn handle(&self, messages: Vec<QueueMessage>) -> BatchReport {
        let span = tracing::info_span!("index_write", batch = messages.len());
        async {
            let mut report = BatchReport::default();
            let mut notifications = Vec::with_capacity(messages.len());

            for message in &messages {
                tracing::debug!("Queue message {} received: {}", message.message_id, message.body);
                match unwrap_message(message) {
                    Ok(notification) => notifications.push(notification),
                    Err(e) => {
                        self.reporter.report(&e).await;
                        report.failed += 1;
                    }
                }
            }

            if notifications.is_empty() {
                let err = StageError::EmptyBatch {
                    received: messages.len(),
                };
                self.reporter.report(&err).await;
                return report;
            }

            for notification in notifications {
                let result = self.persist(notification).await;
                if let Err(e) = &result {
                    self.reporter.report(e).await;
                }
                report.record(&result);
            }
            tracing::info!("Indexed {} record(s)", report.succeeded);
            report
        }
        .instrument(span)
        .await
    }

    /// Assign a fresh identity and write the record.
    pub async fn persist(&self, notification: ConversionNotification) -> StageResult<ConversionRecord> {
        let record = notification.into_record(self.identities.next_identity());
        let persist_error = |source| StageError::Persist {
            identity: record.identity.clone(),
            source,
        };

        let item = record_to_item(&record).map_err(persist_error)?;
        tracing::info!(
            "Adding record {} for {}",
            record.identity,
            record.notification.convert_key
        );
        self.documents
            .put(&self.table, item)
            .await
            .map_err(persist_error)?;
        Ok(record)
    }
}
