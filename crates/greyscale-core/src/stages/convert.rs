//! Convert stage: source object to greyscale derived object.
//!
//! Idempotency: the derived location is computed from the source location,
//! so a redelivered notification overwrites the same object and publishes a
//! second, identical notification.

use std::sync::Arc;

use tracing::Instrument;

use crate::codec::{format_to_string, ImageCodec};
use crate::config::Config;
use crate::error::{StageError, StageResult, StoreError};
use crate::naming::Naming;
use crate::ports::{Backends, BlobStore, Topic};
use crate::report::ErrorReporter;
use crate::transform::TransformChain;
use crate::types::{
    BatchReport, ConversionNotification, ObjectEvent, ObjectEventKind, ObjectLocation,
};

/// Converts newly created source objects.
pub struct ConvertStage {
    blobs: Arc<dyn BlobStore>,
    topics: Arc<dyn Topic>,
    reporter: ErrorReporter,
    naming: Naming,
    codec: ImageCodec,
    chain: Arc<TransformChain>,
    converted_topic: String,
}

impl ConvertStage {
    pub fn new(config: &Config, backends: &Backends) -> Self {
        Self::with_chain(config, backends, TransformChain::from_config(&config.convert))
    }

    /// Use a custom transform chain instead of the configured one.
    pub fn with_chain(config: &Config, backends: &Backends, chain: TransformChain) -> Self {
        Self {
            blobs: Arc::clone(&backends.blobs),
            topics: Arc::clone(&backends.topics),
            reporter: ErrorReporter::new(Arc::clone(&backends.topics), &config.topics.errors),
            naming: Naming::new(config),
            codec: ImageCodec::new(&config.convert),
            chain: Arc::new(chain),
            converted_topic: config.topics.converted.clone(),
        }
    }

    /// Handle one batch of object notifications.
    ///
    /// Each failure is reported and the next notification is processed.
    pub async fn handle(&self, events: Vec<ObjectEvent>) -> BatchReport {
        let span = tracing::info_span!("convert", batch = events.len());
        async {
            let mut report = BatchReport::default();
            for event in &events {
                if event.kind != ObjectEventKind::Created {
                    tracing::debug!("Ignoring {:?} event for {}", event.kind, event.location);
                    continue;
                }
                let result = self.convert(&event.location).await;
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

    /// Convert one source object and announce the result.
    pub async fn convert(&self, source: &ObjectLocation) -> StageResult<ConversionNotification> {
        let derived = self.naming.derived(source);

        tracing::info!("Getting image '{}' from bucket '{}'", source.key, source.bucket);
        let object = self
            .blobs
            .get(source)
            .await
            .map_err(|e| StageError::Fetch {
                location: source.clone(),
                source: e,
            })?;

        tracing::debug!("Decoding buffer of size {}", object.bytes.len());
        let (encoded, detected) = self.process_bytes(source, object.bytes).await?;

        let image_type = object
            .content_type
            .filter(|ct| !ct.is_empty())
            .unwrap_or_else(|| format!("image/{}", detected));

        tracing::info!("Uploading image {} to bucket {}", derived.key, derived.bucket);
        self.blobs
            .put(&derived, encoded, self.codec.content_type())
            .await
            .map_err(|e| StageError::StoreWrite {
                location: derived.clone(),
                source: e,
            })?;

        let notification = ConversionNotification {
            source_bucket: source.bucket.clone(),
            source_key: source.key.clone(),
            source_url: self.naming.rendered_url(source),
            convert_bucket: derived.bucket.clone(),
            convert_key: derived.key.clone(),
            convert_url: self.naming.rendered_url(&derived),
            image_type,
        };

        let message = serde_json::to_string(&notification).map_err(|e| StageError::Publish {
            topic: self.converted_topic.clone(),
            source: StoreError::Serialization(e.to_string()),
        })?;

        tracing::debug!("Sending message: {}", message);
        self.topics
            .publish(&self.converted_topic, &message)
            .await
            .map_err(|e| StageError::Publish {
                topic: self.converted_topic.clone(),
                source: e,
            })?;

        Ok(notification)
    }

    /// Decode, transform and encode on the blocking pool.
    ///
    /// Returns the encoded bytes and the detected source format.
    async fn process_bytes(
        &self,
        source: &ObjectLocation,
        bytes: Vec<u8>,
    ) -> StageResult<(Vec<u8>, String)> {
        let codec = self.codec.clone();
        let chain = Arc::clone(&self.chain);
        let location = source.clone();

        let joined = tokio::task::spawn_blocking(move || -> StageResult<(Vec<u8>, String)> {
            let decoded = codec.decode(&bytes).map_err(|e| StageError::Decode {
                location: location.clone(),
                source: e,
            })?;
            tracing::trace!("  Decoded {}x{}", decoded.width, decoded.height);

            let transformed = chain
                .apply(&decoded.image)
                .map_err(|e| StageError::Transform {
                    location: location.clone(),
                    source: e,
                })?;

            let encoded = codec
                .encode(&transformed)
                .map_err(|e| StageError::Encode {
                    location: location.clone(),
                    source: e,
                })?;
            Ok((encoded, format_to_string(decoded.format)))
        })
        .await;

        match joined {
            Ok(result) => result,
            Err(e) => Err(StageError::Worker {
                location: source.clone(),
                message: e.to_string(),
            }),
        }
    }
}
