//! Gallery stage: rebuilds the public page from the provenance table.
//!
//! The page is a pure function of the table contents at scan time, so one
//! rebuild per change batch is enough no matter how many changes it holds.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::Instrument;

use crate::config::Config;
use crate::error::{StageError, StageResult};
use crate::ports::{Backends, BlobStore, DocumentStore, Filter, Topic};
use crate::report::ErrorReporter;
use crate::template::GalleryTemplate;
use crate::types::{BatchReport, ChangeRecord, ObjectLocation};

const PAGE_CONTENT_TYPE: &str = "text/html";

pub struct GalleryStage {
    blobs: Arc<dyn BlobStore>,
    topics: Arc<dyn Topic>,
    documents: Arc<dyn DocumentStore>,
    reporter: ErrorReporter,
    table: String,
    page: ObjectLocation,
    template_path: Option<std::path::PathBuf>,
    deduplicate: bool,
    gallery_topic: String,
}

impl GalleryStage {
    pub fn new(config: &Config, backends: &Backends) -> Self {
        Self {
            blobs: Arc::clone(&backends.blobs),
            topics: Arc::clone(&backends.topics),
            documents: Arc::clone(&backends.documents),
            reporter: ErrorReporter::new(Arc::clone(&backends.topics), &config.topics.errors),
            table: config.index.table.clone(),
            page: ObjectLocation::new(&config.gallery.bucket, &config.gallery.key),
            template_path: config.gallery_template_path(),
            deduplicate: config.gallery.deduplicate,
            gallery_topic: config.topics.gallery.clone(),
        }
    }

    /// Handle one batch of change records with a single rebuild.
    pub async fn handle(&self, changes: Vec<ChangeRecord>) -> BatchReport {
        if changes.is_empty() {
            return BatchReport::default();
        }
        let span = tracing::info_span!("gallery", batch = changes.len());
        async {
            for change in &changes {
                tracing::debug!("{:?} {} on {}", change.kind, change.key, change.table);
            }
            let result = self.rebuild().await;
            if let Err(e) = &result {
                self.reporter.report(e).await;
            }
            let mut report = BatchReport::default();
            report.record(&result);
            report
        }
        .instrument(span)
        .await
    }

    /// Scan, render, publish the page and announce it.
    ///
    /// Returns the number of images on the page.
    pub async fn rebuild(&self) -> StageResult<usize> {
        let urls = self.collect_urls().await?;
        let page = self.render(&urls)?;

        tracing::info!("Uploading gallery page to {}", self.page);
        self.blobs
            .put(&self.page, page.into_bytes(), PAGE_CONTENT_TYPE)
            .await
            .map_err(|e| StageError::StoreWrite {
                location: self.page.clone(),
                source: e,
            })?;

        let message = format!("gallery updated with {} images", urls.len());
        self.topics
            .publish(&self.gallery_topic, &message)
            .await
            .map_err(|e| StageError::Publish {
                topic: self.gallery_topic.clone(),
                source: e,
            })?;
        Ok(urls.len())
    }

    /// Derived URLs of every record, in scan order.
    ///
    /// Items whose URL is not a string are reported and skipped.
    pub async fn collect_urls(&self) -> StageResult<Vec<String>> {
        let items = self
            .documents
            .scan(&self.table, &Filter::exists("convertURL"))
            .await
            .map_err(|e| StageError::Scan {
                table: self.table.clone(),
                message: e.to_string(),
            })?;

        let mut urls: Vec<String> = Vec::with_capacity(items.len());
        let mut seen: HashSet<&str> = HashSet::with_capacity(items.len());
        for item in &items {
            match item.get("convertURL").and_then(|v| v.as_str()) {
                Some(url) => {
                    if self.deduplicate && !seen.insert(url) {
                        continue;
                    }
                    urls.push(url.to_string());
                }
                None => {
                    let err = StageError::Scan {
                        table: self.table.clone(),
                        message: format!(
                            "record {} has a non-string convertURL",
                            item.get("imageConverter").cloned().unwrap_or_default()
                        ),
                    };
                    self.reporter.report(&err).await;
                }
            }
        }
        tracing::debug!("Collected {} url(s) from {} item(s)", urls.len(), items.len());
        Ok(urls)
    }

    /// Render the page, reading the template fresh each time.
    pub fn render(&self, urls: &[String]) -> StageResult<String> {
        let template = match &self.template_path {
            Some(path) => GalleryTemplate::load(path),
            None => GalleryTemplate::builtin(),
        }?;
        Ok(template.render(urls))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{MemoryBlobStore, MemoryDocumentStore, MemoryTopic};
    use crate::types::ChangeKind;
    use serde_json::json;

    struct Harness {
        blobs: Arc<MemoryBlobStore>,
        topics: Arc<MemoryTopic>,
        documents: Arc<MemoryDocumentStore>,
        backends: Backends,
    }

    fn harness() -> Harness {
        let blobs = Arc::new(MemoryBlobStore::new());
        let topics = Arc::new(MemoryTopic::new());
        let documents = Arc::new(MemoryDocumentStore::new().with_table("Image", "imageConverter"));
        let backends = Backends {
            blobs: blobs.clone(),
            topics: topics.clone(),
            documents: documents.clone(),
        };
        Harness {
            blobs,
            topics,
            documents,
            backends,
        }
    }

    async fn insert(h: &Harness, id: &str, url: serde_json::Value) {
        let item = json!({ "imageConverter": id, "convertURL": url });
        h.documents
            .put("Image", item.as_object().unwrap().clone())
            .await
            .unwrap();
    }

    fn change() -> ChangeRecord {
        ChangeRecord {
            event_id: "1".to_string(),
            kind: ChangeKind::Insert,
            table: "Image".to_string(),
            key: "a".to_string(),
        }
    }

    fn page(h: &Harness) -> String {
        let object = h
            .blobs
            .object(&ObjectLocation::new("greyscale-website", "index.html"))
            .unwrap();
        assert_eq!(object.content_type.as_deref(), Some("text/html"));
        String::from_utf8(object.bytes).unwrap()
    }

    #[tokio::test]
    async fn test_rebuild_lists_every_url() {
        let h = harness();
        insert(&h, "a", json!("https://c/converted-1.jpg")).await;
        insert(&h, "b", json!("https://c/converted-2.jpg")).await;

        let stage = GalleryStage::new(&Config::default(), &h.backends);
        let report = stage.handle(vec![change(), change()]).await;
        assert_eq!(report, BatchReport { succeeded: 1, failed: 0 });

        let html = page(&h);
        assert!(html.contains("https://c/converted-1.jpg"));
        assert!(html.contains("https://c/converted-2.jpg"));
        assert_eq!(
            h.topics.messages("websiteUpdated"),
            vec!["gallery updated with 2 images".to_string()]
        );
    }

    #[tokio::test]
    async fn test_empty_batch_does_nothing() {
        let h = harness();
        let stage = GalleryStage::new(&Config::default(), &h.backends);
        let report = stage.handle(Vec::new()).await;

        assert_eq!(report, BatchReport::default());
        assert!(h.blobs.list("greyscale-website").is_empty());
    }

    #[tokio::test]
    async fn test_rerun_is_byte_identical() {
        let h = harness();
        insert(&h, "a", json!("https://c/1.jpg")).await;
        let stage = GalleryStage::new(&Config::default(), &h.backends);

        stage.rebuild().await.unwrap();
        let first = page(&h);
        stage.rebuild().await.unwrap();
        assert_eq!(first, page(&h));
    }

    #[tokio::test]
    async fn test_duplicate_urls_collapse() {
        let h = harness();
        insert(&h, "a", json!("https://c/1.jpg")).await;
        insert(&h, "b", json!("https://c/1.jpg")).await;

        let stage = GalleryStage::new(&Config::default(), &h.backends);
        assert_eq!(stage.rebuild().await.unwrap(), 1);

        let mut config = Config::default();
        config.gallery.deduplicate = false;
        let stage = GalleryStage::new(&config, &h.backends);
        assert_eq!(stage.rebuild().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_dedup_keeps_first_occurrence_order_at_scale() {
        let h = harness();
        for i in 0..600 {
            insert(&h, &format!("id-{:04}", i), json!(format!("https://c/{}.jpg", i % 150))).await;
        }

        let stage = GalleryStage::new(&Config::default(), &h.backends);
        let urls = stage.collect_urls().await.unwrap();
        let expected: Vec<String> = (0..150).map(|i| format!("https://c/{}.jpg", i)).collect();
        assert_eq!(urls, expected);
    }

    #[tokio::test]
    async fn test_items_without_url_are_skipped() {
        let h = harness();
        insert(&h, "a", json!("https://c/1.jpg")).await;
        insert(&h, "b", json!("")).await;
        insert(&h, "c", json!(42)).await;

        let stage = GalleryStage::new(&Config::default(), &h.backends);
        assert_eq!(stage.rebuild().await.unwrap(), 1);

        let errors = h.topics.messages("imageErrors");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("non-string convertURL"));
    }

    #[tokio::test]
    async fn test_bad_template_is_reported() {
        let h = harness();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.html");
        std::fs::write(&path, "{{#images}}").unwrap();

        let mut config = Config::default();
        config.gallery.template = Some(path);
        let stage = GalleryStage::new(&config, &h.backends);
        let report = stage.handle(vec![change()]).await;

        assert_eq!(report, BatchReport { succeeded: 0, failed: 1 });
        assert!(h.blobs.list("greyscale-website").is_empty());
        assert!(h.topics.messages("imageErrors")[0].contains("Template error"));
    }

    #[tokio::test]
    async fn test_custom_template() {
        let h = harness();
        insert(&h, "a", json!("https://c/1.jpg")).await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.html");
        std::fs::write(&path, "{{count}}:{{#images}}[{{url}}]{{/images}}").unwrap();

        let mut config = Config::default();
        config.gallery.template = Some(path);
        GalleryStage::new(&config, &h.backends).rebuild().await.unwrap();

        assert_eq!(page(&h), "1:[https://c/1.jpg]");
    }
}
