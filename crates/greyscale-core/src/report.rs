//! Out-of-band failure reporting.

use std::fmt::Display;
use std::sync::Arc;

use crate::ports::Topic;

/// Publishes failures to the error topic.
///
/// Reporting is best-effort: if the publish itself fails, that failure is
/// logged and swallowed so it can never fail the invocation.
#[derive(Clone)]
pub struct ErrorReporter {
    topics: Arc<dyn Topic>,
    topic: String,
}

impl ErrorReporter {
    pub fn new(topics: Arc<dyn Topic>, topic: impl Into<String>) -> Self {
        Self {
            topics,
            topic: topic.into(),
        }
    }

    pub async fn report(&self, error: &(dyn Display + Sync)) {
        tracing::error!(action = "error", "{}", error);

        let message = format!("error : {}", error);
        if let Err(e) = self.topics.publish(&self.topic, &message).await {
            tracing::error!(action = "error", "error publishing to {}: {}", self.topic, e);
        }
    }
}
