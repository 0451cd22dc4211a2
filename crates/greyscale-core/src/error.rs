//! Error types for the greyscale choreography.
//!
//! Errors are organized by stage so that a report on the error topic says
//! which step failed and for which object, without needing the logs.

use std::fmt;

use thiserror::Error;

use crate::types::ObjectLocation;

/// Top-level error type for greyscale operations.
#[derive(Error, Debug)]
pub enum GreyscaleError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Stage processing errors
    #[error("Stage error: {0}")]
    Stage(#[from] StageError),

    /// Backend errors outside of a stage
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Errors raised by blob, topic and document backends.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The addressed object or item does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The backend could not be reached or refused the operation
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// An item could not be converted to or from its stored form
    #[error("serialization: {0}")]
    Serialization(String),
}

/// Which envelope layer failed to parse on the queue path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeLayer {
    /// The queue body, which must be a topic envelope with a `Message` field
    Queue,
    /// The topic payload, which must be a conversion notification
    Topic,
}

impl fmt::Display for EnvelopeLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queue => f.write_str("queue"),
            Self::Topic => f.write_str("topic"),
        }
    }
}

/// Failure of a single transform action.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("action '{action}' failed: {message}")]
pub struct TransformError {
    /// Name of the action that failed
    pub action: String,
    /// What went wrong
    pub message: String,
}

impl TransformError {
    pub fn new(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            message: message.into(),
        }
    }
}

/// Decoding and encoding failures of the image codec.
#[derive(Error, Debug)]
pub enum CodecError {
    /// The content sniffer could not read the buffer
    #[error("Cannot detect image format: {0}")]
    Detect(#[source] std::io::Error),

    /// The content matched no supported format
    #[error("Unsupported or unrecognized image format")]
    UnknownFormat,

    /// The decoder rejected the bytes
    #[error("{0}")]
    Decode(#[source] image::ImageError),

    /// Decoded dimensions exceed the configured ceiling
    #[error("Image too large: {width}x{height} > {max}")]
    TooLarge { width: u32, height: u32, max: u32 },

    /// The encoder rejected the image
    #[error("{0}")]
    Encode(#[source] image::ImageError),
}

/// Gallery template parse and load failures.
#[derive(Error, Debug)]
pub enum TemplateError {
    /// `{{` with no matching `}}`
    #[error("unclosed tag at byte {offset}")]
    UnclosedTag { offset: usize },

    /// `{{url}}` outside an images block
    #[error("{{{{url}}}} is only valid inside {{{{#images}}}}")]
    UrlOutsideBlock,

    /// An images block opened inside another one
    #[error("{{{{#images}}}} blocks cannot be nested")]
    NestedBlock,

    /// `{{/images}}` with no open block
    #[error("{{{{/images}}}} without matching {{{{#images}}}}")]
    UnmatchedClose,

    /// An images block still open at end of input
    #[error("{{{{#images}}}} is never closed")]
    UnclosedBlock,

    /// Any other tag
    #[error("unknown tag '{{{{{0}}}}}'")]
    UnknownTag(String),

    /// The template file could not be read
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
}

/// Per-item stage failures. Each one is reported to the error topic.
#[derive(Error, Debug)]
pub enum StageError {
    /// Source object missing or inaccessible
    #[error("Fetch failed for {location}: {source}")]
    Fetch {
        location: ObjectLocation,
        source: StoreError,
    },

    /// Source bytes are not a decodable image
    #[error("Decode error for {location}: {source}")]
    Decode {
        location: ObjectLocation,
        source: CodecError,
    },

    /// A transform action failed
    #[error("Transform failed for {location}: {source}")]
    Transform {
        location: ObjectLocation,
        source: TransformError,
    },

    /// The transformed image could not be encoded
    #[error("Encode error for {location}: {source}")]
    Encode {
        location: ObjectLocation,
        source: CodecError,
    },

    /// The blocking conversion task died before returning a result
    #[error("Conversion worker failed for {location}: {message}")]
    Worker {
        location: ObjectLocation,
        message: String,
    },

    /// Writing an object to the blob store failed
    #[error("Store write failed for {location}: {source}")]
    StoreWrite {
        location: ObjectLocation,
        source: StoreError,
    },

    /// Deleting an object or record failed
    #[error("Delete failed for {target}: {source}")]
    Delete { target: String, source: StoreError },

    /// A queue message could not be unwrapped
    #[error("Envelope parse error ({layer} layer) in message {message_id}: {message}")]
    EnvelopeParse {
        layer: EnvelopeLayer,
        message_id: String,
        message: String,
    },

    /// Writing a record to the document store failed
    #[error("Persist failed for record {identity}: {source}")]
    Persist {
        identity: String,
        source: StoreError,
    },

    /// Scanning the document store failed, or a scanned item was malformed
    #[error("Scan of table {table} failed: {message}")]
    Scan { table: String, message: String },

    /// The gallery template could not be parsed or rendered
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// Publishing to a topic failed
    #[error("Publish to {topic} failed: {source}")]
    Publish { topic: String, source: StoreError },

    /// A queue batch yielded nothing to index
    #[error("Batch of {received} message(s) contained no conversion notifications")]
    EmptyBatch { received: usize },
}

/// Convenience type alias for greyscale results.
pub type Result<T> = std::result::Result<T, GreyscaleError>;

/// Convenience type alias for stage-specific results.
pub type StageResult<T> = std::result::Result<T, StageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_error_names_layer() {
        let err = StageError::EnvelopeParse {
            layer: EnvelopeLayer::Topic,
            message_id: "m-1".to_string(),
            message: "missing field `sourceBucket`".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("topic layer"));
        assert!(text.contains("m-1"));
    }

    #[test]
    fn test_fetch_error_names_location() {
        let err = StageError::Fetch {
            location: ObjectLocation::new("site", "photo.jpg"),
            source: StoreError::NotFound("site/photo.jpg".to_string()),
        };
        assert!(err.to_string().contains("site/photo.jpg"));
    }

    #[test]
    fn test_template_errors_render_tags() {
        assert_eq!(
            TemplateError::UrlOutsideBlock.to_string(),
            "{{url}} is only valid inside {{#images}}"
        );
        assert_eq!(
            TemplateError::UnknownTag("title".to_string()).to_string(),
            "unknown tag '{{title}}'"
        );
    }

    #[test]
    fn test_codec_error_keeps_dimensions() {
        let err = CodecError::TooLarge {
            width: 9000,
            height: 10,
            max: 8192,
        };
        assert_eq!(err.to_string(), "Image too large: 9000x10 > 8192");
    }
}
