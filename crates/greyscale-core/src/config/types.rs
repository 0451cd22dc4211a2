//! Sub-configuration structs with defaults matching the deployed topology.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Region used only to build rendered URLs
    pub region: String,

    /// Public URL template with `{bucket}`, `{region}` and `{key}` placeholders
    pub url_template: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            region: "eu-west-1".to_string(),
            url_template: "https://{bucket}.s3-{region}.amazonaws.com/{key}".to_string(),
        }
    }
}

/// Naming convention for derived and backup objects.
///
/// Derived locations are computed, never looked up, so changing these values
/// orphans every object written under the old convention.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// Appended to the source bucket to form the derived bucket
    pub derived_bucket_suffix: String,

    /// Prepended to the source key to form the derived key
    pub derived_key_prefix: String,

    /// Appended to the gallery bucket to form the backup bucket
    pub backup_bucket_suffix: String,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            derived_bucket_suffix: "-convert".to_string(),
            derived_key_prefix: "converted-".to_string(),
            backup_bucket_suffix: "-backup".to_string(),
        }
    }
}

/// Topic identifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicsConfig {
    /// Receives one conversion notification per converted image
    pub converted: String,

    /// Receives every reported failure
    pub errors: String,

    /// Receives one announcement per gallery rebuild
    pub gallery: String,
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            converted: "imageConverted".to_string(),
            errors: "imageErrors".to_string(),
            gallery: "websiteUpdated".to_string(),
        }
    }
}

/// Provenance index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Document store table holding conversion records
    pub table: String,

    /// Length of generated record identities
    pub identity_length: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            table: "Image".to_string(),
            identity_length: 10,
        }
    }
}

/// Output container for derived images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodeFormat {
    Png,
    Jpeg,
}

impl EncodeFormat {
    /// MIME type written alongside derived objects.
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }
}

/// Convert stage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// Output container, always written at maximum quality
    pub format: EncodeFormat,

    /// Reject decoded images whose width or height exceeds this
    pub max_image_dimension: u32,

    /// Downscale so the longest edge fits, applied after greyscale
    pub fit_max_dimension: Option<u32>,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            format: EncodeFormat::Png,
            max_image_dimension: 10000,
            fit_max_dimension: None,
        }
    }
}

/// Gallery page settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GalleryConfig {
    /// Bucket the page is published to
    pub bucket: String,

    /// Key the page is published under
    pub key: String,

    /// Custom page template; the built-in template is used when unset
    pub template: Option<PathBuf>,

    /// List each rendered URL once even if several records carry it
    pub deduplicate: bool,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            bucket: "greyscale-website".to_string(),
            key: "index.html".to_string(),
            template: None,
            deduplicate: true,
        }
    }
}

/// Local deployment wiring.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentConfig {
    /// Buckets whose notifications feed the convert and delete stages
    pub source_buckets: Vec<String>,

    /// Maximum notifications handed to one stage invocation
    pub batch_size: usize,

    /// Copy the gallery page to the backup bucket whenever it is written
    pub backup_gallery: bool,

    /// Supported input file extensions for directory uploads
    pub supported_formats: Vec<String>,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            source_buckets: vec!["greyscale-images".to_string()],
            batch_size: 10,
            backup_gallery: true,
            supported_formats: vec![
                "jpg".to_string(),
                "jpeg".to_string(),
                "png".to_string(),
                "gif".to_string(),
                "bmp".to_string(),
                "webp".to_string(),
                "tiff".to_string(),
            ],
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
