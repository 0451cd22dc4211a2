//! Deterministic object naming and rendered URLs.
//!
//! The derived location is a pure function of the source location. Both the
//! convert stage (to write) and the compensating stages (to delete) compute
//! it independently, which is what lets deletion work without a lookup.

use crate::config::{Config, NamingConfig};
use crate::types::ObjectLocation;

/// Computes derived, backup and public locations from configuration.
#[derive(Debug, Clone)]
pub struct Naming {
    naming: NamingConfig,
    region: String,
    url_template: String,
}

impl Naming {
    pub fn new(config: &Config) -> Self {
        Self {
            naming: config.naming.clone(),
            region: config.general.region.clone(),
            url_template: config.general.url_template.clone(),
        }
    }

    /// `{bucket}{suffix}` / `{prefix}{key}`.
    pub fn derived(&self, source: &ObjectLocation) -> ObjectLocation {
        ObjectLocation {
            bucket: self.derived_bucket(&source.bucket),
            key: format!("{}{}", self.naming.derived_key_prefix, source.key),
        }
    }

    pub fn derived_bucket(&self, source_bucket: &str) -> String {
        format!("{}{}", source_bucket, self.naming.derived_bucket_suffix)
    }

    /// Backup copy of a published object: same key, suffixed bucket.
    pub fn backup(&self, location: &ObjectLocation) -> ObjectLocation {
        ObjectLocation {
            bucket: format!("{}{}", location.bucket, self.naming.backup_bucket_suffix),
            key: location.key.clone(),
        }
    }

    /// Human-resolvable address of an object.
    pub fn rendered_url(&self, location: &ObjectLocation) -> String {
        self.url_template
            .replace("{bucket}", &location.bucket)
            .replace("{region}", &self.region)
            .replace("{key}", &location.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naming() -> Naming {
        Naming::new(&Config::default())
    }

    #[test]
    fn test_derived_location() {
        let derived = naming().derived(&ObjectLocation::new("site", "photo.jpg"));
        assert_eq!(derived, ObjectLocation::new("site-convert", "converted-photo.jpg"));
    }

    #[test]
    fn test_derived_location_is_deterministic() {
        let n = naming();
        let source = ObjectLocation::new("site", "albums/2024/photo.jpg");
        assert_eq!(n.derived(&source), n.derived(&source));
    }

    #[test]
    fn test_distinct_sources_do_not_collide() {
        let n = naming();
        let sources = [
            ObjectLocation::new("site", "a.jpg"),
            ObjectLocation::new("site", "b.jpg"),
            ObjectLocation::new("other", "a.jpg"),
            ObjectLocation::new("site", "converted-a.jpg"),
        ];
        let derived: std::collections::HashSet<_> = sources.iter().map(|s| n.derived(s)).collect();
        assert_eq!(derived.len(), sources.len());
    }

    #[test]
    fn test_rendered_url() {
        let url = naming().rendered_url(&ObjectLocation::new("site-convert", "converted-photo.jpg"));
        assert_eq!(
            url,
            "https://site-convert.s3-eu-west-1.amazonaws.com/converted-photo.jpg"
        );
    }

    #[test]
    fn test_backup_location() {
        let backup = naming().backup(&ObjectLocation::new("greyscale-website", "index.html"));
        assert_eq!(backup, ObjectLocation::new("greyscale-website-backup", "index.html"));
    }
}
