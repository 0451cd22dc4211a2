//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.index.identity_length == 0 {
            return Err(ConfigError::ValidationError(
                "index.identity_length must be > 0".into(),
            ));
        }
        if self.index.table.is_empty() {
            return Err(ConfigError::ValidationError(
                "index.table must not be empty".into(),
            ));
        }
        if self.naming.derived_bucket_suffix.is_empty() && self.naming.derived_key_prefix.is_empty()
        {
            return Err(ConfigError::ValidationError(
                "naming.derived_bucket_suffix and naming.derived_key_prefix cannot both be empty"
                    .into(),
            ));
        }
        if !self.general.url_template.contains("{key}") {
            return Err(ConfigError::ValidationError(
                "general.url_template must contain {key}".into(),
            ));
        }
        if self.convert.max_image_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "convert.max_image_dimension must be > 0".into(),
            ));
        }
        if self.convert.fit_max_dimension == Some(0) {
            return Err(ConfigError::ValidationError(
                "convert.fit_max_dimension must be > 0 when set".into(),
            ));
        }
        if self.deployment.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "deployment.batch_size must be > 0".into(),
            ));
        }
        for topic in [
            &self.topics.converted,
            &self.topics.errors,
            &self.topics.gallery,
        ] {
            if topic.is_empty() {
                return Err(ConfigError::ValidationError(
                    "topics.* identifiers must not be empty".into(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_passes_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_identity_length() {
        let mut config = Config::default();
        config.index.identity_length = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("identity_length"));
    }

    #[test]
    fn test_validate_rejects_empty_naming() {
        let mut config = Config::default();
        config.naming.derived_bucket_suffix.clear();
        config.naming.derived_key_prefix.clear();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cannot both be empty"));
    }

    #[test]
    fn test_validate_rejects_zero_fit() {
        let mut config = Config::default();
        config.convert.fit_max_dimension = Some(0);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("fit_max_dimension"));
    }

    #[test]
    fn test_validate_rejects_empty_topic() {
        let mut config = Config::default();
        config.topics.errors.clear();
        assert!(config.validate().is_err());
    }
}
