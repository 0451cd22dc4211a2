//! Pluggable pixel transformation chain.
//!
//! A [`TransformChain`] holds an ordered list of [`TransformAction`]s and
//! applies them in registration order. Actions borrow their input and return
//! a new image, so a failed chain never leaves a half-transformed image
//! visible to the caller.

pub mod fit;
pub mod greyscale;

pub use fit::FitAction;
pub use greyscale::GreyscaleAction;

use image::DynamicImage;

use crate::config::ConvertConfig;
use crate::error::TransformError;

/// A pure image-to-image function.
pub trait TransformAction: Send + Sync {
    /// Stable name, used in error reports and for removal.
    fn name(&self) -> &str;

    /// Produce a new image from `image` without mutating it.
    fn apply(&self, image: &DynamicImage) -> Result<DynamicImage, TransformError>;
}

/// Ordered sequence of transform actions.
#[derive(Default)]
pub struct TransformChain {
    actions: Vec<Box<dyn TransformAction>>,
}

impl TransformChain {
    /// Create an empty chain. Applying it returns a copy of the input.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the chain the convert stage runs: greyscale, then an optional fit.
    pub fn from_config(config: &ConvertConfig) -> Self {
        let mut chain = Self::new().with_action(GreyscaleAction);
        if let Some(max) = config.fit_max_dimension {
            chain.add_action(FitAction::new(max));
        }
        chain
    }

    /// Append an action to the end of the chain.
    pub fn add_action<A: TransformAction + 'static>(&mut self, action: A) {
        self.actions.push(Box::new(action));
    }

    /// Builder-style [`add_action`](Self::add_action).
    pub fn with_action<A: TransformAction + 'static>(mut self, action: A) -> Self {
        self.add_action(action);
        self
    }

    /// Remove every action with the given name. Returns how many were removed.
    pub fn remove_action(&mut self, name: &str) -> usize {
        let before = self.actions.len();
        self.actions.retain(|a| a.name() != name);
        before - self.actions.len()
    }

    /// Names of the registered actions, in application order.
    pub fn action_names(&self) -> Vec<&str> {
        self.actions.iter().map(|a| a.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Apply every action in order, stopping at the first failure.
    pub fn apply(&self, image: &DynamicImage) -> Result<DynamicImage, TransformError> {
        let mut current = image.clone();
        for action in &self.actions {
            current = action.apply(&current)?;
            tracing::trace!("  Transform '{}' done", action.name());
        }
        Ok(current)
    }
}

impl std::fmt::Debug for TransformChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformChain")
            .field("actions", &self.action_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Failing;

    impl TransformAction for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn apply(&self, _image: &DynamicImage) -> Result<DynamicImage, TransformError> {
            Err(TransformError::new("failing", "always fails"))
        }
    }

    struct Counting(Arc<AtomicUsize>);

    impl TransformAction for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        fn apply(&self, image: &DynamicImage) -> Result<DynamicImage, TransformError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(image.clone())
        }
    }

    /// Records the red channel of the top-left pixel it receives.
    struct Recorder(Arc<std::sync::Mutex<Vec<u8>>>);

    impl TransformAction for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn apply(&self, image: &DynamicImage) -> Result<DynamicImage, TransformError> {
            self.0.lock().unwrap().push(image.get_pixel(0, 0).0[0]);
            Ok(image.clone())
        }
    }

    fn red_image() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([200, 10, 10])))
    }

    #[test]
    fn test_empty_chain_returns_copy() {
        let img = red_image();
        let out = TransformChain::new().apply(&img).unwrap();
        assert_eq!(out.as_bytes(), img.as_bytes());
    }

    #[test]
    fn test_actions_run_in_registration_order() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let chain = TransformChain::new()
            .with_action(Recorder(seen.clone()))
            .with_action(GreyscaleAction)
            .with_action(Recorder(seen.clone()));

        chain.apply(&red_image()).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], 200);
        assert_ne!(seen[1], 200);
    }

    #[test]
    fn test_failure_aborts_chain() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = TransformChain::new()
            .with_action(GreyscaleAction)
            .with_action(Failing)
            .with_action(Counting(calls.clone()));

        let err = chain.apply(&red_image()).unwrap_err();
        assert_eq!(err.action, "failing");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_input_is_not_mutated() {
        let img = red_image();
        let before = img.as_bytes().to_vec();
        TransformChain::new()
            .with_action(GreyscaleAction)
            .apply(&img)
            .unwrap();
        assert_eq!(img.as_bytes(), before.as_slice());
    }

    #[test]
    fn test_remove_action_by_name() {
        let mut chain = TransformChain::new()
            .with_action(GreyscaleAction)
            .with_action(FitAction::new(64))
            .with_action(GreyscaleAction);
        assert_eq!(chain.remove_action("greyscale"), 2);
        assert_eq!(chain.action_names(), vec!["fit"]);
    }

    #[test]
    fn test_from_config() {
        let mut config = ConvertConfig::default();
        assert_eq!(TransformChain::from_config(&config).action_names(), vec!["greyscale"]);

        config.fit_max_dimension = Some(512);
        assert_eq!(
            TransformChain::from_config(&config).action_names(),
            vec!["greyscale", "fit"]
        );
    }
}
