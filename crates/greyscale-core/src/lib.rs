//! Greyscale Core - event-driven greyscale image conversion.
//!
//! Greyscale is a choreography of independent stages that communicate only
//! through stores and notifications:
//!
//! ```text
//! upload → Convert → topic → queue → Index-Write → table stream → Gallery
//! remove → Delete + Index-Delete → table stream → Gallery
//! ```
//!
//! Every stage is written against the traits in [`ports`], so the same
//! handlers run against hosted services or the in-memory backends used by
//! [`LocalDeployment`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use greyscale_core::{Config, LocalDeployment, ObjectLocation, RandomIdentity};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> greyscale_core::Result<()> {
//!     let config = Config::load()?;
//!     let identities = Arc::new(RandomIdentity::new(config.index.identity_length));
//!     let deployment = LocalDeployment::start(&config, identities);
//!
//!     let photo = ObjectLocation::new("greyscale-images", "photo.jpg");
//!     deployment.upload(&photo, std::fs::read("photo.jpg")?, "image/jpeg").await?;
//!     deployment.settle().await;
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod bus;
pub mod codec;
pub mod config;
pub mod deployment;
pub mod discovery;
pub mod error;
pub mod identity;
pub mod naming;
pub mod ports;
pub mod report;
pub mod stages;
pub mod template;
pub mod transform;
pub mod types;

// Re-exports for convenient access
pub use config::Config;
pub use deployment::{LocalBackends, LocalDeployment};
pub use discovery::{DiscoveredFile, FileDiscovery};
pub use error::{
    CodecError, ConfigError, GreyscaleError, Result, StageError, StageResult, StoreError,
    TemplateError,
};
pub use identity::{IdentityGenerator, RandomIdentity};
pub use naming::Naming;
pub use ports::{Backends, BlobStore, DocumentStore, Filter, Item, Topic};
pub use stages::{
    BackupStage, ConvertStage, DeleteStage, GalleryStage, IndexDeleteStage, IndexWriteStage,
};
pub use transform::{TransformAction, TransformChain};
pub use types::{
    BatchReport, ConversionNotification, ConversionRecord, ObjectEvent, ObjectLocation,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
