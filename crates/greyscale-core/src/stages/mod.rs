//! Stage handlers.
//!
//! Each stage takes a batch of notifications, processes every item
//! independently, reports per-item failures to the error topic and returns
//! a [`BatchReport`](crate::types::BatchReport). A handler never fails the
//! whole batch.

pub mod backup;
pub mod convert;
pub mod delete;
pub mod gallery;
pub mod index_delete;
pub mod index_write;

pub use backup::BackupStage;
pub use convert::ConvertStage;
pub use delete::DeleteStage;
pub use gallery::GalleryStage;
pub use index_delete::{IndexDeleteStage, Removal};
pub use index_write::IndexWriteStage;
