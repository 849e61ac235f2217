//! # Tessera Storages
//!
//! Fan-out and reconciliation for one region's replica backends.
//!
//! - [`Cluster`]: sends a request to every backend and reconciles the outcomes
//! - [`Strategy`]: chooses object, delete or listing reconciliation
//! - [`ObjectPicker`] / [`DeletePicker`]: pick one response from the outcomes
//! - [`merger`]: merges bucket listings into one paginated listing
//! - [`SyncSender`]: records backends that diverged for later repair

pub mod cluster;
pub mod merger;
pub mod picker;
pub mod strategy;
pub mod synclog;

pub use cluster::Cluster;
pub use merger::{ListingKind, ListingMerger};
pub use picker::{DeletePicker, ObjectPicker};
pub use strategy::{is_bucket_path, is_mergable, Strategy};
pub use synclog::{
    DivergenceRecord, FileSyncLog, MemorySyncLog, SyncLogSink, SyncSender, TracingSyncLog,
};
