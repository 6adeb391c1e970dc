//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. The reconciliation engine depends only on these
//! traits; implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IRemoteStorage`] - Remote object storage (Dropbox)
//! - [`ILocalFileSystem`] - Local filesystem operations

pub mod local_filesystem;
pub mod remote_storage;

pub use local_filesystem::{FileSystemState, ILocalFileSystem};
pub use remote_storage::IRemoteStorage;
