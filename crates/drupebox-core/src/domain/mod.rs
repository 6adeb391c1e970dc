//! Domain types
//!
//! This module contains the core value types for Drupebox:
//! - Path newtypes separating canonical remote paths from local paths
//! - The exclusion set and name-based ignore rules
//! - Remote entries and change-feed events
//! - The per-run sync policy
//! - Domain-specific error types

pub mod entry;
pub mod errors;
pub mod paths;
pub mod policy;

// Re-export commonly used types
pub use entry::{Cursor, DeleteOutcome, EntryKind, RemoteChange, RemoteEntry};
pub use errors::DomainError;
pub use paths::{ExclusionSet, RemotePath, SyncRoot};
pub use policy::{IgnoreRules, SkipReason, SyncPolicy};
