//! Drupebox Core - Domain types and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain types** - `RemotePath`, `SyncRoot`, `ExclusionSet`, `RemoteEntry`, `SyncPolicy`
//! - **Port definitions** - Traits for adapters: `IRemoteStorage`, `ILocalFileSystem`
//! - **Configuration** - YAML-backed `Config` with validation and a builder
//!
//! # Architecture
//!
//! The domain module holds pure value types with no I/O. Ports define the
//! trait interfaces that adapter crates (`drupebox-dropbox`, the local
//! filesystem adapter in `drupebox-sync`) implement, and the reconciliation
//! engine depends only on these traits.

pub mod config;
pub mod domain;
pub mod ports;
