//! Local snapshot cache.
//!
//! # Responsibilities
//! - Keep the last accepted configuration on local disk
//! - Seed a restarting node before it reaches the cluster
//!
//! # Design Decisions
//! - One JSON file per (category, key)
//! - Write-then-rename: a stale but valid file beats a partial one
//! - Only the write-queue worker writes; only startup reads

pub mod store;

pub use store::{LocalSnapshotStore, SnapshotError};
