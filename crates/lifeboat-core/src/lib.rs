//! Lifeboat Core Library
//!
//! This crate provides the domain models, error types, configuration and naming
//! helpers shared by every Lifeboat component: the resource client, the snapshot
//! services and the operator CLI.

pub mod config;
pub mod constants;
pub mod error;
pub mod format;
pub mod models;
pub mod naming;
pub mod ttl;

// Re-export commonly used types
pub use config::{Config, DownloadPolicy};
pub use error::{ErrorMetadata, LogLevel, SnapshotError, SnapshotResult};
pub use format::human_bytes;
pub use naming::{get_valid_name, join_prefix};
pub use ttl::{format_ttl, parse_ttl, Ttl, TtlUnit};
