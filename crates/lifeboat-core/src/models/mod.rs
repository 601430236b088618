//! Data models for snapshot and restore orchestration
//!
//! Each sub-module represents a specific feature area.

mod app;
mod restore;
mod snapshot;
mod store;

pub use app::*;
pub use restore::*;
pub use snapshot::*;
pub use store::*;
