//! Kubernetes access for Lifeboat.
//!
//! [`ResourceApi`] is the seam every snapshot component talks through: a
//! namespaced, authenticated JSON client whose HTTP statuses are mapped onto
//! [`lifeboat_core::SnapshotError`]. The [`resources`] module holds typed views
//! of the backup controller's custom resources and of core secrets, and decodes
//! the annotation contract into [`resources::BackupAnnotations`] so raw
//! annotation maps never leave this crate.

pub mod client;
pub mod resources;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client::{map_response, ClusterConnection, RawResponse, ResourceApi, ResourceClient};
pub use reqwest::Method;
