//! Typed resources of the backup controller and core secrets, plus the
//! namespace-relative paths used to reach them.

mod backup;
mod download;
mod location;
mod metadata;
mod restore;
mod secret;
mod volume;

pub use backup::*;
pub use download::*;
pub use location::*;
pub use metadata::*;
pub use restore::*;
pub use secret::*;
pub use volume::*;

pub mod paths {
    pub const BACKUP_STORAGE_LOCATIONS: &str = "backupstoragelocations";
    pub const BACKUPS: &str = "backups";
    pub const POD_VOLUME_BACKUPS: &str = "podvolumebackups";
    pub const POD_VOLUME_RESTORES: &str = "podvolumerestores";
    pub const RESTORES: &str = "restores";
    pub const DELETE_BACKUP_REQUESTS: &str = "deletebackuprequests";
    pub const DOWNLOAD_REQUESTS: &str = "downloadrequests";
    pub const SECRETS: &str = "secrets";

    /// `<collection>/<name>`
    pub fn named(collection: &str, name: &str) -> String {
        format!("{}/{}", collection, name)
    }

    /// `<collection>?labelSelector=<key>=<value>`, URL-encoded.
    pub fn with_label(collection: &str, key: &str, value: &str) -> String {
        format!(
            "{}?labelSelector={}",
            collection,
            urlencoding::encode(&format!("{}={}", key, value))
        )
    }

}
