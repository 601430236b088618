//! Resource naming helpers.
//!
//! Names and label values generated here must fit a DNS label. Long inputs are
//! truncated and suffixed with a short digest of the full input so distinct
//! inputs stay distinct.

use sha2::{Digest, Sha256};

use crate::constants::MAX_DNS_LABEL_LENGTH;

const DIGEST_SUFFIX_LENGTH: usize = 6;

/// Fit `name` into a DNS label.
///
/// Inputs of at most 63 characters are returned unchanged. Longer inputs keep
/// their first 57 characters followed by the first 6 hex characters of the
/// SHA-256 digest of the whole input. The output always satisfies the length
/// limit, so applying the function twice is the same as applying it once.
pub fn get_valid_name(name: &str) -> String {
    if name.chars().count() <= MAX_DNS_LABEL_LENGTH {
        return name.to_string();
    }

    let digest = hex::encode(Sha256::digest(name.as_bytes()));
    let head: String = name
        .chars()
        .take(MAX_DNS_LABEL_LENGTH - DIGEST_SUFFIX_LENGTH)
        .collect();

    format!("{}{}", head, &digest[..DIGEST_SUFFIX_LENGTH])
}

/// Join an object-store prefix and an application slug with a single `/`.
pub fn join_prefix(prefix: &str, slug: &str) -> String {
    let prefix = prefix.trim_matches('/');
    let slug = slug.trim_matches('/');
    if prefix.is_empty() {
        return slug.to_string();
    }
    format!("{}/{}", prefix, slug)
}

/// Name of a restore created from `backup_name` at `unix_seconds`.
pub fn restore_name(backup_name: &str, unix_seconds: i64) -> String {
    format!("{}-{}", backup_name, unix_seconds)
}

/// Name of a backup of the application `slug` created at `unix_seconds`.
pub fn backup_name(slug: &str, unix_seconds: i64) -> String {
    get_valid_name(&format!("{}-{}", slug, unix_seconds))
}

/// Deterministic, length-safe name of a download request.
pub fn download_request_name(target_name: &str, kind: &str, unix_seconds: i64) -> String {
    get_valid_name(&format!("{}-{}-{}", target_name, kind, unix_seconds))
}
