//! On-disk storage for book cover images.
//!
//! Files are either uploaded by the client or fetched server-side from a URL.
//! Every write goes to a `.part` file first and is renamed into place only once
//! the whole body was accepted, so a filename handed back to the caller always
//! names a complete file and a failed write never leaves anything behind.
//! A new asset comes back as a [`PendingAsset`] that deletes its file when
//! dropped, until the caller has recorded it and calls `keep`.

mod download;
mod storage;

use std::time::Duration;

use rand::Rng;
use thiserror::Error;

pub use storage::{AssetStore, PendingAsset};

/// Largest accepted cover image: 5 MiB.
pub const MAX_ASSET_SIZE: u64 = 5 * 1024 * 1024;

/// Hard limit for a server-side cover download.
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Content types a cover may have.
pub const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
];

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Invalid file type. Only images are allowed.")]
    InvalidType(String),

    #[error("File too large. Maximum size is 5MB.")]
    TooLarge,

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Download timeout")]
    Timeout,

    #[error("Failed to download image: {0}")]
    NonSuccessStatus(u16),

    #[error("Upload interrupted: {0}")]
    Stream(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// `image/png; charset=binary` -> `image/png`
fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

pub fn is_allowed_content_type(content_type: &str) -> bool {
    ALLOWED_CONTENT_TYPES.contains(&essence(content_type).as_str())
}

fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    match essence(content_type).as_str() {
        "image/jpeg" | "image/jpg" => Some(".jpg"),
        "image/png" => Some(".png"),
        "image/gif" => Some(".gif"),
        "image/webp" => Some(".webp"),
        _ => None,
    }
}

/// Extension of the client's original filename, if it is an image extension.
fn extension_from_name(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    matches!(ext.as_str(), "jpg" | "jpeg" | "png" | "gif" | "webp").then(|| format!(".{ext}"))
}

fn random_suffix() -> u32 {
    rand::rng().random_range(0..1_000_000_000)
}

/// `{millis}-{random}{ext}` for uploads.
fn upload_filename(ext: &str) -> String {
    format!("{}-{}{}", chrono::Utc::now().timestamp_millis(), random_suffix(), ext)
}

/// `downloaded_{millis}_{random}{ext}` for URL fetches.
fn download_filename(ext: &str) -> String {
    format!(
        "downloaded_{}_{}{}",
        chrono::Utc::now().timestamp_millis(),
        random_suffix(),
        ext
    )
}

/// A stored filename must be a single plain path component.
fn is_plain_filename(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
        && !name.ends_with(".part")
}
