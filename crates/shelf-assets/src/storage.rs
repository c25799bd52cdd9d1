use std::fs as std_fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::{
    AssetError, MAX_ASSET_SIZE, extension_for_content_type, extension_from_name,
    is_allowed_content_type, is_plain_filename, upload_filename,
};

/// Manages the cover image directory.
///
/// Each asset is a flat file at `{dir}/{filename}`. In-flight writes live at
/// `{dir}/{filename}.part` until they are complete.
pub struct AssetStore {
    dir: PathBuf,
    pub(crate) client: reqwest::Client,
}

/// Removes a file when dropped, unless disarmed first.
#[derive(Debug)]
struct RemoveOnDrop(Option<PathBuf>);

impl RemoveOnDrop {
    fn disarm(&mut self) {
        self.0 = None;
    }
}

impl Drop for RemoveOnDrop {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            remove_logged(&path);
        }
    }
}

/// A freshly stored asset that nothing references yet.
///
/// Dropping it deletes the file, so an abandoned request (error, client
/// disconnect, timeout, shutdown) cannot leave it behind. Call [`keep`]
/// once the asset is recorded somewhere.
///
/// [`keep`]: PendingAsset::keep
#[derive(Debug)]
#[must_use = "dropping a PendingAsset deletes the file"]
pub struct PendingAsset {
    name: String,
    guard: RemoveOnDrop,
}

impl PendingAsset {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Keep the file and hand back its name.
    pub fn keep(self) -> String {
        let PendingAsset { name, mut guard } = self;
        guard.disarm();
        name
    }
}

impl AssetStore {
    pub async fn new(dir: PathBuf) -> Result<Self, AssetError> {
        fs::create_dir_all(&dir).await?;
        info!("Asset storage directory: {}", dir.display());
        Ok(Self {
            dir,
            client: reqwest::Client::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path for a stored asset, or `None` if `filename` is not a plain name.
    pub fn file_path(&self, filename: &str) -> Option<PathBuf> {
        is_plain_filename(filename).then(|| self.dir.join(filename))
    }

    fn partial_path(&self, filename: &str) -> PathBuf {
        self.dir.join(format!("{filename}.part"))
    }

    /// Store a client upload.
    ///
    /// The type is checked before anything touches the disk, a declared size
    /// over the limit is rejected up front, and the running total is checked
    /// while streaming so an undeclared oversize body fails mid-write.
    pub async fn store_upload<S, E>(
        &self,
        stream: S,
        content_type: &str,
        original_name: Option<&str>,
        declared_size: Option<u64>,
    ) -> Result<PendingAsset, AssetError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: std::fmt::Display,
    {
        if !is_allowed_content_type(content_type) {
            return Err(AssetError::InvalidType(content_type.to_string()));
        }
        if declared_size.is_some_and(|size| size > MAX_ASSET_SIZE) {
            return Err(AssetError::TooLarge);
        }

        let ext = original_name
            .and_then(extension_from_name)
            .or_else(|| extension_for_content_type(content_type).map(str::to_string))
            .unwrap_or_else(|| ".jpg".to_string());
        let filename = upload_filename(&ext);

        let (asset, size) = self
            .write_stream(&filename, stream.map(|chunk| chunk.map_err(|e| AssetError::Stream(e.to_string()))))
            .await?;

        info!("Stored upload {} ({} bytes)", filename, size);
        Ok(asset)
    }

    /// Stream `chunks` into `{filename}.part`, then rename it to `filename`.
    ///
    /// The partial file is removed on error and also when this future is
    /// dropped part-way. Create and rename are synchronous so neither can
    /// still be pending on the blocking pool after a cancellation.
    pub(crate) async fn write_stream<S>(
        &self,
        filename: &str,
        chunks: S,
    ) -> Result<(PendingAsset, u64), AssetError>
    where
        S: Stream<Item = Result<Bytes, AssetError>>,
    {
        let partial = self.partial_path(filename);
        let file = std_fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&partial)?;
        let mut partial_guard = RemoveOnDrop(Some(partial.clone()));

        let size = write_chunks(fs::File::from_std(file), chunks).await?;

        let target = self.dir.join(filename);
        std_fs::rename(&partial, &target)?;
        partial_guard.disarm();

        let asset = PendingAsset {
            name: filename.to_string(),
            guard: RemoveOnDrop(Some(target)),
        };
        Ok((asset, size))
    }

    /// Delete an asset. Missing files are fine; other errors are logged only.
    ///
    /// Synchronous, for use on the blocking pool next to the DB write that
    /// dropped the reference.
    pub fn delete(&self, filename: &str) {
        let Some(path) = self.file_path(filename) else {
            warn!("Refusing to delete suspicious asset name {:?}", filename);
            return;
        };
        remove_logged(&path);
    }

    pub async fn exists(&self, filename: &str) -> bool {
        match self.file_path(filename) {
            Some(path) => fs::try_exists(&path).await.unwrap_or(false),
            None => false,
        }
    }
}

async fn write_chunks<S>(mut file: fs::File, chunks: S) -> Result<u64, AssetError>
where
    S: Stream<Item = Result<Bytes, AssetError>>,
{
    let mut chunks = std::pin::pin!(chunks);
    let mut written: u64 = 0;
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        written += chunk.len() as u64;
        if written > MAX_ASSET_SIZE {
            return Err(AssetError::TooLarge);
        }
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    Ok(written)
}

fn remove_logged(path: &Path) {
    match std_fs::remove_file(path) {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}
