use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use tracing::{info, warn};

use crate::storage::{AssetStore, PendingAsset};
use crate::{
    AssetError, MAX_ASSET_SIZE, download_filename, extension_for_content_type,
    is_allowed_content_type,
};

impl AssetStore {
    /// Fetch a remote image and store it as a new asset.
    ///
    /// The body is streamed to disk as it arrives. The whole exchange, headers
    /// and body, must finish within `timeout`; when it does not, the in-flight
    /// read is dropped and with it the partial file.
    pub async fn store_from_url(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<PendingAsset, AssetError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| AssetError::DownloadFailed(format!("invalid URL {url:?}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AssetError::DownloadFailed(format!(
                "unsupported URL scheme '{}'",
                parsed.scheme()
            )));
        }

        match tokio::time::timeout(timeout, self.fetch(parsed)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Cover download from {} timed out after {:?}", url, timeout);
                Err(AssetError::Timeout)
            }
        }
    }

    async fn fetch(&self, url: reqwest::Url) -> Result<PendingAsset, AssetError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| AssetError::DownloadFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AssetError::NonSuccessStatus(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if let Some(ct) = &content_type
            && !is_allowed_content_type(ct)
        {
            return Err(AssetError::InvalidType(ct.clone()));
        }
        if response.content_length().is_some_and(|len| len > MAX_ASSET_SIZE) {
            return Err(AssetError::TooLarge);
        }

        let ext = content_type
            .as_deref()
            .and_then(extension_for_content_type)
            .unwrap_or(".jpg");
        let filename = download_filename(ext);

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| AssetError::DownloadFailed(e.to_string())));
        let (asset, size) = self.write_stream(&filename, body).await?;

        info!("Downloaded cover {} from {} ({} bytes)", filename, url, size);
        Ok(asset)
    }
}
